//! tally-client: drive a tally-server `/submit` endpoint.

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use tally_client::ClientConfig;

#[derive(Parser)]
#[command(name = "tally-client", about = "Send telemetry records to a tally server")]
struct Cli {
    #[command(flatten)]
    cfg: ClientConfig,
}

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match tally_client::run(&cli.cfg).await {
        Ok(report) if report.failed == 0 => {}
        Ok(report) => {
            tracing::error!(failed = report.failed, attempted = report.attempted, "run finished with failures");
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!(error = %e, "run failed");
            std::process::exit(1);
        }
    }
}
