//! Operational HTTP endpoints.
//!
//! - `/metrics` : Prometheus text format, or OpenMetrics when negotiated

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::app_state::AppState;
use crate::obs::Format;

const OPENMETRICS_MEDIA: &str = "application/openmetrics-text";

/// Pick the exposition format from the scraper's `Accept` header.
pub fn negotiate(headers: &HeaderMap, openmetrics_enabled: bool) -> Format {
    if !openmetrics_enabled {
        return Format::Prometheus;
    }
    let wants_openmetrics = headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|media| {
            media
                .split(';')
                .next()
                .is_some_and(|m| m.trim().eq_ignore_ascii_case(OPENMETRICS_MEDIA))
        });

    if wants_openmetrics {
        Format::OpenMetrics
    } else {
        Format::Prometheus
    }
}

pub async fn metrics(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let format = negotiate(&headers, state.cfg().metrics.enable_openmetrics);
    let body = state.metrics().render(format);

    (StatusCode::OK, [(header::CONTENT_TYPE, format.content_type())], body).into_response()
}
