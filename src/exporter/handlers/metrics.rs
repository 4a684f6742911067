use crate::collectors::cycle::Orchestrator;
use crate::database::Connector;
use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, TextEncoder, proto::MetricFamily};
use tracing::{debug, error};

pub const X_ERROR: &str = "x-error";

/// Run one collection cycle and render the registry.
///
/// If the primary session can't be opened no collector runs: `pg_up` is set
/// to 0 and only that family is returned, with the reason in `X-Error`.
pub async fn metrics<C: Connector>(
    Extension(orchestrator): Extension<Orchestrator<C>>,
) -> Response {
    let registry = orchestrator.registry();

    match orchestrator.scrape().await {
        Ok(report) => {
            debug!(
                succeeded = report.succeeded(),
                failed = report.failed(),
                "rendering metrics"
            );

            let families = registry.gather();
            let series = families.iter().map(|f| f.get_metric().len()).sum::<usize>();
            registry
                .scraper()
                .update_metrics_count(i64::try_from(series).unwrap_or(i64::MAX));

            render(&families, HeaderMap::new())
        }
        Err(err) => {
            error!(db_target = err.target(), error = %err, "target unreachable");

            registry.up().set_down();

            let mut headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(&sanitize_header(&err.to_string())) {
                headers.insert(X_ERROR, value);
            }

            render(&registry.gather_up(), headers)
        }
    }
}

fn render(families: &[MetricFamily], mut headers: HeaderMap) -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(families, &mut buffer) {
        error!(error = %e, "failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error encoding metrics: {e}"),
        )
            .into_response();
    }

    if let Ok(content_type) = HeaderValue::from_str(encoder.format_type()) {
        headers.insert("content-type", content_type);
    }

    (StatusCode::OK, headers, buffer).into_response()
}

/// Keep only visible ASCII (and spaces) so the message is a valid header value.
fn sanitize_header(message: &str) -> String {
    message
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { ' ' })
        .collect::<String>()
        .trim()
        .to_string()
}
