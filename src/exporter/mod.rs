use crate::{
    cli::telemetry::shutdown_tracer,
    collectors::{config::CollectorConfig, cycle::Orchestrator, registry::CollectorRegistry},
    database::{Connector, PgConnector, TargetConfig},
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::{Next, from_fn},
    response::{Redirect, Response},
    routing::get,
};
use opentelemetry::global;
use opentelemetry::trace::{TraceContextExt, TraceId};
use opentelemetry_http::HeaderExtractor;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, error, info, info_span, warn};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use ulid::Ulid;

mod handlers;
mod shutdown;

pub use self::handlers::X_ERROR;

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = if let Some(hash) = built_info::GIT_COMMIT_HASH {
    hash
} else {
    ":-("
};

/// Grace period for detached collectors once the server has stopped.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Start the exporter and serve until SIGINT/SIGTERM.
///
/// # Errors
///
/// Returns an error if collector registration or binding the listener fails
pub async fn new(
    port: u16,
    listen: Option<String>,
    target: TargetConfig,
    collectors: Vec<String>,
) -> Result<()> {
    let connector = PgConnector::new(&target);

    let config = CollectorConfig::new().with_enabled(&collectors);
    let registry = CollectorRegistry::new(&config).context("Failed to build collector registry")?;

    let orchestrator = Orchestrator::new(connector.clone(), registry);

    let app = router(orchestrator.clone());

    let (listener, bind_addr) = bind(port, listen).await?;

    println!(
        "{} {} - Listening on {bind_addr}\n\nTarget: {}\n\nEnabled collectors:\n{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        connector.target(),
        format_list(&orchestrator.registry().collector_names()),
    );

    if let Err(e) = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await
    {
        error!(error=%e, "server error");
    }

    info!(
        in_flight = orchestrator.tasks().len(),
        "shutting down, draining background collectors"
    );

    if !orchestrator.drain(SHUTDOWN_GRACE).await {
        warn!(
            in_flight = orchestrator.tasks().len(),
            "background collectors still running after grace period, abandoning"
        );
    }

    shutdown_tracer();

    Ok(())
}

/// HTTP surface over an orchestrator; generic so it can run against any target.
pub fn router<C: Connector>(orchestrator: Orchestrator<C>) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(make_span)
        .on_response(on_response);

    Router::new()
        .route("/", get(|| async { Redirect::temporary("/metrics") }))
        .route("/metrics", get(handlers::metrics::<C>))
        .route(
            "/health",
            get(handlers::health::<C>).options(handlers::health::<C>),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(trace_layer)
                .layer(from_fn(add_trace_headers))
                .layer(Extension(orchestrator)),
        )
}

async fn bind(port: u16, listen: Option<String>) -> Result<(TcpListener, String)> {
    if let Some(addr) = listen {
        let Ok(ip) = addr.parse::<std::net::IpAddr>() else {
            return Err(anyhow!(
                "Invalid IP address: '{addr}'. Expected IPv4 (e.g., 0.0.0.0, 127.0.0.1) or IPv6 (e.g., ::, ::1)"
            ));
        };

        let bind_addr = std::net::SocketAddr::new(ip, port);
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind to {bind_addr}"))?;

        return Ok((listener, bind_addr.to_string()));
    }

    // Auto: try IPv6 first, fallback to IPv4
    match TcpListener::bind(format!("[::]:{port}")).await {
        Ok(l) => Ok((l, format!("[::]:{port}"))),
        Err(_) => {
            let listener = TcpListener::bind(format!("0.0.0.0:{port}"))
                .await
                .with_context(|| format!("Failed to bind to 0.0.0.0:{port}"))?;
            Ok((listener, format!("0.0.0.0:{port}")))
        }
    }
}

// Helper to format a list of items with a leading dash and indentation for the
// start up message
fn format_list<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| format!("  - {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn make_span(request: &Request<Body>) -> Span {
    let parent_cx =
        global::get_text_map_propagator(|prop| prop.extract(&HeaderExtractor(request.headers())));

    let method = request.method().as_str();

    let path = request.uri().path();

    let target = request.uri().to_string();

    let scheme = request.uri().scheme_str().unwrap_or("http");

    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("none");

    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    let span = info_span!(
        "http.server.request",
        otel.kind = "server",
        http.method = method,
        http.route = path,
        http.target = target,
        http.scheme = scheme,
        http.user_agent = user_agent,
        request_id = request_id,
        otel.status_code = tracing::field::Empty,
    );

    let _ = span.set_parent(parent_cx);

    span
}

fn on_response<B>(response: &axum::http::Response<B>, latency: Duration, span: &Span) {
    if response.status().is_server_error() {
        span.record("otel.status_code", "ERROR");
    } else {
        span.record("otel.status_code", "OK");
    }

    let cx = span.context();
    let trace_id = cx.span().span_context().trace_id();

    if trace_id != TraceId::INVALID {
        info!(
            parent: span,
            status = response.status().as_u16(),
            elapsed_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
            trace_id = %trace_id,
            "request completed"
        );
    } else {
        info!(
            parent: span,
            status = response.status().as_u16(),
            elapsed_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
            "request completed"
        );
    }
}

async fn add_trace_headers(req: Request<Body>, next: Next) -> Response {
    let mut res = next.run(req).await;

    let span = Span::current();

    let cx = span.context();

    // CLONE the SpanContext to avoid borrowing a temporary
    let span_context = cx.span().span_context().clone();

    if span_context.is_valid()
        && let Ok(val) = HeaderValue::from_str(&span_context.trace_id().to_string())
    {
        res.headers_mut()
            .insert(HeaderName::from_static("x-trace-id"), val);
    }

    res
}
