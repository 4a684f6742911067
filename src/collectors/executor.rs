//! Runs one collector's query on one session.

use crate::collectors::Collector;
use crate::collectors::error::{CollectError, Outcome};
use crate::database::Session;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tokio::time::timeout;
use tracing::{debug, info_span};
use tracing_futures::Instrument as _;

/// Execute `collector` against `session` and resolve to exactly one outcome.
///
/// The query is bounded by the collector's schedule timeout. The transform
/// runs once, and only for a non-empty result set; an error or panic inside it
/// becomes [`CollectError::Transform`]. The session is left open for the caller.
pub async fn execute<S: Session>(session: &mut S, collector: &dyn Collector) -> Outcome {
    let name = collector.name();
    let query = collector.query();
    let limit = collector.schedule().timeout();

    let span = info_span!(
        "collector.execute",
        collector = name,
        schedule = collector.schedule().label(),
        otel.kind = "internal"
    );

    let rows = match timeout(limit, session.query(query, limit)).instrument(span).await {
        Err(_) => {
            return Err(CollectError::Timeout {
                name,
                query,
                timeout: limit,
            });
        }
        Ok(Err(source)) => return Err(CollectError::Query { name, query, source }),
        Ok(Ok(rows)) => rows,
    };

    if rows.is_empty() {
        return Err(CollectError::EmptyResult { name, query });
    }

    match catch_unwind(AssertUnwindSafe(|| collector.transform(&rows))) {
        Ok(Ok(())) => {
            debug!(collector = name, rows = rows.len(), "collected");
            Ok(rows.len())
        }
        Ok(Err(err)) => Err(CollectError::Transform {
            name,
            query,
            source: err.into(),
        }),
        Err(panic) => Err(CollectError::Transform {
            name,
            query,
            source: format!("transform panicked: {}", panic_message(panic.as_ref())).into(),
        }),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
