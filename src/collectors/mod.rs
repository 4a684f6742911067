use crate::database::Row;
use anyhow::Result;
use prometheus::Registry;
use std::{collections::HashMap, sync::Arc, time::Duration};

#[macro_use]
mod register_macro;

/// Bound applied to every synchronous collector's query.
pub const SYNC_QUERY_TIMEOUT: Duration = Duration::from_secs(15);

/// When a collector runs relative to the scrape response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schedule {
    /// On the primary session, before the response is rendered.
    Sync,
    /// On its own session, detached from the response, bounded by `timeout`.
    Async { timeout: Duration },
}

impl Schedule {
    pub const fn timeout(self) -> Duration {
        match self {
            Self::Sync => SYNC_QUERY_TIMEOUT,
            Self::Async { timeout } => timeout,
        }
    }

    pub const fn is_async(self) -> bool {
        matches!(self, Self::Async { .. })
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Async { .. } => "async",
        }
    }
}

/// A named query plus the transform that turns its rows into metric values.
///
/// Collectors own their metric handles; `transform` only writes to them.
pub trait Collector: Send + Sync {
    fn name(&self) -> &'static str;

    fn query(&self) -> &'static str;

    fn schedule(&self) -> Schedule {
        Schedule::Sync
    }

    fn enabled_by_default(&self) -> bool {
        true
    }

    /// Register metrics with the prometheus registry
    ///
    /// # Errors
    ///
    /// Returns an error if a metric name is already registered
    fn register_metrics(&self, registry: &Registry) -> Result<()>;

    /// Update metrics from a non-empty result set.
    ///
    /// # Errors
    ///
    /// Returns an error if a row is malformed
    fn transform(&self, rows: &[Row]) -> Result<()>;
}

pub type SharedCollector = Arc<dyn Collector>;

// THIS IS THE ONLY PLACE YOU NEED TO ADD NEW COLLECTORS
register_collectors! {
    version => VersionCollector,
    connections => ConnectionsCollector,
    database => DatabaseCollector,
    database_size => DatabaseSizeCollector,
    tables => TablesCollector,
}

pub mod config;
pub mod cycle;
pub mod error;
pub mod executor;
pub mod internal;
pub mod registry;
pub mod tasks;
pub mod up;
