//! Errors produced while collecting.
//!
//! Only a `ConnectError` on the primary session ever leaves a collection
//! cycle; everything else is contained to its collector and logged.

use crate::database::BoxError;
use std::time::Duration;
use thiserror::Error;

/// A database session could not be established (or dropped before first use).
#[derive(Debug, Error)]
#[error("failed to connect to {target}: {source}")]
pub struct ConnectError {
    target: String,
    #[source]
    source: BoxError,
}

impl ConnectError {
    pub fn new(target: &str, source: impl Into<BoxError>) -> Self {
        Self {
            target: target.to_string(),
            source: source.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

/// Terminal failure of a single collector run.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("collector '{name}' query failed: {source}")]
    Query {
        name: &'static str,
        query: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("collector '{name}' query timed out after {timeout:?}")]
    Timeout {
        name: &'static str,
        query: &'static str,
        timeout: Duration,
    },

    #[error("collector '{name}' query returned no rows")]
    EmptyResult {
        name: &'static str,
        query: &'static str,
    },

    #[error("collector '{name}' transform failed: {source}")]
    Transform {
        name: &'static str,
        query: &'static str,
        #[source]
        source: BoxError,
    },
}

impl CollectError {
    /// Short label used in logs and the `kind` metric label.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Query { .. } => "query",
            Self::Timeout { .. } => "timeout",
            Self::EmptyResult { .. } => "empty",
            Self::Transform { .. } => "transform",
        }
    }

    /// Query failures and timeouts both count as query errors.
    pub const fn is_query_error(&self) -> bool {
        matches!(self, Self::Query { .. } | Self::Timeout { .. })
    }

    pub const fn query(&self) -> Option<&'static str> {
        match self {
            Self::Connect(_) => None,
            Self::Query { query, .. }
            | Self::Timeout { query, .. }
            | Self::EmptyResult { query, .. }
            | Self::Transform { query, .. } => Some(*query),
        }
    }
}

/// Result of one executor run: the number of rows transformed.
pub type Outcome = Result<usize, CollectError>;
