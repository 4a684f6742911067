use crate::{
    collectors::{Collector, Schedule},
    database::Row,
};
use anyhow::Result;
use prometheus::{IntGaugeVec, Opts, Registry};
use std::time::Duration;

const QUERY: &str = r"
SELECT
    datname,
    pg_database_size(datname)::int8 AS size_bytes
FROM pg_database
WHERE datallowconn AND NOT datistemplate
";

/// `pg_database_size_bytes{database}`.
///
/// `pg_database_size` walks every relation file, which gets slow on large
/// clusters, so this runs in the background on its own session.
#[derive(Clone)]
pub struct DatabaseSizeCollector {
    size_bytes: IntGaugeVec,
}

impl Default for DatabaseSizeCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseSizeCollector {
    /// # Panics
    ///
    /// Panics if metric creation fails (should never happen with valid metric names)
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let size_bytes = IntGaugeVec::new(
            Opts::new("pg_database_size_bytes", "Disk space used by the database"),
            &["database"],
        )
        .expect("create pg_database_size_bytes");

        Self { size_bytes }
    }
}

impl Collector for DatabaseSizeCollector {
    fn name(&self) -> &'static str {
        "database_size"
    }

    fn query(&self) -> &'static str {
        QUERY
    }

    fn schedule(&self) -> Schedule {
        Schedule::Async {
            timeout: Duration::from_secs(60),
        }
    }

    fn register_metrics(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.size_bytes.clone()))?;
        Ok(())
    }

    fn transform(&self, rows: &[Row]) -> Result<()> {
        let sizes = rows
            .iter()
            .map(|row| -> Result<_> { Ok((row.text("datname")?, row.i64("size_bytes")?)) })
            .collect::<Result<Vec<_>>>()?;

        self.size_bytes.reset();
        for (database, size) in sizes {
            self.size_bytes.with_label_values(&[database]).set(size);
        }

        Ok(())
    }
}
