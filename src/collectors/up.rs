use crate::{collectors::Collector, database::Row};
use anyhow::{Result, anyhow};
use prometheus::{IntGauge, Opts, Registry};

pub const UP_METRIC: &str = "pg_up";

pub const QUERY: &str = "SELECT 1::int8 AS up";

/// The fixed reachability indicator. Always registered, always first.
///
/// A successful `SELECT 1` sets `pg_up` to 1; the scrape handler sets it to 0
/// when the primary session cannot be opened.
#[derive(Clone)]
pub struct UpCollector {
    up: IntGauge,
}

impl Default for UpCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl UpCollector {
    /// # Panics
    ///
    /// Panics if metric creation fails (should never happen with valid metric names)
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let up = IntGauge::with_opts(Opts::new(
            UP_METRIC,
            "Whether the last scrape could reach the PostgreSQL server (1 = up, 0 = down)",
        ))
        .expect("create pg_up");

        Self { up }
    }

    pub fn set_down(&self) {
        self.up.set(0);
    }

    pub fn value(&self) -> i64 {
        self.up.get()
    }
}

impl Collector for UpCollector {
    fn name(&self) -> &'static str {
        "up"
    }

    fn query(&self) -> &'static str {
        QUERY
    }

    fn register_metrics(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.up.clone()))?;
        Ok(())
    }

    fn transform(&self, rows: &[Row]) -> Result<()> {
        let row = rows.first().ok_or_else(|| anyhow!("no rows"))?;
        self.up.set(row.i64("up")?);
        Ok(())
    }
}
