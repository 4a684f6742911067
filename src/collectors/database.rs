use crate::{collectors::Collector, database::Row};
use anyhow::Result;
use prometheus::{IntGaugeVec, Opts, Registry};

const QUERY: &str = r"
SELECT
    datname,
    xact_commit::int8 AS xact_commit,
    xact_rollback::int8 AS xact_rollback,
    deadlocks::int8 AS deadlocks
FROM pg_stat_database
WHERE datname IS NOT NULL
";

/// Per-database activity counters from `pg_stat_database`.
///
/// The values are cumulative on the server side; they are exported as gauges
/// mirroring those counters.
#[derive(Clone)]
pub struct DatabaseCollector {
    xact_commit: IntGaugeVec,
    xact_rollback: IntGaugeVec,
    deadlocks: IntGaugeVec,
}

impl Default for DatabaseCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::expect_used)]
fn int_gauge_vec(name: &str, help: &str) -> IntGaugeVec {
    IntGaugeVec::new(Opts::new(name, help), &["database"]).expect("valid metric definition")
}

impl DatabaseCollector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            xact_commit: int_gauge_vec(
                "pg_database_xact_commit_total",
                "Transactions committed in this database",
            ),
            xact_rollback: int_gauge_vec(
                "pg_database_xact_rollback_total",
                "Transactions rolled back in this database",
            ),
            deadlocks: int_gauge_vec(
                "pg_database_deadlocks_total",
                "Deadlocks detected in this database",
            ),
        }
    }
}

impl Collector for DatabaseCollector {
    fn name(&self) -> &'static str {
        "database"
    }

    fn query(&self) -> &'static str {
        QUERY
    }

    fn register_metrics(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.xact_commit.clone()))?;
        registry.register(Box::new(self.xact_rollback.clone()))?;
        registry.register(Box::new(self.deadlocks.clone()))?;
        Ok(())
    }

    fn transform(&self, rows: &[Row]) -> Result<()> {
        for row in rows {
            let database = row.text("datname")?;

            self.xact_commit
                .with_label_values(&[database])
                .set(row.i64("xact_commit")?);
            self.xact_rollback
                .with_label_values(&[database])
                .set(row.i64("xact_rollback")?);
            self.deadlocks
                .with_label_values(&[database])
                .set(row.i64("deadlocks")?);
        }

        Ok(())
    }
}
