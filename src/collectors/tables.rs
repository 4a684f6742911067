use crate::{
    collectors::{Collector, Schedule},
    database::Row,
};
use anyhow::Result;
use prometheus::{IntGaugeVec, Opts, Registry};
use std::time::Duration;

const QUERY: &str = r"
SELECT
    schemaname,
    relname,
    n_live_tup::int8 AS live_tuples,
    n_dead_tup::int8 AS dead_tuples,
    pg_total_relation_size(relid)::int8 AS size_bytes
FROM pg_stat_user_tables
ORDER BY pg_total_relation_size(relid) DESC
LIMIT 500
";

/// Per-table tuple counts and on-disk size for the current database:
/// - `pg_table_live_tuples{schema, table}`
/// - `pg_table_dead_tuples{schema, table}`
/// - `pg_table_size_bytes{schema, table}`
///
/// Limited to the 500 largest tables to bound cardinality. Disabled by default.
#[derive(Clone)]
pub struct TablesCollector {
    live_tuples: IntGaugeVec,
    dead_tuples: IntGaugeVec,
    size_bytes: IntGaugeVec,
}

impl Default for TablesCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::expect_used)]
fn table_gauge(name: &str, help: &str) -> IntGaugeVec {
    IntGaugeVec::new(Opts::new(name, help), &["schema", "table"]).expect("valid metric definition")
}

impl TablesCollector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            live_tuples: table_gauge("pg_table_live_tuples", "Estimated number of live rows"),
            dead_tuples: table_gauge("pg_table_dead_tuples", "Estimated number of dead rows"),
            size_bytes: table_gauge(
                "pg_table_size_bytes",
                "Total disk space used by the table, including indexes and TOAST",
            ),
        }
    }
}

impl Collector for TablesCollector {
    fn name(&self) -> &'static str {
        "tables"
    }

    fn query(&self) -> &'static str {
        QUERY
    }

    fn schedule(&self) -> Schedule {
        Schedule::Async {
            timeout: Duration::from_secs(30),
        }
    }

    fn enabled_by_default(&self) -> bool {
        false
    }

    fn register_metrics(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.live_tuples.clone()))?;
        registry.register(Box::new(self.dead_tuples.clone()))?;
        registry.register(Box::new(self.size_bytes.clone()))?;
        Ok(())
    }

    fn transform(&self, rows: &[Row]) -> Result<()> {
        // Parse everything before touching the vectors so a scrape never sees
        // them half refilled, and a bad row keeps the previous values.
        let parsed = rows
            .iter()
            .map(|row| -> Result<_> {
                Ok((
                    [row.text("schemaname")?, row.text("relname")?],
                    row.i64("live_tuples")?,
                    row.i64("dead_tuples")?,
                    row.i64("size_bytes")?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        self.live_tuples.reset();
        self.dead_tuples.reset();
        self.size_bytes.reset();

        for (labels, live, dead, size) in parsed {
            self.live_tuples.with_label_values(&labels).set(live);
            self.dead_tuples.with_label_values(&labels).set(dead);
            self.size_bytes.with_label_values(&labels).set(size);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_by_default_and_async() {
        let collector = TablesCollector::new();
        assert!(!collector.enabled_by_default());
        assert!(collector.schedule().is_async());
    }

    #[test]
    fn test_transform() {
        let collector = TablesCollector::new();

        collector
            .transform(&[Row::new()
                .with("schemaname", "public")
                .with("relname", "orders")
                .with("live_tuples", 1000_i64)
                .with("dead_tuples", 25_i64)
                .with("size_bytes", 65_536_i64)])
            .unwrap();

        let labels = ["public", "orders"];
        assert_eq!(collector.live_tuples.with_label_values(&labels).get(), 1000);
        assert_eq!(collector.dead_tuples.with_label_values(&labels).get(), 25);
        assert_eq!(collector.size_bytes.with_label_values(&labels).get(), 65_536);
    }

    #[test]
    fn test_bad_row_keeps_previous_values() {
        let collector = TablesCollector::new();
        let row = |relname: &str, live: i64| {
            Row::new()
                .with("schemaname", "public")
                .with("relname", relname)
                .with("live_tuples", live)
                .with("dead_tuples", 0_i64)
                .with("size_bytes", 8192_i64)
        };

        collector.transform(&[row("orders", 10)]).unwrap();
        let result = collector.transform(&[
            row("orders", 20),
            Row::new().with("schemaname", "public").with("relname", "broken"),
        ]);

        assert!(result.is_err());
        assert_eq!(
            collector.live_tuples.with_label_values(&["public", "orders"]).get(),
            10
        );
    }
}
