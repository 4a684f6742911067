use crate::{collectors::Collector, database::Row};
use anyhow::Result;
use prometheus::{IntGauge, IntGaugeVec, Opts, Registry};

const QUERY: &str = r"
SELECT
    a.datname,
    COALESCE(a.state, 'unknown') AS state,
    COUNT(*)::int8 AS count,
    current_setting('max_connections')::int8 AS max_connections
FROM pg_stat_activity a
WHERE a.datname IS NOT NULL
GROUP BY a.datname, a.state
UNION ALL
SELECT NULL, NULL, 0, current_setting('max_connections')::int8
";

/// Client backends per database and state:
/// - `pg_connections{database, state}`
/// - `pg_max_connections`
///
/// The trailing `UNION ALL` row always carries `max_connections`, so an idle
/// server still returns a row.
#[derive(Clone)]
pub struct ConnectionsCollector {
    connections: IntGaugeVec,
    max_connections: IntGauge,
}

impl Default for ConnectionsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionsCollector {
    /// # Panics
    ///
    /// Panics if metric creation fails (should never happen with valid metric names)
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let connections = IntGaugeVec::new(
            Opts::new(
                "pg_connections",
                "Number of client backends by database and state (from pg_stat_activity)",
            ),
            &["database", "state"],
        )
        .expect("create pg_connections");

        let max_connections = IntGauge::with_opts(Opts::new(
            "pg_max_connections",
            "Maximum number of concurrent connections (max_connections setting)",
        ))
        .expect("create pg_max_connections");

        Self {
            connections,
            max_connections,
        }
    }
}

impl Collector for ConnectionsCollector {
    fn name(&self) -> &'static str {
        "connections"
    }

    fn query(&self) -> &'static str {
        QUERY
    }

    fn register_metrics(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.connections.clone()))?;
        registry.register(Box::new(self.max_connections.clone()))?;
        Ok(())
    }

    fn transform(&self, rows: &[Row]) -> Result<()> {
        let mut max_connections = None;
        let mut counts = Vec::with_capacity(rows.len());

        for row in rows {
            max_connections = Some(row.i64("max_connections")?);

            let Some(database) = row.get("datname").and_then(|v| v.as_str()) else {
                continue;
            };
            counts.push((
                [database, row.label("state", "unknown")],
                row.i64("count")?,
            ));
        }

        if let Some(max) = max_connections {
            self.max_connections.set(max);
        }

        // Databases or states that disappeared must not linger.
        self.connections.reset();
        for (labels, count) in counts {
            self.connections.with_label_values(&labels).set(count);
        }

        Ok(())
    }
}
