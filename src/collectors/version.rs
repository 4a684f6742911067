use crate::{collectors::Collector, database::Row};
use anyhow::{Result, anyhow};
use prometheus::{IntGauge, IntGaugeVec, Opts, Registry};

const QUERY: &str = r"
SELECT
    current_setting('server_version_num')::int8 AS version_num,
    current_setting('server_version') AS version
";

/// Exposes the server version:
/// - `pg_version_info{version}` (always 1)
/// - `pg_server_version_num`, e.g. 170002
#[derive(Clone)]
pub struct VersionCollector {
    info: IntGaugeVec,
    version_num: IntGauge,
}

impl Default for VersionCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionCollector {
    /// # Panics
    ///
    /// Panics if metric creation fails (should never happen with valid metric names)
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let info = IntGaugeVec::new(
            Opts::new("pg_version_info", "PostgreSQL version string, value is always 1"),
            &["version"],
        )
        .expect("create pg_version_info");

        let version_num = IntGauge::with_opts(Opts::new(
            "pg_server_version_num",
            "PostgreSQL server_version_num setting",
        ))
        .expect("create pg_server_version_num");

        Self { info, version_num }
    }
}

impl Collector for VersionCollector {
    fn name(&self) -> &'static str {
        "version"
    }

    fn query(&self) -> &'static str {
        QUERY
    }

    fn register_metrics(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.info.clone()))?;
        registry.register(Box::new(self.version_num.clone()))?;
        Ok(())
    }

    fn transform(&self, rows: &[Row]) -> Result<()> {
        let row = rows.first().ok_or_else(|| anyhow!("no rows"))?;

        let version_num = row.i64("version_num")?;
        let version = row.text("version")?;

        // Drop the old label after an upgrade.
        self.info.reset();
        self.info.with_label_values(&[version]).set(1);
        self.version_num.set(version_num);

        Ok(())
    }
}
