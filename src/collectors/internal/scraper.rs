use crate::collectors::error::Outcome;
use anyhow::Result;
use prometheus::{GaugeVec, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Tracks how each collector run went, sync and async alike.
///
/// # Metrics Exported
///
/// - `pgscrape_collector_duration_seconds{collector}` (Histogram)
/// - `pgscrape_collector_errors_total{collector, kind}` (Counter), `kind` is one of
///   `connect`, `query`, `timeout`, `empty`, `transform`
/// - `pgscrape_collector_last_success{collector}` (Gauge, 1 = ok, 0 = failed)
/// - `pgscrape_collector_last_timestamp_seconds{collector}` (Gauge)
/// - `pgscrape_scrapes_total` (Counter)
/// - `pgscrape_scrape_connect_failures_total` (Counter), primary session failures
/// - `pgscrape_background_tasks` (Gauge), async collector runs still in flight
/// - `pgscrape_metrics_total` (Gauge), series rendered by the last scrape
///
/// Async collectors finish after the scrape that launched them, so their
/// samples show up on a later scrape.
#[derive(Clone)]
pub struct ScraperCollector {
    duration_seconds: HistogramVec,
    errors_total: IntCounterVec,
    last_success: GaugeVec,
    last_timestamp: GaugeVec,

    scrapes_total: IntCounter,
    connect_failures_total: IntCounter,
    background_tasks: IntGauge,
    metrics_total: IntGauge,
}

impl Default for ScraperCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ScraperCollector {
    /// # Panics
    ///
    /// Panics if metric creation fails (should never happen with valid metric names)
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "pgscrape_collector_duration_seconds",
                "Time spent running each collector's query and transform in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0, 60.0,
            ]),
            &["collector"],
        )
        .expect("pgscrape_collector_duration_seconds");

        let errors_total = IntCounterVec::new(
            Opts::new(
                "pgscrape_collector_errors_total",
                "Total number of failed collector runs by failure kind",
            ),
            &["collector", "kind"],
        )
        .expect("pgscrape_collector_errors_total");

        let last_success = GaugeVec::new(
            Opts::new(
                "pgscrape_collector_last_success",
                "Whether the last run of the collector succeeded (1=success, 0=failure)",
            ),
            &["collector"],
        )
        .expect("pgscrape_collector_last_success");

        let last_timestamp = GaugeVec::new(
            Opts::new(
                "pgscrape_collector_last_timestamp_seconds",
                "Unix timestamp of the last finished run per collector",
            ),
            &["collector"],
        )
        .expect("pgscrape_collector_last_timestamp_seconds");

        let scrapes_total = IntCounter::with_opts(Opts::new(
            "pgscrape_scrapes_total",
            "Total number of scrapes handled since start",
        ))
        .expect("pgscrape_scrapes_total");

        let connect_failures_total = IntCounter::with_opts(Opts::new(
            "pgscrape_scrape_connect_failures_total",
            "Scrapes answered with pg_up=0 because the primary session could not be opened",
        ))
        .expect("pgscrape_scrape_connect_failures_total");

        let background_tasks = IntGauge::with_opts(Opts::new(
            "pgscrape_background_tasks",
            "Asynchronous collector runs currently in flight",
        ))
        .expect("pgscrape_background_tasks");

        let metrics_total = IntGauge::with_opts(Opts::new(
            "pgscrape_metrics_total",
            "Number of series rendered by the last scrape",
        ))
        .expect("pgscrape_metrics_total");

        Self {
            duration_seconds,
            errors_total,
            last_success,
            last_timestamp,
            scrapes_total,
            connect_failures_total,
            background_tasks,
            metrics_total,
        }
    }

    /// Start timing one collector run.
    pub fn start(&self, collector: &'static str) -> ScrapeTimer {
        ScrapeTimer {
            collector,
            start: Instant::now(),
            scraper: self.clone(),
        }
    }

    pub fn increment_scrapes(&self) {
        self.scrapes_total.inc();
    }

    pub fn record_connect_failure(&self) {
        self.connect_failures_total.inc();
    }

    pub fn update_metrics_count(&self, count: i64) {
        self.metrics_total.set(count);
    }

    /// Handle on the in-flight gauge, shared with the background task set.
    pub fn background_tasks(&self) -> IntGauge {
        self.background_tasks.clone()
    }

    fn record(&self, collector: &str, elapsed: f64, outcome: &Outcome) {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();

        self.duration_seconds
            .with_label_values(&[collector])
            .observe(elapsed);

        self.last_timestamp
            .with_label_values(&[collector])
            .set(timestamp);

        match outcome {
            Ok(_) => {
                self.last_success.with_label_values(&[collector]).set(1.0);
            }
            Err(err) => {
                self.errors_total
                    .with_label_values(&[collector, err.kind()])
                    .inc();
                self.last_success.with_label_values(&[collector]).set(0.0);
            }
        }
    }

    /// Register all metrics with the registry
    ///
    /// # Errors
    ///
    /// Returns an error if any metric is already registered
    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.duration_seconds.clone()))?;
        registry.register(Box::new(self.errors_total.clone()))?;
        registry.register(Box::new(self.last_success.clone()))?;
        registry.register(Box::new(self.last_timestamp.clone()))?;
        registry.register(Box::new(self.scrapes_total.clone()))?;
        registry.register(Box::new(self.connect_failures_total.clone()))?;
        registry.register(Box::new(self.background_tasks.clone()))?;
        registry.register(Box::new(self.metrics_total.clone()))?;
        Ok(())
    }
}

/// Measures one collector run; consumed by [`ScrapeTimer::finish`].
pub struct ScrapeTimer {
    collector: &'static str,
    start: Instant,
    scraper: ScraperCollector,
}

impl ScrapeTimer {
    pub fn finish(self, outcome: &Outcome) {
        let elapsed = self.start.elapsed().as_secs_f64();
        self.scraper.record(self.collector, elapsed, outcome);
    }
}
