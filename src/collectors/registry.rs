use crate::collectors::config::CollectorConfig;
use crate::collectors::internal::ScraperCollector;
use crate::collectors::up::{UP_METRIC, UpCollector};
use crate::collectors::{COLLECTOR_NAMES, SharedCollector, all_factories};
use anyhow::{Context, Result, bail};
use prometheus::{Registry, proto::MetricFamily};
use std::{collections::HashSet, sync::Arc};
use tracing::debug;

/// Ordered, immutable set of collectors plus the registry their metrics live in.
///
/// `up` is always first. Names must be unique, and since every collector
/// registers its own metrics here, two collectors can't claim the same metric
/// name either.
#[derive(Clone)]
pub struct CollectorRegistry {
    collectors: Arc<[SharedCollector]>,
    up: UpCollector,
    scraper: ScraperCollector,
    metrics: Registry,
}

impl CollectorRegistry {
    /// Build from the enabled collector names, keeping `COLLECTOR_NAMES` order.
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails
    pub fn new(config: &CollectorConfig) -> Result<Self> {
        let factories = all_factories();
        let collectors = COLLECTOR_NAMES
            .iter()
            .filter(|name| config.is_enabled(name))
            .filter_map(|name| factories.get(*name).map(|f| f()))
            .collect();

        Self::with_collectors(collectors)
    }

    /// Build from an explicit list; `up` is prepended.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate collector names or metric names
    pub fn with_collectors(collectors: Vec<SharedCollector>) -> Result<Self> {
        let up = UpCollector::new();
        let scraper = ScraperCollector::new();
        let metrics = Registry::new();

        let mut all: Vec<SharedCollector> = Vec::with_capacity(collectors.len() + 1);
        all.push(Arc::new(up.clone()));
        all.extend(collectors);

        let mut seen = HashSet::new();
        for collector in &all {
            if !seen.insert(collector.name()) {
                bail!("duplicate collector name '{}'", collector.name());
            }

            collector
                .register_metrics(&metrics)
                .with_context(|| format!("registering metrics for '{}'", collector.name()))?;

            debug!(collector = collector.name(), "registered metrics");
        }

        scraper
            .register(&metrics)
            .context("registering exporter metrics")?;

        Ok(Self {
            collectors: Arc::from(all),
            up,
            scraper,
            metrics,
        })
    }

    pub fn collectors(&self) -> &[SharedCollector] {
        &self.collectors
    }

    /// Split into `(synchronous, asynchronous)`, each in registration order.
    pub fn partition(&self) -> (Vec<SharedCollector>, Vec<SharedCollector>) {
        self.collectors
            .iter()
            .cloned()
            .partition(|c| !c.schedule().is_async())
    }

    pub fn collector_names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(|c| c.name()).collect()
    }

    pub const fn up(&self) -> &UpCollector {
        &self.up
    }

    pub const fn scraper(&self) -> &ScraperCollector {
        &self.scraper
    }

    pub const fn metrics(&self) -> &Registry {
        &self.metrics
    }

    /// Current state of every registered metric.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.metrics.gather()
    }

    /// Only the `pg_up` family, used when the target is unreachable.
    pub fn gather_up(&self) -> Vec<MetricFamily> {
        self.metrics
            .gather()
            .into_iter()
            .filter(|family| family.name() == UP_METRIC)
            .collect()
    }
}
