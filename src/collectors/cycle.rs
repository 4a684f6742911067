//! One collection cycle per scrape.
//!
//! Collectors are split by schedule. Asynchronous ones are launched first as
//! detached tasks, each on its own session and timeout; the cycle never waits
//! for them. Synchronous ones then run strictly in registration order on the
//! primary session, and the cycle is done when the last of them resolves.
//! No collector failure escapes the cycle: only a failure to open the primary
//! session does.

use crate::collectors::error::{ConnectError, Outcome};
use crate::collectors::executor::execute;
use crate::collectors::registry::CollectorRegistry;
use crate::collectors::tasks::BackgroundTasks;
use crate::collectors::{Collector, Schedule, SharedCollector};
use crate::database::{Connector, Session};
use std::time::Duration;
use tracing::{debug, info_span, warn};
use tracing_futures::Instrument as _;

/// What the synchronous part of a cycle produced.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Synchronous outcomes, in execution order.
    pub outcomes: Vec<(&'static str, Outcome)>,
    /// Asynchronous collectors launched by this cycle.
    pub spawned: Vec<&'static str>,
}

impl CycleReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn outcome(&self, name: &str) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, outcome)| outcome)
    }
}

#[derive(Clone)]
pub struct Orchestrator<C: Connector> {
    connector: C,
    registry: CollectorRegistry,
    tasks: BackgroundTasks,
}

impl<C: Connector> Orchestrator<C> {
    pub fn new(connector: C, registry: CollectorRegistry) -> Self {
        let tasks = BackgroundTasks::new(registry.scraper().background_tasks());
        Self {
            connector,
            registry,
            tasks,
        }
    }

    pub const fn registry(&self) -> &CollectorRegistry {
        &self.registry
    }

    pub const fn connector(&self) -> &C {
        &self.connector
    }

    pub const fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    /// Open the primary session, run one cycle on it, and close it.
    ///
    /// # Errors
    ///
    /// Returns the `ConnectError` if the primary session can't be opened; no
    /// collector runs in that case.
    pub async fn scrape(&self) -> Result<CycleReport, ConnectError> {
        let scraper = self.registry.scraper();
        scraper.increment_scrapes();

        let mut primary = match self.connector.open().await {
            Ok(session) => session,
            Err(err) => {
                scraper.record_connect_failure();
                return Err(err);
            }
        };

        let report = self.run(&mut primary).await;
        primary.close().await;

        debug!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            spawned = report.spawned.len(),
            "collection cycle finished"
        );

        Ok(report)
    }

    /// Run one cycle on an already open primary session.
    pub async fn run(&self, primary: &mut C::Session) -> CycleReport {
        let (synchronous, asynchronous) = self.registry.partition();

        let spawned = asynchronous
            .into_iter()
            .map(|collector| self.spawn_async(collector))
            .collect();

        let scraper = self.registry.scraper();
        let mut outcomes = Vec::with_capacity(synchronous.len());

        for collector in &synchronous {
            let timer = scraper.start(collector.name());
            let outcome = execute(primary, collector.as_ref()).await;
            timer.finish(&outcome);
            report(collector.name(), Schedule::Sync, &outcome);
            outcomes.push((collector.name(), outcome));
        }

        CycleReport { outcomes, spawned }
    }

    /// Wait up to `grace` for detached collectors to finish.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.tasks.shutdown(grace).await
    }

    fn spawn_async(&self, collector: SharedCollector) -> &'static str {
        let name = collector.name();
        let connector = self.connector.clone();
        let scraper = self.registry.scraper().clone();
        let span = info_span!("collector.background", collector = name, otel.kind = "internal");

        self.tasks.spawn(
            name,
            async move {
                let timer = scraper.start(name);
                let outcome = collect_detached(&connector, collector.as_ref()).await;
                timer.finish(&outcome);
                report(name, collector.schedule(), &outcome);
            }
            .instrument(span),
        );

        name
    }
}

/// Own a session for exactly one collector run; closed on every path.
async fn collect_detached<C: Connector>(connector: &C, collector: &dyn Collector) -> Outcome {
    let mut session = connector.open().await?;
    let outcome = execute(&mut session, collector).await;
    session.close().await;
    outcome
}

fn report(name: &'static str, schedule: Schedule, outcome: &Outcome) {
    match outcome {
        Ok(rows) => debug!(collector = name, schedule = schedule.label(), rows, "collector succeeded"),
        // The statement text only helps when the database rejected or stalled on it.
        Err(err) if err.is_query_error() => warn!(
            collector = name,
            schedule = schedule.label(),
            kind = err.kind(),
            query = err.query().unwrap_or(""),
            error = %err,
            "collector query failed"
        ),
        Err(err) => warn!(
            collector = name,
            schedule = schedule.label(),
            kind = err.kind(),
            error = %err,
            "collector failed"
        ),
    }
}
