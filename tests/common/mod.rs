#![allow(dead_code)]

//! In-memory stand-ins for a PostgreSQL target.
//!
//! `FakeConnector` answers each query from a per-SQL script and records every
//! session event, so tests can assert ordering and that sessions get closed.

use anyhow::{Result, anyhow};
use pgscrape_exporter::{
    collectors::{
        Collector, Schedule, SharedCollector, cycle::Orchestrator, error::ConnectError,
        registry::CollectorRegistry, up,
    },
    database::{BoxError, Connector, Row, Session},
};
use prometheus::{IntGauge, Opts, Registry};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::{sync::Notify, time::Instant};

pub const FAKE_TARGET: &str = "fake:5432/app";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Opened(usize),
    Query(usize, String),
    Closed(usize),
    Transform(&'static str),
}

/// How the fake answers one SQL string.
#[derive(Clone)]
pub enum Script {
    Rows(Vec<Row>),
    Fail(String),
    Hang,
    /// Waits for the notify, then returns the rows.
    Gate(Arc<Notify>, Vec<Row>),
    /// Never finishes on its own. The session stays busy after the caller
    /// gives up, until the server cancels it at the query's limit.
    Stuck,
}

#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        if let Ok(mut events) = self.0.lock() {
            events.push(event);
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn transforms(&self) -> Vec<&'static str> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Transform(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn queries(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Query(_, sql) => Some(sql),
                _ => None,
            })
            .collect()
    }

    pub fn opened(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Opened(_)))
            .count()
    }

    pub fn closed(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Closed(_)))
            .count()
    }
}

#[derive(Default)]
struct Inner {
    scripts: Mutex<HashMap<String, Script>>,
    connect_error: Mutex<Option<String>>,
    // Opens numbered at or above this fail.
    fail_open_from: Mutex<Option<usize>>,
    next_id: AtomicUsize,
    log: EventLog,
}

#[derive(Clone, Default)]
pub struct FakeConnector {
    inner: Arc<Inner>,
}

impl FakeConnector {
    /// A reachable target whose `up` query returns 1.
    pub fn healthy() -> Self {
        let connector = Self::default();
        connector.script(up::QUERY, Script::Rows(vec![Row::new().with("up", 1_i64)]));
        connector
    }

    pub fn log(&self) -> EventLog {
        self.inner.log.clone()
    }

    pub fn script(&self, sql: &str, script: Script) {
        if let Ok(mut scripts) = self.inner.scripts.lock() {
            scripts.insert(sql.to_string(), script);
        }
    }

    /// Every `open()` fails with `message`.
    pub fn refuse(&self, message: &str) {
        if let Ok(mut err) = self.inner.connect_error.lock() {
            *err = Some(message.to_string());
        }
    }

    pub fn accept(&self) {
        if let Ok(mut err) = self.inner.connect_error.lock() {
            *err = None;
        }
    }

    /// The first `n` opens succeed, later ones fail.
    pub fn fail_open_from(&self, n: usize) {
        if let Ok(mut from) = self.inner.fail_open_from.lock() {
            *from = Some(n);
        }
    }

    fn lookup(&self, sql: &str) -> Script {
        self.inner
            .scripts
            .lock()
            .ok()
            .and_then(|scripts| scripts.get(sql).cloned())
            .unwrap_or_else(|| Script::Fail(format!("no script for {sql}")))
    }
}

impl Connector for FakeConnector {
    type Session = FakeSession;

    async fn open(&self) -> Result<FakeSession, ConnectError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);

        let refused = self.inner.connect_error.lock().ok().and_then(|e| e.clone());
        if let Some(message) = refused {
            return Err(ConnectError::new(FAKE_TARGET, message));
        }

        let fail_from = self.inner.fail_open_from.lock().ok().and_then(|f| *f);
        if fail_from.is_some_and(|from| id >= from) {
            return Err(ConnectError::new(FAKE_TARGET, "too many connections"));
        }

        self.inner.log.push(Event::Opened(id));

        Ok(FakeSession {
            id,
            connector: self.clone(),
            busy_until: None,
        })
    }
}

pub struct FakeSession {
    id: usize,
    connector: FakeConnector,
    // Set while a `Stuck` statement still runs on the server.
    busy_until: Option<Instant>,
}

impl Session for FakeSession {
    async fn query(&mut self, sql: &str, limit: Duration) -> Result<Vec<Row>, BoxError> {
        // Like a real connection, wait for the previous statement to end.
        if let Some(until) = self.busy_until {
            tokio::time::sleep_until(until).await;
            self.busy_until = None;
        }

        self.connector
            .inner
            .log
            .push(Event::Query(self.id, sql.to_string()));

        match self.connector.lookup(sql) {
            Script::Rows(rows) => Ok(rows),
            Script::Fail(message) => Err(message.into()),
            Script::Hang => std::future::pending().await,
            Script::Gate(notify, rows) => {
                notify.notified().await;
                Ok(rows)
            }
            Script::Stuck => {
                let until = Instant::now() + limit;
                self.busy_until = Some(until);
                tokio::time::sleep_until(until).await;
                self.busy_until = None;
                Err("canceling statement due to statement timeout".into())
            }
        }
    }

    async fn close(self) {
        self.connector.inner.log.push(Event::Closed(self.id));
    }
}

#[derive(Clone, Copy, Debug)]
pub enum Behavior {
    Ok,
    Fail,
    Panic,
}

/// A collector that records its transform calls and publishes the row count.
pub struct TestCollector {
    name: &'static str,
    query: &'static str,
    schedule: Schedule,
    behavior: Behavior,
    rows: IntGauge,
    log: EventLog,
}

impl TestCollector {
    pub fn new(name: &'static str, query: &'static str, log: &EventLog) -> Self {
        let rows = IntGauge::with_opts(Opts::new(
            format!("test_{name}_rows"),
            format!("Rows seen by {name}"),
        ))
        .unwrap();

        Self {
            name,
            query,
            schedule: Schedule::Sync,
            behavior: Behavior::Ok,
            rows,
            log: log.clone(),
        }
    }

    pub fn asynchronous(mut self, timeout: Duration) -> Self {
        self.schedule = Schedule::Async { timeout };
        self
    }

    pub const fn behaving(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn shared(self) -> SharedCollector {
        Arc::new(self)
    }
}

impl Collector for TestCollector {
    fn name(&self) -> &'static str {
        self.name
    }

    fn query(&self) -> &'static str {
        self.query
    }

    fn schedule(&self) -> Schedule {
        self.schedule
    }

    fn register_metrics(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.rows.clone()))?;
        Ok(())
    }

    fn transform(&self, rows: &[Row]) -> Result<()> {
        self.log.push(Event::Transform(self.name));

        match self.behavior {
            Behavior::Ok => {
                self.rows.set(i64::try_from(rows.len())?);
                Ok(())
            }
            Behavior::Fail => Err(anyhow!("{} cannot read its rows", self.name)),
            Behavior::Panic => panic!("{} blew up", self.name),
        }
    }
}

pub fn one_row() -> Vec<Row> {
    vec![Row::new().with("value", 1_i64)]
}

pub fn orchestrator(
    connector: &FakeConnector,
    collectors: Vec<SharedCollector>,
) -> Orchestrator<FakeConnector> {
    let registry = CollectorRegistry::with_collectors(collectors).unwrap();
    Orchestrator::new(connector.clone(), registry)
}

/// Poll until `check` holds; gives detached tasks a chance to run.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
