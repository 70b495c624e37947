//! Test doubles for the supervisor: a recording watchdog and a scripted node.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use fencing_agent::{AgentError, FencingSupervisor, NodeMarker, SupervisorSettings};
use fencing_watchdog::{
    DriverKind, SoftwareWatchdog, WatchdogDriver, WatchdogError, WatchdogMetrics, WatchdogResult,
    WatchdogStatus,
};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub const MAINTENANCE_KEY: &str = "update.node.deckhouse.io/disruption-approved";
pub const TICK: Duration = Duration::from_secs(5);
pub const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(30);

/// Externally visible side effect, recorded only when it succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Start,
    Feed,
    Stop,
    SetMarker,
    RemoveMarker,
}

/// Shared world: what happened, and what should fail next.
#[derive(Debug, Default)]
pub struct Cluster {
    events: Mutex<Vec<Event>>,
    attempts: Mutex<Vec<Event>>,
    label: AtomicBool,
    maintenance: AtomicBool,
    unreachable: AtomicBool,
    fail_start: AtomicBool,
    fail_feed: AtomicBool,
    fail_stop: AtomicBool,
    release_on_failed_stop: AtomicBool,
    fail_set: AtomicBool,
    fail_remove: AtomicBool,
}

impl Cluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    fn attempt(&self, event: Event) {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Successful side effects, drained.
    pub fn take_events(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Every call, successful or not, drained.
    pub fn take_attempts(&self) -> Vec<Event> {
        std::mem::take(&mut *self.attempts.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn label_present(&self) -> bool {
        self.label.load(Ordering::SeqCst)
    }

    /// Set the next probe outcome.
    pub fn observe(&self, reachable: bool, in_maintenance: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
        self.maintenance.store(in_maintenance, Ordering::SeqCst);
    }

    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn fail_feed(&self, fail: bool) {
        self.fail_feed.store(fail, Ordering::SeqCst);
    }

    pub fn fail_stop(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::SeqCst);
    }

    /// Make a failing stop still release the timer, like a device whose
    /// magic close write failed after the handle was dropped.
    pub fn release_on_failed_stop(&self, release: bool) {
        self.release_on_failed_stop.store(release, Ordering::SeqCst);
    }

    pub fn fail_set_marker(&self, fail: bool) {
        self.fail_set.store(fail, Ordering::SeqCst);
    }

    pub fn fail_remove_marker(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::SeqCst);
    }

    fn api_down(&self, operation: &'static str) -> AgentError {
        AgentError::Timeout {
            operation,
            after: Duration::from_secs(10),
        }
    }
}

/// Software watchdog that reports its calls to the [`Cluster`].
#[derive(Debug)]
pub struct RecordingDriver {
    inner: SoftwareWatchdog,
    cluster: Arc<Cluster>,
}

impl RecordingDriver {
    pub fn new(cluster: Arc<Cluster>) -> WatchdogResult<Self> {
        Ok(Self {
            inner: SoftwareWatchdog::with_timeout(WATCHDOG_TIMEOUT)?,
            cluster,
        })
    }

    fn injected(operation: &str) -> WatchdogError {
        WatchdogError::invalid_configuration(format!("injected {operation} failure"))
    }
}

impl WatchdogDriver for RecordingDriver {
    fn start(&mut self) -> WatchdogResult<()> {
        self.cluster.attempt(Event::Start);
        if self.cluster.fail_start.load(Ordering::SeqCst) {
            return Err(Self::injected("start"));
        }
        self.inner.start()?;
        self.cluster.record(Event::Start);
        Ok(())
    }

    fn feed(&mut self) -> WatchdogResult<()> {
        self.cluster.attempt(Event::Feed);
        if self.cluster.fail_feed.load(Ordering::SeqCst) {
            return Err(Self::injected("feed"));
        }
        self.inner.feed()?;
        self.cluster.record(Event::Feed);
        Ok(())
    }

    fn stop(&mut self) -> WatchdogResult<()> {
        self.cluster.attempt(Event::Stop);
        if self.cluster.fail_stop.load(Ordering::SeqCst) {
            if self.cluster.release_on_failed_stop.load(Ordering::SeqCst) {
                self.inner.stop()?;
            }
            return Err(Self::injected("stop"));
        }
        self.inner.stop()?;
        self.cluster.record(Event::Stop);
        Ok(())
    }

    fn status(&self) -> WatchdogStatus {
        self.inner.status()
    }

    fn metrics(&self) -> WatchdogMetrics {
        self.inner.metrics()
    }

    fn kind(&self) -> DriverKind {
        DriverKind::Software
    }
}

/// Node whose annotations and API availability are set by the test.
#[derive(Debug)]
pub struct ScriptedMarker {
    cluster: Arc<Cluster>,
}

impl ScriptedMarker {
    pub fn new(cluster: Arc<Cluster>) -> Self {
        Self { cluster }
    }
}

#[async_trait]
impl NodeMarker for ScriptedMarker {
    fn node_name(&self) -> &str {
        "worker-0"
    }

    async fn annotations(&self) -> Result<BTreeMap<String, String>, AgentError> {
        if self.cluster.unreachable.load(Ordering::SeqCst) {
            return Err(self.cluster.api_down("get node"));
        }
        let mut annotations = BTreeMap::new();
        if self.cluster.maintenance.load(Ordering::SeqCst) {
            annotations.insert(MAINTENANCE_KEY.to_owned(), String::new());
        }
        Ok(annotations)
    }

    async fn set_marker(&self) -> Result<(), AgentError> {
        self.cluster.attempt(Event::SetMarker);
        if self.cluster.fail_set.load(Ordering::SeqCst) {
            return Err(self.cluster.api_down("update node"));
        }
        self.cluster.label.store(true, Ordering::SeqCst);
        self.cluster.record(Event::SetMarker);
        Ok(())
    }

    async fn remove_marker(&self) -> Result<(), AgentError> {
        self.cluster.attempt(Event::RemoveMarker);
        if self.cluster.fail_remove.load(Ordering::SeqCst) {
            return Err(self.cluster.api_down("update node"));
        }
        self.cluster.label.store(false, Ordering::SeqCst);
        self.cluster.record(Event::RemoveMarker);
        Ok(())
    }
}

pub fn settings() -> SupervisorSettings {
    SupervisorSettings {
        tick_interval: TICK,
        maintenance_annotations: vec![MAINTENANCE_KEY.to_owned()],
    }
}

/// A supervisor wired to fresh fakes that all report into the returned
/// [`Cluster`]. The control plane starts out reachable and healthy.
pub fn harness() -> Result<(FencingSupervisor, Arc<Cluster>), WatchdogError> {
    let cluster = Cluster::new();
    let driver = RecordingDriver::new(Arc::clone(&cluster))?;
    let marker = Arc::new(ScriptedMarker::new(Arc::clone(&cluster)));
    let supervisor = FencingSupervisor::new(Box::new(driver), marker, settings());
    Ok((supervisor, cluster))
}
