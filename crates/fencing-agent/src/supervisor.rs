//! Fencing supervisor.
//!
//! Ties the watchdog lifecycle to the node marker and to the control-plane
//! health signal. Two axes make up the state:
//!
//! ```text
//!              ArmState × SupervisorMode
//!
//!  Startup ──start()──► Armed+Normal ◄──────────┐
//!                           │                   │ maintenance ends
//!                           │ maintenance       │ (start, mark)
//!                           ▼ (stop, unmark)    │
//!                      Disarmed+Maintenance ────┘
//!
//!  any ──cancel──► ShuttingDown (unmark, stop)
//! ```
//!
//! Ordering rules:
//! - arming: start the watchdog, then set the marker; if marking fails the
//!   watchdog is stopped again
//! - entering maintenance: stop the watchdog, then remove the marker
//! - shutdown: remove the marker, then stop the watchdog
//! - a watchdog that could not be stopped stays `Armed` and the stop is
//!   retried on every tick until the driver lets go of it
//!
//! The watchdog is fed only in `Normal` mode and only when the control plane
//! answered the probe for that tick. Starving it is the fencing action.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use fencing_watchdog::{WatchdogDriver, WatchdogMetrics, WatchdogStatus};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{AgentError, SupervisorError};
use crate::marker::NodeMarker;
use crate::prober::{HealthProber, HealthSample};

const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Whether the supervisor holds an armed watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArmState {
    /// No timer is running.
    #[default]
    Disarmed,
    /// The driver is started and must be fed.
    Armed,
}

/// Derived from consecutive maintenance observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorMode {
    /// Fencing is active.
    #[default]
    Normal,
    /// The node is deliberately disrupted and must not be fenced.
    Maintenance,
}

/// Lifecycle phase of the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Startup sequence not yet complete.
    #[default]
    Starting,
    /// Supervision loop running.
    Running,
    /// Shutdown sequence in progress.
    ShuttingDown,
    /// Shutdown sequence finished.
    Stopped,
}

/// Snapshot published after every state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SupervisorStatus {
    /// Lifecycle phase.
    pub phase: Phase,
    /// Watchdog axis.
    pub watchdog: ArmState,
    /// Maintenance axis.
    pub mode: SupervisorMode,
    /// Whether the marker is believed to be on the node.
    pub marked: bool,
    /// Outcome of the most recent probe.
    pub last_sample: Option<HealthSample>,
    /// Completed ticks.
    pub ticks: u64,
}

impl SupervisorStatus {
    /// Fencing is either active or deliberately suspended.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Running
            && (self.watchdog == ArmState::Armed || self.mode == SupervisorMode::Maintenance)
    }
}

/// Constructor settings for [`FencingSupervisor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorSettings {
    /// Period of the probe/feed loop. Also the retry interval for failed
    /// transitions.
    pub tick_interval: Duration,
    /// Annotation keys that signal maintenance.
    pub maintenance_annotations: Vec<String>,
}

/// The fencing state machine.
///
/// Exactly one supervisor drives a given driver and marker; nothing else
/// mutates them, so no locking is involved.
pub struct FencingSupervisor {
    driver: Box<dyn WatchdogDriver>,
    marker: Arc<dyn NodeMarker>,
    prober: HealthProber,
    tick_interval: Duration,
    status: watch::Sender<SupervisorStatus>,
}

impl std::fmt::Debug for FencingSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FencingSupervisor")
            .field("driver", &self.driver.kind())
            .field("node", &self.marker.node_name())
            .field("tick_interval", &self.tick_interval)
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

impl FencingSupervisor {
    /// Create a supervisor in the unarmed baseline state.
    #[must_use]
    pub fn new(
        driver: Box<dyn WatchdogDriver>,
        marker: Arc<dyn NodeMarker>,
        settings: SupervisorSettings,
    ) -> Self {
        let prober = HealthProber::new(Arc::clone(&marker), settings.maintenance_annotations);
        let (status, _) = watch::channel(SupervisorStatus::default());
        Self {
            driver,
            marker,
            prober,
            tick_interval: settings.tick_interval,
            status,
        }
    }

    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> SupervisorStatus {
        *self.status.borrow()
    }

    /// Receive status updates, e.g. for health endpoints.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SupervisorStatus> {
        self.status.subscribe()
    }

    /// Counters of the underlying driver.
    #[must_use]
    pub fn watchdog_metrics(&self) -> WatchdogMetrics {
        self.driver.metrics()
    }

    fn update(&self, f: impl FnOnce(&mut SupervisorStatus)) {
        self.status.send_modify(f);
    }

    /// Arm the watchdog and set the marker.
    ///
    /// # Errors
    ///
    /// Returns the driver error if the watchdog cannot be started, or the
    /// marker error if it cannot be set. In the latter case the watchdog has
    /// been stopped again before returning.
    pub async fn start(&mut self) -> Result<(), AgentError> {
        info!(node = %self.marker.node_name(), driver = %self.driver.kind(), "Starting fencing supervisor");
        self.arm().await?;
        self.update(|s| s.phase = Phase::Running);
        Ok(())
    }

    async fn arm(&mut self) -> Result<(), AgentError> {
        if self.status().watchdog == ArmState::Disarmed {
            self.driver.start()?;
            self.update(|s| s.watchdog = ArmState::Armed);
            info!(node = %self.marker.node_name(), "Watchdog armed");
        }

        if let Err(e) = self.marker.set_marker().await {
            error!(node = %self.marker.node_name(), error = %e, "Can't set node label, disarming watchdog");
            self.disarm();
            return Err(e);
        }
        self.update(|s| s.marked = true);
        Ok(())
    }

    /// Stop the driver. A failed stop still counts if the driver reports
    /// that it let go of the timer.
    fn disarm(&mut self) -> bool {
        match self.driver.stop() {
            Ok(()) => {
                self.update(|s| s.watchdog = ArmState::Disarmed);
                info!(node = %self.marker.node_name(), "Watchdog disarmed");
                true
            }
            Err(e) if self.driver.status() == WatchdogStatus::Disarmed => {
                warn!(node = %self.marker.node_name(), error = %e, "Watchdog stop reported an error, but the timer is released");
                self.update(|s| s.watchdog = ArmState::Disarmed);
                true
            }
            Err(e) => {
                error!(node = %self.marker.node_name(), error = %e, "Can't disarm watchdog");
                false
            }
        }
    }

    async fn unmark(&mut self) -> bool {
        match self.marker.remove_marker().await {
            Ok(()) => {
                self.update(|s| s.marked = false);
                true
            }
            Err(e) => {
                error!(node = %self.marker.node_name(), error = %e, "Can't remove node label");
                false
            }
        }
    }

    /// Run one iteration of the supervision loop.
    ///
    /// Returns `Break` if `cancel` fired while the tick was waiting on the
    /// control plane; the caller must then go straight to [`shutdown`].
    ///
    /// [`shutdown`]: Self::shutdown
    pub async fn tick(&mut self, cancel: &CancellationToken) -> ControlFlow<()> {
        let last_known_maintenance = self.status().mode == SupervisorMode::Maintenance;
        let sample = tokio::select! {
            () = cancel.cancelled() => return ControlFlow::Break(()),
            sample = self.prober.probe(last_known_maintenance) => sample,
        };
        self.update(|s| s.last_sample = Some(sample));

        let flow = match (self.status().mode, sample.in_maintenance) {
            (SupervisorMode::Normal, true) => {
                info!(node = %self.marker.node_name(), "Maintenance detected, suspending fencing");
                self.update(|s| s.mode = SupervisorMode::Maintenance);
                self.enter_maintenance(cancel).await
            }
            (SupervisorMode::Maintenance, true) => self.finish_maintenance_entry(cancel).await,
            (SupervisorMode::Maintenance, false) => self.leave_maintenance(cancel).await,
            (SupervisorMode::Normal, false) => ControlFlow::Continue(()),
        };
        if flow.is_break() {
            return flow;
        }

        let status = self.status();
        if status.mode == SupervisorMode::Normal && status.watchdog == ArmState::Armed {
            if sample.reachable {
                match self.driver.feed() {
                    Ok(()) => debug!("Feeding watchdog"),
                    Err(e) => error!(error = %e, "Failed to feed watchdog"),
                }
            } else {
                warn!(node = %self.marker.node_name(), "Skip feeding watchdog, API unreachable");
            }
        }

        self.update(|s| s.ticks = s.ticks.saturating_add(1));
        ControlFlow::Continue(())
    }

    async fn enter_maintenance(&mut self, cancel: &CancellationToken) -> ControlFlow<()> {
        if self.status().watchdog == ArmState::Armed && !self.disarm() {
            return ControlFlow::Continue(());
        }
        tokio::select! {
            () = cancel.cancelled() => ControlFlow::Break(()),
            _ = self.unmark() => ControlFlow::Continue(()),
        }
    }

    async fn finish_maintenance_entry(&mut self, cancel: &CancellationToken) -> ControlFlow<()> {
        let status = self.status();
        if status.watchdog == ArmState::Disarmed && !status.marked {
            return ControlFlow::Continue(());
        }
        debug!(node = %self.marker.node_name(), "Retrying maintenance entry");
        self.enter_maintenance(cancel).await
    }

    async fn leave_maintenance(&mut self, cancel: &CancellationToken) -> ControlFlow<()> {
        info!(node = %self.marker.node_name(), "Maintenance finished, re-arming fencing");
        let status = self.status();
        // Left over from a failed rollback; it went unfed through maintenance.
        if status.watchdog == ArmState::Armed && !status.marked && !self.disarm() {
            warn!(node = %self.marker.node_name(), "Can't stop stale watchdog, staying in maintenance mode");
            return ControlFlow::Continue(());
        }
        let armed = tokio::select! {
            () = cancel.cancelled() => return ControlFlow::Break(()),
            result = self.arm() => result,
        };
        match armed {
            Ok(()) => self.update(|s| s.mode = SupervisorMode::Normal),
            Err(e) => warn!(
                node = %self.marker.node_name(),
                error = %e,
                "Can't re-arm fencing, staying in maintenance mode"
            ),
        }
        ControlFlow::Continue(())
    }

    /// Remove the marker, then stop the watchdog.
    ///
    /// Both steps are always attempted, whatever the current mode.
    ///
    /// # Errors
    ///
    /// Returns the first failure. Every failure is also logged.
    pub async fn shutdown(&mut self) -> Result<(), AgentError> {
        info!(node = %self.marker.node_name(), "Shutting down fencing supervisor");
        self.update(|s| s.phase = Phase::ShuttingDown);

        let unmarked = self.marker.remove_marker().await;
        match &unmarked {
            Ok(()) => self.update(|s| s.marked = false),
            Err(e) => error!(node = %self.marker.node_name(), error = %e, "Can't remove node label"),
        }

        let stopped = self.driver.stop();
        match &stopped {
            Ok(()) => {
                self.update(|s| s.watchdog = ArmState::Disarmed);
                info!("Graceful termination of watchdog operation");
            }
            Err(e) => error!(error = %e, "Can't disarm watchdog"),
        }

        self.update(|s| s.phase = Phase::Stopped);
        unmarked?;
        stopped?;
        Ok(())
    }

    /// Start, supervise until `cancel` fires, then shut down.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Startup`] if fencing could not be armed and
    /// [`SupervisorError::Shutdown`] if the shutdown sequence failed.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), SupervisorError> {
        let started = tokio::select! {
            () = cancel.cancelled() => None,
            result = self.start() => Some(result),
        };

        match started {
            Some(Ok(())) => self.supervise(&cancel).await,
            Some(Err(e)) => return Err(SupervisorError::Startup(e)),
            None => info!("Cancelled during startup"),
        }

        self.shutdown().await.map_err(SupervisorError::Shutdown)
    }

    async fn supervise(&mut self, cancel: &CancellationToken) {
        let period = self.tick_interval.max(MIN_TICK_INTERVAL);
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if self.tick(cancel).await.is_break() {
                break;
            }
        }
        debug!("Supervision loop finished");
    }
}
