//! Software watchdog implementation.
//!
//! `SoftwareWatchdog` runs the countdown as a tokio task. When it expires the
//! task logs a firing event and moves the state to `Fired` instead of
//! rebooting, which makes fencing behaviour observable in tests.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{Instrument, Span, debug, error, info};

use crate::config::SoftwareWatchdogConfig;
use crate::error::{WatchdogError, WatchdogResult};
use crate::state::{WatchdogMetrics, WatchdogState, WatchdogStatus};
use crate::watchdog::{DriverKind, WatchdogDriver};

/// In-process countdown with watchdog semantics.
///
/// `start()` must be called from within a tokio runtime.
///
/// # Example
///
/// ```rust
/// use fencing_watchdog::prelude::*;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), WatchdogError> {
/// let mut watchdog = SoftwareWatchdog::with_default_timeout();
/// watchdog.start()?;
/// watchdog.feed()?;
/// assert_eq!(watchdog.metrics().feed_count, 1);
/// watchdog.stop()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SoftwareWatchdog {
    config: SoftwareWatchdogConfig,
    state: Arc<WatchdogState>,
    deadline: Option<watch::Sender<Instant>>,
    countdown: Option<JoinHandle<()>>,
}

impl SoftwareWatchdog {
    /// Create a new software watchdog with the specified configuration.
    #[must_use]
    pub fn new(config: SoftwareWatchdogConfig) -> Self {
        Self {
            config,
            state: Arc::new(WatchdogState::new()),
            deadline: None,
            countdown: None,
        }
    }

    /// Create a new software watchdog with a custom timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout is outside the valid range.
    pub fn with_timeout(timeout: Duration) -> WatchdogResult<Self> {
        Ok(Self::new(SoftwareWatchdogConfig::new(timeout)?))
    }

    /// Create a new software watchdog with the default 60s timeout.
    #[must_use]
    pub fn with_default_timeout() -> Self {
        Self::new(SoftwareWatchdogConfig::default())
    }

    /// Countdown length.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Number of times the countdown expired.
    #[must_use]
    pub fn fire_count(&self) -> u64 {
        self.state.metrics().fire_count
    }

    fn cancel_countdown(&mut self) {
        self.deadline = None;
        if let Some(task) = self.countdown.take() {
            task.abort();
        }
    }
}

async fn countdown(
    mut deadline: watch::Receiver<Instant>,
    state: Arc<WatchdogState>,
    timeout: Duration,
) {
    loop {
        let expires_at = *deadline.borrow_and_update();
        tokio::select! {
            () = time::sleep_until(expires_at) => {
                if state.fire() {
                    error!(?timeout, "Software watchdog fired, node would be rebooted");
                }
                return;
            }
            changed = deadline.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
    }
}

impl WatchdogDriver for SoftwareWatchdog {
    fn start(&mut self) -> WatchdogResult<()> {
        let Ok(runtime) = Handle::try_current() else {
            return Err(WatchdogError::NoRuntime);
        };
        self.state.arm()?;

        let timeout = self.config.timeout;
        let (tx, rx) = watch::channel(Instant::now() + timeout);
        let task = countdown(rx, Arc::clone(&self.state), timeout).instrument(Span::current());
        self.countdown = Some(runtime.spawn(task));
        self.deadline = Some(tx);

        info!(?timeout, "Software watchdog armed");
        Ok(())
    }

    fn feed(&mut self) -> WatchdogResult<()> {
        self.state.feed()?;
        if let Some(deadline) = &self.deadline {
            deadline.send_replace(Instant::now() + self.config.timeout);
        }
        debug!("Fed software watchdog");
        Ok(())
    }

    fn stop(&mut self) -> WatchdogResult<()> {
        self.cancel_countdown();
        let previous = self.state.disarm();
        if previous != WatchdogStatus::Disarmed {
            info!(%previous, "Software watchdog disarmed");
        }
        Ok(())
    }

    fn status(&self) -> WatchdogStatus {
        self.state.status()
    }

    fn metrics(&self) -> WatchdogMetrics {
        self.state.metrics()
    }

    fn kind(&self) -> DriverKind {
        DriverKind::Software
    }
}

impl Default for SoftwareWatchdog {
    fn default() -> Self {
        Self::with_default_timeout()
    }
}

impl Drop for SoftwareWatchdog {
    fn drop(&mut self) {
        self.cancel_countdown();
    }
}
