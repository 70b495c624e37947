//! Watchdog driver trait definition.

use crate::error::WatchdogResult;
use crate::state::{WatchdogMetrics, WatchdogStatus};

/// Which implementation backs a [`WatchdogDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    /// Kernel watchdog character device.
    Device,
    /// In-process countdown that only logs when it fires.
    Software,
}

impl DriverKind {
    /// Get the kind as a string slice.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Software => "software",
        }
    }
}

impl core::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A timer that reboots the node unless it is fed.
///
/// Implementations are selected at construction time and driven by a single
/// owner. Calling `start()` twice without an intervening `stop()` is a caller
/// bug; implementations reject it with [`WatchdogError::AlreadyArmed`].
///
/// # State Machine
///
/// ```text
/// Disarmed ──start()──► Armed ──(no feed for timeout)──► Fired
///     ▲                   │                                │
///     └──────stop()───────┴────────────────────────────────┘
/// ```
///
/// [`WatchdogError::AlreadyArmed`]: crate::error::WatchdogError::AlreadyArmed
pub trait WatchdogDriver: Send + Sync {
    /// Acquire the timer and start the countdown.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The driver is already armed
    /// - The device is missing, busy, or not accessible
    fn start(&mut self) -> WatchdogResult<()>;

    /// Reset the countdown.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The driver was never started or has been stopped
    /// - The countdown already fired
    /// - Writing to the device failed
    fn feed(&mut self) -> WatchdogResult<()>;

    /// Gracefully disarm and release the timer.
    ///
    /// Idempotent: stopping a disarmed driver returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns an error if the disarm sequence failed. The timer resource is
    /// released regardless, so a second call succeeds.
    fn stop(&mut self) -> WatchdogResult<()>;

    /// Current status.
    fn status(&self) -> WatchdogStatus;

    /// Counter snapshot.
    fn metrics(&self) -> WatchdogMetrics;

    /// Which implementation this is.
    fn kind(&self) -> DriverKind;

    /// Check if the countdown is running.
    fn is_armed(&self) -> bool {
        self.status() == WatchdogStatus::Armed
    }
}
