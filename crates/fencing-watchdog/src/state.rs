//! Watchdog state machine and metrics.
//!
//! Transitions are lock-free so the simulated countdown task and the owning
//! driver can both observe and move the state.

use portable_atomic::{AtomicU32, AtomicU64, Ordering};

use crate::error::{WatchdogError, WatchdogResult};

/// Watchdog operational status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum WatchdogStatus {
    /// No timer is held. Nothing will fire.
    #[default]
    Disarmed = 0,
    /// The timer is running and must be fed before it expires.
    Armed = 1,
    /// The timer expired. For a real device this is a reboot.
    Fired = 2,
}

impl WatchdogStatus {
    /// Convert from raw u32 value.
    #[must_use]
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Disarmed),
            1 => Some(Self::Armed),
            2 => Some(Self::Fired),
            _ => None,
        }
    }

    /// Convert to raw u32 value.
    #[must_use]
    pub fn to_raw(self) -> u32 {
        self as u32
    }

    /// Get the status as a string slice.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disarmed => "Disarmed",
            Self::Armed => "Armed",
            Self::Fired => "Fired",
        }
    }
}

impl core::fmt::Display for WatchdogStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic watchdog state shared between a driver and its timer.
///
/// ```text
/// Disarmed ──arm()──► Armed ──fire()──► Fired
///     ▲                 │                 │
///     └────disarm()─────┴─────────────────┘
/// ```
#[derive(Debug, Default)]
pub struct WatchdogState {
    status: AtomicU32,
    start_count: AtomicU64,
    feed_count: AtomicU64,
    stop_count: AtomicU64,
    fire_count: AtomicU64,
}

impl WatchdogState {
    /// Create a new state in the `Disarmed` status.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current status.
    #[must_use]
    pub fn status(&self) -> WatchdogStatus {
        let raw = self.status.load(Ordering::Acquire);
        WatchdogStatus::from_raw(raw).unwrap_or_default()
    }

    /// Transition from `Disarmed` to `Armed`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchdogError::AlreadyArmed`] if armed, or an invalid
    /// transition error if the timer has fired and was not stopped.
    pub fn arm(&self) -> WatchdogResult<()> {
        match self.status.compare_exchange(
            WatchdogStatus::Disarmed.to_raw(),
            WatchdogStatus::Armed.to_raw(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                self.start_count.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(current) if current == WatchdogStatus::Armed.to_raw() => {
                Err(WatchdogError::AlreadyArmed)
            }
            Err(current) => Err(WatchdogError::invalid_transition(
                WatchdogStatus::from_raw(current)
                    .unwrap_or_default()
                    .as_str(),
                "Armed",
            )),
        }
    }

    /// Record a feed. Only valid while `Armed`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchdogError::NotArmed`] or [`WatchdogError::Fired`].
    pub fn feed(&self) -> WatchdogResult<()> {
        match self.status() {
            WatchdogStatus::Armed => {
                self.feed_count.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            WatchdogStatus::Disarmed => Err(WatchdogError::NotArmed),
            WatchdogStatus::Fired => Err(WatchdogError::Fired),
        }
    }

    /// Transition from `Armed` to `Fired`.
    ///
    /// Returns `false` if the watchdog was not armed, so a stop racing the
    /// countdown never records a firing.
    pub fn fire(&self) -> bool {
        let fired = self
            .status
            .compare_exchange(
                WatchdogStatus::Armed.to_raw(),
                WatchdogStatus::Fired.to_raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if fired {
            self.fire_count.fetch_add(1, Ordering::Relaxed);
        }
        fired
    }

    /// Move to `Disarmed` from any status and return the previous one.
    pub fn disarm(&self) -> WatchdogStatus {
        let previous = self
            .status
            .swap(WatchdogStatus::Disarmed.to_raw(), Ordering::AcqRel);
        let previous = WatchdogStatus::from_raw(previous).unwrap_or_default();
        if previous != WatchdogStatus::Disarmed {
            self.stop_count.fetch_add(1, Ordering::Relaxed);
        }
        previous
    }

    /// Snapshot the counters.
    #[must_use]
    pub fn metrics(&self) -> WatchdogMetrics {
        WatchdogMetrics {
            start_count: self.start_count.load(Ordering::Relaxed),
            feed_count: self.feed_count.load(Ordering::Relaxed),
            stop_count: self.stop_count.load(Ordering::Relaxed),
            fire_count: self.fire_count.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time watchdog counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WatchdogMetrics {
    /// Successful `start()` calls.
    pub start_count: u64,
    /// Successful `feed()` calls.
    pub feed_count: u64,
    /// `stop()` calls that actually disarmed something.
    pub stop_count: u64,
    /// Times the countdown expired.
    pub fire_count: u64,
}
