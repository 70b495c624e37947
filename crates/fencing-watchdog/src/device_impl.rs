//! Kernel watchdog character device driver.
//!
//! Linux exposes hardware watchdogs and the `softdog` module as a character
//! device. Opening it starts the countdown, any write resets it, and writing
//! the magic character `V` right before closing disarms it. Closing without
//! the magic write leaves the countdown running (or, with `nowayout`, makes
//! the reboot unavoidable).

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{WatchdogError, WatchdogResult};
use crate::state::{WatchdogMetrics, WatchdogState, WatchdogStatus};
use crate::watchdog::{DriverKind, WatchdogDriver};

/// Byte written to reset the countdown.
pub const FEED_BYTE: &[u8] = b"1";

/// Magic byte written before close to disarm the countdown.
pub const MAGIC_CLOSE_BYTE: &[u8] = b"V";

/// Default watchdog device path.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/watchdog";

/// Watchdog backed by a kernel character device.
///
/// # Example
///
/// ```rust,no_run
/// use fencing_watchdog::{DeviceWatchdog, WatchdogDriver};
///
/// let mut watchdog = DeviceWatchdog::new("/dev/watchdog");
/// watchdog.start()?;
/// watchdog.feed()?;
/// watchdog.stop()?;
/// # Ok::<(), fencing_watchdog::WatchdogError>(())
/// ```
#[derive(Debug)]
pub struct DeviceWatchdog {
    path: PathBuf,
    file: Option<File>,
    state: WatchdogState,
}

impl DeviceWatchdog {
    /// Create a driver for the device at `path`. Nothing is opened yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            state: WatchdogState::new(),
        }
    }

    /// Device path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(file: &mut File, path: &Path, bytes: &[u8]) -> WatchdogResult<()> {
        file.write_all(bytes)
            .and_then(|()| file.flush())
            .map_err(|e| WatchdogError::from_io(path, e))
    }
}

impl Default for DeviceWatchdog {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE_PATH)
    }
}

impl WatchdogDriver for DeviceWatchdog {
    fn start(&mut self) -> WatchdogResult<()> {
        if self.file.is_some() {
            return Err(WatchdogError::AlreadyArmed);
        }

        let file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|e| WatchdogError::from_io(&self.path, e))?;
        self.state.arm()?;
        self.file = Some(file);

        info!(device = %self.path.display(), "Watchdog device opened");
        Ok(())
    }

    fn feed(&mut self) -> WatchdogResult<()> {
        let Some(file) = self.file.as_mut() else {
            return Err(WatchdogError::NotArmed);
        };
        Self::write(file, &self.path, FEED_BYTE)?;
        self.state.feed()?;

        debug!(device = %self.path.display(), "Fed watchdog device");
        Ok(())
    }

    fn stop(&mut self) -> WatchdogResult<()> {
        let Some(mut file) = self.file.take() else {
            self.state.disarm();
            return Ok(());
        };

        let result = Self::write(&mut file, &self.path, MAGIC_CLOSE_BYTE);
        drop(file);
        self.state.disarm();

        match &result {
            Ok(()) => info!(device = %self.path.display(), "Watchdog device disarmed"),
            Err(e) => warn!(
                device = %self.path.display(),
                error = %e,
                "Magic close failed, device closed without disarm"
            ),
        }
        result
    }

    fn status(&self) -> WatchdogStatus {
        self.state.status()
    }

    fn metrics(&self) -> WatchdogMetrics {
        self.state.metrics()
    }

    fn kind(&self) -> DriverKind {
        DriverKind::Device
    }
}
