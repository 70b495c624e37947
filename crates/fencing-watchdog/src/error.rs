//! Error types for watchdog driver operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while driving a watchdog.
#[derive(Debug, Error)]
pub enum WatchdogError {
    /// The driver has not been started, or was stopped.
    #[error("Watchdog is not armed")]
    NotArmed,

    /// `start()` was called while the driver already holds its timer.
    #[error("Watchdog is already armed")]
    AlreadyArmed,

    /// The countdown expired before it was fed.
    #[error("Watchdog has fired")]
    Fired,

    /// The watchdog device does not exist.
    #[error("Watchdog device not found: {}", path.display())]
    DeviceNotFound {
        /// Device path.
        path: PathBuf,
    },

    /// The process may not open the watchdog device.
    #[error("Permission denied opening watchdog device: {}", path.display())]
    PermissionDenied {
        /// Device path.
        path: PathBuf,
    },

    /// The watchdog device is held open by another process.
    #[error("Watchdog device is busy: {}", path.display())]
    DeviceBusy {
        /// Device path.
        path: PathBuf,
    },

    /// Any other I/O failure talking to the device.
    #[error("Watchdog device I/O error on {}: {source}", path.display())]
    Io {
        /// Device path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The simulated watchdog needs a tokio runtime to run its countdown.
    #[error("No tokio runtime available for the software watchdog")]
    NoRuntime,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// State transition not allowed.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: &'static str,
        /// Attempted target state.
        to: &'static str,
    },
}

impl WatchdogError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create an invalid transition error.
    #[must_use]
    pub fn invalid_transition(from: &'static str, to: &'static str) -> Self {
        Self::InvalidTransition { from, to }
    }

    /// Classify an I/O error raised while opening or writing `path`.
    #[must_use]
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::NotFound => Self::DeviceNotFound { path },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            io::ErrorKind::ResourceBusy => Self::DeviceBusy { path },
            _ => Self::Io { path, source },
        }
    }
}

/// A specialized `Result` type for watchdog operations.
pub type WatchdogResult<T> = Result<T, WatchdogError>;
