//! Prelude for fencing-watchdog.
//!
//! This module re-exports the most commonly used types for convenient importing.
//!
//! # Example
//!
//! ```rust
//! use fencing_watchdog::prelude::*;
//!
//! let watchdog: Box<dyn WatchdogDriver> = Box::new(DeviceWatchdog::new("/dev/watchdog"));
//! assert_eq!(watchdog.kind(), DriverKind::Device);
//! assert_eq!(watchdog.status(), WatchdogStatus::Disarmed);
//! ```

pub use crate::config::{SoftwareWatchdogConfig, SoftwareWatchdogConfigBuilder};
pub use crate::device_impl::DeviceWatchdog;
pub use crate::error::{WatchdogError, WatchdogResult};
pub use crate::software_impl::SoftwareWatchdog;
pub use crate::state::{WatchdogMetrics, WatchdogState, WatchdogStatus};
pub use crate::watchdog::{DriverKind, WatchdogDriver};
