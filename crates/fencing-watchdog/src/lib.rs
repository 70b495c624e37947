//! # fencing-watchdog
//!
//! Watchdog drivers used by the node self-fencing agent.
//!
//! A watchdog reboots the host unless it is periodically fed. This crate
//! exposes that capability behind one small trait and two interchangeable
//! implementations:
//! - [`DeviceWatchdog`] talks to a kernel watchdog character device
//!   (`/dev/watchdog`, softdog or real hardware)
//! - [`SoftwareWatchdog`] is an in-process countdown that logs a firing event
//!   instead of rebooting, for tests and hardware-free environments
//!
//! ## State Machine
//!
//! ```text
//! Disarmed ──start()──► Armed ──timeout──► Fired
//!     ▲                  │  ▲                │
//!     │                  │  └─feed()         │
//!     ├────stop()────────┘                   │
//!     └────stop()────────────────────────────┘
//! ```
//!
//! `stop()` is idempotent: stopping a disarmed driver succeeds.
//!
//! ## Example
//!
//! ```rust
//! use fencing_watchdog::prelude::*;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), WatchdogError> {
//! let config = SoftwareWatchdogConfig::new(Duration::from_secs(30))?;
//! let mut watchdog = SoftwareWatchdog::new(config);
//!
//! watchdog.start()?;
//! watchdog.feed()?;
//! assert!(watchdog.is_armed());
//!
//! watchdog.stop()?;
//! watchdog.stop()?;
//! assert!(!watchdog.is_armed());
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs, missing_debug_implementations)]
#![warn(clippy::pedantic)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod device_impl;
pub mod error;
pub mod prelude;
pub mod software_impl;
pub mod state;
pub mod watchdog;

pub use config::{SoftwareWatchdogConfig, SoftwareWatchdogConfigBuilder};
pub use device_impl::DeviceWatchdog;
pub use error::{WatchdogError, WatchdogResult};
pub use software_impl::SoftwareWatchdog;
pub use state::{WatchdogMetrics, WatchdogState, WatchdogStatus};
pub use watchdog::{DriverKind, WatchdogDriver};
