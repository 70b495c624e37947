//! Agent configuration.
//!
//! Every setting can be given as a command-line flag or through the
//! environment variable named next to it. Durations use humantime syntax
//! (`5s`, `1m30s`).

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use fencing_watchdog::{
    DeviceWatchdog, SoftwareWatchdog, SoftwareWatchdogConfig, WatchdogDriver, WatchdogError,
    device_impl::DEFAULT_DEVICE_PATH,
};
use thiserror::Error;

use crate::marker::{DEFAULT_MARKER_KEY, DEFAULT_MARKER_VALUE, MarkerLabel};
use crate::prober::DEFAULT_MAINTENANCE_ANNOTATIONS;
use crate::supervisor::SupervisorSettings;

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `NODE_NAME` is empty.
    #[error("Node name must not be empty")]
    EmptyNodeName,

    /// An interval is zero.
    #[error("{name} must be greater than zero")]
    ZeroInterval {
        /// Setting name.
        name: &'static str,
    },

    /// The marker label key is empty.
    #[error("Fencing node label must not be empty")]
    EmptyLabelKey,

    /// The software watchdog would fire before the first feed.
    #[error("Software watchdog timeout {timeout:?} must exceed the tick interval {tick:?}")]
    SoftwareTimeoutTooShort {
        /// Configured timeout.
        timeout: Duration,
        /// Effective tick interval.
        tick: Duration,
    },

    /// The health probe address cannot be parsed.
    #[error("Invalid bind address {address:?}: {reason}")]
    InvalidBindAddress {
        /// Raw value.
        address: String,
        /// Parser message.
        reason: String,
    },

    /// Watchdog settings out of range.
    #[error(transparent)]
    Watchdog(#[from] WatchdogError),
}

/// Which watchdog implementation to arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DriverSelection {
    /// Kernel watchdog character device.
    Device,
    /// In-process timer that only logs when it fires.
    Software,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// Human-readable text.
    Text,
}

/// Node self-fencing agent.
#[derive(Debug, Clone, Parser)]
#[command(name = "fencing-agent")]
#[command(version)]
#[command(about = "Arms a watchdog and keeps feeding it while the Kubernetes API confirms the node is healthy")]
pub struct AgentConfig {
    /// Path of the kernel watchdog device
    #[arg(long, env = "WATCHDOG_DEVICE", default_value = DEFAULT_DEVICE_PATH)]
    pub watchdog_device: PathBuf,

    /// Watchdog implementation
    #[arg(long, env = "WATCHDOG_DRIVER", value_enum, default_value = "device")]
    pub watchdog_driver: DriverSelection,

    /// Timeout of the software watchdog
    #[arg(long, env = "SOFTWARE_WATCHDOG_TIMEOUT", value_parser = humantime::parse_duration, default_value = "60s")]
    pub software_watchdog_timeout: Duration,

    /// How often the watchdog is fed
    #[arg(long, env = "WATCHDOG_FEED_INTERVAL", value_parser = humantime::parse_duration, default_value = "5s")]
    pub watchdog_feed_interval: Duration,

    /// How often the Kubernetes API is checked
    #[arg(long, env = "KUBERNETES_API_CHECK_INTERVAL", value_parser = humantime::parse_duration, default_value = "5s")]
    pub kubernetes_api_check_interval: Duration,

    /// Upper bound for a single Kubernetes API call
    #[arg(long, env = "KUBERNETES_API_TIMEOUT", value_parser = humantime::parse_duration, default_value = "10s")]
    pub kubernetes_api_timeout: Duration,

    /// Address of the health probe server
    #[arg(long, env = "HEALTH_PROBE_BIND_ADDRESS", value_parser = parse_bind_address, default_value = ":8081")]
    pub health_probe_bind_address: SocketAddr,

    /// Name of the node this agent runs on
    #[arg(long, env = "NODE_NAME")]
    pub node_name: String,

    /// Marker label key
    #[arg(long, env = "FENCING_NODE_LABEL", default_value = DEFAULT_MARKER_KEY)]
    pub fencing_node_label: String,

    /// Marker label value
    #[arg(long, env = "FENCING_NODE_LABEL_VALUE", default_value = DEFAULT_MARKER_VALUE)]
    pub fencing_node_label_value: String,

    /// Annotation keys that put the node into maintenance mode
    #[arg(
        long,
        env = "MAINTENANCE_ANNOTATIONS",
        value_delimiter = ',',
        default_values_t = default_maintenance_annotations()
    )]
    pub maintenance_annotations: Vec<String>,

    /// Log level or filter directive (overridden by RUST_LOG)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "json")]
    pub log_format: LogFormat,
}

fn default_maintenance_annotations() -> Vec<String> {
    DEFAULT_MAINTENANCE_ANNOTATIONS
        .iter()
        .map(|key| (*key).to_owned())
        .collect()
}

/// Parse a listen address. A bare `:port` binds all interfaces.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidBindAddress`] if `raw` is neither
/// `host:port` nor `:port`.
pub fn parse_bind_address(raw: &str) -> Result<SocketAddr, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidBindAddress {
        address: raw.to_owned(),
        reason,
    };
    match raw.strip_prefix(':') {
        Some(port) => port
            .parse::<u16>()
            .map(|port| SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))
            .map_err(|e| invalid(e.to_string())),
        None => raw.parse().map_err(|e: std::net::AddrParseError| invalid(e.to_string())),
    }
}

impl AgentConfig {
    /// Period of the supervision loop: the shorter of the feed and check
    /// intervals, so neither is ever exceeded.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        self.watchdog_feed_interval
            .min(self.kubernetes_api_check_interval)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_name.trim().is_empty() {
            return Err(ConfigError::EmptyNodeName);
        }
        for (name, value) in [
            ("WATCHDOG_FEED_INTERVAL", self.watchdog_feed_interval),
            ("KUBERNETES_API_CHECK_INTERVAL", self.kubernetes_api_check_interval),
            ("KUBERNETES_API_TIMEOUT", self.kubernetes_api_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroInterval { name });
            }
        }
        if self.fencing_node_label.trim().is_empty() {
            return Err(ConfigError::EmptyLabelKey);
        }
        if self.watchdog_driver == DriverSelection::Software {
            SoftwareWatchdogConfig::new(self.software_watchdog_timeout)?;
            let tick = self.tick_interval();
            if self.software_watchdog_timeout <= tick {
                return Err(ConfigError::SoftwareTimeoutTooShort {
                    timeout: self.software_watchdog_timeout,
                    tick,
                });
            }
        }
        Ok(())
    }

    /// Marker label from the configured key and value.
    #[must_use]
    pub fn marker_label(&self) -> MarkerLabel {
        MarkerLabel::new(&self.fencing_node_label, &self.fencing_node_label_value)
    }

    /// Supervisor settings derived from this configuration.
    #[must_use]
    pub fn supervisor_settings(&self) -> SupervisorSettings {
        SupervisorSettings {
            tick_interval: self.tick_interval(),
            maintenance_annotations: self
                .maintenance_annotations
                .iter()
                .map(|key| key.trim())
                .filter(|key| !key.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }

    /// Instantiate the selected watchdog driver, unarmed.
    ///
    /// # Errors
    ///
    /// Returns an error if the software watchdog timeout is out of range.
    pub fn build_driver(&self) -> Result<Box<dyn WatchdogDriver>, ConfigError> {
        Ok(match self.watchdog_driver {
            DriverSelection::Device => Box::new(DeviceWatchdog::new(self.watchdog_device.clone())),
            DriverSelection::Software => Box::new(SoftwareWatchdog::with_timeout(
                self.software_watchdog_timeout,
            )?),
        })
    }
}
