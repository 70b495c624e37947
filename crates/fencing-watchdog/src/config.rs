//! Configuration types for the simulated watchdog.

use std::time::Duration;

use crate::error::{WatchdogError, WatchdogResult};

/// Shortest countdown the simulated watchdog accepts.
pub const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Longest countdown the simulated watchdog accepts.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for [`SoftwareWatchdog`](crate::SoftwareWatchdog).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftwareWatchdogConfig {
    /// Time allowed between feeds before the countdown fires.
    ///
    /// Default: 60s, matching the softdog module default.
    pub timeout: Duration,
}

impl SoftwareWatchdogConfig {
    /// Create a new configuration with the specified timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if `timeout` is outside `MIN_TIMEOUT..=MAX_TIMEOUT`.
    pub fn new(timeout: Duration) -> WatchdogResult<Self> {
        let config = Self { timeout };
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> SoftwareWatchdogConfigBuilder {
        SoftwareWatchdogConfigBuilder::default()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> WatchdogResult<()> {
        if !(MIN_TIMEOUT..=MAX_TIMEOUT).contains(&self.timeout) {
            return Err(WatchdogError::invalid_configuration(format!(
                "timeout must be between {MIN_TIMEOUT:?} and {MAX_TIMEOUT:?}, got {:?}",
                self.timeout
            )));
        }
        Ok(())
    }
}

impl Default for SoftwareWatchdogConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
        }
    }
}

/// Builder for [`SoftwareWatchdogConfig`].
#[derive(Debug, Default)]
pub struct SoftwareWatchdogConfigBuilder {
    config: SoftwareWatchdogConfig,
}

impl SoftwareWatchdogConfigBuilder {
    /// Set the countdown timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> WatchdogResult<SoftwareWatchdogConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() -> WatchdogResult<()> {
        let config = SoftwareWatchdogConfig::default();
        config.validate()?;
        assert_eq!(config.timeout, Duration::from_secs(60));
        Ok(())
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = SoftwareWatchdogConfig::new(Duration::ZERO);
        assert!(matches!(
            result,
            Err(WatchdogError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_excessive_timeout_rejected() {
        let result = SoftwareWatchdogConfig::builder()
            .timeout(MAX_TIMEOUT + Duration::from_secs(1))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder() -> WatchdogResult<()> {
        let config = SoftwareWatchdogConfig::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        assert_eq!(config.timeout, Duration::from_secs(15));
        Ok(())
    }
}
