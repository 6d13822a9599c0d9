use crate::constants::system;
use crate::error::{ForemanError, Result};
use serde::{Deserialize, Serialize};

/// Engine-wide configuration for the orchestration core.
///
/// Values are layered: compiled defaults, then an optional config file, then
/// environment variables prefixed with `FOREMAN_` (e.g. `FOREMAN_BATCH_SIZE`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForemanConfig {
    /// Bounded capacity of each job's command channel
    pub channel_capacity: usize,
    /// Maximum tasks pulled from a queue per manager cycle
    pub batch_size: usize,
    /// Maximum batches executing concurrently in the worker pool
    pub pool_concurrency: usize,
    /// Pending-queue bound above which the manager defers submission
    pub pool_pending_bound: usize,
    /// Ascending backoff delay sequence in seconds
    pub backoff_seconds: Vec<u64>,
    /// Event broadcast channel capacity
    pub event_capacity: usize,
    /// Manager pause between idle cycles, in milliseconds
    pub cycle_pause_ms: u64,
    /// Emit telemetry events from the manager loop
    pub telemetry_enabled: bool,
}

impl Default for ForemanConfig {
    fn default() -> Self {
        Self {
            channel_capacity: system::DEFAULT_CHANNEL_CAPACITY,
            batch_size: system::DEFAULT_BATCH_SIZE,
            pool_concurrency: system::DEFAULT_POOL_CONCURRENCY,
            pool_pending_bound: system::DEFAULT_POOL_PENDING_BOUND,
            backoff_seconds: system::DEFAULT_BACKOFF_SECONDS.to_vec(),
            event_capacity: system::DEFAULT_EVENT_CAPACITY,
            cycle_pause_ms: system::DEFAULT_CYCLE_PAUSE_MS,
            telemetry_enabled: true,
        }
    }
}

impl ForemanConfig {
    /// Load configuration from an optional file plus `FOREMAN_`-prefixed
    /// environment variables, layered over compiled defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let defaults = config::Config::try_from(&Self::default())
            .map_err(|e| ForemanError::ConfigurationError(e.to_string()))?;

        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("FOREMAN"))
            .build()
            .map_err(|e| ForemanError::ConfigurationError(e.to_string()))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| ForemanError::ConfigurationError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(ForemanError::ConfigurationError(
                "channel_capacity must be greater than 0".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ForemanError::ConfigurationError(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        if self.pool_concurrency == 0 {
            return Err(ForemanError::ConfigurationError(
                "pool_concurrency must be greater than 0".to_string(),
            ));
        }
        if self.backoff_seconds.is_empty() {
            return Err(ForemanError::ConfigurationError(
                "backoff_seconds must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ForemanConfig::default();
        assert_eq!(config.channel_capacity, 64);
        assert_eq!(config.backoff_seconds, vec![2, 4, 8, 16, 32, 64, 128, 256]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_without_file() {
        let config = ForemanConfig::load(None).unwrap();
        assert_eq!(config.batch_size, ForemanConfig::default().batch_size);
    }

    #[test]
    fn test_validation_rejects_zero_capacity() {
        let config = ForemanConfig {
            channel_capacity: 0,
            ..ForemanConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
