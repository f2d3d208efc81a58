//! Runner configuration
//!
//! Defines the knobs that bound a single job execution: an optional
//! maximum duration and the per-stream output capture limit.

use std::time::Duration;

/// Default cap on captured bytes per output stream (10 MiB)
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Runner configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Maximum time a job can run before it is killed.
    /// `None` lets jobs run for as long as they need.
    pub job_timeout: Option<Duration>,

    /// Maximum number of bytes kept per stream; the rest is read and dropped
    pub max_output_bytes: usize,
}

impl RunnerConfig {
    /// Creates a configuration with no timeout and the default output cap
    pub fn new() -> Self {
        Self {
            job_timeout: None,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    /// Sets the maximum job duration
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = Some(timeout);
        self
    }

    /// Sets the per-stream capture limit
    pub fn with_max_output_bytes(mut self, max_output_bytes: usize) -> Self {
        self.max_output_bytes = max_output_bytes;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(timeout) = self.job_timeout {
            if timeout.is_zero() {
                anyhow::bail!("job_timeout must be greater than 0");
            }
        }

        if self.max_output_bytes == 0 {
            anyhow::bail!("max_output_bytes must be greater than 0");
        }

        Ok(())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert_eq!(config.job_timeout, None);
        assert_eq!(config.max_output_bytes, DEFAULT_MAX_OUTPUT_BYTES);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = RunnerConfig::default().with_timeout(Duration::from_secs(30));
        assert!(config.validate().is_ok());

        config.job_timeout = Some(Duration::ZERO);
        assert!(config.validate().is_err());

        config.job_timeout = None;
        config.max_output_bytes = 0;
        assert!(config.validate().is_err());

        config = config.with_max_output_bytes(1024);
        assert!(config.validate().is_ok());
    }
}
