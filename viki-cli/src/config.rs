//! Configuration module
//!
//! Resolves where viki keeps its jobs, output, config file and log file,
//! plus the runner limits. Sources, lowest precedence first: built-in
//! defaults under the home directory, `<home>/config.json`, then command
//! line flags and environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use viki_runner::RunnerConfig;
use viki_runner::config::DEFAULT_MAX_OUTPUT_BYTES;

/// Name of the home directory created under the user's home
pub const HOME_DIR_NAME: &str = ".viki";

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const LOG_FILE_NAME: &str = "viki.log";

/// CLI configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Root of everything viki owns
    pub home_dir: PathBuf,

    /// Directory scanned for job files
    pub jobs_dir: PathBuf,

    /// Where run records are stored
    pub output_dir: PathBuf,

    pub config_file: PathBuf,

    pub log_file: PathBuf,

    /// Maximum time a job can run before it is killed
    pub job_timeout: Option<Duration>,

    /// Capture limit per output stream
    pub max_output_bytes: usize,

    /// Keep every run record instead of only the latest
    pub retain_history: bool,
}

/// On-disk form of `config.json`
///
/// Every field is optional; relative paths are taken relative to the home
/// directory.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub jobs_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub job_timeout_secs: Option<u64>,
    pub max_output_bytes: Option<usize>,
    pub retain_history: Option<bool>,
}

impl Config {
    /// Creates the default layout for a home directory
    pub fn for_home(home_dir: impl Into<PathBuf>) -> Self {
        let home_dir = home_dir.into();

        Self {
            jobs_dir: home_dir.join("jobs"),
            output_dir: home_dir.join("output"),
            config_file: home_dir.join(CONFIG_FILE_NAME),
            log_file: home_dir.join(LOG_FILE_NAME),
            home_dir,
            job_timeout: None,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            retain_history: false,
        }
    }

    /// `~/.viki`
    pub fn default_home() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine the user's home directory")?;
        Ok(home.join(HOME_DIR_NAME))
    }

    /// Loads configuration for `home` (or the default home)
    ///
    /// # Arguments
    /// * `home` - Home directory override from `--home` / `VIKI_HOME`
    /// * `timeout_secs` - Timeout override from `--timeout` / `VIKI_JOB_TIMEOUT`
    pub fn load(home: Option<PathBuf>, timeout_secs: Option<u64>) -> Result<Self> {
        let home = match home {
            Some(home) => home,
            None => Self::default_home()?,
        };

        let mut config = Self::for_home(home);

        if config.config_file.is_file() {
            let raw = std::fs::read_to_string(&config.config_file).with_context(|| {
                format!("Failed to read config file {}", config.config_file.display())
            })?;
            let file: ConfigFile = serde_json::from_str(&raw).with_context(|| {
                format!("Failed to parse config file {}", config.config_file.display())
            })?;
            config.apply_file(file);
        }

        if let Some(secs) = timeout_secs {
            config.job_timeout = Some(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }

    /// Overlays values from a parsed config file
    pub fn apply_file(&mut self, file: ConfigFile) {
        if let Some(dir) = file.jobs_dir {
            self.jobs_dir = self.under_home(dir);
        }
        if let Some(dir) = file.output_dir {
            self.output_dir = self.under_home(dir);
        }
        if let Some(path) = file.log_file {
            self.log_file = self.under_home(path);
        }
        if let Some(secs) = file.job_timeout_secs {
            self.job_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(max) = file.max_output_bytes {
            self.max_output_bytes = max;
        }
        if let Some(retain) = file.retain_history {
            self.retain_history = retain;
        }
    }

    fn under_home(&self, path: PathBuf) -> PathBuf {
        if path.is_absolute() {
            path
        } else {
            self.home_dir.join(path)
        }
    }

    /// The config file contents that reproduce this configuration
    pub fn to_file(&self) -> ConfigFile {
        ConfigFile {
            jobs_dir: Some(self.jobs_dir.clone()),
            output_dir: Some(self.output_dir.clone()),
            log_file: Some(self.log_file.clone()),
            job_timeout_secs: self.job_timeout.map(|t| t.as_secs()),
            max_output_bytes: Some(self.max_output_bytes),
            retain_history: Some(self.retain_history),
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        let runner = RunnerConfig::new().with_max_output_bytes(self.max_output_bytes);
        match self.job_timeout {
            Some(timeout) => runner.with_timeout(timeout),
            None => runner,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        for (label, path) in [
            ("home_dir", &self.home_dir),
            ("jobs_dir", &self.jobs_dir),
            ("output_dir", &self.output_dir),
            ("log_file", &self.log_file),
        ] {
            if path.as_os_str().is_empty() {
                anyhow::bail!("{} cannot be empty", label);
            }
        }

        if same_path(&self.jobs_dir, &self.output_dir) {
            anyhow::bail!("jobs_dir and output_dir must be different directories");
        }

        self.runner_config().validate()
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    a.components().eq(b.components())
}
