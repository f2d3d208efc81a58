//! First-run bootstrap
//!
//! Creates the viki home directory, the jobs directory, the config file and
//! the log file. Each step reports whether it created something new; an
//! existing target is left untouched.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::warn;

use crate::config::Config;

/// Version reported by `viki version`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Checks that everything viki needs already exists
pub fn check_system_setup(config: &Config) -> bool {
    config.home_dir.is_dir()
        && config.jobs_dir.is_dir()
        && config.config_file.is_file()
        && config.log_file.is_file()
}

/// Creates the home directory; `false` if it exists or cannot be created
pub fn create_home_dir(config: &Config) -> bool {
    create_new_dir(&config.home_dir)
}

/// Creates the jobs directory; `false` if it exists or cannot be created
pub fn create_jobs_dir(config: &Config) -> bool {
    create_new_dir(&config.jobs_dir)
}

/// Writes a config file describing `config`; `false` if one already exists
pub fn generate_config_file(config: &Config) -> bool {
    let contents = match serde_json::to_string_pretty(&config.to_file()) {
        Ok(json) => json + "\n",
        Err(e) => {
            warn!("Failed to serialize config: {}", e);
            return false;
        }
    };

    create_new_file(&config.config_file, contents.as_bytes())
}

/// Creates an empty log file; `false` if it exists or cannot be created
pub fn generate_log_file(config: &Config) -> bool {
    create_new_file(&config.log_file, b"")
}

fn create_new_dir(path: &Path) -> bool {
    if path.exists() {
        return false;
    }

    match fs::create_dir_all(path) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to create directory {}: {}", path.display(), e);
            false
        }
    }
}

fn create_new_file(path: &Path, contents: &[u8]) -> bool {
    let file = OpenOptions::new().write(true).create_new(true).open(path);

    match file.and_then(|mut f| f.write_all(contents)) {
        Ok(()) => true,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::AlreadyExists {
                warn!("Failed to create {}: {}", path.display(), e);
            }
            false
        }
    }
}
