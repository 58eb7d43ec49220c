mod config;

pub use config::{CompanionConfig, Config, ResetConfig, SoundConfig, TimerConfig, UpdateConfig};

use std::path::PathBuf;

use crate::error::CoreError;

/// Returns `~/.config/pomopal[-dev]/` based on POMOPAL_ENV.
///
/// Set POMOPAL_ENV=dev to use the development data directory, or
/// POMOPAL_DATA_DIR to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, CoreError> {
    let dir = match std::env::var_os("POMOPAL_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("POMOPAL_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("pomopal-dev")
            } else {
                base_dir.join("pomopal")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
