//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Focus/break durations and the XP awarded per cycle choice
//! - Reset gesture thresholds
//! - Companion cooldown, backoff and generation endpoint
//! - Sound feedback
//! - Update descriptor
//!
//! Configuration is stored at `~/.config/pomopal/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::companion::{RetryPolicy, SchedulerConfig};
use crate::error::{ConfigError, CoreError};
use crate::timer::{CyclePlan, HoldThresholds, CYCLE_LENGTH};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_focus_minutes")]
    pub focus_minutes: u32,
    #[serde(default = "default_short_break_minutes")]
    pub short_break_minutes: u32,
    #[serde(default = "default_cycle_length")]
    pub cycle_length: u32,
    #[serde(default = "default_long_choice_minutes")]
    pub long_choice_minutes: u32,
    #[serde(default = "default_short_choice_minutes")]
    pub short_choice_minutes: u32,
    #[serde(default = "default_long_choice_xp")]
    pub long_choice_xp: u32,
    #[serde(default = "default_short_choice_xp")]
    pub short_choice_xp: u32,
    #[serde(default = "default_focus_session_xp")]
    pub focus_session_xp: u32,
}

/// Press-and-hold reset gesture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetConfig {
    #[serde(default = "default_session_reset_max_ms")]
    pub session_reset_max_ms: u64,
    #[serde(default = "default_full_reset_hold_ms")]
    pub full_reset_hold_ms: u64,
    #[serde(default = "default_hold_hint_ms")]
    pub hold_hint_ms: u64,
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanionConfig {
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the credential. The
    /// profile's own key is used when the variable is unset.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundConfig {
    #[serde(default)]
    pub enabled: bool,
    /// 1..=4
    #[serde(default = "default_volume")]
    pub volume: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// URL of a `{"version": "..."}` descriptor. Empty disables the check.
    #[serde(default)]
    pub descriptor_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/pomopal/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub reset: ResetConfig,
    #[serde(default)]
    pub companion: CompanionConfig,
    #[serde(default)]
    pub sound: SoundConfig,
    #[serde(default)]
    pub update: UpdateConfig,
}

// Default functions
fn default_focus_minutes() -> u32 {
    25
}
fn default_short_break_minutes() -> u32 {
    5
}
fn default_cycle_length() -> u32 {
    CYCLE_LENGTH as u32
}
fn default_long_choice_minutes() -> u32 {
    30
}
fn default_short_choice_minutes() -> u32 {
    5
}
fn default_long_choice_xp() -> u32 {
    5
}
fn default_short_choice_xp() -> u32 {
    30
}
fn default_focus_session_xp() -> u32 {
    10
}
fn default_session_reset_max_ms() -> u64 {
    300
}
fn default_full_reset_hold_ms() -> u64 {
    2000
}
fn default_hold_hint_ms() -> u64 {
    1000
}
fn default_sample_interval_ms() -> u64 {
    16
}
fn default_cooldown_ms() -> u64 {
    20_000
}
fn default_base_delay_ms() -> u64 {
    15_000
}
fn default_max_delay_ms() -> u64 {
    120_000
}
fn default_cache_capacity() -> u32 {
    20
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_endpoint() -> String {
    "http://127.0.0.1:8787/v1/line".into()
}
fn default_model() -> String {
    "companion-small".into()
}
fn default_api_key_env() -> String {
    "POMOPAL_API_KEY".into()
}
fn default_volume() -> u8 {
    1
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            focus_minutes: default_focus_minutes(),
            short_break_minutes: default_short_break_minutes(),
            cycle_length: default_cycle_length(),
            long_choice_minutes: default_long_choice_minutes(),
            short_choice_minutes: default_short_choice_minutes(),
            long_choice_xp: default_long_choice_xp(),
            short_choice_xp: default_short_choice_xp(),
            focus_session_xp: default_focus_session_xp(),
        }
    }
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            session_reset_max_ms: default_session_reset_max_ms(),
            full_reset_hold_ms: default_full_reset_hold_ms(),
            hold_hint_ms: default_hold_hint_ms(),
            sample_interval_ms: default_sample_interval_ms(),
        }
    }
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            cache_capacity: default_cache_capacity(),
            request_timeout_secs: default_request_timeout_secs(),
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            volume: default_volume(),
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            descriptor_url: String::new(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timer: TimerConfig::default(),
            reset: ResetConfig::default(),
            companion: CompanionConfig::default(),
            sound: SoundConfig::default(),
            update: UpdateConfig::default(),
        }
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        if key.is_empty() {
            return Err(ConfigError::UnknownKey(String::new()));
        }
        let unknown = || ConfigError::UnknownKey(key.to_string());

        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|_| invalid(key, format!("cannot parse '{value}' as bool")))?,
                ),
                serde_json::Value::Number(_) => value
                    .parse::<u64>()
                    .map(|n| serde_json::Value::Number(n.into()))
                    .map_err(|_| invalid(key, format!("cannot parse '{value}' as number")))?,
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    return Err(invalid(key, "is a section, set one of its fields"));
                }
                _ => serde_json::Value::String(value.into()),
            };
            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    /// `config.toml` in the data directory.
    pub fn path() -> Result<PathBuf, CoreError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or
    /// fails validation, or if the default config cannot be written.
    pub fn load() -> Result<Self, CoreError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), CoreError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), CoreError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value in memory by dot-separated key and validate the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// or is out of range. `self` is unchanged on error.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| invalid(key, e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// [`Self::set_value`], then save.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        self.set_value(key, value)?;
        self.save()
    }

    /// Every leaf key in dot notation, sorted by section.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if let Ok(serde_json::Value::Object(sections)) = serde_json::to_value(self) {
            for (section, fields) in sections {
                if let serde_json::Value::Object(fields) = fields {
                    keys.extend(fields.keys().map(|field| format!("{section}.{field}")));
                }
            }
        }
        keys
    }

    /// # Errors
    ///
    /// Returns the first field that is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timer.cycle_length != CYCLE_LENGTH as u32 {
            return Err(invalid(
                "timer.cycle_length",
                format!("must be {CYCLE_LENGTH}"),
            ));
        }
        for (key, minutes) in [
            ("timer.focus_minutes", self.timer.focus_minutes),
            ("timer.short_break_minutes", self.timer.short_break_minutes),
            ("timer.long_choice_minutes", self.timer.long_choice_minutes),
            ("timer.short_choice_minutes", self.timer.short_choice_minutes),
        ] {
            if minutes == 0 || minutes > 24 * 60 {
                return Err(invalid(key, "must be between 1 and 1440 minutes"));
            }
        }
        if self.reset.session_reset_max_ms >= self.reset.full_reset_hold_ms {
            return Err(invalid(
                "reset.session_reset_max_ms",
                "must be shorter than reset.full_reset_hold_ms",
            ));
        }
        if self.reset.sample_interval_ms == 0 {
            return Err(invalid("reset.sample_interval_ms", "must be positive"));
        }
        if self.companion.base_delay_ms == 0 {
            return Err(invalid("companion.base_delay_ms", "must be positive"));
        }
        if self.companion.base_delay_ms > self.companion.max_delay_ms {
            return Err(invalid(
                "companion.max_delay_ms",
                "must not be below companion.base_delay_ms",
            ));
        }
        if self.companion.cache_capacity == 0 {
            return Err(invalid("companion.cache_capacity", "must be positive"));
        }
        if self.companion.request_timeout_secs == 0 {
            return Err(invalid("companion.request_timeout_secs", "must be positive"));
        }
        url::Url::parse(&self.companion.endpoint)
            .map_err(|e| invalid("companion.endpoint", e.to_string()))?;
        if !(1..=4).contains(&self.sound.volume) {
            return Err(invalid("sound.volume", "must be between 1 and 4"));
        }
        if !self.update.descriptor_url.is_empty() {
            url::Url::parse(&self.update.descriptor_url)
                .map_err(|e| invalid("update.descriptor_url", e.to_string()))?;
        }
        Ok(())
    }

    pub fn cycle_plan(&self) -> CyclePlan {
        CyclePlan {
            focus_secs: self.timer.focus_minutes * 60,
            short_break_secs: self.timer.short_break_minutes * 60,
            long_choice_secs: self.timer.long_choice_minutes * 60,
            short_choice_secs: self.timer.short_choice_minutes * 60,
            focus_session_xp: self.timer.focus_session_xp,
            long_choice_xp: self.timer.long_choice_xp,
            short_choice_xp: self.timer.short_choice_xp,
        }
    }

    pub fn hold_thresholds(&self) -> HoldThresholds {
        HoldThresholds {
            session_reset_max_ms: self.reset.session_reset_max_ms,
            full_reset_ms: self.reset.full_reset_hold_ms,
            hint_ms: self.reset.hold_hint_ms,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            cooldown_ms: self.companion.cooldown_ms,
            retry: RetryPolicy {
                base_delay_ms: self.companion.base_delay_ms,
                max_delay_ms: self.companion.max_delay_ms,
            },
            cache_capacity: self.companion.cache_capacity as usize,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.companion.request_timeout_secs)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.reset.sample_interval_ms)
    }

    /// Credential from `companion.api_key_env`, if set and non-empty.
    pub fn api_key_from_env(&self) -> Option<String> {
        if self.companion.api_key_env.is_empty() {
            return None;
        }
        std::env::var(&self.companion.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        parsed.validate().unwrap();
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[companion]\ncooldown_ms = 5000\n").unwrap();
        assert_eq!(parsed.companion.cooldown_ms, 5000);
        assert_eq!(parsed.companion.max_delay_ms, 120_000);
        assert_eq!(parsed.timer.focus_minutes, 25);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.focus_minutes").as_deref(), Some("25"));
        assert_eq!(cfg.get("sound.enabled").as_deref(), Some("false"));
        assert_eq!(cfg.get("companion.model").as_deref(), Some("companion-small"));
        assert_eq!(cfg.get("nope.nothing"), None);
        assert_eq!(cfg.get(""), None);
    }

    #[test]
    fn set_value_updates_nested_fields() {
        let mut cfg = Config::default();
        cfg.set_value("sound.enabled", "true").unwrap();
        cfg.set_value("sound.volume", "3").unwrap();
        cfg.set_value("companion.model", "bigger").unwrap();
        assert!(cfg.sound.enabled);
        assert_eq!(cfg.sound.volume, 3);
        assert_eq!(cfg.companion.model, "bigger");
    }

    #[test]
    fn set_value_rejects_unknown_key() {
        let mut cfg = Config::default();
        let err = cfg.set_value("timer.unknown", "1").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(_)));
        assert!(matches!(
            cfg.set_value("timer", "1"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn set_value_rejects_invalid_type_and_range() {
        let mut cfg = Config::default();
        assert!(cfg.set_value("sound.enabled", "maybe").is_err());
        assert!(cfg.set_value("sound.volume", "9").is_err());
        assert!(cfg.set_value("timer.cycle_length", "5").is_err());
        assert!(cfg.set_value("companion.endpoint", "not a url").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn keys_list_every_leaf() {
        let keys = Config::default().keys();
        assert!(keys.contains(&"reset.full_reset_hold_ms".to_string()));
        assert!(keys.contains(&"companion.api_key_env".to_string()));
        assert!(keys.iter().all(|k| Config::default().get(k).is_some()));
    }

    #[test]
    fn converters_follow_config() {
        let mut cfg = Config::default();
        cfg.set_value("timer.focus_minutes", "50").unwrap();
        cfg.set_value("companion.base_delay_ms", "1000").unwrap();
        let plan = cfg.cycle_plan();
        assert_eq!(plan.focus_secs, 3000);
        assert_eq!(plan.long_choice_secs, 1800);
        assert_eq!(plan.short_choice_xp, 30);
        assert_eq!(cfg.scheduler_config().retry.base_delay_ms, 1000);
        assert_eq!(cfg.hold_thresholds().full_reset_ms, 2000);
        assert_eq!(cfg.sample_interval(), Duration::from_millis(16));
    }

    #[test]
    fn load_from_writes_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg, Config::default());

        std::fs::write(&path, "[sound]\nvolume = 7\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
