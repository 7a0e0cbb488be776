//! Lectern settings
//!
//! A single TOML file split into sections. Each section implements
//! [`ConfigSection`], so adding a section means adding a field to
//! [`Settings`] and nothing else.
//!
//! - Missing file: defaults
//! - Empty or unparsable file: an error, never silently replaced
//! - Saves are validated first and written atomically
//!
//! ```rust,no_run
//! use lectern_config::SettingsManager;
//!
//! let manager = SettingsManager::new().expect("settings directory");
//! let settings = manager.load_or_default();
//! println!("Skip distance: {}s", settings.player.seek_time_secs);
//! ```

mod error;
mod logging;
mod manager;
mod persistence;
mod player;
mod sleep_timer;
mod validation;

pub use error::{ConfigError, ConfigResult, ValidationError};
pub use logging::{LoggingSettings, LOG_LEVELS};
pub use manager::SettingsManager;
pub use player::PlayerSettings;
pub use sleep_timer::SleepTimerSettings;
pub use validation::{ConfigSection, Validator};

use serde::{Deserialize, Serialize};

/// Current settings file format version
pub const SETTINGS_VERSION: u32 = 1;

/// Root of the settings file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub version: u32,
    pub player: PlayerSettings,
    pub sleep_timer: SleepTimerSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Validates every section, returning all errors found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(mut e) = self.player.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.sleep_timer.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.logging.validate() {
            errors.append(&mut e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Merges `other` into this settings tree, `other` takes precedence
    pub fn merge(&mut self, other: Settings) {
        self.player.merge(other.player);
        self.sleep_timer.merge(other.sleep_timer);
        self.logging.merge(other.logging);
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            player: PlayerSettings::default(),
            sleep_timer: SleepTimerSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.version, SETTINGS_VERSION);
    }

    #[test]
    fn test_errors_collected_across_sections() {
        let mut settings = Settings::default();
        settings.player.seek_time_secs = 0;
        settings.sleep_timer.minutes = 0;
        settings.logging.level = "chatty".to_string();

        assert_eq!(settings.validate().unwrap_err().len(), 3);
    }

    #[test]
    fn test_merge() {
        let mut base = Settings::default();
        let mut other = Settings::default();
        other.sleep_timer.minutes = 45;
        other.player.resume_on_replug = false;

        base.merge(other);
        assert_eq!(base.sleep_timer.minutes, 45);
        assert!(!base.player.resume_on_replug);
    }

    #[test]
    fn test_partial_file_uses_section_defaults() {
        let settings: Settings = toml::from_str("[sleep_timer]\nminutes = 5\n").unwrap();
        assert_eq!(settings.sleep_timer.minutes, 5);
        assert!(settings.sleep_timer.shake_to_reset);
        assert_eq!(settings.player, PlayerSettings::default());
    }
}
