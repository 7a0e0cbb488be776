//! Logging settings section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};

/// Level names accepted by `env_logger` filters
pub const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ConfigSection for LoggingSettings {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![Validator::one_of(
            &self.level.as_str(),
            &LOG_LEVELS,
            "logging.level",
        )])
    }

    fn merge(&mut self, other: Self) {
        self.level = other.level;
    }

    fn section_name(&self) -> &'static str {
        "logging"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_level() {
        let settings = LoggingSettings {
            level: "verbose".to_string(),
        };
        assert!(settings.validate().is_err());
        assert!(LoggingSettings::default().validate().is_ok());
    }
}
