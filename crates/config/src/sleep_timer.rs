//! Sleep timer settings section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};

/// Sleep timer preferences
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SleepTimerSettings {
    /// Countdown length in minutes
    pub minutes: u32,

    /// A shake gesture restarts the countdown
    pub shake_to_reset: bool,

    /// Create a bookmark where the listener fell asleep
    pub bookmark_on_expiry: bool,

    /// Count down to the end of the current chapter instead of `minutes`
    pub end_of_chapter: bool,
}

impl Default for SleepTimerSettings {
    fn default() -> Self {
        Self {
            minutes: 20,
            shake_to_reset: true,
            bookmark_on_expiry: false,
            end_of_chapter: false,
        }
    }
}

impl ConfigSection for SleepTimerSettings {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![Validator::in_range(
            self.minutes,
            1,
            240,
            "sleep_timer.minutes",
        )])
    }

    fn merge(&mut self, other: Self) {
        *self = other;
    }

    fn section_name(&self) -> &'static str {
        "sleep_timer"
    }
}
