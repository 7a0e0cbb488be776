//! Player settings section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};

/// Transport behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerSettings {
    /// Distance of a skip forward/backward in seconds
    pub seek_time_secs: u64,

    /// Rewind applied when pausing with rewind, in seconds (0 disables)
    pub auto_rewind_secs: u64,

    /// Lowest speed a book may be played at
    pub min_speed: f32,

    /// Highest speed a book may be played at
    pub max_speed: f32,

    /// Upper bound for the loudness enhancement, in millibels
    pub max_loudness_gain_mb: u32,

    /// Resume when the headset is plugged back in after unplugging paused playback
    pub resume_on_replug: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            seek_time_secs: 20,
            auto_rewind_secs: 2,
            min_speed: 0.5,
            max_speed: 2.0,
            max_loudness_gain_mb: 900,
            resume_on_replug: true,
        }
    }
}

impl PlayerSettings {
    pub const MIN_SEEK_TIME_SECS: u64 = 1;
    pub const MAX_SEEK_TIME_SECS: u64 = 120;
    pub const MAX_AUTO_REWIND_SECS: u64 = 60;
    pub const MAX_LOUDNESS_GAIN_MB: u32 = 2000;
}

impl ConfigSection for PlayerSettings {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::in_range(
                self.seek_time_secs,
                Self::MIN_SEEK_TIME_SECS,
                Self::MAX_SEEK_TIME_SECS,
                "player.seek_time_secs",
            ),
            Validator::in_range(
                self.auto_rewind_secs,
                0,
                Self::MAX_AUTO_REWIND_SECS,
                "player.auto_rewind_secs",
            ),
            Validator::in_range(self.min_speed, 0.25, 4.0, "player.min_speed"),
            Validator::in_range(self.max_speed, 0.25, 4.0, "player.max_speed"),
            Validator::ordered(self.min_speed, self.max_speed, "player.min_speed"),
            Validator::in_range(
                self.max_loudness_gain_mb,
                0,
                Self::MAX_LOUDNESS_GAIN_MB,
                "player.max_loudness_gain_mb",
            ),
        ])
    }

    fn merge(&mut self, other: Self) {
        *self = other;
    }

    fn section_name(&self) -> &'static str {
        "player"
    }
}
