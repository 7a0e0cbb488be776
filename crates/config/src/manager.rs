//! Settings manager - main API for settings operations

use crate::persistence::SettingsStore;
use crate::{ConfigError, ConfigResult, Settings};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const SETTINGS_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "LECTERN";

/// Loads, saves and updates the settings file
pub struct SettingsManager {
    store: SettingsStore,
    dir: PathBuf,
}

impl SettingsManager {
    /// Creates a manager for the platform settings directory
    ///
    /// - Linux: `~/.config/lectern/`
    /// - macOS: `~/Library/Application Support/lectern/`
    /// - Windows: `%APPDATA%\lectern\`
    pub fn new() -> ConfigResult<Self> {
        let dir = ProjectDirs::from("", "", "lectern")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| ConfigError::PathResolutionError {
                reason: "could not determine user config directory".to_string(),
            })?;
        Ok(Self::with_directory(dir))
    }

    /// Creates a manager for a custom directory
    pub fn with_directory(dir: PathBuf) -> Self {
        Self {
            store: SettingsStore::new(dir.join(SETTINGS_FILE)),
            dir,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn load(&self) -> ConfigResult<Settings> {
        self.store.load()
    }

    /// Loads the settings, falling back to defaults on any error
    pub fn load_or_default(&self) -> Settings {
        self.load().unwrap_or_else(|e| {
            log::warn!("Failed to load settings: {}, using defaults", e);
            Settings::default()
        })
    }

    pub fn save(&self, settings: &Settings) -> ConfigResult<()> {
        self.store.save(settings)
    }

    /// Loads, applies `update_fn` and saves
    pub fn update<F>(&self, update_fn: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Settings),
    {
        let mut settings = self.load()?;
        update_fn(&mut settings);
        self.save(&settings)
    }

    /// Writes a default settings file unless one exists
    ///
    /// Returns true if a file was created.
    pub fn initialize(&self) -> ConfigResult<bool> {
        if self.path().exists() {
            log::info!("Settings file already exists at {}", self.path().display());
            return Ok(false);
        }

        self.save(&Settings::default())?;
        Ok(true)
    }

    pub fn reset(&self) -> ConfigResult<()> {
        self.save(&Settings::default())
    }

    /// Loads the file and applies `LECTERN_<SECTION>_<FIELD>` environment
    /// overrides, e.g. `LECTERN_SLEEP_TIMER_MINUTES=30`
    pub fn load_with_env_overrides(&self) -> ConfigResult<Settings> {
        let mut settings = self.load()?;
        apply_overrides(&mut settings, |key| std::env::var(key).ok());

        if let Err(errors) = settings.validate() {
            log::warn!(
                "Settings validation warnings after env overrides: {:?}",
                errors
            );
        }

        Ok(settings)
    }
}

/// Applies overrides found through `lookup` to `settings`
pub(crate) fn apply_overrides<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let player = &mut settings.player;
    override_field(&lookup, "PLAYER_SEEK_TIME_SECS", &mut player.seek_time_secs);
    override_field(&lookup, "PLAYER_AUTO_REWIND_SECS", &mut player.auto_rewind_secs);
    override_field(&lookup, "PLAYER_MIN_SPEED", &mut player.min_speed);
    override_field(&lookup, "PLAYER_MAX_SPEED", &mut player.max_speed);
    override_field(
        &lookup,
        "PLAYER_MAX_LOUDNESS_GAIN_MB",
        &mut player.max_loudness_gain_mb,
    );
    override_field(&lookup, "PLAYER_RESUME_ON_REPLUG", &mut player.resume_on_replug);

    let timer = &mut settings.sleep_timer;
    override_field(&lookup, "SLEEP_TIMER_MINUTES", &mut timer.minutes);
    override_field(&lookup, "SLEEP_TIMER_SHAKE_TO_RESET", &mut timer.shake_to_reset);
    override_field(
        &lookup,
        "SLEEP_TIMER_BOOKMARK_ON_EXPIRY",
        &mut timer.bookmark_on_expiry,
    );
    override_field(&lookup, "SLEEP_TIMER_END_OF_CHAPTER", &mut timer.end_of_chapter);

    override_field(&lookup, "LOGGING_LEVEL", &mut settings.logging.level);
}

fn override_field<F, T>(lookup: &F, key: &str, field: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let name = format!("{}_{}", ENV_PREFIX, key);
    if let Some(raw) = lookup(&name) {
        match raw.parse::<T>() {
            Ok(value) => *field = value,
            Err(_) => log::warn!("Ignoring unparsable override {}={}", name, raw),
        }
    }
}
