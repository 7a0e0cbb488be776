//! Reading and writing the settings file
//!
//! Writes go to a temporary file in the target directory which is then
//! persisted over the settings file, so a crash never leaves a half-written
//! file behind.

use crate::{ConfigError, ConfigResult, Settings};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub(crate) struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the settings file, defaults if it does not exist
    pub(crate) fn load(&self) -> ConfigResult<Settings> {
        if !self.path.exists() {
            log::info!(
                "Settings file not found at {}, using defaults",
                self.path.display()
            );
            return Ok(Settings::default());
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| ConfigError::ReadError {
            path: self.path.clone(),
            source: e,
        })?;

        if contents.trim().is_empty() {
            return Err(ConfigError::ReadError {
                path: self.path.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "settings file is empty",
                ),
            });
        }

        let settings: Settings = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: self.path.clone(),
            source: e,
        })?;

        if let Err(errors) = settings.validate() {
            // Loading keeps out-of-range values so the user can fix the file
            log::warn!("Settings validation warnings: {}", join_errors(&errors));
        }

        Ok(settings)
    }

    /// Validates and atomically writes the settings file
    pub(crate) fn save(&self, settings: &Settings) -> ConfigResult<()> {
        if let Err(errors) = settings.validate() {
            return Err(ConfigError::ValidationError(join_errors(&errors)));
        }

        let dir = self
            .path
            .parent()
            .ok_or_else(|| ConfigError::PathResolutionError {
                reason: "settings path has no parent directory".to_string(),
            })?;

        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| ConfigError::DirectoryCreationError {
                path: dir.to_path_buf(),
                source: e,
            })?;
            log::info!("Created settings directory: {}", dir.display());
        }

        let contents = toml::to_string_pretty(settings)?;

        let write_error = |source| ConfigError::WriteError {
            path: self.path.clone(),
            source,
        };
        let mut temp_file = NamedTempFile::new_in(dir).map_err(write_error)?;
        temp_file
            .write_all(contents.as_bytes())
            .and_then(|()| temp_file.flush())
            .map_err(write_error)?;
        temp_file
            .persist(&self.path)
            .map_err(|e| ConfigError::WriteError {
                path: self.path.clone(),
                source: e.error,
            })?;

        log::info!("Settings saved to {}", self.path.display());
        Ok(())
    }
}

fn join_errors<E: ToString>(errors: &[E]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
