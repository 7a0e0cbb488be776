//! Integration tests for the settings file

use lectern_config::{
    ConfigError, ConfigSection, PlayerSettings, Settings, SettingsManager, SETTINGS_VERSION,
};
use tempfile::TempDir;

fn setup() -> Result<(TempDir, SettingsManager), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let manager = SettingsManager::with_directory(temp_dir.path().to_path_buf());
    Ok((temp_dir, manager))
}

#[test]
fn test_full_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup()?;

    assert!(manager.initialize()?);
    let settings = manager.load()?;
    assert_eq!(settings.version, SETTINGS_VERSION);

    let mut modified = settings.clone();
    modified.player.seek_time_secs = 30;
    modified.sleep_timer.end_of_chapter = true;
    manager.save(&modified)?;

    let reloaded = manager.load()?;
    assert_eq!(reloaded.player.seek_time_secs, 30);
    assert!(reloaded.sleep_timer.end_of_chapter);

    manager.reset()?;
    assert_eq!(manager.load()?, Settings::default());
    Ok(())
}

#[test]
fn test_invalid_save_keeps_previous_file() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup()?;
    manager.save(&Settings::default())?;

    let mut invalid = Settings::default();
    invalid.player.min_speed = 3.0;
    invalid.player.max_speed = 1.0;
    assert!(matches!(
        manager.save(&invalid),
        Err(ConfigError::ValidationError(_))
    ));

    assert_eq!(manager.load()?, Settings::default());
    Ok(())
}

#[test]
fn test_serialization_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::default();
    let text = toml::to_string(&settings)?;
    let parsed: Settings = toml::from_str(&text)?;
    assert_eq!(settings, parsed);
    Ok(())
}

#[test]
fn test_section_names() {
    assert_eq!(PlayerSettings::default().section_name(), "player");
}
