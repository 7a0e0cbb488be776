// FILE: crates/cli/src/main.rs

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use lectern_config::SettingsManager;
use std::path::PathBuf;

mod commands;
mod player;

fn build_cli() -> Command {
    Command::new("lectern")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Lectern Contributors")
        .about("Audiobook playback core, driven from the terminal")
        .arg(
            Arg::new("config-dir")
                .short('c')
                .long("config-dir")
                .value_name("DIR")
                .help("Directory holding settings.toml")
                .global(true),
        )
        .subcommand(
            Command::new("simulate")
                .about("Play a simulated book and control it from stdin")
                .arg(
                    Arg::new("chapters")
                        .long("chapters")
                        .value_name("MS,MS,...")
                        .help("Chapter durations in milliseconds")
                        .default_value("3000,4000"),
                )
                .arg(
                    Arg::new("title")
                        .short('t')
                        .long("title")
                        .value_name("TITLE")
                        .help("Book title")
                        .default_value("Simulated Book"),
                )
                .arg(
                    Arg::new("follow")
                        .short('f')
                        .long("follow")
                        .help("Print the position every second while playing")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Manage the settings file")
                .subcommand_required(true)
                .subcommand(
                    Command::new("init")
                        .about("Write a default settings file")
                        .arg(
                            Arg::new("force")
                                .long("force")
                                .help("Overwrite an existing file")
                                .action(ArgAction::SetTrue),
                        ),
                )
                .subcommand(
                    Command::new("show")
                        .about("Show the effective settings")
                        .arg(
                            Arg::new("json")
                                .long("json")
                                .help("Print as JSON")
                                .action(ArgAction::SetTrue),
                        ),
                )
                .subcommand(Command::new("path").about("Print the settings file path")),
        )
}

fn settings_manager(dir: Option<&String>) -> Result<SettingsManager> {
    match dir {
        Some(dir) => Ok(SettingsManager::with_directory(PathBuf::from(dir))),
        None => SettingsManager::new().context("Failed to locate the settings directory"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let manager = settings_manager(matches.get_one::<String>("config-dir"))?;
    // `config` must keep working with a broken settings file
    let loaded = manager.load_with_env_overrides();
    let level = loaded.as_ref().map_or("info", |s| s.logging.level.as_str());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match matches.subcommand() {
        Some(("simulate", sub_matches)) => {
            let settings = loaded
                .with_context(|| format!("Failed to load {}", manager.path().display()))?;
            player::simulate(&settings, sub_matches).await
        }
        Some(("config", sub_matches)) => commands::config(&manager, sub_matches),
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}
