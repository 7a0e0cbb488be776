// FILE: crates/cli/src/commands.rs

use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use console::style;
use lectern_config::{Settings, SettingsManager};
use lectern_core::{format_position, SleepTimerState, TransportSnapshot};

/// A line typed into the simulated player
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Play,
    Pause,
    Stop,
    Skip { forward: bool },
    Previous,
    Next,
    Seek { position_ms: i64, chapter: Option<usize> },
    Speed(f32),
    Gain(i32),
    Silence(bool),
    Sleep(bool),
    Shake,
    Call,
    CallEnded,
    Unplug,
    Replug,
    Fail,
    Bookmarks,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
play | pause | stop            transport
skip+ | skip-                  skip by the seek time
prev | next                    previous / next mark or chapter
seek <ms> [chapter]            jump inside a chapter (0-based index)
speed <x> | gain <mB>          playback speed, loudness gain
silence on|off                 skip silence
sleep on|off | shake           sleep timer, shake gesture
call | call-end                phone call interruption
unplug | replug                headset interruption
fail                           simulate an output failure
bookmarks | status | help | quit";

/// Parses one input line; blank lines give `None`
pub fn parse_action(line: &str) -> Result<Option<Action>> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let action = match (command.to_lowercase().as_str(), args.as_slice()) {
        ("play" | "p", []) => Action::Play,
        ("pause", []) => Action::Pause,
        ("stop", []) => Action::Stop,
        ("skip+" | "ff", []) => Action::Skip { forward: true },
        ("skip-" | "rw", []) => Action::Skip { forward: false },
        ("prev" | "previous", []) => Action::Previous,
        ("next", []) => Action::Next,
        ("seek", [position]) => Action::Seek {
            position_ms: parse_number(position, "position")?,
            chapter: None,
        },
        ("seek", [position, chapter]) => Action::Seek {
            position_ms: parse_number(position, "position")?,
            chapter: Some(parse_number(chapter, "chapter")?),
        },
        ("speed", [speed]) => Action::Speed(parse_number(speed, "speed")?),
        ("gain", [gain]) => Action::Gain(parse_number(gain, "gain")?),
        ("silence", [flag]) => Action::Silence(parse_switch(flag)?),
        ("sleep", [flag]) => Action::Sleep(parse_switch(flag)?),
        ("shake", []) => Action::Shake,
        ("call", []) => Action::Call,
        ("call-end", []) => Action::CallEnded,
        ("unplug", []) => Action::Unplug,
        ("replug", []) => Action::Replug,
        ("fail", []) => Action::Fail,
        ("bookmarks", []) => Action::Bookmarks,
        ("status" | "s", []) => Action::Status,
        ("help" | "?", []) => Action::Help,
        ("quit" | "q" | "exit", []) => Action::Quit,
        (other, _) => bail!("Unknown command or arguments: '{}' (try 'help')", other),
    };

    Ok(Some(action))
}

fn parse_number<T: std::str::FromStr>(value: &str, what: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid {}: '{}'", what, value))
}

fn parse_switch(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => bail!("Expected on or off, got '{}'", value),
    }
}

/// Parses a comma separated list of chapter durations
pub fn parse_chapters(list: &str) -> Result<Vec<u64>> {
    let durations = list
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let duration: u64 = parse_number(part, "chapter duration")?;
            if duration == 0 {
                bail!("Chapter durations must be greater than zero");
            }
            Ok(duration)
        })
        .collect::<Result<Vec<_>>>()?;

    if durations.is_empty() {
        bail!("At least one chapter is required");
    }
    Ok(durations)
}

/// One status line for a snapshot and the sleep timer
pub fn format_status(snapshot: &TransportSnapshot, timer: &SleepTimerState) -> String {
    let mut line = format!("[{}]", snapshot.state);

    match snapshot.position {
        Some(position) => line.push_str(&format!(
            " chapter {} {} / {} (book {})",
            position.chapter_index + 1,
            format_position(position.position_ms),
            format_position(position.chapter_duration_ms),
            format_position(position.global_position_ms),
        )),
        None => line.push_str(" no book"),
    }

    if snapshot.needs_reinit {
        line.push_str(" needs reinit");
    }
    if timer.left_ms > 0 {
        line.push_str(&format!(" sleep in {}s", (timer.left_ms + 999) / 1000));
    } else if timer.is_expired() {
        line.push_str(" sleep timer expired");
    }

    line
}

/// Dispatches `lectern config ...`
pub fn config(manager: &SettingsManager, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("init", sub_matches)) => init_config(manager, sub_matches.get_flag("force")),
        Some(("show", sub_matches)) => show_config(manager, sub_matches.get_flag("json")),
        Some(("path", _)) => {
            println!("{}", manager.path().display());
            Ok(())
        }
        _ => bail!("Unknown config command"),
    }
}

pub fn init_config(manager: &SettingsManager, force: bool) -> Result<()> {
    if force {
        manager.reset().context("Failed to write default settings")?;
        println!(
            "{} Settings reset at {}",
            style("✓").green().bold(),
            manager.path().display()
        );
        return Ok(());
    }

    if manager
        .initialize()
        .context("Failed to write default settings")?
    {
        println!(
            "{} Settings created at {}",
            style("✓").green().bold(),
            manager.path().display()
        );
    } else {
        println!(
            "Settings already exist at {} (use --force to overwrite)",
            manager.path().display()
        );
    }
    Ok(())
}

pub fn show_config(manager: &SettingsManager, json: bool) -> Result<()> {
    let settings = manager
        .load_with_env_overrides()
        .with_context(|| format!("Failed to load {}", manager.path().display()))?;

    if json {
        let text = serde_json::to_string_pretty(&settings).context("Failed to encode settings")?;
        println!("{}", text);
    } else {
        print_settings(&settings);
    }
    Ok(())
}

fn print_settings(settings: &Settings) {
    println!("\n{}", style("Player").bold().cyan());
    println!("  Seek time:       {}s", settings.player.seek_time_secs);
    println!("  Auto rewind:     {}s", settings.player.auto_rewind_secs);
    println!(
        "  Speed range:     {:.2}x - {:.2}x",
        settings.player.min_speed, settings.player.max_speed
    );
    println!("  Max gain:        {}mB", settings.player.max_loudness_gain_mb);
    println!("  Resume on plug:  {}", yes_no(settings.player.resume_on_replug));

    println!("\n{}", style("Sleep timer").bold().cyan());
    println!("  Duration:        {} min", settings.sleep_timer.minutes);
    println!("  Shake to reset:  {}", yes_no(settings.sleep_timer.shake_to_reset));
    println!("  Bookmark:        {}", yes_no(settings.sleep_timer.bookmark_on_expiry));
    println!("  End of chapter:  {}", yes_no(settings.sleep_timer.end_of_chapter));

    println!("\n{}", style("Logging").bold().cyan());
    println!("  Level:           {}", settings.logging.level);
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
