use crate::commands::{self, Action, HELP};
use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use console::style;
use lectern_config::Settings;
use lectern_core::{format_position, Book, Chapter, InterruptKind, TransportSnapshot};
use lectern_playback::{
    event_channel, ChannelShakeSource, LogWakeLock, MemoryBookmarks, PlaybackService, Platform,
    SimulatedControl, SimulatedEngine, TransportHandle,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// `lectern simulate`: plays a silent book and reads commands from stdin
pub async fn simulate(settings: &Settings, matches: &ArgMatches) -> Result<()> {
    let chapters = matches
        .get_one::<String>("chapters")
        .ok_or_else(|| anyhow::anyhow!("Chapter durations are required"))?;
    let title = matches
        .get_one::<String>("title")
        .map(String::as_str)
        .unwrap_or("Simulated Book");
    let follow = matches.get_flag("follow");

    let book = build_book(title, &commands::parse_chapters(chapters)?)?;
    let total_ms = book.duration_ms();
    println!(
        "{} \"{}\", {} chapters, {}",
        style("Loaded").bold().cyan(),
        book.title,
        book.chapters().len(),
        format_position(total_ms)
    );
    println!("Type 'help' for commands.");

    let session = Session::start(settings, book).await;
    let result = run(&session, follow).await;

    let snapshot = session.shutdown().await;
    if let Some(position) = snapshot.position {
        println!(
            "Stopped at {} of {}",
            format_position(position.global_position_ms),
            format_position(total_ms)
        );
    }
    result
}

async fn run(session: &Session, follow: bool) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut progress = session.service.sampler().progress();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read command")? else {
                    break;
                };
                match commands::parse_action(&line) {
                    Ok(None) => {}
                    Ok(Some(Action::Quit)) => break,
                    Ok(Some(action)) => match session.apply(action).await {
                        Ok(message) => println!("{}", message),
                        Err(e) => eprintln!("{} {}", style("✗").red().bold(), e),
                    },
                    Err(e) => eprintln!("{} {}", style("✗").red().bold(), e),
                }
            }
            changed = progress.changed(), if follow => {
                if changed.is_err() {
                    break;
                }
                let snapshot = *progress.borrow_and_update();
                println!("{}", session.status_of(&snapshot));
            }
        }
    }

    Ok(())
}

fn build_book(title: &str, durations: &[u64]) -> Result<Book> {
    let chapters = durations
        .iter()
        .enumerate()
        .map(|(i, &duration)| Chapter::new(format!("Chapter {}", i + 1), duration, Vec::new()))
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid chapter list")?;
    Book::new(title, chapters).context("Invalid book")
}

/// The playback core wired to a simulated engine
pub struct Session {
    service: PlaybackService,
    book: Book,
    shakes: Arc<ChannelShakeSource>,
    bookmarks: Arc<MemoryBookmarks>,
    control: SimulatedControl,
}

impl Session {
    pub async fn start(settings: &Settings, book: Book) -> Self {
        let (events_tx, events_rx) = event_channel();
        let (engine, control) = SimulatedEngine::new(events_tx);
        let shakes = Arc::new(ChannelShakeSource::new());
        let bookmarks = Arc::new(MemoryBookmarks::new());

        let platform = Platform {
            wake_lock: LogWakeLock,
            shakes: shakes.clone(),
            bookmarks: bookmarks.clone(),
        };
        let service = PlaybackService::start(engine, events_rx, settings, platform);
        service.transport().init(book.clone()).await;

        Self {
            service,
            book,
            shakes,
            bookmarks,
            control,
        }
    }

    fn transport(&self) -> &TransportHandle {
        self.service.transport()
    }

    pub fn status_of(&self, snapshot: &TransportSnapshot) -> String {
        commands::format_status(snapshot, &self.service.sleep_timer().state())
    }

    /// Applies one action and describes the outcome
    pub async fn apply(&self, action: Action) -> Result<String> {
        let transport = self.transport();

        let snapshot = match action {
            Action::Play => transport.play().await,
            Action::Pause => transport.pause(true).await,
            Action::Stop => transport.stop().await,
            Action::Skip { forward } => transport.skip(forward).await,
            Action::Previous => transport.previous(false).await,
            Action::Next => transport.next().await,
            Action::Seek {
                position_ms,
                chapter,
            } => {
                let chapter = match chapter {
                    Some(index) => match self.book.chapters().get(index) {
                        Some(chapter) => Some(chapter.id),
                        None => bail!(
                            "No chapter {}, the book has {}",
                            index,
                            self.book.chapters().len()
                        ),
                    },
                    None => None,
                };
                transport.change_position(position_ms, chapter).await
            }
            Action::Speed(speed) => transport.set_playback_speed(speed).await,
            Action::Gain(gain) => transport.set_loudness_gain(gain).await,
            Action::Silence(enabled) => transport.set_skip_silence(enabled).await,
            Action::Sleep(active) => {
                self.service.sleep_timer().set_active(active);
                transport.snapshot()
            }
            Action::Shake => {
                let listeners = self.shakes.shake();
                if listeners == 0 {
                    return Ok("Nobody is listening for shakes".to_string());
                }
                transport.snapshot()
            }
            Action::Call => transport.pause_for(InterruptKind::Call).await,
            Action::CallEnded => transport.interrupt_ended(InterruptKind::Call).await,
            Action::Unplug => transport.pause_for(InterruptKind::Headset).await,
            Action::Replug => transport.interrupt_ended(InterruptKind::Headset).await,
            Action::Fail => {
                self.control.inject_error("simulated output failure");
                transport.sample().await
            }
            Action::Bookmarks => return Ok(self.list_bookmarks()),
            Action::Status => transport.sample().await,
            Action::Help => return Ok(HELP.to_string()),
            Action::Quit => return Ok(String::new()),
        };

        Ok(self.status_of(&snapshot))
    }

    fn list_bookmarks(&self) -> String {
        if self.bookmarks.is_empty() {
            return "No bookmarks".to_string();
        }

        self.bookmarks
            .all()
            .iter()
            .map(|bookmark| {
                let chapter = self
                    .book
                    .chapter_index_of(bookmark.chapter_id)
                    .map_or(0, |i| i + 1);
                format!(
                    "{} (chapter {} at {})",
                    bookmark.title,
                    chapter,
                    format_position(bookmark.position_ms)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn shutdown(self) -> TransportSnapshot {
        self.service.shutdown().await
    }
}
