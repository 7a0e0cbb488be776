//! Sleep timer
//!
//! A countdown that only advances while the transport plays. Inside the last
//! [`FADE_WINDOW_MS`] the output volume fades linearly to silence. When the
//! countdown runs out the transport rewinds by the fade window and pauses,
//! full volume comes back, and an optional bookmark marks where the listener
//! fell asleep. With shake-to-reset on, a shake restarts the countdown while
//! it runs, and during the [`RESUME_WINDOW`] after expiry it resumes
//! playback as well.
//!
//! The countdown arithmetic lives in [`Countdown`]; [`SleepTimer`] runs it on
//! a tokio task that talks to the transport only through its handle.

use crate::bookmarks::BookmarkSink;
use crate::handle::TransportHandle;
use crate::shake::ShakeSource;
use chrono::Local;
use futures::stream::{BoxStream, StreamExt};
use lectern_config::SleepTimerSettings;
use lectern_core::{Bookmark, ChapterId, PlaybackState, SleepTimerState, TransportSnapshot};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub const COUNTDOWN_STEP_MS: i64 = 250;
pub const FADE_WINDOW_MS: i64 = 10_000;
pub const RESUME_WINDOW: Duration = Duration::from_secs(5 * 60);

const COUNTDOWN_STEP: Duration = Duration::from_millis(COUNTDOWN_STEP_MS as u64);

/// The chapter counted down in end-of-chapter mode
#[derive(Debug, Clone, Copy, PartialEq)]
struct WatchedChapter {
    id: ChapterId,
    duration_ms: u64,
}

/// Sleep timer behaviour, built from the `[sleep_timer]` settings section
#[derive(Debug, Clone, PartialEq)]
pub struct SleepTimerConfig {
    pub duration_ms: i64,
    pub shake_to_reset: bool,
    pub bookmark_on_expiry: bool,
    /// Count down to the end of the current chapter instead
    pub end_of_chapter: bool,
}

impl Default for SleepTimerConfig {
    fn default() -> Self {
        Self::from(&SleepTimerSettings::default())
    }
}

impl From<&SleepTimerSettings> for SleepTimerConfig {
    fn from(settings: &SleepTimerSettings) -> Self {
        Self {
            duration_ms: i64::from(settings.minutes.max(1)) * 60_000,
            shake_to_reset: settings.shake_to_reset,
            bookmark_on_expiry: settings.bookmark_on_expiry,
            end_of_chapter: settings.end_of_chapter,
        }
    }
}

/// Volume multiplier for `left_ms` remaining
pub fn fade_multiplier(left_ms: i64) -> f32 {
    if (0..FADE_WINDOW_MS).contains(&left_ms) {
        left_ms as f32 / FADE_WINDOW_MS as f32
    } else {
        1.0
    }
}

/// Outcome of one countdown step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    /// Not counting
    Inactive,
    /// Transport not playing, nothing changed
    Held,
    Counting { volume: f32 },
    /// Reached zero on this step
    Expired,
}

/// Countdown state without any timing of its own
#[derive(Debug, Clone, Default)]
pub struct Countdown {
    state: SleepTimerState,
}

impl Countdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SleepTimerState {
        self.state
    }

    pub fn left_ms(&self) -> i64 {
        self.state.left_ms
    }

    pub fn activate(&mut self, duration_ms: i64) {
        self.state = SleepTimerState {
            left_ms: duration_ms.max(1),
            fading: false,
            eoc_pending: false,
        };
    }

    /// Counts down the `left_ms` remaining in the current chapter
    pub fn activate_end_of_chapter(&mut self, left_ms: i64) {
        self.state = SleepTimerState {
            left_ms: left_ms.max(1),
            fading: false,
            eoc_pending: true,
        };
    }

    pub fn deactivate(&mut self) {
        self.state = SleepTimerState::inactive();
    }

    /// Advances by `step_ms` if playing
    pub fn tick(&mut self, playing: bool, step_ms: i64) -> Tick {
        if !self.state.is_active() {
            return Tick::Inactive;
        }
        if !playing {
            return Tick::Held;
        }
        self.state.left_ms = (self.state.left_ms - step_ms).max(0);
        self.settle()
    }

    /// Replaces the remaining time, used in end-of-chapter mode
    pub fn set_left(&mut self, playing: bool, left_ms: i64) -> Tick {
        if !self.state.is_active() {
            return Tick::Inactive;
        }
        if !playing {
            return Tick::Held;
        }
        self.state.left_ms = left_ms.max(0);
        self.settle()
    }

    fn settle(&mut self) -> Tick {
        let left_ms = self.state.left_ms;
        if left_ms == 0 {
            self.state.fading = false;
            Tick::Expired
        } else {
            self.state.fading = left_ms < FADE_WINDOW_MS;
            Tick::Counting {
                volume: fade_multiplier(left_ms),
            }
        }
    }
}

struct Inner {
    transport: TransportHandle,
    config: Mutex<SleepTimerConfig>,
    countdown: Mutex<Countdown>,
    remaining: watch::Sender<i64>,
    task: Mutex<Option<JoinHandle<()>>>,
    shakes: Arc<dyn ShakeSource>,
    bookmarks: Arc<dyn BookmarkSink>,
}

/// The sleep timer of one transport
pub struct SleepTimer {
    inner: Arc<Inner>,
}

impl SleepTimer {
    pub fn new(
        transport: TransportHandle,
        config: SleepTimerConfig,
        shakes: Arc<dyn ShakeSource>,
        bookmarks: Arc<dyn BookmarkSink>,
    ) -> Self {
        let (remaining, _) = watch::channel(SleepTimerState::INACTIVE);
        Self {
            inner: Arc::new(Inner {
                transport,
                config: Mutex::new(config),
                countdown: Mutex::new(Countdown::new()),
                remaining,
                task: Mutex::new(None),
                shakes,
                bookmarks,
            }),
        }
    }

    pub fn config(&self) -> SleepTimerConfig {
        self.inner.config.lock().clone()
    }

    /// Takes effect on the next activation
    pub fn set_config(&self, config: SleepTimerConfig) {
        *self.inner.config.lock() = config;
    }

    pub fn state(&self) -> SleepTimerState {
        self.inner.countdown.lock().state()
    }

    /// Counting down or waiting for a shake after expiry
    pub fn is_active(&self) -> bool {
        self.state().left_ms != SleepTimerState::INACTIVE
    }

    /// Milliseconds left, -1 while inactive
    pub fn remaining(&self) -> watch::Receiver<i64> {
        self.inner.remaining.subscribe()
    }

    /// Starts the countdown from the top, or cancels it
    ///
    /// Cancelling takes effect immediately: the countdown task is aborted,
    /// shake listening ends and full volume is restored. Must be called
    /// inside a tokio runtime.
    pub fn set_active(&self, active: bool) {
        self.abort_task();

        if active {
            let config = self.config();
            let watched = self.inner.restart(&config, self.inner.transport.snapshot());
            self.inner.transport.set_volume(1.0);

            let task = tokio::spawn(run(Arc::clone(&self.inner), config, watched));
            *self.inner.task.lock() = Some(task);
        } else {
            self.inner.deactivate();
            self.inner.transport.set_volume(1.0);
            log::info!("Sleep timer cancelled");
        }
    }

    fn abort_task(&self) {
        if let Some(task) = self.inner.task.lock().take() {
            task.abort();
        }
    }
}

impl Drop for SleepTimer {
    fn drop(&mut self) {
        self.abort_task();
    }
}

impl Inner {
    /// Resets the countdown to its full length; returns the chapter watched
    /// in end-of-chapter mode
    fn restart(
        &self,
        config: &SleepTimerConfig,
        snapshot: TransportSnapshot,
    ) -> Option<WatchedChapter> {
        let mut countdown = self.countdown.lock();

        let watched = match snapshot.position {
            Some(position) if config.end_of_chapter => {
                let left_ms = position
                    .chapter_duration_ms
                    .saturating_sub(position.position_ms) as i64;
                countdown.activate_end_of_chapter(left_ms);
                Some(WatchedChapter {
                    id: position.chapter_id,
                    duration_ms: position.chapter_duration_ms,
                })
            }
            _ => {
                countdown.activate(config.duration_ms);
                None
            }
        };

        let left_ms = countdown.left_ms();
        drop(countdown);

        log::info!(
            "Sleep timer set: {}s{}",
            left_ms / 1000,
            if watched.is_some() { " (end of chapter)" } else { "" }
        );
        self.remaining.send_replace(left_ms);
        watched
    }

    fn deactivate(&self) {
        self.countdown.lock().deactivate();
        self.remaining.send_replace(SleepTimerState::INACTIVE);
    }

    async fn tick(&self, watched: Option<WatchedChapter>) -> Tick {
        let snapshot = self.transport.snapshot();

        let tick = match watched {
            Some(chapter) => {
                // The book ending also ends the watched chapter
                let (playing, left_ms) = if snapshot.state.is_playing() {
                    let sampled = self.transport.sample().await;
                    (true, chapter_left(&sampled, chapter.id))
                } else {
                    (snapshot.state == PlaybackState::Ended, 0)
                };
                let mut countdown = self.countdown.lock();
                countdown.set_left(playing, left_ms)
            }
            None => {
                let mut countdown = self.countdown.lock();
                countdown.tick(snapshot.state.is_playing(), COUNTDOWN_STEP_MS)
            }
        };

        if !matches!(tick, Tick::Held | Tick::Inactive) {
            self.remaining.send_replace(self.countdown.lock().left_ms());
        }
        tick
    }

    async fn expire(&self, config: &SleepTimerConfig, watched: Option<WatchedChapter>) {
        let snapshot = self.transport.sample().await;

        // In end-of-chapter mode the transport has usually rolled on already
        let asleep = snapshot.position.map(|position| match watched {
            Some(chapter) if chapter.id != position.chapter_id => {
                (position.book_id, chapter.id, chapter.duration_ms)
            }
            _ => (position.book_id, position.chapter_id, position.position_ms),
        });

        if let Some((_, chapter, position_ms)) = asleep {
            let target = position_ms.saturating_sub(FADE_WINDOW_MS as u64);
            self.transport.change_position(target as i64, Some(chapter)).await;
        }
        self.transport.pause(false).await;
        self.transport.set_volume(1.0);

        if config.bookmark_on_expiry {
            if let Some((book, chapter, position_ms)) = asleep {
                let title = format!("Sleep timer {}", Local::now().format("%Y-%m-%d %H:%M"));
                self.bookmarks.add(Bookmark::new(book, chapter, position_ms, title));
            }
        }

        log::info!("Sleep timer expired");
    }
}

/// Time left in `chapter`, 0 once the transport moved on
fn chapter_left(snapshot: &TransportSnapshot, chapter: ChapterId) -> i64 {
    match snapshot.position {
        Some(position) if position.chapter_id == chapter => {
            position.chapter_duration_ms.saturating_sub(position.position_ms) as i64
        }
        _ => 0,
    }
}

async fn next_shake(shakes: &mut Option<BoxStream<'static, ()>>) -> Option<()> {
    match shakes {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn run(inner: Arc<Inner>, config: SleepTimerConfig, mut watched: Option<WatchedChapter>) {
    let mut shakes = config.shake_to_reset.then(|| inner.shakes.listen());

    loop {
        if !count_down(&inner, &config, &mut watched, &mut shakes).await {
            return;
        }
        inner.expire(&config, watched).await;

        if shakes.is_none() {
            inner.deactivate();
            return;
        }

        log::info!("Shake within {}s to resume", RESUME_WINDOW.as_secs());
        tokio::select! {
            _ = tokio::time::sleep(RESUME_WINDOW) => {
                log::info!("Resume window closed");
                inner.deactivate();
                return;
            }
            shake = next_shake(&mut shakes) => {
                if shake.is_none() {
                    inner.deactivate();
                    return;
                }
                log::info!("Shake detected, resuming playback");
                inner.transport.play().await;
                let snapshot = inner.transport.sample().await;
                watched = inner.restart(&config, snapshot);
            }
        }
    }
}

/// Runs the countdown; true when it expired
async fn count_down(
    inner: &Inner,
    config: &SleepTimerConfig,
    watched: &mut Option<WatchedChapter>,
    shakes: &mut Option<BoxStream<'static, ()>>,
) -> bool {
    let mut ticker = interval_at(Instant::now() + COUNTDOWN_STEP, COUNTDOWN_STEP);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut volume = 1.0;

    loop {
        let mut shakes_ended = false;

        tokio::select! {
            _ = ticker.tick() => match inner.tick(*watched).await {
                Tick::Expired => return true,
                Tick::Inactive => return false,
                Tick::Held => {}
                Tick::Counting { volume: faded } => {
                    if faded != volume {
                        volume = faded;
                        inner.transport.set_volume(volume);
                    }
                }
            },
            shake = next_shake(shakes) => match shake {
                Some(()) => {
                    log::info!("Shake detected, restarting sleep timer");
                    let snapshot = inner.transport.sample().await;
                    *watched = inner.restart(config, snapshot);
                    if volume != 1.0 {
                        volume = 1.0;
                        inner.transport.set_volume(volume);
                    }
                }
                None => shakes_ended = true,
            },
        }

        if shakes_ended {
            *shakes = None;
        }
    }
}
