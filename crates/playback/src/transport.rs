//! Transport state machine
//!
//! [`Transport`] owns the engine and the loaded book. Every operation is
//! synchronous and infallible from the caller's point of view: invalid input
//! is clamped or ignored, engine failures move the transport to `Idle` with
//! `needs_reinit` set, and the next command prepares the engine again.
//!
//! Observers get the latest [`TransportSnapshot`] through a watch channel and
//! every [`StateTransition`] through a broadcast channel.

use crate::engine::{Engine, EngineEvent, EnginePosition};
use crate::error::{EngineError, EngineResult};
use crate::position::{self, NextTarget, PreviousTarget, PREVIOUS_THRESHOLD_MS};
use lectern_config::PlayerSettings;
use lectern_core::{
    Book, ChapterId, InterruptKind, PauseReason, PlaybackSpeed, PlaybackState, PlayerError,
    PositionSnapshot, StateTransition, TransitionCause, TransportSnapshot,
};
use tokio::sync::{broadcast, watch};

const TRANSITION_CAPACITY: usize = 64;

/// Transport limits, built from the `[player]` settings section
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub seek_time_ms: u64,
    /// 0 disables rewinding on pause
    pub auto_rewind_ms: u64,
    pub min_speed: f32,
    pub max_speed: f32,
    pub max_loudness_gain_mb: u32,
    pub resume_on_replug: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::from(&PlayerSettings::default())
    }
}

impl From<&PlayerSettings> for TransportConfig {
    fn from(settings: &PlayerSettings) -> Self {
        // The settings file is loaded even when out of range
        let min_speed = if settings.min_speed.is_finite() {
            settings.min_speed.clamp(PlaybackSpeed::MIN, PlaybackSpeed::MAX)
        } else {
            PlaybackSpeed::MIN
        };
        let max_speed = if settings.max_speed.is_finite() {
            settings.max_speed.clamp(min_speed, PlaybackSpeed::MAX)
        } else {
            PlaybackSpeed::MAX
        };

        let seek_time_secs = settings.seek_time_secs.clamp(
            PlayerSettings::MIN_SEEK_TIME_SECS,
            PlayerSettings::MAX_SEEK_TIME_SECS,
        );
        let auto_rewind_secs = settings
            .auto_rewind_secs
            .min(PlayerSettings::MAX_AUTO_REWIND_SECS);

        Self {
            seek_time_ms: seek_time_secs * 1000,
            auto_rewind_ms: auto_rewind_secs * 1000,
            min_speed,
            max_speed,
            max_loudness_gain_mb: settings
                .max_loudness_gain_mb
                .min(PlayerSettings::MAX_LOUDNESS_GAIN_MB),
            resume_on_replug: settings.resume_on_replug,
        }
    }
}

/// The playback transport
pub struct Transport<E: Engine> {
    engine: E,
    config: TransportConfig,
    book: Option<Book>,
    state: PlaybackState,
    pause_reason: PauseReason,
    needs_reinit: bool,
    /// The engine holds the sources of `book`
    prepared: bool,
    volume: f32,
    snapshots: watch::Sender<TransportSnapshot>,
    transitions: broadcast::Sender<StateTransition>,
}

impl<E: Engine> Transport<E> {
    pub fn new(engine: E, config: TransportConfig) -> Self {
        let (snapshots, _) = watch::channel(TransportSnapshot::default());
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);

        Self {
            engine,
            config,
            book: None,
            state: PlaybackState::Idle,
            pause_reason: PauseReason::None,
            needs_reinit: false,
            prepared: false,
            volume: 1.0,
            snapshots,
            transitions,
        }
    }

    /// Latest snapshot, updated after every operation
    pub fn subscribe(&self) -> watch::Receiver<TransportSnapshot> {
        self.snapshots.subscribe()
    }

    /// Every state change from now on
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<StateTransition> {
        self.transitions.subscribe()
    }

    pub(crate) fn transition_sender(&self) -> broadcast::Sender<StateTransition> {
        self.transitions.clone()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn book(&self) -> Option<&Book> {
        self.book.as_ref()
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Replaces the limits; takes effect on the next command
    pub fn set_config(&mut self, config: TransportConfig) {
        self.config = config;
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        TransportSnapshot {
            state: self.state,
            pause_reason: self.pause_reason,
            needs_reinit: self.needs_reinit,
            position: self.book.as_ref().map(position_snapshot),
        }
    }

    /// Makes `book` current without touching the engine
    ///
    /// The engine is prepared by the first command that needs it.
    pub fn load(&mut self, mut book: Book) {
        repair(&mut book);
        if self.prepared {
            self.engine.stop();
            self.prepared = false;
        }
        log::info!("Loaded \"{}\" ({} chapters)", book.title, book.chapters().len());
        self.book = Some(book);
        self.pause_reason = PauseReason::None;
        self.transition(PlaybackState::Idle, TransitionCause::Stopped);
    }

    /// Prepares the engine for `book` and moves to `Paused`
    ///
    /// With the same chapter list already prepared only the book reference is
    /// replaced; the in-memory position and settings are kept.
    pub fn init(&mut self, mut book: Book) {
        repair(&mut book);

        if let Some(current) = self.book.as_ref() {
            if self.prepared
                && !self.needs_reinit
                && current.id == book.id
                && current.same_chapters(&book)
            {
                log::debug!("\"{}\" already prepared, keeping position", book.title);
                book.settings = current.settings.clone();
                self.book = Some(book);
                self.publish();
                return;
            }
        }

        self.book = Some(book);
        self.prepared = false;
        self.prepare();
    }

    pub fn play(&mut self) {
        if !self.ensure_initialized() {
            log::debug!("Play ignored, no book ready");
            return;
        }

        match self.state {
            PlaybackState::Playing => {
                log::debug!("Play ignored, already playing");
                return;
            }
            PlaybackState::Ended => {
                let result = self.engine.seek(0, 0);
                if !self.check(result, "rewinding to the start of the book") {
                    return;
                }
                if let Some(book) = self.book.as_mut() {
                    store_position(book, 0, 0);
                }
            }
            PlaybackState::Idle | PlaybackState::Paused => {}
        }

        let result = self.engine.play();
        if self.check(result, "starting playback") {
            self.transition(PlaybackState::Playing, TransitionCause::Command);
        }
    }

    /// Pauses playback, rewinding by the configured amount if `rewind`
    pub fn pause(&mut self, rewind: bool) {
        self.pause_with(rewind, TransitionCause::Command);
    }

    /// Pauses because of an external interruption
    pub fn pause_for(&mut self, kind: InterruptKind) {
        if self.state != PlaybackState::Playing {
            log::debug!("Interrupt {:?} ignored while {}", kind, self.state);
            return;
        }
        self.pause_reason = PauseReason::ExternalInterrupt(kind);
        self.pause_with(true, TransitionCause::Interrupted(kind));
    }

    /// Resumes if playback was paused by this interruption
    pub fn interrupt_ended(&mut self, kind: InterruptKind) {
        if self.state != PlaybackState::Paused
            || self.pause_reason != PauseReason::ExternalInterrupt(kind)
        {
            log::debug!("End of interrupt {:?} ignored", kind);
            return;
        }

        if kind == InterruptKind::Headset && !self.config.resume_on_replug {
            self.pause_reason = PauseReason::None;
            self.publish();
            return;
        }

        self.play();
    }

    /// Skips by the configured seek time, crossing into neighbouring chapters
    pub fn skip(&mut self, forward: bool) {
        if !self.ensure_initialized() {
            return;
        }
        self.sync_position();

        let Some(book) = self.book.as_ref() else {
            return;
        };
        let index = book.current_index();
        let duration = book.current_chapter().duration_ms;
        let current = book.settings.position_ms;
        let seek = self.config.seek_time_ms;

        if forward {
            match current.checked_add(seek) {
                Some(target) if target <= duration => self.commit_position(index, target),
                _ => self.next(),
            }
        } else {
            match current.checked_sub(seek) {
                Some(target) => self.commit_position(index, target),
                None => self.previous(false),
            }
        }
    }

    /// Goes back by mark or chapter
    ///
    /// When the previous chapter is the target, `to_chapter_start` lands at
    /// its start instead of one seek time before its end.
    pub fn previous(&mut self, to_chapter_start: bool) {
        if !self.ensure_initialized() {
            return;
        }
        self.sync_position();

        let Some(book) = self.book.as_ref() else {
            return;
        };
        let index = book.current_index();
        let chapter = book.current_chapter();

        match position::previous_target(chapter, book.settings.position_ms, PREVIOUS_THRESHOLD_MS)
        {
            PreviousTarget::SeekWithinChapter(ms) | PreviousTarget::JumpToMarkStart(ms) => {
                self.commit_position(index, ms);
            }
            PreviousTarget::GoToPreviousChapter if index == 0 => {
                self.commit_position(0, 0);
            }
            PreviousTarget::GoToPreviousChapter => {
                let previous = &book.chapters()[index - 1];
                let target = if to_chapter_start {
                    0
                } else {
                    previous.duration_ms.saturating_sub(self.config.seek_time_ms)
                };
                self.commit_position(index - 1, target);
            }
        }
    }

    /// Goes forward to the next mark or chapter; no-op in the last chapter
    pub fn next(&mut self) {
        if !self.ensure_initialized() {
            return;
        }
        self.sync_position();

        let Some(book) = self.book.as_ref() else {
            return;
        };
        let index = book.current_index();

        match position::next_target(book.current_chapter(), book.settings.position_ms) {
            NextTarget::SeekTo(ms) => self.commit_position(index, ms),
            NextTarget::GoToNextChapter if index + 1 < book.chapters().len() => {
                self.commit_position(index + 1, 0);
            }
            NextTarget::GoToNextChapter => log::debug!("Next ignored, already in the last chapter"),
        }
    }

    /// Seeks to `position_ms` in `chapter`, or in the current chapter
    ///
    /// An unknown chapter keeps the current one; out-of-range positions are
    /// clamped into the chapter.
    pub fn change_position(&mut self, position_ms: i64, chapter: Option<ChapterId>) {
        if !self.ensure_initialized() {
            return;
        }
        self.sync_position();

        let Some(book) = self.book.as_ref() else {
            return;
        };

        let index = match chapter {
            Some(id) => book.chapter_index_of(id).unwrap_or_else(|| {
                let err = PlayerError::UnknownChapter {
                    book: book.id,
                    chapter: id,
                };
                log::warn!("{} ({})", err, err.recovery_action());
                book.current_index()
            }),
            None => book.current_index(),
        };

        let target = &book.chapters()[index];
        let clamped = position::seek_within_chapter(target, position_ms);
        if clamped as i64 != position_ms {
            let err = PlayerError::InvalidSeekTarget {
                position_ms,
                duration_ms: target.duration_ms,
            };
            log::warn!("{} ({})", err, err.recovery_action());
        }

        self.commit_position(index, clamped);
    }

    pub fn set_playback_speed(&mut self, speed: f32) {
        if !speed.is_finite() {
            let err = PlayerError::invalid_argument("speed", format!("{} is not finite", speed));
            log::warn!("{} ({})", err, err.recovery_action());
            return;
        }

        let clamped = speed.clamp(self.config.min_speed, self.config.max_speed);
        if clamped != speed {
            log::warn!("Speed {} clamped to {}", speed, clamped);
        }
        let speed = match PlaybackSpeed::new(clamped) {
            Ok(speed) => speed,
            Err(err) => {
                log::warn!("{} ({})", err, err.recovery_action());
                return;
            }
        };

        let Some(book) = self.book.as_mut() else {
            log::debug!("Speed ignored, no book loaded");
            return;
        };
        book.settings.speed = speed;

        if self.prepared {
            let result = self.engine.set_speed(speed.value());
            if !self.check(result, "changing speed") {
                return;
            }
        }
        self.publish();
    }

    /// Sets the loudness enhancement, clamped to `[0, max_loudness_gain_mb]`
    pub fn set_loudness_gain(&mut self, gain_mb: i32) {
        let max = i64::from(self.config.max_loudness_gain_mb);
        let clamped = i64::from(gain_mb).clamp(0, max) as u32;
        if i64::from(clamped) != i64::from(gain_mb) {
            log::warn!("Loudness gain {}mB clamped to {}mB", gain_mb, clamped);
        }

        let Some(book) = self.book.as_mut() else {
            log::debug!("Loudness gain ignored, no book loaded");
            return;
        };
        book.settings.loudness_gain_mb = clamped;

        if self.prepared {
            let result = self.engine.set_loudness_gain(clamped);
            if !self.check(result, "changing loudness gain") {
                return;
            }
        }
        self.publish();
    }

    pub fn set_skip_silence(&mut self, enabled: bool) {
        let Some(book) = self.book.as_mut() else {
            log::debug!("Skip silence ignored, no book loaded");
            return;
        };
        book.settings.skip_silence = enabled;

        if self.prepared {
            let result = self.engine.set_skip_silence(enabled);
            if !self.check(result, "changing skip silence") {
                return;
            }
        }
        self.publish();
    }

    /// Output volume multiplier used by the sleep timer fade
    pub fn set_volume(&mut self, volume: f32) {
        if !volume.is_finite() {
            log::debug!("Volume {} ignored", volume);
            return;
        }
        self.volume = volume.clamp(0.0, 1.0);

        if self.prepared {
            let result = self.engine.set_volume(self.volume);
            self.check(result, "changing volume");
        }
    }

    /// Stops playback and releases the engine
    ///
    /// The transport ends up `Idle`; the book and its position are kept and
    /// the next command prepares the engine again.
    pub fn stop(&mut self) {
        self.sync_position();
        self.engine.stop();
        self.prepared = false;
        self.pause_reason = PauseReason::None;
        self.transition(PlaybackState::Idle, TransitionCause::Stopped);
    }

    /// Reads the engine position into the book without publishing
    pub fn sample(&mut self) -> TransportSnapshot {
        self.sync_position();
        self.snapshot()
    }

    pub fn handle_event(&mut self, event: EngineEvent) {
        if !self.prepared {
            log::debug!("Dropping engine event {:?}, engine not prepared", event);
            return;
        }

        match event {
            EngineEvent::Discontinuity {
                chapter_index,
                position_ms,
            } => {
                if let Some(book) = self.book.as_mut() {
                    store_position(book, chapter_index, position_ms);
                }
                self.publish();
            }
            EngineEvent::Ended => {
                if let Some(book) = self.book.as_mut() {
                    let last = book.chapters().len() - 1;
                    let end = book.chapters()[last].duration_ms;
                    store_position(book, last, end);
                }
                self.transition(PlaybackState::Ended, TransitionCause::EngineEnded);
            }
            EngineEvent::Error(error) => self.fail("playback", error),
        }
    }

    /// Prepares the engine if needed; false when there is nothing to play
    fn ensure_initialized(&mut self) -> bool {
        if self.state == PlaybackState::Idle {
            self.prepare();
        }
        self.state != PlaybackState::Idle
    }

    fn prepare(&mut self) {
        let Some(book) = self.book.as_ref() else {
            log::debug!("Nothing to prepare, no book loaded");
            return;
        };

        log::info!("Preparing \"{}\"", book.title);
        let result = prepare_engine(&mut self.engine, book, &self.config, self.volume);
        if self.check(result, "preparing") {
            self.prepared = true;
            self.needs_reinit = false;
            self.transition(PlaybackState::Paused, TransitionCause::Command);
        }
    }

    fn pause_with(&mut self, rewind: bool, cause: TransitionCause) {
        if self.state != PlaybackState::Playing {
            log::debug!("Pause ignored while {}", self.state);
            return;
        }
        self.sync_position();

        if rewind && self.config.auto_rewind_ms > 0 {
            if let Some(book) = self.book.as_ref() {
                let index = book.current_index();
                let target = position::auto_rewind_target(
                    book.current_chapter(),
                    book.settings.position_ms,
                    self.config.auto_rewind_ms,
                );
                let result = self.engine.seek(index, target);
                if !self.check(result, "rewinding on pause") {
                    return;
                }
                if let Some(book) = self.book.as_mut() {
                    store_position(book, index, target);
                }
            }
        }

        let result = self.engine.pause();
        if self.check(result, "pausing") {
            self.transition(PlaybackState::Paused, cause);
        }
    }

    /// The only place the book position changes on request
    fn commit_position(&mut self, chapter_index: usize, position_ms: u64) {
        let result = self.engine.seek(chapter_index, position_ms);
        if !self.check(result, "seeking") {
            return;
        }

        if let Some(book) = self.book.as_mut() {
            store_position(book, chapter_index, position_ms);
        }

        if self.state == PlaybackState::Ended {
            self.transition(PlaybackState::Paused, TransitionCause::Command);
        } else {
            self.publish();
        }
    }

    fn sync_position(&mut self) {
        // After the last chapter the engine position is meaningless
        if !self.prepared || self.state == PlaybackState::Ended {
            return;
        }
        let EnginePosition {
            chapter_index,
            offset_ms,
        } = self.engine.position();
        if let Some(book) = self.book.as_mut() {
            store_position(book, chapter_index, offset_ms);
        }
    }

    /// Returns true on success, fails the transport otherwise
    fn check(&mut self, result: EngineResult<()>, context: &str) -> bool {
        match result {
            Ok(()) => true,
            Err(error) => {
                self.fail(context, error);
                false
            }
        }
    }

    fn fail(&mut self, context: &str, error: EngineError) {
        let cause = format!("{}: {}", context, error);
        let error = PlayerError::engine(format!("failed {}", context), error);
        log::error!("{} - {} ({})", error, cause, error.recovery_action());

        self.engine.stop();
        self.prepared = false;
        self.needs_reinit = true;
        self.pause_reason = PauseReason::None;
        self.transition(PlaybackState::Idle, TransitionCause::EngineError(cause));
    }

    fn transition(&mut self, to: PlaybackState, cause: TransitionCause) {
        let from = self.state;
        let failed = matches!(cause, TransitionCause::EngineError(_));

        if from != to || failed {
            log::info!("Transport {} -> {} ({:?})", from, to, cause);
            self.state = to;
            if to.is_playing() {
                self.pause_reason = PauseReason::None;
            }
            // No subscribers is fine
            let _ = self.transitions.send(StateTransition { from, to, cause });
        }

        self.publish();
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }
}

fn prepare_engine<E: Engine>(
    engine: &mut E,
    book: &Book,
    config: &TransportConfig,
    volume: f32,
) -> EngineResult<()> {
    let settings = &book.settings;
    engine.prepare(book.chapters())?;
    engine.seek(book.current_index(), settings.position_ms)?;
    engine.set_speed(settings.speed.clamp(config.min_speed, config.max_speed).value())?;
    engine.set_loudness_gain(settings.loudness_gain_mb.min(config.max_loudness_gain_mb))?;
    engine.set_skip_silence(settings.skip_silence)?;
    engine.set_volume(volume)
}

fn repair(book: &mut Book) {
    if let Some(err) = book.repair() {
        log::warn!("\"{}\": {} ({})", book.title, err, err.recovery_action());
    }
}

fn store_position(book: &mut Book, chapter_index: usize, position_ms: u64) {
    let index = chapter_index.min(book.chapters().len() - 1);
    let duration = book.chapters()[index].duration_ms;
    book.settings.chapter_index = index;
    book.settings.position_ms = position_ms.min(duration);
}

fn position_snapshot(book: &Book) -> PositionSnapshot {
    let chapter = book.current_chapter();
    let global_position_ms = position::global_position(book).unwrap_or_else(|err| {
        log::warn!("{}", err);
        0
    });

    PositionSnapshot {
        book_id: book.id,
        chapter_id: chapter.id,
        chapter_index: book.current_index(),
        chapter_duration_ms: chapter.duration_ms,
        position_ms: book.settings.position_ms,
        global_position_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::{Chapter, Mark, PlaybackSettings};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records calls and serves a position set by the test
    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
        position: EnginePosition,
        fail_prepare: bool,
        fail_play: bool,
    }

    #[derive(Clone, Default)]
    struct FakeEngine(Arc<Mutex<Recorder>>);

    impl FakeEngine {
        fn calls(&self) -> Vec<String> {
            self.0.lock().calls.clone()
        }

        fn clear(&self) {
            self.0.lock().calls.clear();
        }

        fn set_position(&self, chapter_index: usize, offset_ms: u64) {
            self.0.lock().position = EnginePosition {
                chapter_index,
                offset_ms,
            };
        }

        fn record(&self, call: String) {
            self.0.lock().calls.push(call);
        }
    }

    impl Engine for FakeEngine {
        fn prepare(&mut self, chapters: &[Chapter]) -> EngineResult<()> {
            self.record(format!("prepare {}", chapters.len()));
            if self.0.lock().fail_prepare {
                return Err(EngineError::PrepareError("broken source".to_string()));
            }
            Ok(())
        }

        fn play(&mut self) -> EngineResult<()> {
            self.record("play".to_string());
            if self.0.lock().fail_play {
                return Err(EngineError::OutputError("device gone".to_string()));
            }
            Ok(())
        }

        fn pause(&mut self) -> EngineResult<()> {
            self.record("pause".to_string());
            Ok(())
        }

        fn stop(&mut self) {
            self.record("stop".to_string());
        }

        fn seek(&mut self, chapter_index: usize, offset_ms: u64) -> EngineResult<()> {
            self.record(format!("seek {} {}", chapter_index, offset_ms));
            self.set_position(chapter_index, offset_ms);
            Ok(())
        }

        fn position(&mut self) -> EnginePosition {
            self.0.lock().position
        }

        fn set_speed(&mut self, speed: f32) -> EngineResult<()> {
            self.record(format!("speed {}", speed));
            Ok(())
        }

        fn set_volume(&mut self, volume: f32) -> EngineResult<()> {
            self.record(format!("volume {}", volume));
            Ok(())
        }

        fn set_loudness_gain(&mut self, gain_mb: u32) -> EngineResult<()> {
            self.record(format!("gain {}", gain_mb));
            Ok(())
        }

        fn set_skip_silence(&mut self, enabled: bool) -> EngineResult<()> {
            self.record(format!("silence {}", enabled));
            Ok(())
        }
    }

    fn book(durations: &[u64]) -> Book {
        let chapters = durations
            .iter()
            .enumerate()
            .map(|(i, &d)| Chapter::new(format!("Chapter {}", i + 1), d, Vec::new()).unwrap())
            .collect();
        Book::new("Test Book", chapters).unwrap()
    }

    fn transport() -> (Transport<FakeEngine>, FakeEngine) {
        let engine = FakeEngine::default();
        (
            Transport::new(engine.clone(), TransportConfig::default()),
            engine,
        )
    }

    fn position(transport: &Transport<FakeEngine>) -> (usize, u64) {
        let snapshot = transport.snapshot().position.unwrap();
        (snapshot.chapter_index, snapshot.position_ms)
    }

    #[test]
    fn test_config_from_settings() {
        let config = TransportConfig::default();
        assert_eq!(config.seek_time_ms, 20_000);
        assert_eq!(config.auto_rewind_ms, 2000);
        assert_eq!(config.max_loudness_gain_mb, 900);

        let settings = PlayerSettings {
            min_speed: 3.0,
            max_speed: 1.0,
            ..PlayerSettings::default()
        };
        let config = TransportConfig::from(&settings);
        assert!(config.min_speed <= config.max_speed);
    }

    #[test]
    fn test_config_from_out_of_range_settings() {
        let settings = PlayerSettings {
            seek_time_secs: u64::MAX / 1000 + 1,
            auto_rewind_secs: u64::MAX,
            max_loudness_gain_mb: 3_000_000_000,
            ..PlayerSettings::default()
        };
        let config = TransportConfig::from(&settings);
        assert_eq!(config.seek_time_ms, 120_000);
        assert_eq!(config.auto_rewind_ms, 60_000);
        assert_eq!(config.max_loudness_gain_mb, 2000);

        let config = TransportConfig::from(&PlayerSettings {
            seek_time_secs: 0,
            ..PlayerSettings::default()
        });
        assert_eq!(config.seek_time_ms, 1000);
    }

    #[test]
    fn test_out_of_range_settings_keep_operations_sane() {
        let settings = PlayerSettings {
            seek_time_secs: u64::MAX / 1000 + 1,
            max_loudness_gain_mb: 3_000_000_000,
            ..PlayerSettings::default()
        };
        let mut transport =
            Transport::new(FakeEngine::default(), TransportConfig::from(&settings));
        transport.init(book(&[600_000, 600_000]));
        transport.change_position(15_000, None);

        transport.skip(true);
        assert_eq!(position(&transport), (0, 135_000));

        transport.set_loudness_gain(100);
        transport.set_loudness_gain(i32::MAX);
        assert_eq!(transport.book().unwrap().settings.loudness_gain_mb, 2000);
    }

    #[test]
    fn test_skip_with_unchecked_config() {
        let config = TransportConfig {
            seek_time_ms: u64::MAX,
            max_loudness_gain_mb: u32::MAX,
            ..TransportConfig::default()
        };
        let mut transport = Transport::new(FakeEngine::default(), config);
        transport.init(book(&[30_000, 30_000]));
        transport.change_position(15_000, None);

        transport.skip(true);
        assert_eq!(position(&transport), (1, 0));

        transport.set_loudness_gain(i32::MAX);
        assert_eq!(
            transport.book().unwrap().settings.loudness_gain_mb,
            i32::MAX as u32
        );
    }

    #[test]
    fn test_init_prepares_and_pauses() {
        let (mut transport, engine) = transport();
        let book = book(&[3000, 4000]).with_settings(PlaybackSettings {
            chapter_index: 1,
            position_ms: 1500,
            ..PlaybackSettings::default()
        });

        transport.init(book);

        assert_eq!(transport.state(), PlaybackState::Paused);
        assert_eq!(
            engine.calls(),
            vec![
                "prepare 2",
                "seek 1 1500",
                "speed 1",
                "gain 0",
                "silence false",
                "volume 1"
            ]
        );
        let snapshot = transport.snapshot().position.unwrap();
        assert_eq!(snapshot.global_position_ms, 4500);
    }

    #[test]
    fn test_init_twice_keeps_position() {
        let (mut transport, engine) = transport();
        let book = book(&[3000, 4000]);
        transport.init(book.clone());
        transport.change_position(2500, None);
        engine.clear();

        transport.init(book);

        assert!(engine.calls().is_empty());
        assert_eq!(position(&transport), (0, 2500));
    }

    #[test]
    fn test_init_repairs_book() {
        let (mut transport, _engine) = transport();
        let book = book(&[3000]).with_settings(PlaybackSettings {
            chapter_index: 7,
            position_ms: 999,
            ..PlaybackSettings::default()
        });

        transport.init(book);
        assert_eq!(position(&transport), (0, 0));
    }

    #[test]
    fn test_play_from_idle_goes_through_paused() {
        let (mut transport, _engine) = transport();
        let mut transitions = transport.subscribe_transitions();
        transport.load(book(&[3000, 4000]));
        while transitions.try_recv().is_ok() {}

        transport.play();

        assert_eq!(transport.state(), PlaybackState::Playing);
        let first = transitions.try_recv().unwrap();
        assert_eq!((first.from, first.to), (PlaybackState::Idle, PlaybackState::Paused));
        let second = transitions.try_recv().unwrap();
        assert_eq!(
            (second.from, second.to),
            (PlaybackState::Paused, PlaybackState::Playing)
        );
    }

    #[test]
    fn test_play_without_book_is_noop() {
        let (mut transport, engine) = transport();
        transport.play();
        assert_eq!(transport.state(), PlaybackState::Idle);
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_play_while_playing_is_noop() {
        let (mut transport, engine) = transport();
        transport.init(book(&[3000]));
        transport.play();
        engine.clear();

        transport.play();
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_pause_applies_auto_rewind() {
        let (mut transport, engine) = transport();
        transport.init(book(&[30_000]));
        transport.play();
        engine.set_position(0, 10_000);

        transport.pause(true);

        assert_eq!(transport.state(), PlaybackState::Paused);
        assert_eq!(position(&transport), (0, 8000));
        assert!(engine.calls().contains(&"seek 0 8000".to_string()));
    }

    #[test]
    fn test_pause_without_rewind() {
        let (mut transport, engine) = transport();
        transport.init(book(&[30_000]));
        transport.play();
        engine.set_position(0, 10_000);

        transport.pause(false);
        assert_eq!(position(&transport), (0, 10_000));
    }

    #[test]
    fn test_pause_when_not_playing_is_noop() {
        let (mut transport, engine) = transport();
        transport.init(book(&[30_000]));
        engine.clear();

        transport.pause(true);
        assert!(engine.calls().is_empty());
        assert_eq!(transport.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_skip_within_chapter() {
        let (mut transport, _engine) = transport();
        transport.init(book(&[60_000]));
        transport.change_position(10_000, None);

        transport.skip(true);
        assert_eq!(position(&transport), (0, 30_000));

        transport.skip(false);
        assert_eq!(position(&transport), (0, 10_000));
    }

    #[test]
    fn test_skip_forward_past_end_goes_to_next_chapter() {
        let (mut transport, _engine) = transport();
        transport.init(book(&[30_000, 30_000]));
        transport.change_position(25_000, None);

        transport.skip(true);
        assert_eq!(position(&transport), (1, 0));
    }

    #[test]
    fn test_skip_backward_before_start() {
        let (mut transport, _engine) = transport();
        transport.init(book(&[30_000, 30_000]));

        let second = transport.book().unwrap().chapters()[1].id;

        // more than 2s in: back to the chapter start
        transport.change_position(5000, Some(second));
        transport.skip(false);
        assert_eq!(position(&transport), (1, 0));

        // at the start: previous chapter, one seek time before its end
        transport.skip(false);
        assert_eq!(position(&transport), (0, 10_000));
    }

    #[test]
    fn test_previous_to_chapter_start() {
        let (mut transport, _engine) = transport();
        transport.init(book(&[30_000, 30_000]));
        let second = transport.book().unwrap().chapters()[1].id;
        transport.change_position(1000, Some(second));

        transport.previous(true);
        assert_eq!(position(&transport), (0, 0));

        // first chapter, near the start: stays at 0
        transport.previous(true);
        assert_eq!(position(&transport), (0, 0));
    }

    #[test]
    fn test_previous_by_marks() {
        let (mut transport, _engine) = transport();
        let chapter = Chapter::new(
            "Marked",
            30_000,
            vec![Mark::new(0, "a"), Mark::new(5000, "b"), Mark::new(12_000, "c")],
        )
        .unwrap();
        transport.init(Book::new("Marked", vec![chapter]).unwrap());
        transport.change_position(13_500, None);

        transport.previous(false);
        assert_eq!(position(&transport), (0, 5000));
    }

    #[test]
    fn test_next_in_last_chapter_is_noop() {
        let (mut transport, engine) = transport();
        transport.init(book(&[3000]));
        transport.change_position(1000, None);
        engine.clear();

        transport.next();
        assert_eq!(position(&transport), (0, 1000));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_change_position_clamps() {
        let (mut transport, _engine) = transport();
        transport.init(book(&[3000, 4000]));

        transport.change_position(-500, None);
        assert_eq!(position(&transport), (0, 0));

        transport.change_position(99_999, None);
        assert_eq!(position(&transport), (0, 3000));
    }

    #[test]
    fn test_change_position_unknown_chapter_keeps_current() {
        let (mut transport, _engine) = transport();
        transport.init(book(&[3000, 4000]));

        transport.change_position(1200, Some(ChapterId::new()));
        assert_eq!(position(&transport), (0, 1200));
    }

    #[test]
    fn test_speed_and_gain_are_clamped() {
        let (mut transport, engine) = transport();
        transport.init(book(&[3000]));
        engine.clear();

        transport.set_playback_speed(3.5);
        transport.set_playback_speed(f32::NAN);
        transport.set_loudness_gain(5000);
        transport.set_loudness_gain(-20);
        transport.set_skip_silence(true);

        assert_eq!(
            engine.calls(),
            vec!["speed 2", "gain 900", "gain 0", "silence true"]
        );
        let settings = &transport.book().unwrap().settings;
        assert_eq!(settings.speed.value(), 2.0);
        assert!(settings.skip_silence);
    }

    #[test]
    fn test_prepare_failure_needs_reinit() {
        let (mut transport, engine) = transport();
        let mut transitions = transport.subscribe_transitions();
        engine.0.lock().fail_prepare = true;

        transport.init(book(&[3000]));

        assert_eq!(transport.state(), PlaybackState::Idle);
        assert!(transport.snapshot().needs_reinit);
        let transition = transitions.try_recv().unwrap();
        assert!(matches!(transition.cause, TransitionCause::EngineError(_)));

        engine.0.lock().fail_prepare = false;
        transport.play();
        assert_eq!(transport.state(), PlaybackState::Playing);
        assert!(!transport.snapshot().needs_reinit);
    }

    #[test]
    fn test_engine_error_while_playing() {
        let (mut transport, _engine) = transport();
        let mut transitions = transport.subscribe_transitions();
        transport.init(book(&[3000]));
        transport.play();
        while transitions.try_recv().is_ok() {}

        transport.handle_event(EngineEvent::Error(EngineError::OutputError(
            "underrun".to_string(),
        )));

        let transition = transitions.try_recv().unwrap();
        assert_eq!(transition.from, PlaybackState::Playing);
        assert_eq!(transition.to, PlaybackState::Idle);
        assert!(transport.snapshot().needs_reinit);
    }

    #[test]
    fn test_play_failure_stops() {
        let (mut transport, engine) = transport();
        transport.init(book(&[3000]));
        engine.0.lock().fail_play = true;

        transport.play();
        assert_eq!(transport.state(), PlaybackState::Idle);
        assert!(engine.calls().contains(&"stop".to_string()));
    }

    #[test]
    fn test_ended_then_play_restarts_book() {
        let (mut transport, engine) = transport();
        transport.init(book(&[3000, 4000]));
        transport.play();

        transport.handle_event(EngineEvent::Ended);
        assert_eq!(transport.state(), PlaybackState::Ended);
        assert_eq!(position(&transport), (1, 4000));

        engine.clear();
        transport.play();
        assert_eq!(transport.state(), PlaybackState::Playing);
        assert_eq!(position(&transport), (0, 0));
        assert_eq!(engine.calls(), vec!["seek 0 0", "play"]);
    }

    #[test]
    fn test_seek_while_ended_pauses() {
        let (mut transport, _engine) = transport();
        transport.init(book(&[3000, 4000]));
        transport.play();
        transport.handle_event(EngineEvent::Ended);

        transport.change_position(0, None);
        assert_eq!(transport.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_discontinuity_updates_position() {
        let (mut transport, _engine) = transport();
        let snapshots = transport.subscribe();
        transport.init(book(&[3000, 4000]));
        transport.play();

        transport.handle_event(EngineEvent::Discontinuity {
            chapter_index: 1,
            position_ms: 0,
        });

        let snapshot = snapshots.borrow().position.unwrap();
        assert_eq!(snapshot.chapter_index, 1);
        assert_eq!(snapshot.global_position_ms, 3000);
    }

    #[test]
    fn test_interrupt_resumes_on_matching_end() {
        let (mut transport, _engine) = transport();
        transport.init(book(&[30_000]));
        transport.play();

        transport.pause_for(InterruptKind::Call);
        assert_eq!(
            transport.snapshot().pause_reason,
            PauseReason::ExternalInterrupt(InterruptKind::Call)
        );

        transport.interrupt_ended(InterruptKind::AudioFocusLoss);
        assert_eq!(transport.state(), PlaybackState::Paused);

        transport.interrupt_ended(InterruptKind::Call);
        assert_eq!(transport.state(), PlaybackState::Playing);
        assert_eq!(transport.snapshot().pause_reason, PauseReason::None);
    }

    #[test]
    fn test_headset_replug_respects_setting() {
        let engine = FakeEngine::default();
        let config = TransportConfig {
            resume_on_replug: false,
            ..TransportConfig::default()
        };
        let mut transport = Transport::new(engine, config);
        transport.init(book(&[30_000]));
        transport.play();

        transport.pause_for(InterruptKind::Headset);
        transport.interrupt_ended(InterruptKind::Headset);

        assert_eq!(transport.state(), PlaybackState::Paused);
        assert_eq!(transport.snapshot().pause_reason, PauseReason::None);
    }

    #[test]
    fn test_stop_releases_engine_and_keeps_position() {
        let (mut transport, engine) = transport();
        transport.init(book(&[30_000]));
        transport.play();
        engine.set_position(0, 12_000);

        transport.stop();

        assert_eq!(transport.state(), PlaybackState::Idle);
        assert!(!transport.snapshot().needs_reinit);
        assert_eq!(position(&transport), (0, 12_000));

        engine.clear();
        transport.play();
        assert!(engine.calls().contains(&"seek 0 12000".to_string()));
    }

    #[test]
    fn test_set_volume_clamps() {
        let (mut transport, engine) = transport();
        transport.init(book(&[3000]));
        engine.clear();

        transport.set_volume(1.5);
        transport.set_volume(f32::NAN);
        transport.set_volume(0.25);
        assert_eq!(engine.calls(), vec!["volume 1", "volume 0.25"]);
    }

    #[test]
    fn test_events_after_stop_are_dropped() {
        let (mut transport, _engine) = transport();
        transport.init(book(&[3000]));
        transport.stop();

        transport.handle_event(EngineEvent::Ended);
        assert_eq!(transport.state(), PlaybackState::Idle);
    }
}
