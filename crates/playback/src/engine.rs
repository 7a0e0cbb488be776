//! The audio engine capability driven by the transport
//!
//! The transport owns exactly one engine and is the only caller. Anything the
//! engine notices on its own (end of the last chapter, a gapless move into
//! the next chapter, a decoder failure) comes back as an [`EngineEvent`] on
//! the channel handed to it at construction.

use crate::error::{EngineError, EngineResult};
use lectern_core::Chapter;
use tokio::sync::mpsc;

/// Position reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnginePosition {
    pub chapter_index: usize,
    pub offset_ms: u64,
}

/// Something the engine did without being asked
#[derive(Debug)]
pub enum EngineEvent {
    /// The engine moved by itself, e.g. a gapless chapter transition
    Discontinuity { chapter_index: usize, position_ms: u64 },
    /// Finished the last chapter
    Ended,
    /// Playback failed; the engine must be prepared again
    Error(EngineError),
}

pub type EventSender = mpsc::UnboundedSender<EngineEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Creates the channel an engine reports its events on
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// An opaque audio decoding and output capability
///
/// Chapters are addressed by their index in the slice given to
/// [`prepare`](Engine::prepare).
pub trait Engine: Send + 'static {
    /// Loads the chapter sources, replacing anything loaded before
    fn prepare(&mut self, chapters: &[Chapter]) -> EngineResult<()>;

    fn play(&mut self) -> EngineResult<()>;

    fn pause(&mut self) -> EngineResult<()>;

    /// Releases the sources; `prepare` is required before the next `play`
    fn stop(&mut self);

    fn seek(&mut self, chapter_index: usize, offset_ms: u64) -> EngineResult<()>;

    fn position(&mut self) -> EnginePosition;

    fn set_speed(&mut self, speed: f32) -> EngineResult<()>;

    /// Output volume multiplier in `[0.0, 1.0]`
    fn set_volume(&mut self, volume: f32) -> EngineResult<()>;

    /// Loudness enhancement in millibels
    fn set_loudness_gain(&mut self, gain_mb: u32) -> EngineResult<()>;

    fn set_skip_silence(&mut self, enabled: bool) -> EngineResult<()>;
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn prepare(&mut self, chapters: &[Chapter]) -> EngineResult<()> {
        (**self).prepare(chapters)
    }

    fn play(&mut self) -> EngineResult<()> {
        (**self).play()
    }

    fn pause(&mut self) -> EngineResult<()> {
        (**self).pause()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn seek(&mut self, chapter_index: usize, offset_ms: u64) -> EngineResult<()> {
        (**self).seek(chapter_index, offset_ms)
    }

    fn position(&mut self) -> EnginePosition {
        (**self).position()
    }

    fn set_speed(&mut self, speed: f32) -> EngineResult<()> {
        (**self).set_speed(speed)
    }

    fn set_volume(&mut self, volume: f32) -> EngineResult<()> {
        (**self).set_volume(volume)
    }

    fn set_loudness_gain(&mut self, gain_mb: u32) -> EngineResult<()> {
        (**self).set_loudness_gain(gain_mb)
    }

    fn set_skip_silence(&mut self, enabled: bool) -> EngineResult<()> {
        (**self).set_skip_silence(enabled)
    }
}

/// Checks a seek request against the prepared chapter durations
pub(crate) fn check_seek(
    durations: &[u64],
    chapter_index: usize,
    offset_ms: u64,
) -> EngineResult<()> {
    match durations.get(chapter_index) {
        Some(&duration) if offset_ms <= duration => Ok(()),
        _ => Err(EngineError::SeekError {
            chapter_index,
            offset_ms,
        }),
    }
}
