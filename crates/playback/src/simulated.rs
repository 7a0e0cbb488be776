//! An engine that plays silence on the tokio clock
//!
//! Time advances lazily: the engine works out how far it got whenever it is
//! asked for its position or told to change something. Crossing a chapter
//! end reports a discontinuity, finishing the last chapter reports `Ended`.

use crate::engine::{check_seek, Engine, EngineEvent, EnginePosition, EventSender};
use crate::error::{EngineError, EngineResult};
use lectern_core::Chapter;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Instant;

/// What the simulated engine currently does
#[derive(Debug, Clone, PartialEq)]
pub struct EngineProbe {
    pub prepared: bool,
    pub playing: bool,
    pub volume: f32,
    pub speed: f32,
    pub loudness_gain_mb: u32,
    pub skip_silence: bool,
    pub prepare_count: usize,
    pub seek_count: usize,
}

impl Default for EngineProbe {
    fn default() -> Self {
        Self {
            prepared: false,
            playing: false,
            volume: 1.0,
            speed: 1.0,
            loudness_gain_mb: 0,
            skip_silence: false,
            prepare_count: 0,
            seek_count: 0,
        }
    }
}

struct Shared {
    probe: EngineProbe,
    fail_next_prepare: bool,
}

/// Inspects and disturbs a [`SimulatedEngine`] from outside the transport
#[derive(Clone)]
pub struct SimulatedControl {
    shared: Arc<Mutex<Shared>>,
    events: EventSender,
}

impl SimulatedControl {
    pub fn probe(&self) -> EngineProbe {
        self.shared.lock().probe.clone()
    }

    /// Makes the next `prepare` fail
    pub fn fail_next_prepare(&self) {
        self.shared.lock().fail_next_prepare = true;
    }

    /// Reports an output failure as if the device went away
    pub fn inject_error(&self, message: impl Into<String>) {
        let event = EngineEvent::Error(EngineError::OutputError(message.into()));
        if self.events.send(event).is_err() {
            log::debug!("Injected error dropped, transport is gone");
        }
    }
}

pub struct SimulatedEngine {
    durations: Vec<u64>,
    chapter_index: usize,
    offset_ms: u64,
    playing_since: Option<Instant>,
    speed: f32,
    events: EventSender,
    shared: Arc<Mutex<Shared>>,
}

impl SimulatedEngine {
    pub fn new(events: EventSender) -> (Self, SimulatedControl) {
        let shared = Arc::new(Mutex::new(Shared {
            probe: EngineProbe::default(),
            fail_next_prepare: false,
        }));
        let control = SimulatedControl {
            shared: Arc::clone(&shared),
            events: events.clone(),
        };

        let engine = Self {
            durations: Vec::new(),
            chapter_index: 0,
            offset_ms: 0,
            playing_since: None,
            speed: 1.0,
            events,
            shared,
        };
        (engine, control)
    }

    fn ensure_prepared(&self) -> EngineResult<()> {
        if self.durations.is_empty() {
            Err(EngineError::NotPrepared)
        } else {
            Ok(())
        }
    }

    fn emit(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            log::debug!("Engine event dropped, transport is gone");
        }
    }

    fn set_playing(&mut self, playing: bool) {
        self.playing_since = playing.then(Instant::now);
        self.shared.lock().probe.playing = playing;
    }

    fn advance(&mut self) {
        let Some(since) = self.playing_since else {
            return;
        };

        let now = Instant::now();
        let played = now.duration_since(since).as_millis() as f64 * f64::from(self.speed);
        if played < 1.0 {
            return;
        }
        self.playing_since = Some(now);
        self.offset_ms += played as u64;

        while let Some(&duration) = self.durations.get(self.chapter_index) {
            if self.offset_ms < duration {
                break;
            }

            if self.chapter_index + 1 < self.durations.len() {
                self.offset_ms -= duration;
                self.chapter_index += 1;
                self.emit(EngineEvent::Discontinuity {
                    chapter_index: self.chapter_index,
                    position_ms: self.offset_ms,
                });
            } else {
                self.offset_ms = duration;
                self.set_playing(false);
                self.emit(EngineEvent::Ended);
                break;
            }
        }
    }
}

impl Engine for SimulatedEngine {
    fn prepare(&mut self, chapters: &[Chapter]) -> EngineResult<()> {
        let mut shared = self.shared.lock();
        shared.probe.prepare_count += 1;
        if shared.fail_next_prepare {
            shared.fail_next_prepare = false;
            shared.probe.prepared = false;
            return Err(EngineError::PrepareError("simulated failure".to_string()));
        }
        shared.probe.prepared = true;
        shared.probe.playing = false;
        drop(shared);

        self.durations = chapters.iter().map(|c| c.duration_ms).collect();
        self.chapter_index = 0;
        self.offset_ms = 0;
        self.playing_since = None;
        Ok(())
    }

    fn play(&mut self) -> EngineResult<()> {
        self.ensure_prepared()?;
        if self.playing_since.is_none() {
            self.set_playing(true);
        }
        Ok(())
    }

    fn pause(&mut self) -> EngineResult<()> {
        self.ensure_prepared()?;
        self.advance();
        self.set_playing(false);
        Ok(())
    }

    fn stop(&mut self) {
        self.durations.clear();
        self.chapter_index = 0;
        self.offset_ms = 0;
        self.playing_since = None;

        let mut shared = self.shared.lock();
        shared.probe.prepared = false;
        shared.probe.playing = false;
    }

    fn seek(&mut self, chapter_index: usize, offset_ms: u64) -> EngineResult<()> {
        self.ensure_prepared()?;
        check_seek(&self.durations, chapter_index, offset_ms)?;

        self.chapter_index = chapter_index;
        self.offset_ms = offset_ms;
        if self.playing_since.is_some() {
            self.playing_since = Some(Instant::now());
        }
        self.shared.lock().probe.seek_count += 1;
        Ok(())
    }

    fn position(&mut self) -> EnginePosition {
        self.advance();
        EnginePosition {
            chapter_index: self.chapter_index,
            offset_ms: self.offset_ms,
        }
    }

    fn set_speed(&mut self, speed: f32) -> EngineResult<()> {
        self.advance();
        self.speed = speed;
        self.shared.lock().probe.speed = speed;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> EngineResult<()> {
        self.shared.lock().probe.volume = volume;
        Ok(())
    }

    fn set_loudness_gain(&mut self, gain_mb: u32) -> EngineResult<()> {
        self.shared.lock().probe.loudness_gain_mb = gain_mb;
        Ok(())
    }

    fn set_skip_silence(&mut self, enabled: bool) -> EngineResult<()> {
        self.shared.lock().probe.skip_silence = enabled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::event_channel;
    use std::time::Duration;

    fn chapters(durations: &[u64]) -> Vec<Chapter> {
        durations
            .iter()
            .map(|&d| Chapter::new("Chapter", d, Vec::new()).unwrap())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_follows_clock_and_speed() {
        let (tx, _rx) = event_channel();
        let (mut engine, _control) = SimulatedEngine::new(tx);
        engine.prepare(&chapters(&[10_000])).unwrap();
        engine.play().unwrap();

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_eq!(engine.position().offset_ms, 1000);

        engine.set_speed(2.0).unwrap();
        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_eq!(engine.position().offset_ms, 3000);

        engine.pause().unwrap();
        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_eq!(engine.position().offset_ms, 3000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollover_and_end() {
        let (tx, mut rx) = event_channel();
        let (mut engine, control) = SimulatedEngine::new(tx);
        engine.prepare(&chapters(&[3000, 4000])).unwrap();
        engine.play().unwrap();

        tokio::time::advance(Duration::from_millis(3500)).await;
        assert_eq!(
            engine.position(),
            EnginePosition {
                chapter_index: 1,
                offset_ms: 500
            }
        );
        assert!(matches!(
            rx.try_recv(),
            Ok(EngineEvent::Discontinuity {
                chapter_index: 1,
                position_ms: 500
            })
        ));

        tokio::time::advance(Duration::from_millis(10_000)).await;
        assert_eq!(engine.position().offset_ms, 4000);
        assert!(matches!(rx.try_recv(), Ok(EngineEvent::Ended)));
        assert!(!control.probe().playing);
    }

    #[test]
    fn test_fail_next_prepare_once() {
        let (tx, _rx) = event_channel();
        let (mut engine, control) = SimulatedEngine::new(tx);
        control.fail_next_prepare();

        assert!(engine.prepare(&chapters(&[3000])).is_err());
        assert!(engine.prepare(&chapters(&[3000])).is_ok());
        assert_eq!(control.probe().prepare_count, 2);
    }

    #[test]
    fn test_requires_prepare() {
        let (tx, _rx) = event_channel();
        let (mut engine, _control) = SimulatedEngine::new(tx);
        assert!(matches!(engine.play(), Err(EngineError::NotPrepared)));
        assert!(engine.seek(0, 0).is_err());
    }

    #[test]
    fn test_seek_out_of_range() {
        let (tx, _rx) = event_channel();
        let (mut engine, _control) = SimulatedEngine::new(tx);
        engine.prepare(&chapters(&[3000])).unwrap();
        assert!(engine.seek(0, 3001).is_err());
        assert!(engine.seek(0, 2000).is_ok());
        assert_eq!(engine.position().offset_ms, 2000);
    }
}
