//! Playback-related domain models

use crate::error::PlayerError;
use crate::types::{BookId, ChapterId, Validator};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport state of the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PlaybackState {
    /// Engine not prepared for the current book
    #[default]
    Idle,
    Paused,
    Playing,
    /// Engine reached the end of the last chapter
    Ended,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Paused => write!(f, "paused"),
            Self::Playing => write!(f, "playing"),
            Self::Ended => write!(f, "ended"),
        }
    }
}

/// Source of an external interruption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterruptKind {
    /// Headset unplugged
    Headset,
    /// Incoming or ongoing call
    Call,
    /// Another app took audio focus
    AudioFocusLoss,
}

/// Why playback is paused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PauseReason {
    #[default]
    None,
    ExternalInterrupt(InterruptKind),
}

/// Playback speed multiplier
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct PlaybackSpeed(f32);

impl PlaybackSpeed {
    /// Lowest speed any engine is asked to play at
    pub const MIN: f32 = 0.25;
    /// Highest speed any engine is asked to play at
    pub const MAX: f32 = 4.0;

    /// Creates a new playback speed
    pub fn new(speed: f32) -> Result<Self, PlayerError> {
        if !speed.is_finite() || !(Self::MIN..=Self::MAX).contains(&speed) {
            Err(PlayerError::invalid_argument(
                "speed",
                format!("must be between {} and {}, got {}", Self::MIN, Self::MAX, speed),
            ))
        } else {
            Ok(Self(speed))
        }
    }

    /// Returns the speed value
    pub fn value(&self) -> f32 {
        self.0
    }

    /// Clamps the speed into `[min, max]`
    pub fn clamp(self, min: f32, max: f32) -> Self {
        Self(self.0.clamp(min, max))
    }
}

impl Default for PlaybackSpeed {
    fn default() -> Self {
        Self(1.0)
    }
}

impl Validator for PlaybackSpeed {
    fn validate(&self) -> Result<(), Vec<String>> {
        if !self.0.is_finite() || !(Self::MIN..=Self::MAX).contains(&self.0) {
            Err(vec![format!(
                "Speed must be between {} and {}",
                Self::MIN,
                Self::MAX
            )])
        } else {
            Ok(())
        }
    }
}

/// Immutable position inside the loaded book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub book_id: BookId,
    pub chapter_id: ChapterId,
    pub chapter_index: usize,
    pub chapter_duration_ms: u64,
    /// Position inside the current chapter
    pub position_ms: u64,
    /// Position from the start of the book
    pub global_position_ms: u64,
}

/// Everything an observer of the transport sees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TransportSnapshot {
    pub state: PlaybackState,
    pub pause_reason: PauseReason,
    /// The engine failed and is re-prepared on the next command
    pub needs_reinit: bool,
    /// `None` until a book is loaded
    pub position: Option<PositionSnapshot>,
}

/// What caused a state transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionCause {
    /// A user or timer command
    Command,
    /// The engine finished the last chapter
    EngineEnded,
    /// The engine failed
    EngineError(String),
    /// Explicit stop or teardown
    Stopped,
    /// External interruption (call, headset, focus loss)
    Interrupted(InterruptKind),
}

/// One step of the transport state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: PlaybackState,
    pub to: PlaybackState,
    pub cause: TransitionCause,
}

/// Sleep timer countdown state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepTimerState {
    /// -1 inactive, 0 expired, >0 counting down
    pub left_ms: i64,
    pub fading: bool,
    /// Counting down to the end of the current chapter
    pub eoc_pending: bool,
}

impl SleepTimerState {
    pub const INACTIVE: i64 = -1;

    pub fn inactive() -> Self {
        Self {
            left_ms: Self::INACTIVE,
            fading: false,
            eoc_pending: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.left_ms > 0
    }

    pub fn is_expired(&self) -> bool {
        self.left_ms == 0
    }
}

impl Default for SleepTimerState {
    fn default() -> Self {
        Self::inactive()
    }
}
