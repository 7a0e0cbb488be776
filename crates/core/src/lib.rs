//! Core domain types for the Lectern audiobook player

pub mod error;
pub mod types;

pub use error::{ErrorSeverity, PlayerError, RecoveryAction, Result};
pub use types::{
    format_position, Book, BookId, Bookmark, BookmarkId, Chapter, ChapterId, InterruptKind, Mark,
    PauseReason, PlaybackSettings, PlaybackSpeed, PlaybackState, PositionSnapshot,
    SleepTimerState, StateTransition, Timestamp, TransitionCause, TransportSnapshot, Validator,
};
