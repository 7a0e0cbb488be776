//! Domain types for Lectern
//!
//! - `book`: Book, Chapter, Mark and per-book playback settings
//! - `playback`: transport state, snapshots and sleep timer state
//! - `bookmark`: bookmarks created by the player
//! - `common`: shared traits and utilities

mod book;
mod bookmark;
mod common;
mod playback;

pub use book::{Book, BookId, Chapter, ChapterId, Mark, PlaybackSettings};
pub use bookmark::{Bookmark, BookmarkId};
pub use common::{format_position, Timestamp, Validator};
pub use playback::{
    InterruptKind, PauseReason, PlaybackSpeed, PlaybackState, PositionSnapshot, SleepTimerState,
    StateTransition, TransitionCause, TransportSnapshot,
};
