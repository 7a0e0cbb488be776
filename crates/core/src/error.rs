//! Error taxonomy for the playback core
//!
//! None of these errors reach the caller of a transport command. They exist so
//! that the layers below the transport can report *what* went wrong, and the
//! transport can decide how to degrade:
//! - **Recoverable**: clamped or reset locally, logged, never surfaced
//! - **Degraded**: playback stops and observers see a non-playing state
//!
//! Each error carries the recovery action the transport applies.

use crate::types::{BookId, ChapterId};
use std::fmt;
use thiserror::Error;

/// What the transport does when an error is raised below it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Clamp the request into the valid range and carry on
    ClampToBounds,
    /// Reset the book to chapter 0 / position 0
    ResetPosition,
    /// Stop playback and re-prepare the engine on the next command
    ReinitializeOnNextCommand,
    /// Drop the request
    Ignore,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClampToBounds => write!(f, "Clamping to valid bounds"),
            Self::ResetPosition => write!(f, "Resetting to the start of the book"),
            Self::ReinitializeOnNextCommand => write!(f, "Re-initializing on next command"),
            Self::Ignore => write!(f, "Ignoring request"),
        }
    }
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Recovered locally without any visible change
    Recoverable,
    /// Playback stopped, visible as a state change
    Degraded,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable => write!(f, "Recoverable"),
            Self::Degraded => write!(f, "Degraded"),
        }
    }
}

/// Main error type for the playback core
#[derive(Error, Debug)]
pub enum PlayerError {
    /// The audio engine failed to prepare, seek or play
    #[error("Engine failure: {message}")]
    EngineFailure {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Seek target outside the chapter
    #[error("Invalid seek target: {position_ms}ms (chapter duration: {duration_ms}ms)")]
    InvalidSeekTarget { position_ms: i64, duration_ms: u64 },

    /// Seek to a chapter the book does not contain
    #[error("Unknown chapter {chapter} in book {book}")]
    UnknownChapter { book: BookId, chapter: ChapterId },

    /// Current chapter/position not found in the supplied chapter list
    #[error("Inconsistent book {book}: {reason}")]
    InconsistentBook { book: BookId, reason: String },

    /// Invalid argument to a command (speed, gain, ...)
    #[error("Invalid argument: {argument} - {reason}")]
    InvalidArgument { argument: String, reason: String },
}

impl PlayerError {
    /// Returns the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::EngineFailure { .. } => ErrorSeverity::Degraded,
            Self::InvalidSeekTarget { .. }
            | Self::UnknownChapter { .. }
            | Self::InconsistentBook { .. }
            | Self::InvalidArgument { .. } => ErrorSeverity::Recoverable,
        }
    }

    /// Returns the recovery action the transport applies
    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            Self::EngineFailure { .. } => RecoveryAction::ReinitializeOnNextCommand,
            Self::InvalidSeekTarget { .. } | Self::UnknownChapter { .. } => {
                RecoveryAction::ClampToBounds
            }
            Self::InconsistentBook { .. } => RecoveryAction::ResetPosition,
            Self::InvalidArgument { .. } => RecoveryAction::Ignore,
        }
    }

    /// Returns true if this error stops playback
    pub fn stops_playback(&self) -> bool {
        self.severity() == ErrorSeverity::Degraded
    }

    /// Helper to wrap an engine error
    pub fn engine<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::EngineFailure {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Helper for an inconsistent book
    pub fn inconsistent(book: BookId, reason: impl Into<String>) -> Self {
        Self::InconsistentBook {
            book,
            reason: reason.into(),
        }
    }

    /// Helper for an invalid argument
    pub fn invalid_argument(argument: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for Results using PlayerError
pub type Result<T> = std::result::Result<T, PlayerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io;

    #[test]
    fn test_recovery_action_display() {
        assert_eq!(
            RecoveryAction::ClampToBounds.to_string(),
            "Clamping to valid bounds"
        );
        assert_eq!(
            RecoveryAction::ReinitializeOnNextCommand.to_string(),
            "Re-initializing on next command"
        );
    }

    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Recoverable < ErrorSeverity::Degraded);
    }

    #[test]
    fn test_engine_failure_stops_playback() {
        let err = PlayerError::engine(
            "prepare failed",
            io::Error::new(io::ErrorKind::InvalidData, "bad header"),
        );
        assert_eq!(err.severity(), ErrorSeverity::Degraded);
        assert_eq!(
            err.recovery_action(),
            RecoveryAction::ReinitializeOnNextCommand
        );
        assert!(err.stops_playback());
        assert!(err.source().is_some());
    }

    #[test]
    fn test_seek_errors_are_clamped() {
        let err = PlayerError::InvalidSeekTarget {
            position_ms: 5000,
            duration_ms: 3000,
        };
        assert_eq!(err.recovery_action(), RecoveryAction::ClampToBounds);
        assert!(!err.stops_playback());

        let display = err.to_string();
        assert!(display.contains("5000"));
        assert!(display.contains("3000"));

        let err = PlayerError::UnknownChapter {
            book: BookId::new(),
            chapter: ChapterId::new(),
        };
        assert_eq!(err.recovery_action(), RecoveryAction::ClampToBounds);
    }

    #[test]
    fn test_inconsistent_book_resets() {
        let err = PlayerError::inconsistent(BookId::new(), "chapter index 7 out of range");
        assert_eq!(err.recovery_action(), RecoveryAction::ResetPosition);
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_invalid_argument_is_ignored() {
        let err = PlayerError::invalid_argument("speed", "not a finite number");
        assert_eq!(err.recovery_action(), RecoveryAction::Ignore);
        assert_eq!(err.severity(), ErrorSeverity::Recoverable);
    }
}
