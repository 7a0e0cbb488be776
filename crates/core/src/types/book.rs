//! Book, chapter and mark domain models

use crate::error::PlayerError;
use crate::types::{PlaybackSpeed, Validator};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookId(Uuid);

impl BookId {
    /// Creates a new random BookId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a BookId from a UUID string
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Returns the BookId as a string
    pub fn as_string(&self) -> String {
        self.0.to_string()
    }
}

impl Default for BookId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a chapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChapterId(Uuid);

impl ChapterId {
    /// Creates a new random ChapterId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a ChapterId from a UUID string
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Returns the ChapterId as a string
    pub fn as_string(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ChapterId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChapterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named sub-chapter position, e.g. a track segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mark {
    pub start_ms: u64,
    pub name: String,
}

impl Mark {
    pub fn new(start_ms: u64, name: impl Into<String>) -> Self {
        Self {
            start_ms,
            name: name.into(),
        }
    }
}

/// A chapter of an audiobook, backed by one engine source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: ChapterId,
    pub title: String,
    pub duration_ms: u64,
    marks: Vec<Mark>,
}

impl Chapter {
    /// Creates a chapter, sorting the marks and dropping those that start at
    /// or beyond the end of the chapter
    pub fn new(
        title: impl Into<String>,
        duration_ms: u64,
        marks: Vec<Mark>,
    ) -> Result<Self, PlayerError> {
        Self::with_id(ChapterId::new(), title, duration_ms, marks)
    }

    /// Creates a chapter with a catalog-supplied id
    pub fn with_id(
        id: ChapterId,
        title: impl Into<String>,
        duration_ms: u64,
        mut marks: Vec<Mark>,
    ) -> Result<Self, PlayerError> {
        if duration_ms == 0 {
            return Err(PlayerError::invalid_argument(
                "duration_ms",
                "chapter duration must be greater than zero",
            ));
        }

        marks.retain(|mark| mark.start_ms < duration_ms);
        marks.sort_by_key(|mark| mark.start_ms);

        Ok(Self {
            id,
            title: title.into(),
            duration_ms,
            marks,
        })
    }

    /// The explicit marks of this chapter, ascending by start
    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    /// The marks used for navigation: a chapter without marks behaves like a
    /// single mark spanning the whole chapter
    pub fn effective_marks(&self) -> Vec<Mark> {
        if self.marks.is_empty() {
            vec![Mark::new(0, self.title.clone())]
        } else {
            self.marks.clone()
        }
    }

    /// The mark containing `position_ms`, if any mark starts at or before it
    pub fn mark_at(&self, position_ms: u64) -> Option<&Mark> {
        self.marks
            .iter()
            .rev()
            .find(|mark| mark.start_ms <= position_ms)
    }
}

impl Validator for Chapter {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.duration_ms == 0 {
            errors.push("Chapter duration must be greater than zero".to_string());
        }

        if self.marks.windows(2).any(|pair| pair[0].start_ms > pair[1].start_ms) {
            errors.push("Marks must be sorted by start".to_string());
        }

        if self.marks.iter().any(|mark| mark.start_ms >= self.duration_ms) {
            errors.push("Marks must start before the end of the chapter".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Mutable per-book playback settings, persisted by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    pub chapter_index: usize,
    pub position_ms: u64,
    pub speed: PlaybackSpeed,
    /// Loudness enhancement in millibels
    pub loudness_gain_mb: u32,
    pub skip_silence: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            chapter_index: 0,
            position_ms: 0,
            speed: PlaybackSpeed::default(),
            loudness_gain_mb: 0,
            skip_silence: false,
        }
    }
}

/// An audiobook as supplied by the catalog
///
/// The chapter list is never empty; `Book::new` enforces it.
#[derive(Debug, Clone, Serialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    chapters: Vec<Chapter>,
    pub settings: PlaybackSettings,
}

impl Book {
    /// Creates a book positioned at the start of its first chapter
    pub fn new(title: impl Into<String>, chapters: Vec<Chapter>) -> Result<Self, PlayerError> {
        Self::with_id(BookId::new(), title, chapters)
    }

    /// Creates a book with a catalog-supplied id
    pub fn with_id(
        id: BookId,
        title: impl Into<String>,
        chapters: Vec<Chapter>,
    ) -> Result<Self, PlayerError> {
        if chapters.is_empty() {
            return Err(PlayerError::inconsistent(id, "book has no chapters"));
        }

        Ok(Self {
            id,
            title: title.into(),
            chapters,
            settings: PlaybackSettings::default(),
        })
    }

    /// Replaces the persisted playback settings
    pub fn with_settings(mut self, settings: PlaybackSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// Index of the current chapter, clamped into the chapter list
    pub fn current_index(&self) -> usize {
        self.settings.chapter_index.min(self.chapters.len() - 1)
    }

    pub fn current_chapter(&self) -> &Chapter {
        &self.chapters[self.current_index()]
    }

    pub fn chapter_index_of(&self, id: ChapterId) -> Option<usize> {
        self.chapters.iter().position(|chapter| chapter.id == id)
    }

    /// Total duration of all chapters
    pub fn duration_ms(&self) -> u64 {
        self.chapters.iter().map(|chapter| chapter.duration_ms).sum()
    }

    /// True when both books describe the same engine sources
    pub fn same_chapters(&self, other: &Book) -> bool {
        self.chapters.len() == other.chapters.len()
            && self
                .chapters
                .iter()
                .zip(&other.chapters)
                .all(|(a, b)| a.id == b.id && a.duration_ms == b.duration_ms)
    }

    /// Restores the position invariant after a catalog edit
    ///
    /// A chapter index outside the chapter list resets the book to its start;
    /// a position beyond the chapter end is clamped. Returns the problem that
    /// was repaired, if any.
    pub fn repair(&mut self) -> Option<PlayerError> {
        if self.settings.chapter_index >= self.chapters.len() {
            let err = PlayerError::inconsistent(
                self.id,
                format!(
                    "chapter index {} out of range for {} chapters",
                    self.settings.chapter_index,
                    self.chapters.len()
                ),
            );
            self.settings.chapter_index = 0;
            self.settings.position_ms = 0;
            return Some(err);
        }

        let duration_ms = self.current_chapter().duration_ms;
        if self.settings.position_ms > duration_ms {
            let err = PlayerError::InvalidSeekTarget {
                position_ms: self.settings.position_ms as i64,
                duration_ms,
            };
            self.settings.position_ms = duration_ms;
            return Some(err);
        }

        None
    }
}
