//! Bookmark domain model

use crate::types::{BookId, ChapterId, Timestamp, Validator};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a bookmark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookmarkId(Uuid);

impl BookmarkId {
    /// Creates a new random BookmarkId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the BookmarkId as a string
    pub fn as_string(&self) -> String {
        self.0.to_string()
    }
}

impl Default for BookmarkId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A bookmark at a chapter-relative position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: BookmarkId,
    pub book_id: BookId,
    pub chapter_id: ChapterId,
    pub position_ms: u64,
    pub title: String,
    pub created_at: Timestamp,
}

impl Bookmark {
    /// Creates a new bookmark at the specified position
    pub fn new(
        book_id: BookId,
        chapter_id: ChapterId,
        position_ms: u64,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: BookmarkId::new(),
            book_id,
            chapter_id,
            position_ms,
            title: title.into(),
            created_at: Timestamp::now(),
        }
    }
}

impl Validator for Bookmark {
    fn validate(&self) -> Result<(), Vec<String>> {
        if self.title.trim().is_empty() {
            Err(vec!["Bookmark title cannot be empty".to_string()])
        } else {
            Ok(())
        }
    }
}
