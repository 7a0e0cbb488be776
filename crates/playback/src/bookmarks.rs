//! Where the sleep timer leaves its bookmarks

use lectern_core::Bookmark;
use parking_lot::Mutex;

/// Receives bookmarks created by the playback core
pub trait BookmarkSink: Send + Sync + 'static {
    fn add(&self, bookmark: Bookmark);
}

/// Keeps bookmarks in memory, newest last
#[derive(Debug, Default)]
pub struct MemoryBookmarks {
    bookmarks: Mutex<Vec<Bookmark>>,
}

impl MemoryBookmarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Bookmark> {
        self.bookmarks.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.bookmarks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookmarks.lock().is_empty()
    }
}

impl BookmarkSink for MemoryBookmarks {
    fn add(&self, bookmark: Bookmark) {
        log::info!(
            "Bookmark \"{}\" at {}",
            bookmark.title,
            lectern_core::format_position(bookmark.position_ms)
        );
        self.bookmarks.lock().push(bookmark);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::{BookId, ChapterId};

    #[test]
    fn test_memory_bookmarks() {
        let sink = MemoryBookmarks::new();
        assert!(sink.is_empty());

        sink.add(Bookmark::new(BookId::new(), ChapterId::new(), 1500, "First"));
        sink.add(Bookmark::new(BookId::new(), ChapterId::new(), 300, "Second"));

        assert_eq!(sink.count(), 2);
        assert_eq!(sink.all()[1].title, "Second");
    }
}
