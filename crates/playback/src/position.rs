//! Position arithmetic over chapters and marks
//!
//! Pure functions, all in integer milliseconds. The transport decides what to
//! do with each outcome; nothing here touches the engine.

use lectern_core::{Book, Chapter, PlayerError, Result};

/// A press of "previous" within this distance of a mark start goes one mark
/// further back
pub const PREVIOUS_THRESHOLD_MS: u64 = 2000;

/// Where a "previous" press should land
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviousTarget {
    SeekWithinChapter(u64),
    GoToPreviousChapter,
    JumpToMarkStart(u64),
}

/// Where a "next" press should land
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextTarget {
    SeekTo(u64),
    GoToNextChapter,
}

/// Start and end of every chapter on the book timeline
pub fn chapter_boundaries(chapters: &[Chapter]) -> Vec<(u64, u64)> {
    let mut start = 0;
    chapters
        .iter()
        .map(|chapter| {
            let end = start + chapter.duration_ms;
            let bounds = (start, end);
            start = end;
            bounds
        })
        .collect()
}

/// Position from the start of the book
pub fn global_position(book: &Book) -> Result<u64> {
    let index = book.settings.chapter_index;
    let chapters = book.chapters();
    if index >= chapters.len() {
        return Err(PlayerError::inconsistent(
            book.id,
            format!("current chapter {} not in the chapter list", index),
        ));
    }

    let before: u64 = chapters[..index].iter().map(|c| c.duration_ms).sum();
    Ok(before + book.settings.position_ms)
}

/// Clamps a target into `[0, duration]`
pub fn seek_within_chapter(chapter: &Chapter, target_ms: i64) -> u64 {
    if target_ms <= 0 {
        0
    } else {
        (target_ms as u64).min(chapter.duration_ms)
    }
}

/// Resolves a "previous" press at `position_ms`
///
/// The first mark starting at or before the position wins when it started
/// more than `threshold_ms` ago. Otherwise the press goes to the mark before
/// it. Without a usable mark the press rewinds to the chapter start, or asks
/// for the previous chapter when already close to it.
pub fn previous_target(chapter: &Chapter, position_ms: u64, threshold_ms: u64) -> PreviousTarget {
    let marks = chapter.marks();

    if let Some(i) = marks.iter().rposition(|mark| mark.start_ms <= position_ms) {
        let start = marks[i].start_ms;
        if position_ms - start > threshold_ms {
            return PreviousTarget::JumpToMarkStart(start);
        }
        if i > 0 {
            return PreviousTarget::JumpToMarkStart(marks[i - 1].start_ms);
        }
    }

    if position_ms > threshold_ms {
        PreviousTarget::SeekWithinChapter(0)
    } else {
        PreviousTarget::GoToPreviousChapter
    }
}

/// Resolves a "next" press at `position_ms`
pub fn next_target(chapter: &Chapter, position_ms: u64) -> NextTarget {
    chapter
        .marks()
        .iter()
        .find(|mark| mark.start_ms > position_ms)
        .map_or(NextTarget::GoToNextChapter, |mark| {
            NextTarget::SeekTo(mark.start_ms)
        })
}

/// Rewinds `rewind_ms` without leaving the mark containing `position_ms`
pub fn auto_rewind_target(chapter: &Chapter, position_ms: u64, rewind_ms: u64) -> u64 {
    let position_ms = position_ms.min(chapter.duration_ms);
    let floor = chapter
        .mark_at(position_ms)
        .map_or(0, |mark| mark.start_ms);

    position_ms.saturating_sub(rewind_ms).max(floor)
}
