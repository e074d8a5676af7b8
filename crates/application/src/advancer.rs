//! Chapter changes driven by boundary sentinels in continuous modes.

use mangashelf_core::{ChapterId, ReadingMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterNavigation {
    Previous(ChapterId),
    Next(ChapterId),
}

impl ChapterNavigation {
    pub fn chapter_id(&self) -> ChapterId {
        match self {
            ChapterNavigation::Previous(id) | ChapterNavigation::Next(id) => *id,
        }
    }
}

/// Viewport intersection of the sentinels at the start of the next chapter
/// and the end of the previous chapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundaryVisibility {
    pub previous: bool,
    pub next: bool,
}

/// Turns sentinel visibility into at most one navigation per crossing.
///
/// A request fires on the rising edge of a sentinel. Until the requested
/// chapter becomes current, the same request is not repeated even if the
/// sentinel flickers.
#[derive(Debug, Default)]
pub struct InfiniteScrollAdvancer {
    last: BoundaryVisibility,
    pending: Option<ChapterNavigation>,
}

impl InfiniteScrollAdvancer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<ChapterNavigation> {
        self.pending
    }

    pub fn observe(
        &mut self,
        visibility: BoundaryVisibility,
        reading_mode: ReadingMode,
        current_chapter_id: ChapterId,
        previous_chapter_id: Option<ChapterId>,
        next_chapter_id: Option<ChapterId>,
    ) -> Option<ChapterNavigation> {
        let rose_previous = visibility.previous && !self.last.previous;
        let rose_next = visibility.next && !self.last.next;
        self.last = visibility;

        if self
            .pending
            .is_some_and(|pending| pending.chapter_id() == current_chapter_id)
        {
            self.pending = None;
        }

        if !reading_mode.is_continuous() {
            return None;
        }

        let candidate = if rose_next {
            next_chapter_id.map(ChapterNavigation::Next)
        } else if rose_previous {
            previous_chapter_id.map(ChapterNavigation::Previous)
        } else {
            None
        };
        let Some(candidate) = candidate else {
            return None;
        };

        if candidate.chapter_id() == current_chapter_id || self.pending == Some(candidate) {
            return None;
        }

        tracing::debug!(?candidate, "boundary crossed, requesting chapter change");
        self.pending = Some(candidate);
        Some(candidate)
    }

    /// Forgets edge history, e.g. after the reading mode changed.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
