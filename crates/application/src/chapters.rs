//! Ordered chapter window (previous/current/next) for a reader session.

use mangashelf_core::{Chapter, ChapterId, ReadingMode, ResumeMode};

use crate::ChapterNavigation;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReaderChaptersWindow {
    /// Server order, newest first.
    pub manga_chapters: Vec<Chapter>,
    /// `manga_chapters` with duplicate releases removed.
    pub chapters: Vec<Chapter>,
    pub initial_chapter: Option<Chapter>,
    pub current_chapter: Option<Chapter>,
    pub previous_chapter: Option<Chapter>,
    pub next_chapter: Option<Chapter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Offset {
    Previous,
    Next,
}

/// Builds the chapter window around the chapter at `chapter_source_order`.
///
/// `chapter_list` is newest first, so the chapter with source order `n` sits
/// at `len - n`. With `skip_dup_chapters` the neighbours skip other releases
/// of the current chapter and prefer the scanlator of `skip_dupe_chapter`
/// (the initial chapter, falling back to the current one).
pub fn derive_chapters_window(
    chapter_list: &[Chapter],
    chapter_source_order: u32,
    skip_dup_chapters: bool,
    skip_dupe_chapter: Option<&Chapter>,
) -> ReaderChaptersWindow {
    let current_pos = chapter_list
        .len()
        .checked_sub(chapter_source_order as usize)
        .filter(|pos| *pos < chapter_list.len());
    let current_chapter = current_pos.map(|pos| chapter_list[pos].clone());
    let initial_chapter = skip_dupe_chapter.cloned().or_else(|| current_chapter.clone());

    let (previous_chapter, next_chapter) = match (current_pos, initial_chapter.as_ref()) {
        (Some(pos), Some(anchor)) => (
            neighbour(chapter_list, pos, Offset::Previous, skip_dup_chapters, anchor),
            neighbour(chapter_list, pos, Offset::Next, skip_dup_chapters, anchor),
        ),
        _ => (None, None),
    };

    let chapters = match initial_chapter.as_ref() {
        Some(anchor) => remove_duplicates(anchor, chapter_list),
        None => Vec::new(),
    };

    ReaderChaptersWindow {
        manga_chapters: chapter_list.to_vec(),
        chapters,
        initial_chapter,
        current_chapter,
        previous_chapter,
        next_chapter,
    }
}

fn neighbour(
    chapter_list: &[Chapter],
    from_pos: usize,
    offset: Offset,
    skip_dupe: bool,
    anchor: &Chapter,
) -> Option<Chapter> {
    let from = &chapter_list[from_pos];
    let mut candidates: Box<dyn Iterator<Item = &Chapter> + '_> = match offset {
        Offset::Next => Box::new(chapter_list[..from_pos].iter().rev()),
        Offset::Previous => Box::new(chapter_list[from_pos + 1..].iter()),
    };

    if !skip_dupe {
        return candidates.next().cloned();
    }

    let first = candidates.find(|chapter| !chapter.is_duplicate_of(from))?;
    let preferred = chapter_list
        .iter()
        .filter(|chapter| chapter.is_duplicate_of(first))
        .find(|chapter| chapter.is_same_scanlator(anchor));
    Some(preferred.unwrap_or(first).clone())
}

/// Keeps one release per chapter: the anchor itself, else the release from
/// the anchor's scanlator, else the earliest release.
pub fn remove_duplicates(anchor: &Chapter, chapter_list: &[Chapter]) -> Vec<Chapter> {
    let representative = |chapter: &Chapter| -> ChapterId {
        let dupes: Vec<&Chapter> = chapter_list
            .iter()
            .filter(|other| other.is_duplicate_of(chapter))
            .collect();
        if dupes.iter().any(|dupe| dupe.id == anchor.id) {
            return anchor.id;
        }
        if let Some(same) = dupes.iter().find(|dupe| dupe.is_same_scanlator(anchor)) {
            return same.id;
        }
        dupes
            .iter()
            .min_by_key(|dupe| dupe.source_order)
            .map(|dupe| dupe.id)
            .unwrap_or(chapter.id)
    };

    chapter_list
        .iter()
        .filter(|chapter| representative(chapter) == chapter.id)
        .cloned()
        .collect()
}

/// Range of mounted chapters plus a pending scroll request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibleChapters {
    pub leading_source_order: u32,
    pub trailing_source_order: u32,
    pub scroll_into_view: bool,
    pub resume_mode: Option<ResumeMode>,
}

/// Position of one chapter relative to the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChapterRole {
    pub is_initial: bool,
    /// Before the initial chapter, reached by reading backwards.
    pub is_leading: bool,
    /// After the initial chapter.
    pub is_trailing: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ReaderChaptersState {
    window: ReaderChaptersWindow,
    visible: VisibleChapters,
    chapter_source_order: u32,
    skip_dup_chapters: bool,
}

impl ReaderChaptersState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window(&self) -> &ReaderChaptersWindow {
        &self.window
    }

    pub fn visible(&self) -> &VisibleChapters {
        &self.visible
    }

    pub fn current_chapter(&self) -> Option<&Chapter> {
        self.window.current_chapter.as_ref()
    }

    pub fn chapter_source_order(&self) -> u32 {
        self.chapter_source_order
    }

    pub fn chapter(&self, id: ChapterId) -> Option<&Chapter> {
        self.window.manga_chapters.iter().find(|chapter| chapter.id == id)
    }

    /// Applies a freshly fetched chapter list. Returns true when the initial
    /// chapter changed, in which case the visible window was reset.
    pub fn update(
        &mut self,
        chapter_list: &[Chapter],
        chapter_source_order: u32,
        skip_dup_chapters: bool,
    ) -> bool {
        let previous_initial = self.window.initial_chapter.as_ref().map(|chapter| chapter.id);
        let anchor = self
            .window
            .initial_chapter
            .clone()
            .filter(|anchor| chapter_list.iter().any(|chapter| chapter.id == anchor.id));

        self.chapter_source_order = chapter_source_order;
        self.skip_dup_chapters = skip_dup_chapters;
        self.window = derive_chapters_window(
            chapter_list,
            chapter_source_order,
            skip_dup_chapters,
            anchor.as_ref(),
        );

        let new_initial = self.window.initial_chapter.as_ref().map(|chapter| chapter.id);
        let changed = new_initial.is_some() && new_initial != previous_initial;
        if changed {
            tracing::debug!(?new_initial, "initial chapter changed, resetting visible chapters");
            self.visible = VisibleChapters {
                leading_source_order: chapter_source_order,
                trailing_source_order: chapter_source_order,
                ..VisibleChapters::default()
            };
        }
        changed
    }

    /// Moves the current chapter. Paged modes replace the mounted range and
    /// request a scroll with `resume_mode`; continuous modes extend it.
    pub fn navigate(
        &mut self,
        navigation: ChapterNavigation,
        reading_mode: ReadingMode,
        resume_mode: Option<ResumeMode>,
    ) -> bool {
        let Some(target) = self.chapter(navigation.chapter_id()).cloned() else {
            tracing::warn!(chapter_id = %navigation.chapter_id(), "navigation to unknown chapter");
            return false;
        };
        if self.current_chapter().is_some_and(|current| current.id == target.id) {
            return false;
        }

        let list = std::mem::take(&mut self.window.manga_chapters);
        let anchor = self.window.initial_chapter.clone();
        self.chapter_source_order = target.source_order;
        self.window = derive_chapters_window(
            &list,
            target.source_order,
            self.skip_dup_chapters,
            anchor.as_ref(),
        );

        let order = target.source_order;
        if reading_mode.is_continuous() {
            self.visible.leading_source_order = self.visible.leading_source_order.min(order);
            self.visible.trailing_source_order = self.visible.trailing_source_order.max(order);
            self.visible.scroll_into_view = false;
            self.visible.resume_mode = None;
        } else {
            self.visible = VisibleChapters {
                leading_source_order: order,
                trailing_source_order: order,
                scroll_into_view: true,
                resume_mode,
            };
        }
        tracing::debug!(chapter_id = %target.id, source_order = order, "navigated to chapter");
        true
    }

    /// Clears the pending scroll request, returning its resume mode.
    pub fn take_scroll_into_view(&mut self) -> Option<Option<ResumeMode>> {
        if !self.visible.scroll_into_view {
            return None;
        }
        self.visible.scroll_into_view = false;
        Some(self.visible.resume_mode.take())
    }

    pub fn role_of(&self, chapter: &Chapter) -> ChapterRole {
        let initial = self.window.initial_chapter.as_ref();
        let is_initial = initial.is_some_and(|initial| initial.id == chapter.id);
        let initial_order = initial.map(|initial| initial.source_order);
        ChapterRole {
            is_initial,
            is_leading: !is_initial
                && initial_order.is_some_and(|order| chapter.source_order < order),
            is_trailing: !is_initial
                && initial_order.is_some_and(|order| chapter.source_order > order),
        }
    }

    /// Chapters that should be mounted. Continuous modes keep the visited
    /// range plus the direct neighbours of the current chapter mounted.
    pub fn rendered_chapters(&self, reading_mode: ReadingMode) -> Vec<Chapter> {
        let Some(current) = self.current_chapter() else {
            return Vec::new();
        };
        if !reading_mode.is_continuous() {
            return vec![current.clone()];
        }

        let mut low = self.visible.leading_source_order.min(current.source_order);
        let mut high = self.visible.trailing_source_order.max(current.source_order);
        if let Some(previous) = &self.window.previous_chapter {
            low = low.min(previous.source_order);
        }
        if let Some(next) = &self.window.next_chapter {
            high = high.max(next.source_order);
        }

        let mut out: Vec<Chapter> = self
            .window
            .chapters
            .iter()
            .filter(|chapter| (low..=high).contains(&chapter.source_order))
            .cloned()
            .collect();
        if !out.iter().any(|chapter| chapter.id == current.id) {
            out.push(current.clone());
        }
        out.sort_by_key(|chapter| chapter.source_order);
        out
    }
}

/// Where the "continue reading" affordance points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeTarget {
    pub chapter_id: ChapterId,
    pub source_order: u32,
    pub page: u32,
    pub label: &'static str,
}

/// First unread chapter in reading order, labelled "Start" when it is the
/// first chapter of the manga.
pub fn resume_target(chapters: &[Chapter]) -> Option<ResumeTarget> {
    chapters
        .iter()
        .filter(|chapter| !chapter.is_read)
        .min_by_key(|chapter| chapter.source_order)
        .map(|chapter| ResumeTarget {
            chapter_id: chapter.id,
            source_order: chapter.source_order,
            page: chapter.last_page_read,
            label: if chapter.source_order == 1 {
                "Start"
            } else {
                "Resume"
            },
        })
}
