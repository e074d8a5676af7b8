//! Per-chapter controller.
//!
//! A [`ChapterViewer`] owns the fetch lifecycle and the live page list of one
//! chapter. It never performs IO: [`ChapterViewer::start_fetch`] hands out a
//! [`FetchTicket`] and the caller reports the result back through
//! [`ChapterViewer::complete_fetch`]. Results carrying an outdated ticket are
//! dropped without touching any state.
//!
//! Local state is authoritative until the pages are fetched. From then on a
//! viewer holding the [`WriteToken`] mirrors its state into the shared
//! [`ReaderContext`]; every other viewer keeps its state to itself.

use mangashelf_core::{
    Chapter, ChapterId, PageData, PageLoadState, ReaderError, ReaderSettings, ResumeMode,
    TransitionPageKind, TransitionPageMode,
};
use mangashelf_engine::{
    LoadUpdate, PageLoadTracker, build_pages, is_transition_page_visible, pages_index_of,
    resolve_resume_mode, resolve_start_index, snap_page_index,
};

use crate::{ChapterNavigation, ChapterPatch, ChapterRole, ReaderContext, WriteToken};

/// Response of the chapter page fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterPages {
    pub page_count: usize,
    pub pages: Vec<String>,
}

impl ChapterPages {
    pub fn new(pages: Vec<String>) -> Self {
        Self {
            page_count: pages.len(),
            pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerState {
    Idle,
    Fetching,
    Error(ReaderError),
    Empty,
    Ready,
}

/// Identifies one page fetch. Only the most recent ticket of a viewer is
/// accepted back. Generations come from the [`ReaderContext`] and never repeat
/// within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    chapter_id: ChapterId,
    generation: u64,
}

impl FetchTicket {
    pub fn chapter_id(&self) -> ChapterId {
        self.chapter_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    Discarded,
}

/// Result of a paged navigation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTurn {
    Moved(usize),
    Transition(TransitionPageKind),
    Chapter(ChapterNavigation),
    Stayed,
}

/// What the chapter should render right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterView<'a> {
    /// Paged modes only render the current chapter.
    Hidden,
    Loading,
    Error(&'a ReaderError),
    NoPagesFound,
    Pages {
        previous_transition: bool,
        pages: &'a [PageData],
        load_states: &'a [PageLoadState],
        next_transition: bool,
    },
}

#[derive(Debug)]
pub struct ChapterViewer {
    chapter: Chapter,
    role: ChapterRole,
    settings: ReaderSettings,
    forced_resume: Option<ResumeMode>,
    location_resume: Option<ResumeMode>,
    scroll_into_view: bool,
    previous_chapter: Option<ChapterId>,
    next_chapter: Option<ChapterId>,
    token: Option<WriteToken>,
    in_flight: Option<FetchTicket>,
    state: ViewerState,
    are_pages_fetched: bool,
    page_urls: Vec<String>,
    tracker: PageLoadTracker,
    pages: Vec<PageData>,
    current_page_index: usize,
    transition_page_mode: TransitionPageMode,
    resume_mode: Option<ResumeMode>,
    page_to_scroll_to: Option<usize>,
    reported_page: Option<u32>,
    reported_read: bool,
}

impl ChapterViewer {
    pub fn new(chapter: Chapter, role: ChapterRole, settings: ReaderSettings) -> Self {
        let reported_page = Some(chapter.last_page_read);
        let reported_read = chapter.is_read;
        Self {
            chapter,
            role,
            settings,
            forced_resume: None,
            location_resume: None,
            scroll_into_view: false,
            previous_chapter: None,
            next_chapter: None,
            token: None,
            in_flight: None,
            state: ViewerState::Idle,
            are_pages_fetched: false,
            page_urls: Vec::new(),
            tracker: PageLoadTracker::default(),
            pages: Vec::new(),
            current_page_index: 0,
            transition_page_mode: TransitionPageMode::None,
            resume_mode: None,
            page_to_scroll_to: None,
            reported_page,
            reported_read,
        }
    }

    pub fn with_forced_resume(mut self, resume_mode: Option<ResumeMode>) -> Self {
        self.forced_resume = resume_mode;
        self
    }

    /// Resume mode handed over by the navigation that opened the reader.
    pub fn with_location_resume(mut self, resume_mode: Option<ResumeMode>) -> Self {
        self.location_resume = resume_mode;
        self
    }

    pub fn with_scroll_into_view(mut self, scroll_into_view: bool) -> Self {
        self.scroll_into_view = scroll_into_view;
        self
    }

    pub fn chapter(&self) -> &Chapter {
        &self.chapter
    }

    pub fn chapter_id(&self) -> ChapterId {
        self.chapter.id
    }

    pub fn role(&self) -> ChapterRole {
        self.role
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn pages(&self) -> &[PageData] {
        &self.pages
    }

    pub fn load_states(&self) -> &[PageLoadState] {
        self.tracker.states()
    }

    pub fn page_count(&self) -> usize {
        self.page_urls.len()
    }

    pub fn current_page_index(&self) -> usize {
        self.current_page_index
    }

    pub fn transition_page_mode(&self) -> TransitionPageMode {
        self.transition_page_mode
    }

    pub fn resume_mode(&self) -> Option<ResumeMode> {
        self.resume_mode
    }

    pub fn retry_key_prefix(&self) -> u32 {
        self.tracker.retry_key_prefix()
    }

    pub fn failed_pages(&self) -> Vec<usize> {
        self.tracker.failed_pages()
    }

    /// Page-level failures. These never fail the chapter itself.
    pub fn page_errors(&self) -> Vec<ReaderError> {
        self.failed_pages()
            .into_iter()
            .map(|index| ReaderError::PageLoadFailed { index })
            .collect()
    }

    /// Holds write access to the shared context.
    pub fn is_current(&self) -> bool {
        self.token.is_some()
    }

    /// Pages are fetched and every page has either loaded or failed.
    pub fn is_ready(&self) -> bool {
        self.are_pages_fetched && self.tracker.is_ready(self.page_urls.len())
    }

    pub fn set_neighbours(&mut self, previous: Option<ChapterId>, next: Option<ChapterId>) {
        self.previous_chapter = previous;
        self.next_chapter = next;
    }

    pub fn set_role(&mut self, role: ChapterRole) {
        self.role = role;
    }

    /// Makes this viewer the current chapter and pushes its state into the
    /// context.
    pub fn grant_write(&mut self, token: WriteToken, ctx: &mut ReaderContext) {
        if token.chapter_id() != self.chapter.id {
            tracing::warn!(
                token = %token.chapter_id(),
                chapter_id = %self.chapter.id,
                "write token belongs to another chapter"
            );
            return;
        }
        self.token = Some(token);
        self.publish_all(ctx);
    }

    pub fn revoke_write(&mut self) -> Option<WriteToken> {
        self.token.take()
    }

    /// Enters `Fetching`, superseding any fetch still in flight.
    pub fn start_fetch(&mut self, ctx: &mut ReaderContext) -> FetchTicket {
        let ticket = FetchTicket {
            chapter_id: self.chapter.id,
            generation: ctx.next_fetch_generation(),
        };
        self.in_flight = Some(ticket);
        self.state = ViewerState::Fetching;
        self.are_pages_fetched = false;
        self.page_urls.clear();
        self.pages.clear();
        self.tracker = PageLoadTracker::default();
        self.current_page_index = 0;
        self.transition_page_mode = TransitionPageMode::None;
        tracing::debug!(chapter_id = %self.chapter.id, generation = ticket.generation, "fetching chapter pages");
        ticket
    }

    /// Replaces the chapter snapshot. A different chapter id restarts the
    /// fetch and gives up write access.
    pub fn set_chapter(
        &mut self,
        chapter: Chapter,
        role: ChapterRole,
        ctx: &mut ReaderContext,
    ) -> Option<FetchTicket> {
        self.role = role;
        if chapter.id == self.chapter.id {
            self.chapter = chapter;
            return None;
        }
        self.cancel();
        self.token = None;
        self.reported_page = Some(chapter.last_page_read);
        self.reported_read = chapter.is_read;
        self.chapter = chapter;
        Some(self.start_fetch(ctx))
    }

    /// Re-enters `Fetching` from `Error` or `Empty`.
    pub fn retry(&mut self, ctx: &mut ReaderContext) -> Option<FetchTicket> {
        match self.state {
            ViewerState::Error(_) | ViewerState::Empty => Some(self.start_fetch(ctx)),
            _ => None,
        }
    }

    /// Abandons the outstanding fetch, e.g. on unmount.
    pub fn cancel(&mut self) {
        if self.in_flight.take().is_some() {
            if self.state == ViewerState::Fetching {
                self.state = ViewerState::Idle;
            }
            tracing::debug!(chapter_id = %self.chapter.id, "chapter fetch cancelled");
        }
    }

    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<ChapterPages, ReaderError>,
        ctx: &mut ReaderContext,
    ) -> FetchOutcome {
        if self.in_flight != Some(ticket) || ticket.chapter_id != self.chapter.id {
            tracing::debug!(
                chapter_id = %ticket.chapter_id,
                generation = ticket.generation,
                "discarding stale chapter fetch"
            );
            return FetchOutcome::Discarded;
        }
        self.in_flight = None;

        match result {
            Err(ReaderError::Cancelled) => {
                tracing::debug!(chapter_id = %self.chapter.id, "chapter fetch was superseded");
                self.state = ViewerState::Idle;
                FetchOutcome::Discarded
            }
            Err(err) => {
                tracing::warn!(chapter_id = %self.chapter.id, error = %err, "chapter fetch failed");
                self.state = ViewerState::Error(err);
                FetchOutcome::Applied
            }
            Ok(fetched) => {
                self.apply_pages(fetched, ctx);
                FetchOutcome::Applied
            }
        }
    }

    fn apply_pages(&mut self, fetched: ChapterPages, ctx: &mut ReaderContext) {
        if fetched.page_count != fetched.pages.len() {
            tracing::warn!(
                chapter_id = %self.chapter.id,
                page_count = fetched.page_count,
                urls = fetched.pages.len(),
                "page count does not match page urls"
            );
        }
        let resume_mode = resolve_resume_mode(
            self.forced_resume,
            self.role.is_initial,
            self.role.is_leading,
            self.role.is_trailing,
            self.location_resume,
        );
        let last_page_read = if self.role.is_initial && self.forced_resume.is_none() {
            self.chapter.last_page_read as usize
        } else {
            0
        };
        let Ok(start) = resolve_start_index(resume_mode, last_page_read, fetched.pages.len()) else {
            tracing::debug!(chapter_id = %self.chapter.id, "chapter has no pages");
            self.state = ViewerState::Empty;
            return;
        };

        self.page_urls = fetched.pages;
        self.tracker = PageLoadTracker::new(self.page_urls.clone());
        self.pages = self.build_pages(&[]);
        self.current_page_index = snap_page_index(&self.pages, start);
        self.resume_mode = Some(resume_mode);
        self.transition_page_mode = TransitionPageMode::None;
        if self.role.is_initial || self.scroll_into_view {
            self.page_to_scroll_to = Some(self.current_page_index);
        }
        self.are_pages_fetched = true;
        self.state = ViewerState::Ready;
        tracing::debug!(
            chapter_id = %self.chapter.id,
            total = self.page_urls.len(),
            start = self.current_page_index,
            ?resume_mode,
            "chapter ready"
        );
        self.publish_all(ctx);
    }

    fn build_pages(&self, previous: &[PageData]) -> Vec<PageData> {
        let spread_state = self.tracker.converged_spread_state().unwrap_or_default();
        build_pages(
            &self.page_urls,
            self.settings.reading_mode,
            &spread_state,
            self.settings.reading_direction,
            self.settings.offset_double_spreads,
            previous,
        )
    }

    fn repaginate(&mut self, ctx: &mut ReaderContext) {
        let previous = std::mem::take(&mut self.pages);
        self.pages = self.build_pages(&previous);
        self.current_page_index = snap_page_index(&self.pages, self.current_page_index);
        tracing::debug!(
            chapter_id = %self.chapter.id,
            slots = self.pages.len(),
            current = self.current_page_index,
            "pages rebuilt"
        );
        self.publish_all(ctx);
    }

    pub fn on_page_load(&mut self, index: usize, width: u32, height: u32, ctx: &mut ReaderContext) {
        if self.state != ViewerState::Ready {
            return;
        }
        let update = self.tracker.on_load(index, width, height);
        self.handle_load_update(update, ctx);
    }

    pub fn on_page_error(&mut self, index: usize, ctx: &mut ReaderContext) {
        if self.state != ViewerState::Ready {
            return;
        }
        let update = self.tracker.on_error(index);
        if update.state_changed {
            tracing::debug!(chapter_id = %self.chapter.id, index, "page errored");
        }
        self.handle_load_update(update, ctx);
    }

    fn handle_load_update(&mut self, update: LoadUpdate, ctx: &mut ReaderContext) {
        if update.repaginate {
            self.repaginate(ctx);
        } else if update.state_changed {
            self.publish_load_states(ctx);
        }
    }

    pub fn retry_page(&mut self, index: usize, ctx: &mut ReaderContext) -> bool {
        if !self.tracker.retry(index) {
            return false;
        }
        self.publish_load_states(ctx);
        true
    }

    pub fn retry_failed_pages(&mut self, ctx: &mut ReaderContext) -> usize {
        let count = self.tracker.retry_failed();
        if count > 0 {
            self.publish_load_states(ctx);
        }
        count
    }

    /// Takes new reader settings, rebuilding the page list when the layout
    /// changed. Load states are kept.
    pub fn apply_settings(&mut self, settings: ReaderSettings, ctx: &mut ReaderContext) {
        let layout_changed = settings.reading_mode != self.settings.reading_mode
            || settings.reading_direction != self.settings.reading_direction
            || settings.offset_double_spreads != self.settings.offset_double_spreads;
        self.settings = settings;
        if layout_changed && self.are_pages_fetched {
            self.repaginate(ctx);
        }
    }

    /// Records the page the user scrolled to.
    pub fn set_current_page_index(&mut self, index: usize, ctx: &mut ReaderContext) {
        if !self.are_pages_fetched {
            return;
        }
        let index = index.min(self.page_urls.len().saturating_sub(1));
        self.move_to(snap_page_index(&self.pages, index), ctx);
    }

    fn move_to(&mut self, index: usize, ctx: &mut ReaderContext) {
        self.current_page_index = index;
        self.transition_page_mode = TransitionPageMode::None;
        self.publish_position(ctx);
    }

    fn enter_transition(&mut self, kind: TransitionPageKind, ctx: &mut ReaderContext) -> PageTurn {
        self.transition_page_mode = match kind {
            TransitionPageKind::Previous => TransitionPageMode::Previous,
            TransitionPageKind::Next => TransitionPageMode::Next,
        };
        self.publish_position(ctx);
        PageTurn::Transition(kind)
    }

    fn current_slot(&self) -> Option<usize> {
        if !self.are_pages_fetched {
            return None;
        }
        pages_index_of(&self.pages, self.current_page_index)
    }

    /// Steps forward in reading order. Paged modes pass through the NEXT
    /// transition page before asking for the next chapter.
    pub fn next_page(&mut self, ctx: &mut ReaderContext) -> PageTurn {
        let Some(slot) = self.current_slot() else {
            return PageTurn::Stayed;
        };
        let continuous = self.settings.reading_mode.is_continuous();

        if !continuous {
            match self.transition_page_mode {
                TransitionPageMode::Previous => {
                    self.move_to(self.current_page_index, ctx);
                    return PageTurn::Moved(self.current_page_index);
                }
                TransitionPageMode::Next => {
                    return match self.next_chapter {
                        Some(id) if self.settings.load_next_on_ending => {
                            PageTurn::Chapter(ChapterNavigation::Next(id))
                        }
                        _ => PageTurn::Stayed,
                    };
                }
                TransitionPageMode::None | TransitionPageMode::Both => {}
            }
        }

        match self.pages.get(slot + 1) {
            Some(page) => {
                let index = page.first_index();
                self.move_to(index, ctx);
                PageTurn::Moved(index)
            }
            None if continuous => PageTurn::Stayed,
            None => self.enter_transition(TransitionPageKind::Next, ctx),
        }
    }

    /// Steps backward in reading order, through the PREVIOUS transition page.
    pub fn previous_page(&mut self, ctx: &mut ReaderContext) -> PageTurn {
        let Some(slot) = self.current_slot() else {
            return PageTurn::Stayed;
        };
        let continuous = self.settings.reading_mode.is_continuous();

        if !continuous {
            match self.transition_page_mode {
                TransitionPageMode::Next => {
                    self.move_to(self.current_page_index, ctx);
                    return PageTurn::Moved(self.current_page_index);
                }
                TransitionPageMode::Previous => {
                    return match self.previous_chapter {
                        Some(id) => PageTurn::Chapter(ChapterNavigation::Previous(id)),
                        None => PageTurn::Stayed,
                    };
                }
                TransitionPageMode::None | TransitionPageMode::Both => {}
            }
        }

        match slot.checked_sub(1).and_then(|prev| self.pages.get(prev)) {
            Some(page) => {
                let index = page.first_index();
                self.move_to(index, ctx);
                PageTurn::Moved(index)
            }
            None if continuous => PageTurn::Stayed,
            None => self.enter_transition(TransitionPageKind::Previous, ctx),
        }
    }

    /// Progress not yet reported to the chapter service. Only the current
    /// chapter records progress, and it is marked read only once ready.
    pub fn take_progress_patch(&mut self) -> Option<ChapterPatch> {
        if !self.is_current() {
            return None;
        }
        let slot = self.current_slot()?;
        let mut patch = ChapterPatch::default();

        let page = self.current_page_index as u32;
        if self.reported_page != Some(page) {
            patch.last_page_read = Some(page);
            self.reported_page = Some(page);
        }
        if slot + 1 == self.pages.len() && !self.reported_read && self.is_ready() {
            patch.is_read = Some(true);
            self.reported_read = true;
        }
        (!patch.is_empty()).then_some(patch)
    }

    fn places_transition(&self, kind: TransitionPageKind) -> bool {
        if !self.settings.reading_mode.is_continuous() {
            return self.is_current();
        }
        match kind {
            TransitionPageKind::Previous => self.role.is_initial || self.role.is_leading,
            TransitionPageKind::Next => self.role.is_initial || self.role.is_trailing,
        }
    }

    pub fn shows_transition(&self, kind: TransitionPageKind) -> bool {
        self.places_transition(kind)
            && is_transition_page_visible(
                kind,
                self.transition_page_mode,
                self.settings.reading_mode,
            )
    }

    pub fn view(&self) -> ChapterView<'_> {
        if !self.settings.reading_mode.is_continuous() && !self.is_current() {
            return ChapterView::Hidden;
        }
        match &self.state {
            ViewerState::Idle | ViewerState::Fetching => ChapterView::Loading,
            ViewerState::Error(err) => ChapterView::Error(err),
            ViewerState::Empty => ChapterView::NoPagesFound,
            ViewerState::Ready => ChapterView::Pages {
                previous_transition: self.shows_transition(TransitionPageKind::Previous),
                pages: &self.pages,
                load_states: self.tracker.states(),
                next_transition: self.shows_transition(TransitionPageKind::Next),
            },
        }
    }

    fn publish_all(&mut self, ctx: &mut ReaderContext) {
        if !self.are_pages_fetched {
            return;
        }
        let Some(token) = self.token.as_ref() else {
            return;
        };
        let Some(state) = ctx.write(token) else {
            return;
        };
        state.total_pages = self.page_urls.len();
        state.pages = self.pages.clone();
        state.page_load_states = self.tracker.states().to_vec();
        state.retry_key_prefix = self.tracker.retry_key_prefix();
        state.current_page_index = self.current_page_index;
        state.transition_page_mode = self.transition_page_mode;
        if let Some(target) = self.page_to_scroll_to.take() {
            state.page_to_scroll_to = Some(target);
        }
    }

    fn publish_load_states(&self, ctx: &mut ReaderContext) {
        if !self.are_pages_fetched {
            return;
        }
        if let Some(token) = self.token.as_ref()
            && let Some(state) = ctx.write(token)
        {
            state.page_load_states = self.tracker.states().to_vec();
            state.retry_key_prefix = self.tracker.retry_key_prefix();
        }
    }

    fn publish_position(&self, ctx: &mut ReaderContext) {
        if let Some(token) = self.token.as_ref()
            && let Some(state) = ctx.write(token)
        {
            state.current_page_index = self.current_page_index;
            state.transition_page_mode = self.transition_page_mode;
        }
    }
}
