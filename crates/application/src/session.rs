//! One reader session: the chapter window, its mounted viewers and the
//! shared context they publish into.

use std::collections::BTreeMap;

use mangashelf_core::{
    Chapter, ChapterId, ReaderError, ReaderSettings, ResumeMode, TransitionPageKind,
};
use mangashelf_engine::TransitionPage;

use crate::{
    BoundaryVisibility, ChapterNavigation, ChapterPages, ChapterPatch, ChapterViewer,
    FetchOutcome, FetchTicket, InfiniteScrollAdvancer, PageTurn, ReaderChaptersState,
    ReaderContext, ResumeTarget, resume_target,
};

#[derive(Debug, Default)]
pub struct ReaderSession {
    settings: ReaderSettings,
    chapters: ReaderChaptersState,
    context: ReaderContext,
    /// Mounted viewers keyed by source order.
    viewers: BTreeMap<u32, ChapterViewer>,
    advancer: InfiniteScrollAdvancer,
    location_resume: Option<ResumeMode>,
}

impl ReaderSession {
    pub fn new(settings: ReaderSettings, location_resume: Option<ResumeMode>) -> Self {
        Self {
            settings,
            location_resume,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }

    pub fn chapters(&self) -> &ReaderChaptersState {
        &self.chapters
    }

    pub fn context(&self) -> &ReaderContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ReaderContext {
        &mut self.context
    }

    /// Mounted viewers in reading order.
    pub fn viewers(&self) -> impl Iterator<Item = &ChapterViewer> {
        self.viewers.values()
    }

    pub fn viewer(&self, chapter_id: ChapterId) -> Option<&ChapterViewer> {
        self.viewers
            .values()
            .find(|viewer| viewer.chapter_id() == chapter_id)
    }

    pub fn current_viewer(&self) -> Option<&ChapterViewer> {
        self.viewers.values().find(|viewer| viewer.is_current())
    }

    /// Applies a fetched chapter list and returns the page fetches the newly
    /// mounted viewers need.
    pub fn load_chapter_list(
        &mut self,
        chapter_list: &[Chapter],
        chapter_source_order: u32,
    ) -> Vec<FetchTicket> {
        self.chapters.update(
            chapter_list,
            chapter_source_order,
            self.settings.skip_dup_chapters,
        );
        self.sync_viewers()
    }

    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<ChapterPages, ReaderError>,
    ) -> FetchOutcome {
        let context = &mut self.context;
        match self
            .viewers
            .values_mut()
            .find(|viewer| viewer.chapter_id() == ticket.chapter_id())
        {
            Some(viewer) => viewer.complete_fetch(ticket, result, context),
            None => {
                tracing::debug!(chapter_id = %ticket.chapter_id(), "fetch for unmounted chapter");
                FetchOutcome::Discarded
            }
        }
    }

    pub fn on_page_load(&mut self, chapter_id: ChapterId, index: usize, width: u32, height: u32) {
        let context = &mut self.context;
        if let Some(viewer) = self
            .viewers
            .values_mut()
            .find(|viewer| viewer.chapter_id() == chapter_id)
        {
            viewer.on_page_load(index, width, height, context);
        }
    }

    pub fn on_page_error(&mut self, chapter_id: ChapterId, index: usize) {
        let context = &mut self.context;
        if let Some(viewer) = self
            .viewers
            .values_mut()
            .find(|viewer| viewer.chapter_id() == chapter_id)
        {
            viewer.on_page_error(index, context);
        }
    }

    pub fn retry_page(&mut self, chapter_id: ChapterId, index: usize) -> bool {
        let context = &mut self.context;
        self.viewers
            .values_mut()
            .find(|viewer| viewer.chapter_id() == chapter_id)
            .is_some_and(|viewer| viewer.retry_page(index, context))
    }

    pub fn retry_failed_pages(&mut self, chapter_id: ChapterId) -> usize {
        let context = &mut self.context;
        self.viewers
            .values_mut()
            .find(|viewer| viewer.chapter_id() == chapter_id)
            .map_or(0, |viewer| viewer.retry_failed_pages(context))
    }

    pub fn retry_chapter(&mut self, chapter_id: ChapterId) -> Option<FetchTicket> {
        let context = &mut self.context;
        self.viewers
            .values_mut()
            .find(|viewer| viewer.chapter_id() == chapter_id)?
            .retry(context)
    }

    pub fn set_current_page_index(&mut self, index: usize) {
        let context = &mut self.context;
        if let Some(viewer) = self.viewers.values_mut().find(|viewer| viewer.is_current()) {
            viewer.set_current_page_index(index, context);
        }
    }

    pub fn next_page(&mut self) -> PageTurn {
        let context = &mut self.context;
        self.viewers
            .values_mut()
            .find(|viewer| viewer.is_current())
            .map_or(PageTurn::Stayed, |viewer| viewer.next_page(context))
    }

    pub fn previous_page(&mut self) -> PageTurn {
        let context = &mut self.context;
        self.viewers
            .values_mut()
            .find(|viewer| viewer.is_current())
            .map_or(PageTurn::Stayed, |viewer| viewer.previous_page(context))
    }

    /// Moves to another chapter. Paged modes open the previous chapter at its
    /// end and the next one at its start.
    pub fn navigate(&mut self, navigation: ChapterNavigation) -> Vec<FetchTicket> {
        let mode = self.settings.reading_mode;
        let resume_mode = match navigation {
            _ if mode.is_continuous() => None,
            ChapterNavigation::Previous(_) => Some(ResumeMode::End),
            ChapterNavigation::Next(_) => Some(ResumeMode::Start),
        };
        if !self.chapters.navigate(navigation, mode, resume_mode) {
            return Vec::new();
        }
        self.sync_viewers()
    }

    /// Feeds sentinel visibility from a continuous layout. Ignored until the
    /// current chapter is ready, so a crossing seen while its pages are still
    /// loading fires once they settle.
    pub fn observe_boundaries(&mut self, visibility: BoundaryVisibility) -> Vec<FetchTicket> {
        let Some(current) = self.chapters.current_chapter().map(|chapter| chapter.id) else {
            return Vec::new();
        };
        if !self.current_viewer().is_some_and(ChapterViewer::is_ready) {
            tracing::trace!(chapter_id = %current, "current chapter not ready, ignoring boundaries");
            return Vec::new();
        }
        let window = self.chapters.window();
        let previous = window.previous_chapter.as_ref().map(|chapter| chapter.id);
        let next = window.next_chapter.as_ref().map(|chapter| chapter.id);

        match self.advancer.observe(
            visibility,
            self.settings.reading_mode,
            current,
            previous,
            next,
        ) {
            Some(navigation) => self.navigate(navigation),
            None => Vec::new(),
        }
    }

    pub fn apply_settings(&mut self, settings: ReaderSettings) -> Vec<FetchTicket> {
        if settings.reading_mode.is_continuous() != self.settings.reading_mode.is_continuous() {
            self.advancer.reset();
        }
        self.settings = settings;
        let context = &mut self.context;
        for viewer in self.viewers.values_mut() {
            viewer.apply_settings(self.settings.clone(), context);
        }
        self.sync_viewers()
    }

    /// Progress of the current chapter not yet sent to the chapter service.
    pub fn progress_patch(&mut self) -> Option<(ChapterId, ChapterPatch)> {
        let viewer = self.viewers.values_mut().find(|viewer| viewer.is_current())?;
        let patch = viewer.take_progress_patch()?;
        Some((viewer.chapter_id(), patch))
    }

    pub fn transition_page(&self, kind: TransitionPageKind) -> TransitionPage {
        let window = self.chapters.window();
        TransitionPage::build(
            kind,
            window.current_chapter.as_ref(),
            window.previous_chapter.as_ref(),
            window.next_chapter.as_ref(),
        )
    }

    /// The transition page a paged layout is showing, if any.
    pub fn active_transition_page(&self) -> Option<TransitionPage> {
        let viewer = self.current_viewer()?;
        [TransitionPageKind::Previous, TransitionPageKind::Next]
            .into_iter()
            .find(|kind| {
                !self.settings.reading_mode.is_continuous() && viewer.shows_transition(*kind)
            })
            .map(|kind| self.transition_page(kind))
    }

    pub fn resume_target(&self) -> Option<ResumeTarget> {
        resume_target(&self.chapters.window().chapters)
    }

    /// Mounts the chapters that should render, unmounts the rest and hands
    /// the write token to the current chapter.
    fn sync_viewers(&mut self) -> Vec<FetchTicket> {
        let rendered = self.chapters.rendered_chapters(self.settings.reading_mode);
        let scroll_request = self.chapters.take_scroll_into_view();
        let current_id = self.chapters.current_chapter().map(|chapter| chapter.id);

        self.viewers.retain(|order, viewer| {
            let keep = rendered
                .iter()
                .any(|chapter| chapter.source_order == *order);
            if !keep {
                viewer.cancel();
                tracing::debug!(chapter_id = %viewer.chapter_id(), "unmounting chapter");
            }
            keep
        });

        let mut tickets = Vec::new();
        for chapter in &rendered {
            let role = self.chapters.role_of(chapter);
            let (previous, next) = self.neighbours_of(chapter);
            let is_current = Some(chapter.id) == current_id;

            if let Some(viewer) = self.viewers.get_mut(&chapter.source_order) {
                if let Some(ticket) = viewer.set_chapter(chapter.clone(), role, &mut self.context) {
                    tickets.push(ticket);
                }
                viewer.set_neighbours(previous, next);
                continue;
            }

            let mut viewer = ChapterViewer::new(chapter.clone(), role, self.settings.clone())
                .with_location_resume(role.is_initial.then_some(self.location_resume).flatten());
            if is_current && let Some(resume_mode) = scroll_request {
                viewer = viewer
                    .with_forced_resume(resume_mode)
                    .with_scroll_into_view(true);
            }
            viewer.set_neighbours(previous, next);
            tickets.push(viewer.start_fetch(&mut self.context));
            tracing::debug!(chapter_id = %chapter.id, source_order = chapter.source_order, "mounting chapter");
            self.viewers.insert(chapter.source_order, viewer);
        }

        if let Some(current_id) = current_id
            && !self.current_viewer().is_some_and(|viewer| viewer.chapter_id() == current_id)
        {
            for viewer in self.viewers.values_mut() {
                viewer.revoke_write();
            }
            let token = self.context.claim(current_id);
            let context = &mut self.context;
            if let Some(viewer) = self
                .viewers
                .values_mut()
                .find(|viewer| viewer.chapter_id() == current_id)
            {
                viewer.grant_write(token, context);
            }
        }

        tickets
    }

    fn neighbours_of(&self, chapter: &Chapter) -> (Option<ChapterId>, Option<ChapterId>) {
        let window = self.chapters.window();
        if window
            .current_chapter
            .as_ref()
            .is_some_and(|current| current.id == chapter.id)
        {
            return (
                window.previous_chapter.as_ref().map(|c| c.id),
                window.next_chapter.as_ref().map(|c| c.id),
            );
        }
        let previous = window
            .chapters
            .iter()
            .filter(|c| c.source_order < chapter.source_order)
            .max_by_key(|c| c.source_order)
            .map(|c| c.id);
        let next = window
            .chapters
            .iter()
            .filter(|c| c.source_order > chapter.source_order)
            .min_by_key(|c| c.source_order)
            .map(|c| c.id);
        (previous, next)
    }
}

#[cfg(test)]
mod tests {
    use mangashelf_core::{ReadingMode, TransitionPageMode};

    use super::*;
    use crate::ViewerState;

    fn chapter(id: i64, source_order: u32) -> Chapter {
        Chapter {
            id: ChapterId(id),
            name: format!("Chapter {source_order}"),
            chapter_number: source_order as f64,
            source_order,
            scanlator: None,
            last_page_read: 0,
            is_read: false,
            is_bookmarked: false,
            is_downloaded: false,
            upload_date: 0,
        }
    }

    fn list() -> Vec<Chapter> {
        vec![chapter(30, 3), chapter(20, 2), chapter(10, 1)]
    }

    fn pages(count: usize) -> ChapterPages {
        ChapterPages::new((0..count).map(|i| format!("{i}.jpg")).collect())
    }

    fn settings(mode: ReadingMode) -> ReaderSettings {
        ReaderSettings {
            reading_mode: mode,
            ..ReaderSettings::default()
        }
    }

    fn complete_all(session: &mut ReaderSession, tickets: Vec<FetchTicket>, count: usize) {
        for ticket in tickets {
            session.complete_fetch(ticket, Ok(pages(count)));
        }
    }

    fn load_all(session: &mut ReaderSession, chapter_id: ChapterId, count: usize) {
        for index in 0..count {
            session.on_page_load(chapter_id, index, 100, 200);
        }
    }

    #[test]
    fn paged_session_mounts_only_current_chapter() {
        let mut session = ReaderSession::new(settings(ReadingMode::SinglePage), None);
        let tickets = session.load_chapter_list(&list(), 2);
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].chapter_id(), ChapterId(20));
        complete_all(&mut session, tickets, 3);

        assert_eq!(session.context().owner(), Some(ChapterId(20)));
        assert_eq!(session.context().state().total_pages, 3);
    }

    #[test]
    fn paging_past_the_end_opens_next_chapter_at_start() {
        let mut session = ReaderSession::new(settings(ReadingMode::SinglePage), None);
        let tickets = session.load_chapter_list(&list(), 2);
        complete_all(&mut session, tickets, 1);

        assert_eq!(
            session.next_page(),
            PageTurn::Transition(TransitionPageKind::Next)
        );
        let page = session.active_transition_page().unwrap();
        assert_eq!(page.kind, TransitionPageKind::Next);

        let PageTurn::Chapter(navigation) = session.next_page() else {
            panic!("expected a chapter change");
        };
        let tickets = session.navigate(navigation);
        assert_eq!(tickets.len(), 1);
        assert!(session.viewer(ChapterId(20)).is_none());
        complete_all(&mut session, tickets, 4);

        let viewer = session.current_viewer().unwrap();
        assert_eq!(viewer.chapter_id(), ChapterId(30));
        assert_eq!(viewer.resume_mode(), Some(ResumeMode::Start));
        assert_eq!(session.context().state().transition_page_mode, TransitionPageMode::None);
    }

    #[test]
    fn previous_chapter_opens_at_end() {
        let mut session = ReaderSession::new(settings(ReadingMode::SinglePage), None);
        let tickets = session.load_chapter_list(&list(), 2);
        complete_all(&mut session, tickets, 2);

        let tickets = session.navigate(ChapterNavigation::Previous(ChapterId(10)));
        complete_all(&mut session, tickets, 5);
        assert_eq!(session.context().state().current_page_index, 4);
        assert_eq!(session.context_mut().take_page_to_scroll_to(), Some(4));
    }

    #[test]
    fn continuous_session_moves_token_on_boundary() {
        let mut session = ReaderSession::new(settings(ReadingMode::ContinuousVertical), None);
        let tickets = session.load_chapter_list(&list(), 2);
        assert_eq!(tickets.len(), 3);
        complete_all(&mut session, tickets, 2);
        assert_eq!(session.context().owner(), Some(ChapterId(20)));
        load_all(&mut session, ChapterId(20), 2);

        let tickets = session.observe_boundaries(BoundaryVisibility {
            previous: false,
            next: true,
        });
        assert!(tickets.is_empty());
        assert_eq!(session.context().owner(), Some(ChapterId(30)));
        assert!(session.viewer(ChapterId(30)).unwrap().is_current());
        assert!(!session.viewer(ChapterId(20)).unwrap().is_current());
        // chapter 1 was only mounted as a neighbour of chapter 2
        assert!(session.viewer(ChapterId(10)).is_none());
        assert_eq!(session.viewers().count(), 2);
    }

    #[test]
    fn boundaries_wait_for_current_chapter() {
        let mut session = ReaderSession::new(settings(ReadingMode::ContinuousVertical), None);
        let tickets = session.load_chapter_list(&list(), 2);
        complete_all(&mut session, tickets, 2);
        let next = BoundaryVisibility {
            previous: false,
            next: true,
        };

        session.on_page_load(ChapterId(20), 0, 100, 200);
        assert!(!session.current_viewer().unwrap().is_ready());
        assert!(session.observe_boundaries(next).is_empty());
        assert_eq!(session.context().owner(), Some(ChapterId(20)));

        // a failed page still settles the chapter
        session.on_page_error(ChapterId(20), 1);
        session.observe_boundaries(next);
        assert_eq!(session.context().owner(), Some(ChapterId(30)));
    }

    #[test]
    fn remounted_chapter_ignores_cancelled_fetch() {
        let mut session = ReaderSession::new(settings(ReadingMode::SinglePage), None);
        let cancelled = session.load_chapter_list(&list(), 2);
        let next = session.navigate(ChapterNavigation::Next(ChapterId(30)));
        complete_all(&mut session, next, 3);
        let fresh = session.navigate(ChapterNavigation::Previous(ChapterId(20)));
        assert_eq!(fresh.len(), 1);
        assert_ne!(cancelled[0], fresh[0]);

        assert_eq!(
            session.complete_fetch(cancelled[0], Ok(pages(7))),
            FetchOutcome::Discarded
        );
        assert_eq!(session.context().state().total_pages, 0);
        assert_eq!(
            session.complete_fetch(fresh[0], Ok(pages(4))),
            FetchOutcome::Applied
        );
        assert_eq!(session.context().owner(), Some(ChapterId(20)));
        assert_eq!(session.context().state().total_pages, 4);
    }

    #[test]
    fn unmounted_fetch_is_discarded() {
        let mut session = ReaderSession::new(settings(ReadingMode::SinglePage), None);
        let stale = session.load_chapter_list(&list(), 2);
        let fresh = session.navigate(ChapterNavigation::Next(ChapterId(30)));

        assert_eq!(
            session.complete_fetch(stale[0], Ok(pages(3))),
            FetchOutcome::Discarded
        );
        assert_eq!(session.context().state().total_pages, 0);
        assert_eq!(
            session.complete_fetch(fresh[0], Ok(pages(3))),
            FetchOutcome::Applied
        );
        assert_eq!(
            session.viewer(ChapterId(30)).unwrap().state(),
            &ViewerState::Ready
        );
    }

    #[test]
    fn switching_to_paged_unmounts_neighbours() {
        let mut session = ReaderSession::new(settings(ReadingMode::ContinuousVertical), None);
        let tickets = session.load_chapter_list(&list(), 2);
        complete_all(&mut session, tickets, 2);

        let tickets = session.apply_settings(settings(ReadingMode::DoublePage));
        assert!(tickets.is_empty());
        assert_eq!(session.viewers().count(), 1);
        assert!(session.current_viewer().is_some());
    }

    #[test]
    fn progress_is_reported_for_current_chapter() {
        let mut session = ReaderSession::new(settings(ReadingMode::SinglePage), None);
        let tickets = session.load_chapter_list(&list(), 1);
        complete_all(&mut session, tickets, 2);
        load_all(&mut session, ChapterId(10), 2);
        session.set_current_page_index(1);

        let (id, patch) = session.progress_patch().unwrap();
        assert_eq!(id, ChapterId(10));
        assert_eq!(patch.last_page_read, Some(1));
        assert_eq!(patch.is_read, Some(true));
        assert_eq!(session.resume_target().unwrap().label, "Start");
    }
}
