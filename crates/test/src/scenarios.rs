use mangashelf_application::{
    ActionOptions, BoundaryVisibility, ChapterAction, ChapterNavigation, ChapterService as _,
    ChapterView, FetchOutcome, PageTurn, ReaderSession, ViewerState, derive_chapters_window,
    perform_action,
};
use mangashelf_core::{
    ChapterId, PageSpreadState, ReaderSettings, ReadingDirection, ReadingMode, ResumeMode,
    Settings, TransitionPageKind,
};
use mangashelf_engine::{TransitionNotice, build_pages};
use mangashelf_storage::Storage;

use crate::{
    FakeSource, MANGA_ID, RecordingNotifier, fetch_all, make_chapter, make_chapters,
    make_settings,
};

async fn open_session(
    source: &FakeSource,
    settings: ReaderSettings,
    source_order: u32,
) -> anyhow::Result<ReaderSession> {
    let chapters = source.fetch_chapter_list(MANGA_ID).await?;
    let mut session = ReaderSession::new(settings, None);
    let tickets = session.load_chapter_list(&chapters, source_order);
    fetch_all(&mut session, source, tickets).await;
    Ok(session)
}

#[tokio::test]
async fn empty_chapter_shows_no_pages_and_retries() -> anyhow::Result<()> {
    let source = FakeSource::new(make_chapters(2), 0);
    let mut session = open_session(&source, make_settings(ReadingMode::SinglePage), 1).await?;

    let viewer = session.viewer(ChapterId(10)).unwrap();
    assert_eq!(viewer.state(), &ViewerState::Empty);
    assert_eq!(viewer.view(), ChapterView::NoPagesFound);

    source.set_pages(ChapterId(10), 4);
    let ticket = session.retry_chapter(ChapterId(10)).unwrap();
    assert_eq!(
        session.viewer(ChapterId(10)).unwrap().state(),
        &ViewerState::Fetching
    );
    fetch_all(&mut session, &source, vec![ticket]).await;
    assert_eq!(session.context().state().total_pages, 4);
    Ok(())
}

#[tokio::test]
async fn fetch_failure_surfaces_error_until_retry() -> anyhow::Result<()> {
    let source = FakeSource::new(make_chapters(1), 2);
    source.set_failing(ChapterId(10), true);
    let mut session = open_session(&source, make_settings(ReadingMode::SinglePage), 1).await?;
    assert!(matches!(
        session.viewer(ChapterId(10)).unwrap().view(),
        ChapterView::Error(_)
    ));

    source.set_failing(ChapterId(10), false);
    let ticket = session.retry_chapter(ChapterId(10)).unwrap();
    fetch_all(&mut session, &source, vec![ticket]).await;
    assert_eq!(
        session.viewer(ChapterId(10)).unwrap().state(),
        &ViewerState::Ready
    );
    Ok(())
}

#[tokio::test]
async fn first_chapter_previous_transition_shows_notice() -> anyhow::Result<()> {
    let source = FakeSource::new(make_chapters(3), 2);
    let mut session = open_session(&source, make_settings(ReadingMode::SinglePage), 1).await?;

    assert_eq!(
        session.previous_page(),
        PageTurn::Transition(TransitionPageKind::Previous)
    );
    let page = session.active_transition_page().unwrap();
    assert_eq!(page.notice, Some(TransitionNotice::FirstChapter));
    assert!(page.entries.iter().all(|(_, summary)| summary.id == ChapterId(10)));
    assert!(page.lines().contains(&"There is no previous chapter".to_string()));

    // nothing before the first chapter
    assert_eq!(session.previous_page(), PageTurn::Stayed);
    Ok(())
}

#[tokio::test]
async fn stale_fetch_never_touches_state() -> anyhow::Result<()> {
    let source = FakeSource::new(make_chapters(3), 5);
    let chapters = source.fetch_chapter_list(MANGA_ID).await?;
    let mut session = ReaderSession::new(make_settings(ReadingMode::SinglePage), None);

    let stale = session.load_chapter_list(&chapters, 1);
    let fresh = session.navigate(ChapterNavigation::Next(ChapterId(20)));
    let before = session.context().state().clone();

    let result = source.fetch_chapter_pages(stale[0].chapter_id()).await;
    assert_eq!(session.complete_fetch(stale[0], result), FetchOutcome::Discarded);
    assert_eq!(session.context().state(), &before);
    assert_eq!(
        session.viewer(ChapterId(20)).unwrap().state(),
        &ViewerState::Fetching
    );

    fetch_all(&mut session, &source, fresh).await;
    assert_eq!(session.context().owner(), Some(ChapterId(20)));
    assert_eq!(session.context().state().total_pages, 5);
    Ok(())
}

#[test]
fn duplicate_releases_are_skipped() {
    let scanlated = |id, name, order, group: &str| {
        let mut chapter = make_chapter(id, name, order);
        chapter.scanlator = Some(group.to_string());
        chapter
    };
    let chapters = vec![
        make_chapter(4, "Ch. 11", 4),
        scanlated(3, "Chapter 10 ", 3, "Other Scans"),
        scanlated(2, "Ch. 10", 2, "Team A"),
        scanlated(1, "Ch. 9", 1, "team a"),
    ];

    let window = derive_chapters_window(&chapters, 1, true, None);
    assert_eq!(window.next_chapter.as_ref().unwrap().id, ChapterId(2));

    let window = derive_chapters_window(&chapters, 2, true, None);
    assert_eq!(window.next_chapter.as_ref().unwrap().id, ChapterId(4));
    assert!(window.chapters.iter().all(|chapter| chapter.id != ChapterId(3)));

    let window = derive_chapters_window(&chapters, 2, false, None);
    assert_eq!(window.next_chapter.as_ref().unwrap().id, ChapterId(3));
}

#[tokio::test]
async fn continuous_reading_hands_over_the_context() -> anyhow::Result<()> {
    let source = FakeSource::new(make_chapters(4), 3);
    let mut session =
        open_session(&source, make_settings(ReadingMode::ContinuousVertical), 2).await?;
    assert_eq!(session.viewers().count(), 3);

    for index in 0..3 {
        session.on_page_load(ChapterId(30), index, 800, 1200);
    }
    assert_eq!(session.context().state().loaded_pages(), 0);

    let next = BoundaryVisibility {
        previous: false,
        next: true,
    };
    // the current chapter has not settled yet
    assert!(session.observe_boundaries(next).is_empty());
    assert_eq!(session.context().owner(), Some(ChapterId(20)));
    for index in 0..3 {
        session.on_page_load(ChapterId(20), index, 800, 1200);
    }

    let tickets = session.observe_boundaries(next);
    fetch_all(&mut session, &source, tickets).await;
    assert_eq!(session.context().owner(), Some(ChapterId(30)));
    assert_eq!(session.context().state().loaded_pages(), 3);
    assert!(session.viewer(ChapterId(40)).is_some());

    // the same crossing does not fire twice
    let tickets = session.observe_boundaries(next);
    assert!(tickets.is_empty());
    assert_eq!(session.context().owner(), Some(ChapterId(30)));
    Ok(())
}

#[tokio::test]
async fn paged_reading_walks_into_next_chapter() -> anyhow::Result<()> {
    let source = FakeSource::new(make_chapters(2), 2);
    let mut session = open_session(&source, make_settings(ReadingMode::SinglePage), 1).await?;

    assert_eq!(session.next_page(), PageTurn::Moved(1));
    assert_eq!(
        session.next_page(),
        PageTurn::Transition(TransitionPageKind::Next)
    );
    let PageTurn::Chapter(navigation) = session.next_page() else {
        panic!("expected a chapter change");
    };
    let tickets = session.navigate(navigation);
    fetch_all(&mut session, &source, tickets).await;

    let viewer = session.current_viewer().unwrap();
    assert_eq!(viewer.chapter_id(), ChapterId(20));
    assert_eq!(viewer.resume_mode(), Some(ResumeMode::Start));
    assert_eq!(session.context().state().current_page_index, 0);

    // last chapter: the next transition page announces the end
    session.next_page();
    session.next_page();
    let page = session.active_transition_page().unwrap();
    assert_eq!(page.notice, Some(TransitionNotice::LastChapter));
    assert_eq!(session.next_page(), PageTurn::Stayed);
    Ok(())
}

#[tokio::test]
async fn progress_and_actions_reach_the_service() -> anyhow::Result<()> {
    let source = FakeSource::new(make_chapters(2), 2);
    let mut session = open_session(&source, make_settings(ReadingMode::SinglePage), 1).await?;
    session.on_page_load(ChapterId(10), 0, 800, 1200);
    session.on_page_load(ChapterId(10), 1, 800, 1200);

    session.next_page();
    let (chapter_id, patch) = session.progress_patch().unwrap();
    source.update_chapters(&[chapter_id], &patch).await?;
    assert_eq!(source.updates().len(), 1);

    let chapters = source.fetch_chapter_list(MANGA_ID).await?;
    let first = chapters.iter().find(|c| c.id == ChapterId(10)).unwrap();
    assert!(first.is_read);
    assert_eq!(first.last_page_read, 1);

    let notifier = RecordingNotifier::default();
    perform_action(
        &source,
        &notifier,
        ChapterAction::Bookmark,
        &chapters,
        ActionOptions::default(),
    )
    .await?;
    assert_eq!(notifier.messages(), vec!["Bookmarked 2 chapters".to_string()]);

    session.load_chapter_list(&source.fetch_chapter_list(MANGA_ID).await?, 1);
    assert!(session.chapters().current_chapter().unwrap().is_bookmarked);
    assert_eq!(session.resume_target().unwrap().chapter_id, ChapterId(20));
    Ok(())
}

#[test]
fn double_pages_never_pair_spreads() {
    for total in 1..=6usize {
        let urls: Vec<String> = (0..total).map(|i| format!("{i}.png")).collect();
        for mask in 0..(1u32 << total) {
            let spread_state: Vec<PageSpreadState> = urls
                .iter()
                .enumerate()
                .map(|(i, url)| PageSpreadState {
                    url: url.clone(),
                    is_spread: mask & (1 << i) != 0,
                })
                .collect();
            for direction in [ReadingDirection::Ltr, ReadingDirection::Rtl] {
                for offset in [false, true] {
                    let pages = build_pages(
                        &urls,
                        ReadingMode::DoublePage,
                        &spread_state,
                        direction,
                        offset,
                        &[],
                    );
                    let mut seen = Vec::new();
                    for page in &pages {
                        if let Some(secondary) = &page.secondary {
                            assert!(!spread_state[page.primary.index].is_spread);
                            assert!(!spread_state[secondary.index].is_spread);
                        }
                        if page.is_spread {
                            assert!(page.secondary.is_none());
                        }
                        seen.push(page.first_index());
                        if page.secondary.is_some() {
                            seen.push(page.last_index());
                        }
                    }
                    assert_eq!(seen, (0..total).collect::<Vec<_>>());
                }
            }
        }
    }
}

#[test]
fn settings_survive_a_restart() -> anyhow::Result<()> {
    let storage = Storage::open(":memory:")?;
    let settings = Settings {
        reader: ReaderSettings {
            reading_direction: ReadingDirection::Rtl,
            ..make_settings(ReadingMode::ContinuousHorizontal)
        },
        library_root: Some("/library".to_string()),
    };
    storage.save_settings(&settings)?;

    let loaded = storage.load_settings()?;
    assert_eq!(loaded.reader.reading_mode, ReadingMode::ContinuousHorizontal);
    assert_eq!(loaded.reader.reading_direction, ReadingDirection::Rtl);
    assert_eq!(loaded.library_root.as_deref(), Some("/library"));
    Ok(())
}
