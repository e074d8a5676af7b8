//! Test helpers and fixtures.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use mangashelf_application::{
    ChapterPages, ChapterPatch, ChapterService, FetchTicket, Notification, Notifier,
    ReaderSession, ServiceError,
};
use mangashelf_core::{Chapter, ChapterId, MangaId, ReaderError, ReaderSettings, ReadingMode};

pub const MANGA_ID: MangaId = MangaId(1);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn make_chapter(id: i64, name: &str, source_order: u32) -> Chapter {
    Chapter {
        id: ChapterId(id),
        name: name.to_string(),
        chapter_number: -1.0,
        source_order,
        scanlator: None,
        last_page_read: 0,
        is_read: false,
        is_bookmarked: false,
        is_downloaded: false,
        upload_date: 0,
    }
}

/// `count` numbered chapters, newest first. Chapter `n` has id `n * 10`.
pub fn make_chapters(count: u32) -> Vec<Chapter> {
    (1..=count)
        .rev()
        .map(|order| {
            let mut chapter = make_chapter(i64::from(order) * 10, &format!("Chapter {order}"), order);
            chapter.chapter_number = f64::from(order);
            chapter
        })
        .collect()
}

pub fn make_settings(reading_mode: ReadingMode) -> ReaderSettings {
    ReaderSettings {
        reading_mode,
        ..ReaderSettings::default()
    }
}

/// In-memory chapter service.
#[derive(Debug, Default)]
pub struct FakeSource {
    chapters: Mutex<Vec<Chapter>>,
    pages: Mutex<HashMap<ChapterId, usize>>,
    failing: Mutex<Vec<ChapterId>>,
    updates: Mutex<Vec<(Vec<ChapterId>, ChapterPatch)>>,
}

impl FakeSource {
    pub fn new(chapters: Vec<Chapter>, pages_per_chapter: usize) -> Self {
        let pages = chapters
            .iter()
            .map(|chapter| (chapter.id, pages_per_chapter))
            .collect();
        Self {
            chapters: Mutex::new(chapters),
            pages: Mutex::new(pages),
            ..Self::default()
        }
    }

    pub fn set_pages(&self, chapter_id: ChapterId, count: usize) {
        lock(&self.pages).insert(chapter_id, count);
    }

    pub fn set_failing(&self, chapter_id: ChapterId, failing: bool) {
        let mut list = lock(&self.failing);
        list.retain(|id| *id != chapter_id);
        if failing {
            list.push(chapter_id);
        }
    }

    pub fn updates(&self) -> Vec<(Vec<ChapterId>, ChapterPatch)> {
        lock(&self.updates).clone()
    }

    pub fn page_urls(chapter_id: ChapterId, count: usize) -> Vec<String> {
        (0..count)
            .map(|index| format!("https://pages.test/{chapter_id}/{index}.jpg"))
            .collect()
    }
}

impl ChapterService for FakeSource {
    async fn fetch_chapter_pages(&self, chapter_id: ChapterId) -> Result<ChapterPages, ReaderError> {
        if lock(&self.failing).contains(&chapter_id) {
            return Err(ReaderError::FetchFailed(format!("chapter {chapter_id} unavailable")));
        }
        let count = lock(&self.pages).get(&chapter_id).copied();
        let count =
            count.ok_or_else(|| ReaderError::FetchFailed(format!("unknown chapter {chapter_id}")))?;
        Ok(ChapterPages::new(Self::page_urls(chapter_id, count)))
    }

    async fn fetch_chapter_list(&self, manga_id: MangaId) -> Result<Vec<Chapter>, ReaderError> {
        if manga_id != MANGA_ID {
            return Err(ReaderError::FetchFailed(format!("unknown manga {manga_id}")));
        }
        let mut chapters = lock(&self.chapters).clone();
        chapters.sort_by_key(|chapter| std::cmp::Reverse(chapter.source_order));
        Ok(chapters)
    }

    async fn update_chapters(
        &self,
        chapter_ids: &[ChapterId],
        patch: &ChapterPatch,
    ) -> Result<(), ServiceError> {
        for chapter in lock(&self.chapters).iter_mut() {
            if chapter_ids.contains(&chapter.id) {
                patch.apply_to(chapter);
            }
        }
        lock(&self.updates)
            .push((chapter_ids.to_vec(), patch.clone()));
        Ok(())
    }

    async fn download_chapters(&self, chapter_ids: &[ChapterId]) -> Result<(), ServiceError> {
        for chapter in lock(&self.chapters).iter_mut() {
            if chapter_ids.contains(&chapter.id) {
                chapter.is_downloaded = true;
            }
        }
        Ok(())
    }

    async fn delete_chapters(&self, chapter_ids: &[ChapterId]) -> Result<(), ServiceError> {
        for chapter in lock(&self.chapters).iter_mut() {
            if chapter_ids.contains(&chapter.id) {
                chapter.is_downloaded = false;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier(Mutex<Vec<Notification>>);

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        lock(&self.0)
            .iter()
            .map(|notification| notification.message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        lock(&self.0).push(notification);
    }
}

/// Resolves every ticket against `source`, in order.
pub async fn fetch_all(session: &mut ReaderSession, source: &FakeSource, tickets: Vec<FetchTicket>) {
    for ticket in tickets {
        let result = source.fetch_chapter_pages(ticket.chapter_id()).await;
        session.complete_fetch(ticket, result);
    }
}

#[cfg(test)]
mod scenarios;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_chapters_newest_first() {
        let chapters = make_chapters(3);
        assert_eq!(chapters[0].source_order, 3);
        assert_eq!(chapters[2].id, ChapterId(10));
        assert_eq!(chapters[2].chapter_number, 1.0);
    }

    #[test]
    fn builds_settings() {
        let settings = make_settings(ReadingMode::DoublePage);
        assert_eq!(settings.reading_mode, ReadingMode::DoublePage);
        assert!(settings.load_next_on_ending);
    }

    #[tokio::test]
    async fn fake_source_serves_pages_and_failures() {
        let source = FakeSource::new(make_chapters(2), 3);
        let pages = source.fetch_chapter_pages(ChapterId(10)).await.unwrap();
        assert_eq!(pages.page_count, 3);

        source.set_failing(ChapterId(10), true);
        assert!(source.fetch_chapter_pages(ChapterId(10)).await.is_err());
        assert!(source.fetch_chapter_list(MangaId(9)).await.is_err());
    }
}
