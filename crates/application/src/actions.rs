//! Chapter service seam and user-triggered chapter actions.

use std::future::Future;

use mangashelf_core::{Chapter, ChapterId, MangaId, ReaderError};

use crate::ChapterPages;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ServiceError(pub String);

/// Partial chapter update sent through [`ChapterService::update_chapters`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterPatch {
    pub is_read: Option<bool>,
    pub is_bookmarked: Option<bool>,
    pub last_page_read: Option<u32>,
    pub chapter_ids_to_delete: Vec<ChapterId>,
}

impl ChapterPatch {
    pub fn is_empty(&self) -> bool {
        self.is_read.is_none()
            && self.is_bookmarked.is_none()
            && self.last_page_read.is_none()
            && self.chapter_ids_to_delete.is_empty()
    }

    pub fn apply_to(&self, chapter: &mut Chapter) {
        if let Some(is_read) = self.is_read {
            chapter.is_read = is_read;
        }
        if let Some(is_bookmarked) = self.is_bookmarked {
            chapter.is_bookmarked = is_bookmarked;
        }
        if let Some(last_page_read) = self.last_page_read {
            chapter.last_page_read = last_page_read;
        }
        if self.chapter_ids_to_delete.contains(&chapter.id) {
            chapter.is_downloaded = false;
        }
    }
}

/// Remote operations the reader depends on.
pub trait ChapterService {
    fn fetch_chapter_pages(
        &self,
        chapter_id: ChapterId,
    ) -> impl Future<Output = Result<ChapterPages, ReaderError>> + Send;

    fn fetch_chapter_list(
        &self,
        manga_id: MangaId,
    ) -> impl Future<Output = Result<Vec<Chapter>, ReaderError>> + Send;

    fn update_chapters(
        &self,
        chapter_ids: &[ChapterId],
        patch: &ChapterPatch,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;

    fn download_chapters(
        &self,
        chapter_ids: &[ChapterId],
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;

    fn delete_chapters(
        &self,
        chapter_ids: &[ChapterId],
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

pub trait Notifier {
    fn notify(&self, notification: Notification);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterAction {
    Download,
    Delete,
    Bookmark,
    Unbookmark,
    MarkAsRead,
    MarkAsUnread,
}

impl ChapterAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChapterAction::Download => "download",
            ChapterAction::Delete => "delete",
            ChapterAction::Bookmark => "bookmark",
            ChapterAction::Unbookmark => "unbookmark",
            ChapterAction::MarkAsRead => "mark_as_read",
            ChapterAction::MarkAsUnread => "mark_as_unread",
        }
    }

    fn success_message(&self, count: usize) -> String {
        let chapters = pluralize(count, "chapter");
        match self {
            ChapterAction::Download => format!("Added {count} {chapters} to the download queue"),
            ChapterAction::Delete => format!("Deleted {count} downloaded {chapters}"),
            ChapterAction::Bookmark => format!("Bookmarked {count} {chapters}"),
            ChapterAction::Unbookmark => format!("Removed the bookmark of {count} {chapters}"),
            ChapterAction::MarkAsRead => format!("Marked {count} {chapters} as read"),
            ChapterAction::MarkAsUnread => format!("Marked {count} {chapters} as unread"),
        }
    }

    fn error_message(&self, count: usize) -> String {
        let chapters = pluralize(count, "chapter");
        match self {
            ChapterAction::Download => {
                format!("Could not add {count} {chapters} to the download queue")
            }
            ChapterAction::Delete => format!("Could not delete {count} downloaded {chapters}"),
            ChapterAction::Bookmark => format!("Could not bookmark {count} {chapters}"),
            ChapterAction::Unbookmark => {
                format!("Could not remove the bookmark of {count} {chapters}")
            }
            ChapterAction::MarkAsRead => format!("Could not mark {count} {chapters} as read"),
            ChapterAction::MarkAsUnread => format!("Could not mark {count} {chapters} as unread"),
        }
    }
}

impl std::fmt::Display for ChapterAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChapterAction {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "download" => Ok(ChapterAction::Download),
            "delete" => Ok(ChapterAction::Delete),
            "bookmark" => Ok(ChapterAction::Bookmark),
            "unbookmark" => Ok(ChapterAction::Unbookmark),
            "mark_as_read" | "read" => Ok(ChapterAction::MarkAsRead),
            "mark_as_unread" | "unread" => Ok(ChapterAction::MarkAsUnread),
            _ => Err("unknown chapter action"),
        }
    }
}

fn pluralize(count: usize, word: &str) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionOptions {
    /// Mark-as-read also deletes the downloads of the affected chapters.
    pub auto_delete_chapters: bool,
    pub delete_bookmarked_chapters: bool,
}

pub fn chapter_ids(chapters: &[Chapter]) -> Vec<ChapterId> {
    chapters.iter().map(|chapter| chapter.id).collect()
}

pub fn downloaded(chapters: &[Chapter]) -> Vec<Chapter> {
    chapters.iter().filter(|c| c.is_downloaded).cloned().collect()
}

pub fn bookmarked(chapters: &[Chapter]) -> Vec<Chapter> {
    chapters.iter().filter(|c| c.is_bookmarked).cloned().collect()
}

pub fn unread(chapters: &[Chapter]) -> Vec<Chapter> {
    chapters.iter().filter(|c| !c.is_read).cloned().collect()
}

pub fn is_auto_deletable(chapter: &Chapter, can_delete_bookmarked: bool) -> bool {
    chapter.is_downloaded && (!chapter.is_bookmarked || can_delete_bookmarked)
}

pub fn auto_deletable(chapters: &[Chapter], can_delete_bookmarked: bool) -> Vec<Chapter> {
    chapters
        .iter()
        .filter(|chapter| is_auto_deletable(chapter, can_delete_bookmarked))
        .cloned()
        .collect()
}

/// Runs `action` on `chapters` and reports the outcome through `notifier`.
/// Failures are reported and then returned to the caller.
pub async fn perform_action<S, N>(
    service: &S,
    notifier: &N,
    action: ChapterAction,
    chapters: &[Chapter],
    options: ActionOptions,
) -> Result<(), ServiceError>
where
    S: ChapterService,
    N: Notifier + ?Sized,
{
    let ids = chapter_ids(chapters);
    let patch = match action {
        ChapterAction::Download | ChapterAction::Delete => None,
        ChapterAction::Bookmark => Some(ChapterPatch {
            is_bookmarked: Some(true),
            ..ChapterPatch::default()
        }),
        ChapterAction::Unbookmark => Some(ChapterPatch {
            is_bookmarked: Some(false),
            ..ChapterPatch::default()
        }),
        ChapterAction::MarkAsRead => {
            let chapter_ids_to_delete = if options.auto_delete_chapters {
                chapter_ids(&auto_deletable(
                    chapters,
                    options.delete_bookmarked_chapters,
                ))
            } else {
                Vec::new()
            };
            Some(ChapterPatch {
                is_read: Some(true),
                last_page_read: Some(0),
                chapter_ids_to_delete,
                ..ChapterPatch::default()
            })
        }
        ChapterAction::MarkAsUnread => Some(ChapterPatch {
            is_read: Some(false),
            ..ChapterPatch::default()
        }),
    };

    let result = match (action, patch) {
        (_, Some(patch)) => service.update_chapters(&ids, &patch).await,
        (ChapterAction::Download, None) => service.download_chapters(&ids).await,
        (_, None) => service.delete_chapters(&ids).await,
    };

    let count = chapters.len();
    match &result {
        Ok(()) => notifier.notify(Notification {
            kind: NotificationKind::Success,
            message: action.success_message(count),
        }),
        Err(err) => {
            tracing::warn!(%action, count, error = %err, "chapter action failed");
            notifier.notify(Notification {
                kind: NotificationKind::Error,
                message: action.error_message(count),
            });
        }
    }
    result
}
