//! Application orchestration layer for Mangashelf: chapter window, chapter
//! viewers, the shared reader context and chapter actions.

mod actions;
mod advancer;
mod chapters;
mod context;
mod session;
mod viewer;

pub use actions::{
    ActionOptions, ChapterAction, ChapterPatch, ChapterService, Notification, NotificationKind,
    Notifier, ServiceError, auto_deletable, bookmarked, chapter_ids, downloaded,
    is_auto_deletable, perform_action, unread,
};
pub use advancer::{BoundaryVisibility, ChapterNavigation, InfiniteScrollAdvancer};
pub use chapters::{
    ChapterRole, ReaderChaptersState, ReaderChaptersWindow, ResumeTarget, VisibleChapters,
    derive_chapters_window, remove_duplicates, resume_target,
};
pub use context::{ReaderContext, ReaderPagesState, WriteToken};
pub use session::ReaderSession;
pub use viewer::{
    ChapterPages, ChapterView, ChapterViewer, FetchOutcome, FetchTicket, PageTurn, ViewerState,
};
