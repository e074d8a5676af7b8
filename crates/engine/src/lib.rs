//! Paging engine: page list construction, load tracking, resume resolution
//! and chapter transition pages.

mod pages;
mod resume;
mod tracker;
mod transition;

pub use pages::{build_pages, pages_index_of, single_pages, snap_page_index};
pub use resume::{resolve_resume_mode, resolve_start_index};
pub use tracker::{LoadUpdate, PageLoadTracker, is_spread_page};
pub use transition::{
    ChapterSummary, SummaryLabel, TransitionNotice, TransitionPage, is_transition_page_visible,
};
