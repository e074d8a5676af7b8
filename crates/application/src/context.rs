//! Reader-wide page state shared with progress and pager components.

use mangashelf_core::{ChapterId, PageData, PageLoadState, Progress, TransitionPageMode};

/// Write capability for the shared [`ReaderContext`].
///
/// Only the chapter currently deemed "current" holds a valid token. Claiming
/// a new token invalidates every earlier one.
#[derive(Debug, PartialEq, Eq)]
pub struct WriteToken {
    chapter_id: ChapterId,
    epoch: u64,
}

impl WriteToken {
    pub fn chapter_id(&self) -> ChapterId {
        self.chapter_id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderPagesState {
    pub current_page_index: usize,
    pub total_pages: usize,
    pub pages: Vec<PageData>,
    pub page_load_states: Vec<PageLoadState>,
    pub transition_page_mode: TransitionPageMode,
    pub page_to_scroll_to: Option<usize>,
    pub retry_key_prefix: u32,
}

impl ReaderPagesState {
    pub fn current_pages_index(&self) -> Option<usize> {
        mangashelf_engine::pages_index_of(&self.pages, self.current_page_index)
    }

    pub fn progress(&self) -> Progress {
        let current_page = if self.total_pages == 0 {
            0
        } else {
            self.current_page_index + 1
        };
        Progress {
            current_page: current_page as u32,
            total_pages: self.total_pages as u32,
        }
    }

    pub fn loaded_pages(&self) -> usize {
        self.page_load_states
            .iter()
            .filter(|state| **state == PageLoadState::Loaded)
            .count()
    }
}

#[derive(Debug, Default)]
pub struct ReaderContext {
    state: ReaderPagesState,
    owner: Option<ChapterId>,
    epoch: u64,
    fetch_generation: u64,
}

impl ReaderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ReaderPagesState {
        &self.state
    }

    pub fn owner(&self) -> Option<ChapterId> {
        self.owner
    }

    /// Hands write access to `chapter_id` and clears the state left by the
    /// previous owner.
    pub fn claim(&mut self, chapter_id: ChapterId) -> WriteToken {
        self.epoch = self.epoch.wrapping_add(1);
        self.owner = Some(chapter_id);
        self.state = ReaderPagesState::default();
        tracing::debug!(%chapter_id, epoch = self.epoch, "reader context claimed");
        WriteToken {
            chapter_id,
            epoch: self.epoch,
        }
    }

    /// Generation for the next page fetch. Unique for the lifetime of the
    /// context, so a remounted chapter never reuses a cancelled ticket.
    pub fn next_fetch_generation(&mut self) -> u64 {
        self.fetch_generation = self.fetch_generation.wrapping_add(1);
        self.fetch_generation
    }

    pub fn release(&mut self, token: WriteToken) {
        if self.is_valid(&token) {
            self.epoch = self.epoch.wrapping_add(1);
            self.owner = None;
        }
    }

    pub fn is_valid(&self, token: &WriteToken) -> bool {
        token.epoch == self.epoch && self.owner == Some(token.chapter_id)
    }

    pub fn write(&mut self, token: &WriteToken) -> Option<&mut ReaderPagesState> {
        if !self.is_valid(token) {
            tracing::trace!(chapter_id = %token.chapter_id, "rejected write with stale token");
            return None;
        }
        Some(&mut self.state)
    }

    pub fn set_current_page_index(&mut self, token: &WriteToken, index: usize) -> bool {
        match self.write(token) {
            Some(state) => {
                state.current_page_index = index;
                true
            }
            None => false,
        }
    }

    pub fn set_transition_page_mode(&mut self, token: &WriteToken, mode: TransitionPageMode) -> bool {
        match self.write(token) {
            Some(state) => {
                state.transition_page_mode = mode;
                true
            }
            None => false,
        }
    }

    /// Consumes the pending scroll target, if any.
    pub fn take_page_to_scroll_to(&mut self) -> Option<usize> {
        self.state.page_to_scroll_to.take()
    }
}
