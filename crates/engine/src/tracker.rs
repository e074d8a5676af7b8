use mangashelf_core::{PageLoadState, PageSpreadState};

/// Aspect heuristic for a loaded image. Square images are not spreads.
pub fn is_spread_page(width: u32, height: u32) -> bool {
    width > height
}

/// Result of feeding one load or error event into the tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadUpdate {
    pub state_changed: bool,
    /// Every page has reported and the spread state differs from the one
    /// the page list was last built from.
    pub repaginate: bool,
}

/// Per-page load and spread bookkeeping for one chapter.
#[derive(Debug, Clone, Default)]
pub struct PageLoadTracker {
    urls: Vec<String>,
    states: Vec<PageLoadState>,
    spreads: Vec<Option<bool>>,
    retry_key_prefix: u32,
}

impl PageLoadTracker {
    pub fn new(urls: Vec<String>) -> Self {
        let total = urls.len();
        Self {
            urls,
            states: vec![PageLoadState::Pending; total],
            spreads: vec![None; total],
            retry_key_prefix: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> &[PageLoadState] {
        &self.states
    }

    pub fn state(&self, index: usize) -> Option<PageLoadState> {
        self.states.get(index).copied()
    }

    pub fn retry_key_prefix(&self) -> u32 {
        self.retry_key_prefix
    }

    pub fn on_load(&mut self, index: usize, width: u32, height: u32) -> LoadUpdate {
        let Some(state) = self.states.get_mut(index) else {
            tracing::warn!(index, total = self.urls.len(), "load event for unknown page");
            return LoadUpdate::default();
        };
        let state_changed = *state != PageLoadState::Loaded;
        *state = PageLoadState::Loaded;

        let is_spread = is_spread_page(width, height);
        let spread_changed = self.spreads[index] != Some(is_spread);
        if spread_changed {
            self.spreads[index] = Some(is_spread);
        }
        tracing::trace!(index, width, height, is_spread, "page loaded");

        LoadUpdate {
            state_changed,
            repaginate: spread_changed && self.is_spread_state_converged(),
        }
    }

    /// Marks a page as failed. A failed page counts as a non-spread report so
    /// pairing can still converge around it.
    pub fn on_error(&mut self, index: usize) -> LoadUpdate {
        let Some(state) = self.states.get_mut(index) else {
            tracing::warn!(index, total = self.urls.len(), "error event for unknown page");
            return LoadUpdate::default();
        };
        let state_changed = *state != PageLoadState::Errored;
        *state = PageLoadState::Errored;

        let first_report = self.spreads[index].is_none();
        if first_report {
            self.spreads[index] = Some(false);
        }
        tracing::debug!(index, "page failed to load");

        LoadUpdate {
            state_changed,
            repaginate: first_report && self.is_spread_state_converged(),
        }
    }

    /// Puts an errored page back into `Pending`. Returns false for pages
    /// that are not errored.
    pub fn retry(&mut self, index: usize) -> bool {
        match self.states.get_mut(index) {
            Some(state) if *state == PageLoadState::Errored => {
                *state = PageLoadState::Pending;
                self.retry_key_prefix = self.retry_key_prefix.wrapping_add(1);
                true
            }
            _ => false,
        }
    }

    pub fn retry_failed(&mut self) -> usize {
        let mut count = 0;
        for state in &mut self.states {
            if *state == PageLoadState::Errored {
                *state = PageLoadState::Pending;
                count += 1;
            }
        }
        if count > 0 {
            self.retry_key_prefix = self.retry_key_prefix.wrapping_add(1);
        }
        count
    }

    pub fn failed_pages(&self) -> Vec<usize> {
        self.states
            .iter()
            .enumerate()
            .filter_map(|(i, state)| (*state == PageLoadState::Errored).then_some(i))
            .collect()
    }

    pub fn loaded_count(&self) -> usize {
        self.states
            .iter()
            .filter(|state| **state == PageLoadState::Loaded)
            .count()
    }

    /// No page is pending and the tracker covers `total_pages`.
    pub fn is_ready(&self, total_pages: usize) -> bool {
        self.states.len() == total_pages
            && self
                .states
                .iter()
                .all(|state| *state != PageLoadState::Pending)
    }

    pub fn is_spread_state_converged(&self) -> bool {
        self.spreads.iter().all(Option::is_some)
    }

    /// The spread state of every page, once each page reported at least once.
    pub fn converged_spread_state(&self) -> Option<Vec<PageSpreadState>> {
        self.urls
            .iter()
            .zip(&self.spreads)
            .map(|(url, spread)| {
                spread.map(|is_spread| PageSpreadState {
                    url: url.clone(),
                    is_spread,
                })
            })
            .collect()
    }
}
