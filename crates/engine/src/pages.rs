use mangashelf_core::{PageData, PageSpreadState, ReadingDirection, ReadingMode, SinglePage};

/// Derives the renderable page list for `mode`.
///
/// Double-page pairing needs the spread state of every page. Until
/// `spread_state` covers all urls the `previous` list is returned as is
/// (or a single-page list when there is none yet), so a partially known
/// chapter is never paired.
///
/// With `offset_spreads` the first page is shown alone in its own slot. No
/// blank placeholder page is inserted next to it.
pub fn build_pages(
    page_urls: &[String],
    mode: ReadingMode,
    spread_state: &[PageSpreadState],
    direction: ReadingDirection,
    offset_spreads: bool,
    previous: &[PageData],
) -> Vec<PageData> {
    if mode != ReadingMode::DoublePage {
        return single_pages(page_urls, spread_state);
    }

    if spread_state.len() != page_urls.len() {
        tracing::trace!(
            known = spread_state.len(),
            total = page_urls.len(),
            "spread state incomplete, keeping previous pages"
        );
        if previous.is_empty() {
            return single_pages(page_urls, spread_state);
        }
        return previous.to_vec();
    }

    double_pages(page_urls, spread_state, direction, offset_spreads)
}

pub fn single_pages(page_urls: &[String], spread_state: &[PageSpreadState]) -> Vec<PageData> {
    page_urls
        .iter()
        .enumerate()
        .map(|(index, url)| {
            let is_spread = spread_state
                .get(index)
                .is_some_and(|state| state.url == *url && state.is_spread);
            PageData::single(
                SinglePage {
                    index,
                    url: url.clone(),
                },
                is_spread,
            )
        })
        .collect()
}

fn double_pages(
    page_urls: &[String],
    spread_state: &[PageSpreadState],
    direction: ReadingDirection,
    offset_spreads: bool,
) -> Vec<PageData> {
    let page = |index: usize| SinglePage {
        index,
        url: page_urls[index].clone(),
    };
    let is_spread = |index: usize| spread_state[index].is_spread;

    let total = page_urls.len();
    let mut out = Vec::with_capacity(total);
    let mut index = 0;

    if offset_spreads && total > 0 && !is_spread(0) {
        out.push(PageData::single(page(0), false));
        index = 1;
    }

    while index < total {
        if is_spread(index) {
            out.push(PageData::single(page(index), true));
            index += 1;
            continue;
        }

        let next = index + 1;
        if next < total && !is_spread(next) {
            let (primary, secondary) = match direction {
                ReadingDirection::Ltr => (page(index), page(next)),
                ReadingDirection::Rtl => (page(next), page(index)),
            };
            out.push(PageData {
                name: format!("{}-{}", index + 1, next + 1),
                primary,
                secondary: Some(secondary),
                is_spread: false,
            });
            index += 2;
        } else {
            out.push(PageData::single(page(index), false));
            index += 1;
        }
    }

    out
}

/// Position of the slot showing page `page_index`.
pub fn pages_index_of(pages: &[PageData], page_index: usize) -> Option<usize> {
    pages.iter().position(|page| page.contains(page_index))
}

/// Snaps `page_index` to the first page of the slot containing it, so the
/// current index survives a re-pairing.
pub fn snap_page_index(pages: &[PageData], page_index: usize) -> usize {
    match pages_index_of(pages, page_index) {
        Some(pos) => pages[pos].first_index(),
        None => pages
            .last()
            .map(|page| page.first_index().min(page_index))
            .unwrap_or(0),
    }
}
