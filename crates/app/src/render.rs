//! Plain-text rendering of a reader session.

use mangashelf_application::{ChapterView, ChapterViewer, ReaderSession};
use mangashelf_core::PageLoadState;

pub fn render(session: &ReaderSession) -> Vec<String> {
    let mut out = Vec::new();
    let settings = session.settings();
    let Some(chapter) = session.chapters().current_chapter() else {
        out.push("no chapter selected".to_string());
        return out;
    };
    out.push(format!(
        "== {} [{} {}{}] ==",
        chapter.name,
        settings.reading_mode,
        settings.reading_direction,
        if settings.offset_double_spreads {
            " offset"
        } else {
            ""
        }
    ));

    if let Some(page) = session.active_transition_page() {
        out.extend(page.lines());
        return out;
    }

    if settings.reading_mode.is_continuous() {
        for viewer in session.viewers() {
            let marker = if viewer.is_current() { "*" } else { " " };
            out.push(format!("{marker} {}: {}", viewer.chapter().name, summary(viewer)));
        }
    }

    let Some(viewer) = session.current_viewer() else {
        out.push("loading...".to_string());
        return out;
    };
    match viewer.view() {
        ChapterView::Hidden => {}
        ChapterView::Loading => out.push("loading...".to_string()),
        ChapterView::Error(err) => out.push(format!("error: {err} (type `retry`)")),
        ChapterView::NoPagesFound => out.push("no pages found (type `retry`)".to_string()),
        ChapterView::Pages {
            pages, load_states, ..
        } => {
            let state = session.context().state();
            let progress = state.progress();
            if let Some(page) = state.current_pages_index().and_then(|pos| pages.get(pos)) {
                let label = match load_states.get(page.primary.index) {
                    Some(PageLoadState::Loaded) => "",
                    Some(PageLoadState::Errored) => " (failed)",
                    _ => " (loading)",
                };
                let spread = if page.is_spread { " spread" } else { "" };
                out.push(format!(
                    "page {} of {}{spread}{label}",
                    page.name, progress.total_pages
                ));
                out.push(format!("  {}", page.primary.url));
                if let Some(secondary) = &page.secondary {
                    out.push(format!("  {}", secondary.url));
                }
            }
            out.push(format!(
                "progress {:.0}% | loaded {}/{}",
                progress.percent(),
                state.loaded_pages(),
                progress.total_pages
            ));
            let failed = viewer.failed_pages();
            if !failed.is_empty() {
                let pages: Vec<String> = failed.iter().map(|i| (i + 1).to_string()).collect();
                out.push(format!("failed pages: {} (type `retry`)", pages.join(", ")));
            }
        }
    }
    out
}

fn summary(viewer: &ChapterViewer) -> String {
    match viewer.view() {
        ChapterView::Hidden => "hidden".to_string(),
        ChapterView::Loading => "loading".to_string(),
        ChapterView::Error(err) => format!("error: {err}"),
        ChapterView::NoPagesFound => "no pages found".to_string(),
        ChapterView::Pages {
            previous_transition,
            pages,
            next_transition,
            ..
        } => {
            let mut parts = Vec::new();
            if previous_transition {
                parts.push("[previous]".to_string());
            }
            parts.push(format!("{} pages", pages.len()));
            if next_transition {
                parts.push("[next]".to_string());
            }
            parts.join(" ")
        }
    }
}
