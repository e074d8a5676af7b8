use mangashelf_core::{ReaderError, ResumeMode};

/// Picks where a freshly entered chapter opens. First match wins: a forced
/// mode, then the navigation-provided mode of the initial chapter, then END
/// for a leading chapter (entered while scrolling backward), START otherwise.
pub fn resolve_resume_mode(
    forced: Option<ResumeMode>,
    is_initial_chapter: bool,
    is_leading_chapter: bool,
    is_trailing_chapter: bool,
    location: Option<ResumeMode>,
) -> ResumeMode {
    if let Some(mode) = forced {
        return mode;
    }
    if is_initial_chapter {
        return location.unwrap_or(ResumeMode::Start);
    }
    if is_leading_chapter {
        return ResumeMode::End;
    }
    if is_trailing_chapter {
        return ResumeMode::Start;
    }
    ResumeMode::Start
}

pub fn resolve_start_index(
    resume_mode: ResumeMode,
    last_page_read: usize,
    total_pages: usize,
) -> Result<usize, ReaderError> {
    if total_pages == 0 {
        return Err(ReaderError::NoPagesFound);
    }
    let last = total_pages - 1;
    Ok(match resume_mode {
        ResumeMode::Start => last_page_read.min(last),
        ResumeMode::End => last,
    })
}
