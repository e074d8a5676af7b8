use mangashelf_core::{Chapter, ChapterId, ReadingMode, TransitionPageKind, TransitionPageMode};

/// Continuous modes always show their boundary pages; paged modes only
/// show the one the navigation has stepped onto.
pub fn is_transition_page_visible(
    kind: TransitionPageKind,
    mode: TransitionPageMode,
    reading_mode: ReadingMode,
) -> bool {
    reading_mode.is_continuous() || mode.shows(kind)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionNotice {
    FirstChapter,
    LastChapter,
}

impl TransitionNotice {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionNotice::FirstChapter => "There is no previous chapter",
            TransitionNotice::LastChapter => "There is no next chapter",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryLabel {
    Previous,
    Current,
    Finished,
    Next,
}

impl SummaryLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryLabel::Previous => "Previous:",
            SummaryLabel::Current => "Current:",
            SummaryLabel::Finished => "Finished:",
            SummaryLabel::Next => "Next:",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterSummary {
    pub id: ChapterId,
    pub name: String,
    pub scanlator: Option<String>,
}

impl From<&Chapter> for ChapterSummary {
    fn from(chapter: &Chapter) -> Self {
        Self {
            id: chapter.id,
            name: chapter.name.clone(),
            scanlator: chapter.scanlator.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPage {
    pub kind: TransitionPageKind,
    pub notice: Option<TransitionNotice>,
    pub entries: Vec<(SummaryLabel, ChapterSummary)>,
    /// Exit buttons (back, manga page) shown at the ends of the sequence.
    pub show_exit_actions: bool,
}

impl TransitionPage {
    pub fn build(
        kind: TransitionPageKind,
        current: Option<&Chapter>,
        previous: Option<&Chapter>,
        next: Option<&Chapter>,
    ) -> Self {
        let is_previous_kind = kind == TransitionPageKind::Previous;
        let is_first_chapter = current.is_some() && previous.is_none();
        let is_last_chapter = current.is_some() && next.is_none();

        let mut entries = Vec::new();
        if is_previous_kind && !is_first_chapter
            && let Some(chapter) = previous
        {
            entries.push((SummaryLabel::Previous, ChapterSummary::from(chapter)));
        }
        if let Some(chapter) = current {
            let label = if is_previous_kind {
                SummaryLabel::Current
            } else {
                SummaryLabel::Finished
            };
            entries.push((label, ChapterSummary::from(chapter)));
        }
        if !is_previous_kind && !is_last_chapter
            && let Some(chapter) = next
        {
            entries.push((SummaryLabel::Next, ChapterSummary::from(chapter)));
        }

        let notice = match kind {
            TransitionPageKind::Previous if is_first_chapter => Some(TransitionNotice::FirstChapter),
            TransitionPageKind::Next if is_last_chapter => Some(TransitionNotice::LastChapter),
            _ => None,
        };

        Self {
            kind,
            notice,
            entries,
            show_exit_actions: notice.is_some(),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.kind == TransitionPageKind::Previous
            && let Some(notice) = self.notice
        {
            out.push(notice.as_str().to_string());
        }
        for (label, summary) in &self.entries {
            out.push(label.as_str().to_string());
            out.push(format!("  {}", summary.name));
            if let Some(scanlator) = &summary.scanlator {
                out.push(format!("  {scanlator}"));
            }
        }
        if self.kind == TransitionPageKind::Next
            && let Some(notice) = self.notice
        {
            out.push(notice.as_str().to_string());
        }
        if self.show_exit_actions {
            out.push("[back] [manga]".to_string());
        }
        out
    }
}
