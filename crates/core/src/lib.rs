//! Core domain types for Mangashelf.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChapterId(pub i64);

impl std::fmt::Display for ChapterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MangaId(pub i64);

impl std::fmt::Display for MangaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A chapter snapshot as returned by the chapter list fetch.
///
/// `source_order` counts from 1 for the oldest chapter. Snapshots are never
/// mutated by the reader; changes go through the chapter service and a
/// refetch replaces the whole list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: ChapterId,
    pub name: String,
    #[serde(default = "unknown_chapter_number")]
    pub chapter_number: f64,
    pub source_order: u32,
    #[serde(default)]
    pub scanlator: Option<String>,
    #[serde(default)]
    pub last_page_read: u32,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub is_bookmarked: bool,
    #[serde(default)]
    pub is_downloaded: bool,
    #[serde(default)]
    pub upload_date: i64,
}

fn unknown_chapter_number() -> f64 {
    -1.0
}

impl Chapter {
    pub fn has_known_number(&self) -> bool {
        self.chapter_number >= 0.0
    }

    /// Whether `other` is another release of the same chapter.
    ///
    /// Two chapters match when both carry the same known chapter number, or
    /// when their names are equal after [`chapter_name_key`] normalization.
    pub fn is_duplicate_of(&self, other: &Chapter) -> bool {
        if self.id == other.id {
            return true;
        }
        if self.has_known_number() && other.has_known_number() {
            return self.chapter_number == other.chapter_number;
        }
        let key = chapter_name_key(&self.name);
        !key.is_empty() && key == chapter_name_key(&other.name)
    }

    pub fn is_same_scanlator(&self, other: &Chapter) -> bool {
        let normalize = |value: &Option<String>| value.as_deref().map(base_cleanup);
        normalize(&self.scanlator) == normalize(&other.scanlator)
    }
}

pub fn base_cleanup(value: &str) -> String {
    value.trim().to_lowercase()
}

pub fn enhanced_cleanup(value: &str) -> String {
    base_cleanup(value)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Name key used for duplicate detection: [`enhanced_cleanup`] with a
/// leading "chapter"/"ch" keyword removed, so "Ch. 10" and "Chapter 10"
/// share the key "10".
pub fn chapter_name_key(name: &str) -> String {
    let cleaned = enhanced_cleanup(name);
    for prefix in ["chapter", "chap", "ch"] {
        if let Some(rest) = cleaned.strip_prefix(prefix)
            && rest.starts_with(|c: char| c.is_ascii_digit())
        {
            return rest.to_string();
        }
    }
    cleaned
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadingMode {
    SinglePage,
    DoublePage,
    ContinuousVertical,
    ContinuousHorizontal,
}

impl ReadingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingMode::SinglePage => "single",
            ReadingMode::DoublePage => "double",
            ReadingMode::ContinuousVertical => "continuous-vertical",
            ReadingMode::ContinuousHorizontal => "continuous-horizontal",
        }
    }

    pub fn is_continuous(&self) -> bool {
        matches!(
            self,
            ReadingMode::ContinuousVertical | ReadingMode::ContinuousHorizontal
        )
    }

    pub fn is_continuous_vertical(&self) -> bool {
        *self == ReadingMode::ContinuousVertical
    }
}

impl std::fmt::Display for ReadingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReadingMode {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "single" | "single-page" => Ok(ReadingMode::SinglePage),
            "double" | "double-page" => Ok(ReadingMode::DoublePage),
            "vertical" | "continuous-vertical" => Ok(ReadingMode::ContinuousVertical),
            "horizontal" | "continuous-horizontal" => Ok(ReadingMode::ContinuousHorizontal),
            _ => Err("unknown reading mode"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingDirection {
    Ltr,
    Rtl,
}

impl ReadingDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingDirection::Ltr => "ltr",
            ReadingDirection::Rtl => "rtl",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ReadingDirection::Ltr => ReadingDirection::Rtl,
            ReadingDirection::Rtl => ReadingDirection::Ltr,
        }
    }
}

impl std::fmt::Display for ReadingDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReadingDirection {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ltr" => Ok(ReadingDirection::Ltr),
            "rtl" => Ok(ReadingDirection::Rtl),
            _ => Err("unknown reading direction"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumeMode {
    Start,
    End,
}

impl std::str::FromStr for ResumeMode {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(ResumeMode::Start),
            "end" => Ok(ResumeMode::End),
            _ => Err("unknown resume mode"),
        }
    }
}

/// Which synthetic chapter-boundary pages are visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransitionPageMode {
    #[default]
    None,
    Previous,
    Next,
    Both,
}

impl TransitionPageMode {
    pub fn shows(&self, kind: TransitionPageKind) -> bool {
        match (self, kind) {
            (TransitionPageMode::Both, _) => true,
            (TransitionPageMode::Previous, TransitionPageKind::Previous) => true,
            (TransitionPageMode::Next, TransitionPageKind::Next) => true,
            _ => false,
        }
    }
}

/// The two concrete transition pages a chapter can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionPageKind {
    Previous,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PageLoadState {
    #[default]
    Pending,
    Loaded,
    Errored,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SinglePage {
    pub index: usize,
    pub url: String,
}

impl SinglePage {
    pub fn alt(&self) -> String {
        format!("Page #{}", self.index + 1)
    }
}

/// One renderable slot of the page list: a single page, or a pair in
/// double-page mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageData {
    pub name: String,
    pub primary: SinglePage,
    pub secondary: Option<SinglePage>,
    pub is_spread: bool,
}

impl PageData {
    pub fn single(page: SinglePage, is_spread: bool) -> Self {
        Self {
            name: format!("{}", page.index + 1),
            primary: page,
            secondary: None,
            is_spread,
        }
    }

    pub fn first_index(&self) -> usize {
        match &self.secondary {
            Some(secondary) => self.primary.index.min(secondary.index),
            None => self.primary.index,
        }
    }

    pub fn last_index(&self) -> usize {
        match &self.secondary {
            Some(secondary) => self.primary.index.max(secondary.index),
            None => self.primary.index,
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.primary.index == index
            || self.secondary.as_ref().is_some_and(|page| page.index == index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageSpreadState {
    pub url: String,
    pub is_spread: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    pub reading_mode: ReadingMode,
    pub reading_direction: ReadingDirection,
    pub offset_double_spreads: bool,
    pub skip_dup_chapters: bool,
    pub load_next_on_ending: bool,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            reading_mode: ReadingMode::SinglePage,
            reading_direction: ReadingDirection::Ltr,
            offset_double_spreads: false,
            skip_dup_chapters: true,
            load_next_on_ending: true,
        }
    }
}

impl ReaderSettings {
    pub fn cycle_reading_mode(&mut self) {
        self.reading_mode = match self.reading_mode {
            ReadingMode::SinglePage => ReadingMode::DoublePage,
            ReadingMode::DoublePage => ReadingMode::ContinuousVertical,
            ReadingMode::ContinuousVertical => ReadingMode::ContinuousHorizontal,
            ReadingMode::ContinuousHorizontal => ReadingMode::SinglePage,
        };
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub reader: ReaderSettings,
    pub library_root: Option<String>,
}

impl Settings {
    pub fn normalize(&mut self) {
        self.library_root = self
            .library_root
            .take()
            .map(|root| root.trim().to_string())
            .filter(|root| !root.is_empty());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub current_page: u32,
    pub total_pages: u32,
}

impl Progress {
    pub fn percent(&self) -> f32 {
        if self.total_pages == 0 {
            0.0
        } else {
            (self.current_page as f32 / self.total_pages as f32) * 100.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReaderError {
    #[error("failed to load chapter pages: {0}")]
    FetchFailed(String),
    #[error("request was superseded")]
    Cancelled,
    #[error("no pages found")]
    NoPagesFound,
    #[error("failed to load page {}", .index + 1)]
    PageLoadFailed { index: usize },
}
