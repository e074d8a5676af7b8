//! A manga directory on disk served through [`ChapterService`].
//!
//! Every subdirectory of the root is one chapter and every image inside it is
//! one page. An optional `manga.json` at the root lists the chapter
//! directories oldest first together with their metadata; without it the
//! directories are ordered by the number in their name.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Context as _;
use mangashelf_application::{ChapterPages, ChapterPatch, ChapterService, ServiceError};
use mangashelf_core::{Chapter, ChapterId, MangaId, ReaderError};
use mangashelf_storage::{ChapterRecord, Storage};
use serde::Deserialize;

pub const LOCAL_MANGA_ID: MangaId = MangaId(1);
const MANIFEST: &str = "manga.json";
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Manifest {
    title: Option<String>,
    chapters: Vec<ManifestChapter>,
}

#[derive(Debug, Deserialize)]
struct ManifestChapter {
    dir: String,
    name: Option<String>,
    chapter_number: Option<f64>,
    scanlator: Option<String>,
    #[serde(default)]
    upload_date: i64,
}

#[derive(Debug)]
struct LocalChapter {
    chapter: Chapter,
    dir: PathBuf,
}

#[derive(Debug)]
pub struct LocalLibrary {
    title: String,
    manga_key: String,
    chapters: Mutex<Vec<LocalChapter>>,
    storage: Mutex<Storage>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LocalLibrary {
    pub fn open(root: &Path, storage: Storage) -> anyhow::Result<Self> {
        let root = fs::canonicalize(root)
            .with_context(|| format!("resolve library dir {}", root.display()))?;
        let manifest = read_manifest(&root)?;
        let chapters = match &manifest {
            Some(manifest) => chapters_from_manifest(&root, manifest),
            None => scan_chapter_dirs(&root)?,
        };
        let title = manifest
            .and_then(|manifest| manifest.title)
            .or_else(|| {
                root.file_name()
                    .and_then(|name| name.to_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "untitled".to_string());
        tracing::info!(%title, chapters = chapters.len(), root = %root.display(), "opened library");

        Ok(Self {
            title,
            manga_key: root.to_string_lossy().to_string(),
            chapters: Mutex::new(chapters),
            storage: Mutex::new(storage),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    fn chapter_dir(&self, chapter_id: ChapterId) -> Option<PathBuf> {
        lock(&self.chapters)
            .iter()
            .find(|local| local.chapter.id == chapter_id)
            .map(|local| local.dir.clone())
    }
}

fn read_manifest(root: &Path) -> anyhow::Result<Option<Manifest>> {
    let path = root.join(MANIFEST);
    if !path.is_file() {
        return Ok(None);
    }
    let text =
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let manifest =
        serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(manifest))
}

fn chapters_from_manifest(root: &Path, manifest: &Manifest) -> Vec<LocalChapter> {
    manifest
        .chapters
        .iter()
        .enumerate()
        .map(|(pos, entry)| {
            let source_order = pos as u32 + 1;
            let name = entry.name.clone().unwrap_or_else(|| entry.dir.clone());
            LocalChapter {
                chapter: Chapter {
                    id: ChapterId(i64::from(source_order)),
                    chapter_number: entry
                        .chapter_number
                        .unwrap_or_else(|| parse_chapter_number(&name)),
                    name,
                    source_order,
                    scanlator: entry.scanlator.clone(),
                    last_page_read: 0,
                    is_read: false,
                    is_bookmarked: false,
                    is_downloaded: true,
                    upload_date: entry.upload_date,
                },
                dir: root.join(&entry.dir),
            }
        })
        .collect()
}

fn scan_chapter_dirs(root: &Path) -> anyhow::Result<Vec<LocalChapter>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root).with_context(|| format!("read dir {}", root.display()))? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        dirs.push((parse_chapter_number(&name), name, path));
    }
    dirs.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    Ok(dirs
        .into_iter()
        .enumerate()
        .map(|(pos, (chapter_number, name, dir))| {
            let source_order = pos as u32 + 1;
            LocalChapter {
                chapter: Chapter {
                    id: ChapterId(i64::from(source_order)),
                    name,
                    chapter_number,
                    source_order,
                    scanlator: None,
                    last_page_read: 0,
                    is_read: false,
                    is_bookmarked: false,
                    is_downloaded: true,
                    upload_date: 0,
                },
                dir,
            }
        })
        .collect())
}

/// First decimal number in `name`, or -1 when there is none.
fn parse_chapter_number(name: &str) -> f64 {
    let Some(start) = name.find(|c: char| c.is_ascii_digit()) else {
        return -1.0;
    };
    let digits: String = name[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    digits.trim_end_matches('.').parse().unwrap_or(-1.0)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

async fn list_pages(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut pages = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if is_image(&path) {
            pages.push(path.to_string_lossy().to_string());
        }
    }
    pages.sort();
    Ok(pages)
}

impl ChapterService for LocalLibrary {
    async fn fetch_chapter_pages(&self, chapter_id: ChapterId) -> Result<ChapterPages, ReaderError> {
        let dir = self
            .chapter_dir(chapter_id)
            .ok_or_else(|| ReaderError::FetchFailed(format!("unknown chapter {chapter_id}")))?;
        let pages = list_pages(&dir)
            .await
            .map_err(|err| ReaderError::FetchFailed(format!("{}: {err}", dir.display())))?;
        Ok(ChapterPages::new(pages))
    }

    async fn fetch_chapter_list(&self, manga_id: MangaId) -> Result<Vec<Chapter>, ReaderError> {
        if manga_id != LOCAL_MANGA_ID {
            return Err(ReaderError::FetchFailed(format!("unknown manga {manga_id}")));
        }
        let mut chapters: Vec<Chapter> = lock(&self.chapters)
            .iter()
            .map(|local| local.chapter.clone())
            .collect();
        lock(&self.storage)
            .merge_chapter_records(&self.manga_key, &mut chapters)
            .map_err(|err| ReaderError::FetchFailed(format!("{err:#}")))?;
        chapters.reverse();
        Ok(chapters)
    }

    async fn update_chapters(
        &self,
        chapter_ids: &[ChapterId],
        patch: &ChapterPatch,
    ) -> Result<(), ServiceError> {
        if !patch.chapter_ids_to_delete.is_empty() {
            tracing::debug!(
                count = patch.chapter_ids_to_delete.len(),
                "local chapters are never deleted"
            );
        }
        let patch = ChapterPatch {
            chapter_ids_to_delete: Vec::new(),
            ..patch.clone()
        };

        let mut chapters = lock(&self.chapters);
        let storage = lock(&self.storage);
        for local in chapters
            .iter_mut()
            .filter(|local| chapter_ids.contains(&local.chapter.id))
        {
            patch.apply_to(&mut local.chapter);
            storage
                .save_chapter_record(&self.manga_key, &ChapterRecord::from_chapter(&local.chapter))
                .map_err(|err| ServiceError(format!("{err:#}")))?;
        }
        Ok(())
    }

    async fn download_chapters(&self, chapter_ids: &[ChapterId]) -> Result<(), ServiceError> {
        tracing::debug!(count = chapter_ids.len(), "local chapters are already downloaded");
        Ok(())
    }

    async fn delete_chapters(&self, _chapter_ids: &[ChapterId]) -> Result<(), ServiceError> {
        Err(ServiceError("local chapters cannot be deleted".to_string()))
    }
}
