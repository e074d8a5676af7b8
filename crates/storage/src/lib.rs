//! Sqlite-backed persistence of settings and locally recorded chapter state.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context as _;
use mangashelf_core::{Chapter, ChapterId, ReaderSettings, Settings};
use rusqlite::{Connection, OptionalExtension as _};

/// Reader-side state of one chapter, layered over the library's snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChapterRecord {
    pub chapter_id: ChapterId,
    pub last_page_read: u32,
    pub is_read: bool,
    pub is_bookmarked: bool,
}

impl ChapterRecord {
    pub fn from_chapter(chapter: &Chapter) -> Self {
        Self {
            chapter_id: chapter.id,
            last_page_read: chapter.last_page_read,
            is_read: chapter.is_read,
            is_bookmarked: chapter.is_bookmarked,
        }
    }

    pub fn apply_to(&self, chapter: &mut Chapter) {
        chapter.last_page_read = self.last_page_read;
        chapter.is_read = self.is_read;
        chapter.is_bookmarked = self.is_bookmarked;
    }
}

#[derive(Debug)]
pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("open sqlite db at {}", path.as_ref().display()))?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    fn migrate(&self) -> anyhow::Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                reader_json TEXT NOT NULL DEFAULT '{}'
            );
            INSERT OR IGNORE INTO settings (id) VALUES (1);

            CREATE TABLE IF NOT EXISTS chapter_state (
                manga TEXT NOT NULL,
                chapter_id INTEGER NOT NULL,
                last_page_read INTEGER NOT NULL DEFAULT 0,
                is_read INTEGER NOT NULL DEFAULT 0,
                is_bookmarked INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL DEFAULT (unixepoch()),
                PRIMARY KEY (manga, chapter_id)
            );
            "#,
        )?;

        match self
            .conn
            .execute("ALTER TABLE settings ADD COLUMN library_root TEXT", [])
        {
            Ok(_) => {}
            Err(err) => {
                let msg = err.to_string();
                if !msg.contains("duplicate column name") {
                    return Err(err).context("add settings.library_root column");
                }
            }
        }

        Ok(())
    }

    pub fn load_settings(&self) -> anyhow::Result<Settings> {
        let row = self
            .conn
            .query_row(
                "SELECT reader_json, library_root FROM settings WHERE id = 1",
                [],
                |row| {
                    let reader_json: String = row.get(0)?;
                    let library_root: Option<String> = row.get(1)?;
                    Ok((reader_json, library_root))
                },
            )
            .optional()?;

        let (reader_json, library_root) = row.unwrap_or_else(|| ("{}".to_string(), None));
        let reader: ReaderSettings = serde_json::from_str(&reader_json).unwrap_or_default();

        let mut settings = Settings {
            reader,
            library_root,
        };
        settings.normalize();
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &Settings) -> anyhow::Result<()> {
        let mut settings = settings.clone();
        settings.normalize();
        let reader_json = serde_json::to_string(&settings.reader)?;

        self.conn.execute(
            "UPDATE settings SET reader_json = ?, library_root = ? WHERE id = 1",
            (reader_json, settings.library_root.as_deref()),
        )?;
        Ok(())
    }

    pub fn list_chapter_records(
        &self,
        manga: &str,
    ) -> anyhow::Result<HashMap<ChapterId, ChapterRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT chapter_id, last_page_read, is_read, is_bookmarked FROM chapter_state WHERE manga = ?",
        )?;
        let rows = stmt.query_map([manga], |row| {
            let last_page_read: i64 = row.get(1)?;
            Ok(ChapterRecord {
                chapter_id: ChapterId(row.get(0)?),
                last_page_read: u32::try_from(last_page_read).unwrap_or(0),
                is_read: row.get(2)?,
                is_bookmarked: row.get(3)?,
            })
        })?;

        let mut out = HashMap::new();
        for row in rows {
            let record = row?;
            out.insert(record.chapter_id, record);
        }
        Ok(out)
    }

    pub fn save_chapter_record(&self, manga: &str, record: &ChapterRecord) -> anyhow::Result<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO chapter_state (manga, chapter_id, last_page_read, is_read, is_bookmarked, updated_at)
                VALUES (?, ?, ?, ?, ?, unixepoch())
                ON CONFLICT(manga, chapter_id) DO UPDATE SET
                    last_page_read = excluded.last_page_read,
                    is_read = excluded.is_read,
                    is_bookmarked = excluded.is_bookmarked,
                    updated_at = excluded.updated_at
                "#,
                (
                    manga,
                    record.chapter_id.0,
                    record.last_page_read as i64,
                    record.is_read,
                    record.is_bookmarked,
                ),
            )
            .with_context(|| format!("save state of chapter {}", record.chapter_id))?;
        Ok(())
    }

    /// Overlays the recorded state onto freshly scanned chapters.
    pub fn merge_chapter_records(&self, manga: &str, chapters: &mut [Chapter]) -> anyhow::Result<()> {
        let records = self.list_chapter_records(manga)?;
        for chapter in chapters {
            if let Some(record) = records.get(&chapter.id) {
                record.apply_to(chapter);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mangashelf_core::{ReadingDirection, ReadingMode};

    use super::*;

    fn open_in_memory() -> anyhow::Result<Storage> {
        let conn = Connection::open_in_memory()?;
        let storage = Storage { conn };
        storage.migrate()?;
        Ok(storage)
    }

    fn chapter(id: i64) -> Chapter {
        Chapter {
            id: ChapterId(id),
            name: format!("Chapter {id}"),
            chapter_number: id as f64,
            source_order: id as u32,
            scanlator: None,
            last_page_read: 0,
            is_read: false,
            is_bookmarked: false,
            is_downloaded: true,
            upload_date: 0,
        }
    }

    #[test]
    fn settings_roundtrip() -> anyhow::Result<()> {
        let storage = open_in_memory()?;
        let mut settings = storage.load_settings()?;
        assert_eq!(settings.reader.reading_mode, ReadingMode::SinglePage);
        assert!(settings.reader.skip_dup_chapters);

        settings.reader.reading_mode = ReadingMode::DoublePage;
        settings.reader.reading_direction = ReadingDirection::Rtl;
        settings.reader.offset_double_spreads = true;
        settings.library_root = Some(" /manga ".to_string());
        storage.save_settings(&settings)?;

        let settings2 = storage.load_settings()?;
        assert_eq!(settings2.reader.reading_mode, ReadingMode::DoublePage);
        assert_eq!(settings2.reader.reading_direction, ReadingDirection::Rtl);
        assert!(settings2.reader.offset_double_spreads);
        assert_eq!(settings2.library_root.as_deref(), Some("/manga"));
        Ok(())
    }

    #[test]
    fn corrupt_reader_settings_fall_back_to_defaults() -> anyhow::Result<()> {
        let storage = open_in_memory()?;
        storage
            .conn
            .execute("UPDATE settings SET reader_json = 'nope' WHERE id = 1", [])?;
        let settings = storage.load_settings()?;
        assert_eq!(settings.reader.reading_mode, ReadingMode::SinglePage);
        Ok(())
    }

    #[test]
    fn migrate_is_idempotent() -> anyhow::Result<()> {
        let storage = open_in_memory()?;
        storage.migrate()?;
        storage.load_settings()?;
        Ok(())
    }

    #[test]
    fn chapter_records_roundtrip() -> anyhow::Result<()> {
        let storage = open_in_memory()?;
        let mut read = chapter(1);
        read.is_read = true;
        read.last_page_read = 7;
        storage.save_chapter_record("a", &ChapterRecord::from_chapter(&read))?;

        read.is_bookmarked = true;
        storage.save_chapter_record("a", &ChapterRecord::from_chapter(&read))?;
        storage.save_chapter_record("b", &ChapterRecord::from_chapter(&chapter(1)))?;

        let mut chapters = vec![chapter(1), chapter(2)];
        storage.merge_chapter_records("a", &mut chapters)?;
        assert!(chapters[0].is_read);
        assert!(chapters[0].is_bookmarked);
        assert_eq!(chapters[0].last_page_read, 7);
        assert!(!chapters[1].is_read);

        assert_eq!(storage.list_chapter_records("b")?.len(), 1);
        Ok(())
    }
}
