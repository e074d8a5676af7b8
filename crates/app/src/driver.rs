//! Event loop tying the reader session to the local library, the image
//! decoder and stdin.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use mangashelf_application::{
    ActionOptions, ChapterAction, ChapterService, FetchOutcome, FetchTicket, Notification,
    NotificationKind, Notifier, PageTurn, ReaderSession, perform_action, resume_target,
};
use mangashelf_core::{ChapterId, ResumeMode, Settings};
use mangashelf_storage::Storage;
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tokio::task::JoinSet;

use crate::command::{Command, HELP};
use crate::library::{LOCAL_MANGA_ID, LocalLibrary};
use crate::render::render;

struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success => println!("[ok] {}", notification.message),
            NotificationKind::Error => println!("[error] {}", notification.message),
        }
    }
}

pub struct Reader {
    session: ReaderSession,
    library: Arc<LocalLibrary>,
    settings: Settings,
    storage: Storage,
    start_chapter: Option<u32>,
}

impl Reader {
    pub fn new(
        library: LocalLibrary,
        settings: Settings,
        storage: Storage,
        start_chapter: Option<u32>,
        resume: Option<ResumeMode>,
    ) -> Self {
        Self {
            session: ReaderSession::new(settings.reader.clone(), resume),
            library: Arc::new(library),
            settings,
            storage,
            start_chapter,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        let chapters = self
            .library
            .fetch_chapter_list(LOCAL_MANGA_ID)
            .await
            .context("load chapter list")?;
        if chapters.is_empty() {
            anyhow::bail!("no chapters found in {}", self.library.title());
        }

        let resume = resume_target(&chapters);
        if let Some(target) = &resume {
            println!("{} at chapter {} page {}", target.label, target.source_order, target.page + 1);
        }
        let source_order = self
            .start_chapter
            .or_else(|| resume.map(|target| target.source_order))
            .unwrap_or(1);

        let tickets = self.session.load_chapter_list(&chapters, source_order);
        self.drive(tickets).await?;
        self.print();
        println!("{HELP}");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("read command")? {
            let command = match line.parse::<Command>() {
                Ok(command) => command,
                Err(err) => {
                    println!("{err}: {}", line.trim());
                    continue;
                }
            };
            if command == Command::Quit {
                break;
            }
            self.execute(command).await?;
            self.record_progress().await;
            self.print();
        }

        self.record_progress().await;
        Ok(())
    }

    async fn execute(&mut self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Next => {
                let turn = self.session.next_page();
                self.follow(turn).await?;
            }
            Command::Previous => {
                let turn = self.session.previous_page();
                self.follow(turn).await?;
            }
            Command::Page(page) => self.session.set_current_page_index(page - 1),
            Command::Mode(mode) => {
                match mode {
                    Some(mode) => self.settings.reader.reading_mode = mode,
                    None => self.settings.reader.cycle_reading_mode(),
                }
                self.apply_settings().await?;
            }
            Command::Direction => {
                self.settings.reader.reading_direction =
                    self.settings.reader.reading_direction.toggled();
                self.apply_settings().await?;
            }
            Command::Offset => {
                self.settings.reader.offset_double_spreads =
                    !self.settings.reader.offset_double_spreads;
                self.apply_settings().await?;
            }
            Command::Retry => self.retry().await?,
            Command::Visible(visibility) => {
                let tickets = self.session.observe_boundaries(visibility);
                self.drive(tickets).await?;
            }
            Command::Bookmark => {
                let bookmarked = self
                    .session
                    .chapters()
                    .current_chapter()
                    .is_some_and(|chapter| chapter.is_bookmarked);
                let action = if bookmarked {
                    ChapterAction::Unbookmark
                } else {
                    ChapterAction::Bookmark
                };
                self.chapter_action(action).await?;
            }
            Command::Read => self.chapter_action(ChapterAction::MarkAsRead).await?,
            Command::Help => println!("{HELP}"),
            Command::Quit => {}
        }
        Ok(())
    }

    async fn follow(&mut self, turn: PageTurn) -> anyhow::Result<()> {
        if let PageTurn::Chapter(navigation) = turn {
            let tickets = self.session.navigate(navigation);
            self.drive(tickets).await?;
        }
        Ok(())
    }

    async fn apply_settings(&mut self) -> anyhow::Result<()> {
        self.settings.normalize();
        self.storage.save_settings(&self.settings)?;
        let tickets = self.session.apply_settings(self.settings.reader.clone());
        self.drive(tickets).await
    }

    async fn retry(&mut self) -> anyhow::Result<()> {
        let Some(chapter_id) = self.session.chapters().current_chapter().map(|c| c.id) else {
            return Ok(());
        };
        if let Some(ticket) = self.session.retry_chapter(chapter_id) {
            return self.drive(vec![ticket]).await;
        }

        let failed: Vec<(usize, String)> = match self.session.viewer(chapter_id) {
            Some(viewer) => viewer
                .failed_pages()
                .into_iter()
                .filter_map(|index| {
                    viewer
                        .pages()
                        .iter()
                        .flat_map(|page| std::iter::once(&page.primary).chain(&page.secondary))
                        .find(|page| page.index == index)
                        .map(|page| (index, page.url.clone()))
                })
                .collect(),
            None => Vec::new(),
        };
        let count = self.session.retry_failed_pages(chapter_id);
        tracing::info!(%chapter_id, count, "retrying failed pages");
        self.load_pages(chapter_id, failed).await;
        Ok(())
    }

    async fn chapter_action(&mut self, action: ChapterAction) -> anyhow::Result<()> {
        let Some(chapter) = self.session.chapters().current_chapter().cloned() else {
            return Ok(());
        };
        if let Err(err) = perform_action(
            self.library.as_ref(),
            &TerminalNotifier,
            action,
            &[chapter],
            ActionOptions::default(),
        )
        .await
        {
            tracing::debug!(%action, error = %err, "refreshing chapters after failed action");
        }

        let chapters = self
            .library
            .fetch_chapter_list(LOCAL_MANGA_ID)
            .await
            .context("reload chapter list")?;
        let source_order = self.session.chapters().chapter_source_order();
        let tickets = self.session.load_chapter_list(&chapters, source_order);
        self.drive(tickets).await
    }

    async fn record_progress(&mut self) {
        let Some((chapter_id, patch)) = self.session.progress_patch() else {
            return;
        };
        if let Err(err) = self.library.update_chapters(&[chapter_id], &patch).await {
            tracing::warn!(%chapter_id, error = %err, "failed to record progress");
        }
    }

    /// Runs the page fetches concurrently and applies the results in the
    /// order they complete.
    async fn drive(&mut self, tickets: Vec<FetchTicket>) -> anyhow::Result<()> {
        let mut fetches = JoinSet::new();
        for ticket in tickets {
            let library = Arc::clone(&self.library);
            fetches.spawn(async move {
                let result = library.fetch_chapter_pages(ticket.chapter_id()).await;
                (ticket, result)
            });
        }

        while let Some(joined) = fetches.join_next().await {
            let (ticket, result) = joined.context("chapter fetch task")?;
            let urls = result.as_ref().map(|pages| pages.pages.clone()).ok();
            if self.session.complete_fetch(ticket, result) == FetchOutcome::Applied
                && let Some(urls) = urls
            {
                self.load_pages(ticket.chapter_id(), urls.into_iter().enumerate().collect())
                    .await;
            }
        }
        Ok(())
    }

    /// Decodes image headers off the event loop and reports the outcome of
    /// each page.
    async fn load_pages(&mut self, chapter_id: ChapterId, pages: Vec<(usize, String)>) {
        for (index, url) in pages {
            let path = PathBuf::from(&url);
            let dimensions =
                tokio::task::spawn_blocking(move || image::image_dimensions(&path)).await;
            match dimensions {
                Ok(Ok((width, height))) => {
                    self.session.on_page_load(chapter_id, index, width, height);
                }
                Ok(Err(err)) => {
                    tracing::warn!(%chapter_id, index, %url, error = %err, "page failed to load");
                    self.session.on_page_error(chapter_id, index);
                }
                Err(err) => {
                    tracing::warn!(%chapter_id, index, error = %err, "page decode task failed");
                    self.session.on_page_error(chapter_id, index);
                }
            }
        }
    }

    fn print(&self) {
        for line in render(&self.session) {
            println!("{line}");
        }
    }
}
