mod args;
mod command;
mod driver;
mod library;
mod render;

use std::fs;
use std::path::PathBuf;

use anyhow::Context as _;
use directories::ProjectDirs;
use mangashelf_storage::Storage;
use tracing_subscriber::EnvFilter;

use crate::args::Args;
use crate::driver::Reader;
use crate::library::LocalLibrary;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse(std::env::args_os().skip(1))?;

    let project_dirs =
        ProjectDirs::from("dev", "mangashelf", "mangashelf").context("resolve project dirs")?;
    let config_dir = project_dirs.config_dir();
    fs::create_dir_all(config_dir)
        .with_context(|| format!("create config dir {}", config_dir.display()))?;

    let db_path = config_dir.join("mangashelf.db");
    let storage = Storage::open(&db_path)?;
    let mut settings = storage.load_settings()?;

    if let Some(mode) = args.mode {
        settings.reader.reading_mode = mode;
    }
    if let Some(direction) = args.direction {
        settings.reader.reading_direction = direction;
    }
    let library_dir = match args.library_dir {
        Some(dir) => dir,
        None => match &settings.library_root {
            Some(root) => PathBuf::from(root),
            None => std::env::current_dir().context("get cwd")?,
        },
    };
    settings.library_root = Some(library_dir.to_string_lossy().to_string());
    settings.normalize();
    storage.save_settings(&settings)?;

    let library = LocalLibrary::open(&library_dir, Storage::open(&db_path)?)?;
    let reader = Reader::new(library, settings, storage, args.chapter, args.resume);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    runtime.block_on(reader.run())
}
