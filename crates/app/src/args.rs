use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::Context as _;
use mangashelf_core::{ReadingDirection, ReadingMode, ResumeMode};

#[derive(Debug, Default, PartialEq)]
pub struct Args {
    pub library_dir: Option<PathBuf>,
    pub chapter: Option<u32>,
    pub mode: Option<ReadingMode>,
    pub direction: Option<ReadingDirection>,
    pub resume: Option<ResumeMode>,
}

impl Args {
    pub fn parse(args: impl IntoIterator<Item = OsString>) -> anyhow::Result<Self> {
        let mut out = Args::default();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let arg_str = arg.to_string_lossy();
            match arg_str.as_ref() {
                "--chapter" => {
                    let value = args.next().context("missing value for --chapter")?;
                    let value_str = value.to_string_lossy();
                    let parsed = value_str
                        .parse::<u32>()
                        .with_context(|| format!("invalid --chapter value: {value_str}"))?;
                    out.chapter = Some(parsed);
                }
                "--mode" => {
                    let value = args.next().context("missing value for --mode")?;
                    let value_str = value.to_string_lossy();
                    let parsed = value_str
                        .parse::<ReadingMode>()
                        .map_err(|err| anyhow::anyhow!("invalid --mode value {value_str}: {err}"))?;
                    out.mode = Some(parsed);
                }
                "--direction" => {
                    let value = args.next().context("missing value for --direction")?;
                    let value_str = value.to_string_lossy();
                    let parsed = value_str.parse::<ReadingDirection>().map_err(|err| {
                        anyhow::anyhow!("invalid --direction value {value_str}: {err}")
                    })?;
                    out.direction = Some(parsed);
                }
                "--resume" => {
                    let value = args.next().context("missing value for --resume")?;
                    let value_str = value.to_string_lossy();
                    let parsed = value_str.parse::<ResumeMode>().map_err(|err| {
                        anyhow::anyhow!("invalid --resume value {value_str}: {err}")
                    })?;
                    out.resume = Some(parsed);
                }
                other if other.starts_with("--") => anyhow::bail!("unknown arg: {other}"),
                _ => {
                    if out.library_dir.is_some() {
                        anyhow::bail!("unexpected extra argument: {arg_str}");
                    }
                    out.library_dir = Some(PathBuf::from(arg.clone()));
                }
            }
        }

        Ok(out)
    }
}
