use mangashelf_application::BoundaryVisibility;
use mangashelf_core::ReadingMode;

/// One line typed on stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Next,
    Previous,
    /// 1-based page number.
    Page(usize),
    /// Sets the reading mode, or cycles it without an argument.
    Mode(Option<ReadingMode>),
    Direction,
    Offset,
    Retry,
    Visible(BoundaryVisibility),
    Bookmark,
    Read,
    Help,
    Quit,
}

pub const HELP: &str = "commands: n | p | page N | mode [single|double|vertical|horizontal] | dir | offset | retry | visible prev|next|both|none | bookmark | read | help | q";

impl std::str::FromStr for Command {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.split_whitespace();
        let head = parts.next().unwrap_or("n").to_ascii_lowercase();
        let arg = parts.next();
        if parts.next().is_some() {
            return Err("too many arguments");
        }

        let command = match (head.as_str(), arg) {
            ("n" | "next", None) => Command::Next,
            ("p" | "prev", None) => Command::Previous,
            ("page", Some(page)) => {
                let page = page.parse::<usize>().map_err(|_| "invalid page number")?;
                if page == 0 {
                    return Err("pages start at 1");
                }
                Command::Page(page)
            }
            ("mode", None) => Command::Mode(None),
            ("mode", Some(mode)) => Command::Mode(Some(mode.parse()?)),
            ("dir", None) => Command::Direction,
            ("offset", None) => Command::Offset,
            ("retry", None) => Command::Retry,
            ("visible", Some(which)) => {
                let (previous, next) = match which {
                    "prev" => (true, false),
                    "next" => (false, true),
                    "both" => (true, true),
                    "none" => (false, false),
                    _ => return Err("expected prev, next, both or none"),
                };
                Command::Visible(BoundaryVisibility { previous, next })
            }
            ("bookmark", None) => Command::Bookmark,
            ("read", None) => Command::Read,
            ("help" | "?", None) => Command::Help,
            ("q" | "quit", None) => Command::Quit,
            _ => return Err("unknown command"),
        };
        Ok(command)
    }
}
