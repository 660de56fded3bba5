use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::panel::SearchMode;

/// Search, filter or replace inside one file the way the Rutar search panel does.
#[derive(Parser, Debug)]
#[command(name = "rutar-find", version, about)]
pub struct Args {
    /// File to open.
    pub path: PathBuf,

    /// Text or pattern to look for.
    pub keyword: String,

    /// How the keyword is interpreted.
    #[arg(short, long, value_enum, default_value_t = ModeArg::Literal)]
    pub mode: ModeArg,

    #[arg(short = 'c', long)]
    pub case_sensitive: bool,

    /// Keep only matches on lines containing this text.
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Replace every match with this value.
    #[arg(short, long)]
    pub replace: Option<String>,

    /// Write the replaced text back to the file.
    #[arg(long, requires = "replace")]
    pub write: bool,

    /// Stop listing after this many matches.
    #[arg(short, long, default_value_t = 100)]
    pub limit: usize,

    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Literal,
    Regex,
    Wildcard,
}

impl From<ModeArg> for SearchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Literal => SearchMode::Literal,
            ModeArg::Regex => SearchMode::Regex,
            ModeArg::Wildcard => SearchMode::Wildcard,
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_should_parse_replace_with_write() {
        let args = Args::try_parse_from([
            "rutar-find",
            "notes.txt",
            "a.c",
            "--mode",
            "wildcard",
            "--replace",
            "x",
            "--write",
        ])
        .expect("valid args");

        assert_eq!(SearchMode::from(args.mode), SearchMode::Wildcard);
        assert_eq!(args.replace.as_deref(), Some("x"));
        assert!(args.write);
        assert_eq!(args.limit, 100);
    }

    #[test]
    fn write_without_replace_should_be_rejected() {
        assert!(Args::try_parse_from(["rutar-find", "notes.txt", "x", "--write"]).is_err());
    }
}
