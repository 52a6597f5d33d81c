pub mod output;

use clap::{Parser, ValueEnum};
use epubmark::convert::OutputMode;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "epubmark",
    version,
    about = "Convert an EPUB into Markdown-ish text, as one file or one file per chapter"
)]
pub struct Cli {
    /// EPUB file or unpacked EPUB directory
    pub input: PathBuf,

    /// Output file (single mode) or folder (split mode); stdout when omitted in single mode
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Output layout; asked interactively when omitted
    #[arg(long, value_enum, env = "EPUBMARK_MODE")]
    pub mode: Option<ModeArg>,

    /// Copy images next to split chapters and rewrite their references
    #[arg(long, env = "EPUBMARK_IMAGES")]
    pub images: bool,

    /// Name of the split-mode folder, created next to the input
    #[arg(long, conflicts_with = "output")]
    pub folder: Option<String>,

    /// Start each chapter with a heading made from its TOC label (single mode)
    #[arg(long)]
    pub headings: bool,

    /// Print the chapter plan without converting
    #[arg(long)]
    pub list: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Verbose output
    #[arg(long, short)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// One document with every chapter
    Single,
    /// One file per top-level TOC entry
    Split,
}

impl From<ModeArg> for OutputMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Single => OutputMode::Single,
            ModeArg::Split => OutputMode::Split,
        }
    }
}
