use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{ChapterDetectionMethod, OnError};

#[derive(Parser)]
#[command(
    name = "docweave",
    version,
    about = "Document ingestion - text, chapters, metadata and media from any supported format",
    after_help = "Output is JSON on stdout. Errors are JSON objects on stderr (exit code 1). \
                  Defaults come from docweave.toml in the working directory; command-line \
                  flags override them. Set RUST_LOG=debug to trace pipeline stages."
)]
pub struct Cli {
    /// Settings file (default: ./docweave.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Classify a file's format and show the evidence behind the decision
    Detect {
        /// File to classify
        path: PathBuf,
        /// Declared content type (e.g. "text/html")
        #[arg(long)]
        content_type: Option<String>,
        /// Minimum confidence to accept the evidence without fallback
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Parse a document into text, chapters, metadata and media
    Parse {
        /// File to parse
        path: PathBuf,
        #[command(flatten)]
        options: ParseOptions,
        /// Declared content type (e.g. "text/markdown")
        #[arg(long)]
        content_type: Option<String>,
        /// Title supplied by the caller (outranks inferred titles)
        #[arg(long)]
        title: Option<String>,
        /// Author supplied by the caller
        #[arg(long)]
        author: Option<String>,
        /// Pretty-print the JSON document
        #[arg(long)]
        pretty: bool,
    },

    /// Parse every document in a directory or ZIP archive
    ///
    /// Directories are walked respecting .gitignore; hidden and build
    /// directories are skipped. Archive directory entries and __MACOSX/
    /// members are ignored.
    Batch {
        /// Directory or .zip archive
        path: PathBuf,
        #[command(flatten)]
        options: ParseOptions,
        /// Maximum documents parsed concurrently
        #[arg(short, long)]
        workers: Option<usize>,
        /// Pretty-print the JSON report
        #[arg(long)]
        pretty: bool,
    },

    /// List supported formats and the extractors registered for each
    Formats,
}

/// Parse options shared by `parse` and `batch`. Unset flags keep the
/// settings file values.
#[derive(clap::Args, Debug, Default)]
pub struct ParseOptions {
    /// Chapter detection: auto, toc, heading, pattern, heuristic
    #[arg(short, long)]
    pub method: Option<ChapterDetectionMethod>,
    /// Minimum classifier confidence in [0, 1]
    #[arg(long)]
    pub threshold: Option<f64>,
    /// Chapters with fewer words are reported as warnings
    #[arg(long)]
    pub min_chapter_length: Option<usize>,
    /// Failure handling: raise, warn, skip
    #[arg(long)]
    pub on_error: Option<OnError>,
    /// Per-stage deadline in seconds
    #[arg(long)]
    pub timeout: Option<f64>,
    /// Maximum input size in bytes
    #[arg(long)]
    pub max_file_size: Option<u64>,
}
