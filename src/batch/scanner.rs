use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use serde::Serialize;

use crate::config::BatchSettings;
use crate::models::format::FormatKind;

/// Reason why a file was left out of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Extension is not a known document format.
    UnsupportedExtension,
    /// Larger than `max_file_size`.
    TooLarge,
    /// Matched one of the batch exclude patterns.
    Excluded,
    /// Could not be read.
    IoError,
    /// Parse failed under `on_error = skip`.
    ParseFailed,
}

impl SkipReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::UnsupportedExtension => "unsupported_extension",
            SkipReason::TooLarge => "too_large",
            SkipReason::Excluded => "excluded",
            SkipReason::IoError => "io_error",
            SkipReason::ParseFailed => "parse_failed",
        }
    }
}

/// A file left out of a batch, with why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: SkipReason,
}

/// Document file discovered in a directory walk.
#[derive(Debug, Clone)]
pub struct ScannedDocument {
    pub path: PathBuf,
    /// Path relative to the scan root, forward slashes.
    pub relative_path: String,
    pub size: u64,
    pub kind: FormatKind,
}

/// Result of a directory walk, both lists sorted by relative path.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub documents: Vec<ScannedDocument>,
    pub skipped: Vec<SkippedFile>,
}

/// Directory walker that respects `.gitignore` and skips hidden and build
/// directories.
pub struct Scanner {
    root: PathBuf,
    max_file_size: Option<u64>,
    settings: BatchSettings,
}

impl Scanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_file_size: None,
            settings: BatchSettings::default(),
        }
    }

    /// Limit file size in bytes.
    #[must_use]
    pub fn with_max_file_size(mut self, max_file_size: Option<u64>) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: BatchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Walk the root and sort every file into documents or skipped.
    #[must_use]
    pub fn scan(&self) -> ScanOutcome {
        let entries: Vec<PathBuf> = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .follow_links(false)
            .filter_entry(|e| {
                let name = e.file_name().to_string_lossy();
                !matches!(
                    name.as_ref(),
                    "node_modules" | "target" | ".git" | "__MACOSX" | "__pycache__" | ".venv"
                )
            })
            .build()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
            .map(ignore::DirEntry::into_path)
            .collect();

        let mut outcome = ScanOutcome::default();
        for path in entries {
            let relative_path = relative(&self.root, &path);
            match self.classify_entry(&path, &relative_path) {
                Ok((kind, size)) => outcome.documents.push(ScannedDocument {
                    path,
                    relative_path,
                    size,
                    kind,
                }),
                Err(reason) => {
                    tracing::debug!(path = %relative_path, reason = reason.as_str(), "skipping file");
                    outcome.skipped.push(SkippedFile {
                        path: relative_path,
                        reason,
                    });
                }
            }
        }

        outcome
            .documents
            .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        outcome.skipped.sort_by(|a, b| a.path.cmp(&b.path));
        outcome
    }

    fn classify_entry(
        &self,
        path: &Path,
        relative_path: &str,
    ) -> std::result::Result<(FormatKind, u64), SkipReason> {
        if self.settings.should_exclude(Path::new(relative_path)) {
            return Err(SkipReason::Excluded);
        }
        let kind = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(document_kind)
            .ok_or(SkipReason::UnsupportedExtension)?;
        let size = path.metadata().map_err(|_| SkipReason::IoError)?.len();
        if self.max_file_size.is_some_and(|max| size > max) {
            return Err(SkipReason::TooLarge);
        }
        Ok((kind, size))
    }
}

/// Document kind for a batch member's extension. Archives are not nested.
#[must_use]
pub fn document_kind(ext: &str) -> Option<FormatKind> {
    FormatKind::from_extension(ext).filter(|kind| *kind != FormatKind::Zip)
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
