use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DocweaveError, Result};
use crate::models::metadata::Metadata;

/// Default settings filename, looked up in the working directory.
pub const CONFIG_FILE: &str = "docweave.toml";
/// Default minimum classifier confidence.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.8;
/// Default minimum chapter length in words.
pub const DEFAULT_MIN_CHAPTER_LENGTH: usize = 100;
/// Default input size ceiling (100 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Which structure detection strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChapterDetectionMethod {
    /// Try hints, headings, patterns, heuristics in that order.
    #[default]
    Auto,
    /// Only explicit table-of-contents hints.
    Toc,
    /// Only heading markers.
    Heading,
    /// Only "Chapter N" style lines.
    Pattern,
    /// Only paragraph-gap heuristics.
    Heuristic,
}

impl std::str::FromStr for ChapterDetectionMethod {
    type Err = DocweaveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "toc" => Ok(Self::Toc),
            "heading" => Ok(Self::Heading),
            "pattern" => Ok(Self::Pattern),
            "heuristic" => Ok(Self::Heuristic),
            other => Err(DocweaveError::Config(format!(
                "unknown chapter detection method: {other}"
            ))),
        }
    }
}

/// What happens to would-be-fatal errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// Propagate as a typed error.
    #[default]
    Raise,
    /// Return an empty document carrying the error as a warning.
    Warn,
    /// Drop the input (honoured by the batch runner).
    Skip,
}

impl std::str::FromStr for OnError {
    type Err = DocweaveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "raise" => Ok(Self::Raise),
            "warn" => Ok(Self::Warn),
            "skip" => Ok(Self::Skip),
            other => Err(DocweaveError::Config(format!("unknown on_error mode: {other}"))),
        }
    }
}

/// Options recognised by a single parse run. A snapshot is stored in
/// every document's processing info.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    /// Minimum classifier confidence to accept a format without fallback.
    pub confidence_threshold: f64,
    pub chapter_detection_method: ChapterDetectionMethod,
    /// Chapters with fewer words trigger a quality warning.
    pub min_chapter_length: usize,
    pub on_error: OnError,
    /// Hard input size ceiling in bytes.
    pub max_file_size: Option<u64>,
    /// Per-stage deadline in seconds.
    pub timeout: Option<f64>,
    /// Caller-supplied metadata, merged with `custom` priority.
    pub custom_metadata: Metadata,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            chapter_detection_method: ChapterDetectionMethod::Auto,
            min_chapter_length: DEFAULT_MIN_CHAPTER_LENGTH,
            on_error: OnError::Raise,
            max_file_size: Some(DEFAULT_MAX_FILE_SIZE),
            timeout: None,
            custom_metadata: Metadata::default(),
        }
    }
}

impl ParseConfig {
    /// Check option ranges.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(DocweaveError::Validation(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if let Some(t) = self.timeout {
            if !t.is_finite() || t <= 0.0 {
                return Err(DocweaveError::Validation(format!(
                    "timeout must be a positive number of seconds, got {t}"
                )));
            }
        }
        Ok(())
    }

    /// Per-stage deadline, if configured.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
            .filter(|t| t.is_finite() && *t > 0.0)
            .map(Duration::from_secs_f64)
    }

    /// Check if an input is too large based on settings.
    #[must_use]
    pub fn is_too_large(&self, size_bytes: u64) -> bool {
        self.max_file_size.is_some_and(|max| size_bytes > max)
    }
}

/// Batch runner settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Upper bound on concurrently parsed inner documents.
    pub max_workers: usize,
    /// Path fragments to exclude when walking a directory.
    pub exclude_patterns: Vec<String>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_workers: std::thread::available_parallelism().map_or(4, |n| n.get()),
            exclude_patterns: vec![
                "node_modules/".into(),
                ".git/".into(),
                "target/".into(),
                "__MACOSX/".into(),
            ],
        }
    }
}

impl BatchSettings {
    /// Check if a path should be excluded based on settings.
    #[must_use]
    pub fn should_exclude(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy().replace('\\', "/");
        self.exclude_patterns.iter().any(|pattern| {
            let pattern = pattern.trim_end_matches('/');
            !pattern.is_empty() && path_str.contains(pattern)
        })
    }
}

/// Settings file contents (`docweave.toml`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub parse: ParseConfig,
    pub batch: BatchSettings,
}

impl Settings {
    /// Load settings from a TOML file. Missing or invalid files yield defaults.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|content| toml::from_str::<Settings>(&content).map_err(|e| e.to_string()));
        match parsed {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings file");
                Self::default()
            }
        }
    }

    /// Load `docweave.toml` from a directory.
    #[must_use]
    pub fn discover(dir: &Path) -> Self {
        Self::load(&Self::default_path(dir))
    }

    #[must_use]
    pub fn default_path(dir: &Path) -> PathBuf {
        dir.join(CONFIG_FILE)
    }

    /// Save current settings as TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| DocweaveError::Config(format!("failed to serialize settings: {e}")))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}
