//! Parse many documents at once: every document file under a directory,
//! or every member of a ZIP archive.
//!
//! Inputs are parsed on a rayon pool capped at `max_workers`. One failing
//! input never affects the others, and results keep input order.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use zip::ZipArchive;

use super::scanner::{document_kind, Scanner, SkipReason, SkippedFile};
use crate::config::{BatchSettings, OnError, ParseConfig};
use crate::error::{DocweaveError, Result};
use crate::models::document::Document;
use crate::pipeline::assembler::{DocumentAssembler, DocumentInput};
use crate::pipeline::cancel::CancellationToken;

/// Outcome of one batch member.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    /// Path relative to the directory, or the archive member name.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of a batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub source: String,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub items: Vec<BatchItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_files: Vec<SkippedFile>,
}

/// One unit of work for the pool.
enum Job {
    /// Read from disk inside the worker.
    File { name: String, path: PathBuf },
    /// Already in memory (archive members).
    Loaded { name: String, input: DocumentInput },
}

impl Job {
    fn name(&self) -> &str {
        match self {
            Job::File { name, .. } | Job::Loaded { name, .. } => name,
        }
    }
}

pub struct BatchRunner {
    assembler: DocumentAssembler,
    config: ParseConfig,
    settings: BatchSettings,
}

impl BatchRunner {
    #[must_use]
    pub fn new(assembler: DocumentAssembler, config: ParseConfig, settings: BatchSettings) -> Self {
        Self {
            assembler,
            config,
            settings,
        }
    }

    /// Run over a directory or a `.zip` archive.
    pub fn run(&self, path: &Path, cancel: &CancellationToken) -> Result<BatchReport> {
        if path.is_dir() {
            self.run_directory(path, cancel)
        } else if is_archive(path) {
            self.run_archive(path, cancel)
        } else {
            Err(DocweaveError::Validation(format!(
                "batch input must be a directory or a .zip archive: {}",
                path.display()
            )))
        }
    }

    pub fn run_directory(&self, dir: &Path, cancel: &CancellationToken) -> Result<BatchReport> {
        let started = Instant::now();
        let outcome = Scanner::new(dir)
            .with_max_file_size(self.config.max_file_size)
            .with_settings(self.settings.clone())
            .scan();
        tracing::info!(
            dir = %dir.display(),
            documents = outcome.documents.len(),
            skipped = outcome.skipped.len(),
            "batch scan complete"
        );

        let jobs = outcome
            .documents
            .into_iter()
            .map(|doc| Job::File {
                name: doc.relative_path,
                path: doc.path,
            })
            .collect();
        self.execute(dir, jobs, outcome.skipped, started, cancel)
    }

    /// Parse every document member of a ZIP archive. Directory entries and
    /// `__MACOSX/` resource forks are ignored.
    pub fn run_archive(&self, archive_path: &Path, cancel: &CancellationToken) -> Result<BatchReport> {
        let started = Instant::now();
        let file = File::open(archive_path).map_err(|source| DocweaveError::FileRead {
            path: archive_path.to_path_buf(),
            source,
        })?;
        let mut archive = ZipArchive::new(file).map_err(|e| {
            DocweaveError::Validation(format!("invalid archive {}: {e}", archive_path.display()))
        })?;

        let mut jobs = Vec::new();
        let mut skipped = Vec::new();
        for i in 0..archive.len() {
            let mut entry = match archive.by_index(i) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(index = i, error = %e, "unreadable archive entry");
                    skipped.push(SkippedFile {
                        path: format!("#{i}"),
                        reason: SkipReason::IoError,
                    });
                    continue;
                }
            };
            let name = entry.name().to_string();
            if entry.is_dir() || name.starts_with("__MACOSX/") || name.contains("/__MACOSX/") {
                continue;
            }

            let reason = if self.settings.should_exclude(Path::new(&name)) {
                Some(SkipReason::Excluded)
            } else if Path::new(&name)
                .extension()
                .and_then(|e| e.to_str())
                .and_then(document_kind)
                .is_none()
            {
                Some(SkipReason::UnsupportedExtension)
            } else if self.config.is_too_large(entry.size()) {
                Some(SkipReason::TooLarge)
            } else {
                None
            };
            if let Some(reason) = reason {
                skipped.push(SkippedFile { path: name, reason });
                continue;
            }

            let mut bytes = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
            if let Err(e) = entry.read_to_end(&mut bytes) {
                tracing::warn!(entry = %name, error = %e, "failed to read archive entry");
                skipped.push(SkippedFile {
                    path: name,
                    reason: SkipReason::IoError,
                });
                continue;
            }
            let filename = Path::new(&name)
                .file_name()
                .map_or_else(|| name.clone(), |f| f.to_string_lossy().into_owned());
            jobs.push(Job::Loaded {
                input: DocumentInput::new(bytes).with_filename(filename),
                name,
            });
        }
        tracing::info!(
            archive = %archive_path.display(),
            documents = jobs.len(),
            skipped = skipped.len(),
            "archive read"
        );

        self.execute(archive_path, jobs, skipped, started, cancel)
    }

    fn execute(
        &self,
        source: &Path,
        jobs: Vec<Job>,
        mut skipped_files: Vec<SkippedFile>,
        started: Instant,
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.max_workers.max(1))
            .build()
            .map_err(|e| DocweaveError::Config(format!("cannot start worker pool: {e}")))?;

        let results: Vec<(String, Result<Document>)> = pool.install(|| {
            jobs.into_par_iter()
                .map(|job| {
                    let name = job.name().to_string();
                    let result = match job {
                        Job::File { path, .. } => self.assembler.parse_file(&path, &self.config, cancel),
                        Job::Loaded { input, .. } => self.assembler.parse(&input, &self.config, cancel),
                    };
                    (name, result)
                })
                .collect()
        });

        let mut report = BatchReport {
            source: source.display().to_string(),
            ..BatchReport::default()
        };
        for (name, result) in results {
            match result {
                Ok(document) => {
                    report.succeeded += 1;
                    report.items.push(BatchItem {
                        name,
                        document: Some(document),
                        error: None,
                    });
                }
                Err(e) if self.config.on_error == OnError::Skip => {
                    tracing::debug!(item = %name, error = %e, "skipping failed document");
                    skipped_files.push(SkippedFile {
                        path: name,
                        reason: SkipReason::ParseFailed,
                    });
                }
                Err(e) => {
                    tracing::warn!(item = %name, error = %e, "document failed");
                    report.failed += 1;
                    report.items.push(BatchItem {
                        name,
                        document: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        report.skipped = skipped_files.len();
        report.skipped_files = skipped_files;
        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            duration_ms = report.duration_ms,
            "batch finished"
        );
        Ok(report)
    }
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
}
