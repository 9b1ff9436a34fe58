//! The document pipeline: validate, classify, extract, then the
//! post-processing stages that turn a raw extraction into a `Document`.
//!
//! Validating, classifying and extracting are fatal. Every later stage
//! runs isolated from panics; a failure there costs a warning and the
//! stage's fallback value, never the document.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use sha2::{Digest, Sha256};

use super::cancel::CancellationToken;
use super::quality;
use super::stage::PipelineStage;
use crate::config::{OnError, ParseConfig};
use crate::error::{DocweaveError, Result};
use crate::ingest::classifier::FormatClassifier;
use crate::ingest::dispatcher::{panic_message, Dispatched, Dispatcher};
use crate::ingest::registry::ParserRegistry;
use crate::metadata::normalizer::{MergedMetadata, MetadataNormalizer};
use crate::models::document::{Chapter, Document, ImageReference, ProcessingInfo, StructureMethod};
use crate::models::extraction::{ContentForm, RawExtraction, RawImage, StructureHint};
use crate::models::format::DetectionResult;
use crate::models::metadata::{Metadata, MetadataFragment};
use crate::structure::{finalize, DetectedStructure, StructureDetector};
use crate::text::cleaner::TextCleaner;
use crate::text::converter::{html_to_text, strip_tags};

/// One input to the pipeline: the bytes plus optional naming hints.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    bytes: Arc<[u8]>,
    filename: Option<String>,
    content_type: Option<String>,
    name: Option<String>,
}

impl DocumentInput {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: None,
            content_type: None,
            name: None,
        }
    }

    /// Read a file, keeping its file name as the classification hint.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| DocweaveError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let input = Self::new(bytes);
        Ok(match path.file_name() {
            Some(name) => input.with_filename(name.to_string_lossy()),
            None => input,
        })
    }

    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Display name for the document; defaults to the file stem.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn stem(&self) -> Option<String> {
        let filename = self.filename.as_deref()?;
        Path::new(filename)
            .file_stem()
            .map(|s| s.to_string_lossy().trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn doc_name(&self) -> Option<String> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| self.stem())
    }
}

/// Drives one input through every pipeline stage.
///
/// Holds only immutable collaborators, so one assembler can serve any
/// number of concurrent runs.
#[derive(Debug, Clone)]
pub struct DocumentAssembler {
    dispatcher: Dispatcher,
    cleaner: TextCleaner,
    normalizer: MetadataNormalizer,
}

impl Default for DocumentAssembler {
    fn default() -> Self {
        Self::new(Arc::new(ParserRegistry::with_defaults()))
    }
}

impl DocumentAssembler {
    #[must_use]
    pub fn new(registry: Arc<ParserRegistry>) -> Self {
        Self {
            dispatcher: Dispatcher::new(registry),
            cleaner: TextCleaner::new(),
            normalizer: MetadataNormalizer::new(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ParserRegistry {
        self.dispatcher.registry()
    }

    /// Read and parse a file. Unreadable or oversized files fail like any
    /// other validation error (and obey `on_error`).
    pub fn parse_file(
        &self,
        path: &Path,
        config: &ParseConfig,
        cancel: &CancellationToken,
    ) -> Result<Document> {
        let input = check_file_size(path, config).and_then(|()| DocumentInput::from_path(path));
        match input {
            Ok(input) => self.parse(&input, config, cancel),
            Err(e) => recover(e, config, RunTrace::new(Instant::now())),
        }
    }

    /// Parse one input into a document.
    ///
    /// Errors are returned only from the validating, classifying and
    /// extracting stages (downgraded to an empty document when
    /// `on_error = warn`) and on cancellation.
    pub fn parse(
        &self,
        input: &DocumentInput,
        config: &ParseConfig,
        cancel: &CancellationToken,
    ) -> Result<Document> {
        let mut trace = RunTrace::new(Instant::now());
        trace.sha256 = format!("{:x}", Sha256::digest(input.bytes()));
        tracing::info!(
            name = input.doc_name().as_deref().unwrap_or("-"),
            bytes = input.bytes.len(),
            "parse started"
        );

        match self.run(input, config, cancel, &mut trace) {
            Ok(document) => {
                tracing::info!(
                    chapters = document.chapters().len(),
                    words = document.word_count(),
                    warnings = document.warnings().len(),
                    duration_ms = document.processing_info().duration_ms,
                    "parse finished"
                );
                Ok(document)
            }
            Err(e) => recover(e, config, trace),
        }
    }

    fn run(
        &self,
        input: &DocumentInput,
        config: &ParseConfig,
        cancel: &CancellationToken,
        trace: &mut RunTrace,
    ) -> Result<Document> {
        cancel.check(PipelineStage::Validating)?;
        config.validate()?;
        let size = input.bytes.len() as u64;
        if config.is_too_large(size) {
            return Err(oversized(size, config));
        }
        trace.complete(PipelineStage::Validating);

        cancel.check(PipelineStage::Classifying)?;
        let detection = FormatClassifier::new(config.confidence_threshold).classify(
            input.bytes(),
            input.filename(),
            input.content_type(),
        )?;
        let kind = detection.kind();
        trace.detection = Some(detection);
        trace.complete(PipelineStage::Classifying);

        let Dispatched {
            mut extraction,
            parser_name,
            warnings,
            ..
        } = self
            .dispatcher
            .dispatch(kind, Arc::clone(&input.bytes), config, cancel)?;
        trace.complete(PipelineStage::Extracting);
        trace.warnings.extend(warnings);
        trace.warnings.append(&mut extraction.warnings);

        let doc_name = input.doc_name();

        let transformed = trace
            .stage(PipelineStage::Transforming, config, cancel, || {
                Ok(transform(self.cleaner, &extraction))
            })?
            .unwrap_or_else(|| Transformed::passthrough(&extraction));
        trace.warnings.extend(transformed.warnings);
        let content = transformed.content;

        let DetectedStructure {
            chapters,
            method,
            warnings,
        } = trace
            .stage(PipelineStage::StructureDetecting, config, cancel, || {
                Ok(StructureDetector::from_config(config).detect(
                    &content,
                    &transformed.hints,
                    doc_name.as_deref(),
                ))
            })?
            .unwrap_or_else(|| DetectedStructure {
                chapters: finalize(&content, Vec::new(), doc_name.as_deref()),
                method: StructureMethod::SingleChapter,
                warnings: Vec::new(),
            });
        trace.warnings.extend(warnings);

        let MergedMetadata {
            metadata,
            conflicts,
        } = trace
            .stage(PipelineStage::MetadataMerging, config, cancel, || {
                let mut fragments = extraction.metadata.clone();
                if !config.custom_metadata.is_empty() {
                    fragments.push(MetadataFragment::custom(config.custom_metadata.clone()));
                }
                let heuristic = heuristic_metadata(self.cleaner, &chapters, method, input.stem());
                if !heuristic.is_empty() {
                    fragments.push(MetadataFragment::heuristic(heuristic));
                }
                Ok(self.normalizer.merge(&fragments))
            })?
            .unwrap_or_default();
        trace.warnings.extend(conflicts);

        let content_len = content.chars().count();
        let (images, media_warnings) = trace
            .stage(PipelineStage::MediaProcessing, config, cancel, || {
                Ok(process_media(&transformed.images, content_len))
            })?
            .unwrap_or_default();
        trace.warnings.extend(media_warnings);

        let (chapters, metadata) = match trace.stage(PipelineStage::Cleaning, config, cancel, || {
            Ok(self.clean(chapters.clone(), metadata.clone()))
        })? {
            Some(cleaned) => cleaned,
            None => (chapters, metadata),
        };

        if let Some(issues) = trace.stage(PipelineStage::QualityValidating, config, cancel, || {
            Ok(quality::check(&content, &chapters, &metadata))
        })? {
            for issue in &issues {
                tracing::debug!(issue = %issue, "quality check");
            }
            trace.warnings.extend(issues);
        }

        cancel.check(PipelineStage::Assembling)?;
        trace.complete(PipelineStage::Assembling);
        trace.complete(PipelineStage::Done);
        let info = trace.info(config, Some(parser_name), Some(method));
        Ok(Document::new(content, chapters, images, metadata, info))
    }

    fn clean(&self, mut chapters: Vec<Chapter>, metadata: Metadata) -> (Vec<Chapter>, Metadata) {
        for chapter in &mut chapters {
            chapter.title = self.cleaner.tidy_title(&chapter.title);
        }
        (chapters, self.cleaner.sanitize_metadata(metadata))
    }
}

/// Per-run bookkeeping that ends up in `ProcessingInfo`.
struct RunTrace {
    started: Instant,
    sha256: String,
    detection: Option<DetectionResult>,
    warnings: Vec<String>,
    stages: Vec<PipelineStage>,
}

impl RunTrace {
    fn new(started: Instant) -> Self {
        Self {
            started,
            sha256: String::new(),
            detection: None,
            warnings: Vec::new(),
            stages: Vec::new(),
        }
    }

    fn complete(&mut self, stage: PipelineStage) {
        self.stages.push(stage);
    }

    fn warn(&mut self, message: String) {
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    /// Run a post-extraction stage. Failures and panics become warnings and
    /// yield `None`; only cancellation is returned as an error.
    fn stage<T>(
        &mut self,
        stage: PipelineStage,
        config: &ParseConfig,
        cancel: &CancellationToken,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<Option<T>> {
        cancel.check(stage)?;
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(f));
        let elapsed = started.elapsed();

        if let Some(limit) = config.timeout() {
            if elapsed > limit {
                self.warn(format!(
                    "{stage} exceeded its {:.3}s deadline (took {:.3}s)",
                    limit.as_secs_f64(),
                    elapsed.as_secs_f64()
                ));
            }
        }

        match outcome {
            Ok(Ok(value)) => {
                tracing::debug!(%stage, elapsed_us = elapsed.as_micros() as u64, "stage complete");
                self.complete(stage);
                Ok(Some(value))
            }
            Ok(Err(e)) => {
                self.warn(format!("{stage} failed: {e}"));
                Ok(None)
            }
            Err(payload) => {
                self.warn(format!("{stage} panicked: {}", panic_message(payload.as_ref())));
                Ok(None)
            }
        }
    }

    fn info(
        &self,
        config: &ParseConfig,
        parser_used: Option<String>,
        structure_method: Option<StructureMethod>,
    ) -> ProcessingInfo {
        ProcessingInfo {
            parser_used,
            detected_format: self.detection.as_ref().map(DetectionResult::kind),
            detection_confidence: self
                .detection
                .as_ref()
                .map_or(0.0, DetectionResult::confidence),
            duration_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            warnings: self.warnings.clone(),
            config: config.clone(),
            structure_method,
            source_sha256: self.sha256.clone(),
            stages_completed: self.stages.clone(),
        }
    }
}

/// Apply `on_error`: fatal-class errors become an empty document under
/// `warn`; everything else propagates.
fn recover(e: DocweaveError, config: &ParseConfig, mut trace: RunTrace) -> Result<Document> {
    if config.on_error == OnError::Warn && e.is_fatal_class() {
        tracing::warn!(error = %e, "parse failed; returning an empty document");
        trace.warnings.push(e.to_string());
        return Ok(Document::empty(trace.info(config, None, None)));
    }
    tracing::debug!(error = %e, "parse failed");
    Err(e)
}

fn oversized(size: u64, config: &ParseConfig) -> DocweaveError {
    DocweaveError::Validation(format!(
        "input is {size} bytes, larger than max_file_size ({} bytes)",
        config.max_file_size.unwrap_or_default()
    ))
}

fn check_file_size(path: &Path, config: &ParseConfig) -> Result<()> {
    let size = std::fs::metadata(path)
        .map_err(|source| DocweaveError::FileRead {
            path: PathBuf::from(path),
            source,
        })?
        .len();
    if config.is_too_large(size) {
        return Err(oversized(size, config));
    }
    Ok(())
}

/// Canonical text plus hints and images translated into it.
struct Transformed {
    content: String,
    hints: Vec<StructureHint>,
    images: Vec<RawImage>,
    warnings: Vec<String>,
}

impl Transformed {
    /// Fallback when the transforming stage itself failed: the raw text
    /// (tags stripped for markup) with no hints or images.
    fn passthrough(extraction: &RawExtraction) -> Self {
        let content = match extraction.form {
            ContentForm::Text => extraction.content.clone(),
            ContentForm::Html => strip_tags(&extraction.content),
        };
        Self {
            content,
            hints: Vec::new(),
            images: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Convert markup to text, normalise it and move every hint offset and
/// image position into the normalised text.
fn transform(cleaner: TextCleaner, extraction: &RawExtraction) -> Transformed {
    let mut warnings = Vec::new();
    let mut images = extraction.images.clone();
    let text = match extraction.form {
        ContentForm::Text => extraction.content.clone(),
        ContentForm::Html => match html_to_text(&extraction.content) {
            Ok(converted) => {
                images.extend(converted.images);
                converted.text
            }
            Err(e) => {
                warnings.push(format!("html conversion failed ({e}); fell back to tag stripping"));
                strip_tags(&extraction.content)
            }
        },
    };

    let normalized = cleaner.normalize(&text);
    let hints = extraction
        .hints
        .iter()
        .map(|hint| StructureHint {
            offset: normalized.offsets.translate(hint.offset),
            ..hint.clone()
        })
        .collect();
    // Positions past the raw end are left for media processing to clamp.
    for image in &mut images {
        if image.position <= normalized.offsets.raw_len() {
            image.position = normalized.offsets.translate(image.position);
        }
    }

    Transformed {
        content: normalized.text,
        hints,
        images,
        warnings,
    }
}

/// Heuristic metadata: a title from the first top-level chapter, or from
/// the file stem when no structure was found.
fn heuristic_metadata(
    cleaner: TextCleaner,
    chapters: &[Chapter],
    method: StructureMethod,
    stem: Option<String>,
) -> Metadata {
    let from_chapters = (method != StructureMethod::SingleChapter)
        .then(|| chapters.iter().find(|c| c.level == 1))
        .flatten()
        .map(|c| cleaner.tidy_title(&c.title))
        .filter(|t| !t.is_empty());
    match from_chapters.or(stem) {
        Some(title) => Metadata::default().with_title(title),
        None => Metadata::default(),
    }
}

/// Number images in position order, clamp out-of-range positions and fill
/// in missing formats from the path.
fn process_media(raw: &[RawImage], content_len: usize) -> (Vec<ImageReference>, Vec<String>) {
    let mut ordered: Vec<&RawImage> = raw.iter().collect();
    ordered.sort_by_key(|image| image.position);

    let mut warnings = Vec::new();
    let images = ordered
        .into_iter()
        .enumerate()
        .map(|(n, image)| {
            let id = format!("img-{:03}", n + 1);
            let position = if image.position > content_len {
                warnings.push(format!(
                    "image {id} position {} is past the end of the content; clamped to {content_len}",
                    image.position
                ));
                content_len
            } else {
                image.position
            };
            ImageReference {
                format: image
                    .format
                    .clone()
                    .or_else(|| image.path.as_deref().and_then(image_format)),
                id,
                position,
                path: image.path.clone(),
                alt_text: image.alt_text.clone(),
                width: image.width,
                height: image.height,
            }
        })
        .collect();
    (images, warnings)
}

/// Image format from a file extension or a `data:` URI.
fn image_format(path: &str) -> Option<String> {
    if let Some(rest) = path.strip_prefix("data:image/") {
        let subtype = rest.split([';', ',', '+']).next()?.to_ascii_lowercase();
        return (!subtype.is_empty()).then_some(subtype);
    }
    let clean = path.split(['?', '#']).next()?;
    let ext = Path::new(clean).extension()?.to_str()?.to_ascii_lowercase();
    let format = match ext.as_str() {
        "jpg" | "jpeg" => "jpeg",
        "png" => "png",
        "gif" => "gif",
        "svg" => "svg",
        "webp" => "webp",
        "bmp" => "bmp",
        "tif" | "tiff" => "tiff",
        "avif" => "avif",
        _ => return None,
    };
    Some(format.to_string())
}
