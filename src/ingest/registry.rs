use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::ingest::plugin::ExtractorPlugin;
use crate::ingest::text::{
    html::HtmlExtractor, json::JsonExtractor, markdown::MarkdownExtractor, pdf::PdfExtractor,
    plaintext::Latin1Extractor, plaintext::PlaintextExtractor,
};
use crate::models::format::FormatKind;

/// Priority used for primary built-in extractors.
pub const PRIMARY_PRIORITY: i32 = 100;
/// Priority used for generic text fallbacks.
pub const FALLBACK_PRIORITY: i32 = 50;
/// Priority used for last-resort decoders.
pub const LAST_RESORT_PRIORITY: i32 = 10;

/// A plugin registered for one kind.
#[derive(Clone)]
pub struct Registration {
    plugin: Arc<dyn ExtractorPlugin>,
    priority: i32,
}

impl Registration {
    #[must_use]
    pub fn plugin(&self) -> &Arc<dyn ExtractorPlugin> {
        &self.plugin
    }

    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.plugin.name()
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("plugin", &self.plugin.name())
            .field("priority", &self.priority)
            .finish()
    }
}

/// Collects registrations; `build()` freezes them into a [`ParserRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    entries: BTreeMap<FormatKind, Vec<Registration>>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `plugin` as a candidate for `kind`. Higher priority runs
    /// first; equal priorities keep registration order.
    #[must_use]
    pub fn register(mut self, kind: FormatKind, plugin: Arc<dyn ExtractorPlugin>, priority: i32) -> Self {
        self.entries
            .entry(kind)
            .or_default()
            .push(Registration { plugin, priority });
        self
    }

    /// Register `plugin` for every kind it reports as supported.
    #[must_use]
    pub fn register_supported(mut self, plugin: Arc<dyn ExtractorPlugin>, priority: i32) -> Self {
        for kind in FormatKind::ALL {
            if plugin.supports(kind) {
                self = self.register(kind, Arc::clone(&plugin), priority);
            }
        }
        self
    }

    /// Install the built-in extractors.
    #[must_use]
    pub fn with_builtins(self) -> Self {
        let plaintext: Arc<dyn ExtractorPlugin> = Arc::new(PlaintextExtractor::new());
        let latin1: Arc<dyn ExtractorPlugin> = Arc::new(Latin1Extractor::new());
        let markdown: Arc<dyn ExtractorPlugin> = Arc::new(MarkdownExtractor::new());
        let html: Arc<dyn ExtractorPlugin> = Arc::new(HtmlExtractor::new());

        self.register(FormatKind::Text, Arc::clone(&plaintext), PRIMARY_PRIORITY)
            .register(FormatKind::Text, Arc::clone(&latin1), LAST_RESORT_PRIORITY)
            .register(FormatKind::Markdown, markdown, PRIMARY_PRIORITY)
            .register(FormatKind::Markdown, Arc::clone(&plaintext), FALLBACK_PRIORITY)
            .register(FormatKind::Markdown, latin1, LAST_RESORT_PRIORITY)
            .register(FormatKind::Html, Arc::clone(&html), PRIMARY_PRIORITY)
            .register(FormatKind::Html, Arc::clone(&plaintext), FALLBACK_PRIORITY)
            .register(FormatKind::Xml, html, PRIMARY_PRIORITY)
            .register(FormatKind::Xml, Arc::clone(&plaintext), FALLBACK_PRIORITY)
            .register(FormatKind::Json, Arc::new(JsonExtractor::new()), PRIMARY_PRIORITY)
            .register(FormatKind::Json, plaintext, FALLBACK_PRIORITY)
            .register(FormatKind::Pdf, Arc::new(PdfExtractor::new()), PRIMARY_PRIORITY)
    }

    #[must_use]
    pub fn build(mut self) -> ParserRegistry {
        for candidates in self.entries.values_mut() {
            // stable: equal priorities keep registration order
            candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
        }
        ParserRegistry {
            entries: self.entries,
        }
    }
}

/// Immutable mapping from format kind to prioritized extractor candidates.
///
/// Built once and shared by reference; it is `Send + Sync`.
pub struct ParserRegistry {
    entries: BTreeMap<FormatKind, Vec<Registration>>,
}

/// Registry listing for display.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryEntry {
    pub kind: FormatKind,
    pub extensions: Vec<String>,
    pub extractors: Vec<String>,
}

impl ParserRegistry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Registry with only the built-in extractors.
    #[must_use]
    pub fn with_defaults() -> Self {
        RegistryBuilder::new().with_builtins().build()
    }

    /// Candidates for `kind`, highest priority first.
    #[must_use]
    pub fn candidates(&self, kind: FormatKind) -> &[Registration] {
        self.entries.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Check if a kind has at least one extractor registered.
    #[must_use]
    pub fn supports(&self, kind: FormatKind) -> bool {
        !self.candidates(kind).is_empty()
    }

    /// Every kind with its extractors, in `FormatKind` order.
    #[must_use]
    pub fn describe(&self) -> Vec<RegistryEntry> {
        FormatKind::ALL
            .iter()
            .map(|kind| RegistryEntry {
                kind: *kind,
                extensions: kind.extensions().iter().map(|e| (*e).to_string()).collect(),
                extractors: self
                    .candidates(*kind)
                    .iter()
                    .map(|r| r.name().to_string())
                    .collect(),
            })
            .collect()
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}
