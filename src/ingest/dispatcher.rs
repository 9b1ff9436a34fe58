use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use serde::Serialize;

use crate::config::ParseConfig;
use crate::error::{DocweaveError, Result};
use crate::ingest::plugin::ExtractorPlugin;
use crate::ingest::registry::ParserRegistry;
use crate::models::extraction::RawExtraction;
use crate::models::format::FormatKind;
use crate::pipeline::cancel::CancellationToken;
use crate::pipeline::stage::PipelineStage;

/// Why a single extractor attempt did not produce content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cause", content = "detail", rename_all = "snake_case")]
pub enum AttemptCause {
    Failed(String),
    TimedOut(Duration),
    Panicked(String),
}

impl fmt::Display for AttemptCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(msg) => f.write_str(msg),
            Self::TimedOut(after) => write!(f, "timed out after {:.3}s", after.as_secs_f64()),
            Self::Panicked(msg) => write!(f, "panicked: {msg}"),
        }
    }
}

/// One failed attempt, kept for the aggregated parsing error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptFailure {
    pub plugin: String,
    pub cause: AttemptCause,
}

impl AttemptFailure {
    pub fn new(plugin: impl Into<String>, cause: AttemptCause) -> Self {
        Self {
            plugin: plugin.into(),
            cause,
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.plugin, self.cause)
    }
}

/// Successful dispatch: the extraction plus how it was obtained.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub extraction: RawExtraction,
    pub parser_name: String,
    /// Fallback notices; extractor warnings stay on `extraction`.
    pub warnings: Vec<String>,
    /// Attempts that failed before the winning one.
    pub attempts: Vec<AttemptFailure>,
}

/// Routes an input to the registered extractors for its kind, trying
/// candidates in priority order until one succeeds.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ParserRegistry>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(registry: Arc<ParserRegistry>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    /// Check if a kind has an extractor available.
    #[must_use]
    pub fn supports(&self, kind: FormatKind) -> bool {
        self.registry.supports(kind)
    }

    /// Run candidates for `kind` until one returns content.
    ///
    /// Each attempt is bounded by `config.timeout()` and isolated from
    /// panics. Cancellation is checked before every attempt. When all
    /// attempts fail the error lists each one; if every attempt timed out
    /// a `Timeout` error is returned instead.
    pub fn dispatch(
        &self,
        kind: FormatKind,
        bytes: Arc<[u8]>,
        config: &ParseConfig,
        cancel: &CancellationToken,
    ) -> Result<Dispatched> {
        let timeout = config.timeout();
        let mut attempts: Vec<AttemptFailure> = Vec::new();
        let mut primary: Option<String> = None;

        for registration in self.registry.candidates(kind) {
            let plugin = registration.plugin();
            if !plugin.supports(kind) {
                tracing::debug!(%kind, plugin = plugin.name(), "extractor declines kind, skipping");
                continue;
            }
            cancel.check(PipelineStage::Extracting)?;

            let name = plugin.name().to_string();
            primary.get_or_insert_with(|| name.clone());
            tracing::debug!(%kind, plugin = %name, priority = registration.priority(), "extraction attempt");

            match run_attempt(plugin, &bytes, config, timeout) {
                Ok(extraction) => {
                    let mut warnings = Vec::new();
                    if primary.as_deref() != Some(name.as_str()) {
                        warnings.push(format!(
                            "used fallback extractor '{name}' after {} failed attempt(s): {}",
                            attempts.len(),
                            attempts
                                .iter()
                                .map(ToString::to_string)
                                .collect::<Vec<_>>()
                                .join("; ")
                        ));
                    }
                    return Ok(Dispatched {
                        extraction,
                        parser_name: name,
                        warnings,
                        attempts,
                    });
                }
                Err(cause) => {
                    tracing::warn!(%kind, plugin = %name, %cause, "extraction attempt failed");
                    attempts.push(AttemptFailure::new(name, cause));
                }
            }
        }

        if let Some(after) = timeout {
            let all_timed_out = !attempts.is_empty()
                && attempts
                    .iter()
                    .all(|a| matches!(a.cause, AttemptCause::TimedOut(_)));
            if all_timed_out {
                return Err(DocweaveError::Timeout {
                    stage: PipelineStage::Extracting.to_string(),
                    after,
                });
            }
        }
        Err(DocweaveError::Parsing { kind, attempts })
    }
}

/// Run one extractor, optionally on a worker thread bounded by `timeout`.
/// A timed-out worker is detached and its eventual result discarded.
fn run_attempt(
    plugin: &Arc<dyn ExtractorPlugin>,
    bytes: &Arc<[u8]>,
    config: &ParseConfig,
    timeout: Option<Duration>,
) -> std::result::Result<RawExtraction, AttemptCause> {
    let Some(limit) = timeout else {
        return guarded_extract(plugin.as_ref(), bytes, config);
    };

    let (tx, rx) = mpsc::channel();
    let worker_plugin = Arc::clone(plugin);
    let worker_bytes = Arc::clone(bytes);
    let worker_config = config.clone();
    std::thread::Builder::new()
        .name(format!("extract-{}", plugin.name()))
        .spawn(move || {
            let outcome = guarded_extract(worker_plugin.as_ref(), &worker_bytes, &worker_config);
            // receiver may have given up already
            let _ = tx.send(outcome);
        })
        .map_err(|e| AttemptCause::Failed(format!("cannot spawn extraction worker: {e}")))?;

    match rx.recv_timeout(limit) {
        Ok(outcome) => outcome,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(AttemptCause::TimedOut(limit)),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(AttemptCause::Panicked(
            "extraction worker exited without a result".into(),
        )),
    }
}

fn guarded_extract(
    plugin: &dyn ExtractorPlugin,
    bytes: &[u8],
    config: &ParseConfig,
) -> std::result::Result<RawExtraction, AttemptCause> {
    match catch_unwind(AssertUnwindSafe(|| plugin.extract(bytes, config))) {
        Ok(Ok(extraction)) => Ok(extraction),
        Ok(Err(e)) => Err(AttemptCause::Failed(e.to_string())),
        Err(payload) => Err(AttemptCause::Panicked(panic_message(payload.as_ref()))),
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::registry::RegistryBuilder;

    enum Behaviour {
        Succeed,
        Fail,
        Panic,
        Sleep(Duration),
    }

    struct Stub {
        name: &'static str,
        behaviour: Behaviour,
        kinds: &'static [FormatKind],
    }

    impl Stub {
        fn arc(name: &'static str, behaviour: Behaviour) -> Arc<dyn ExtractorPlugin> {
            Arc::new(Self {
                name,
                behaviour,
                kinds: &[FormatKind::Text],
            })
        }
    }

    impl ExtractorPlugin for Stub {
        fn name(&self) -> &str {
            self.name
        }
        fn supports(&self, kind: FormatKind) -> bool {
            self.kinds.contains(&kind)
        }
        fn extract(&self, _bytes: &[u8], _config: &ParseConfig) -> Result<RawExtraction> {
            match self.behaviour {
                Behaviour::Succeed => Ok(RawExtraction::text(format!("from {}", self.name))),
                Behaviour::Fail => Err(DocweaveError::Validation(format!("{} refused", self.name))),
                Behaviour::Panic => panic!("{} exploded", self.name),
                Behaviour::Sleep(d) => {
                    std::thread::sleep(d);
                    Ok(RawExtraction::text("late"))
                }
            }
        }
    }

    fn dispatcher(builder: RegistryBuilder) -> Dispatcher {
        Dispatcher::new(Arc::new(builder.build()))
    }

    fn bytes() -> Arc<[u8]> {
        Arc::from(&b"hello"[..])
    }

    #[test]
    fn primary_success_has_no_warnings() {
        let d = dispatcher(
            RegistryBuilder::new()
                .register(FormatKind::Text, Stub::arc("a", Behaviour::Succeed), 10)
                .register(FormatKind::Text, Stub::arc("b", Behaviour::Succeed), 5),
        );
        let out = d
            .dispatch(FormatKind::Text, bytes(), &ParseConfig::default(), &CancellationToken::new())
            .unwrap();
        assert_eq!(out.parser_name, "a");
        assert_eq!(out.extraction.content, "from a");
        assert!(out.warnings.is_empty());
        assert!(out.attempts.is_empty());
    }

    #[test]
    fn falls_back_in_priority_order_and_warns() {
        let d = dispatcher(
            RegistryBuilder::new()
                .register(FormatKind::Text, Stub::arc("last", Behaviour::Succeed), 1)
                .register(FormatKind::Text, Stub::arc("broken", Behaviour::Fail), 10)
                .register(FormatKind::Text, Stub::arc("panicky", Behaviour::Panic), 5),
        );
        let out = d
            .dispatch(FormatKind::Text, bytes(), &ParseConfig::default(), &CancellationToken::new())
            .unwrap();
        assert_eq!(out.parser_name, "last");
        assert_eq!(out.attempts.len(), 2);
        assert_eq!(out.attempts[0].plugin, "broken");
        assert!(matches!(out.attempts[1].cause, AttemptCause::Panicked(_)));
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].contains("fallback extractor 'last'"));
    }

    #[test]
    fn all_failures_aggregate_into_parsing_error() {
        let d = dispatcher(
            RegistryBuilder::new()
                .register(FormatKind::Text, Stub::arc("one", Behaviour::Fail), 2)
                .register(FormatKind::Text, Stub::arc("two", Behaviour::Panic), 1),
        );
        let err = d
            .dispatch(FormatKind::Text, bytes(), &ParseConfig::default(), &CancellationToken::new())
            .unwrap_err();
        assert_eq!(err.attempt_count(), 2);
        let msg = err.to_string();
        assert!(msg.contains("one: validation error: one refused"));
        assert!(msg.contains("two: panicked: two exploded"));
    }

    #[test]
    fn no_candidates_is_parsing_error() {
        let d = dispatcher(RegistryBuilder::new());
        let err = d
            .dispatch(FormatKind::Epub, bytes(), &ParseConfig::default(), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, DocweaveError::Parsing { .. }));
        assert_eq!(err.attempt_count(), 0);
    }

    #[test]
    fn unsupported_candidates_are_skipped() {
        let d = dispatcher(
            RegistryBuilder::new()
                .register(
                    FormatKind::Markdown,
                    Stub::arc("text-only", Behaviour::Succeed),
                    10,
                ),
        );
        let err = d
            .dispatch(
                FormatKind::Markdown,
                bytes(),
                &ParseConfig::default(),
                &CancellationToken::new(),
            )
            .unwrap_err();
        assert_eq!(err.attempt_count(), 0);
    }

    #[test]
    fn slow_extractor_times_out_and_next_runs() {
        let d = dispatcher(
            RegistryBuilder::new()
                .register(
                    FormatKind::Text,
                    Stub::arc("slow", Behaviour::Sleep(Duration::from_secs(2))),
                    10,
                )
                .register(FormatKind::Text, Stub::arc("quick", Behaviour::Succeed), 1),
        );
        let config = ParseConfig {
            timeout: Some(0.05),
            ..ParseConfig::default()
        };
        let out = d
            .dispatch(FormatKind::Text, bytes(), &config, &CancellationToken::new())
            .unwrap();
        assert_eq!(out.parser_name, "quick");
        assert!(matches!(out.attempts[0].cause, AttemptCause::TimedOut(_)));
    }

    #[test]
    fn only_timeouts_become_timeout_error() {
        let d = dispatcher(RegistryBuilder::new().register(
            FormatKind::Text,
            Stub::arc("slow", Behaviour::Sleep(Duration::from_secs(2))),
            10,
        ));
        let config = ParseConfig {
            timeout: Some(0.05),
            ..ParseConfig::default()
        };
        let err = d
            .dispatch(FormatKind::Text, bytes(), &config, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, DocweaveError::Timeout { .. }));
    }

    #[test]
    fn cancelled_before_first_attempt() {
        let d = dispatcher(
            RegistryBuilder::new().register(FormatKind::Text, Stub::arc("a", Behaviour::Succeed), 1),
        );
        let token = CancellationToken::new();
        token.cancel();
        let err = d
            .dispatch(FormatKind::Text, bytes(), &ParseConfig::default(), &token)
            .unwrap_err();
        assert!(matches!(err, DocweaveError::Cancelled { .. }));
    }

    #[test]
    fn panic_payloads_are_readable() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
