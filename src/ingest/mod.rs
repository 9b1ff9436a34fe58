pub mod classifier;
pub mod dispatcher;
pub mod plugin;
pub mod registry;
pub mod text;

pub use classifier::FormatClassifier;
pub use dispatcher::{AttemptCause, AttemptFailure, Dispatcher};
pub use plugin::ExtractorPlugin;
pub use registry::{ParserRegistry, RegistryBuilder};
