pub mod cleaner;
pub mod converter;

pub use cleaner::{Normalized, OffsetMap, TextCleaner};
pub use converter::{html_to_text, strip_tags, ConvertedHtml};
