//! Built-in extractor plugins for text-bearing formats.

pub mod html;
pub mod json;
pub mod markdown;
pub mod pdf;
pub mod plaintext;
