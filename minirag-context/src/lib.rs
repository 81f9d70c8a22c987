//! minirag-context: turns markdown documents into retrievable chunks.
//!
//! See [`markdown`] for the chunking rules.
pub mod markdown;

pub use markdown::{Chunk, chunk_document, heading_text, is_heading_line};
