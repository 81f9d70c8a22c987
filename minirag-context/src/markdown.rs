//! Heading-based chunking of markdown documents.
//!
//! The retrieval layer works on sections of a document rather than whole files. This module
//! splits a markdown document on its heading lines so that every section becomes one
//! [`Chunk`] carrying the heading text, the source path and the byte offset at which the
//! section starts in the original document.
//!
//! # Rules
//!
//! - A heading line is any line whose first character is `#`. The heading text is the line
//!   with its leading `#` characters removed and surrounding whitespace trimmed.
//! - Text before the first heading becomes a chunk with an empty heading at offset 0.
//! - Sections whose trimmed content is empty are not emitted.
//! - When no section produced a chunk (no headings at all, or nothing but headings) the whole
//!   trimmed document is returned as a single chunk with an empty heading.
//! - Offsets are byte offsets computed from the real line lengths, terminators included.
//!
//! # Example
//!
//! ```
//! use minirag_context::chunk_document;
//!
//! let chunks = chunk_document("guide.md", "# A\nfoo\n\n# B\nbar\n");
//!
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[0].heading, "A");
//! assert_eq!(chunks[0].content, "foo");
//! assert_eq!(chunks[1].heading, "B");
//! assert_eq!(chunks[1].content, "bar");
//! assert_eq!(chunks[1].offset, 9);
//! ```
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// A contiguous section of a source document.
///
/// Chunks are immutable once produced. Two chunks refer to the same place in the corpus when
/// their [`key`](Chunk::key) (path and offset) is equal; full equality additionally compares
/// content and heading.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub struct Chunk {
    /// Path of the source document, relative to the document root.
    pub path: String,
    /// Trimmed section text, without the heading line.
    pub content: String,
    /// Heading text of the section; empty for text before the first heading.
    pub heading: String,
    /// Byte offset of the section start in the original document.
    pub offset: usize,
}

impl Chunk {
    pub fn new(
        path: impl Into<String>,
        content: impl Into<String>,
        heading: impl Into<String>,
        offset: usize,
    ) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            heading: heading.into(),
            offset,
        }
    }

    /// Identity of the chunk within a corpus: `(path, offset)`.
    pub fn key(&self) -> (&str, usize) {
        (self.path.as_str(), self.offset)
    }

    /// Whether `other` starts at the same position of the same document.
    pub fn same_position(&self, other: &Chunk) -> bool {
        self.key() == other.key()
    }

    pub fn has_heading(&self) -> bool {
        !self.heading.is_empty()
    }
}

/// Returns `true` if the line starts a new section.
pub fn is_heading_line(line: &str) -> bool {
    line.starts_with('#')
}

/// Extracts the heading text from a heading line (`"## Setup "` becomes `"Setup"`).
pub fn heading_text(line: &str) -> &str {
    line.trim_start_matches('#').trim()
}

/// Section being accumulated while scanning a document.
struct Section<'a> {
    heading: &'a str,
    offset: usize,
    lines: Vec<&'a str>,
}

impl<'a> Section<'a> {
    fn new(heading: &'a str, offset: usize) -> Self {
        Self {
            heading,
            offset,
            lines: Vec::new(),
        }
    }

    fn flush_into(self, path: &str, chunks: &mut Vec<Chunk>) {
        let joined = self.lines.join("\n");
        let content = joined.trim();
        if !content.is_empty() {
            chunks.push(Chunk::new(path, content, self.heading, self.offset));
        }
    }
}

/// Splits `content` into heading-delimited chunks attributed to `path`.
///
/// Never returns an empty vector: a document without usable sections yields exactly one
/// chunk spanning the whole trimmed content.
pub fn chunk_document(path: &str, content: &str) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut section = Section::new("", 0);
    let mut line_offset = 0;

    for raw_line in content.split_inclusive('\n') {
        let line = raw_line.strip_suffix('\n').unwrap_or(raw_line);
        let line = line.strip_suffix('\r').unwrap_or(line);

        if is_heading_line(line) {
            let next = Section::new(heading_text(line), line_offset);
            std::mem::replace(&mut section, next).flush_into(path, &mut chunks);
        } else {
            section.lines.push(line);
        }

        line_offset += raw_line.len();
    }
    section.flush_into(path, &mut chunks);

    if chunks.is_empty() {
        chunks.push(Chunk::new(path, content.trim(), "", 0));
    }

    chunks
}
