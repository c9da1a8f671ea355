//! Text utilities shared by fixers and the commit step.
//!
//! ## Coordinate Conventions
//!
//! - Rows and columns are **1-indexed** (matching editor conventions)
//! - Columns count UTF-8 bytes
//! - A column is only usable after [`column_index`] has confirmed it lands
//!   inside the row on a character boundary
//!
//! Content is split on `\n` and rebuilt by joining with `\n`, so a trailing
//! newline survives a split/join cycle as a final empty row.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// Content Hashing
// ============================================================================

/// SHA-256 of file contents, stored as a hex string.
///
/// Used to notice that cached content moved on between computing fixes and
/// committing them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Compute the hash of the given text.
    pub fn compute(content: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        ContentHash(hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Row Handling
// ============================================================================

/// Split content into rows.
pub fn split_lines(content: &str) -> Vec<String> {
    content.split('\n').map(str::to_string).collect()
}

/// Rebuild content from rows.
pub fn join_lines(lines: &[String]) -> String {
    lines.join("\n")
}

/// Convert a 1-indexed row into an index into `lines`.
///
/// Returns `None` for row 0 and rows past the end.
pub fn row_index(lines: &[String], row: u32) -> Option<usize> {
    let index = (row as usize).checked_sub(1)?;
    (index < lines.len()).then_some(index)
}

/// Convert a 1-indexed column into a byte index into `line`.
///
/// Returns `None` when the column is 0, lies at or past the end of the line,
/// or splits a multi-byte character.
pub fn column_index(line: &str, col: u32) -> Option<usize> {
    let index = (col as usize).checked_sub(1)?;
    (index < line.len() && line.is_char_boundary(index)).then_some(index)
}

/// Like [`column_index`] but also accepts the position just past the last byte.
///
/// Used for exclusive end columns.
pub fn end_column_index(line: &str, col: u32) -> Option<usize> {
    let index = (col as usize).checked_sub(1)?;
    (index <= line.len() && line.is_char_boundary(index)).then_some(index)
}

/// Count the rows in `content`, ignoring a single trailing newline.
pub fn line_count(content: &str) -> u32 {
    if content.is_empty() {
        return 0;
    }
    let newlines = content.bytes().filter(|&b| b == b'\n').count() as u32;
    if content.ends_with('\n') {
        newlines
    } else {
        newlines + 1
    }
}

// ============================================================================
// Tests
// ============================================================================
