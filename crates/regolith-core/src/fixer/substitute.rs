//! Operator substitution at a located column.
//!
//! Each location names a row and a column at or before the character to
//! change. The fixer searches forward from that column for its target
//! character and rewrites only that character; if it is not there the
//! location is skipped.

use tracing::trace;

use super::{require_options, FixCandidate, FixError, FixResult, Fixer, RuntimeOptions};
use crate::text::{column_index, join_lines, row_index, split_lines};
use crate::types::Location;

/// Decide how to rewrite `line` given the byte index of the target character.
///
/// Returns `None` to leave the line alone.
type Rewrite = fn(line: &str, at: usize) -> Option<String>;

/// Apply `rewrite` at every location, returning the new contents if anything
/// changed.
///
/// All locations are validated against the original rows first. Rewrites on
/// the same row run right to left so earlier columns stay valid.
fn substitute(
    contents: &str,
    locations: &[Location],
    target: char,
    rewrite: Rewrite,
) -> Option<String> {
    let mut lines = split_lines(contents);

    let mut targets: Vec<(usize, usize)> = Vec::with_capacity(locations.len());
    for location in locations {
        let Some(row) = row_index(&lines, location.row) else {
            trace!(row = location.row, "row out of range");
            continue;
        };
        let Some(start) = column_index(&lines[row], location.col) else {
            trace!(row = location.row, col = location.col, "column out of range");
            continue;
        };
        let Some(offset) = lines[row][start..].find(target) else {
            trace!(row = location.row, col = location.col, %target, "target not found");
            continue;
        };
        targets.push((row, start + offset));
    }

    targets.sort_unstable();
    targets.dedup();

    let mut changed = false;
    for &(row, at) in targets.iter().rev() {
        if let Some(rewritten) = rewrite(&lines[row], at) {
            lines[row] = rewritten;
            changed = true;
        }
    }

    changed.then(|| join_lines(&lines))
}

fn run(
    fixer: &dyn Fixer,
    candidate: &FixCandidate,
    options: Option<&RuntimeOptions>,
    target: char,
    rewrite: Rewrite,
) -> Result<Vec<FixResult>, FixError> {
    let options = require_options(fixer, options)?;
    Ok(
        substitute(&candidate.contents, &options.locations, target, rewrite)
            .map(|contents| FixResult::edited(fixer, candidate, options, contents))
            .into_iter()
            .collect(),
    )
}

fn byte_before(line: &str, at: usize) -> Option<u8> {
    at.checked_sub(1).map(|i| line.as_bytes()[i])
}

fn byte_after(line: &str, at: usize) -> Option<u8> {
    line.as_bytes().get(at + 1).copied()
}

/// Whether the `=` at `at` stands alone rather than being part of `:=`,
/// `==`, `!=`, `<=` or `>=`.
fn is_lone_equals(line: &str, at: usize) -> bool {
    !matches!(byte_before(line, at), Some(b':' | b'=' | b'!' | b'<' | b'>'))
        && byte_after(line, at) != Some(b'=')
}

// ============================================================================
// use-assignment-operator
// ============================================================================

/// Turns unification `=` into assignment `:=`.
///
/// An `=` that belongs to a two-character operator is left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct UseAssignmentOperator;

impl UseAssignmentOperator {
    fn rewrite(line: &str, at: usize) -> Option<String> {
        if !is_lone_equals(line, at) {
            return None;
        }
        Some(format!("{}:{}", &line[..at], &line[at..]))
    }
}

impl Fixer for UseAssignmentOperator {
    fn name(&self) -> &'static str {
        "use-assignment-operator"
    }

    fn fix(
        &self,
        candidate: &FixCandidate,
        options: Option<&RuntimeOptions>,
    ) -> Result<Vec<FixResult>, FixError> {
        run(self, candidate, options, '=', Self::rewrite)
    }
}

// ============================================================================
// prefer-equals-comparison
// ============================================================================

/// Turns a unification `=` used as a comparison into `==`.
///
/// An `=` that is already part of `:=`, `==`, `!=`, `<=` or `>=` is left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferEqualsComparison;

impl PreferEqualsComparison {
    fn rewrite(line: &str, at: usize) -> Option<String> {
        if !is_lone_equals(line, at) {
            return None;
        }
        Some(format!("{}=={}", &line[..at], &line[at + 1..]))
    }
}

impl Fixer for PreferEqualsComparison {
    fn name(&self) -> &'static str {
        "prefer-equals-comparison"
    }

    fn fix(
        &self,
        candidate: &FixCandidate,
        options: Option<&RuntimeOptions>,
    ) -> Result<Vec<FixResult>, FixError> {
        run(self, candidate, options, '=', Self::rewrite)
    }
}

// ============================================================================
// no-whitespace-comment
// ============================================================================

/// Inserts a space after a comment's `#`.
///
/// Comments already followed by whitespace, empty comments and `#!` lines
/// are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWhitespaceComment;

impl NoWhitespaceComment {
    fn rewrite(line: &str, at: usize) -> Option<String> {
        match byte_after(line, at) {
            None | Some(b' ' | b'\t' | b'#' | b'!') => None,
            Some(_) => Some(format!("{} {}", &line[..=at], &line[at + 1..])),
        }
    }
}

impl Fixer for NoWhitespaceComment {
    fn name(&self) -> &'static str {
        "no-whitespace-comment"
    }

    fn fix(
        &self,
        candidate: &FixCandidate,
        options: Option<&RuntimeOptions>,
    ) -> Result<Vec<FixResult>, FixError> {
        run(self, candidate, options, '#', Self::rewrite)
    }
}

// ============================================================================
// Tests
// ============================================================================
