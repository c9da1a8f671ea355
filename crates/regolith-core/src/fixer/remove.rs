//! Redundant span removal.
//!
//! A location's `[col, end.col)` range on its row is deleted. Locations
//! without an end on the same row are skipped; so are locations whose start
//! or end falls outside the row. Every span is resolved against the original
//! rows before anything is removed, so dropping a row never shifts the rows
//! a later location refers to.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use super::{require_options, FixCandidate, FixError, FixResult, Fixer, RuntimeOptions};
use crate::text::{column_index, end_column_index, join_lines, row_index, split_lines};
use crate::types::Location;

/// What to do with a row that is blank after its spans were removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmptiedRows {
    /// Keep the row so row numbers below it stay put.
    Keep,
    /// Drop the row entirely.
    Drop,
}

fn remove_spans(contents: &str, locations: &[Location], emptied: EmptiedRows) -> Option<String> {
    let mut lines = split_lines(contents);

    // row -> [(start, end)]
    let mut spans: BTreeMap<usize, Vec<(usize, usize)>> = BTreeMap::new();
    for location in locations {
        let Some(row) = row_index(&lines, location.row) else {
            trace!(row = location.row, "row out of range");
            continue;
        };
        let line = &lines[row];
        let Some(start) = column_index(line, location.col) else {
            trace!(row = location.row, col = location.col, "column out of range");
            continue;
        };
        let Some(end) = location
            .end_col_on_row()
            .and_then(|col| end_column_index(line, col))
        else {
            trace!(row = location.row, "no usable end on the same row");
            continue;
        };
        if end <= start {
            continue;
        }
        spans.entry(row).or_default().push((start, end));
    }

    if spans.is_empty() {
        return None;
    }

    let mut dropped: BTreeSet<usize> = BTreeSet::new();
    for (row, mut row_spans) in spans {
        // Right to left; anything overlapping a span already taken is skipped.
        row_spans.sort_unstable_by(|a, b| b.cmp(a));
        let was_blank = lines[row].trim().is_empty();
        let mut line = std::mem::take(&mut lines[row]);
        let mut boundary = usize::MAX;
        for (start, end) in row_spans {
            if end > boundary {
                continue;
            }
            line.replace_range(start..end, "");
            boundary = start;
        }
        if emptied == EmptiedRows::Drop && !was_blank && line.trim().is_empty() {
            dropped.insert(row);
        }
        lines[row] = line;
    }

    let kept: Vec<String> = lines
        .into_iter()
        .enumerate()
        .filter(|(index, _)| !dropped.contains(index))
        .map(|(_, line)| line)
        .collect();

    Some(join_lines(&kept))
}

fn run(
    fixer: &dyn Fixer,
    candidate: &FixCandidate,
    options: Option<&RuntimeOptions>,
    emptied: EmptiedRows,
) -> Result<Vec<FixResult>, FixError> {
    let options = require_options(fixer, options)?;
    Ok(remove_spans(&candidate.contents, &options.locations, emptied)
        .filter(|contents| contents != &candidate.contents)
        .map(|contents| FixResult::edited(fixer, candidate, options, contents))
        .into_iter()
        .collect())
}

// ============================================================================
// constant-condition
// ============================================================================

/// Removes conditions that are always true; rows left empty are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantCondition;

impl Fixer for ConstantCondition {
    fn name(&self) -> &'static str {
        "constant-condition"
    }

    fn fix(
        &self,
        candidate: &FixCandidate,
        options: Option<&RuntimeOptions>,
    ) -> Result<Vec<FixResult>, FixError> {
        run(self, candidate, options, EmptiedRows::Drop)
    }
}

// ============================================================================
// redundant-existence-check
// ============================================================================

/// Removes existence checks made redundant by a later reference; rows left
/// empty are kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedundantExistenceCheck;

impl Fixer for RedundantExistenceCheck {
    fn name(&self) -> &'static str {
        "redundant-existence-check"
    }

    fn fix(
        &self,
        candidate: &FixCandidate,
        options: Option<&RuntimeOptions>,
    ) -> Result<Vec<FixResult>, FixError> {
        run(self, candidate, options, EmptiedRows::Keep)
    }
}

// ============================================================================
// Tests
// ============================================================================
