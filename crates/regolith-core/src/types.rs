//! Shared value types: locations, diagnostics, and positional hints.
//!
//! The cache treats [`Diagnostic`] as an opaque payload apart from its `code`
//! (used for selective replacement) and its `location` (consumed by fixers).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fixer::FixError;

// ============================================================================
// Location
// ============================================================================

/// A 1-indexed row/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// Row (1-indexed).
    pub row: u32,
    /// Column (1-indexed, UTF-8 bytes).
    pub col: u32,
}

/// Location of a diagnostic inside a file.
///
/// `row` and `col` are 1-indexed. The optional `end` is exclusive on the
/// column axis. Nothing here is guaranteed to fit the current file contents;
/// fixers bounds-check every location before using it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Row (1-indexed).
    pub row: u32,
    /// Column (1-indexed, UTF-8 bytes).
    pub col: u32,
    /// End position, when the producer reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Position>,
}

impl Location {
    /// Create a location without an end position.
    pub fn new(row: u32, col: u32) -> Self {
        Location {
            row,
            col,
            end: None,
        }
    }

    /// Create a location spanning to `(end_row, end_col)`.
    pub fn with_end(row: u32, col: u32, end_row: u32, end_col: u32) -> Self {
        Location {
            row,
            col,
            end: Some(Position {
                row: end_row,
                col: end_col,
            }),
        }
    }

    /// Convert a loosely typed location (as received from a transport) into a
    /// [`Location`].
    ///
    /// Accepts `{"row": n, "col": n, "end": {"row": n, "col": n}}` where every
    /// number is a non-negative integer; `"column"` is accepted as an alias of
    /// `"col"` and `end` may be `null` or absent. Any other representation
    /// (strings, floats, negative numbers, missing fields) is a type mismatch.
    pub fn from_value(value: &Value) -> Result<Self, FixError> {
        let object = value
            .as_object()
            .ok_or_else(|| FixError::type_mismatch("location", "object", value))?;

        let row = integer_field(object, "row", "location.row")?;
        let col = match object.get("col") {
            Some(_) => integer_field(object, "col", "location.col")?,
            None => integer_field(object, "column", "location.column")?,
        };

        let end = match object.get("end") {
            None | Some(Value::Null) => None,
            Some(Value::Object(end)) => Some(Position {
                row: integer_field(end, "row", "location.end.row")?,
                col: match end.get("col") {
                    Some(_) => integer_field(end, "col", "location.end.col")?,
                    None => integer_field(end, "column", "location.end.column")?,
                },
            }),
            Some(other) => return Err(FixError::type_mismatch("location.end", "object", other)),
        };

        Ok(Location { row, col, end })
    }

    /// The end column on the start row, if the location ends on the same row.
    pub fn end_col_on_row(&self) -> Option<u32> {
        match self.end {
            Some(end) if end.row == self.row => Some(end.col),
            _ => None,
        }
    }
}

impl TryFrom<&Value> for Location {
    type Error = FixError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Location::from_value(value)
    }
}

fn integer_field(
    object: &serde_json::Map<String, Value>,
    key: &str,
    field: &str,
) -> Result<u32, FixError> {
    match object.get(key) {
        Some(value) => value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| FixError::type_mismatch(field, "unsigned integer", value)),
        None => Err(FixError::TypeMismatch {
            field: field.to_string(),
            expected: "unsigned integer",
            found: "nothing".to_string(),
        }),
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Severity reported alongside a diagnostic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Error,
    Warning,
    Information,
    Hint,
}

/// A reported issue in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Identifying rule code (e.g. `use-assignment-operator`).
    pub code: String,
    /// Rule category (e.g. `style`, `bugs`).
    #[serde(default)]
    pub category: String,
    /// Human-readable description.
    pub message: String,
    /// Where the issue was found.
    pub location: Location,
    /// Reported severity.
    #[serde(default)]
    pub severity: Severity,
}

impl Diagnostic {
    /// Create an error-level diagnostic with no category.
    pub fn new(code: impl Into<String>, message: impl Into<String>, location: Location) -> Self {
        Diagnostic {
            code: code.into(),
            category: String::new(),
            message: message.into(),
            location,
            severity: Severity::Error,
        }
    }

    /// Set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

// ============================================================================
// Positional Hints
// ============================================================================

/// A reference to a built-in function on a given line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuiltinPosition {
    /// Fully qualified built-in name (e.g. `strings.replace_n`).
    pub builtin: String,
    /// Row (1-indexed).
    pub line: u32,
    /// Start column (1-indexed).
    pub start: u32,
    /// End column (exclusive).
    pub end: u32,
}

/// A keyword occurrence on a given line, used for hover assistance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeywordLocation {
    /// Keyword text (e.g. `contains`, `every`).
    pub name: String,
    /// Row (1-indexed).
    pub line: u32,
    /// Start column (1-indexed).
    pub start: u32,
    /// End column (exclusive).
    pub end: u32,
}

// ============================================================================
// Tests
// ============================================================================
