//! Fix strategies.
//!
//! A [`Fixer`] turns the locations of one diagnostic category into edited file
//! contents. Fixers are pure: given a [`FixCandidate`] snapshot and
//! [`RuntimeOptions`] they return at most one [`FixResult`] covering every
//! location they managed to apply. Locations that no longer fit the contents
//! are skipped silently; an empty result set means "nothing to do", not
//! failure.
//!
//! Built-in fixers:
//!
//! | Name | Policy |
//! |------|--------|
//! | `use-assignment-operator` | `=` → `:=` at the located column |
//! | `prefer-equals-comparison` | `=` → `==` at the located column |
//! | `no-whitespace-comment` | `#x` → `# x` |
//! | `constant-condition` | remove span, drop rows left empty |
//! | `redundant-existence-check` | remove span, keep rows |
//! | `directory-package-mismatch` | move the file under its package path |

mod package;
mod remove;
mod substitute;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::text::ContentHash;
use crate::types::Location;

pub use package::DirectoryPackageMismatch;
pub use remove::{ConstantCondition, RedundantExistenceCheck};
pub use substitute::{NoWhitespaceComment, PreferEqualsComparison, UseAssignmentOperator};

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while preparing or running a fixer.
#[derive(Debug, Error)]
pub enum FixError {
    /// A fixer was invoked without runtime options.
    #[error("{fixer}: runtime options are required")]
    MissingOptions { fixer: String },

    /// A location field arrived in an unexpected representation.
    #[error("{field}: expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: String,
    },

    /// No fixer is registered under the requested name.
    #[error("no fixer registered for '{name}'")]
    UnknownFixer { name: String },
}

impl FixError {
    /// Build a type mismatch describing the offending value.
    pub fn type_mismatch(field: impl Into<String>, expected: &'static str, found: &Value) -> Self {
        let found = match found {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "boolean".to_string(),
            Value::Number(n) => format!("number {n}"),
            Value::String(_) => "string".to_string(),
            Value::Array(_) => "array".to_string(),
            Value::Object(_) => "object".to_string(),
        };
        FixError::TypeMismatch {
            field: field.into(),
            expected,
            found,
        }
    }

    fn missing_options(fixer: &dyn Fixer) -> Self {
        FixError::MissingOptions {
            fixer: fixer.name().to_string(),
        }
    }
}

// ============================================================================
// Inputs and Outputs
// ============================================================================

/// A file snapshot handed to a fixer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixCandidate {
    /// Path (or URI) of the file.
    pub filename: String,
    /// Full contents at the time the fixer runs.
    pub contents: String,
}

impl FixCandidate {
    /// Create a candidate.
    pub fn new(filename: impl Into<String>, contents: impl Into<String>) -> Self {
        FixCandidate {
            filename: filename.into(),
            contents: contents.into(),
        }
    }
}

/// What a fixer needs besides the file itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeOptions {
    /// Project root the file belongs to.
    pub base_dir: String,
    /// Spans to act on, in the order the diagnostics reported them.
    #[serde(default)]
    pub locations: Vec<Location>,
}

impl RuntimeOptions {
    /// Create options for `base_dir` with the given locations.
    pub fn new(base_dir: impl Into<String>, locations: Vec<Location>) -> Self {
        RuntimeOptions {
            base_dir: base_dir.into(),
            locations,
        }
    }
}

/// A file move requested by a fixer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rename {
    /// Current path.
    pub from: String,
    /// Path the file should move to.
    pub to: String,
}

/// The outcome of one fixer invocation on one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixResult {
    /// Name of the fixer that produced the edit.
    pub title: String,
    /// Project root the file belongs to.
    pub root: String,
    /// Complete edited contents.
    pub contents: String,
    /// Requested move, for fixers that relocate files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<Rename>,
    /// Hash of the contents the fixer started from.
    pub source_hash: ContentHash,
}

impl FixResult {
    /// Result for an in-place content edit.
    pub fn edited(
        fixer: &dyn Fixer,
        candidate: &FixCandidate,
        options: &RuntimeOptions,
        contents: String,
    ) -> Self {
        FixResult {
            title: fixer.name().to_string(),
            root: options.base_dir.clone(),
            contents,
            rename: None,
            source_hash: ContentHash::compute(&candidate.contents),
        }
    }
}

// ============================================================================
// The Fixer Capability
// ============================================================================

/// A named strategy converting diagnostic locations into edited contents.
pub trait Fixer: Send + Sync {
    /// Stable identifier; doubles as the diagnostic code the fixer handles and
    /// as the title shown in reports.
    fn name(&self) -> &'static str;

    /// Apply every applicable location to `candidate`.
    ///
    /// Returns an empty vector when no location changed the file, and at most
    /// one result otherwise. Fails only when `options` is missing.
    fn fix(
        &self,
        candidate: &FixCandidate,
        options: Option<&RuntimeOptions>,
    ) -> Result<Vec<FixResult>, FixError>;
}

impl fmt::Debug for dyn Fixer + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixer({})", self.name())
    }
}

/// Unwrap options or fail with a configuration error naming the fixer.
fn require_options<'a>(
    fixer: &dyn Fixer,
    options: Option<&'a RuntimeOptions>,
) -> Result<&'a RuntimeOptions, FixError> {
    options.ok_or_else(|| FixError::missing_options(fixer))
}

// ============================================================================
// Registry
// ============================================================================

/// Fixers available to a run, looked up by diagnostic code.
#[derive(Debug, Default)]
pub struct FixerRegistry {
    fixers: Vec<Box<dyn Fixer>>,
}

impl FixerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        FixerRegistry::default()
    }

    /// Registry holding every built-in fixer.
    pub fn with_defaults() -> Self {
        let mut registry = FixerRegistry::new();
        for fixer in default_fixers() {
            registry.register(fixer);
        }
        registry
    }

    /// Add a fixer, replacing any fixer registered under the same name.
    pub fn register(&mut self, fixer: Box<dyn Fixer>) {
        self.fixers.retain(|existing| existing.name() != fixer.name());
        self.fixers.push(fixer);
    }

    /// Drop the fixer registered under `name`.
    pub fn unregister(&mut self, name: &str) {
        self.fixers.retain(|existing| existing.name() != name);
    }

    /// The fixer for diagnostic code `name`.
    pub fn get(&self, name: &str) -> Option<&dyn Fixer> {
        self.fixers
            .iter()
            .find(|fixer| fixer.name() == name)
            .map(|fixer| fixer.as_ref())
    }

    /// Like [`get`](Self::get) but fails for unknown names.
    pub fn require(&self, name: &str) -> Result<&dyn Fixer, FixError> {
        self.get(name).ok_or_else(|| FixError::UnknownFixer {
            name: name.to_string(),
        })
    }

    /// Registered fixers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Fixer> {
        self.fixers.iter().map(|fixer| fixer.as_ref())
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|fixer| fixer.name()).collect()
    }

    /// Number of registered fixers.
    pub fn len(&self) -> usize {
        self.fixers.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.fixers.is_empty()
    }
}

/// Every built-in fixer, content edits first and file moves last.
pub fn default_fixers() -> Vec<Box<dyn Fixer>> {
    vec![
        Box::new(UseAssignmentOperator),
        Box::new(PreferEqualsComparison),
        Box::new(NoWhitespaceComment),
        Box::new(ConstantCondition),
        Box::new(RedundantExistenceCheck),
        Box::new(DirectoryPackageMismatch::default()),
    ]
}

// ============================================================================
// Tests
// ============================================================================
