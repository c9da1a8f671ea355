//! Regolith - apply lint fixes to policy files without clobbering the workspace.
//!
//! This crate provides the CLI binary for regolith.
//!
//! ## Modules
//!
//! - `cli` - fix command implementation

pub mod cli;

// Re-export core types for convenience
pub use regolith_core::cache::StateCache;
pub use regolith_core::config::{CliOverrides, ConfigSource, ConfigValue, ResolvedConfig};
pub use regolith_core::error::{OutputErrorCode, RegolithError};
pub use regolith_core::fixer::{Fixer, FixerRegistry};
pub use regolith_core::ledger::FixLedger;
pub use regolith_core::report::PrettyReporter;
