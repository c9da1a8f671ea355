//! Core infrastructure for regolith.
//!
//! This crate provides the shared state and fixing machinery behind the
//! linter and its language server:
//! - A concurrent state cache of nine independently locked per-file stores
//! - Fixers that turn diagnostic locations into edited file contents
//! - A fix ledger tracking applied fixes, file moves and conflicts
//! - Plain-text reporting of a fix run
//! - Error types and error codes
//! - Layered configuration with precedence tracking

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod error;
pub mod fixer;
pub mod ledger;
pub mod report;
pub mod runner;
pub mod store;
pub mod text;
pub mod types;
