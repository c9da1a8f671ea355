//! The shared per-file state cache.
//!
//! [`StateCache`] composes nine independently locked stores behind one
//! facade. Every store is keyed by the same client-assigned URI string.
//!
//! ## Consistency
//!
//! There is no lock spanning stores. [`StateCache::delete`] and
//! [`StateCache::rename`] walk the stores one after another, so a reader
//! racing either operation may briefly see a URI present in some stores and
//! absent from others. That window is accepted: a global lock would serialize
//! every request handler in the server. Readers that need two stores at once
//! (see [`StateCache::get_content_and_module`]) get both-or-nothing, but not a
//! guarantee that both values came from the same write.
//!
//! Partial updates of one store go through the store's `update_value`, which
//! holds that store's exclusive lock across the read-modify-write.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::aggregate::{AggregateData, AggregateStore, Aggregates};
use crate::error::CacheError;
use crate::store::KeyedStore;
use crate::types::{BuiltinPosition, Diagnostic, KeywordLocation};

/// Parsed module representation, opaque to the cache.
pub type Module = Arc<Value>;

/// Built-in references on a file, by row.
pub type BuiltinPositions = HashMap<u32, Vec<BuiltinPosition>>;

/// Keyword occurrences on a file, by row.
pub type KeywordLocations = HashMap<u32, Vec<KeywordLocation>>;

/// Per-file analysis state shared by all request handlers.
#[derive(Debug)]
pub struct StateCache {
    file_contents: KeyedStore<String, String>,
    ignored_file_contents: KeyedStore<String, String>,
    modules: KeyedStore<String, Module>,
    aggregates: AggregateStore,
    file_diagnostics: KeyedStore<String, Vec<Diagnostic>>,
    parse_errors: KeyedStore<String, Vec<Diagnostic>>,
    builtin_positions: KeyedStore<String, BuiltinPositions>,
    keyword_locations: KeyedStore<String, KeywordLocations>,
    successful_parse_line_counts: KeyedStore<String, u32>,
}

impl Default for StateCache {
    fn default() -> Self {
        StateCache::new()
    }
}

impl StateCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        StateCache {
            file_contents: KeyedStore::new("file_contents"),
            ignored_file_contents: KeyedStore::new("ignored_file_contents"),
            modules: KeyedStore::new("modules"),
            aggregates: AggregateStore::new(),
            file_diagnostics: KeyedStore::new("file_diagnostics"),
            parse_errors: KeyedStore::new("parse_errors"),
            builtin_positions: KeyedStore::new("builtin_positions"),
            keyword_locations: KeyedStore::new("keyword_locations"),
            successful_parse_line_counts: KeyedStore::new("successful_parse_line_counts"),
        }
    }

    // ------------------------------------------------------------------------
    // File contents
    // ------------------------------------------------------------------------

    /// Contents of every tracked (non-ignored) file.
    pub fn get_all_files(&self) -> HashMap<String, String> {
        self.file_contents.clone_map()
    }

    /// Current contents of `uri`.
    pub fn get_file_contents(&self, uri: &str) -> Option<String> {
        self.file_contents.get(uri)
    }

    /// Set the contents of `uri`.
    pub fn set_file_contents(&self, uri: &str, contents: impl Into<String>) {
        self.file_contents.set(uri.to_string(), contents.into());
    }

    /// Read `path` from disk and store it as the contents of `uri` if it
    /// differs from what is cached.
    ///
    /// Returns whether the cached contents changed, along with the contents
    /// read. Identical bytes never count as a change. On a read error the cache
    /// is left untouched.
    pub fn update_for_uri_from_disk(
        &self,
        uri: &str,
        path: &Path,
    ) -> Result<(bool, String), CacheError> {
        let on_disk = fs::read_to_string(path).map_err(|e| CacheError::io(path, e))?;

        let changed = self
            .file_contents
            .set_if_changed(uri.to_string(), on_disk.clone());
        if changed {
            debug!(uri, path = %path.display(), "contents changed on disk");
        }

        Ok((changed, on_disk))
    }

    /// Contents of every ignored file.
    pub fn get_all_ignored_files(&self) -> HashMap<String, String> {
        self.ignored_file_contents.clone_map()
    }

    /// Contents of `uri` if it is tracked as ignored.
    pub fn get_ignored_file_contents(&self, uri: &str) -> Option<String> {
        self.ignored_file_contents.get(uri)
    }

    /// Track `uri` as an ignored file with the given contents.
    pub fn set_ignored_file_contents(&self, uri: &str, contents: impl Into<String>) {
        self.ignored_file_contents.set(uri.to_string(), contents.into());
    }

    /// Stop tracking `uri` as ignored. The primary contents entry is untouched.
    pub fn delete_ignored_file_contents(&self, uri: &str) {
        self.ignored_file_contents.delete(uri);
    }

    // ------------------------------------------------------------------------
    // Modules
    // ------------------------------------------------------------------------

    /// Every parsed module.
    pub fn get_all_modules(&self) -> HashMap<String, Module> {
        self.modules.clone_map()
    }

    /// Parsed module for `uri`.
    pub fn get_module(&self, uri: &str) -> Option<Module> {
        self.modules.get(uri)
    }

    /// Set the parsed module for `uri`.
    pub fn set_module(&self, uri: &str, module: Module) {
        self.modules.set(uri.to_string(), module);
    }

    /// Contents and parsed module of `uri`, only if both are present.
    ///
    /// The two reads are not atomic with respect to writers; the pair may
    /// straddle a concurrent update.
    pub fn get_content_and_module(&self, uri: &str) -> Option<(String, Module)> {
        let contents = self.file_contents.get(uri)?;
        let module = self.modules.get(uri)?;
        Some((contents, module))
    }

    // ------------------------------------------------------------------------
    // Aggregates
    // ------------------------------------------------------------------------

    /// Record the aggregate data `uri` contributed. Empty data is ignored and
    /// never creates an entry.
    pub fn set_file_aggregates(&self, uri: &str, data: AggregateData) {
        self.aggregates.set(uri, data);
    }

    /// The aggregate composite, restricted to `uris` unless `uris` is empty.
    pub fn get_file_aggregates<S: AsRef<str>>(&self, uris: &[S]) -> Aggregates {
        if uris.is_empty() {
            self.aggregates.clone_composite()
        } else {
            self.aggregates.keep(uris)
        }
    }

    /// Replace all aggregate data after a full recompute.
    pub fn set_all_aggregates(&self, aggregates: Aggregates) {
        self.aggregates.reset(aggregates);
    }

    /// Drop the aggregate data `uri` contributed.
    pub fn delete_file_aggregates(&self, uri: &str) {
        self.aggregates.delete(uri);
    }

    // ------------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------------

    /// Rule diagnostics for `uri`.
    pub fn get_file_diagnostics(&self, uri: &str) -> Option<Vec<Diagnostic>> {
        self.file_diagnostics.get(uri)
    }

    /// Replace every rule diagnostic for `uri`.
    pub fn set_file_diagnostics(&self, uri: &str, diagnostics: Vec<Diagnostic>) {
        self.file_diagnostics.set(uri.to_string(), diagnostics);
    }

    /// Replace only the diagnostics of the rules that were just re-evaluated.
    ///
    /// Existing diagnostics whose code is not in `rule_codes` are kept in
    /// their original order, then `diagnostics` are appended in the given
    /// order. Runs under the diagnostics store's exclusive lock.
    pub fn set_file_diagnostics_for_rules<S: AsRef<str>>(
        &self,
        uri: &str,
        rule_codes: &[S],
        diagnostics: Vec<Diagnostic>,
    ) {
        let reevaluated: HashSet<&str> = rule_codes.iter().map(|c| c.as_ref()).collect();
        self.file_diagnostics.update_value(uri.to_string(), move |current| {
            let mut updated: Vec<Diagnostic> = current
                .map(|current| {
                    current
                        .iter()
                        .filter(|d| !reevaluated.contains(d.code.as_str()))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            updated.extend(diagnostics);
            updated
        });
    }

    /// Drop rule diagnostics for every file.
    pub fn clear_file_diagnostics(&self) {
        self.file_diagnostics.clear();
    }

    /// Parse-error diagnostics for `uri`.
    pub fn get_parse_errors(&self, uri: &str) -> Option<Vec<Diagnostic>> {
        self.parse_errors.get(uri)
    }

    /// Replace the parse-error diagnostics for `uri`.
    pub fn set_parse_errors(&self, uri: &str, diagnostics: Vec<Diagnostic>) {
        self.parse_errors.set(uri.to_string(), diagnostics);
    }

    /// What an editor should show for `uri`: parse errors when there are any,
    /// otherwise the rule diagnostics.
    pub fn get_all_diagnostics_for_uri(&self, uri: &str) -> Vec<Diagnostic> {
        match self.parse_errors.get(uri) {
            Some(parse_errors) if !parse_errors.is_empty() => parse_errors,
            _ => self.file_diagnostics.get(uri).unwrap_or_default(),
        }
    }

    // ------------------------------------------------------------------------
    // Positional hints
    // ------------------------------------------------------------------------

    /// Built-in references in `uri`, by row.
    pub fn get_builtin_positions(&self, uri: &str) -> Option<BuiltinPositions> {
        self.builtin_positions.get(uri)
    }

    /// Set the built-in references in `uri`.
    pub fn set_builtin_positions(&self, uri: &str, positions: BuiltinPositions) {
        self.builtin_positions.set(uri.to_string(), positions);
    }

    /// Built-in references for every file.
    pub fn get_all_builtin_positions(&self) -> HashMap<String, BuiltinPositions> {
        self.builtin_positions.clone_map()
    }

    /// Keyword occurrences in `uri`, by row.
    pub fn get_keyword_locations(&self, uri: &str) -> Option<KeywordLocations> {
        self.keyword_locations.get(uri)
    }

    /// Set the keyword occurrences in `uri`.
    pub fn set_keyword_locations(&self, uri: &str, locations: KeywordLocations) {
        self.keyword_locations.set(uri.to_string(), locations);
    }

    /// Row count of the last contents of `uri` that parsed.
    ///
    /// Survives later parse failures so row-based features can degrade
    /// gracefully.
    pub fn get_successful_parse_line_count(&self, uri: &str) -> Option<u32> {
        self.successful_parse_line_counts.get(uri)
    }

    /// Record the row count of contents of `uri` that just parsed.
    pub fn set_successful_parse_line_count(&self, uri: &str, count: u32) {
        self.successful_parse_line_counts.set(uri.to_string(), count);
    }

    // ------------------------------------------------------------------------
    // Cross-store operations
    // ------------------------------------------------------------------------

    /// Forget `uri` in all nine stores, ignored contents included.
    ///
    /// Idempotent. Not atomic across stores.
    pub fn delete(&self, uri: &str) {
        self.file_contents.delete(uri);
        self.ignored_file_contents.delete(uri);
        self.modules.delete(uri);
        self.aggregates.delete(uri);
        self.file_diagnostics.delete(uri);
        self.parse_errors.delete(uri);
        self.builtin_positions.delete(uri);
        self.keyword_locations.delete(uri);
        self.successful_parse_line_counts.delete(uri);
        debug!(uri, "deleted from cache");
    }

    /// Move everything known about `old` to `new`, store by store.
    ///
    /// Stores without an entry for `old` are left alone. Where `new` already
    /// has an entry it is overwritten. Not atomic across stores.
    pub fn rename(&self, old: &str, new: &str) {
        let new_key = new.to_string();
        let moved = [
            self.file_contents.rename_key(old, new_key.clone()),
            self.ignored_file_contents.rename_key(old, new_key.clone()),
            self.modules.rename_key(old, new_key.clone()),
            self.aggregates.rename_key(old, new),
            self.file_diagnostics.rename_key(old, new_key.clone()),
            self.parse_errors.rename_key(old, new_key.clone()),
            self.builtin_positions.rename_key(old, new_key.clone()),
            self.keyword_locations.rename_key(old, new_key.clone()),
            self.successful_parse_line_counts.rename_key(old, new_key),
        ];
        debug!(
            old,
            new,
            stores = moved.iter().filter(|m| **m).count(),
            "renamed in cache"
        );
    }
}

// ============================================================================
// Tests
// ============================================================================
