//! One "apply fixes" run over the state cache.
//!
//! [`FixRunner::run`] walks every file in the contents store in URI order.
//! Each file's diagnostics are grouped by code, and every registered fixer
//! whose name matches a code runs against the progressively fixed contents.
//! Nothing is written until [`FixOutcome::commit`], which refuses conflicted
//! paths and files that changed since the run took its snapshot.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::cache::StateCache;
use crate::fixer::{FixCandidate, FixResult, FixerRegistry, RuntimeOptions};
use crate::ledger::FixLedger;
use crate::text::ContentHash;
use crate::types::{Diagnostic, Location};

/// The final state of one fixed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedFile {
    /// URI the file had when the run started.
    pub source: String,
    /// URI the file should have afterwards.
    pub dest: String,
    /// Contents after every fix.
    pub contents: String,
    /// Hash of the contents the run started from.
    pub source_hash: ContentHash,
}

impl FixedFile {
    /// Whether the file moves.
    pub fn is_move(&self) -> bool {
        self.source != self.dest
    }
}

/// What [`FixOutcome::commit`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Files written to the cache.
    pub applied: Vec<FixedFile>,
    /// Source URIs left alone because they are part of a conflict.
    pub conflicted: Vec<String>,
    /// Source URIs left alone because their cached contents changed.
    pub stale: Vec<String>,
}

/// Result of [`FixRunner::run`].
#[derive(Debug, Clone, Default)]
pub struct FixOutcome {
    /// Fixes, moves and conflicts of the run.
    pub ledger: FixLedger,
    /// Every file at least one fix applied to, in URI order.
    pub files: Vec<FixedFile>,
    /// Number of fixer invocations that failed.
    pub failures: usize,
}

impl FixOutcome {
    /// Whether any conflict blocks part of the run.
    pub fn has_conflicts(&self) -> bool {
        self.ledger.has_conflicts()
    }

    /// Write accepted files back into `cache`.
    ///
    /// Moved files go through [`StateCache::rename`] first so every store
    /// follows them, then receive their new contents. A move onto a path that
    /// another file is moving away from waits for that file, and a move whose
    /// destination is still occupied when its turn comes is not applied.
    pub fn commit(&self, cache: &StateCache) -> CommitSummary {
        let conflicted = self.ledger.conflicted_paths();
        let mut summary = CommitSummary::default();

        for file in self.commit_order() {
            if conflicted.contains(&file.source) || conflicted.contains(&file.dest) {
                warn!(uri = %file.source, "not applying conflicted fix");
                summary.conflicted.push(file.source.clone());
                continue;
            }

            let current = cache.get_file_contents(&file.source);
            if current.as_deref().map(ContentHash::compute).as_ref() != Some(&file.source_hash) {
                warn!(uri = %file.source, "contents changed since fixing, skipping");
                summary.stale.push(file.source.clone());
                continue;
            }

            if file.is_move() {
                let occupied = cache.get_file_contents(&file.dest).is_some()
                    || cache.get_ignored_file_contents(&file.dest).is_some();
                if occupied {
                    warn!(from = %file.source, to = %file.dest, "destination still occupied");
                    summary.conflicted.push(file.source.clone());
                    continue;
                }
                cache.rename(&file.source, &file.dest);
            }
            cache.set_file_contents(&file.dest, file.contents.as_str());
            summary.applied.push(file.clone());
        }

        info!(
            applied = summary.applied.len(),
            conflicted = summary.conflicted.len(),
            stale = summary.stale.len(),
            "committed fixes"
        );
        summary
    }

    /// Files in URI order, except that a move onto another file's source
    /// comes after that file. Moves stuck in a cycle go last.
    fn commit_order(&self) -> Vec<&FixedFile> {
        let mut pending: Vec<&FixedFile> = self.files.iter().collect();
        let mut ordered = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let sources: HashSet<&str> = pending.iter().map(|&f| f.source.as_str()).collect();
            let (ready, blocked): (Vec<&FixedFile>, Vec<&FixedFile>) = pending
                .into_iter()
                .partition(|f| !f.is_move() || !sources.contains(f.dest.as_str()));
            if ready.is_empty() {
                ordered.extend(blocked);
                break;
            }
            ordered.extend(ready);
            pending = blocked;
        }
        ordered
    }
}

/// Runs a set of fixers over the cache.
#[derive(Debug)]
pub struct FixRunner {
    registry: FixerRegistry,
    base_dir: String,
}

impl FixRunner {
    /// Create a runner reporting every fix under `base_dir`.
    pub fn new(registry: FixerRegistry, base_dir: impl Into<String>) -> Self {
        FixRunner {
            registry,
            base_dir: base_dir.into(),
        }
    }

    /// The fixers this runner uses.
    pub fn registry(&self) -> &FixerRegistry {
        &self.registry
    }

    /// Compute fixes for every file in `cache` without changing it.
    #[tracing::instrument(skip_all, fields(base_dir = %self.base_dir))]
    pub fn run(&self, cache: &StateCache) -> FixOutcome {
        let mut all_files = cache.get_all_files();
        let mut uris: Vec<String> = all_files.keys().cloned().collect();
        uris.sort_unstable();
        let existing: HashSet<String> = uris
            .iter()
            .cloned()
            .chain(cache.get_all_ignored_files().into_keys())
            .collect();

        let mut outcome = FixOutcome::default();

        for uri in uris {
            let Some(original) = all_files.remove(&uri) else {
                continue;
            };
            let locations = locations_by_code(&cache.get_all_diagnostics_for_uri(&uri));
            if locations.is_empty() {
                continue;
            }
            if let Some(file) = self.fix_file(&uri, original, &locations, &mut outcome) {
                outcome.files.push(file);
            }
        }

        outcome.ledger.detect_conflicts(&existing);

        info!(
            files = outcome.files.len(),
            fixes = outcome.ledger.total_fixes(),
            failures = outcome.failures,
            conflicts = outcome.ledger.has_conflicts(),
            "fix run finished"
        );
        outcome
    }

    fn fix_file(
        &self,
        uri: &str,
        original: String,
        locations: &IndexMap<String, Vec<Location>>,
        outcome: &mut FixOutcome,
    ) -> Option<FixedFile> {
        let source_hash = ContentHash::compute(&original);
        let mut path = uri.to_string();
        let mut contents = original;
        let mut applied: Vec<FixResult> = Vec::new();

        for fixer in self.registry.iter() {
            let Some(fixer_locations) = locations.get(fixer.name()) else {
                continue;
            };
            let candidate = FixCandidate::new(path.clone(), contents.clone());
            let options = RuntimeOptions::new(self.base_dir.clone(), fixer_locations.clone());

            let results = match fixer.fix(&candidate, Some(&options)) {
                Ok(results) => results,
                Err(err) => {
                    warn!(uri, fixer = fixer.name(), error = %err, "fixer failed");
                    outcome.failures += 1;
                    continue;
                }
            };

            for mut result in results {
                if let Some(rename) = &result.rename {
                    debug!(from = %rename.from, to = %rename.to, "fixer moved file");
                    outcome.ledger.register_old_path_for_file(&rename.to, uri);
                    path = rename.to.clone();
                }
                debug!(uri, fixer = fixer.name(), "fix applied");
                contents = std::mem::take(&mut result.contents);
                applied.push(result);
            }
        }

        // Titles land on the final path once the file has stopped moving, so
        // another file vacating that path never mixes its fixes in.
        for result in &applied {
            outcome.ledger.add_file_fix(&path, result);
        }

        (!applied.is_empty()).then(|| FixedFile {
            source: uri.to_string(),
            dest: path,
            contents,
            source_hash,
        })
    }
}

/// Group diagnostic locations by code, keeping their reported order.
fn locations_by_code(diagnostics: &[Diagnostic]) -> IndexMap<String, Vec<Location>> {
    let mut grouped: IndexMap<String, Vec<Location>> = IndexMap::new();
    for diagnostic in diagnostics {
        grouped
            .entry(diagnostic.code.clone())
            .or_default()
            .push(diagnostic.location);
    }
    grouped
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with(files: &[(&str, &str, Vec<Diagnostic>)]) -> StateCache {
        let cache = StateCache::new();
        for (uri, contents, diagnostics) in files {
            cache.set_file_contents(uri, *contents);
            cache.set_file_diagnostics(uri, diagnostics.clone());
        }
        cache
    }

    fn diag(code: &str, location: Location) -> Diagnostic {
        Diagnostic::new(code, "violation", location)
    }

    fn runner() -> FixRunner {
        FixRunner::new(FixerRegistry::with_defaults(), "/work")
    }

    mod run {
        use super::*;

        #[test]
        fn fixes_are_chained_per_file() {
            let cache = cache_with(&[(
                "/work/p.rego",
                "package p\n\n#x\nallow = true\n",
                vec![
                    diag("no-whitespace-comment", Location::new(3, 1)),
                    diag("use-assignment-operator", Location::new(4, 1)),
                ],
            )]);
            let outcome = runner().run(&cache);

            assert_eq!(outcome.files.len(), 1);
            assert_eq!(outcome.files[0].contents, "package p\n\n# x\nallow := true\n");
            assert_eq!(
                outcome.ledger.fixes_for_file("/work/p.rego"),
                ["use-assignment-operator", "no-whitespace-comment"]
            );
            // nothing written yet
            assert_eq!(
                cache.get_file_contents("/work/p.rego").as_deref(),
                Some("package p\n\n#x\nallow = true\n")
            );
        }

        #[test]
        fn files_without_matching_diagnostics_are_skipped() {
            let cache = cache_with(&[(
                "/work/p.rego",
                "package p\n",
                vec![diag("opa-fmt", Location::new(1, 1))],
            )]);
            let outcome = runner().run(&cache);
            assert!(outcome.files.is_empty());
            assert_eq!(outcome.ledger.total_fixes(), 0);
        }

        #[test]
        fn parse_errors_block_fixing() {
            let cache = cache_with(&[(
                "/work/p.rego",
                "package p\nallow = true\n",
                vec![diag("use-assignment-operator", Location::new(2, 1))],
            )]);
            let parse_error = diag("rego-parse-error", Location::new(1, 1));
            cache.set_parse_errors("/work/p.rego", vec![parse_error]);
            assert!(runner().run(&cache).files.is_empty());
        }

        #[test]
        fn rename_is_recorded() {
            let cache = cache_with(&[(
                "/work/p.rego",
                "package authz\nallow = true\n",
                vec![
                    diag("use-assignment-operator", Location::new(2, 1)),
                    diag("directory-package-mismatch", Location::new(1, 1)),
                ],
            )]);
            let outcome = runner().run(&cache);

            let file = &outcome.files[0];
            assert!(file.is_move());
            assert_eq!(file.dest, "/work/authz/p.rego");
            assert_eq!(
                outcome.ledger.fixes_for_file("/work/authz/p.rego"),
                ["use-assignment-operator", "directory-package-mismatch"]
            );
            assert_eq!(
                outcome.ledger.old_path_for_file("/work/authz/p.rego"),
                Some("/work/p.rego")
            );
        }

        #[test]
        fn chained_moves_of_distinct_files_stay_separate() {
            let mismatch = || vec![diag("directory-package-mismatch", Location::new(1, 1))];
            let cache = cache_with(&[
                ("/work/x/p.rego", "package y\n", mismatch()),
                ("/work/y/p.rego", "package z\n", mismatch()),
            ]);
            let outcome = runner().run(&cache);

            assert!(!outcome.has_conflicts());
            assert_eq!(
                outcome.ledger.old_path_for_file("/work/y/p.rego"),
                Some("/work/x/p.rego")
            );
            assert_eq!(
                outcome.ledger.old_path_for_file("/work/z/p.rego"),
                Some("/work/y/p.rego")
            );
            assert_eq!(
                outcome.ledger.fixes_for_file("/work/y/p.rego"),
                ["directory-package-mismatch"]
            );
            assert_eq!(
                outcome.ledger.fixes_for_file("/work/z/p.rego"),
                ["directory-package-mismatch"]
            );
        }

        #[test]
        fn disabled_fixer_does_not_run() {
            let cache = cache_with(&[(
                "/work/p.rego",
                "allow = true\n",
                vec![diag("use-assignment-operator", Location::new(1, 1))],
            )]);
            let mut registry = FixerRegistry::with_defaults();
            registry.unregister("use-assignment-operator");
            let outcome = FixRunner::new(registry, "/work").run(&cache);
            assert!(outcome.files.is_empty());
        }
    }

    mod commit {
        use super::*;

        #[test]
        fn edits_and_moves_reach_the_cache() {
            let cache = cache_with(&[(
                "/work/p.rego",
                "package authz\nallow = true\n",
                vec![
                    diag("use-assignment-operator", Location::new(2, 1)),
                    diag("directory-package-mismatch", Location::new(1, 1)),
                ],
            )]);
            let outcome = runner().run(&cache);
            let summary = outcome.commit(&cache);

            assert_eq!(summary.applied.len(), 1);
            assert!(cache.get_file_contents("/work/p.rego").is_none());
            assert_eq!(
                cache.get_file_contents("/work/authz/p.rego").as_deref(),
                Some("package authz\nallow := true\n")
            );
            // diagnostics followed the file
            assert!(cache.get_file_diagnostics("/work/authz/p.rego").is_some());
        }

        #[test]
        fn stale_file_is_skipped() {
            let cache = cache_with(&[(
                "/work/p.rego",
                "allow = true\n",
                vec![diag("use-assignment-operator", Location::new(1, 1))],
            )]);
            let outcome = runner().run(&cache);
            cache.set_file_contents("/work/p.rego", "allow = false\n");

            let summary = outcome.commit(&cache);
            assert_eq!(summary.stale, vec!["/work/p.rego"]);
            assert_eq!(
                cache.get_file_contents("/work/p.rego").as_deref(),
                Some("allow = false\n")
            );
        }

        #[test]
        fn chained_moves_vacate_before_filling() {
            let mismatch = || vec![diag("directory-package-mismatch", Location::new(1, 1))];
            let cache = cache_with(&[
                ("/work/x/p.rego", "package y\n", mismatch()),
                ("/work/y/p.rego", "package z\n", mismatch()),
            ]);
            let summary = runner().run(&cache).commit(&cache);

            let applied: Vec<(&str, &str)> = summary
                .applied
                .iter()
                .map(|f| (f.source.as_str(), f.dest.as_str()))
                .collect();
            assert_eq!(
                applied,
                vec![
                    ("/work/y/p.rego", "/work/z/p.rego"),
                    ("/work/x/p.rego", "/work/y/p.rego"),
                ]
            );
            assert!(summary.stale.is_empty());
            assert!(cache.get_file_contents("/work/x/p.rego").is_none());
            assert_eq!(
                cache.get_file_contents("/work/y/p.rego").as_deref(),
                Some("package y\n")
            );
            assert_eq!(
                cache.get_file_contents("/work/z/p.rego").as_deref(),
                Some("package z\n")
            );
        }

        #[test]
        fn move_waits_for_a_vacating_file_that_was_skipped() {
            let mismatch = || vec![diag("directory-package-mismatch", Location::new(1, 1))];
            let cache = cache_with(&[
                ("/work/x/p.rego", "package y\n", mismatch()),
                ("/work/y/p.rego", "package z\n", mismatch()),
            ]);
            let outcome = runner().run(&cache);
            cache.set_file_contents("/work/y/p.rego", "package z\nedited := true\n");

            let summary = outcome.commit(&cache);
            assert_eq!(summary.stale, vec!["/work/y/p.rego"]);
            assert_eq!(summary.conflicted, vec!["/work/x/p.rego"]);
            assert!(summary.applied.is_empty());
            assert_eq!(
                cache.get_file_contents("/work/y/p.rego").as_deref(),
                Some("package z\nedited := true\n")
            );
            assert!(cache.get_file_contents("/work/x/p.rego").is_some());
        }

        #[test]
        fn swapped_files_are_not_applied() {
            let cache = cache_with(&[
                (
                    "/work/a/p.rego",
                    "package b\n",
                    vec![diag("directory-package-mismatch", Location::new(1, 1))],
                ),
                (
                    "/work/b/p.rego",
                    "package a\n",
                    vec![diag("directory-package-mismatch", Location::new(1, 1))],
                ),
            ]);
            let outcome = runner().run(&cache);
            assert!(outcome.has_conflicts());

            let summary = outcome.commit(&cache);
            assert!(summary.applied.is_empty());
            assert_eq!(
                cache.get_file_contents("/work/a/p.rego").as_deref(),
                Some("package b\n")
            );
            assert_eq!(
                cache.get_file_contents("/work/b/p.rego").as_deref(),
                Some("package a\n")
            );
        }

        #[test]
        fn conflicting_moves_are_not_applied() {
            let mismatch = || vec![diag("directory-package-mismatch", Location::new(1, 1))];
            let cache = cache_with(&[
                ("/work/a/p.rego", "package pkg\n", mismatch()),
                ("/work/b/p.rego", "package pkg\n", mismatch()),
            ]);
            let outcome = runner().run(&cache);
            assert!(outcome.has_conflicts());

            let summary = outcome.commit(&cache);
            assert!(summary.applied.is_empty());
            assert_eq!(summary.conflicted, vec!["/work/a/p.rego", "/work/b/p.rego"]);
            assert!(cache.get_file_contents("/work/a/p.rego").is_some());
            assert!(cache.get_file_contents("/work/pkg/p.rego").is_none());
        }
    }
}
