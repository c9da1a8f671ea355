//! The fix ledger for one "apply fixes" run.
//!
//! [`FixLedger`] records which fixes landed on which destination file, where
//! moved files came from, and which moves cannot be carried out safely:
//!
//! - **Source-file conflicts**: a move targets a path that already holds a
//!   file which is not itself being moved away.
//! - **Many-to-one conflicts**: several distinct files would be moved onto
//!   the same path.
//!
//! Conflicts are only ever reported, never resolved. A ledger is built fresh
//! for each run and thrown away afterwards.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use indexmap::IndexMap;
use tracing::debug;

use crate::fixer::FixResult;

/// Fixes accumulated for one destination file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct FileFixes {
    root: String,
    titles: Vec<String>,
}

/// Conflicts within one project root: path → colliding paths.
pub type ConflictMap = BTreeMap<String, BTreeSet<String>>;

/// Accumulator of applied fixes, moves, and conflicts.
#[derive(Debug, Clone, Default)]
pub struct FixLedger {
    /// Project roots in the order they were first seen.
    roots: Vec<String>,
    /// Destination path → fixes, in insertion order.
    file_fixes: IndexMap<String, FileFixes>,
    /// Source path → the path that file moves to, one entry per moved file.
    moves: IndexMap<String, String>,
    conflicts_source_file: IndexMap<String, ConflictMap>,
    conflicts_many_to_one: IndexMap<String, ConflictMap>,
}

impl FixLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        FixLedger::default()
    }

    fn see_root(&mut self, root: &str) {
        if !self.roots.iter().any(|r| r == root) {
            self.roots.push(root.to_string());
        }
    }

    // ------------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------------

    /// Record that `result` was applied to `dest`.
    ///
    /// The first fix recorded for a file decides its project root.
    pub fn add_file_fix(&mut self, dest: &str, result: &FixResult) {
        self.see_root(&result.root);
        self.file_fixes
            .entry(dest.to_string())
            .or_insert_with(|| FileFixes {
                root: result.root.clone(),
                titles: Vec::new(),
            })
            .titles
            .push(result.title.clone());
    }

    /// Move the fixes recorded for `old_path` onto `new_path`.
    ///
    /// `new_path`'s existing titles come first, then `old_path`'s.
    pub fn merge_fixes(&mut self, new_path: &str, old_path: &str) {
        if new_path == old_path {
            return;
        }
        let Some(old) = self.file_fixes.shift_remove(old_path) else {
            return;
        };
        match self.file_fixes.get_mut(new_path) {
            Some(existing) => existing.titles.extend(old.titles),
            None => {
                self.file_fixes.insert(new_path.to_string(), old);
            }
        }
    }

    /// Record that the file which started the run at `old_path` ends up at
    /// `new_path`.
    ///
    /// Provenance is keyed on the source: registering the same `old_path`
    /// again replaces its destination, while a different file moving out of
    /// `new_path` stays a separate move.
    pub fn register_old_path_for_file(&mut self, new_path: &str, old_path: &str) {
        if new_path == old_path {
            self.moves.shift_remove(old_path);
            return;
        }
        self.moves.insert(old_path.to_string(), new_path.to_string());
    }

    /// Destination → sources moving onto it, in registration order.
    fn moves_by_destination(&self) -> IndexMap<&str, Vec<&str>> {
        let mut grouped: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for (old_path, new_path) in &self.moves {
            grouped.entry(new_path.as_str()).or_default().push(old_path.as_str());
        }
        grouped
    }

    /// Whether following moves from `start` leads back to `start`.
    fn moves_in_cycle(&self, start: &str) -> bool {
        let mut current = start;
        for _ in 0..self.moves.len() {
            match self.moves.get(current) {
                Some(next) if next == start => return true,
                Some(next) => current = next.as_str(),
                None => return false,
            }
        }
        false
    }

    /// Flag that `old_path` is one of several files moving onto `new_path`.
    pub fn register_conflict_many_to_one(&mut self, root: &str, old_path: &str, new_path: &str) {
        self.see_root(root);
        self.conflicts_many_to_one
            .entry(root.to_string())
            .or_default()
            .entry(new_path.to_string())
            .or_default()
            .insert(old_path.to_string());
    }

    /// Flag that moving `incoming_path` would overwrite `existing_path`.
    pub fn register_conflict_source_file(
        &mut self,
        root: &str,
        existing_path: &str,
        incoming_path: &str,
    ) {
        self.see_root(root);
        self.conflicts_source_file
            .entry(root.to_string())
            .or_default()
            .entry(existing_path.to_string())
            .or_default()
            .insert(incoming_path.to_string());
    }

    /// Derive both conflict classes from the recorded moves.
    ///
    /// `existing` are the paths that held files before the run started.
    pub fn detect_conflicts(&mut self, existing: &HashSet<String>) {
        let moves: Vec<(String, Vec<String>)> = self
            .moves_by_destination()
            .into_iter()
            .map(|(new, olds)| (new.to_string(), olds.into_iter().map(String::from).collect()))
            .collect();

        for (new_path, old_paths) in moves {
            let root = self.root_for_file(&new_path).unwrap_or_default();

            if old_paths.len() > 1 {
                debug!(new_path = %new_path, sources = old_paths.len(), "many-to-one move");
                for old_path in &old_paths {
                    self.register_conflict_many_to_one(&root, old_path, &new_path);
                }
            }

            let vacated = self.moves.contains_key(&new_path);
            if existing.contains(&new_path) && !vacated {
                debug!(new_path = %new_path, "move would overwrite an existing file");
                for old_path in &old_paths {
                    self.register_conflict_source_file(&root, &new_path, old_path);
                }
            }

            for old_path in &old_paths {
                if vacated && self.moves_in_cycle(old_path) {
                    debug!(new_path = %new_path, old_path = %old_path, "moves form a cycle");
                    self.register_conflict_source_file(&root, &new_path, old_path);
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Project roots in discovery order.
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Root recorded for `path`.
    pub fn root_for_file(&self, path: &str) -> Option<String> {
        self.file_fixes.get(path).map(|fixes| fixes.root.clone())
    }

    /// Destination files under `root`, sorted by path.
    pub fn files_in_root(&self, root: &str) -> Vec<&str> {
        let mut files: Vec<&str> = self
            .file_fixes
            .iter()
            .filter(|(_, fixes)| fixes.root == root)
            .map(|(path, _)| path.as_str())
            .collect();
        files.sort_unstable();
        files
    }

    /// Every destination file, in the order first recorded.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.file_fixes.keys().map(String::as_str)
    }

    /// Titles of the fixes applied to `path`, in application order.
    pub fn fixes_for_file(&self, path: &str) -> &[String] {
        self.file_fixes
            .get(path)
            .map(|fixes| fixes.titles.as_slice())
            .unwrap_or_default()
    }

    /// Where the file at `new_path` came from, if exactly one file moves
    /// onto it.
    pub fn old_path_for_file(&self, new_path: &str) -> Option<&str> {
        let mut sources = self
            .moves
            .iter()
            .filter(|(_, dest)| *dest == new_path)
            .map(|(source, _)| source.as_str());
        match (sources.next(), sources.next()) {
            (Some(single), None) => Some(single),
            _ => None,
        }
    }

    /// Every recorded move as `(old_path, new_path)`, in registration order.
    pub fn moves(&self) -> impl Iterator<Item = (&str, &str)> {
        self.moves.iter().map(|(old, new)| (old.as_str(), new.as_str()))
    }

    /// Total number of fixes recorded.
    pub fn total_fixes(&self) -> usize {
        self.file_fixes.values().map(|f| f.titles.len()).sum()
    }

    /// Number of fixes recorded under `root`.
    pub fn fixes_in_root(&self, root: &str) -> usize {
        self.file_fixes
            .values()
            .filter(|f| f.root == root)
            .map(|f| f.titles.len())
            .sum()
    }

    /// Whether any conflict was recorded.
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts_source_file.is_empty() || !self.conflicts_many_to_one.is_empty()
    }

    /// Whether `root` has any conflict.
    pub fn has_conflicts_in_root(&self, root: &str) -> bool {
        self.conflicts_source_file.contains_key(root)
            || self.conflicts_many_to_one.contains_key(root)
    }

    /// Source-file conflicts under `root`: existing path → incoming paths.
    pub fn source_file_conflicts(&self, root: &str) -> Option<&ConflictMap> {
        self.conflicts_source_file.get(root)
    }

    /// Many-to-one conflicts under `root`: destination → source paths.
    pub fn many_to_one_conflicts(&self, root: &str) -> Option<&ConflictMap> {
        self.conflicts_many_to_one.get(root)
    }

    /// Every path involved in any conflict; none of them may be written.
    pub fn conflicted_paths(&self) -> HashSet<String> {
        self.conflicts_source_file
            .values()
            .chain(self.conflicts_many_to_one.values())
            .flat_map(|conflicts| {
                conflicts
                    .iter()
                    .flat_map(|(path, others)| std::iter::once(path).chain(others.iter()))
            })
            .cloned()
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
