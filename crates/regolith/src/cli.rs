//! CLI front door for fix runs.
//!
//! `main.rs` parses arguments and resolves configuration; everything that
//! touches the cache or the disk lives here so tests can drive it directly.
//!
//! A run goes through four steps:
//! 1. Collect `.rego` files below the requested paths and load them into a
//!    fresh [`StateCache`] (ignored files go to the ignored-contents store).
//! 2. Turn every `--violation` into a diagnostic on its file.
//! 3. Run the fixers and render the ledger.
//! 4. Unless this is a dry run, commit accepted files to the cache and
//!    mirror them onto disk.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use regolith_core::cache::StateCache;
use regolith_core::config::{IgnoreMatcher, ResolvedConfig};
use regolith_core::error::RegolithError;
use regolith_core::report::PrettyReporter;
use regolith_core::runner::{FixOutcome, FixRunner, FixedFile};
use regolith_core::types::{Diagnostic, Location};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

/// File extension of policy files.
pub const POLICY_EXTENSION: &str = "rego";

// ============================================================================
// Violations
// ============================================================================

/// Errors in a `--violation` argument.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViolationError {
    /// No `<fixer>=` prefix.
    #[error("invalid violation '{input}', expected <fixer>=<path>:<row>:<col>[:<end_row>:<end_col>]")]
    Malformed { input: String },

    /// A row or column is not a number.
    #[error("invalid location in violation '{input}': {reason}")]
    BadLocation { input: String, reason: String },
}

impl From<ViolationError> for RegolithError {
    fn from(err: ViolationError) -> Self {
        RegolithError::invalid_args(err.to_string())
    }
}

/// A fix requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Name of the fixer to run.
    pub fixer: String,
    /// File the violation is in.
    pub path: PathBuf,
    /// Where in the file.
    pub location: Location,
}

impl FromStr for Violation {
    type Err = ViolationError;

    /// Parse `<fixer>=<path>:<row>:<col>[:<end_row>:<end_col>]`.
    ///
    /// Numbers are taken from the right, so paths may contain `:`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let malformed = || ViolationError::Malformed {
            input: input.to_string(),
        };
        let (fixer, target) = input.split_once('=').ok_or_else(malformed)?;
        if fixer.is_empty() {
            return Err(malformed());
        }

        let fields: Vec<&str> = target.split(':').collect();
        let trailing = |count: usize| -> Option<(String, Vec<u32>)> {
            if fields.len() <= count {
                return None;
            }
            let split = fields.len() - count;
            let numbers = fields[split..]
                .iter()
                .map(|f| f.parse::<u32>().ok())
                .collect::<Option<Vec<u32>>>()?;
            Some((fields[..split].join(":"), numbers))
        };

        let (path, location) = if let Some((path, n)) = trailing(4) {
            (path, Location::with_end(n[0], n[1], n[2], n[3]))
        } else if let Some((path, n)) = trailing(2) {
            (path, Location::new(n[0], n[1]))
        } else if fields.len() > 2 {
            return Err(ViolationError::BadLocation {
                input: input.to_string(),
                reason: "row and column must be non-negative integers".to_string(),
            });
        } else {
            return Err(malformed());
        };

        if path.is_empty() {
            return Err(malformed());
        }

        Ok(Violation {
            fixer: fixer.to_string(),
            path: PathBuf::from(path),
            location,
        })
    }
}

/// clap value parser for `--violation`.
pub fn parse_violation(input: &str) -> Result<Violation, String> {
    input.parse().map_err(|e: ViolationError| e.to_string())
}

// ============================================================================
// File Collection
// ============================================================================

/// Canonicalize `path`, mapping a missing file onto a resolution error.
fn canonical(path: &Path) -> Result<PathBuf, RegolithError> {
    fs::canonicalize(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => RegolithError::file_not_found(path.display().to_string()),
        _ => RegolithError::internal(format!("cannot resolve {}: {}", path.display(), e)),
    })
}

/// Every policy file at or below `paths`, canonicalized and sorted.
pub fn collect_policy_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, RegolithError> {
    let mut files = Vec::new();
    for path in paths {
        let root = canonical(path)?;
        if root.is_file() {
            files.push(root);
            continue;
        }
        for entry in WalkDir::new(&root).follow_links(false) {
            let entry = entry.map_err(|e| RegolithError::internal(e.to_string()))?;
            if entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == POLICY_EXTENSION)
            {
                files.push(entry.into_path());
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn uri_for(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Load `files` into `cache`, routing ignored files to the ignored store.
pub fn load_files(
    cache: &StateCache,
    files: &[PathBuf],
    ignore: &IgnoreMatcher,
) -> Result<(), RegolithError> {
    for path in files {
        let uri = uri_for(path);
        if ignore.is_ignored(path) {
            let contents = fs::read_to_string(path)
                .map_err(|e| RegolithError::internal(format!("{}: {}", path.display(), e)))?;
            debug!(uri = %uri, "ignored");
            cache.set_ignored_file_contents(&uri, contents);
            continue;
        }
        cache.update_for_uri_from_disk(&uri, path)?;
    }
    Ok(())
}

/// Attach every violation to its file as a diagnostic.
///
/// Violations must name a fixer `runner` knows and a file that was loaded.
pub fn attach_violations(
    cache: &StateCache,
    runner: &FixRunner,
    violations: &[Violation],
) -> Result<(), RegolithError> {
    let mut by_uri: HashMap<String, Vec<Diagnostic>> = HashMap::new();
    for violation in violations {
        runner.registry().require(&violation.fixer)?;
        let uri = uri_for(&canonical(&violation.path)?);
        if cache.get_file_contents(&uri).is_none() {
            if cache.get_ignored_file_contents(&uri).is_some() {
                debug!(uri = %uri, fixer = %violation.fixer, "violation in ignored file");
                continue;
            }
            return Err(RegolithError::invalid_args(format!(
                "{} is not among the files being fixed",
                violation.path.display()
            )));
        }
        by_uri.entry(uri).or_default().push(Diagnostic::new(
            violation.fixer.as_str(),
            "fix requested",
            violation.location,
        ));
    }
    for (uri, diagnostics) in by_uri {
        cache.set_file_diagnostics(&uri, diagnostics);
    }
    Ok(())
}

/// Mirror committed files onto disk, in the order they were committed.
pub fn write_files(files: &[FixedFile]) -> Result<(), RegolithError> {
    for file in files {
        let dest = Path::new(&file.dest);
        let write_err = |e: std::io::Error| {
            RegolithError::apply(
                format!("failed to write {}: {}", dest.display(), e),
                Some(file.dest.clone()),
            )
        };
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(dest, &file.contents).map_err(write_err)?;
        if file.is_move() {
            fs::remove_file(&file.source).map_err(|e| {
                RegolithError::apply(
                    format!("failed to remove {}: {}", file.source, e),
                    Some(file.source.clone()),
                )
            })?;
        }
        debug!(dest = %file.dest, "written");
    }
    Ok(())
}

// ============================================================================
// Fix Command
// ============================================================================

/// Everything `regolith fix` needs.
#[derive(Debug, Clone)]
pub struct FixRequest {
    /// Files or directories to consider; the project root when empty.
    pub paths: Vec<PathBuf>,
    /// Requested fixes.
    pub violations: Vec<Violation>,
    /// Report without writing anything.
    pub dry_run: bool,
    /// Resolved configuration.
    pub config: ResolvedConfig,
}

/// Result of `regolith fix`.
#[derive(Debug, Clone)]
pub struct FixReport {
    /// The rendered ledger.
    pub text: String,
    /// Files written to disk.
    pub written: Vec<FixedFile>,
    /// The run itself.
    pub outcome: FixOutcome,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

impl FixReport {
    /// Whether conflicts kept some fixes from being applied.
    pub fn has_conflicts(&self) -> bool {
        self.outcome.has_conflicts()
    }

    /// JSON rendering for machine consumers.
    pub fn to_json(&self) -> Value {
        let ledger = &self.outcome.ledger;
        let files: Vec<Value> = self
            .outcome
            .files
            .iter()
            .map(|file| {
                json!({
                    "source": file.source,
                    "dest": file.dest,
                    "fixes": ledger.fixes_for_file(&file.dest),
                    "written": self.written.iter().any(|w| w.source == file.source),
                })
            })
            .collect();
        let mut conflicts: Vec<String> = ledger.conflicted_paths().into_iter().collect();
        conflicts.sort();
        json!({
            "status": if self.has_conflicts() { "conflict" } else { "ok" },
            "dry_run": self.dry_run,
            "total_fixes": ledger.total_fixes(),
            "failures": self.outcome.failures,
            "files": files,
            "conflicts": conflicts,
        })
    }
}

/// Run `regolith fix`.
///
/// Conflicts are not an error here; the caller decides what they mean for
/// the exit code.
pub fn run_fix(request: &FixRequest) -> Result<FixReport, RegolithError> {
    let base_dir = canonical(request.config.base_dir())?;
    let ignore = IgnoreMatcher::new(
        &base_dir,
        request.config.ignore.iter().map(|p| p.value.as_str()),
    )?;

    let paths = if request.paths.is_empty() {
        vec![base_dir.clone()]
    } else {
        request.paths.clone()
    };
    let files = collect_policy_files(&paths)?;

    let cache = StateCache::new();
    load_files(&cache, &files, &ignore)?;

    let runner = FixRunner::new(request.config.registry(), uri_for(&base_dir));
    attach_violations(&cache, &runner, &request.violations)?;

    let outcome = runner.run(&cache);
    let text = PrettyReporter::new().render(&outcome.ledger);

    let written = if request.dry_run {
        Vec::new()
    } else {
        let summary = outcome.commit(&cache);
        write_files(&summary.applied)?;
        summary.applied
    };

    info!(
        files = files.len(),
        written = written.len(),
        dry_run = request.dry_run,
        "fix finished"
    );

    Ok(FixReport {
        text,
        written,
        outcome,
        dry_run: request.dry_run,
    })
}

// ============================================================================
// Tests
// ============================================================================
