//! Human-readable rendering of a [`FixLedger`].
//!
//! Output is grouped by project root in discovery order. A root with
//! conflicts lists only its conflicts; every other root lists its fix count
//! followed by each destination file and the titles applied to it:
//!
//! ```text
//! 3 fixes applied in /work:
//! policy.rego -> authz/policy.rego:
//! - rego-v1
//! - directory-package-mismatch
//!
//! main.rego:
//! - no-whitespace-comment
//! ```

use std::fmt::Write as _;
use std::io;
use std::path::Path;

use crate::ledger::{ConflictMap, FixLedger};

/// Renders a ledger as plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrettyReporter;

impl PrettyReporter {
    /// Create a reporter.
    pub fn new() -> Self {
        PrettyReporter
    }

    /// Render `ledger` into a string.
    pub fn render(&self, ledger: &FixLedger) -> String {
        let mut out = String::new();

        if ledger.roots().is_empty() {
            out.push_str("No fixes to apply.\n");
            return out;
        }

        for (index, root) in ledger.roots().iter().enumerate() {
            if index > 0 {
                out.push('\n');
            }
            if ledger.has_conflicts_in_root(root) {
                render_conflicts(&mut out, ledger, root);
            } else {
                render_fixes(&mut out, ledger, root);
            }
        }
        out
    }

    /// Write the rendering of `ledger` to `writer`.
    pub fn report(&self, ledger: &FixLedger, writer: &mut impl io::Write) -> io::Result<()> {
        writer.write_all(self.render(ledger).as_bytes())
    }
}

fn relative(root: &str, path: &str) -> String {
    if root.is_empty() {
        return path.to_string();
    }
    match Path::new(path).strip_prefix(root) {
        Ok(rel) => rel.to_string_lossy().into_owned(),
        Err(_) => path.to_string(),
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        "fix"
    } else {
        "fixes"
    }
}

fn render_fixes(out: &mut String, ledger: &FixLedger, root: &str) {
    let total = ledger.fixes_in_root(root);
    let _ = writeln!(out, "{total} {} applied in {root}:", plural(total));

    for (index, path) in ledger.files_in_root(root).into_iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        match ledger.old_path_for_file(path) {
            Some(old) => {
                let _ = writeln!(out, "{} -> {}:", relative(root, old), relative(root, path));
            }
            None => {
                let _ = writeln!(out, "{}:", relative(root, path));
            }
        }
        for title in ledger.fixes_for_file(path) {
            let _ = writeln!(out, "- {title}");
        }
    }
}

fn render_conflicts(out: &mut String, ledger: &FixLedger, root: &str) {
    let _ = writeln!(out, "Fixes not applied in {root}:");

    if let Some(conflicts) = ledger.source_file_conflicts(root) {
        out.push('\n');
        out.push_str("Source file conflicts:\n");
        render_conflict_map(out, root, conflicts, "cannot overwrite existing file");
    }

    if let Some(conflicts) = ledger.many_to_one_conflicts(root) {
        out.push('\n');
        out.push_str("Many to one conflicts:\n");
        render_conflict_map(out, root, conflicts, "would receive more than one file");
    }
}

fn render_conflict_map(out: &mut String, root: &str, conflicts: &ConflictMap, reason: &str) {
    for (path, others) in conflicts {
        let _ = writeln!(out, "{} ({reason}):", relative(root, path));
        for other in others {
            let _ = writeln!(out, "- {}", relative(root, other));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::fixer::FixResult;
    use crate::text::ContentHash;

    fn result(title: &str, root: &str) -> FixResult {
        FixResult {
            title: title.to_string(),
            root: root.to_string(),
            contents: String::new(),
            rename: None,
            source_hash: ContentHash::compute(""),
        }
    }

    #[test]
    fn empty_ledger() {
        assert_eq!(
            PrettyReporter::new().render(&FixLedger::new()),
            "No fixes to apply.\n"
        );
    }

    #[test]
    fn renamed_and_edited_files() {
        let mut ledger = FixLedger::new();
        ledger.add_file_fix("/work/policy.rego", &result("rego-v1", "/work"));
        ledger.merge_fixes("/work/authz/policy.rego", "/work/policy.rego");
        ledger.add_file_fix(
            "/work/authz/policy.rego",
            &result("directory-package-mismatch", "/work"),
        );
        ledger.register_old_path_for_file("/work/authz/policy.rego", "/work/policy.rego");
        ledger.add_file_fix("/work/main.rego", &result("no-whitespace-comment", "/work"));
        ledger.detect_conflicts(&HashSet::new());

        let expected = "\
3 fixes applied in /work:
policy.rego -> authz/policy.rego:
- rego-v1
- directory-package-mismatch

main.rego:
- no-whitespace-comment
";
        assert_eq!(PrettyReporter::new().render(&ledger), expected);
    }

    #[test]
    fn many_to_one_suppresses_listing() {
        let mut ledger = FixLedger::new();
        for old in ["/work/b/p.rego", "/work/a/p.rego"] {
            ledger.add_file_fix("/work/pkg/p.rego", &result("directory-package-mismatch", "/work"));
            ledger.register_old_path_for_file("/work/pkg/p.rego", old);
        }
        ledger.detect_conflicts(&HashSet::new());

        let rendered = PrettyReporter::new().render(&ledger);
        let expected = "\
Fixes not applied in /work:

Many to one conflicts:
pkg/p.rego (would receive more than one file):
- a/p.rego
- b/p.rego
";
        assert_eq!(rendered, expected);
        assert!(!rendered.contains("- directory-package-mismatch"));
    }

    #[test]
    fn source_file_conflict() {
        let mut ledger = FixLedger::new();
        ledger.add_file_fix("/work/pkg/p.rego", &result("directory-package-mismatch", "/work"));
        ledger.register_old_path_for_file("/work/pkg/p.rego", "/work/p.rego");
        let existing: HashSet<String> = ["/work/pkg/p.rego".to_string()].into_iter().collect();
        ledger.detect_conflicts(&existing);

        let rendered = PrettyReporter::new().render(&ledger);
        let expected = "Source file conflicts:\n\
                        pkg/p.rego (cannot overwrite existing file):\n- p.rego\n";
        assert!(rendered.contains(expected));
        assert!(!rendered.contains("Many to one"));
    }

    #[test]
    fn roots_render_in_discovery_order() {
        let mut ledger = FixLedger::new();
        ledger.add_file_fix("/z/a.rego", &result("use-assignment-operator", "/z"));
        ledger.add_file_fix("/a/a.rego", &result("use-assignment-operator", "/a"));

        let rendered = PrettyReporter::new().render(&ledger);
        let z = rendered.find("in /z:").unwrap();
        let a = rendered.find("in /a:").unwrap();
        assert!(z < a);
        assert!(rendered.contains("1 fix applied in /z:\na.rego:\n- use-assignment-operator\n"));
    }

    #[test]
    fn report_writes_bytes() {
        let mut ledger = FixLedger::new();
        ledger.add_file_fix("/w/a.rego", &result("x", "/w"));
        let mut buf = Vec::new();
        PrettyReporter::new().report(&ledger, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "1 fix applied in /w:\na.rego:\n- x\n");
    }
}
