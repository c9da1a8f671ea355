//! Moving files to match their package declaration.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use super::{require_options, FixCandidate, FixError, FixResult, Fixer, Rename, RuntimeOptions};
use crate::text::ContentHash;

fn package_regex() -> &'static Regex {
    static PACKAGE: OnceLock<Regex> = OnceLock::new();
    PACKAGE.get_or_init(|| {
        Regex::new(r#"(?m)^[ \t]*package[ \t]+([A-Za-z_][\w.]*(?:\["[^"]*"\][\w.]*)*)"#)
            .expect("package pattern is valid")
    })
}

/// Split a package reference such as `a.b["c-d"].e` into its segments.
pub(crate) fn package_segments(reference: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = reference.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '.' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            '[' if chars.peek() == Some(&'"') => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                chars.next();
                let quoted: String = chars.by_ref().take_while(|&c| c != '"').collect();
                segments.push(quoted);
                // closing bracket
                chars.next();
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Moves a file to `<base_dir>/<package segments>/<file name>`.
///
/// Diagnostic locations are irrelevant; the whole file is judged by its
/// `package` declaration. Files without one are left alone.
#[derive(Debug, Clone, Copy)]
pub struct DirectoryPackageMismatch {
    /// Treat `foo_test` as living next to package `foo`.
    pub exclude_test_suffix: bool,
}

impl Default for DirectoryPackageMismatch {
    fn default() -> Self {
        DirectoryPackageMismatch {
            exclude_test_suffix: true,
        }
    }
}

impl DirectoryPackageMismatch {
    /// Where `candidate` should live, if it declares a package.
    pub fn expected_path(&self, candidate: &FixCandidate, base_dir: &str) -> Option<PathBuf> {
        let captures = package_regex().captures(&candidate.contents)?;
        let mut segments = package_segments(captures.get(1)?.as_str());

        if self.exclude_test_suffix {
            if let Some(last) = segments.last_mut() {
                if let Some(stripped) = last.strip_suffix("_test") {
                    *last = stripped.to_string();
                }
            }
        }
        segments.retain(|segment| !segment.is_empty());

        let file_name = Path::new(&candidate.filename).file_name()?;
        let mut expected = PathBuf::from(base_dir);
        expected.extend(&segments);
        expected.push(file_name);
        Some(expected)
    }
}

impl Fixer for DirectoryPackageMismatch {
    fn name(&self) -> &'static str {
        "directory-package-mismatch"
    }

    fn fix(
        &self,
        candidate: &FixCandidate,
        options: Option<&RuntimeOptions>,
    ) -> Result<Vec<FixResult>, FixError> {
        let options = require_options(self, options)?;

        let Some(expected) = self.expected_path(candidate, &options.base_dir) else {
            return Ok(Vec::new());
        };
        if expected == Path::new(&candidate.filename) {
            return Ok(Vec::new());
        }

        Ok(vec![FixResult {
            title: self.name().to_string(),
            root: options.base_dir.clone(),
            contents: candidate.contents.clone(),
            rename: Some(Rename {
                from: candidate.filename.clone(),
                to: expected.to_string_lossy().into_owned(),
            }),
            source_hash: ContentHash::compute(&candidate.contents),
        }])
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(filename: &str, contents: &str) -> Vec<FixResult> {
        let options = RuntimeOptions::new("/root", vec![]);
        DirectoryPackageMismatch::default()
            .fix(&FixCandidate::new(filename, contents), Some(&options))
            .unwrap()
    }

    mod segments {
        use super::*;

        #[test]
        fn dotted_reference() {
            assert_eq!(package_segments("authz.users"), vec!["authz", "users"]);
        }

        #[test]
        fn bracketed_segments() {
            assert_eq!(
                package_segments(r#"acme["http-api"].v1"#),
                vec!["acme", "http-api", "v1"]
            );
        }
    }

    mod moves {
        use super::*;

        #[test]
        fn misplaced_file_is_renamed() {
            let results = fix("/root/policy.rego", "package authz.users\n\nallow := true\n");
            assert_eq!(results.len(), 1);
            let rename = results[0].rename.as_ref().unwrap();
            assert_eq!(rename.from, "/root/policy.rego");
            assert_eq!(
                Path::new(&rename.to),
                Path::new("/root/authz/users/policy.rego")
            );
            assert_eq!(results[0].contents, "package authz.users\n\nallow := true\n");
            assert_eq!(results[0].title, "directory-package-mismatch");
        }

        #[test]
        fn file_in_place_is_left_alone() {
            assert!(fix("/root/authz/users/policy.rego", "package authz.users\n").is_empty());
        }

        #[test]
        fn test_suffix_is_ignored() {
            assert!(fix("/root/authz/policy_test.rego", "package authz_test\n").is_empty());
        }

        #[test]
        fn test_suffix_kept_when_configured() {
            let fixer = DirectoryPackageMismatch {
                exclude_test_suffix: false,
            };
            let options = RuntimeOptions::new("/root", vec![]);
            let results = fixer
                .fix(
                    &FixCandidate::new("/root/authz/policy_test.rego", "package authz_test\n"),
                    Some(&options),
                )
                .unwrap();
            assert_eq!(
                Path::new(&results[0].rename.as_ref().unwrap().to),
                Path::new("/root/authz_test/policy_test.rego")
            );
        }

        #[test]
        fn missing_package_is_left_alone() {
            assert!(fix("/root/x.rego", "# no package here\n").is_empty());
        }

        #[test]
        fn comment_before_package_is_fine() {
            let results = fix("/root/x.rego", "# METADATA\n# title: x\npackage a.b\n");
            assert_eq!(
                Path::new(&results[0].rename.as_ref().unwrap().to),
                Path::new("/root/a/b/x.rego")
            );
        }
    }
}
