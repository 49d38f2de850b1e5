//! Evidence verification against the live file system.
//!
//! Evidence rows are claims. The verifier checks each claim against the
//! actual files and reports every violation it finds in one pass; it never
//! stops at the first failure and never corrects or downgrades a row.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::HarnessConfig;
use crate::markdown::parse_headings;

use super::row::{
    parse_evidence_tables, EvidenceRef, EvidenceRow, EvidenceSource, EvidenceStatus,
};

/// Verify-column values that do not name a concrete step.
const EMPTY_VERIFY: &[&str] = &["", "-", "--", "—", "n/a", "na", "none"];

/// A single evidence violation. Every variant names the row and field.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvidenceIssue {
    #[error("no evidence table found")]
    NoEvidenceTable,

    #[error("line {line}: unparseable evidence row ({reason}): {text}")]
    UnparseableRow {
        line: usize,
        text: String,
        reason: String,
    },

    #[error("line {line} ({pointer}): status `{status}` must be exactly `Existing` or `Planned`")]
    InvalidStatus {
        line: usize,
        pointer: String,
        status: String,
    },

    #[error("line {line} ({pointer}): evidence column lacks a `{source_kind}:` reference")]
    MissingReference {
        line: usize,
        pointer: String,
        source_kind: &'static str,
    },

    #[error("line {line} ({pointer}): `{source_kind}:` reference has no {what}")]
    IncompleteReference {
        line: usize,
        pointer: String,
        source_kind: &'static str,
        what: &'static str,
    },

    #[error("line {line} ({pointer}): placeholder `{token}` in {column} column")]
    Placeholder {
        line: usize,
        pointer: String,
        column: &'static str,
        token: String,
    },

    #[error("line {line} ({pointer}): {field} path `{path}` does not exist")]
    PathNotFound {
        line: usize,
        pointer: String,
        field: &'static str,
        path: String,
    },

    #[error("line {line} ({pointer}): {field} path `{path}` could not be read: {reason}")]
    Unreadable {
        line: usize,
        pointer: String,
        field: &'static str,
        path: String,
        reason: String,
    },

    #[error("line {line} ({pointer}): heading `{heading}` not found in `{path}`")]
    HeadingNotFound {
        line: usize,
        pointer: String,
        path: String,
        heading: String,
    },

    #[error("line {line} ({pointer}): anchor `{anchor}` not found in `{path}`")]
    AnchorNotFound {
        line: usize,
        pointer: String,
        path: String,
        anchor: String,
    },

    #[error("line {line} ({pointer}): Planned row needs a concrete verify step")]
    MissingVerify { line: usize, pointer: String },
}

/// Errors that prevent verification from starting.
#[derive(Error, Debug)]
pub enum EvidenceError {
    #[error("Failed to read artifact {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Pass/fail verdict for one artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceVerdict {
    pub artifact: String,
    pub rows_checked: usize,
    pub issues: Vec<EvidenceIssue>,
}

impl EvidenceVerdict {
    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Validates evidence tables against files under a root directory.
pub struct EvidenceVerifier<'a> {
    root: PathBuf,
    config: &'a HarnessConfig,
}

impl<'a> EvidenceVerifier<'a> {
    /// Relative evidence paths resolve against `root`.
    pub fn new(root: impl Into<PathBuf>, config: &'a HarnessConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Verify an artifact file.
    pub fn verify_file(&self, artifact: &Path) -> Result<EvidenceVerdict, EvidenceError> {
        let text = fs::read_to_string(artifact).map_err(|source| EvidenceError::Io {
            path: artifact.to_path_buf(),
            source,
        })?;
        Ok(self.verify_text(&text, &artifact.display().to_string()))
    }

    /// Verify artifact text; `artifact` labels the verdict.
    pub fn verify_text(&self, text: &str, artifact: &str) -> EvidenceVerdict {
        let tables = parse_evidence_tables(text);
        let mut issues = Vec::new();

        if tables.tables == 0 {
            issues.push(EvidenceIssue::NoEvidenceTable);
        }

        for bad in &tables.malformed {
            issues.push(EvidenceIssue::UnparseableRow {
                line: bad.line,
                text: bad.text.clone(),
                reason: bad.reason.clone(),
            });
        }

        let mut cache = FileCache::default();
        for row in &tables.rows {
            self.validate_row(row, &mut cache, &mut issues);
        }

        for issue in &issues {
            warn!(artifact, %issue, "Evidence violation");
        }
        debug!(
            artifact,
            rows = tables.rows.len(),
            issues = issues.len(),
            "Evidence verification complete"
        );

        EvidenceVerdict {
            artifact: artifact.to_string(),
            rows_checked: tables.rows.len(),
            issues,
        }
    }

    /// Apply every rule to one row, appending all violations.
    fn validate_row(
        &self,
        row: &EvidenceRow,
        cache: &mut FileCache,
        issues: &mut Vec<EvidenceIssue>,
    ) {
        let line = row.line;
        let pointer = row.pointer.clone();

        if row.status.is_none() {
            issues.push(EvidenceIssue::InvalidStatus {
                line,
                pointer: pointer.clone(),
                status: row.status_text.clone(),
            });
        }

        for source in [EvidenceSource::Docs, EvidenceSource::Ts] {
            match row.reference(source) {
                None => issues.push(EvidenceIssue::MissingReference {
                    line,
                    pointer: pointer.clone(),
                    source_kind: source.prefix(),
                }),
                Some(r) => {
                    if r.path.is_empty() {
                        issues.push(EvidenceIssue::IncompleteReference {
                            line,
                            pointer: pointer.clone(),
                            source_kind: source.prefix(),
                            what: "path",
                        });
                    }
                    if r.fragment.is_empty() {
                        issues.push(EvidenceIssue::IncompleteReference {
                            line,
                            pointer: pointer.clone(),
                            source_kind: source.prefix(),
                            what: match source {
                                EvidenceSource::Docs => "heading",
                                EvidenceSource::Ts => "anchor",
                            },
                        });
                    }
                }
            }
        }

        let columns = [
            ("pointer", &row.pointer),
            ("evidence", &row.evidence),
            ("verify", &row.verify_command),
            ("notes", &row.note),
        ];
        for (column, value) in columns {
            if let Some(token) = self.config.find_placeholder(value) {
                issues.push(EvidenceIssue::Placeholder {
                    line,
                    pointer: pointer.clone(),
                    column,
                    token: token.to_string(),
                });
            }
        }

        match row.status {
            Some(EvidenceStatus::Existing) => self.validate_existing(row, cache, issues),
            Some(EvidenceStatus::Planned) => {
                let verify = row.verify_command.trim().trim_matches('`').trim();
                if EMPTY_VERIFY.contains(&verify.to_ascii_lowercase().as_str()) {
                    issues.push(EvidenceIssue::MissingVerify { line, pointer });
                }
            }
            None => {}
        }
    }

    fn validate_existing(
        &self,
        row: &EvidenceRow,
        cache: &mut FileCache,
        issues: &mut Vec<EvidenceIssue>,
    ) {
        let line = row.line;

        // A placeholder pointer is already reported above.
        if !row.pointer.is_empty() && self.config.find_placeholder(&row.pointer).is_none() {
            let pointer_path = pointer_path(&row.pointer);
            if !self.resolve(pointer_path).exists() {
                issues.push(EvidenceIssue::PathNotFound {
                    line,
                    pointer: row.pointer.clone(),
                    field: "pointer",
                    path: pointer_path.to_string(),
                });
            }
        }

        if let Some(docs) = self.checkable(row.docs_evidence.as_ref()) {
            match cache.headings(&self.resolve(&docs.path)) {
                Lookup::Missing => issues.push(EvidenceIssue::PathNotFound {
                    line,
                    pointer: row.pointer.clone(),
                    field: "docs",
                    path: docs.path.clone(),
                }),
                Lookup::Unreadable(reason) => issues.push(EvidenceIssue::Unreadable {
                    line,
                    pointer: row.pointer.clone(),
                    field: "docs",
                    path: docs.path.clone(),
                    reason,
                }),
                Lookup::Found(headings) => {
                    let wanted = heading_fragment(&docs.fragment);
                    if !headings.iter().any(|h| h == wanted) {
                        issues.push(EvidenceIssue::HeadingNotFound {
                            line,
                            pointer: row.pointer.clone(),
                            path: docs.path.clone(),
                            heading: wanted.to_string(),
                        });
                    }
                }
            }
        }

        if let Some(ts) = self.checkable(row.ts_evidence.as_ref()) {
            match cache.content(&self.resolve(&ts.path)) {
                Lookup::Missing => issues.push(EvidenceIssue::PathNotFound {
                    line,
                    pointer: row.pointer.clone(),
                    field: "ts",
                    path: ts.path.clone(),
                }),
                Lookup::Unreadable(reason) => issues.push(EvidenceIssue::Unreadable {
                    line,
                    pointer: row.pointer.clone(),
                    field: "ts",
                    path: ts.path.clone(),
                    reason,
                }),
                Lookup::Found(content) => {
                    if !content.contains(ts.fragment.as_str()) {
                        issues.push(EvidenceIssue::AnchorNotFound {
                            line,
                            pointer: row.pointer.clone(),
                            path: ts.path.clone(),
                            anchor: ts.fragment.clone(),
                        });
                    }
                }
            }
        }
    }

    /// A reference worth checking on disk: complete and placeholder-free.
    /// Incomplete or placeholder references are already reported.
    fn checkable<'r>(&self, reference: Option<&'r EvidenceRef>) -> Option<&'r EvidenceRef> {
        reference.filter(|r| {
            !r.path.is_empty()
                && !r.fragment.is_empty()
                && self.config.find_placeholder(&r.path).is_none()
                && self.config.find_placeholder(&r.fragment).is_none()
        })
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }
}

/// Strip a `#symbol` or `:line` suffix from a pointer.
fn pointer_path(pointer: &str) -> &str {
    let without_symbol = pointer.split('#').next().unwrap_or(pointer);
    let path = match without_symbol.rsplit_once(':') {
        Some((path, suffix))
            if !path.is_empty() && suffix.chars().all(|c| c.is_ascii_digit() || c == '-') =>
        {
            path
        }
        _ => without_symbol,
    };
    path.trim()
}

/// Heading fragments may be written with their `#` prefix.
fn heading_fragment(fragment: &str) -> &str {
    fragment.trim().trim_start_matches('#').trim()
}

/// Outcome of reading a referenced file.
enum Lookup<T> {
    Found(T),
    Missing,
    Unreadable(String),
}

/// Per-call cache of referenced file reads.
#[derive(Default)]
struct FileCache {
    contents: HashMap<PathBuf, Result<String, (bool, String)>>,
}

impl FileCache {
    fn load(&mut self, path: &Path) -> &Result<String, (bool, String)> {
        self.contents.entry(path.to_path_buf()).or_insert_with(|| {
            fs::read_to_string(path).map_err(|e| {
                let missing = e.kind() == std::io::ErrorKind::NotFound;
                (missing, e.to_string())
            })
        })
    }

    fn content(&mut self, path: &Path) -> Lookup<&str> {
        match self.load(path) {
            Ok(text) => Lookup::Found(text.as_str()),
            Err((true, _)) => Lookup::Missing,
            Err((false, reason)) => Lookup::Unreadable(reason.clone()),
        }
    }

    fn headings(&mut self, path: &Path) -> Lookup<Vec<String>> {
        match self.content(path) {
            Lookup::Found(text) => {
                Lookup::Found(parse_headings(text).into_iter().map(|h| h.text).collect())
            }
            Lookup::Missing => Lookup::Missing,
            Lookup::Unreadable(reason) => Lookup::Unreadable(reason),
        }
    }
}

/// Verify one artifact with default configuration.
pub fn verify_evidence(
    artifact: &Path,
    root: &Path,
    config: &HarnessConfig,
) -> Result<EvidenceVerdict, EvidenceError> {
    EvidenceVerifier::new(root, config).verify_file(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::EVIDENCE_TABLE_HEADER;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("docs")).unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(
            dir.path().join("docs/plan.md"),
            "# Plan\n\n## Usage\n\n```\n## Not A Heading\n```\n\n## Error Handling\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("src/plan.ts"),
            "export async function runPlan(args: string[]) {\n  program.command('plan');\n}\n",
        )
        .unwrap();
        dir
    }

    fn table(rows: &[&str]) -> String {
        let mut text = String::from(EVIDENCE_TABLE_HEADER);
        text.push_str("\n|---|---|---|---|---|\n");
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        text
    }

    fn verify(dir: &TempDir, text: &str) -> EvidenceVerdict {
        let config = HarnessConfig::default();
        EvidenceVerifier::new(dir.path(), &config).verify_text(text, "report.md")
    }

    #[test]
    fn test_valid_existing_row_passes() {
        let dir = fixture();
        let verdict = verify(
            &dir,
            &table(&["| `src/plan.ts` | Existing | docs: `docs/plan.md` / ## Usage<br>ts: `src/plan.ts` / `command('plan')` | `npm test` | |"]),
        );
        assert!(verdict.passed(), "{:?}", verdict.issues);
        assert_eq!(verdict.rows_checked, 1);
    }

    #[test]
    fn test_existing_with_missing_pointer_fails_planned_passes() {
        let dir = fixture();
        let evidence = "docs: `docs/plan.md` / Usage<br>ts: `src/plan.ts` / runPlan";

        let existing = verify(
            &dir,
            &table(&[&format!("| `src/missing.ts` | Existing | {} | `npm test` | |", evidence)]),
        );
        assert_eq!(existing.issues.len(), 1);
        assert!(matches!(
            &existing.issues[0],
            EvidenceIssue::PathNotFound { field: "pointer", path, .. } if path == "src/missing.ts"
        ));

        let planned = verify(
            &dir,
            &table(&[&format!("| `src/missing.ts` | Planned | {} | `npm test` | |", evidence)]),
        );
        assert!(planned.passed(), "{:?}", planned.issues);
    }

    #[test]
    fn test_placeholder_fails_even_when_well_formed() {
        let dir = fixture();
        let verdict = verify(
            &dir,
            &table(&["| `src/plan.ts` | Existing | docs: `docs/plan.md` / Usage<br>ts: `src/plan.ts` / runPlan TBD | `npm test` | |"]),
        );
        assert!(verdict
            .issues
            .iter()
            .any(|i| matches!(i, EvidenceIssue::Placeholder { column: "evidence", .. })));
    }

    #[test]
    fn test_placeholder_pointer_and_notes_are_reported() {
        let dir = fixture();
        let verdict = verify(
            &dir,
            &table(&[
                "| TBD | Existing | docs: `docs/plan.md` / Usage<br>ts: `src/plan.ts` / runPlan | run | TODO |",
            ]),
        );
        assert!(!verdict.passed());
        let columns: Vec<&str> = verdict
            .issues
            .iter()
            .filter_map(|i| match i {
                EvidenceIssue::Placeholder { column, .. } => Some(*column),
                _ => None,
            })
            .collect();
        assert_eq!(columns, vec!["pointer", "notes"]);
        // The placeholder pointer is not also reported as a missing path.
        assert!(!verdict
            .issues
            .iter()
            .any(|i| matches!(i, EvidenceIssue::PathNotFound { field: "pointer", .. })));
    }

    #[test]
    fn test_heading_must_be_real_heading() {
        let dir = fixture();
        let verdict = verify(
            &dir,
            &table(&["| `src/plan.ts` | Existing | docs: `docs/plan.md` / Not A Heading<br>ts: `src/plan.ts` / runPlan | `npm test` | |"]),
        );
        assert_eq!(verdict.issues.len(), 1);
        assert!(matches!(
            &verdict.issues[0],
            EvidenceIssue::HeadingNotFound { heading, .. } if heading == "Not A Heading"
        ));
    }

    #[test]
    fn test_anchor_is_literal_not_regex() {
        let dir = fixture();
        let verdict = verify(
            &dir,
            &table(&["| `src/plan.ts` | Existing | docs: `docs/plan.md` / Usage<br>ts: `src/plan.ts` / run.*Plan | `npm test` | |"]),
        );
        assert!(matches!(
            &verdict.issues[0],
            EvidenceIssue::AnchorNotFound { anchor, .. } if anchor == "run.*Plan"
        ));
    }

    #[test]
    fn test_missing_halves_and_bad_status() {
        let dir = fixture();
        let verdict = verify(&dir, &table(&["| `src/plan.ts` | Done | docs: `docs/plan.md` / Usage | `npm test` | |"]));
        let text: Vec<String> = verdict.issues.iter().map(|i| i.to_string()).collect();
        assert_eq!(verdict.issues.len(), 2, "{:?}", text);
        assert!(text[0].contains("status `Done`"));
        assert!(text[1].contains("`ts:` reference"));
        assert!(text.iter().all(|t| t.contains("line 3")));
    }

    #[test]
    fn test_planned_requires_verify_step() {
        let dir = fixture();
        let verdict = verify(
            &dir,
            &table(&["| `src/new.ts` | Planned | docs: `docs/plan.md` / Usage<br>ts: `src/new.ts` / newFn | N/A | |"]),
        );
        assert!(matches!(&verdict.issues[..], [EvidenceIssue::MissingVerify { .. }]));
    }

    #[test]
    fn test_full_pass_collects_all_rows() {
        let dir = fixture();
        let verdict = verify(
            &dir,
            &table(&[
                "| `a.ts` | Existing | docs: `docs/gone.md` / Usage<br>ts: `src/plan.ts` / runPlan | run | |",
                "| too | few |",
                "| `src/plan.ts` | Existing | docs: `docs/plan.md` / Usage<br>ts: `src/gone.ts` / x | TODO | |",
            ]),
        );
        // pointer + docs path on row 1, unparseable row 2, ts path + placeholder on row 3
        assert_eq!(verdict.issues.len(), 5, "{:?}", verdict.issues);
    }

    #[test]
    fn test_no_table_is_reported() {
        let dir = fixture();
        let verdict = verify(&dir, "# Just prose\n");
        assert_eq!(verdict.issues, vec![EvidenceIssue::NoEvidenceTable]);
    }

    #[test]
    fn test_verify_file_missing_artifact() {
        let config = HarnessConfig::default();
        let err = EvidenceVerifier::new(".", &config)
            .verify_file(Path::new("/nonexistent/report.md"))
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/report.md"));
    }

    #[test]
    fn test_pointer_path_suffixes() {
        assert_eq!(pointer_path("src/plan.ts:42"), "src/plan.ts");
        assert_eq!(pointer_path("src/plan.ts#runPlan"), "src/plan.ts");
        assert_eq!(pointer_path("src/plan.ts"), "src/plan.ts");
    }

    proptest! {
        #[test]
        fn every_row_is_accounted_for(n in 1usize..12) {
            let dir = fixture();
            let rows: Vec<String> = (0..n)
                .map(|i| format!("| `src/missing{}.ts` | Existing | docs: `docs/plan.md` / Usage<br>ts: `src/plan.ts` / runPlan | run | |", i))
                .collect();
            let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
            let verdict = verify(&dir, &table(&refs));
            prop_assert_eq!(verdict.rows_checked, n);
            prop_assert_eq!(verdict.issues.len(), n);
        }
    }
}
