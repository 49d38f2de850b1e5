//! Evidence table rows.
//!
//! An evidence table asserts that an implementation pointer exists (or is
//! planned), backed by two independent sources: a docs heading and a source
//! anchor. Rows are parsed per verification call and never persisted.
//!
//! ```text
//! | Pointer | Status | Evidence | Verify | Notes |
//! |---|---|---|---|---|
//! | `src/plan.ts` | Existing | docs: `docs/plan.md` / Usage<br>ts: `src/plan.ts` / runPlan | `npm test plan` | |
//! ```

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Header row written by the gap report renderer.
pub const EVIDENCE_TABLE_HEADER: &str = "| Pointer | Status | Evidence | Verify | Notes |";

/// Number of columns in an evidence row.
pub const EVIDENCE_COLUMNS: usize = 5;

lazy_static! {
    static ref TABLE_HEADER: Regex =
        Regex::new(r"(?i)^\s*\|\s*pointer\s*\|\s*status\s*\|").unwrap();
    static ref SEPARATOR_ROW: Regex =
        Regex::new(r"^\s*\|?\s*:?-{2,}:?\s*(\|\s*:?-{2,}:?\s*)*\|?\s*$").unwrap();
    static ref SEGMENT_SPLIT: Regex = Regex::new(r"(?i)<br\s*/?>|\s;\s").unwrap();
}

/// Claimed state of an implementation pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvidenceStatus {
    Existing,
    Planned,
}

impl EvidenceStatus {
    /// Exact, case-sensitive parse.
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "Existing" => Some(Self::Existing),
            "Planned" => Some(Self::Planned),
            _ => None,
        }
    }
}

/// Which of the two evidence sources a reference belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvidenceSource {
    /// `docs:` path plus heading
    Docs,
    /// `ts:` path plus anchor
    Ts,
}

impl EvidenceSource {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Docs => "docs",
            Self::Ts => "ts",
        }
    }
}

/// A `path / fragment` reference inside the evidence column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRef {
    pub path: String,

    /// Heading (docs) or anchor (ts)
    pub fragment: String,
}

impl EvidenceRef {
    /// Parse `` `path` / fragment `` or `path / fragment`.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();

        if let Some(rest) = text.strip_prefix('`') {
            if let Some(close) = rest.find('`') {
                let path = rest[..close].trim().to_string();
                let tail = rest[close + 1..].trim();
                let fragment = tail.strip_prefix('/').unwrap_or(tail);
                return Self {
                    path,
                    fragment: strip_backticks(fragment),
                };
            }
        }

        match text.split_once(" / ") {
            Some((path, fragment)) => Self {
                path: strip_backticks(path),
                fragment: strip_backticks(fragment),
            },
            None => Self {
                path: strip_backticks(text),
                fragment: String::new(),
            },
        }
    }
}

/// One parsed evidence table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRow {
    /// 1-based line in the artifact
    pub line: usize,

    pub pointer: String,

    /// Status cell as written
    pub status_text: String,

    /// `None` when the status cell is not exactly `Existing` or `Planned`
    pub status: Option<EvidenceStatus>,

    /// Raw evidence cell, checked for placeholders
    pub evidence: String,

    pub docs_evidence: Option<EvidenceRef>,

    pub ts_evidence: Option<EvidenceRef>,

    pub verify_command: String,

    pub note: String,
}

impl EvidenceRow {
    pub fn reference(&self, source: EvidenceSource) -> Option<&EvidenceRef> {
        match source {
            EvidenceSource::Docs => self.docs_evidence.as_ref(),
            EvidenceSource::Ts => self.ts_evidence.as_ref(),
        }
    }
}

/// A table row that could not be read as five columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MalformedRow {
    pub line: usize,
    pub text: String,
    pub reason: String,
}

/// All evidence rows found in one artifact.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvidenceTables {
    /// Number of evidence tables seen
    pub tables: usize,
    pub rows: Vec<EvidenceRow>,
    pub malformed: Vec<MalformedRow>,
}

/// Find every evidence table in `text` and parse its rows.
///
/// Tables inside fenced code blocks are ignored. Rows with the wrong column
/// count are returned in `malformed`, never dropped.
pub fn parse_evidence_tables(text: &str) -> EvidenceTables {
    let mut result = EvidenceTables::default();
    let mut in_fence = false;
    let mut in_table = false;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            in_table = false;
            continue;
        }
        if in_fence {
            continue;
        }

        if TABLE_HEADER.is_match(line) {
            result.tables += 1;
            in_table = true;
            continue;
        }

        if !in_table {
            continue;
        }
        if !trimmed.starts_with('|') {
            in_table = false;
            continue;
        }
        if SEPARATOR_ROW.is_match(line) {
            continue;
        }

        let cells = split_cells(trimmed);
        if cells.len() != EVIDENCE_COLUMNS {
            result.malformed.push(MalformedRow {
                line: line_no,
                text: trimmed.to_string(),
                reason: format!(
                    "expected {} columns, found {}",
                    EVIDENCE_COLUMNS,
                    cells.len()
                ),
            });
            continue;
        }

        result.rows.push(build_row(line_no, cells));
    }

    result
}

fn build_row(line: usize, cells: Vec<String>) -> EvidenceRow {
    let mut cells = cells.into_iter();
    let pointer = strip_backticks(&cells.next().unwrap_or_default());
    let status_text = cells.next().unwrap_or_default();
    let evidence = cells.next().unwrap_or_default();
    let verify_command = cells.next().unwrap_or_default();
    let note = cells.next().unwrap_or_default();

    let mut docs_evidence = None;
    let mut ts_evidence = None;
    for segment in SEGMENT_SPLIT.split(&evidence) {
        let segment = segment.trim();
        if let Some(rest) = strip_prefix_ci(segment, "docs:") {
            docs_evidence.get_or_insert_with(|| EvidenceRef::parse(rest));
        } else if let Some(rest) = strip_prefix_ci(segment, "ts:") {
            ts_evidence.get_or_insert_with(|| EvidenceRef::parse(rest));
        }
    }

    EvidenceRow {
        line,
        pointer,
        status: EvidenceStatus::parse(&status_text),
        status_text,
        evidence,
        docs_evidence,
        ts_evidence,
        verify_command,
        note,
    }
}

/// Split a table row on unescaped pipes, trimming each cell.
fn split_cells(row: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = row.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    cells.push(current);

    // Leading and trailing pipes produce empty outer cells.
    if cells.first().map(|c| c.trim().is_empty()) == Some(true) {
        cells.remove(0);
    }
    if row.trim_end().ends_with('|') && !row.trim_end().ends_with("\\|") {
        cells.pop();
    }

    cells.into_iter().map(|c| c.trim().to_string()).collect()
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

fn strip_backticks(text: &str) -> String {
    let text = text.trim();
    text.strip_prefix('`')
        .and_then(|t| t.strip_suffix('`'))
        .unwrap_or(text)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTIFACT: &str = r#"# Report

| Pointer | Status | Evidence | Verify | Notes |
|---|---|---|---|---|
| `src/plan.ts` | Existing | docs: `docs/plan.md` / Usage<br>ts: `src/plan.ts` / runPlan | `npm test` | ok |
|  src/later.ts  |  Planned  | docs: docs/plan.md / Future Work ; ts: src/later.ts / laterFn | add test |   |
| broken | row |

Trailing prose.
"#;

    #[test]
    fn test_parse_rows_and_malformed() {
        let tables = parse_evidence_tables(ARTIFACT);
        assert_eq!(tables.tables, 1);
        assert_eq!(tables.rows.len(), 2);
        assert_eq!(tables.malformed.len(), 1);
        assert_eq!(tables.malformed[0].line, 7);
        assert!(tables.malformed[0].reason.contains("found 2"));

        let first = &tables.rows[0];
        assert_eq!(first.line, 5);
        assert_eq!(first.pointer, "src/plan.ts");
        assert_eq!(first.status, Some(EvidenceStatus::Existing));
        assert_eq!(
            first.docs_evidence,
            Some(EvidenceRef {
                path: "docs/plan.md".into(),
                fragment: "Usage".into()
            })
        );
        assert_eq!(first.ts_evidence.as_ref().unwrap().fragment, "runPlan");
        assert_eq!(first.verify_command, "`npm test`");

        let second = &tables.rows[1];
        assert_eq!(second.pointer, "src/later.ts");
        assert_eq!(second.status, Some(EvidenceStatus::Planned));
        assert_eq!(second.docs_evidence.as_ref().unwrap().fragment, "Future Work");
        assert_eq!(second.ts_evidence.as_ref().unwrap().path, "src/later.ts");
    }

    #[test]
    fn test_status_is_exact() {
        assert_eq!(EvidenceStatus::parse("Existing"), Some(EvidenceStatus::Existing));
        assert_eq!(EvidenceStatus::parse("existing"), None);
        assert_eq!(EvidenceStatus::parse("Done"), None);
    }

    #[test]
    fn test_escaped_pipe_stays_in_cell() {
        let text = "| Pointer | Status | Evidence | Verify | Notes |\n|---|---|---|---|---|\n| a | Planned | ts: `a.ts` / x \\| y | run | n |\n";
        let tables = parse_evidence_tables(text);
        assert_eq!(tables.rows.len(), 1);
        assert_eq!(tables.rows[0].ts_evidence.as_ref().unwrap().fragment, "x | y");
    }

    #[test]
    fn test_tables_in_fences_are_ignored() {
        let text = "```\n| Pointer | Status | Evidence | Verify | Notes |\n| x | y |\n```\n";
        let tables = parse_evidence_tables(text);
        assert_eq!(tables.tables, 0);
        assert!(tables.malformed.is_empty());
    }

    #[test]
    fn test_other_tables_are_ignored() {
        let text = "| Name | Value |\n|---|---|\n| a | b |\n";
        let tables = parse_evidence_tables(text);
        assert_eq!(tables.tables, 0);
        assert!(tables.rows.is_empty());
    }

    #[test]
    fn test_evidence_ref_without_fragment() {
        let r = EvidenceRef::parse("docs/plan.md");
        assert_eq!(r.path, "docs/plan.md");
        assert!(r.fragment.is_empty());
    }
}
