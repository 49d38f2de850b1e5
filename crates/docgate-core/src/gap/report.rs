//! Gap report aggregation and rendering.
//!
//! The rendered artifact always carries the same six sections. Its evidence
//! table is seeded from the implementation hints with `Planned` rows whose
//! unknown fields hold the placeholder marker, so the evidence verifier
//! rejects the report until someone fills them in.

use serde::{Deserialize, Serialize};

use crate::config::HarnessConfig;
use crate::evidence::EVIDENCE_TABLE_HEADER;
use crate::spec::CommandSpec;

use super::{GapFinding, Priority};

/// Prioritized gaps plus candidate implementation pointers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapReport {
    pub p0: Vec<String>,
    pub p1: Vec<String>,
    pub implementation_hints: Vec<String>,
}

/// Paths shown in the Reference section.
#[derive(Debug, Clone, Default)]
pub struct ReportContext {
    pub candidate_path: String,
    pub reference_path: String,
}

impl GapReport {
    /// Fan-in: split findings by priority, preserving check order.
    pub fn from_findings(findings: Vec<GapFinding>, implementation_hints: Vec<String>) -> Self {
        let mut report = Self {
            implementation_hints,
            ..Default::default()
        };
        for finding in findings {
            match finding.priority {
                Priority::P0 => report.p0.push(finding.message),
                Priority::P1 => report.p1.push(finding.message),
            }
        }
        report
    }

    /// No blocking gaps.
    pub fn is_clean(&self) -> bool {
        self.p0.is_empty()
    }

    /// Render the gap report artifact.
    pub fn render_markdown(
        &self,
        spec: &CommandSpec,
        context: &ReportContext,
        config: &HarnessConfig,
    ) -> String {
        let marker = &config.placeholder_marker;
        let mut out = String::new();

        out.push_str(&format!("# Gap Report: {}\n", spec.command.invocation()));

        out.push_str("\n## Reference\n\n");
        out.push_str(&format!("- Reference: `{}`\n", context.reference_path));
        out.push_str(&format!("- Candidate: `{}`\n", context.candidate_path));
        out.push_str(&format!("- Spec source: `{}`\n", spec.derived_from));

        out.push_str("\n## P0 Gaps\n\n");
        push_list(&mut out, &self.p0);

        out.push_str("\n## P1 Gaps\n\n");
        push_list(&mut out, &self.p1);

        out.push_str("\n## Implementation Pointers Evidence\n\n");
        out.push_str(EVIDENCE_TABLE_HEADER);
        out.push('\n');
        out.push_str("|---|---|---|---|---|\n");
        for hint in &self.implementation_hints {
            out.push_str(&format!(
                "| `{hint}` | Planned | docs: `{reference}` / {marker}<br>ts: `{hint}` / {marker} | {marker} | candidate from tooling manifest |\n",
                hint = escape_cell(hint),
                reference = escape_cell(&context.reference_path),
                marker = marker,
            ));
        }

        out.push_str("\n## Implementation Hints\n\n");
        let hints: Vec<String> = self
            .implementation_hints
            .iter()
            .map(|h| format!("`{}`", h))
            .collect();
        push_list(&mut out, &hints);

        out.push_str("\n## Proposed Fix Plan\n\n");
        let steps: Vec<String> = self
            .p0
            .iter()
            .map(|m| format!("[P0] {}", m))
            .chain(self.p1.iter().map(|m| format!("[P1] {}", m)))
            .collect();
        if steps.is_empty() {
            out.push_str("No changes required.\n");
        } else {
            for (i, step) in steps.iter().enumerate() {
                out.push_str(&format!("{}. {}\n", i + 1, step));
            }
        }

        out
    }
}

fn push_list(out: &mut String, items: &[String]) {
    if items.is_empty() {
        out.push_str("None.\n");
        return;
    }
    for item in items {
        out.push_str(&format!("- {}\n", item));
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::parse_evidence_tables;
    use crate::markdown::parse_document;
    use crate::spec::derive_spec_from_str;
    use chrono::{TimeZone, Utc};
    use std::path::Path;

    fn spec() -> CommandSpec {
        derive_spec_from_str(
            "---\nname: plan\n---\n",
            Path::new(".claude/commands/workflow/plan.md"),
            &HarnessConfig::default(),
            Utc.timestamp_opt(0, 0).unwrap(),
        )
        .unwrap()
    }

    fn context() -> ReportContext {
        ReportContext {
            candidate_path: "out/outline.md".to_string(),
            reference_path: "docs/commands/workflow/plan.md".to_string(),
        }
    }

    #[test]
    fn test_from_findings_splits_priorities() {
        let report = GapReport::from_findings(
            vec![
                GapFinding::p1("drift", "b"),
                GapFinding::p0("sections", "a"),
                GapFinding::p0("tools", "c"),
            ],
            vec![],
        );
        assert_eq!(report.p0, vec!["a", "c"]);
        assert_eq!(report.p1, vec!["b"]);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_render_has_fixed_sections() {
        let report = GapReport::default();
        let text = report.render_markdown(&spec(), &context(), &HarnessConfig::default());
        let outline = parse_document(&text);
        assert_eq!(
            outline.headings_at(2),
            vec![
                "Reference",
                "P0 Gaps",
                "P1 Gaps",
                "Implementation Pointers Evidence",
                "Implementation Hints",
                "Proposed Fix Plan"
            ]
        );
        assert!(text.contains("No changes required."));
    }

    #[test]
    fn test_seeded_rows_parse_as_planned() {
        let report = GapReport {
            p0: vec!["required section `## Error Handling` is missing from the candidate".into()],
            p1: vec![],
            implementation_hints: vec!["src/commands/plan.ts".into()],
        };
        let text = report.render_markdown(&spec(), &context(), &HarnessConfig::default());
        assert!(text.contains("1. [P0] required section"));

        let tables = parse_evidence_tables(&text);
        assert_eq!(tables.rows.len(), 1);
        assert!(tables.malformed.is_empty());
        let row = &tables.rows[0];
        assert_eq!(row.pointer, "src/commands/plan.ts");
        assert_eq!(row.ts_evidence.as_ref().unwrap().path, "src/commands/plan.ts");
    }
}
