//! The standard gap checks.

use std::collections::HashSet;

use crate::markdown::{DocumentOutline, Frontmatter, ParseOutcome};
use crate::spec::parse_tool_list;

use super::{GapCheck, GapFinding, GapInput};

fn header_of(outline: &DocumentOutline) -> Option<&Frontmatter> {
    match &outline.header {
        ParseOutcome::Parsed(header) => Some(header),
        ParseOutcome::Malformed { .. } => None,
    }
}

fn level2_headings(outline: &DocumentOutline) -> Vec<&str> {
    outline.headings_at(2).into_iter().map(str::trim).collect()
}

/// Required header keys must be present and non-empty.
pub struct FrontmatterCheck;

impl GapCheck for FrontmatterCheck {
    fn name(&self) -> &'static str {
        "frontmatter"
    }

    fn check(&self, input: &GapInput<'_>) -> Vec<GapFinding> {
        let mut findings = Vec::new();

        if let ParseOutcome::Malformed { line, reason } = &input.candidate.header {
            let at = line.map(|n| format!(" at line {}", n)).unwrap_or_default();
            findings.push(GapFinding::p0(
                self.name(),
                format!("candidate header block is malformed{}: {}", at, reason),
            ));
        }

        let header = header_of(input.candidate);
        for key in &input.config.required_frontmatter {
            if header.and_then(|h| h.get_nonempty(key)).is_none() {
                findings.push(GapFinding::p0(
                    self.name(),
                    format!("frontmatter field `{}` is missing or empty in the candidate", key),
                ));
            }
        }

        findings
    }
}

/// Candidate and reference must declare the same tools.
///
/// Only runs when the reference declares a non-empty tool list.
pub struct ToolSurfaceCheck;

impl GapCheck for ToolSurfaceCheck {
    fn name(&self) -> &'static str {
        "tool-surface"
    }

    fn check(&self, input: &GapInput<'_>) -> Vec<GapFinding> {
        let reference_tools = header_of(input.reference)
            .and_then(|h| h.get("allowed-tools"))
            .map(parse_tool_list)
            .unwrap_or_default();
        if reference_tools.is_empty() {
            return Vec::new();
        }

        let candidate_tools = header_of(input.candidate)
            .and_then(|h| h.get("allowed-tools"))
            .map(parse_tool_list)
            .unwrap_or_default();

        let reference_set: HashSet<&str> = reference_tools.iter().map(String::as_str).collect();
        let candidate_set: HashSet<&str> = candidate_tools.iter().map(String::as_str).collect();

        let missing = reference_tools
            .iter()
            .filter(|t| !candidate_set.contains(t.as_str()))
            .map(|t| {
                GapFinding::p0(
                    self.name(),
                    format!(
                        "tool `{}` is declared by the reference but missing from the candidate",
                        t
                    ),
                )
            });

        let extra = candidate_tools
            .iter()
            .filter(|t| !reference_set.contains(t.as_str()))
            .map(|t| {
                GapFinding::p0(
                    self.name(),
                    format!(
                        "tool `{}` is declared by the candidate but not by the reference",
                        t
                    ),
                )
            });

        missing.chain(extra).collect()
    }
}

/// The candidate's level-2 headings must include the required set.
pub struct RequiredSectionsCheck;

impl GapCheck for RequiredSectionsCheck {
    fn name(&self) -> &'static str {
        "required-sections"
    }

    fn check(&self, input: &GapInput<'_>) -> Vec<GapFinding> {
        let present: HashSet<&str> = level2_headings(input.candidate).into_iter().collect();

        input
            .config
            .required_sections
            .iter()
            .filter(|section| !present.contains(section.trim()))
            .map(|section| {
                GapFinding::p0(
                    self.name(),
                    format!(
                        "required section `## {}` is missing from the candidate",
                        section.trim()
                    ),
                )
            })
            .collect()
    }
}

/// Level-2 heading differences between candidate and reference.
pub struct StructuralDriftCheck;

impl GapCheck for StructuralDriftCheck {
    fn name(&self) -> &'static str {
        "structural-drift"
    }

    fn check(&self, input: &GapInput<'_>) -> Vec<GapFinding> {
        let candidate = level2_headings(input.candidate);
        let reference = level2_headings(input.reference);
        let candidate_set: HashSet<&str> = candidate.iter().copied().collect();
        let reference_set: HashSet<&str> = reference.iter().copied().collect();

        let mut findings = Vec::new();
        let mut reported = HashSet::new();

        for heading in &reference {
            if !candidate_set.contains(heading) && reported.insert(("dropped", *heading)) {
                findings.push(GapFinding::p1(
                    self.name(),
                    format!(
                        "dropped structure: reference section `## {}` is absent from the candidate",
                        heading
                    ),
                ));
            }
        }

        for heading in &candidate {
            if !reference_set.contains(heading) && reported.insert(("added", *heading)) {
                findings.push(GapFinding::p1(
                    self.name(),
                    format!(
                        "unexplained addition: candidate section `## {}` does not appear in the reference",
                        heading
                    ),
                ));
            }
        }

        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;
    use crate::gap::Priority;
    use crate::markdown::parse_document;

    fn run(check: &dyn GapCheck, candidate: &str, reference: &str) -> Vec<GapFinding> {
        let config = HarnessConfig::default();
        let candidate = parse_document(candidate);
        let reference = parse_document(reference);
        check.check(&GapInput {
            candidate: &candidate,
            reference: &reference,
            config: &config,
        })
    }

    #[test]
    fn test_frontmatter_missing_fields() {
        let findings = run(&FrontmatterCheck, "---\nname: plan\ndescription: \"\"\n---\n", "");
        let messages: Vec<_> = findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("`description`"));
        assert!(messages[1].contains("`allowed-tools`"));
        assert!(findings.iter().all(|f| f.priority == Priority::P0));
    }

    #[test]
    fn test_frontmatter_malformed_header() {
        let findings = run(&FrontmatterCheck, "---\nname: plan\n", "");
        assert!(findings[0].message.contains("malformed at line 1"));
    }

    #[test]
    fn test_reference_superset_reports_missing_tool() {
        let findings = run(
            &ToolSurfaceCheck,
            "---\nallowed-tools: Read\n---\n",
            "---\nallowed-tools: Read, Write, Bash(git:*)\n---\n",
        );
        let messages: Vec<_> = findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("`Write`"));
        assert!(messages[0].contains("missing from the candidate"));
        assert!(messages[1].contains("`Bash(git:*)`"));
        assert!(findings.iter().all(|f| f.priority == Priority::P0));
    }

    #[test]
    fn test_candidate_extra_tool_is_p0() {
        let findings = run(
            &ToolSurfaceCheck,
            "---\nallowed-tools: Read, Bash\n---\n",
            "---\nallowed-tools: Read\n---\n",
        );
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("`Bash` is declared by the candidate"));
    }

    #[test]
    fn test_tool_surface_skipped_without_reference_tools() {
        let findings = run(
            &ToolSurfaceCheck,
            "---\nallowed-tools: Bash\n---\n",
            "---\nname: x\n---\n",
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn test_required_sections() {
        let findings = run(
            &RequiredSectionsCheck,
            "## Overview\n## Usage\n### Error Handling\n## Execution Process \n",
            "",
        );
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("`## Error Handling`"));
    }

    #[test]
    fn test_structural_drift_both_directions() {
        let findings = run(
            &StructuralDriftCheck,
            "## Overview\n## Notes\n",
            "## Overview\n## Related Commands\n## Related Commands\n",
        );
        let messages: Vec<_> = findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].starts_with("dropped structure"));
        assert!(messages[0].contains("Related Commands"));
        assert!(messages[1].starts_with("unexplained addition") && messages[1].contains("Notes"));
        assert!(findings.iter().all(|f| f.priority == Priority::P1));
    }

    #[test]
    fn test_heading_comparison_is_case_sensitive() {
        let findings = run(&StructuralDriftCheck, "## overview\n", "## Overview\n");
        assert_eq!(findings.len(), 2);
    }
}
