//! Gap Analyzer: compares a candidate artifact against its reference.
//!
//! Each check asks one structural question and evaluates independently:
//!
//! | Check | Question | Priority |
//! |-------|----------|----------|
//! | [`FrontmatterCheck`] | Are the required header fields filled? | P0 |
//! | [`ToolSurfaceCheck`] | Does the tool surface match the reference? | P0 |
//! | [`RequiredSectionsCheck`] | Are the mandatory sections present? | P0 |
//! | [`StructuralDriftCheck`] | Which sections were dropped or added? | P1 |
//!
//! Findings are collected into a [`GapReport`]. Empty lists are a passing
//! result, never an error.

mod checks;
mod hints;
mod report;

pub use checks::{FrontmatterCheck, RequiredSectionsCheck, StructuralDriftCheck, ToolSurfaceCheck};
pub use hints::{find_implementation_hints, HintFinder};
pub use report::{GapReport, ReportContext};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::HarnessConfig;
use crate::manifest::ToolingManifest;
use crate::markdown::{parse_document, DocumentOutline};
use crate::spec::CommandSpec;

/// Severity of a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    /// Blocking: the candidate is structurally unacceptable
    P0,
    /// Advisory: drift that may be legitimate evolution
    P1,
}

/// A single finding from one check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapFinding {
    pub priority: Priority,
    pub check: String,
    pub message: String,
}

impl GapFinding {
    pub fn p0(check: &str, message: impl Into<String>) -> Self {
        Self {
            priority: Priority::P0,
            check: check.to_string(),
            message: message.into(),
        }
    }

    pub fn p1(check: &str, message: impl Into<String>) -> Self {
        Self {
            priority: Priority::P1,
            check: check.to_string(),
            message: message.into(),
        }
    }
}

/// Everything a check may look at.
pub struct GapInput<'a> {
    pub candidate: &'a DocumentOutline,
    pub reference: &'a DocumentOutline,
    pub config: &'a HarnessConfig,
}

/// Common interface for all gap checks.
pub trait GapCheck: Send + Sync {
    /// Stable check identifier used in findings.
    fn name(&self) -> &'static str;

    /// Evaluate the candidate. An empty result means no gaps.
    fn check(&self, input: &GapInput<'_>) -> Vec<GapFinding>;
}

/// Runs every check and the hint finder over one unit of work.
pub struct GapAnalyzer<'a> {
    config: &'a HarnessConfig,
    checks: Vec<Box<dyn GapCheck>>,
}

impl<'a> GapAnalyzer<'a> {
    /// Analyzer with the four standard checks.
    pub fn new(config: &'a HarnessConfig) -> Self {
        Self {
            config,
            checks: vec![
                Box::new(FrontmatterCheck),
                Box::new(ToolSurfaceCheck),
                Box::new(RequiredSectionsCheck),
                Box::new(StructuralDriftCheck),
            ],
        }
    }

    /// Analyzer with a caller-chosen set of checks.
    pub fn with_checks(config: &'a HarnessConfig, checks: Vec<Box<dyn GapCheck>>) -> Self {
        Self { config, checks }
    }

    /// Analyze candidate and reference document text.
    pub fn analyze(
        &self,
        candidate: &str,
        reference: &str,
        spec: &CommandSpec,
        manifest: &ToolingManifest,
    ) -> GapReport {
        let candidate = parse_document(candidate);
        let reference = parse_document(reference);
        self.analyze_outlines(&candidate, &reference, spec, manifest)
    }

    /// Analyze already-parsed documents.
    pub fn analyze_outlines(
        &self,
        candidate: &DocumentOutline,
        reference: &DocumentOutline,
        spec: &CommandSpec,
        manifest: &ToolingManifest,
    ) -> GapReport {
        let input = GapInput {
            candidate,
            reference,
            config: self.config,
        };

        let findings: Vec<GapFinding> = self
            .checks
            .iter()
            .flat_map(|check| check.check(&input))
            .collect();

        let hints = HintFinder::new(manifest, self.config.hint_limit).find(spec);
        let report = GapReport::from_findings(findings, hints);

        info!(
            command = %spec.command.invocation(),
            p0 = report.p0.len(),
            p1 = report.p1.len(),
            hints = report.implementation_hints.len(),
            "Gap analysis complete"
        );

        report
    }
}

/// Analyze with the standard checks.
pub fn analyze_gaps(
    candidate: &str,
    reference: &str,
    spec: &CommandSpec,
    manifest: &ToolingManifest,
    config: &HarnessConfig,
) -> GapReport {
    GapAnalyzer::new(config).analyze(candidate, reference, spec, manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestEntry;
    use crate::outline::render_outline;
    use crate::spec::derive_spec_from_str;
    use chrono::{TimeZone, Utc};
    use std::path::Path;

    const REFERENCE: &str = r#"---
name: plan
description: Plan a workflow session
allowed-tools: Task, Read, Write
---

# /workflow:plan

## Overview
## Usage
## Execution Process
## Error Handling
## Related Commands
"#;

    fn spec() -> CommandSpec {
        derive_spec_from_str(
            REFERENCE,
            Path::new(".claude/commands/workflow/plan.md"),
            &HarnessConfig::default(),
            Utc.timestamp_opt(0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_rendered_outline_against_own_reference() {
        let config = HarnessConfig::default();
        let spec = spec();
        let outline = render_outline(&spec, &config);
        let report = analyze_gaps(&outline, REFERENCE, &spec, &ToolingManifest::default(), &config);

        assert!(report.p0.is_empty(), "unexpected P0: {:?}", report.p0);
        assert!(report.p1.iter().any(|m| m.contains("Related Commands")));
        assert!(report.p1.iter().any(|m| m.contains("Inputs")));
    }

    #[test]
    fn test_missing_error_handling_is_p0() {
        let config = HarnessConfig::default();
        let spec = spec();
        let outline = render_outline(&spec, &config).replace("## Error Handling", "## Failures");
        let report = analyze_gaps(&outline, REFERENCE, &spec, &ToolingManifest::default(), &config);

        assert!(report.p0.iter().any(|m| m.contains("Error Handling")));
    }

    #[test]
    fn test_clean_result_is_empty_not_error() {
        let config = HarnessConfig::default();
        let manifest = ToolingManifest::default();
        let report = analyze_gaps(REFERENCE, REFERENCE, &spec(), &manifest, &config);
        assert!(report.is_clean());
        assert!(report.p1.is_empty());
    }

    #[test]
    fn test_hints_flow_into_report() {
        let config = HarnessConfig::default();
        let manifest = ToolingManifest::from_entries(vec![
            ManifestEntry::new("src/unrelated.ts", "nothing here"),
            ManifestEntry::new("src/commands/plan.ts", "export function run() {}"),
        ]);
        let report = analyze_gaps(REFERENCE, REFERENCE, &spec(), &manifest, &config);
        assert_eq!(report.implementation_hints, vec!["src/commands/plan.ts"]);
    }

    struct AlwaysP1;

    impl GapCheck for AlwaysP1 {
        fn name(&self) -> &'static str {
            "always"
        }

        fn check(&self, _input: &GapInput<'_>) -> Vec<GapFinding> {
            vec![GapFinding::p1(self.name(), "advisory")]
        }
    }

    #[test]
    fn test_custom_check_set() {
        let config = HarnessConfig::default();
        let analyzer = GapAnalyzer::with_checks(&config, vec![Box::new(AlwaysP1)]);
        let report = analyzer.analyze("", "", &spec(), &ToolingManifest::default());
        assert!(report.p0.is_empty());
        assert_eq!(report.p1, vec!["advisory"]);
    }
}
