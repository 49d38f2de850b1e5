//! # docgate-core
//!
//! Deterministic verification harness for generated command documentation.
//!
//! The harness never generates content. It answers:
//! - What is the structural spec of a source document?
//! - What skeleton must a generated artifact have?
//! - How does a candidate differ from its reference and its last snapshot?
//! - Do the evidence claims in a report hold on disk?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces same output (timestamps aside)
//! 2. **Non-leaky**: A derived spec carries header fields and heading text only
//! 3. **Traceable**: Every finding names the file, row, or field it concerns
//! 4. **Complete**: Evidence verification reports every violation in one pass
//!
//! ## Example
//!
//! ```rust,ignore
//! use docgate_core::{derive_spec, render_outline, analyze_gaps, HarnessConfig, ToolingManifest};
//!
//! let config = HarnessConfig::default();
//! let spec = derive_spec(Path::new(".claude/commands/workflow/plan.md"), &config)?;
//! let outline = render_outline(&spec, &config);
//! let manifest = ToolingManifest::from_dir("tooling")?;
//! let report = analyze_gaps(&outline, &reference_text, &spec, &manifest, &config);
//!
//! for gap in &report.p0 {
//!     println!("P0: {}", gap);
//! }
//! ```

pub mod config;
pub mod evidence;
pub mod gap;
pub mod manifest;
pub mod markdown;
pub mod outline;
pub mod pipeline;
pub mod snapshot;
pub mod spec;

// Re-export main types at crate root
pub use config::{ConfigError, DiffToolConfig, HarnessConfig};
pub use evidence::{
    parse_evidence_tables, verify_evidence, EvidenceError, EvidenceIssue, EvidenceRow,
    EvidenceStatus, EvidenceVerdict, EvidenceVerifier,
};
pub use gap::{
    analyze_gaps, find_implementation_hints, GapAnalyzer, GapCheck, GapFinding, GapReport,
    Priority, ReportContext,
};
pub use manifest::{ManifestEntry, ManifestError, ToolingManifest};
pub use markdown::{parse_document, DocumentOutline, Frontmatter, Heading, ParseOutcome};
pub use outline::{render_outline, OutlineEnrichment, OutlineRenderer, OUTLINE_SECTIONS};
pub use pipeline::{run_cycle, CyclePlan, CycleRunner, CycleSummary, UnitOutcome, UnitStatus};
pub use snapshot::{
    compute_diff, enforce_gate, enforce_gate_with, DiffOutcome, DiffStrategy, GateOutcome,
    GateRequest, SnapshotError, SnapshotLayout,
};
pub use spec::{derive_spec, CommandSpec, SpecError};

use std::path::PathBuf;
use thiserror::Error;

/// Any error a harness operation can raise.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Evidence(#[from] EvidenceError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse cycle plan {}: {source}", .path.display())]
    Plan {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
