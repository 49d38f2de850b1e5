//! Batch cycle runner.
//!
//! A cycle plan lists units of work. For each unit the runner derives the
//! spec, renders the outline, analyzes gaps against the reference and gates
//! the gap report against its snapshot baseline. A failure in one unit is
//! recorded and the remaining units still run.
//!
//! ```yaml
//! cycle: "2026-10-19"
//! out_root: out
//! tooling_manifest: tooling/
//! units:
//!   - id: workflow:plan
//!     source: .claude/commands/workflow/plan.md
//!     reference: docs/commands/workflow/plan.md
//!     enrichment: enrich/plan.yaml
//! ```
//!
//! Relative paths resolve against the plan file's directory. Unit paths are
//! kept as written so the gap report names them the same way in every cycle.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::config::HarnessConfig;
use crate::gap::{GapAnalyzer, ReportContext};
use crate::manifest::ToolingManifest;
use crate::outline::{OutlineEnrichment, OutlineRenderer};
use crate::snapshot::{enforce_gate, GateOutcome, SnapshotLayout};
use crate::spec::derive_spec_from_str;
use crate::HarnessError;

/// One unit of work in a cycle plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitPlan {
    /// Stable artifact identity
    pub id: String,
    pub source: PathBuf,
    pub reference: PathBuf,
    #[serde(default)]
    pub enrichment: Option<PathBuf>,
}

/// A cycle plan loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CyclePlan {
    pub cycle: String,
    pub out_root: PathBuf,
    pub tooling_manifest: PathBuf,
    pub units: Vec<UnitPlan>,
    /// Directory unit paths resolve against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl CyclePlan {
    /// Load a plan. Output and manifest paths are resolved against the plan's
    /// directory; unit paths resolve through [`CyclePlan::base_dir`].
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| HarnessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut plan: CyclePlan =
            serde_yaml::from_str(&text).map_err(|source| HarnessError::Plan {
                path: path.to_path_buf(),
                source,
            })?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        plan.out_root = base.join(&plan.out_root);
        plan.tooling_manifest = base.join(&plan.tooling_manifest);
        plan.base_dir = base.to_path_buf();
        Ok(plan)
    }
}

/// Artifacts written for one unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitArtifacts {
    pub spec: PathBuf,
    pub outline: PathBuf,
    pub gap_report: PathBuf,
}

/// What happened to one unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitStatus {
    Completed {
        p0: usize,
        p1: usize,
        gate: GateOutcome,
        artifacts: UnitArtifacts,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitOutcome {
    pub id: String,
    #[serde(flatten)]
    pub status: UnitStatus,
}

impl UnitOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, UnitStatus::Failed { .. })
    }

    pub fn is_regression(&self) -> bool {
        matches!(&self.status, UnitStatus::Completed { gate, .. } if gate.is_regression())
    }
}

/// Outcome of a whole cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSummary {
    pub cycle: String,
    pub units: Vec<UnitOutcome>,
}

impl CycleSummary {
    pub fn failed(&self) -> usize {
        self.units.iter().filter(|u| u.is_failed()).count()
    }

    pub fn regressed(&self) -> usize {
        self.units.iter().filter(|u| u.is_regression()).count()
    }

    /// No unit failed and no snapshot regressed.
    pub fn is_clean(&self) -> bool {
        self.failed() == 0 && self.regressed() == 0
    }
}

/// Runs units of one cycle.
pub struct CycleRunner<'a> {
    config: &'a HarnessConfig,
    manifest: &'a ToolingManifest,
    out_root: PathBuf,
    cycle: String,
    update_expected: bool,
    base_dir: PathBuf,
}

impl<'a> CycleRunner<'a> {
    pub fn new(
        config: &'a HarnessConfig,
        manifest: &'a ToolingManifest,
        out_root: impl Into<PathBuf>,
        cycle: impl Into<String>,
        update_expected: bool,
    ) -> Self {
        Self {
            config,
            manifest,
            out_root: out_root.into(),
            cycle: cycle.into(),
            update_expected,
            base_dir: PathBuf::new(),
        }
    }

    /// Resolve unit paths against `dir` instead of the working directory.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    fn read_unit_file(&self, relative: &Path) -> Result<String, HarnessError> {
        let path = self.base_dir.join(relative);
        fs::read_to_string(&path).map_err(|source| HarnessError::Io { path, source })
    }

    /// Run every unit; per-unit errors are captured, not propagated.
    pub fn run(&self, units: &[UnitPlan]) -> CycleSummary {
        let units = units
            .iter()
            .map(|unit| match self.run_unit(unit) {
                Ok(status) => UnitOutcome {
                    id: unit.id.clone(),
                    status,
                },
                Err(e) => {
                    error!(unit = %unit.id, error = %e, "Unit failed");
                    UnitOutcome {
                        id: unit.id.clone(),
                        status: UnitStatus::Failed {
                            error: e.to_string(),
                        },
                    }
                }
            })
            .collect();

        let summary = CycleSummary {
            cycle: self.cycle.clone(),
            units,
        };
        info!(
            cycle = %summary.cycle,
            units = summary.units.len(),
            failed = summary.failed(),
            regressed = summary.regressed(),
            "Cycle complete"
        );
        summary
    }

    /// derive -> render -> gap -> snapshot for one unit.
    pub fn run_unit(&self, unit: &UnitPlan) -> Result<UnitStatus, HarnessError> {
        let layout = SnapshotLayout::new(&self.out_root, &unit.id);
        let cycle_dir = layout.cycle_dir(&self.cycle);
        fs::create_dir_all(&cycle_dir).map_err(|source| HarnessError::Io {
            path: cycle_dir.clone(),
            source,
        })?;

        // The spec records the source as written in the plan.
        let source_text = self.read_unit_file(&unit.source)?;
        let spec = derive_spec_from_str(&source_text, &unit.source, self.config, Utc::now())?;
        let spec_path = cycle_dir.join("spec.json");
        spec.write_json_file(&spec_path)?;

        let enrichment = unit
            .enrichment
            .as_ref()
            .map(|path| OutlineEnrichment::from_yaml_file(self.base_dir.join(path)))
            .transpose()?;
        let outline = OutlineRenderer::new(self.config).render(&spec, enrichment.as_ref());
        let outline_path = cycle_dir.join("outline.md");
        write_text(&outline_path, &outline)?;

        let reference = self.read_unit_file(&unit.reference)?;
        let report =
            GapAnalyzer::new(self.config).analyze(&outline, &reference, &spec, self.manifest);
        let rendered = report.render_markdown(
            &spec,
            &ReportContext {
                candidate_path: format!("{}/outline.md", unit.id),
                reference_path: unit.reference.display().to_string(),
            },
            self.config,
        );
        let report_path = cycle_dir.join("gap-report.md");
        write_text(&report_path, &rendered)?;

        let request = layout.request(&self.cycle, self.update_expected);
        write_text(&request.current_path, &rendered)?;
        let gate = enforce_gate(&request, &self.config.diff_tool)?;

        Ok(UnitStatus::Completed {
            p0: report.p0.len(),
            p1: report.p1.len(),
            gate,
            artifacts: UnitArtifacts {
                spec: spec_path,
                outline: outline_path,
                gap_report: report_path,
            },
        })
    }
}

/// Load a plan, its manifest, and run the cycle.
pub fn run_cycle(
    plan_path: &Path,
    config: &HarnessConfig,
    update_expected: bool,
) -> Result<CycleSummary, HarnessError> {
    let plan = CyclePlan::from_yaml_file(plan_path)?;
    let manifest = ToolingManifest::load(&plan.tooling_manifest)?;
    info!(
        cycle = %plan.cycle,
        units = plan.units.len(),
        manifest_files = manifest.len(),
        "Starting cycle"
    );
    let runner = CycleRunner::new(config, &manifest, &plan.out_root, &plan.cycle, update_expected)
        .with_base_dir(&plan.base_dir);
    Ok(runner.run(&plan.units))
}

fn write_text(path: &Path, text: &str) -> Result<(), HarnessError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| HarnessError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, text).map_err(|source| HarnessError::Io {
        path: path.to_path_buf(),
        source,
    })
}
