//! Snapshot Gate.
//!
//! Compares a current artifact against its persisted expected baseline.
//!
//! - No baseline: the current text becomes the baseline (`initialized`).
//! - Identical: nothing is written.
//! - Divergent: a diff record is appended; the baseline is overwritten only
//!   when the caller asks to accept the new state.
//!
//! Equality is exact byte identity with no normalization.

mod diff;
mod layout;

pub use diff::{
    compute_diff, compute_diff_with, hash_diff, select_strategy, sha256_hex, DiffOutcome,
    DiffStrategy, DiffToolError, ExternalDiffStrategy, HashDiffStrategy,
};
pub use layout::SnapshotLayout;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::config::DiffToolConfig;

/// Snapshot I/O failure. Fatal for the unit of work.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot I/O failed for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SnapshotError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Paths for one gate evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateRequest {
    pub expected_path: PathBuf,
    pub current_path: PathBuf,
    pub diff_path: PathBuf,
    pub update_expected: bool,
}

/// What the gate observed and did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GateOutcome {
    pub initialized: bool,
    pub changed: bool,
    pub updated_expected: bool,
}

impl GateOutcome {
    /// Divergence that was not accepted.
    pub fn is_regression(&self) -> bool {
        self.changed && !self.updated_expected
    }
}

/// Run the gate, probing for the configured diff tool.
pub fn enforce_gate(
    request: &GateRequest,
    tool: &DiffToolConfig,
) -> Result<GateOutcome, SnapshotError> {
    let expected_exists = request.expected_path.exists();
    if expected_exists {
        let strategy = select_strategy(tool);
        enforce_gate_with(request, strategy.as_ref())
    } else {
        // No diff will be needed, so skip probing.
        enforce_gate_with(request, &HashDiffStrategy)
    }
}

/// Run the gate with an explicit diff strategy.
pub fn enforce_gate_with(
    request: &GateRequest,
    strategy: &dyn DiffStrategy,
) -> Result<GateOutcome, SnapshotError> {
    let current = fs::read_to_string(&request.current_path)
        .map_err(SnapshotError::io(&request.current_path))?;

    let expected = match fs::read_to_string(&request.expected_path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            write_replace(&request.expected_path, &current)?;
            info!(
                expected = %request.expected_path.display(),
                "Snapshot baseline initialized"
            );
            return Ok(GateOutcome {
                initialized: true,
                ..Default::default()
            });
        }
        Err(source) => {
            return Err(SnapshotError::Io {
                path: request.expected_path.clone(),
                source,
            })
        }
    };

    if expected == current {
        info!(expected = %request.expected_path.display(), "Snapshot unchanged");
        return Ok(GateOutcome::default());
    }

    let (outcome, strategy_name) =
        compute_diff_with(strategy, &request.expected_path, &request.current_path).map_err(
            |e| match e {
                DiffToolError::Read { path, source } => SnapshotError::Io { path, source },
                other => SnapshotError::Io {
                    path: request.diff_path.clone(),
                    source: std::io::Error::other(other.to_string()),
                },
            },
        )?;
    // The tool may normalize what exact comparison does not.
    let diff_text = if outcome.diff_text.trim().is_empty() {
        hash_diff(&expected, &current).diff_text
    } else {
        outcome.diff_text
    };
    append_diff_record(&request.diff_path, &strategy_name, &diff_text)?;

    if request.update_expected {
        write_replace(&request.expected_path, &current)?;
        info!(
            expected = %request.expected_path.display(),
            diff = %request.diff_path.display(),
            "Snapshot changed, baseline updated"
        );
    } else {
        info!(
            expected = %request.expected_path.display(),
            diff = %request.diff_path.display(),
            "Snapshot changed"
        );
    }

    Ok(GateOutcome {
        initialized: false,
        changed: true,
        updated_expected: request.update_expected,
    })
}

fn append_diff_record(path: &Path, strategy: &str, diff_text: &str) -> Result<(), SnapshotError> {
    ensure_parent(path)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(SnapshotError::io(path))?;

    let mut record = format!(
        "=== {} at {} ===\n",
        strategy,
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    record.push_str(diff_text);
    if !diff_text.ends_with('\n') {
        record.push('\n');
    }
    file.write_all(record.as_bytes()).map_err(SnapshotError::io(path))
}

/// Write to a sibling temp file, then rename over the target.
fn write_replace(path: &Path, contents: &str) -> Result<(), SnapshotError> {
    ensure_parent(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));
    fs::write(&tmp, contents).map_err(SnapshotError::io(&tmp))?;
    fs::rename(&tmp, path).map_err(SnapshotError::io(path))
}

fn ensure_parent(path: &Path) -> Result<(), SnapshotError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(SnapshotError::io(parent))
        }
        _ => Ok(()),
    }
}
