//! Cycle-scoped snapshot layout.
//!
//! ```text
//! <root>/<unit>/expected.md
//! <root>/<unit>/cycles/<cycle>/current.md
//! <root>/<unit>/cycles/<cycle>/diff.txt
//! ```

use std::path::{Path, PathBuf};

use super::GateRequest;

/// Snapshot file locations for one unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotLayout {
    unit_dir: PathBuf,
}

impl SnapshotLayout {
    pub fn new(root: impl AsRef<Path>, unit: &str) -> Self {
        Self {
            unit_dir: root.as_ref().join(sanitize_unit(unit)),
        }
    }

    pub fn unit_dir(&self) -> &Path {
        &self.unit_dir
    }

    /// Golden baseline shared across cycles.
    pub fn expected_path(&self) -> PathBuf {
        self.unit_dir.join("expected.md")
    }

    pub fn cycle_dir(&self, cycle: &str) -> PathBuf {
        self.unit_dir.join("cycles").join(sanitize_unit(cycle))
    }

    pub fn current_path(&self, cycle: &str) -> PathBuf {
        self.cycle_dir(cycle).join("current.md")
    }

    pub fn diff_path(&self, cycle: &str) -> PathBuf {
        self.cycle_dir(cycle).join("diff.txt")
    }

    /// Gate request for this unit in `cycle`.
    pub fn request(&self, cycle: &str, update_expected: bool) -> GateRequest {
        GateRequest {
            expected_path: self.expected_path(),
            current_path: self.current_path(cycle),
            diff_path: self.diff_path(cycle),
            update_expected,
        }
    }
}

/// Unit ids like `workflow:plan` become a single safe path segment.
fn sanitize_unit(unit: &str) -> String {
    let cleaned: String = unit
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '-',
            c if c.is_whitespace() => '-',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}
