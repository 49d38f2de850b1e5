//! Pluggable diff strategies.
//!
//! The preferred strategy shells out to a line-oriented diff tool. When the
//! tool is missing or exits with anything other than "identical" (0) or
//! "differ" (1), the content-hash strategy takes over so a divergence is
//! always recorded.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::DiffToolConfig;

/// A diff strategy failed. Always recovered by falling back.
#[derive(Error, Debug)]
pub enum DiffToolError {
    #[error("Failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with status {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of comparing two files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffOutcome {
    pub equal: bool,
    pub diff_text: String,
}

/// A way of rendering the difference between two files.
pub trait DiffStrategy: Send + Sync {
    /// Short name written into diff records.
    fn name(&self) -> &str;

    fn diff(&self, expected: &Path, current: &Path) -> Result<DiffOutcome, DiffToolError>;
}

/// Invokes an external diff program on the two paths.
pub struct ExternalDiffStrategy {
    tool: DiffToolConfig,
    name: String,
}

impl ExternalDiffStrategy {
    pub fn new(tool: DiffToolConfig) -> Self {
        let name = std::iter::once(tool.program.as_str())
            .chain(tool.args.iter().map(String::as_str).take_while(|a| !a.starts_with('-')))
            .collect::<Vec<_>>()
            .join(" ");
        Self { tool, name }
    }

    /// Whether the program can be launched at all.
    pub fn is_available(&self) -> bool {
        Command::new(&self.tool.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

impl DiffStrategy for ExternalDiffStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn diff(&self, expected: &Path, current: &Path) -> Result<DiffOutcome, DiffToolError> {
        let output = Command::new(&self.tool.program)
            .args(&self.tool.args)
            .arg(expected)
            .arg(current)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| DiffToolError::Launch {
                program: self.tool.program.clone(),
                source,
            })?;

        let diff_text = String::from_utf8_lossy(&output.stdout).into_owned();
        match output.status.code() {
            Some(0) => Ok(DiffOutcome {
                equal: true,
                diff_text,
            }),
            Some(1) => Ok(DiffOutcome {
                equal: false,
                diff_text,
            }),
            _ => Err(DiffToolError::Failed {
                program: self.tool.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }
}

/// Deterministic report of both hashes plus raw before and after text.
pub struct HashDiffStrategy;

impl HashDiffStrategy {
    pub const NAME: &'static str = "content-hash";
}

impl DiffStrategy for HashDiffStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn diff(&self, expected: &Path, current: &Path) -> Result<DiffOutcome, DiffToolError> {
        let before = read(expected)?;
        let after = read(current)?;
        Ok(hash_diff(&before, &after))
    }
}

fn read(path: &Path) -> Result<String, DiffToolError> {
    fs::read_to_string(path).map_err(|source| DiffToolError::Read {
        path: path.to_path_buf(),
        source,
    })
}

pub fn sha256_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Hash-based diff of two in-memory texts.
pub fn hash_diff(expected: &str, current: &str) -> DiffOutcome {
    let equal = expected == current;
    let mut diff_text = String::new();
    if !equal {
        diff_text.push_str(&format!("expected sha256: {}\n", sha256_hex(expected)));
        diff_text.push_str(&format!("current sha256:  {}\n", sha256_hex(current)));
        diff_text.push_str("--- expected\n");
        diff_text.push_str(expected);
        if !expected.ends_with('\n') {
            diff_text.push('\n');
        }
        diff_text.push_str("+++ current\n");
        diff_text.push_str(current);
        if !current.ends_with('\n') {
            diff_text.push('\n');
        }
    }
    DiffOutcome { equal, diff_text }
}

/// Pick the external tool when it can be launched, else the hash fallback.
pub fn select_strategy(tool: &DiffToolConfig) -> Box<dyn DiffStrategy> {
    let external = ExternalDiffStrategy::new(tool.clone());
    if external.is_available() {
        debug!(strategy = external.name(), "Using external diff tool");
        Box::new(external)
    } else {
        warn!(
            program = %tool.program,
            "Diff tool unavailable, using content-hash fallback"
        );
        Box::new(HashDiffStrategy)
    }
}

/// Diff two files with `strategy`, falling back to hashes on tool failure.
///
/// Returns the outcome and the name of the strategy that produced it.
pub fn compute_diff_with(
    strategy: &dyn DiffStrategy,
    expected: &Path,
    current: &Path,
) -> Result<(DiffOutcome, String), DiffToolError> {
    match strategy.diff(expected, current) {
        Ok(outcome) => Ok((outcome, strategy.name().to_string())),
        Err(err) => {
            warn!(
                strategy = strategy.name(),
                error = %err,
                "Diff strategy failed, using content-hash fallback"
            );
            let outcome = HashDiffStrategy.diff(expected, current)?;
            Ok((outcome, HashDiffStrategy::NAME.to_string()))
        }
    }
}

/// Diff two files with the configured tool.
pub fn compute_diff(
    expected: &Path,
    current: &Path,
    tool: &DiffToolConfig,
) -> Result<DiffOutcome, DiffToolError> {
    let strategy = select_strategy(tool);
    compute_diff_with(strategy.as_ref(), expected, current).map(|(outcome, _)| outcome)
}
