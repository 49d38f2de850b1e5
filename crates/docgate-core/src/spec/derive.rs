//! Command spec derivation from a source document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::config::HarnessConfig;
use crate::markdown::{parse_document, Heading, ParseOutcome};

use super::schema::validate_spec_schema;

/// Version of the spec file layout.
pub const COMMAND_SPEC_SCHEMA_VERSION: &str = "1.0";

/// Errors that can occur when deriving or loading a command spec.
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed header in {} ({}): {reason}", .path.display(), describe_line(.line))]
    Malformed {
        path: PathBuf,
        line: Option<usize>,
        reason: String,
    },

    #[error("Missing required header field `{field}` in {}", .path.display())]
    MissingField { path: PathBuf, field: String },

    #[error("Failed to parse spec JSON {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Spec file {} violates schema: {}", .path.display(), .errors.join("; "))]
    Schema { path: PathBuf, errors: Vec<String> },
}

fn describe_line(line: &Option<usize>) -> String {
    match line {
        Some(n) => format!("line {}", n),
        None => "unknown line".to_string(),
    }
}

/// Identity and tool surface of a command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandIdentity {
    /// Command group; empty when neither declared nor inferable
    pub group: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub argument_hint: String,

    /// Ordered, de-duplicated, never empty
    pub allowed_tools: Vec<String>,
}

impl CommandIdentity {
    /// `/group:name` when a group is set, else `/name`.
    pub fn invocation(&self) -> String {
        if self.group.is_empty() {
            format!("/{}", self.name)
        } else {
            format!("/{}:{}", self.group, self.name)
        }
    }
}

/// Where the command is documented and implemented.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Implementation {
    pub command_doc: String,

    #[serde(default)]
    pub code_pointers: Vec<String>,
}

/// Structural hints: the heading outline, never the prose.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StructureHints {
    pub headings: Vec<Heading>,
}

/// Canonical structural specification of one command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandSpec {
    pub schema_version: String,

    /// Source document path
    pub derived_from: String,

    pub created_at: DateTime<Utc>,

    pub command: CommandIdentity,

    pub implementation: Implementation,

    pub structure_hints: StructureHints,
}

impl CommandSpec {
    /// Serialize as pretty JSON with a trailing newline.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }

    /// Write the spec file, creating parent directories.
    pub fn write_json_file(&self, path: impl AsRef<Path>) -> Result<(), SpecError> {
        let path = path.as_ref();
        let text = self.to_json_pretty().map_err(|source| SpecError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| SpecError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, text).map_err(|source| SpecError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a spec file, validating it against the schema first.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SpecError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| SpecError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents, path)
    }

    /// Parse spec JSON; `origin` names the file in errors.
    pub fn from_json(json: &str, origin: &Path) -> Result<Self, SpecError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|source| SpecError::Json {
                path: origin.to_path_buf(),
                source,
            })?;

        validate_spec_schema(&value).map_err(|errors| SpecError::Schema {
            path: origin.to_path_buf(),
            errors,
        })?;

        serde_json::from_value(value).map_err(|source| SpecError::Json {
            path: origin.to_path_buf(),
            source,
        })
    }
}

/// Derive a spec from a source document on disk.
pub fn derive_spec(source: &Path, config: &HarnessConfig) -> Result<CommandSpec, SpecError> {
    derive_spec_at(source, config, Utc::now())
}

/// Derive a spec with an explicit creation time.
pub fn derive_spec_at(
    source: &Path,
    config: &HarnessConfig,
    created_at: DateTime<Utc>,
) -> Result<CommandSpec, SpecError> {
    let text = fs::read_to_string(source).map_err(|e| SpecError::Io {
        path: source.to_path_buf(),
        source: e,
    })?;
    derive_spec_from_str(&text, source, config, created_at)
}

/// Derive a spec from document text. `source` is recorded, never read.
pub fn derive_spec_from_str(
    text: &str,
    source: &Path,
    config: &HarnessConfig,
    created_at: DateTime<Utc>,
) -> Result<CommandSpec, SpecError> {
    let outline = parse_document(text);

    let header = match outline.header {
        ParseOutcome::Parsed(header) => header,
        ParseOutcome::Malformed { line, reason } => {
            return Err(SpecError::Malformed {
                path: source.to_path_buf(),
                line,
                reason,
            });
        }
    };

    let name = header
        .get_nonempty("name")
        .ok_or_else(|| SpecError::MissingField {
            path: source.to_path_buf(),
            field: "name".to_string(),
        })?
        .to_string();

    let derived_from = normalize_path(source);

    let group = match header.get_nonempty("group") {
        Some(explicit) => explicit.to_string(),
        None => infer_group(&derived_from, &config.corpus_roots).unwrap_or_default(),
    };

    let allowed_tools = resolve_allowed_tools(header.get("allowed-tools"), &config.default_tools);

    debug!(
        source = %derived_from,
        name = %name,
        group = %group,
        tools = allowed_tools.len(),
        headings = outline.headings.len(),
        "Derived command spec"
    );

    Ok(CommandSpec {
        schema_version: COMMAND_SPEC_SCHEMA_VERSION.to_string(),
        derived_from: derived_from.clone(),
        created_at,
        command: CommandIdentity {
            group,
            name,
            description: header.get_nonempty("description").unwrap_or_default().to_string(),
            argument_hint: header.get_nonempty("argument-hint").unwrap_or_default().to_string(),
            allowed_tools,
        },
        implementation: Implementation {
            command_doc: derived_from,
            code_pointers: Vec::new(),
        },
        structure_hints: StructureHints {
            headings: outline.headings,
        },
    })
}

/// Take the first directory beneath a known corpus root as the group.
///
/// `.claude/commands/workflow/plan.md` yields `workflow`; a file directly
/// under the root has no group.
pub fn infer_group(path: &str, corpus_roots: &[String]) -> Option<String> {
    for root in corpus_roots {
        let root = root.trim_matches('/');
        if root.is_empty() {
            continue;
        }
        let marker = format!("{}/", root);

        let rest = if let Some(rest) = path.strip_prefix(&marker) {
            Some(rest)
        } else {
            path.find(&format!("/{}", marker))
                .map(|idx| &path[idx + marker.len() + 1..])
        };

        if let Some((segment, _)) = rest.and_then(|r| r.split_once('/')) {
            if !segment.is_empty() {
                return Some(segment.to_string());
            }
        }
    }
    None
}

/// Parse a declared tool list, substituting `defaults` when nothing remains.
pub fn resolve_allowed_tools(declared: Option<&str>, defaults: &[String]) -> Vec<String> {
    let tools = declared.map(parse_tool_list).unwrap_or_default();
    if tools.is_empty() {
        return dedup_preserving_order(
            defaults
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        );
    }
    tools
}

/// Split a comma-separated tool list into trimmed, non-empty tokens.
///
/// Commas inside parentheses belong to the tool (`Bash(git add:*, git rm:*)`),
/// and a surrounding `[...]` is accepted.
pub fn parse_tool_list(value: &str) -> Vec<String> {
    let value = value.trim();
    let value = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .unwrap_or(value);

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in value.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => tokens.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    tokens.push(current);

    dedup_preserving_order(
        tokens
            .into_iter()
            .map(|t| crate::markdown::unquote(t.trim()))
            .filter(|t| !t.is_empty()),
    )
}

fn dedup_preserving_order(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.filter(|item| seen.insert(item.clone())).collect()
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
