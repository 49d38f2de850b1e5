//! Harness configuration.
//!
//! Every knob has a default, so running without a config file is the common
//! case. A YAML file overrides only the fields it names.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// External line-diff tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiffToolConfig {
    /// Executable to run (e.g., "git")
    pub program: String,

    /// Arguments placed before the two file paths
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for DiffToolConfig {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
            args: vec![
                "diff".to_string(),
                "--no-index".to_string(),
                "--no-color".to_string(),
                "--".to_string(),
            ],
        }
    }
}

/// Configuration shared by every harness component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HarnessConfig {
    /// Path markers under which the first segment names the command group
    pub corpus_roots: Vec<String>,

    /// Tool pair substituted when a source declares no tools
    pub default_tools: Vec<String>,

    /// Tokens that mark unfinished content
    pub placeholder_tokens: Vec<String>,

    /// Marker the renderer writes into empty sections
    pub placeholder_marker: String,

    /// Level-2 headings every candidate must carry
    pub required_sections: Vec<String>,

    /// Header keys every candidate must fill
    pub required_frontmatter: Vec<String>,

    /// Maximum number of implementation hints
    pub hint_limit: usize,

    /// Preferred diff tool for the snapshot gate
    pub diff_tool: DiffToolConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            corpus_roots: vec![".claude/commands".to_string(), "commands".to_string()],
            default_tools: vec!["Read".to_string(), "Grep".to_string()],
            placeholder_tokens: vec![
                "TBD".to_string(),
                "TODO".to_string(),
                "FIXME".to_string(),
                "<placeholder>".to_string(),
            ],
            placeholder_marker: "TBD".to_string(),
            required_sections: vec![
                "Overview".to_string(),
                "Usage".to_string(),
                "Execution Process".to_string(),
                "Error Handling".to_string(),
            ],
            required_frontmatter: vec![
                "name".to_string(),
                "description".to_string(),
                "allowed-tools".to_string(),
            ],
            hint_limit: 10,
            diff_tool: DiffToolConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: HarnessConfig =
            serde_yaml::from_str(yaml).map_err(|source| ConfigError::Yaml {
                path: origin.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents, path)
    }

    /// Load from an optional path, falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_yaml_file(p),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_tools.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "default_tools".to_string(),
                reason: "must name at least one tool".to_string(),
            });
        }

        if self.placeholder_marker.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "placeholder_marker".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        if self.hint_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "hint_limit".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.diff_tool.program.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "diff_tool.program".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Whether `text` contains any configured placeholder token.
    pub fn find_placeholder<'a>(&'a self, text: &str) -> Option<&'a str> {
        self.placeholder_tokens
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.placeholder_marker.as_str()))
            .filter(|token| !token.is_empty())
            .find(|token| text.contains(token))
    }
}
