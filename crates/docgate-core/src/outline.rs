//! Outline Renderer: expands a command spec into a fixed section skeleton.
//!
//! Every section is always emitted. Structural checks downstream test heading
//! presence, so a section with nothing to say carries the placeholder marker
//! instead of disappearing.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::config::{ConfigError, HarnessConfig};
use crate::markdown::quote_header_value;
use crate::spec::CommandSpec;

/// Level-2 sections of every outline, in order.
pub const OUTLINE_SECTIONS: [&str; 8] = [
    "Overview",
    "Usage",
    "Inputs",
    "Outputs / Artifacts",
    "Implementation Pointers",
    "Execution Process",
    "Error Handling",
    "Examples",
];

/// Generation-time content for outline sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineEnrichment {
    pub overview: Option<String>,
    pub usage: Option<String>,
    pub inputs: Option<String>,
    pub outputs: Option<String>,
    pub code_pointers: Vec<String>,
    pub execution_process: Option<String>,
    pub error_handling: Option<String>,
    pub examples: Option<String>,
}

impl OutlineEnrichment {
    /// Load enrichment from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Renders outlines with a fixed placeholder marker.
pub struct OutlineRenderer<'a> {
    config: &'a HarnessConfig,
}

impl<'a> OutlineRenderer<'a> {
    pub fn new(config: &'a HarnessConfig) -> Self {
        Self { config }
    }

    /// Render the header block and all sections.
    pub fn render(&self, spec: &CommandSpec, enrichment: Option<&OutlineEnrichment>) -> String {
        let empty = OutlineEnrichment::default();
        let extra = enrichment.unwrap_or(&empty);
        let command = &spec.command;
        let invocation = command.invocation();

        let mut out = String::new();
        self.render_header(spec, &mut out);
        out.push_str(&format!("\n# {}\n", invocation));

        let overview = extra
            .overview
            .clone()
            .or_else(|| non_empty(&command.description).map(str::to_string));
        self.section(&mut out, OUTLINE_SECTIONS[0], overview.as_deref());

        let usage_line = match non_empty(&command.argument_hint) {
            Some(hint) => format!("{} {}", invocation, hint),
            None => invocation.clone(),
        };
        let mut usage = format!("```\n{}\n```", usage_line);
        if let Some(text) = extra.usage.as_deref().and_then(non_empty) {
            usage.push_str("\n\n");
            usage.push_str(text);
        }
        self.section(&mut out, OUTLINE_SECTIONS[1], Some(&usage));

        let inputs = extra.inputs.clone().or_else(|| {
            non_empty(&command.argument_hint).map(|hint| format!("- Arguments: `{}`", hint))
        });
        self.section(&mut out, OUTLINE_SECTIONS[2], inputs.as_deref());

        self.section(&mut out, OUTLINE_SECTIONS[3], extra.outputs.as_deref());

        let pointers = self.code_pointers(spec, extra);
        self.section(&mut out, OUTLINE_SECTIONS[4], pointers.as_deref());

        self.section(&mut out, OUTLINE_SECTIONS[5], extra.execution_process.as_deref());
        self.section(&mut out, OUTLINE_SECTIONS[6], extra.error_handling.as_deref());
        self.section(&mut out, OUTLINE_SECTIONS[7], extra.examples.as_deref());

        out
    }

    fn render_header(&self, spec: &CommandSpec, out: &mut String) {
        let command = &spec.command;
        out.push_str("---\n");
        out.push_str(&format!("name: {}\n", quote_header_value(&command.name)));
        out.push_str(&format!(
            "description: {}\n",
            quote_header_value(&command.description)
        ));
        if !command.argument_hint.is_empty() {
            out.push_str(&format!(
                "argument-hint: {}\n",
                quote_header_value(&command.argument_hint)
            ));
        }
        out.push_str(&format!(
            "allowed-tools: {}\n",
            quote_header_value(&command.allowed_tools.join(", "))
        ));
        if !command.group.is_empty() {
            out.push_str(&format!("group: {}\n", quote_header_value(&command.group)));
        }
        out.push_str("---\n");
    }

    fn code_pointers(&self, spec: &CommandSpec, extra: &OutlineEnrichment) -> Option<String> {
        let mut seen = std::collections::HashSet::new();
        let lines: Vec<String> = spec
            .implementation
            .code_pointers
            .iter()
            .chain(extra.code_pointers.iter())
            .map(|p| p.trim())
            .filter(|p| !p.is_empty() && seen.insert(p.to_string()))
            .map(|p| format!("- `{}`", p))
            .collect();

        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }

    fn section(&self, out: &mut String, title: &str, body: Option<&str>) {
        out.push_str(&format!("\n## {}\n\n", title));
        match body.and_then(non_empty) {
            Some(text) => out.push_str(text.trim_end()),
            None => out.push_str(&self.config.placeholder_marker),
        }
        out.push('\n');
    }
}

/// Render an outline with default enrichment.
pub fn render_outline(spec: &CommandSpec, config: &HarnessConfig) -> String {
    OutlineRenderer::new(config).render(spec, None)
}

fn non_empty(s: &str) -> Option<&str> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
