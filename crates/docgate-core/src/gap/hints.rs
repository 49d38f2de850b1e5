//! Implementation Hint Finder.
//!
//! Best-effort search of the tooling manifest for files that reference the
//! command. Hints are candidates to cite, not claims; only the evidence
//! verifier decides whether a cited pointer holds.

use tracing::debug;

use crate::manifest::{ManifestEntry, ToolingManifest};
use crate::spec::CommandSpec;

/// Searches a manifest for files that mention a command.
pub struct HintFinder<'a> {
    manifest: &'a ToolingManifest,
    limit: usize,
}

impl<'a> HintFinder<'a> {
    pub fn new(manifest: &'a ToolingManifest, limit: usize) -> Self {
        Self { manifest, limit }
    }

    /// Matching manifest paths, in manifest order, at most `limit` of them.
    pub fn find(&self, spec: &CommandSpec) -> Vec<String> {
        let needles = Needles::for_spec(spec);
        if needles.name.is_empty() {
            return Vec::new();
        }

        self.manifest
            .entries()
            .iter()
            .filter_map(|entry| {
                needles.match_reason(entry).map(|reason| {
                    debug!(path = %entry.path, reason, "Implementation hint");
                    entry.path.clone()
                })
            })
            .take(self.limit)
            .collect()
    }
}

/// Find implementation hints with an explicit cap.
pub fn find_implementation_hints(
    spec: &CommandSpec,
    manifest: &ToolingManifest,
    limit: usize,
) -> Vec<String> {
    HintFinder::new(manifest, limit).find(spec)
}

struct Needles {
    name: String,
    quoted_names: Vec<String>,
    invocation: String,
    qualified: Option<String>,
    source_path: String,
}

impl Needles {
    fn for_spec(spec: &CommandSpec) -> Self {
        let name = spec.command.name.trim().to_string();
        let group = spec.command.group.trim();
        Self {
            quoted_names: ['\'', '"', '`']
                .iter()
                .map(|q| format!("{q}{name}{q}"))
                .collect(),
            invocation: spec.command.invocation(),
            qualified: (!group.is_empty()).then(|| format!("{}:{}", group, name)),
            source_path: spec.derived_from.trim().to_string(),
            name,
        }
    }

    fn match_reason(&self, entry: &ManifestEntry) -> Option<&'static str> {
        let path = entry.path.as_str();

        if self.path_names_command(path) {
            return Some("path names the command");
        }

        let content = entry.content.as_str();
        if !self.source_path.is_empty() && content.contains(&self.source_path) {
            return Some("content cites the source document");
        }
        if content.contains(&self.invocation) {
            return Some("content contains the invocation");
        }
        if let Some(qualified) = &self.qualified {
            if content.contains(qualified.as_str()) {
                return Some("content contains group:name");
            }
        }
        if self.quoted_names.iter().any(|q| content.contains(q.as_str())) {
            return Some("content contains the quoted name");
        }

        None
    }

    fn path_names_command(&self, path: &str) -> bool {
        path.split('/').any(|segment| {
            let stem = segment.split('.').next().unwrap_or(segment);
            stem == self.name
        })
    }
}
