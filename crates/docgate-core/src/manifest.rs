//! Tooling manifest: a read-only index of external source files.
//!
//! The manifest is passed explicitly into the gap analyzer and hint finder.
//! It is loaded once per run and never mutated.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Directories never indexed when walking a tree.
const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", "target", "dist", ".workflow"];

/// Errors that can occur when loading a manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read manifest input {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One indexed source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the manifest root, `/`-separated
    pub path: String,

    pub content: String,
}

impl ManifestEntry {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    root: Option<String>,
    files: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    path: String,
    #[serde(default)]
    content: Option<String>,
}

/// Enumerable, searchable index of tooling source files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolingManifest {
    entries: Vec<ManifestEntry>,
}

impl ToolingManifest {
    pub fn from_entries(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    /// Load from a directory (walked) or a JSON index file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::from_dir(path)
        } else {
            Self::from_json_file(path)
        }
    }

    /// Load a JSON index. Entries without inline content are read from
    /// `root`, which defaults to the index file's directory.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ManifestFile =
            serde_json::from_str(&contents).map_err(|source| ManifestError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let root = match file.root.as_deref() {
            Some(r) => base.join(r),
            None => base.to_path_buf(),
        };

        let mut entries = Vec::with_capacity(file.files.len());
        for raw in file.files {
            let content = match raw.content {
                Some(c) => c,
                None => {
                    let full = root.join(&raw.path);
                    fs::read_to_string(&full)
                        .map_err(|source| ManifestError::Io { path: full, source })?
                }
            };
            entries.push(ManifestEntry::new(raw.path, content));
        }

        debug!(manifest = %path.display(), entries = entries.len(), "Loaded tooling manifest");
        Ok(Self { entries })
    }

    /// Index every UTF-8 file under `root`, in sorted path order.
    pub fn from_dir(root: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let root = root.as_ref();
        let mut files = Vec::new();
        collect_files(root, &mut files)?;
        files.sort();

        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            let bytes = fs::read(&file).map_err(|source| ManifestError::Io {
                path: file.clone(),
                source,
            })?;
            let Ok(content) = String::from_utf8(bytes) else {
                debug!(file = %file.display(), "Skipping non-UTF-8 file");
                continue;
            };
            let rel = file.strip_prefix(root).unwrap_or(&file);
            entries.push(ManifestEntry::new(
                rel.to_string_lossy().replace('\\', "/"),
                content,
            ));
        }

        debug!(root = %root.display(), entries = entries.len(), "Indexed tooling tree");
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.path == path)
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ManifestError> {
    let read = fs::read_dir(dir).map_err(|source| ManifestError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in read {
        let entry = entry.map_err(|source| ManifestError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|source| ManifestError::Io {
            path: path.clone(),
            source,
        })?;

        if file_type.is_dir() {
            let name = entry.file_name();
            if SKIPPED_DIRS.iter().any(|s| name == *s) {
                continue;
            }
            collect_files(&path, out)?;
        } else if file_type.is_file() {
            out.push(path);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_dir_sorted_and_relative() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/commands")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("src/commands/plan.ts"), "export const plan = 1;").unwrap();
        fs::write(dir.path().join("src/cli.ts"), "program.command('plan')").unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "ignored").unwrap();
        fs::write(dir.path().join("logo.bin"), [0xff, 0xfe, 0x00]).unwrap();

        let manifest = ToolingManifest::from_dir(dir.path()).unwrap();
        let paths: Vec<_> = manifest.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["src/cli.ts", "src/commands/plan.ts"]);
    }

    #[test]
    fn test_from_json_inline_and_rooted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("repo/src")).unwrap();
        fs::write(dir.path().join("repo/src/a.ts"), "const a = 'plan';").unwrap();
        let index = dir.path().join("manifest.json");
        fs::write(
            &index,
            r#"{"root": "repo", "files": [
                {"path": "src/a.ts"},
                {"path": "src/b.ts", "content": "inline"}
            ]}"#,
        )
        .unwrap();

        let manifest = ToolingManifest::load(&index).unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.get("src/a.ts").unwrap().content, "const a = 'plan';");
        assert_eq!(manifest.get("src/b.ts").unwrap().content, "inline");
    }

    #[test]
    fn test_missing_referenced_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("manifest.json");
        fs::write(&index, r#"{"files": [{"path": "gone.ts"}]}"#).unwrap();

        let err = ToolingManifest::load(&index).unwrap_err();
        assert!(err.to_string().contains("gone.ts"));
    }

    #[test]
    fn test_bad_json_reports_file() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("manifest.json");
        fs::write(&index, "{not json").unwrap();
        let err = ToolingManifest::load(&index).unwrap_err();
        assert!(matches!(err, ManifestError::Json { .. }));
    }
}
