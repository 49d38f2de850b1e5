//! Line-scanning parser for document headers and heading outlines.
//!
//! Documents start with an optional `---` delimited block of `key: value`
//! pairs, followed by a markdown body. Only the header fields and the heading
//! lines are ever extracted; body prose is skipped.
//!
//! The parser never fails. It returns a [`ParseOutcome`] so that each caller
//! decides whether a malformed header is fatal or has a safe default.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

const HEADER_DELIM: &str = "---";
const HEADER_END_ALT: &str = "...";

lazy_static! {
    static ref HEADER_KEY: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").unwrap();
}

/// Result of parsing a structural block.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome<T> {
    Parsed(T),
    Malformed {
        /// 1-based line number, when the problem has one
        line: Option<usize>,
        reason: String,
    },
}

impl<T> ParseOutcome<T> {
    pub fn malformed(line: Option<usize>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            line,
            reason: reason.into(),
        }
    }

    /// Discard the failure reason.
    pub fn parsed(self) -> Option<T> {
        match self {
            Self::Parsed(v) => Some(v),
            Self::Malformed { .. } => None,
        }
    }
}

/// Ordered key/value pairs from a document header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    fields: Vec<(String, String)>,
}

impl Frontmatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field. Later declarations win.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self
            .fields
            .iter_mut()
            .find(|(k, _)| normalize_key(k) == normalize_key(&key))
        {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Look up a field; `-` and `_` in keys are interchangeable.
    pub fn get(&self, key: &str) -> Option<&str> {
        let wanted = normalize_key(key);
        self.fields
            .iter()
            .find(|(k, _)| normalize_key(k) == wanted)
            .map(|(_, v)| v.as_str())
    }

    /// Look up a field, treating blank values as absent.
    pub fn get_nonempty(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }
}

/// A markdown heading: `## Usage` is level 2, text "Usage".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

impl Heading {
    pub fn new(level: u8, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// Structural view of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOutline {
    pub header: ParseOutcome<Frontmatter>,
    pub headings: Vec<Heading>,
}

impl DocumentOutline {
    /// Heading texts at one level, in document order.
    pub fn headings_at(&self, level: u8) -> Vec<&str> {
        self.headings
            .iter()
            .filter(|h| h.level == level)
            .map(|h| h.text.as_str())
            .collect()
    }

    /// Whether `text` is a heading of the document at any level.
    pub fn has_heading(&self, text: &str) -> bool {
        let wanted = text.trim();
        self.headings.iter().any(|h| h.text == wanted)
    }
}

/// Parse a document's header block and heading outline.
pub fn parse_document(text: &str) -> DocumentOutline {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let lines: Vec<&str> = text.lines().collect();

    let (header, body_start) = parse_header(&lines);
    let headings = extract_headings(&lines[body_start.min(lines.len())..]);

    DocumentOutline { header, headings }
}

/// Parse only the heading outline of a document.
pub fn parse_headings(text: &str) -> Vec<Heading> {
    parse_document(text).headings
}

fn parse_header(lines: &[&str]) -> (ParseOutcome<Frontmatter>, usize) {
    if lines.first().map(|l| l.trim_end()) != Some(HEADER_DELIM) {
        return (ParseOutcome::Parsed(Frontmatter::new()), 0);
    }

    let Some(end) = lines
        .iter()
        .skip(1)
        .position(|l| matches!(l.trim_end(), HEADER_DELIM | HEADER_END_ALT))
        .map(|i| i + 1)
    else {
        // Without a closing delimiter the header swallows the whole file.
        return (
            ParseOutcome::malformed(Some(1), "header block opened with `---` is never closed"),
            1,
        );
    };

    let mut frontmatter = Frontmatter::new();
    let mut last_key: Option<String> = None;

    for (idx, raw) in lines[1..end].iter().enumerate() {
        let line_no = idx + 2;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(item) = trimmed.strip_prefix("- ") {
            // YAML-style list item continuing the previous key.
            let Some(key) = last_key.as_deref() else {
                return (
                    ParseOutcome::malformed(Some(line_no), "list item without a preceding key"),
                    end + 1,
                );
            };
            let item = unquote(item.trim());
            let merged = match frontmatter.get(key) {
                Some(existing) if !existing.trim().is_empty() => format!("{existing}, {item}"),
                _ => item,
            };
            frontmatter.insert(key.to_string(), merged);
            continue;
        }

        let Some((key, value)) = split_key_value(raw) else {
            return (
                ParseOutcome::malformed(
                    Some(line_no),
                    format!("expected `key: value`, found `{}`", trimmed),
                ),
                end + 1,
            );
        };

        frontmatter.insert(key, unquote(value.trim()));
        last_key = Some(key.to_string());
    }

    (ParseOutcome::Parsed(frontmatter), end + 1)
}

fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if !HEADER_KEY.is_match(key) {
        return None;
    }
    Some((key, value))
}

fn extract_headings(lines: &[&str]) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut fence: Option<&str> = None;

    for line in lines {
        let trimmed = line.trim_start();
        let marker = if trimmed.starts_with("```") {
            Some("```")
        } else if trimmed.starts_with("~~~") {
            Some("~~~")
        } else {
            None
        };

        match (fence, marker) {
            (None, Some(m)) => {
                fence = Some(m);
                continue;
            }
            (Some(open), Some(m)) if open == m => {
                fence = None;
                continue;
            }
            (Some(_), _) => continue,
            (None, None) => {}
        }

        if let Some((level, text)) = parse_heading_line(line) {
            if !text.is_empty() {
                headings.push(Heading::new(level, text));
            }
        }
    }

    headings
}

/// Parse one ATX heading line into (level, trimmed text).
pub fn parse_heading_line(line: &str) -> Option<(u8, String)> {
    let bytes = line.as_bytes();
    let mut count = 0usize;
    while count < bytes.len() && bytes[count] == b'#' {
        count += 1;
    }
    if count == 0 || count > 6 {
        return None;
    }
    if let Some(next) = bytes.get(count) {
        if !next.is_ascii_whitespace() {
            return None;
        }
    }

    let rest = line[count..].trim();
    // Closing sequence: "## Usage ##"
    let text = match rest.trim_end_matches('#') {
        stripped
            if stripped.len() < rest.len() && (stripped.is_empty() || stripped.ends_with(' ')) =>
        {
            stripped.trim_end()
        }
        _ => rest,
    };

    Some((count as u8, text.to_string()))
}

/// Remove surrounding quotes, unescaping `\"` and `\\` inside double quotes.
pub fn unquote(value: &str) -> String {
    let value = value.trim();
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some(next @ ('"' | '\\')) => out.push(next),
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => out.push('\\'),
                }
            } else {
                out.push(c);
            }
        }
        return out;
    }
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].replace("''", "'");
    }
    value.to_string()
}

/// Render a header value as a double-quoted string safe to embed.
pub fn quote_header_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' | '\r' => out.push(' '),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_lowercase().replace('_', "-")
}
