//! Help and version text, read from the `doc/purl.yaml` document.
//!
//! The document is a small YAML subset:
//!
//! ```text
//! VERSION: "0.1.0"
//! DESCRIPTION: >
//!   Folded text, joined into one line.
//! USAGE:
//!   - "purl [OPTIONS] URL"
//! ```
//!
//! `OPTIONS` and `EXAMPLES` are lists like `USAGE`. Other top-level keys are
//! ignored.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use regex::Regex;

const EMBEDDED_DOC: &str = include_str!("../doc/purl.yaml");
const DOC_FILE: &str = "purl.yaml";
const DEFAULT_DESCRIPTION: &str = "Transfer data from URLs";
const DEFAULT_USAGE: &str = "purl [OPTIONS] URL";

#[derive(Clone, Debug, PartialEq)]
pub struct AppDoc {
    pub version: String,
    pub description: String,
    pub usage: Vec<String>,
    pub options: Vec<String>,
    pub examples: Vec<String>,
}

impl Default for AppDoc {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            usage: vec![DEFAULT_USAGE.to_string()],
            options: Vec::new(),
            examples: Vec::new(),
        }
    }
}

/// Where a help document may come from.
#[derive(Clone, Debug)]
pub enum DocSource {
    Path(PathBuf),
    Embedded(&'static str),
}

impl DocSource {
    fn load(&self) -> Result<String> {
        match self {
            DocSource::Path(path) => fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display())),
            DocSource::Embedded(content) => Ok(content.to_string()),
        }
    }
}

/// `$PURL_DOC`, then `doc/purl.yaml` next to the executable, then in the
/// working directory, then the copy compiled into the binary.
pub fn default_sources() -> Vec<DocSource> {
    let mut sources = Vec::new();
    if let Some(path) = env::var_os("PURL_DOC") {
        sources.push(DocSource::Path(PathBuf::from(path)));
    }
    let exe = env::current_exe().ok();
    if let Some(dir) = exe.as_deref().and_then(Path::parent) {
        sources.push(DocSource::Path(dir.join("doc").join(DOC_FILE)));
    }
    sources.push(DocSource::Path(Path::new("doc").join(DOC_FILE)));
    sources.push(DocSource::Embedded(EMBEDDED_DOC));
    sources
}

/// Returns the first source that can be read and parsed, or the built-in
/// defaults when none can.
pub fn read_app_doc(sources: &[DocSource]) -> AppDoc {
    for source in sources {
        match source.load().and_then(|content| parse_doc(&content)) {
            Ok(doc) => {
                tracing::debug!("using help document {source:?}");
                return doc;
            }
            Err(error) => tracing::debug!("skipping help document {source:?}: {error:#}"),
        }
    }
    AppDoc::default()
}

/// Parses a help document. Fields the document leaves out or empty keep their
/// default value.
pub fn parse_doc(content: &str) -> Result<AppDoc> {
    let key_re = Regex::new(r"^([A-Z_]+):\s*(.*)$")?;
    let item_re = Regex::new(r#"^\s*-\s*(?:"([^"]*)"|(.*\S))\s*$"#)?;

    let mut sections: Vec<(&str, &str, Vec<&str>)> = Vec::new();
    for line in content.lines() {
        if let Some(caps) = key_re.captures(line) {
            let key = caps.get(1).map_or("", |m| m.as_str());
            let inline = caps.get(2).map_or("", |m| m.as_str());
            sections.push((key, inline, Vec::new()));
        } else if let Some((_, _, body)) = sections.last_mut() {
            body.push(line);
        }
    }

    let mut doc = AppDoc::default();
    for (key, inline, body) in sections {
        match key {
            "VERSION" => {
                let version = inline.trim().trim_matches('"');
                if !version.is_empty() {
                    doc.version = version.to_string();
                }
            }
            "DESCRIPTION" => {
                let mut words: Vec<&str> = Vec::new();
                if !matches!(inline.trim(), ">" | "|" | ">-" | "|-") {
                    words.extend(inline.split_whitespace());
                }
                for line in body {
                    words.extend(line.split_whitespace());
                }
                if !words.is_empty() {
                    doc.description = words.join(" ");
                }
            }
            "USAGE" | "OPTIONS" | "EXAMPLES" => {
                let items: Vec<String> = body
                    .iter()
                    .filter_map(|line| item_re.captures(line))
                    .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
                    .map(|m| m.as_str().to_string())
                    .collect();
                match key {
                    "USAGE" if !items.is_empty() => doc.usage = items,
                    "OPTIONS" => doc.options = items,
                    "EXAMPLES" => doc.examples = items,
                    _ => {}
                }
            }
            _ => {}
        }
    }
    Ok(doc)
}

pub fn render_help(doc: &AppDoc) -> String {
    let mut out = format!("purl - {}\n\nUSAGE:\n", doc.description);
    for line in &doc.usage {
        out.push_str(&format!("    {line}\n"));
    }
    for (title, lines) in [("OPTIONS", &doc.options), ("EXAMPLES", &doc.examples)] {
        if lines.is_empty() {
            continue;
        }
        out.push_str(&format!("\n{title}:\n"));
        for line in lines {
            out.push_str(&format!("    {line}\n"));
        }
    }
    out
}

pub fn render_version(doc: &AppDoc) -> String {
    format!("{}\n", doc.version)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"NAME: purl
VERSION: "9.8.7"

DESCRIPTION: >
  Fetch things
  from places.

USAGE:
  - "purl [OPTIONS] URL"
  - "purl --help"

OPTIONS:
  - "-o, --output FILE   Write to FILE"

EXAMPLES:
  - "purl https://example.com"

OUTPUT:
  - "ignored"
"#;

    #[test]
    fn parse_all_sections() {
        let doc = parse_doc(SAMPLE).unwrap();

        assert_eq!(doc.version, "9.8.7");
        assert_eq!(doc.description, "Fetch things from places.");
        assert_eq!(doc.usage, ["purl [OPTIONS] URL", "purl --help"]);
        assert_eq!(doc.options, ["-o, --output FILE   Write to FILE"]);
        assert_eq!(doc.examples, ["purl https://example.com"]);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let doc = parse_doc("OPTIONS:\n  - \"-i\"\n").unwrap();

        assert_eq!(doc.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(doc.description, "Transfer data from URLs");
        assert_eq!(doc.usage, ["purl [OPTIONS] URL"]);
        assert_eq!(doc.options, ["-i"]);
        assert!(doc.examples.is_empty());
    }

    #[test]
    fn embedded_document_parses() {
        let doc = parse_doc(EMBEDDED_DOC).unwrap();

        assert_eq!(doc.version, env!("CARGO_PKG_VERSION"));
        assert!(!doc.options.is_empty());
        assert!(!doc.examples.is_empty());
        assert!(doc.options.iter().any(|line| line.contains("3xx")));
    }

    #[test]
    fn unreadable_source_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let sources = [
            DocSource::Path(dir.path().join("nope.yaml")),
            DocSource::Embedded(SAMPLE),
        ];

        assert_eq!(read_app_doc(&sources).version, "9.8.7");
    }

    #[test]
    fn file_source_wins_over_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("purl.yaml");
        fs::write(&path, "VERSION: \"1.2.3\"\n").unwrap();

        let sources = [DocSource::Path(path), DocSource::Embedded(SAMPLE)];

        assert_eq!(read_app_doc(&sources).version, "1.2.3");
    }

    #[test]
    fn no_sources_falls_back_to_defaults() {
        assert_eq!(read_app_doc(&[]), AppDoc::default());
    }

    #[test]
    fn help_layout() {
        let doc = AppDoc {
            version: "1.0".to_string(),
            description: "Get URLs".to_string(),
            usage: vec!["purl URL".to_string()],
            options: vec!["-i  include".to_string()],
            examples: Vec::new(),
        };

        assert_eq!(
            render_help(&doc),
            "purl - Get URLs\n\nUSAGE:\n    purl URL\n\nOPTIONS:\n    -i  include\n"
        );
        assert_eq!(render_version(&doc), "1.0\n");
    }
}
