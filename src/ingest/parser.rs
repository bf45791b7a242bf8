//! Markdown/MDX document parsing for ingestion.
//!
//! Extracts frontmatter metadata, plain-text content, the heading outline,
//! and per-heading section structure from `.md`/`.mdx` sources. Plain
//! `.txt` files pass through as a single section; anything else is an
//! unsupported format.

use std::collections::HashMap;
use std::path::Path;

use pulldown_cmark::{Event, Parser as MarkdownParser};
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Heading {
    pub level: usize,
    pub title: String,
    pub line_number: usize,
    /// First non-blank, non-heading line after the heading.
    pub content_start: usize,
}

#[derive(Debug, Clone)]
pub struct Section {
    pub title: String,
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    pub level: usize,
}

#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub title: String,
    /// Markup-stripped plain text of the whole body.
    pub content: String,
    pub headings: Vec<Heading>,
    pub metadata: HashMap<String, String>,
    pub source_path: String,
    pub sections: Vec<Section>,
}

/// Parse a document file based on its extension.
pub fn parse_document_file(path: &Path) -> Result<ParsedDocument, DocumentError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "md" | "mdx" => {
            let raw = read_file(path)?;
            Ok(parse_markdown(&raw, path))
        }
        "txt" => {
            let content = read_file(path)?;
            let stem = file_stem(path);
            let end = content.lines().count();
            Ok(ParsedDocument {
                title: stem.clone(),
                content: content.clone(),
                headings: Vec::new(),
                metadata: HashMap::new(),
                source_path: path.display().to_string(),
                sections: vec![Section {
                    title: stem,
                    content,
                    start_line: 0,
                    end_line: end,
                    level: 0,
                }],
            })
        }
        other => Err(DocumentError::UnsupportedFormat(format!(".{}", other))),
    }
}

fn read_file(path: &Path) -> Result<String, DocumentError> {
    std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document")
        .to_string()
}

fn parse_markdown(raw: &str, path: &Path) -> ParsedDocument {
    let (metadata, body) = split_frontmatter(raw);

    // MDX import/export declarations are markup, not content.
    let body: String = body
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            !(trimmed.starts_with("import ") || trimmed.starts_with("export "))
        })
        .collect::<Vec<_>>()
        .join("\n");

    let content = markdown_to_text(&body);
    let headings = extract_headings(&body);
    let sections = build_sections(&body, &headings);

    let title = metadata
        .get("title")
        .cloned()
        .unwrap_or_else(|| title_from_content(&body));

    ParsedDocument {
        title,
        content,
        headings,
        metadata,
        source_path: path.display().to_string(),
        sections,
    }
}

/// Strip a leading `---`-delimited block and parse it as flat `key: value`
/// pairs with surrounding quotes trimmed.
fn split_frontmatter(raw: &str) -> (HashMap<String, String>, String) {
    let mut metadata = HashMap::new();

    let Some(rest) = raw.strip_prefix("---\n") else {
        return (metadata, raw.to_string());
    };
    let Some(end) = rest.find("\n---\n") else {
        return (metadata, raw.to_string());
    };

    let frontmatter = &rest[..end];
    let body = &rest[end + "\n---\n".len()..];

    for line in frontmatter.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            metadata.insert(key.trim().to_string(), value.to_string());
        }
    }

    (metadata, body.to_string())
}

/// Render markdown and keep only the text, collapsing runs of whitespace.
fn markdown_to_text(body: &str) -> String {
    let mut text = String::new();
    for event in MarkdownParser::new(body) {
        match event {
            Event::Text(t) | Event::Code(t) => {
                text.push_str(&t);
                text.push(' ');
            }
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn heading_regex() -> &'static Regex {
    static HEADING_RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    HEADING_RE.get_or_init(|| Regex::new(r"^(#{1,6})\s+(.+)").expect("static heading pattern"))
}

fn extract_headings(body: &str) -> Vec<Heading> {
    let re = heading_regex();
    let lines: Vec<&str> = body.lines().collect();
    let mut headings = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = re.captures(line) {
            let level = caps[1].len();
            let title = caps[2].trim().to_string();
            headings.push(Heading {
                level,
                title,
                line_number: i,
                content_start: find_content_start(&lines, i),
            });
        }
    }

    headings
}

fn find_content_start(lines: &[&str], heading_line: usize) -> usize {
    for (i, line) in lines.iter().enumerate().skip(heading_line + 1) {
        let trimmed = line.trim();
        if !trimmed.is_empty() && !trimmed.starts_with('#') {
            return i;
        }
    }
    heading_line + 1
}

fn build_sections(body: &str, headings: &[Heading]) -> Vec<Section> {
    if headings.is_empty() {
        return vec![Section {
            title: "Content".to_string(),
            content: body.to_string(),
            start_line: 0,
            end_line: body.lines().count(),
            level: 0,
        }];
    }

    let lines: Vec<&str> = body.lines().collect();
    let mut sections = Vec::new();

    for (i, heading) in headings.iter().enumerate() {
        let start_line = heading.content_start;
        let end_line = headings
            .get(i + 1)
            .map(|next| next.line_number)
            .unwrap_or(lines.len());

        let content = lines
            .get(start_line..end_line)
            .unwrap_or_default()
            .join("\n")
            .trim()
            .to_string();

        sections.push(Section {
            title: heading.title.clone(),
            content,
            start_line,
            end_line,
            level: heading.level,
        });
    }

    sections
}

/// Title fallback chain: first `#` heading, first `##` heading, then a
/// truncated prefix of the body.
fn title_from_content(body: &str) -> String {
    for line in body.lines() {
        if let Some(rest) = line.strip_prefix("# ") {
            return rest.trim().to_string();
        }
    }
    for line in body.lines() {
        if let Some(rest) = line.strip_prefix("## ") {
            return rest.trim().to_string();
        }
    }

    let prefix: String = body.chars().take(50).collect();
    if body.chars().count() > 50 {
        format!("{}...", prefix)
    } else {
        prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes()).expect("write temp file");
        (dir, path)
    }

    #[test]
    fn frontmatter_title_wins() {
        let (_dir, path) = write_temp(
            "doc.mdx",
            "---\ntitle: \"Kinematics\"\nid: kinematics\n---\n# Something Else\n\nBody text.\n",
        );
        let doc = parse_document_file(&path).expect("parse");
        assert_eq!(doc.title, "Kinematics");
        assert_eq!(doc.metadata.get("id").map(String::as_str), Some("kinematics"));
    }

    #[test]
    fn first_h1_is_the_fallback_title() {
        let (_dir, path) = write_temp("doc.md", "# Motion Planning\n\nSome text.\n");
        let doc = parse_document_file(&path).expect("parse");
        assert_eq!(doc.title, "Motion Planning");
    }

    #[test]
    fn h2_then_prefix_complete_the_fallback_chain() {
        let (_dir, path) = write_temp("doc.md", "## Sensors\n\nSome text.\n");
        assert_eq!(parse_document_file(&path).expect("parse").title, "Sensors");

        let long_body = "plain body with no headings at all, ".repeat(4);
        let (_dir2, path2) = write_temp("plain.md", &long_body);
        let doc = parse_document_file(&path2).expect("parse");
        assert!(doc.title.ends_with("..."));
        assert_eq!(doc.title.chars().count(), 53);
    }

    #[test]
    fn import_and_export_lines_are_discarded() {
        let (_dir, path) = write_temp(
            "doc.mdx",
            "import Tabs from '@theme/Tabs';\nexport const x = 1;\n\n# Title\n\nReal content.\n",
        );
        let doc = parse_document_file(&path).expect("parse");
        assert!(!doc.content.contains("Tabs"));
        assert!(doc.content.contains("Real content."));
    }

    #[test]
    fn sections_span_heading_to_next_heading() {
        let md = "# Chapter\n\nIntro line.\n\n## First\n\nFirst body.\n\n## Second\n\nSecond body.\n";
        let (_dir, path) = write_temp("doc.md", md);
        let doc = parse_document_file(&path).expect("parse");

        assert_eq!(doc.headings.len(), 3);
        assert_eq!(doc.sections.len(), 3);
        assert_eq!(doc.sections[0].title, "Chapter");
        assert!(doc.sections[0].content.contains("Intro line."));
        assert_eq!(doc.sections[1].title, "First");
        assert_eq!(doc.sections[1].content, "First body.");
        assert_eq!(doc.sections[2].title, "Second");
        assert_eq!(doc.sections[2].content, "Second body.");
    }

    #[test]
    fn headingless_body_is_one_content_section() {
        let (_dir, path) = write_temp("doc.md", "just prose, nothing more\n");
        let doc = parse_document_file(&path).expect("parse");
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].title, "Content");
    }

    #[test]
    fn txt_files_skip_heading_extraction() {
        let (_dir, path) = write_temp("notes.txt", "# not a heading\nplain text\n");
        let doc = parse_document_file(&path).expect("parse");
        assert_eq!(doc.title, "notes");
        assert!(doc.headings.is_empty());
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].title, "notes");
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let (_dir, path) = write_temp("image.png", "binaryish");
        let err = parse_document_file(&path).expect_err("should fail");
        assert!(matches!(err, DocumentError::UnsupportedFormat(_)));
    }

    #[test]
    fn markup_is_stripped_from_content() {
        let (_dir, path) = write_temp(
            "doc.md",
            "# Title\n\nSome **bold** and a [link](https://example.com) and `code`.\n",
        );
        let doc = parse_document_file(&path).expect("parse");
        assert!(doc.content.contains("bold"));
        assert!(doc.content.contains("link"));
        assert!(!doc.content.contains("**"));
        assert!(!doc.content.contains("https://example.com"));
    }
}
