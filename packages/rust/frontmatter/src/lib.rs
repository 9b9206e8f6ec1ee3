//! Frontmatter serialization.
//!
//! Renders an ordered [`Document`] as plain YAML or as a markdown file with
//! the YAML between `---` delimiters, and reads existing frontmatter files
//! back into documents. Key order is preserved in both directions.

use serde_yaml::Value;
use tracing::{debug, instrument};

use matkb_shared::{Document, MatKbError, OutputFormat, Result};

/// Frontmatter delimiter line.
const DELIMITER: &str = "---";

/// Serialize a document as YAML, keeping key order.
pub fn to_yaml(doc: &Document) -> Result<String> {
    serde_yaml::to_string(doc).map_err(|e| MatKbError::parse(format!("YAML encode failed: {e}")))
}

/// Serialize a document as a markdown file with YAML frontmatter and an optional body.
pub fn to_markdown(doc: &Document, body: Option<&str>) -> Result<String> {
    let yaml = to_yaml(doc)?;
    let mut out = String::with_capacity(yaml.len() + 16);
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(&yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(DELIMITER);
    out.push('\n');
    if let Some(body) = body.filter(|b| !b.trim().is_empty()) {
        out.push('\n');
        out.push_str(body.trim_end());
        out.push('\n');
    }
    Ok(out)
}

/// Serialize a document in the configured output format.
#[instrument(skip(doc), fields(keys = doc.len()))]
pub fn render(doc: &Document, format: OutputFormat) -> Result<String> {
    let rendered = match format {
        OutputFormat::Yaml => to_yaml(doc)?,
        OutputFormat::Markdown => to_markdown(doc, None)?,
    };
    debug!(bytes = rendered.len(), "frontmatter rendered");
    Ok(rendered)
}

/// Split `---` delimited frontmatter from a markdown body.
///
/// Returns `None` when the content does not open with a delimiter line or
/// the closing delimiter is missing.
pub fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let rest = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == DELIMITER {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }
    None
}

/// Parse a frontmatter file into a document and its markdown body.
///
/// Content without delimiters is read as a plain YAML document with an empty body.
pub fn parse(content: &str) -> Result<(Document, String)> {
    let (yaml, body) = match split_frontmatter(content) {
        Some((yaml, body)) => (yaml, body.trim_start_matches(['\r', '\n']).to_string()),
        None => (content, String::new()),
    };

    let value: Value =
        serde_yaml::from_str(yaml).map_err(|e| MatKbError::parse(format!("frontmatter: {e}")))?;
    match value {
        Value::Mapping(doc) => Ok((doc, body)),
        Value::Null => Ok((Document::new(), body)),
        _ => Err(MatKbError::parse("frontmatter root must be a mapping")),
    }
}
