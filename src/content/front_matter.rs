//! Front matter: a YAML mapping between two `---` lines at the top of a file.
//!
//! ```text
//! ---
//! title: Hello
//! layout: post
//! ---
//! Body text, available as `content`.
//! ```

use crate::{error::ParseError, site::Page};
use anyhow::{Context, Result};
use serde_json::Value;
use std::{fs::File, io::Read, path::Path};

const DELIMITER: &str = "---";

/// Split raw file bytes into front matter and body.
///
/// Returns `None` when the first line is not `---`. An empty block yields a
/// page holding only `content`.
pub fn read_front_matter(bytes: &[u8], path: &Path) -> Result<Option<Page>, ParseError> {
    if !bytes.starts_with(DELIMITER.as_bytes()) {
        return Ok(None);
    }
    let text = std::str::from_utf8(bytes).map_err(|_| ParseError::Encoding(path.to_path_buf()))?;

    let mut lines = text.split_inclusive('\n');
    match lines.next() {
        Some(first) if is_delimiter(first) => {}
        _ => return Ok(None),
    }

    let start = text.find('\n').map_or(text.len(), |i| i + 1);
    let mut offset = start;
    for line in lines {
        if is_delimiter(line) {
            let mut page = decode(&text[start..offset], path)?;
            let body = &text[offset + line.len()..];
            page.insert("content".into(), Value::String(body.to_owned()));
            return Ok(Some(page));
        }
        offset += line.len();
    }

    Err(ParseError::Unterminated(path.to_path_buf()))
}

/// Read a template file from disk, `None` if it carries no front matter.
///
/// Only the first bytes are read for files without front matter.
pub fn read_template(path: &Path) -> Result<Option<Page>> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

    let mut head = [0u8; DELIMITER.len()];
    let mut filled = 0;
    while filled < head.len() {
        let n = file
            .read(&mut head[filled..])
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if n == 0 {
            return Ok(None);
        }
        filled += n;
    }
    if head != DELIMITER.as_bytes() {
        return Ok(None);
    }

    let mut bytes = head.to_vec();
    file.read_to_end(&mut bytes)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(read_front_matter(&bytes, path)?)
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == DELIMITER
}

fn decode(yaml: &str, path: &Path) -> Result<Page, ParseError> {
    let value: serde_yaml_ng::Value =
        serde_yaml_ng::from_str(yaml).map_err(|err| ParseError::Yaml(path.to_path_buf(), err))?;
    match value {
        serde_yaml_ng::Value::Null => Ok(Page::new()),
        value @ serde_yaml_ng::Value::Mapping(_) => serde_yaml_ng::from_value(value)
            .map_err(|err| ParseError::Yaml(path.to_path_buf(), err)),
        _ => Err(ParseError::NotAMapping(path.to_path_buf())),
    }
}
