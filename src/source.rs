//! Source document loading
//!
//! A location is a filesystem path, a `file://` URI, or `-` for stdin. Remote
//! object-storage locations are resolved outside this crate and are refused here.

use crate::error::{MeltError, Result};
use crate::types::Record;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, info};

static URI_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<scheme>[A-Za-z][A-Za-z0-9+.-]*)://(?P<path>.*)$").unwrap()
});

/// Where a source document lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Stdin,
    File(PathBuf),
    Remote { scheme: String },
}

impl Location {
    pub fn parse(location: &str) -> Self {
        if location == "-" {
            return Location::Stdin;
        }
        match URI_REGEX.captures(location) {
            Some(caps) if caps["scheme"].eq_ignore_ascii_case("file") => {
                Location::File(PathBuf::from(&caps["path"]))
            }
            Some(caps) => Location::Remote {
                scheme: caps["scheme"].to_lowercase(),
            },
            None => Location::File(PathBuf::from(location)),
        }
    }
}

/// Read and parse the document at `location` into top-level records
pub fn load_document(location: &str) -> Result<Vec<Record>> {
    let fail = |reason: String| MeltError::SourceLoad {
        location: location.to_string(),
        reason,
    };

    let mut content = Vec::new();
    match Location::parse(location) {
        Location::Stdin => {
            std::io::stdin()
                .read_to_end(&mut content)
                .map_err(|e| fail(e.to_string()))?;
        }
        Location::File(path) => {
            content = std::fs::read(&path).map_err(|e| fail(e.to_string()))?;
        }
        Location::Remote { scheme } => {
            return Err(fail(format!(
                "{}:// locations must be fetched before loading",
                scheme
            )));
        }
    }
    debug!(location, bytes = content.len(), "read source document");

    let records = parse_document(&mut content).map_err(fail)?;
    info!(location, records = records.len(), "loaded source document");
    Ok(records)
}

/// Parse a whole document: one object, or an array of objects.
///
/// Falls back to newline-delimited JSON when the buffer is not a single value.
pub fn parse_document(content: &mut [u8]) -> std::result::Result<Vec<Record>, String> {
    // simd-json parses in place, so keep a copy for the line-by-line fallback
    let original = content.to_vec();

    match simd_json::serde::from_slice::<Value>(content) {
        Ok(value) => records_from_value(value),
        Err(whole) => parse_lines(&original).map_err(|_| whole.to_string()),
    }
}

fn records_from_value(value: Value) -> std::result::Result<Vec<Record>, String> {
    match value {
        Value::Object(obj) => Ok(vec![obj]),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                Value::Object(obj) => Ok(obj),
                other => Err(format!("element {} is not an object: {}", idx, other)),
            })
            .collect(),
        other => Err(format!("document is not an object or array: {}", other)),
    }
}

fn parse_lines(content: &[u8]) -> std::result::Result<Vec<Record>, String> {
    let text = std::str::from_utf8(content).map_err(|e| e.to_string())?;
    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line).map_err(|e| e.to_string())? {
            Value::Object(obj) => records.push(obj),
            _ => return Err(format!("line {} is not an object", idx + 1)),
        }
    }
    if records.is_empty() {
        return Err("document is empty".to_string());
    }
    Ok(records)
}
