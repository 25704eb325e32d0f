//! Form body parsing
//!
//! Handles the two form encodings a browser submits:
//! `application/x-www-form-urlencoded` and `multipart/form-data`. Ordinary
//! fields become strings; fields that declare a filename become
//! [`UploadedFile`] handles. Fields with no name are dropped, and when the
//! same name appears twice the last occurrence wins.

use crate::error::FrameworkError;
use crate::request::query;
use std::collections::HashMap;
use std::io::Cursor;

/// One decoded form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    /// A plain text field.
    Text(String),
    /// A file-upload field (the part declared a filename).
    File(UploadedFile),
}

/// Handle to the content of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Filename as declared by the client; not sanitized.
    pub filename: String,
    /// Content type of the part, empty if the part did not declare one.
    pub content_type: String,
    data: Vec<u8>,
}

impl UploadedFile {
    /// Raw uploaded bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Open the content for reading.
    pub fn reader(&self) -> impl std::io::Read + '_ {
        Cursor::new(&self.data)
    }
}

/// Parse an urlencoded form body. Later occurrences of a name replace
/// earlier ones.
pub fn parse_urlencoded(raw: &[u8]) -> HashMap<String, FormValue> {
    let text = String::from_utf8_lossy(raw);
    let mut fields = HashMap::new();
    for (name, value) in query::parse_pairs(&text) {
        fields.insert(name, FormValue::Text(value));
    }
    fields
}

/// Extract the boundary parameter from a multipart content type.
pub fn boundary(content_type: &str) -> Result<String, FrameworkError> {
    content_type
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("boundary="))
        .map(|value| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            FrameworkError::MalformedForm(format!(
                "no boundary parameter in content type '{content_type}'"
            ))
        })
}

/// Parse a `multipart/form-data` payload delimited by `boundary`.
pub fn parse_multipart(
    raw: &[u8],
    boundary: &str,
) -> Result<HashMap<String, FormValue>, FrameworkError> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let start = find(raw, delimiter).ok_or_else(|| {
        FrameworkError::MalformedForm(format!("boundary '{boundary}' not found in payload"))
    })?;
    let mut rest = &raw[start + delimiter.len()..];

    let mut fields = HashMap::new();
    loop {
        // The closing delimiter is the boundary followed by "--".
        if rest.starts_with(b"--") {
            break;
        }
        rest = rest.strip_prefix(b"\r\n").unwrap_or(rest);
        let end = find(rest, delimiter).ok_or_else(|| {
            FrameworkError::MalformedForm("unterminated multipart part".to_string())
        })?;
        let part = &rest[..end];
        rest = &rest[end + delimiter.len()..];

        let part = part.strip_suffix(b"\r\n").unwrap_or(part);
        if let Some((name, value)) = parse_part(part)? {
            fields.insert(name, value);
        }
    }
    Ok(fields)
}

/// Parse a single part: headers, blank line, content. Returns `None` for
/// parts that carry no field name.
fn parse_part(part: &[u8]) -> Result<Option<(String, FormValue)>, FrameworkError> {
    let split = find(part, b"\r\n\r\n").ok_or_else(|| {
        FrameworkError::MalformedForm("multipart part missing header terminator".to_string())
    })?;
    let head = String::from_utf8_lossy(&part[..split]);
    let content = &part[split + 4..];

    let mut name = None;
    let mut filename = None;
    let mut content_type = String::new();
    for line in head.lines() {
        if let Some(value) = header_value(line, "content-disposition") {
            for param in value.split(';').map(str::trim) {
                if let Some(v) = param.strip_prefix("name=") {
                    name = Some(unquote(v));
                } else if let Some(v) = param.strip_prefix("filename=") {
                    filename = Some(unquote(v));
                }
            }
        } else if let Some(value) = header_value(line, "content-type") {
            content_type = value.to_string();
        }
    }

    let Some(name) = name else {
        return Ok(None);
    };
    let value = match filename {
        Some(filename) => FormValue::File(UploadedFile {
            filename,
            content_type,
            data: content.to_vec(),
        }),
        None => FormValue::Text(String::from_utf8_lossy(content).into_owned()),
    };
    Ok(Some((name, value)))
}

/// Value of `line` if its header name matches `key` case-insensitively.
fn header_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let (head, rest) = line.split_once(':')?;
    if head.trim().eq_ignore_ascii_case(key) {
        Some(rest.trim())
    } else {
        None
    }
}

fn unquote(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// First position of `needle` in `haystack`.
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
