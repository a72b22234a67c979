//! `multipart/form-data` decoding
//!
//! Splits a fully buffered body on its boundary and reads each part's
//! `Content-Disposition` and `Content-Type` headers.

use hyper::body::Bytes;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MultipartError {
    #[error("boundary not found in body")]
    MissingBoundary,
    #[error("part is not terminated by a boundary")]
    Unterminated,
    #[error("part has no header/body separator")]
    MissingSeparator,
    #[error("part has no form-data name")]
    MissingName,
    #[error("unexpected bytes after boundary")]
    Malformed,
}

/// One decoded part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Extract the boundary parameter from a `Content-Type` header value
pub fn boundary(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("boundary")
            .then(|| value.trim().trim_matches('"'))
    })
}

pub fn parse(body: &Bytes, boundary: &str) -> Result<Vec<Part>, MultipartError> {
    let delimiter = format!("--{boundary}");
    let next_delimiter = format!("\r\n--{boundary}");

    let mut pos = find(body, delimiter.as_bytes(), 0).ok_or(MultipartError::MissingBoundary)?
        + delimiter.len();
    let mut parts = Vec::new();

    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            break;
        }
        if !rest.starts_with(b"\r\n") {
            return Err(MultipartError::Malformed);
        }
        pos += 2;

        let end = find(body, next_delimiter.as_bytes(), pos).ok_or(MultipartError::Unterminated)?;
        parts.push(parse_part(&body.slice(pos..end))?);
        pos = end + next_delimiter.len();
    }

    Ok(parts)
}

fn parse_part(section: &Bytes) -> Result<Part, MultipartError> {
    let split = find(section, b"\r\n\r\n", 0).ok_or(MultipartError::MissingSeparator)?;
    let head = String::from_utf8_lossy(&section[..split]);

    let mut name = None;
    let mut filename = None;
    let mut content_type = None;

    for line in head.split("\r\n") {
        let Some((header, value)) = line.split_once(':') else {
            continue;
        };
        let header = header.trim();
        if header.eq_ignore_ascii_case("content-disposition") {
            for param in split_params(value).into_iter().skip(1) {
                let Some((key, val)) = param.trim().split_once('=') else {
                    continue;
                };
                let val = unquote(val.trim()).to_string();
                match key.trim().to_ascii_lowercase().as_str() {
                    "name" => name = Some(val),
                    "filename" => filename = Some(val),
                    _ => {}
                }
            }
        } else if header.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.trim().to_string());
        }
    }

    Ok(Part {
        name: name.ok_or(MultipartError::MissingName)?,
        filename,
        content_type,
        data: section.slice(split + 4..),
    })
}

/// Split a header value on `;` outside quoted strings
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ';' if !quoted => {
                params.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&value[start..]);
    params
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}
