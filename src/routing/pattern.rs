//! Route pattern parsing, matching and building
//!
//! A pattern such as `/hero/<int:hero_id>` is split on `/` into literal
//! segments and typed placeholders. A placeholder always fills a whole segment;
//! `<name>` without a converter is a `string` placeholder.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use super::converter::{Converter, Value};
use super::errors::RoutingError;
use super::params::Params;

/// Characters escaped when a value fills a path placeholder
const PATH_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Characters escaped when a value fills a single segment
const SEGMENT_ESCAPE: &AsciiSet = &PATH_ESCAPE.add(b'/');

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder { name: String, converter: Converter },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(raw: &str) -> Result<Self, RoutingError> {
        let invalid = |reason: &str| RoutingError::InvalidPattern {
            pattern: raw.to_string(),
            reason: reason.to_string(),
        };

        let Some(rest) = raw.strip_prefix('/') else {
            return Err(invalid("must start with '/'"));
        };

        let mut segments = Vec::new();
        let mut has_path = false;
        for part in rest.split('/') {
            let segment = if let Some(inner) = part.strip_prefix('<').and_then(|p| p.strip_suffix('>')) {
                let (converter, name) = match inner.split_once(':') {
                    Some((conv, name)) => {
                        let converter = Converter::from_name(conv)
                            .ok_or_else(|| invalid(&format!("unknown converter '{conv}'")))?;
                        (converter, name)
                    }
                    None => (Converter::String, inner),
                };
                if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    return Err(invalid(&format!("bad placeholder name '{name}'")));
                }
                let taken = segments.iter().any(
                    |s| matches!(s, Segment::Placeholder { name: existing, .. } if existing == name),
                );
                if taken {
                    return Err(invalid(&format!("placeholder '{name}' appears twice")));
                }
                if converter == Converter::Path {
                    if has_path {
                        return Err(invalid("only one path placeholder is allowed"));
                    }
                    has_path = true;
                }
                Segment::Placeholder {
                    name: name.to_string(),
                    converter,
                }
            } else if part.contains('<') || part.contains('>') {
                return Err(invalid(&format!("malformed placeholder in '{part}'")));
            } else {
                Segment::Literal(part.to_string())
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[cfg(test)]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of every placeholder, in order
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Match already-decoded path segments, returning the typed parameters
    pub fn match_segments(&self, path: &[String]) -> Option<Params> {
        let mut params = Params::default();
        let mut idx = 0;

        for (pos, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(literal) => {
                    if path.get(idx)? != literal {
                        return None;
                    }
                    idx += 1;
                }
                Segment::Placeholder {
                    name,
                    converter: Converter::Path,
                } => {
                    // leave room for the pattern's tail
                    let tail = self.segments.len() - pos - 1;
                    let end = path.len().checked_sub(tail)?;
                    if end <= idx {
                        return None;
                    }
                    let value = Converter::Path.convert(&path[idx..end].join("/")).ok()?;
                    params.push(name, value);
                    idx = end;
                }
                Segment::Placeholder { name, converter } => {
                    let value = converter.convert(path.get(idx)?).ok()?;
                    params.push(name, value);
                    idx += 1;
                }
            }
        }

        (idx == path.len()).then_some(params)
    }

    /// Substitute values into the pattern.
    ///
    /// `route` only names the route in errors. Values whose names are not
    /// placeholders are returned untouched for the caller to use as a query.
    pub fn build<'p>(
        &self,
        route: &str,
        values: &'p [(&'p str, Value)],
    ) -> Result<(String, Vec<&'p (&'p str, Value)>), RoutingError> {
        let mut parts = Vec::with_capacity(self.segments.len());

        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => parts.push(literal.clone()),
                Segment::Placeholder { name, converter } => {
                    let value = values
                        .iter()
                        .find(|(n, _)| *n == name.as_str())
                        .map(|(_, v)| v)
                        .ok_or_else(|| RoutingError::MissingParameter {
                            route: route.to_string(),
                            param: name.clone(),
                        })?;
                    let text = value.to_url_text();
                    converter
                        .convert(&text)
                        .map_err(|source| RoutingError::InvalidParameter {
                            route: route.to_string(),
                            param: name.clone(),
                            value: text.clone(),
                            source,
                        })?;
                    let escape = if *converter == Converter::Path {
                        PATH_ESCAPE
                    } else {
                        SEGMENT_ESCAPE
                    };
                    parts.push(utf8_percent_encode(&text, escape).to_string());
                }
            }
        }

        let extra = values
            .iter()
            .filter(|(n, _)| !self.placeholders().any(|p| p == *n))
            .collect();

        Ok((format!("/{}", parts.join("/")), extra))
    }
}

/// Split a raw request path into percent-decoded segments
pub fn split_path(path: &str) -> Vec<String> {
    path.strip_prefix('/')
        .unwrap_or(path)
        .split('/')
        .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
        .collect()
}
