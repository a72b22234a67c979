//! Decoded request
//!
//! The hyper request is buffered once, up to the configured body limit, and
//! turned into a [`Request`] with form fields, uploaded files and cookies
//! already parsed. Handlers never see the raw stream.

use cookie::{Cookie, CookieJar};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::header::{self, HeaderMap};
use hyper::{Method, Version};
use thiserror::Error;

use super::multipart::{self, MultipartError};

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request body too large: {size} bytes (max: {limit})")]
    TooLarge { size: u64, limit: u64 },
    #[error("failed to read request body: {0}")]
    Body(String),
    #[error("malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error("multipart body without boundary")]
    MissingBoundary,
}

impl RequestError {
    pub const fn status(&self) -> u16 {
        match self {
            Self::TooLarge { .. } => 413,
            _ => 400,
        }
    }
}

/// A file part of a `multipart/form-data` body
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    /// Raw query string (without leading ?)
    pub query: Option<String>,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
    form: Vec<(String, String)>,
    files: Vec<UploadedFile>,
    cookies: CookieJar,
}

impl Request {
    /// Build from already buffered parts. `target` is the request path with
    /// an optional query string.
    pub fn from_parts(
        method: Method,
        target: &str,
        version: Version,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<Self, RequestError> {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };
        let path = if path.is_empty() { "/" } else { path };

        let mut request = Self {
            method,
            path: path.to_string(),
            query,
            version,
            cookies: parse_cookies(&headers),
            headers,
            body,
            form: Vec::new(),
            files: Vec::new(),
        };
        request.decode_form()?;
        Ok(request)
    }

    /// Buffer a hyper request, rejecting bodies larger than `max_body_size`
    pub async fn read(req: hyper::Request<Incoming>, max_body_size: u64) -> Result<Self, RequestError> {
        let (parts, body) = req.into_parts();

        if let Some(size) = content_length(&parts.headers) {
            if size > max_body_size {
                return Err(RequestError::TooLarge {
                    size,
                    limit: max_body_size,
                });
            }
        }

        let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
        let body = Limited::new(body, limit)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    RequestError::TooLarge {
                        size: max_body_size.saturating_add(1),
                        limit: max_body_size,
                    }
                } else {
                    RequestError::Body(e.to_string())
                }
            })?
            .to_bytes();

        let target = parts
            .uri
            .path_and_query()
            .map_or("/", hyper::http::uri::PathAndQuery::as_str);
        Self::from_parts(parts.method, target, parts.version, parts.headers, body)
    }

    fn decode_form(&mut self) -> Result<(), RequestError> {
        let Some(content_type) = self.header(header::CONTENT_TYPE.as_str()).map(str::to_string) else {
            return Ok(());
        };
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/x-www-form-urlencoded" => {
                self.form = form_urlencoded::parse(&self.body).into_owned().collect();
            }
            "multipart/form-data" => {
                let boundary = multipart::boundary(&content_type).ok_or(RequestError::MissingBoundary)?;
                for part in multipart::parse(&self.body, boundary)? {
                    match part.filename {
                        Some(filename) => self.files.push(UploadedFile {
                            field: part.name,
                            filename,
                            content_type: part.content_type,
                            data: part.data,
                        }),
                        None => self
                            .form
                            .push((part.name, String::from_utf8_lossy(&part.data).into_owned())),
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn form_value(&self, name: &str) -> Option<&str> {
        lookup(&self.form, name)
    }

    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.field == field)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(Cookie::value)
    }

    pub const fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    /// Parse the body as JSON whatever the declared content type
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Collect every `Cookie` header into a jar of original cookies
fn parse_cookies(headers: &HeaderMap) -> CookieJar {
    let mut jar = CookieJar::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for pair in value.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            if let Ok(cookie) = Cookie::parse_encoded(pair.to_string()) {
                jar.add_original(cookie);
            }
        }
    }
    jar
}

/// Assembles a request without a socket
#[cfg(test)]
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    target: String,
    headers: HeaderMap,
    body: Bytes,
}

#[cfg(test)]
impl RequestBuilder {
    pub fn new(method: Method, target: &str) -> Self {
        Self {
            method,
            target: target.to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Invalid header values are skipped
    pub fn header(mut self, name: header::HeaderName, value: &str) -> Self {
        if let Ok(value) = value.parse() {
            self.headers.append(name, value);
        }
        self
    }

    pub fn form(self, pairs: &[(&str, &str)]) -> Self {
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
    }

    pub fn json(self, value: &serde_json::Value) -> Self {
        self.header(header::CONTENT_TYPE, "application/json")
            .body(value.to_string())
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> Result<Request, RequestError> {
        Request::from_parts(self.method, &self.target, Version::HTTP_11, self.headers, self.body)
    }
}
