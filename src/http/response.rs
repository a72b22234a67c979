//! HTTP response building module
//!
//! Builders never panic: a builder failure is logged and replaced by a bare
//! response carrying the same body.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{self, HeaderValue};
use hyper::{Response, StatusCode};

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const TEXT_HTML: &str = "text/html; charset=utf-8";
pub const APPLICATION_JSON: &str = "application/json";

/// Build a response with a body and `Content-Type`
pub fn build_response(status: u16, content_type: &str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let body = body.into();
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, body.len())
        .body(Full::new(body.clone()))
        .unwrap_or_else(|e| {
            log_build_error(status, &e);
            Response::new(Full::new(body))
        })
}

pub fn build_text_response(status: u16, text: impl Into<String>) -> Response<Full<Bytes>> {
    build_response(status, TEXT_PLAIN, text.into())
}

pub fn build_html_response(status: u16, html: impl Into<String>) -> Response<Full<Bytes>> {
    build_response(status, TEXT_HTML, html.into())
}

pub fn build_json_response(status: u16, value: &serde_json::Value) -> Response<Full<Bytes>> {
    build_response(status, APPLICATION_JSON, value.to_string())
}

/// Plain `"<code> <reason>"` page for statuses without a custom page
pub fn build_status_response(status: u16) -> Response<Full<Bytes>> {
    build_text_response(status, status_line(status))
}

/// Build redirect response with a specific status code
pub fn build_redirect_response_with_code(target: &str, code: u16) -> Response<Full<Bytes>> {
    Response::builder()
        .status(code)
        .header(header::LOCATION, target)
        .header(header::CONTENT_TYPE, TEXT_PLAIN)
        .body(Full::new(Bytes::from("Redirecting...")))
        .unwrap_or_else(|e| {
            log_build_error(code, &e);
            Response::new(Full::new(Bytes::from("Redirecting...")))
        })
}

/// Build OPTIONS response listing the methods a path accepts
pub fn build_options_response(allow: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(204)
        .header(header::ALLOW, allow)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error(204, &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Answer a `HEAD` request: same headers, empty body
pub fn strip_body(response: Response<Full<Bytes>>) -> Response<Full<Bytes>> {
    let (parts, _) = response.into_parts();
    Response::from_parts(parts, Full::new(Bytes::new()))
}

/// Insert a header, skipping values that are not valid header text
pub fn set_header(response: &mut Response<Full<Bytes>>, name: header::HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            response.headers_mut().insert(name, v);
        }
        Err(e) => crate::logger::log_warning(&format!("Invalid {name} header value '{value}': {e}")),
    }
}

pub fn status_line(status: u16) -> String {
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");
    format!("{status} {reason}")
}

/// Log response build error
fn log_build_error(status: u16, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
