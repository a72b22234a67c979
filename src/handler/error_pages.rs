//! Error page registry
//!
//! Maps status codes to page renderers. Statuses without a registered page
//! get the plain `"<code> <reason>"` body.

use std::collections::HashMap;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;

use super::reply::HandlerError;
use crate::config::AppState;
use crate::http;
use crate::logger;

/// Renders the HTML body of an error page
pub type ErrorPage = fn(&AppState) -> Result<String, HandlerError>;

#[derive(Debug, Default)]
pub struct ErrorPages {
    pages: HashMap<u16, ErrorPage>,
}

impl ErrorPages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later registrations replace earlier ones
    pub fn register(&mut self, status: u16, page: ErrorPage) {
        self.pages.insert(status, page);
    }

    pub fn render(&self, state: &AppState, status: u16) -> Response<Full<Bytes>> {
        let Some(page) = self.pages.get(&status) else {
            return http::build_status_response(status);
        };
        match page(state) {
            Ok(html) => http::build_html_response(status, html),
            Err(e) => {
                logger::log_error(&format!("Error page for {status} failed: {e}"));
                http::build_status_response(status)
            }
        }
    }
}
