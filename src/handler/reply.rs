//! Handler results
//!
//! A handler either returns a [`Reply`] or fails with a [`HandlerError`].
//! Aborts are replies, not errors: they are rendered through the error page
//! registry and never logged as failures.

use std::path::PathBuf;

use hyper::body::Bytes;
use thiserror::Error;

use crate::routing::RoutingError;
use crate::session::SessionError;
use crate::templates::TemplateError;

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    Html(String),
    Json(serde_json::Value),
    /// Any reply with a status other than 200
    WithStatus(Box<Reply>, u16),
    Redirect { location: String, status: u16 },
    /// Answer with the error page registered for this status
    Abort(u16),
    /// Write `contents` to `path` off the handler, then answer with `then`.
    /// A failed write is a 500.
    Save {
        path: PathBuf,
        contents: Bytes,
        then: Box<Reply>,
    },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// `302 Found` to `location`
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::Redirect {
            location: location.into(),
            status: 302,
        }
    }

    pub fn save(path: impl Into<PathBuf>, contents: Bytes, then: Self) -> Self {
        Self::Save {
            path: path.into(),
            contents,
            then: Box::new(then),
        }
    }

    #[must_use]
    pub fn with_status(self, status: u16) -> Self {
        Self::WithStatus(Box::new(self), status)
    }
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl HandlerError {
    pub const fn status(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            _ => 500,
        }
    }
}
