// Application state module
// Everything shared read-only by all connections once the server starts

use thiserror::Error;

use super::types::Config;
use crate::handler::{ErrorPages, Handler};
use crate::routing::{RouteTable, RoutingError};
use crate::session::{SessionCodec, SessionError};
use crate::templates::{TemplateError, Templates};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("route registration failed: {0}")]
    Routing(#[from] RoutingError),
    #[error("template loading failed: {0}")]
    Template(#[from] TemplateError),
    #[error("session setup failed: {0}")]
    Session(#[from] SessionError),
}

/// Application state
#[derive(Debug)]
pub struct AppState {
    pub config: Config,
    pub routes: RouteTable<Handler>,
    pub error_pages: ErrorPages,
    pub templates: Templates,
    pub sessions: SessionCodec,
}

impl AppState {
    /// Parse templates and derive the session key; the route table and
    /// error pages are built by the caller.
    pub fn new(
        config: Config,
        routes: RouteTable<Handler>,
        error_pages: ErrorPages,
    ) -> Result<Self, StateError> {
        let templates = Templates::load()?;
        let sessions = SessionCodec::new(&config.app.secret_key, &config.app.session_cookie)?;
        Ok(Self {
            config,
            routes,
            error_pages,
            templates,
            sessions,
        })
    }
}
