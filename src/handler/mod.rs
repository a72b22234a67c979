//! Request handler module
//!
//! Dispatches decoded requests to the registered route handlers and turns
//! their replies into responses.

pub mod context;
pub mod error_pages;
pub mod reply;
pub mod router;

pub use context::Context;
pub use error_pages::ErrorPages;
pub use reply::{HandlerError, Reply};
pub use router::handle_request;

/// A route handler. Handlers run synchronously on the connection's task and
/// hand file writes back as [`Reply::Save`], which the dispatcher performs
/// with `tokio::fs`.
pub type Handler = fn(&mut Context<'_>) -> Result<Reply, HandlerError>;
