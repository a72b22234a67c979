//! Routing error types

use hyper::Method;
use thiserror::Error;

use super::converter::ConversionError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("route name '{0}' is already registered")]
    DuplicateName(String),

    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("no route matches '{0}'")]
    NotFound(String),

    #[error("method {method} is not allowed for '{path}'")]
    MethodNotAllowed {
        method: Method,
        path: String,
        /// Every method some matching route accepts, in registration order
        allowed: Vec<Method>,
    },

    /// The path only matches once a trailing slash is appended
    #[error("'{location}' is the canonical location")]
    RedirectSlash { location: String },

    #[error("no route is named '{0}'")]
    UnknownRoute(String),

    #[error("route '{route}' requires parameter '{param}'")]
    MissingParameter { route: String, param: String },

    #[error("'{value}' cannot fill parameter '{param}' of route '{route}': {source}")]
    InvalidParameter {
        route: String,
        param: String,
        value: String,
        #[source]
        source: ConversionError,
    },
}
