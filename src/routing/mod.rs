//! Routing module
//!
//! Provides the route dispatch core:
//! - Typed placeholder converters (string, int, float, path)
//! - Route pattern parsing and matching
//! - Route table with registration, resolution and reverse lookup

mod converter;
mod errors;
mod params;
mod pattern;
mod table;

pub use converter::Value;
pub use errors::RoutingError;
pub use params::Params;
pub use table::{allow_header, Resolved, RouteTable};
