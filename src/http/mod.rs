//! HTTP protocol layer module
//!
//! Request decoding and response building, decoupled from the route handlers.

pub mod multipart;
pub mod request;
pub mod response;

pub use request::{Request, RequestError};
#[cfg(test)]
pub use request::RequestBuilder;
pub use response::{
    build_html_response, build_json_response, build_options_response,
    build_redirect_response_with_code, build_status_response, build_text_response, set_header,
    strip_body,
};
