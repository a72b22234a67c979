//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: body decoding, route resolution,
//! handler invocation, session write-back and access logging.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use http_body_util::Full;
use hyper::body::{Body, Bytes, Incoming};
use hyper::header;
use hyper::{Method, Response, Version};

use super::context::Context;
use super::reply::{HandlerError, Reply};
use crate::config::AppState;
use crate::http::{self, Request, RequestError};
use crate::logger::{self, AccessLogEntry};
use crate::routing::{allow_header, Resolved, RoutingError};
use crate::session;

/// Outcome of dispatching one decoded request
#[derive(Debug)]
pub struct Dispatched {
    pub response: Response<Full<Bytes>>,
    /// Name of the route that served the request
    pub route: Option<String>,
}

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: hyper::Request<Incoming>,
    state: Arc<AppState>,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let mut entry = AccessLogEntry::new(
        remote_addr.to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = version_text(req.version()).to_string();
    entry.referer = header_text(&req, header::REFERER);
    entry.user_agent = header_text(&req, header::USER_AGENT);
    let method = req.method().clone();
    let is_head = method == Method::HEAD;

    logger::log_headers_count(req.headers().len(), state.config.logging.show_headers);

    let dispatched = match Request::read(req, state.config.http.max_body_size).await {
        Ok(request) => dispatch(&state, &request).await,
        Err(e) => rejected_body(&state, &method, &entry.path, entry.query.as_deref(), &e),
    };

    let mut response = dispatched.response;
    http::set_header(&mut response, header::SERVER, &state.config.http.server_name);
    if is_head {
        response = http::strip_body(response);
    }

    if state.config.logging.access_log {
        entry.status = response.status().as_u16();
        entry.body_bytes = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .or_else(|| usize::try_from(response.body().size_hint().exact()?).ok())
            .unwrap_or(0);
        entry.route = dispatched.route;
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// A body that could not be decoded only matters once a route matches:
/// unknown paths still answer 404, 405 or 308.
fn rejected_body(
    state: &AppState,
    method: &Method,
    path: &str,
    query: Option<&str>,
    err: &RequestError,
) -> Dispatched {
    match state.routes.resolve(method, path) {
        Ok(resolved) => {
            logger::log_warning(&format!("Rejected request body: {err}"));
            Dispatched {
                response: state.error_pages.render(state, err.status()),
                route: Some(resolved.route.name().to_string()),
            }
        }
        Err(routing) => Dispatched {
            response: routing_error_response(state, path, query, routing),
            route: None,
        },
    }
}

/// Resolve and serve an already decoded request
pub async fn dispatch(state: &AppState, request: &Request) -> Dispatched {
    if request.method == Method::OPTIONS {
        let allowed = state.routes.allowed_methods(&request.path);
        let response = if allowed.is_empty() {
            state.error_pages.render(state, 404)
        } else {
            http::build_options_response(&allow_header(&allowed))
        };
        return Dispatched {
            response,
            route: None,
        };
    }

    match state.routes.resolve(&request.method, &request.path) {
        Ok(resolved) => invoke(state, request, resolved).await,
        Err(e) => Dispatched {
            response: routing_error_response(state, &request.path, request.query.as_deref(), e),
            route: None,
        },
    }
}

async fn invoke(state: &AppState, request: &Request, resolved: Resolved<'_, super::Handler>) -> Dispatched {
    let route = resolved.route;
    if logger::enabled(logger::Level::Debug) {
        let params: Vec<String> = resolved
            .params
            .iter()
            .map(|(name, value)| format!("{name}={}", value.to_url_text()))
            .collect();
        logger::log_debug(&format!(
            "[Dispatch] {} {} {:?} -> {} [{}]",
            request.method,
            request.path,
            request.version,
            route.name(),
            params.join(", ")
        ));
    }

    let handler = *route.handler();
    let mut ctx = Context::new(state, request, resolved.params);

    let outcome = match handler(&mut ctx) {
        Ok(reply) => save_pending(reply).await,
        Err(e) => Err(e),
    };

    let response = match outcome {
        Ok(reply) => {
            let mut response = render_reply(state, reply);
            match state.sessions.store(&ctx.session, &mut ctx.cookies) {
                Ok(()) => {
                    for cookie in session::set_cookie_headers(&ctx.cookies) {
                        match cookie.parse() {
                            Ok(value) => {
                                response.headers_mut().append(header::SET_COOKIE, value);
                            }
                            Err(e) => logger::log_warning(&format!("Dropping cookie '{cookie}': {e}")),
                        }
                    }
                    response
                }
                Err(e) => error_response(state, &HandlerError::from(e)),
            }
        }
        Err(e) => error_response(state, &e),
    };

    Dispatched {
        response,
        route: Some(route.name().to_string()),
    }
}

/// Perform the file write a handler asked for
async fn save_pending(reply: Reply) -> Result<Reply, HandlerError> {
    let Reply::Save { path, contents, then } = reply else {
        return Ok(reply);
    };
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(&path, &contents).await?;
    logger::log_info(&format!("[Upload] Saved {} ({} bytes)", path.display(), contents.len()));
    Ok(*then)
}

fn render_reply(state: &AppState, reply: Reply) -> Response<Full<Bytes>> {
    render_with_status(state, reply, 200)
}

fn render_with_status(state: &AppState, reply: Reply, status: u16) -> Response<Full<Bytes>> {
    match reply {
        Reply::Text(text) => http::build_text_response(status, text),
        Reply::Html(html) => http::build_html_response(status, html),
        Reply::Json(value) => http::build_json_response(status, &value),
        Reply::WithStatus(inner, status) => render_with_status(state, *inner, status),
        Reply::Redirect { location, status } => {
            http::build_redirect_response_with_code(&location, status)
        }
        Reply::Abort(status) => state.error_pages.render(state, status),
        // only the outermost reply is saved
        Reply::Save { path, .. } => {
            logger::log_error(&format!("Nested file write to {} was not performed", path.display()));
            state.error_pages.render(state, 500)
        }
    }
}

/// Map a handler failure to a response. Debug mode exposes the error text.
fn error_response(state: &AppState, err: &HandlerError) -> Response<Full<Bytes>> {
    let status = err.status();
    if status >= 500 {
        logger::log_error(&format!("Handler failed: {err}"));
    } else {
        logger::log_warning(&format!("Bad request: {err}"));
    }

    if state.config.server.debug {
        http::build_text_response(status, format!("{}\n\n{err}", http::response::status_line(status)))
    } else {
        state.error_pages.render(state, status)
    }
}

fn routing_error_response(
    state: &AppState,
    path: &str,
    query: Option<&str>,
    err: RoutingError,
) -> Response<Full<Bytes>> {
    match err {
        RoutingError::NotFound(path) => {
            logger::log_debug(&format!("No route for {path}"));
            state.error_pages.render(state, 404)
        }
        RoutingError::MethodNotAllowed { method, allowed, .. } => {
            logger::log_warning(&format!("Method not allowed: {method} {path}"));
            let mut response = state.error_pages.render(state, 405);
            http::set_header(&mut response, header::ALLOW, &allow_header(&allowed));
            response
        }
        RoutingError::RedirectSlash { mut location } => {
            if let Some(query) = query {
                location.push('?');
                location.push_str(query);
            }
            http::build_redirect_response_with_code(&location, 308)
        }
        other => {
            logger::log_error(&format!("Unexpected routing failure: {other}"));
            state.error_pages.render(state, 500)
        }
    }
}

fn header_text(req: &hyper::Request<Incoming>, name: header::HeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn version_text(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "1.1",
    }
}
