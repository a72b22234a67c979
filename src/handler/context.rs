//! Per-request handler context

use cookie::{Cookie, CookieJar};

use super::reply::{HandlerError, Reply};
use crate::config::AppState;
use crate::http::Request;
use crate::routing::{Params, Value};
use crate::session::Session;

/// Everything a handler may read or change while serving one request.
///
/// `session` and `cookies` are written back to the response after the
/// handler returns successfully.
#[derive(Debug)]
pub struct Context<'a> {
    pub state: &'a AppState,
    pub request: &'a Request,
    pub params: Params,
    pub session: Session,
    pub cookies: CookieJar,
}

impl<'a> Context<'a> {
    pub fn new(state: &'a AppState, request: &'a Request, params: Params) -> Self {
        Self {
            state,
            request,
            params,
            session: state.sessions.load(request.cookies()),
            cookies: request.cookies().clone(),
        }
    }

    /// Reverse lookup of a named route
    pub fn url_for(&self, name: &str, params: &[(&str, Value)]) -> Result<String, HandlerError> {
        Ok(self.state.routes.reverse(name, params)?)
    }

    pub fn redirect_to(&self, name: &str, params: &[(&str, Value)]) -> Result<Reply, HandlerError> {
        Ok(Reply::redirect(self.url_for(name, params)?))
    }

    pub fn render(&self, template: &str, vars: &[(&str, Option<&str>)]) -> Result<Reply, HandlerError> {
        Ok(Reply::Html(self.state.templates.render(template, vars)?))
    }

    /// HTML-escape user supplied text for a plain reply
    pub fn escape(&self, raw: &str) -> Result<String, HandlerError> {
        Ok(self.state.templates.escape(raw)?)
    }

    /// A required form field, `400` when absent
    pub fn form_value(&self, name: &str) -> Result<&'a str, HandlerError> {
        self.request
            .form_value(name)
            .ok_or_else(|| HandlerError::BadRequest(format!("missing form field '{name}'")))
    }

    /// A required placeholder value
    pub fn param_str(&self, name: &str) -> Result<&str, HandlerError> {
        self.params
            .get_str(name)
            .ok_or_else(|| HandlerError::BadRequest(format!("missing parameter '{name}'")))
    }

    /// Queue a plain cookie valid for the whole site
    pub fn set_cookie(&mut self, name: &str, value: &str) {
        self.cookies.add(
            Cookie::build((name.to_string(), value.to_string()))
                .path("/")
                .build(),
        );
    }
}
