//! The quickstart application
//!
//! Routes are registered here, in order, once at startup. The resulting
//! table is immutable and shared with every connection through [`AppState`].

pub mod handlers;

use hyper::Method;

use crate::config::{AppState, Config, StateError};
use crate::handler::{ErrorPages, Handler};
use crate::routing::{RouteTable, RoutingError};

/// methods, pattern, handler, name
type Registration = (&'static [Method], &'static str, Handler, &'static str);

const GET_POST: &[Method] = &[Method::GET, Method::POST];

const ROUTES: &[Registration] = &[
    (&[], "/", handlers::index, "index"),
    (&[], "/text/", handlers::text, "text"),
    (&[Method::POST], "/post", handlers::test_post, "test_post"),
    (&[], "/user/<userName>", handlers::show_user, "show_user"),
    (&[], "/hero/<int:hero_id>", handlers::show_hero, "show_hero"),
    (&[], "/goto/<path:subpath>", handlers::goto, "goto"),
    (&[], "/giveMePI/<float:PInum>", handlers::show_pi, "show_PI"),
    (&[], "/hello/", handlers::hello, "hello"),
    (&[], "/hello/<string:name>", handlers::hello, "hello_name"),
    (GET_POST, "/login", handlers::login, "login"),
    (GET_POST, "/upload_img", handlers::upload_img, "upload_img"),
    (&[], "/cookie4u", handlers::cookie4u, "cookie4u"),
    (&[], "/give_me_cookie", handlers::give_me_cookie, "give_me_cookie"),
    (GET_POST, "/be_a_color", handlers::be_a_color, "be_a_color"),
    (&[], "/color/<string:color_name>", handlers::color, "color"),
    (&[], "/about_me", handlers::about_me, "about_me"),
    (GET_POST, "/get_candie", handlers::get_candie, "get_candie"),
    (&[], "/candie", handlers::candie, "candie"),
    (&[], "/candie_out", handlers::candie_out, "candie_out"),
    (&[], "/chao/<name>", handlers::chao, "chao"),
];

/// Build the route table from the registration list
pub fn build_routes() -> Result<RouteTable<Handler>, RoutingError> {
    let mut routes = RouteTable::new();
    for &(methods, pattern, handler, name) in ROUTES {
        routes.register(methods, pattern, handler, name)?;
    }
    Ok(routes)
}

pub fn build_error_pages() -> ErrorPages {
    let mut pages = ErrorPages::new();
    pages.register(406, handlers::not_acceptable_page);
    pages
}

pub fn build_state(config: Config) -> Result<AppState, StateError> {
    AppState::new(config, build_routes()?, build_error_pages())
}

#[cfg(test)]
mod tests;
