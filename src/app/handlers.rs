//! Quickstart route handlers

use std::path::Path;

use serde_json::json;

use crate::handler::{Context, HandlerError, Reply};
use crate::logger;
use crate::routing::Value;

const VALID_USERNAME: &str = "Blitty";
const VALID_PASSWORD: &str = "UwU^27";
const ALLOWED_EXTENSIONS: &[&str] = &["png"];
const CANDIE_KEY: &str = "candie";

pub fn index(_ctx: &mut Context<'_>) -> Result<Reply, HandlerError> {
    Ok(Reply::text("First API call!!!"))
}

pub fn text(_ctx: &mut Context<'_>) -> Result<Reply, HandlerError> {
    Ok(Reply::text("YEY"))
}

/// `{"name": x}` in, `{"Return": x}` out
pub fn test_post(ctx: &mut Context<'_>) -> Result<Reply, HandlerError> {
    let input = ctx
        .request
        .json()
        .map_err(|e| HandlerError::BadRequest(format!("invalid JSON body: {e}")))?;
    let name = input
        .get("name")
        .ok_or_else(|| HandlerError::BadRequest("missing 'name'".to_string()))?;
    Ok(Reply::Json(json!({ "Return": name })))
}

pub fn show_user(ctx: &mut Context<'_>) -> Result<Reply, HandlerError> {
    Ok(Reply::text(format!("User {}", ctx.escape(ctx.param_str("userName")?)?)))
}

pub fn show_hero(ctx: &mut Context<'_>) -> Result<Reply, HandlerError> {
    let hero_id = ctx
        .params
        .get_int("hero_id")
        .ok_or_else(|| HandlerError::BadRequest("missing parameter 'hero_id'".to_string()))?;
    Ok(Reply::text(format!("Hero number: {hero_id}")))
}

pub fn goto(ctx: &mut Context<'_>) -> Result<Reply, HandlerError> {
    Ok(Reply::text(format!(
        "Subpath selected: {}",
        ctx.escape(ctx.param_str("subpath")?)?
    )))
}

pub fn show_pi(ctx: &mut Context<'_>) -> Result<Reply, HandlerError> {
    let pi = ctx
        .params
        .get_float("PInum")
        .ok_or_else(|| HandlerError::BadRequest("missing parameter 'PInum'".to_string()))?;
    Ok(Reply::text(format!("Is this PI? {pi:.6}")))
}

/// Serves both `/hello/` and `/hello/<name>`
pub fn hello(ctx: &mut Context<'_>) -> Result<Reply, HandlerError> {
    let name = ctx.params.get_str("name");
    ctx.render("hello.html", &[("name", name)])
}

/// A failed login is reported in the page itself, status stays 200
pub fn login(ctx: &mut Context<'_>) -> Result<Reply, HandlerError> {
    let mut error = None;
    if ctx.request.method == hyper::Method::POST {
        let username = ctx.form_value("username")?;
        let password = ctx.form_value("password")?;
        if valid_login(username, password) {
            return ctx.render("hello.html", &[("name", Some(username))]);
        }
        logger::log_info(&format!("Failed login for '{username}'"));
        error = Some("Invalid username/password");
    }
    ctx.render("login.html", &[("error", error)])
}

fn valid_login(username: &str, password: &str) -> bool {
    username == VALID_USERNAME && password == VALID_PASSWORD
}

/// Keeps uploaded PNG images in the upload directory. The write itself is
/// left to the dispatcher.
pub fn upload_img(ctx: &mut Context<'_>) -> Result<Reply, HandlerError> {
    if ctx.request.method != hyper::Method::POST {
        return ctx.render("upload_file.html", &[]);
    }

    let image = ctx
        .request
        .file("image")
        .ok_or_else(|| HandlerError::BadRequest("missing file field 'image'".to_string()))?;
    if !valid_extension(&image.filename) {
        logger::log_debug(&format!("[Upload] Ignored '{}'", image.filename));
        return ctx.render("upload_file.html", &[]);
    }

    let filename = sanitize_filename::sanitize(&image.filename);
    if filename.is_empty() {
        return Err(HandlerError::BadRequest(format!(
            "unusable filename '{}'",
            image.filename
        )));
    }
    logger::log_info(&format!(
        "[Upload] Accepted {filename} ({} bytes, {})",
        image.data.len(),
        image.content_type.as_deref().unwrap_or("no content type")
    ));
    let page = ctx.render("upload_file.html", &[("saved", Some(filename.as_str()))])?;
    Ok(Reply::save(
        Path::new(&ctx.state.config.app.upload_dir).join(&filename),
        image.data.clone(),
        page,
    ))
}

fn valid_extension(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

pub fn cookie4u(ctx: &mut Context<'_>) -> Result<Reply, HandlerError> {
    ctx.set_cookie("nname", VALID_USERNAME);
    ctx.render("hello.html", &[])
}

pub fn give_me_cookie(ctx: &mut Context<'_>) -> Result<Reply, HandlerError> {
    let name = ctx.request.cookie("nname");
    ctx.render("hello.html", &[("name", name)])
}

/// White is refused with 406, a `#rrggbb` color redirects to its page,
/// anything else is a 418.
pub fn be_a_color(ctx: &mut Context<'_>) -> Result<Reply, HandlerError> {
    if ctx.request.method != hyper::Method::POST {
        return ctx.render("be_a_color.html", &[]);
    }

    let color = ctx.form_value("color")?.trim();
    if color.eq_ignore_ascii_case("#ffffff") {
        return Ok(Reply::Abort(406));
    }
    match hex_color(color) {
        Some(hex) => ctx.redirect_to("color", &[("color_name", Value::from(hex))]),
        None => Ok(Reply::Abort(418)),
    }
}

/// The six hex digits of `#rrggbb`
fn hex_color(color: &str) -> Option<&str> {
    let hex = color.strip_prefix('#')?;
    (hex.len() == 6 && hex.bytes().all(|b| b.is_ascii_hexdigit())).then_some(hex)
}

pub fn color(ctx: &mut Context<'_>) -> Result<Reply, HandlerError> {
    let form_url = ctx.url_for("be_a_color", &[])?;
    let color_name = ctx.param_str("color_name")?;
    ctx.render(
        "color.html",
        &[("color_name", Some(color_name)), ("form_url", Some(form_url.as_str()))],
    )
}

/// Custom page for 406 Not Acceptable
pub fn not_acceptable_page(state: &crate::config::AppState) -> Result<String, HandlerError> {
    let form_url = state.routes.reverse("be_a_color", &[])?;
    Ok(state
        .templates
        .render("not_acceptable.html", &[("form_url", Some(form_url.as_str()))])?)
}

pub fn about_me(_ctx: &mut Context<'_>) -> Result<Reply, HandlerError> {
    Ok(Reply::Json(json!({
        "username": VALID_USERNAME,
        "mood": "happy",
        "favorite_color": "#112233",
        "languages": ["Rust", "Python"],
    })))
}

pub fn get_candie(ctx: &mut Context<'_>) -> Result<Reply, HandlerError> {
    if ctx.request.method != hyper::Method::POST {
        return ctx.render("candie.html", &[]);
    }
    let candie = ctx.form_value(CANDIE_KEY)?.trim();
    // it ends up in a /chao/<name> segment
    if candie.is_empty() || candie.contains('/') {
        return Err(HandlerError::BadRequest(format!("unusable candie '{candie}'")));
    }
    ctx.session.insert(CANDIE_KEY, candie);
    ctx.redirect_to("candie", &[])
}

/// 404 while the session holds no candie
pub fn candie(ctx: &mut Context<'_>) -> Result<Reply, HandlerError> {
    Ok(match ctx.session.get_str(CANDIE_KEY) {
        Some(candie) => Reply::text(format!("You have a {} candie", ctx.escape(candie)?)),
        None => Reply::text("You have no candie").with_status(404),
    })
}

/// Drop the candie and say goodbye with its name
pub fn candie_out(ctx: &mut Context<'_>) -> Result<Reply, HandlerError> {
    let candie = match ctx.session.remove(CANDIE_KEY) {
        Some(serde_json::Value::String(candie)) => candie,
        Some(other) => other.to_string(),
        None => "nobody".to_string(),
    };
    ctx.redirect_to("chao", &[("name", Value::from(candie))])
}

pub fn chao(ctx: &mut Context<'_>) -> Result<Reply, HandlerError> {
    Ok(Reply::text(format!("Chao {}!", ctx.escape(ctx.param_str("name")?)?)))
}
