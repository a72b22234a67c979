use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{self, HeaderName};
use hyper::{Method, Response};

use super::*;
use crate::handler::router::dispatch;
use crate::handler::{Context, Reply};
use crate::http::RequestBuilder;
use crate::routing::{Params, Value};

fn test_config() -> Config {
    let mut config = Config::load_from("does-not-exist/config").unwrap();
    config.logging.access_log = false;
    config
}

fn state() -> AppState {
    build_state(test_config()).unwrap()
}

async fn send(state: &AppState, request: RequestBuilder) -> Response<Full<Bytes>> {
    dispatch(state, &request.build().unwrap()).await.response
}

async fn get(state: &AppState, target: &str) -> Response<Full<Bytes>> {
    send(state, RequestBuilder::new(Method::GET, target)).await
}

async fn body(response: Response<Full<Bytes>>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn header_value<'r>(response: &'r Response<Full<Bytes>>, name: HeaderName) -> &'r str {
    response.headers()[name].to_str().unwrap()
}

/// `name=value` pairs of every `Set-Cookie`, ready for a `Cookie` header
fn cookie_header(response: &Response<Full<Bytes>>) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().split(';').next().unwrap().to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[test]
fn test_registration_list_is_valid() {
    let routes = build_routes().unwrap();
    assert_eq!(routes.iter().count(), ROUTES.len());
    assert!(routes.get("show_PI").is_some());
}

fn sample_value(placeholder: &str) -> Value {
    match placeholder {
        "hero_id" => Value::Int(7),
        "PInum" => Value::Float(2.5),
        "subpath" => Value::Path("a/b c/d".to_string()),
        "color_name" => "112233".into(),
        "userName" => "John Doe?#%".into(),
        _ => "Blitty".into(),
    }
}

#[test]
fn test_every_route_reverses_then_resolves() {
    let routes = build_routes().unwrap();
    for route in routes.iter() {
        let params: Vec<(&str, Value)> = route
            .pattern()
            .placeholders()
            .map(|name| (name, sample_value(name)))
            .collect();
        let path = routes.reverse(route.name(), &params).unwrap();
        let resolved = routes.resolve(&route.methods()[0], &path).unwrap();
        assert_eq!(resolved.route.name(), route.name(), "{path}");
        for (key, value) in &params {
            assert_eq!(resolved.params.get(key), Some(value), "{}: {key}", route.name());
        }
    }
}

#[test]
fn test_url_for_demo() {
    let routes = build_routes().unwrap();
    assert_eq!(routes.reverse("login", &[]).unwrap(), "/login");
    assert_eq!(routes.reverse("hello", &[]).unwrap(), "/hello/");
    assert_eq!(
        routes
            .reverse("show_PI", &[("PInum", Value::Float(3.141_516_7)), ("next", "/".into())])
            .unwrap(),
        "/giveMePI/3.1415167?next=%2F"
    );
    assert_eq!(
        routes.reverse("show_user", &[("userName", "John Doe".into())]).unwrap(),
        "/user/John%20Doe"
    );
}

#[tokio::test]
async fn test_plain_text_routes() {
    let state = state();
    assert_eq!(body(get(&state, "/").await).await, "First API call!!!");
    assert_eq!(body(get(&state, "/text/").await).await, "YEY");
    assert_eq!(body(get(&state, "/hero/7").await).await, "Hero number: 7");
    assert_eq!(body(get(&state, "/goto/a/b/c").await).await, "Subpath selected: a/b/c");
    assert_eq!(body(get(&state, "/giveMePI/3.14").await).await, "Is this PI? 3.140000");
    assert_eq!(
        body(get(&state, "/user/%3Cb%3EJohn").await).await,
        "User &lt;b&gt;John"
    );
}

#[tokio::test]
async fn test_not_found_and_method_not_allowed() {
    let state = state();
    let response = get(&state, "/hero/abc").await;
    assert_eq!(response.status(), 404);
    assert_eq!(body(response).await, "404 Not Found");

    let response = get(&state, "/post").await;
    assert_eq!(response.status(), 405);
    assert_eq!(header_value(&response, header::ALLOW), "POST, OPTIONS");
}

#[tokio::test]
async fn test_missing_trailing_slash_redirects() {
    let state = state();
    let response = get(&state, "/hello?x=1").await;
    assert_eq!(response.status(), 308);
    assert_eq!(header_value(&response, header::LOCATION), "/hello/?x=1");
}

#[tokio::test]
async fn test_options() {
    let state = state();
    let response = send(&state, RequestBuilder::new(Method::OPTIONS, "/login")).await;
    assert_eq!(response.status(), 204);
    assert_eq!(
        header_value(&response, header::ALLOW),
        "GET, POST, HEAD, OPTIONS"
    );
    let response = send(&state, RequestBuilder::new(Method::OPTIONS, "/nowhere")).await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_post_json() {
    let state = state();
    let response = send(
        &state,
        RequestBuilder::new(Method::POST, "/post").json(&serde_json::json!({"name": "Blitty"})),
    ).await;
    assert_eq!(response.status(), 200);
    assert_eq!(header_value(&response, header::CONTENT_TYPE), "application/json");
    assert_eq!(body(response).await, r#"{"Return":"Blitty"}"#);

    let response = send(
        &state,
        RequestBuilder::new(Method::POST, "/post").json(&serde_json::json!({"nom": "x"})),
    ).await;
    assert_eq!(response.status(), 400);

    let response = send(&state, RequestBuilder::new(Method::POST, "/post").body("not json")).await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_bad_request_details_only_in_debug() {
    let mut config = test_config();
    config.server.debug = true;
    let state = build_state(config).unwrap();
    let response = send(&state, RequestBuilder::new(Method::POST, "/post").body("{}")).await;
    assert_eq!(response.status(), 400);
    assert!(body(response).await.contains("missing 'name'"));

    let response = send(&self::state(), RequestBuilder::new(Method::POST, "/post").body("{}")).await;
    assert_eq!(body(response).await, "400 Bad Request");
}

#[tokio::test]
async fn test_hello_template() {
    let state = state();
    let response = get(&state, "/hello/Blitty").await;
    assert_eq!(header_value(&response, header::CONTENT_TYPE), "text/html; charset=utf-8");
    assert!(body(response).await.contains("Hello Blitty!"));
    assert!(body(get(&state, "/hello/").await).await.contains("Hello, World!"));
}

#[tokio::test]
async fn test_login() {
    let state = state();
    assert!(body(get(&state, "/login").await).await.contains("<form method=\"post\">"));

    let response = send(
        &state,
        RequestBuilder::new(Method::POST, "/login").form(&[("username", "Blitty"), ("password", "UwU^27")]),
    ).await;
    assert_eq!(response.status(), 200);
    assert!(body(response).await.contains("Hello Blitty!"));

    for (username, password) in [("Blitty", "nope"), ("someone", "UwU^27")] {
        let response = send(
            &state,
            RequestBuilder::new(Method::POST, "/login")
                .form(&[("username", username), ("password", password)]),
        ).await;
        assert_eq!(response.status(), 200);
        assert!(body(response).await.contains("Invalid username/password"));
    }

    let response = send(
        &state,
        RequestBuilder::new(Method::POST, "/login").form(&[("username", "Blitty")]),
    ).await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_be_a_color() {
    let state = state();
    for white in ["#ffffff", "#FFFFFF", "#FfFfFf"] {
        let response = send(
            &state,
            RequestBuilder::new(Method::POST, "/be_a_color").form(&[("color", white)]),
        ).await;
        assert_eq!(response.status(), 406);
        let page = body(response).await;
        assert!(page.contains("White is not a color you can be."));
        assert!(page.contains("href=\"/be_a_color\""));
    }

    let response = send(
        &state,
        RequestBuilder::new(Method::POST, "/be_a_color").form(&[("color", "#112233")]),
    ).await;
    assert_eq!(response.status(), 302);
    assert_eq!(header_value(&response, header::LOCATION), "/color/112233");

    let response = send(
        &state,
        RequestBuilder::new(Method::POST, "/be_a_color").form(&[("color", "blue")]),
    ).await;
    assert_eq!(response.status(), 418);
    assert_eq!(body(response).await, "418 I'm a teapot");

    let page = body(get(&state, "/color/112233").await).await;
    assert!(page.contains("You are #112233"));
}

#[tokio::test]
async fn test_cookies() {
    let state = state();
    let response = get(&state, "/cookie4u").await;
    assert_eq!(cookie_header(&response), "nname=Blitty");
    assert!(header_value(&response, header::SET_COOKIE).contains("Path=/"));

    let response = send(
        &state,
        RequestBuilder::new(Method::GET, "/give_me_cookie").header(header::COOKIE, "nname=Blitty"),
    ).await;
    assert!(body(response).await.contains("Hello Blitty!"));
    assert!(body(get(&state, "/give_me_cookie").await).await.contains("Hello, World!"));
}

#[tokio::test]
async fn test_candie_session_flow() {
    let state = state();
    let response = get(&state, "/candie").await;
    assert_eq!(response.status(), 404);
    assert_eq!(body(response).await, "You have no candie");

    let response = send(
        &state,
        RequestBuilder::new(Method::POST, "/get_candie").form(&[("candie", "rock")]),
    ).await;
    assert_eq!(response.status(), 302);
    assert_eq!(header_value(&response, header::LOCATION), "/candie");
    let cookies = cookie_header(&response);
    assert!(cookies.starts_with("session="));

    let response = send(
        &state,
        RequestBuilder::new(Method::GET, "/candie").header(header::COOKIE, &cookies),
    ).await;
    assert_eq!(response.status(), 200);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(body(response).await, "You have a rock candie");

    let response = send(
        &state,
        RequestBuilder::new(Method::GET, "/candie_out").header(header::COOKIE, &cookies),
    ).await;
    assert_eq!(response.status(), 302);
    assert_eq!(header_value(&response, header::LOCATION), "/chao/rock");
    assert!(header_value(&response, header::SET_COOKIE).starts_with("session=;"));

    assert_eq!(body(get(&state, "/chao/rock").await).await, "Chao rock!");
}

#[tokio::test]
async fn test_tampered_session_is_ignored() {
    let state = state();
    let response = send(
        &state,
        RequestBuilder::new(Method::POST, "/get_candie").form(&[("candie", "rock")]),
    ).await;
    let tampered = cookie_header(&response).replace("rock", "lime");

    let response = send(
        &state,
        RequestBuilder::new(Method::GET, "/candie").header(header::COOKIE, &tampered),
    ).await;
    assert_eq!(body(response).await, "You have no candie");
}

#[tokio::test]
async fn test_unusable_candie_rejected() {
    let state = state();
    let response = send(
        &state,
        RequestBuilder::new(Method::POST, "/get_candie").form(&[("candie", "a/b")]),
    ).await;
    assert_eq!(response.status(), 400);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_about_me() {
    let state = state();
    let value: serde_json::Value = serde_json::from_str(&body(get(&state, "/about_me").await).await).unwrap();
    assert_eq!(value["username"], "Blitty");
}

fn multipart(filename: &str) -> RequestBuilder {
    let body = format!(
        "--XyZ\r\n\
         Content-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\n\
         Content-Type: image/png\r\n\r\n\
         \u{89}PNG\r\n\
         --XyZ--\r\n"
    );
    RequestBuilder::new(Method::POST, "/upload_img")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XyZ")
        .body(body)
}

#[tokio::test]
async fn test_upload_keeps_only_png() {
    let dir = std::env::temp_dir().join(format!("quickstart-upload-{}", std::process::id()));
    let mut config = test_config();
    config.app.upload_dir = dir.to_string_lossy().into_owned();
    let state = build_state(config).unwrap();

    let response = send(&state, multipart("../cat.PNG")).await;
    assert_eq!(response.status(), 200);
    assert!(body(response).await.contains("Saved ..cat.PNG"));
    assert!(dir.join("..cat.PNG").is_file());

    let response = send(&state, multipart("dog.jpg")).await;
    assert_eq!(response.status(), 200);
    assert!(!body(response).await.contains("Saved"));
    assert!(!dir.join("dog.jpg").exists());

    let response = send(
        &state,
        RequestBuilder::new(Method::POST, "/upload_img")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XyZ")
            .body("--XyZ--\r\n"),
    ).await;
    assert_eq!(response.status(), 400);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_upload_handler_leaves_write_to_dispatcher() {
    let dir = std::env::temp_dir().join(format!("quickstart-deferred-{}", std::process::id()));
    let mut config = test_config();
    config.app.upload_dir = dir.to_string_lossy().into_owned();
    let state = build_state(config).unwrap();
    let request = multipart("cat.png").build().unwrap();

    let mut ctx = Context::new(&state, &request, Params::default());
    let reply = handlers::upload_img(&mut ctx).unwrap();
    match reply {
        Reply::Save { path, contents, then } => {
            assert_eq!(path, dir.join("cat.png"));
            assert_eq!(&contents[..], "\u{89}PNG".as_bytes());
            assert!(matches!(*then, Reply::Html(ref page) if page.contains("Saved cat.png")));
        }
        other => panic!("expected a pending save, got {other:?}"),
    }
    assert!(!dir.exists());
}

#[tokio::test]
async fn test_failed_upload_write_is_500() {
    let blocker = std::env::temp_dir().join(format!("quickstart-blocker-{}", std::process::id()));
    std::fs::write(&blocker, b"not a directory").unwrap();
    let mut config = test_config();
    config.app.upload_dir = blocker.join("uploads").to_string_lossy().into_owned();
    let state = build_state(config).unwrap();

    let response = send(&state, multipart("cat.png")).await;
    assert_eq!(response.status(), 500);
    assert_eq!(body(response).await, "500 Internal Server Error");

    std::fs::remove_file(&blocker).unwrap();
}
