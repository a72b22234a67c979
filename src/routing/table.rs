//! Route table
//!
//! Built once at startup through explicit `register` calls, then shared
//! read-only. Routes are tried in registration order; the first route whose
//! pattern and method both match wins.

use hyper::Method;

use super::converter::Value;
use super::errors::RoutingError;
use super::params::Params;
use super::pattern::{split_path, RoutePattern};

#[derive(Debug)]
pub struct Route<H> {
    name: String,
    methods: Vec<Method>,
    pattern: RoutePattern,
    handler: H,
}

impl<H> Route<H> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub const fn handler(&self) -> &H {
        &self.handler
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// `HEAD` is served wherever `GET` is
    pub fn allows(&self, method: &Method) -> bool {
        self.methods.contains(method) || (*method == Method::HEAD && self.methods.contains(&Method::GET))
    }
}

/// A successful resolution
#[derive(Debug)]
pub struct Resolved<'a, H> {
    pub route: &'a Route<H>,
    pub params: Params,
}

#[derive(Debug)]
pub struct RouteTable<H> {
    routes: Vec<Route<H>>,
}

impl<H> Default for RouteTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> RouteTable<H> {
    pub const fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Add a route. An empty method set means `GET` only.
    pub fn register(
        &mut self,
        methods: &[Method],
        pattern: &str,
        handler: H,
        name: &str,
    ) -> Result<(), RoutingError> {
        if self.get(name).is_some() {
            return Err(RoutingError::DuplicateName(name.to_string()));
        }
        let pattern = RoutePattern::parse(pattern)?;
        let methods = if methods.is_empty() {
            vec![Method::GET]
        } else {
            methods.to_vec()
        };
        self.routes.push(Route {
            name: name.to_string(),
            methods,
            pattern,
            handler,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Route<H>> {
        self.routes.iter().find(|r| r.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route<H>> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }


    /// Find the route serving `method` on `path`
    pub fn resolve(&self, method: &Method, path: &str) -> Result<Resolved<'_, H>, RoutingError> {
        let segments = split_path(path);
        let mut allowed: Vec<Method> = Vec::new();

        for route in &self.routes {
            let Some(params) = route.pattern.match_segments(&segments) else {
                continue;
            };
            if route.allows(method) {
                return Ok(Resolved { route, params });
            }
            for m in route.methods() {
                push_unique(&mut allowed, m.clone());
            }
        }

        if !allowed.is_empty() {
            if allowed.contains(&Method::GET) {
                push_unique(&mut allowed, Method::HEAD);
            }
            push_unique(&mut allowed, Method::OPTIONS);
            return Err(RoutingError::MethodNotAllowed {
                method: method.clone(),
                path: path.to_string(),
                allowed,
            });
        }

        if !path.ends_with('/') {
            let with_slash = format!("{path}/");
            let slashed = split_path(&with_slash);
            if self.routes.iter().any(|r| r.pattern.match_segments(&slashed).is_some()) {
                return Err(RoutingError::RedirectSlash { location: with_slash });
            }
        }

        Err(RoutingError::NotFound(path.to_string()))
    }

    /// Methods accepted on `path` by any route, empty when nothing matches
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let segments = split_path(path);
        let mut allowed = Vec::new();
        for route in self
            .routes
            .iter()
            .filter(|r| r.pattern.match_segments(&segments).is_some())
        {
            for m in route.methods() {
                push_unique(&mut allowed, m.clone());
            }
        }
        if allowed.is_empty() {
            return allowed;
        }
        if allowed.contains(&Method::GET) {
            push_unique(&mut allowed, Method::HEAD);
        }
        push_unique(&mut allowed, Method::OPTIONS);
        allowed
    }

    /// Build the concrete path of a named route.
    ///
    /// Values that do not fill a placeholder become the query string.
    pub fn reverse(&self, name: &str, params: &[(&str, Value)]) -> Result<String, RoutingError> {
        let route = self
            .get(name)
            .ok_or_else(|| RoutingError::UnknownRoute(name.to_string()))?;
        let (mut path, extra) = route.pattern.build(name, params)?;

        if !extra.is_empty() {
            let mut query = form_urlencoded::Serializer::new(String::new());
            for (key, value) in extra {
                query.append_pair(key, &value.to_url_text());
            }
            path.push('?');
            path.push_str(&query.finish());
        }
        Ok(path)
    }
}

fn push_unique(methods: &mut Vec<Method>, method: Method) {
    if !methods.contains(&method) {
        methods.push(method);
    }
}

/// Render an `Allow` header value
pub fn allow_header(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[allow(clippy::approx_constant, clippy::float_cmp)]
mod tests {
    use super::*;

    fn quickstart_table() -> RouteTable<&'static str> {
        let mut table = RouteTable::new();
        let routes: Vec<(Vec<Method>, &'static str, &'static str)> = vec![
            (vec![], "/", "index"),
            (vec![], "/hello/", "hello"),
            (vec![], "/hello/<string:name>", "hello_name"),
            (vec![Method::POST], "/post", "test_post"),
            (vec![], "/user/<userName>", "show_user"),
            (vec![], "/hero/<int:hero_id>", "show_hero"),
            (vec![], "/goto/<path:subpath>", "goto"),
            (vec![], "/giveMePI/<float:PInum>", "show_pi"),
            (vec![Method::GET, Method::POST], "/login", "login"),
        ];
        for (methods, pattern, name) in routes {
            table.register(&methods, pattern, name, name).unwrap();
        }
        table
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut table = quickstart_table();
        let err = table.register(&[], "/other", "x", "index").unwrap_err();
        assert_eq!(err, RoutingError::DuplicateName("index".to_string()));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let mut table: RouteTable<()> = RouteTable::new();
        assert!(matches!(
            table.register(&[], "/x/<bogus:y>", (), "x"),
            Err(RoutingError::InvalidPattern { .. })
        ));
        assert!(table.iter().next().is_none());
    }

    #[test]
    fn test_resolve_typed_params() {
        let table = quickstart_table();

        let hero = table.resolve(&Method::GET, "/hero/7").unwrap();
        assert_eq!(*hero.route.handler(), "show_hero");
        assert_eq!(hero.params.get_int("hero_id"), Some(7));

        let pi = table.resolve(&Method::GET, "/giveMePI/3.14").unwrap();
        assert_eq!(pi.params.get_float("PInum"), Some(3.14));

        let goto = table.resolve(&Method::GET, "/goto/a/b/c").unwrap();
        assert_eq!(goto.params.get_str("subpath"), Some("a/b/c"));
    }

    #[test]
    fn test_resolve_coercion_failure_is_not_found() {
        let table = quickstart_table();
        assert_eq!(
            table.resolve(&Method::GET, "/hero/abc").unwrap_err(),
            RoutingError::NotFound("/hero/abc".to_string())
        );
        assert!(matches!(
            table.resolve(&Method::GET, "/giveMePI/pi"),
            Err(RoutingError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolve_method_not_allowed() {
        let table = quickstart_table();
        let err = table.resolve(&Method::GET, "/post").unwrap_err();
        match err {
            RoutingError::MethodNotAllowed { allowed, .. } => {
                assert_eq!(allowed, vec![Method::POST, Method::OPTIONS]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(table.resolve(&Method::HEAD, "/").is_ok());
        assert!(matches!(
            table.resolve(&Method::DELETE, "/login"),
            Err(RoutingError::MethodNotAllowed { .. })
        ));
    }

    #[test]
    fn test_resolve_suggests_trailing_slash() {
        let table = quickstart_table();
        assert_eq!(
            table.resolve(&Method::GET, "/hello").unwrap_err(),
            RoutingError::RedirectSlash {
                location: "/hello/".to_string()
            }
        );
    }

    #[test]
    fn test_registration_order_breaks_ties() {
        let mut table = RouteTable::new();
        table.register(&[], "/item/<int:id>", "int", "by_id").unwrap();
        table.register(&[], "/item/<name>", "string", "by_name").unwrap();
        assert_eq!(*table.resolve(&Method::GET, "/item/5").unwrap().route.handler(), "int");
        assert_eq!(*table.resolve(&Method::GET, "/item/five").unwrap().route.handler(), "string");
    }

    #[test]
    fn test_reverse_with_query() {
        let table = quickstart_table();
        assert_eq!(table.reverse("index", &[]).unwrap(), "/");
        assert_eq!(table.reverse("hello", &[]).unwrap(), "/hello/");
        assert_eq!(
            table
                .reverse("show_pi", &[("PInum", Value::Float(3.141_516_7)), ("next", "/".into())])
                .unwrap(),
            "/giveMePI/3.1415167?next=%2F"
        );
        assert_eq!(
            table.reverse("show_user", &[("userName", "John Doe".into())]).unwrap(),
            "/user/John%20Doe"
        );
    }

    #[test]
    fn test_reverse_errors() {
        let table = quickstart_table();
        assert_eq!(
            table.reverse("nope", &[]).unwrap_err(),
            RoutingError::UnknownRoute("nope".to_string())
        );
        assert!(matches!(
            table.reverse("show_hero", &[]),
            Err(RoutingError::MissingParameter { .. })
        ));
        assert!(matches!(
            table.reverse("show_hero", &[("hero_id", "abc".into())]),
            Err(RoutingError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_reverse_then_resolve_round_trips() {
        let table = quickstart_table();
        let cases: Vec<(&str, Vec<(&str, Value)>)> = vec![
            ("index", vec![]),
            ("hello", vec![]),
            ("hello_name", vec![("name", "Blitty".into())]),
            ("test_post", vec![]),
            ("show_user", vec![("userName", "John Doe?#%".into())]),
            ("show_hero", vec![("hero_id", Value::Int(12))]),
            ("goto", vec![("subpath", Value::Path("a/b c/d".to_string()))]),
            ("show_pi", vec![("PInum", Value::Float(3.0))]),
            ("login", vec![]),
        ];

        for (name, params) in cases {
            let path = table.reverse(name, &params).unwrap();
            let route = table.get(name).unwrap();
            let method = route.methods()[0].clone();
            let resolved = table.resolve(&method, &path).unwrap();
            assert_eq!(resolved.route.name(), name, "{path}");
            for (key, value) in &params {
                assert_eq!(resolved.params.get(key), Some(value), "{name}: {key}");
            }
        }
    }

    #[test]
    fn test_allowed_methods() {
        let table = quickstart_table();
        assert_eq!(
            table.allowed_methods("/login"),
            vec![Method::GET, Method::POST, Method::HEAD, Method::OPTIONS]
        );
        assert!(table.allowed_methods("/missing").is_empty());
        assert_eq!(allow_header(&table.allowed_methods("/post")), "POST, OPTIONS");
    }
}
