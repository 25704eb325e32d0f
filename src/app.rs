//! Application, route table, and dispatcher
//!
//! An [`App`] owns an exact-match route table: path string to allowed
//! methods plus handler. Dispatch is a stateless three-way branch per
//! call: no route yields 404, a disallowed method yields 405, otherwise
//! the handler runs once and its result renders with status 200.
//!
//! Routes are registered before serving starts; the table is read-only
//! while serving.

use crate::config::ServerConfig;
use crate::error::FrameworkError;
use crate::request::{Environ, Request};
use crate::response::{Envelope, HandlerResult, Response};
use crate::server;
use std::collections::{HashMap, HashSet};

/// Boxed handler: takes the request view, returns something renderable.
pub type Handler = Box<dyn Fn(&Request) -> HandlerResult + Send + Sync>;

/// One registered route: the allowed methods and the handler.
pub struct RouteEntry {
    methods: HashSet<String>,
    handler: Handler,
}

impl RouteEntry {
    pub fn allows(&self, method: &str) -> bool {
        self.methods.contains(method)
    }
}

/// The application object: route table plus the gateway entry point.
#[derive(Default)]
pub struct App {
    routes: HashMap<String, RouteEntry>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` at `path` for the given methods.
    ///
    /// Methods are stored as given, with no case normalization or
    /// validation. Registering the same path again replaces the previous
    /// entry; the last registration wins.
    pub fn route<H, R>(&mut self, path: &str, methods: &[&str], handler: H)
    where
        H: Fn(&Request) -> R + Send + Sync + 'static,
        R: Into<HandlerResult>,
    {
        let entry = RouteEntry {
            methods: methods.iter().map(|m| (*m).to_string()).collect(),
            handler: Box::new(move |request| handler(request).into()),
        };
        self.routes.insert(path.to_string(), entry);
    }

    /// Register a GET-only route.
    pub fn get<H, R>(&mut self, path: &str, handler: H)
    where
        H: Fn(&Request) -> R + Send + Sync + 'static,
        R: Into<HandlerResult>,
    {
        self.route(path, &["GET"], handler);
    }

    /// Resolve a request against the route table.
    pub fn dispatch(&self, request: &Request) -> Response {
        match self.routes.get(request.path()) {
            None => Response::empty(404),
            Some(entry) if !entry.allows(request.method()) => Response::empty(405),
            Some(entry) => Response::new(200, (entry.handler)(request)),
        }
    }

    /// Gateway entry point: build the request view, dispatch, render.
    ///
    /// `start_response` is invoked exactly once with the status line and
    /// header list before the body bytes are returned. Environment and
    /// body-parse faults propagate to the caller's own fault handling.
    pub fn call<F>(&self, environ: Environ, start_response: F) -> Result<Envelope, FrameworkError>
    where
        F: FnOnce(&str, &[(String, String)]),
    {
        let request = Request::from_environ(environ)?;
        Ok(self.dispatch(&request).render(start_response))
    }

    /// Serve the application forever on `host:port`.
    ///
    /// An empty host binds all interfaces. Remaining server settings come
    /// from the environment-backed [`ServerConfig`].
    pub fn run(self, host: &str, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let mut config = ServerConfig::load()?;
        config.host = host.to_string();
        config.port = port;
        server::run(self, config)
    }

    /// Serve with an explicit configuration.
    pub fn run_with_config(self, config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
        server::run(self, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn request(method: &str, path: &str) -> Request {
        let meta: HashMap<String, String> = [
            ("REQUEST_METHOD".to_string(), method.to_string()),
            ("PATH_INFO".to_string(), path.to_string()),
        ]
        .into_iter()
        .collect();
        Request::from_environ(Environ::new(meta)).unwrap()
    }

    fn render(response: Response) -> Envelope {
        response.render(|_, _| {})
    }

    #[test]
    fn test_unknown_path_renders_404() {
        let app = App::new();
        let envelope = render(app.dispatch(&request("GET", "/missing")));
        assert_eq!(envelope.code, 404);
        assert_eq!(envelope.body, b"404 Not Found");
    }

    #[test]
    fn test_wrong_method_renders_405() {
        let mut app = App::new();
        app.get("/only-get", |_| "ok");

        let envelope = render(app.dispatch(&request("POST", "/only-get")));
        assert_eq!(envelope.code, 405);
        assert_eq!(envelope.body, b"405 Method Not Allowed");
    }

    #[test]
    fn test_matching_route_invokes_handler_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut app = App::new();
        app.route("/hello", &["GET", "POST"], move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            "hello"
        });

        let envelope = render(app.dispatch(&request("POST", "/hello")));
        assert_eq!(envelope.code, 200);
        assert_eq!(envelope.body, b"hello");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_headers_reach_the_envelope() {
        let mut app = App::new();
        app.get("/headers", |_| {
            ("body", vec![("X-Foo".to_string(), "bar".to_string())])
        });

        let envelope = render(app.dispatch(&request("GET", "/headers")));
        assert_eq!(envelope.code, 200);
        assert_eq!(envelope.body, b"body");
        assert_eq!(envelope.headers[0], ("X-Foo".to_string(), "bar".to_string()));
        assert_eq!(
            envelope.headers[1],
            ("Content-Type".to_string(), "text/html".to_string())
        );
    }

    #[test]
    fn test_methods_are_not_normalized() {
        let mut app = App::new();
        app.route("/lower", &["get"], |_| "ok");

        // "GET" does not match the registered lowercase "get".
        let envelope = render(app.dispatch(&request("GET", "/lower")));
        assert_eq!(envelope.code, 405);

        let envelope = render(app.dispatch(&request("get", "/lower")));
        assert_eq!(envelope.code, 200);
    }

    #[test]
    fn test_last_registration_wins() {
        let mut app = App::new();
        app.get("/page", |_| "first");
        app.get("/page", |_| "second");

        let envelope = render(app.dispatch(&request("GET", "/page")));
        assert_eq!(envelope.body, b"second");

        let envelope = render(app.dispatch(&request("GET", "/page")));
        assert_eq!(envelope.body, b"second");
    }

    #[test]
    fn test_handler_cannot_control_dispatcher_error_body() {
        let mut app = App::new();
        app.get("/page", |_| "handler body");

        // The handler never runs for a 405; the rendered body is the
        // status line, not anything handler-supplied.
        let envelope = render(app.dispatch(&request("DELETE", "/page")));
        assert_eq!(envelope.body, b"405 Method Not Allowed");
    }

    #[test]
    fn test_call_builds_request_and_starts_response_once() {
        let mut app = App::new();
        app.get("/greet", |req| {
            let name = req
                .query()
                .and_then(|q| q.get("name"))
                .and_then(|values| values.first())
                .cloned()
                .unwrap_or_else(|| "world".to_string());
            format!("hello {name}")
        });

        let meta: HashMap<String, String> = [
            ("REQUEST_METHOD".to_string(), "GET".to_string()),
            ("PATH_INFO".to_string(), "/greet".to_string()),
            ("QUERY_STRING".to_string(), "name=rust".to_string()),
        ]
        .into_iter()
        .collect();

        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let envelope = app
            .call(Environ::new(meta), |line, _| {
                seen.set(seen.get() + 1);
                assert_eq!(line, "200 OK");
            })
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(envelope.body, b"hello rust");
    }

    #[test]
    fn test_call_propagates_environ_faults() {
        let app = App::new();
        let err = app
            .call(Environ::new(HashMap::new()), |_, _| {})
            .unwrap_err();
        assert!(matches!(err, FrameworkError::MissingMeta(_)));
    }
}
