//! Serving layer (the gateway)
//!
//! Owns all network and concurrency concerns: tokio runtime, TCP listener,
//! hyper HTTP/1.1 connections, keep-alive and per-connection timeouts.
//! Each hyper request is converted into a CGI-style [`Environ`], handed to
//! [`App::call`], and the rendered envelope is converted back into a hyper
//! response. The framework core below this layer is synchronous and does
//! no locking.

use crate::app::App;
use crate::config::ServerConfig;
use crate::logger;
use crate::request::Environ;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use socket2::{Domain, Protocol, Socket, Type};
use std::collections::HashMap;
use std::convert::Infallible;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Build the runtime and serve `app` forever. No graceful shutdown path.
pub fn run(app: App, config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = config.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(serve(app, config))
}

async fn serve(app: App, config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.socket_addr()?;
    let listener = create_listener(addr)?;

    logger::log_server_start(&addr, &config);

    let app = Arc::new(app);
    let config = Arc::new(config);
    let connections = Arc::new(AtomicUsize::new(0));

    // LocalSet so connection tasks may hold non-Send request state.
    let local = tokio::task::LocalSet::new();
    local
        .run_until(accept_loop(listener, app, config, connections))
        .await
}

async fn accept_loop(
    listener: TcpListener,
    app: Arc<App>,
    config: Arc<ServerConfig>,
    connections: Arc<AtomicUsize>,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                accept_connection(stream, peer_addr, &app, &config, &connections);
            }
            Err(e) => logger::log_error(&format!("failed to accept connection: {e}")),
        }
    }
}

/// Accept one connection: count it, enforce the connection limit, and hand
/// it to a spawned task.
fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    app: &Arc<App>,
    config: &Arc<ServerConfig>,
    connections: &Arc<AtomicUsize>,
) {
    // Increment first, then check, so concurrent accepts cannot slip past
    // the limit.
    let prev_count = connections.fetch_add(1, Ordering::SeqCst);
    if let Some(max) = config.max_connections {
        if prev_count >= max as usize {
            connections.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "max connections reached: {prev_count}/{max}, rejecting {peer_addr}"
            ));
            drop(stream);
            return;
        }
    }

    handle_connection(
        stream,
        peer_addr,
        Arc::clone(app),
        Arc::clone(config),
        Arc::clone(connections),
    );
}

/// Serve one HTTP/1.1 connection in a spawned task, with keep-alive and a
/// whole-connection timeout, decrementing the counter when done.
fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    app: Arc<App>,
    config: Arc<ServerConfig>,
    connections: Arc<AtomicUsize>,
) {
    tokio::task::spawn_local(async move {
        let io = TokioIo::new(stream);
        let timeout_duration = std::time::Duration::from_secs(config.connection_timeout);

        let mut builder = http1::Builder::new();
        builder.keep_alive(config.keep_alive);

        let conn = builder.serve_connection(
            io,
            service_fn(move |req| {
                let app = Arc::clone(&app);
                let config = Arc::clone(&config);
                async move { handle_request(req, &app, &config, peer_addr).await }
            }),
        );

        match tokio::time::timeout(timeout_duration, conn).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => logger::log_connection_error(&err),
            Err(_) => logger::log_warning(&format!(
                "connection from {peer_addr} timed out after {}s",
                timeout_duration.as_secs()
            )),
        }

        connections.fetch_sub(1, Ordering::SeqCst);
    });
}

/// Convert one hyper request into an environ, run the app, convert the
/// envelope back. App-level 404/405 are ordinary responses here; only
/// environ construction and body-parse faults map to a gateway 500.
async fn handle_request(
    req: hyper::Request<Incoming>,
    app: &App,
    config: &ServerConfig,
    peer_addr: SocketAddr,
) -> Result<hyper::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            logger::log_error(&format!("failed to read request body: {e}"));
            return Ok(plain_response(400, "400 Bad Request"));
        }
    };

    let environ = build_environ(&parts, &body, peer_addr);

    let mut status_line = String::new();
    let envelope = match app.call(environ, |line, _| status_line.push_str(line)) {
        Ok(envelope) => envelope,
        Err(e) => {
            logger::log_error(&format!("request to {} failed: {e}", parts.uri.path()));
            return Ok(plain_response(500, "500 Internal Server Error"));
        }
    };

    if config.access_log {
        logger::log_access(
            &peer_addr.ip().to_string(),
            parts.method.as_str(),
            parts.uri.path(),
            &status_line,
            envelope.body.len(),
        );
    }

    let mut builder = hyper::Response::builder().status(envelope.code);
    for (name, value) in &envelope.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    let response = builder
        .body(Full::new(Bytes::from(envelope.body)))
        .unwrap_or_else(|e| {
            logger::log_error(&format!("failed to build response: {e}"));
            plain_response(500, "500 Internal Server Error")
        });

    Ok(response)
}

/// Map a hyper request head and collected body into the CGI-style call
/// environment the framework core consumes.
fn build_environ(
    parts: &hyper::http::request::Parts,
    body: &Bytes,
    peer_addr: SocketAddr,
) -> Environ {
    let mut meta = HashMap::new();
    meta.insert(
        "REQUEST_METHOD".to_string(),
        parts.method.as_str().to_string(),
    );
    meta.insert("PATH_INFO".to_string(), parts.uri.path().to_string());
    meta.insert(
        "QUERY_STRING".to_string(),
        parts.uri.query().unwrap_or("").to_string(),
    );
    meta.insert("REMOTE_ADDR".to_string(), peer_addr.ip().to_string());

    for (name, value) in &parts.headers {
        // Header values are opaque bytes in hyper; non-text values have no
        // place in a string environ and are skipped.
        let Ok(value) = value.to_str() else { continue };
        let key = match name.as_str() {
            "content-type" => "CONTENT_TYPE".to_string(),
            "content-length" => "CONTENT_LENGTH".to_string(),
            other => format!("HTTP_{}", other.to_ascii_uppercase().replace('-', "_")),
        };
        meta.insert(key, value.to_string());
    }

    Environ::with_input(meta, Box::new(Cursor::new(body.to_vec())))
}

fn plain_response(code: u16, body: &'static str) -> hyper::Response<Full<Bytes>> {
    hyper::Response::builder()
        .status(code)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| hyper::Response::new(Full::new(Bytes::from(body))))
}

/// Create a non-blocking TCP listener with `SO_REUSEADDR` so restarts can
/// rebind a port still in `TIME_WAIT`.
fn create_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(128)?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;

    fn parts_for(
        method: &str,
        uri: &str,
        headers: &[(&str, &str)],
    ) -> hyper::http::request::Parts {
        let mut builder = hyper::Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn test_build_environ_core_keys() {
        let parts = parts_for("POST", "/submit?a=1&b=2", &[]);
        let peer: SocketAddr = "10.1.2.3:5555".parse().unwrap();
        let environ = build_environ(&parts, &Bytes::new(), peer);

        assert_eq!(environ.get("REQUEST_METHOD"), Some("POST"));
        assert_eq!(environ.get("PATH_INFO"), Some("/submit"));
        assert_eq!(environ.get("QUERY_STRING"), Some("a=1&b=2"));
        assert_eq!(environ.get("REMOTE_ADDR"), Some("10.1.2.3"));
    }

    #[test]
    fn test_build_environ_header_mapping() {
        let parts = parts_for(
            "POST",
            "/x",
            &[
                ("Content-Type", "text/plain"),
                ("Content-Length", "4"),
                ("X-Request-Id", "abc"),
            ],
        );
        let peer: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let environ = build_environ(&parts, &Bytes::from_static(b"data"), peer);

        assert_eq!(environ.get("CONTENT_TYPE"), Some("text/plain"));
        assert_eq!(environ.get("CONTENT_LENGTH"), Some("4"));
        assert_eq!(environ.get("HTTP_X_REQUEST_ID"), Some("abc"));
    }

    #[test]
    fn test_build_environ_feeds_request_adapter() {
        let parts = parts_for(
            "POST",
            "/upload",
            &[("Content-Type", "text/plain"), ("Content-Length", "5")],
        );
        let peer: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let environ = build_environ(&parts, &Bytes::from_static(b"hello"), peer);

        let request = Request::from_environ(environ).unwrap();
        assert_eq!(request.method(), "POST");
        assert_eq!(request.path(), "/upload");
        assert_eq!(request.content_length(), 5);
        match request.body().unwrap() {
            crate::request::Body::Raw(bytes) => assert_eq!(bytes, b"hello"),
            crate::request::Body::Form(_) => panic!("expected raw body"),
        }
    }

    #[test]
    fn test_build_environ_skips_non_text_header_values() {
        let mut parts = parts_for("GET", "/", &[]);
        parts.headers.insert(
            "x-binary",
            hyper::header::HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap(),
        );
        let peer: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let environ = build_environ(&parts, &Bytes::new(), peer);
        assert_eq!(environ.get("HTTP_X_BINARY"), None);
    }

    #[test]
    fn test_plain_response_shape() {
        let response = plain_response(500, "500 Internal Server Error");
        assert_eq!(response.status(), 500);
        assert_eq!(
            response.headers().get("Content-Type").unwrap(),
            "text/plain"
        );
    }
}
