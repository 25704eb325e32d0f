//! Minimal exact-path web microframework.
//!
//! An [`App`] maps exact path strings to handlers. Each inbound call
//! arrives as a CGI-style [`Environ`] (built by the hyper serving layer,
//! or by hand in tests), is wrapped in a [`Request`], dispatched, and the
//! handler's result is rendered into an [`Envelope`].
//!
//! ```no_run
//! use miniweb::App;
//!
//! let mut app = App::new();
//! app.get("/", |_req| "<h1>hello</h1>");
//! app.route("/echo", &["POST"], |req| format!("{} bytes", req.content_length()));
//! app.run("", 8080).unwrap();
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod logger;
pub mod request;
pub mod response;
pub mod server;

pub use app::{App, Handler, RouteEntry};
pub use config::ServerConfig;
pub use error::FrameworkError;
pub use request::form::{FormValue, UploadedFile};
pub use request::{Body, Environ, Request};
pub use response::{Envelope, HandlerResult, HeaderList, Response, ResponseBody};
