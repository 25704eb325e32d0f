//! Request adapter module
//!
//! Wraps the gateway's per-call environment (CGI-style metadata plus an
//! input stream) into a structured, read-only [`Request`]. The header map
//! is computed once at construction; query and body are memoized lazy
//! fields that are computed at most once per request.

pub mod form;
pub mod query;

use crate::error::FrameworkError;
use form::FormValue;
use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;

/// Metadata keys exposed through [`Request::headers`] besides the
/// `HTTP_`-prefixed request headers. Everything else is dropped.
const WANTED_HEADERS: [&str; 5] = [
    "REQUEST_METHOD",
    "PATH_INFO",
    "REMOTE_ADDR",
    "REMOTE_HOST",
    "CONTENT_TYPE",
];

/// Prefix the gateway puts on client-supplied request headers.
const HEADER_PREFIX: &str = "HTTP_";

/// One inbound call as handed over by the gateway: a metadata mapping and
/// the request input stream.
pub struct Environ {
    meta: HashMap<String, String>,
    input: Box<dyn Read + Send>,
}

impl Environ {
    /// Environment with no request body.
    pub fn new(meta: HashMap<String, String>) -> Self {
        Self::with_input(meta, Box::new(std::io::empty()))
    }

    /// Environment with a request body stream.
    pub fn with_input(meta: HashMap<String, String>, input: Box<dyn Read + Send>) -> Self {
        Self { meta, input }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }
}

/// Parsed request body.
#[derive(Debug, PartialEq, Eq)]
pub enum Body {
    /// Raw bytes, read up to the declared content length.
    Raw(Vec<u8>),
    /// Decoded form fields (urlencoded or multipart).
    Form(HashMap<String, FormValue>),
}

/// Read-only view over one inbound call.
///
/// Created once per call, immutable after construction except for the
/// memoized `query` and `body` slots.
pub struct Request {
    meta: HashMap<String, String>,
    input: RefCell<Box<dyn Read + Send>>,
    headers: HashMap<String, String>,
    method: String,
    path: String,
    content_length: usize,
    content_type: String,
    query: OnceCell<Option<HashMap<String, Vec<String>>>>,
    body: OnceCell<Body>,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("meta", &self.meta)
            .field("headers", &self.headers)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl Request {
    /// Build a request from the gateway environment.
    ///
    /// Fails fast with [`FrameworkError::MissingMeta`] when
    /// `REQUEST_METHOD` or `PATH_INFO` is absent.
    pub fn from_environ(environ: Environ) -> Result<Self, FrameworkError> {
        let Environ { meta, input } = environ;

        let content_length = meta
            .get("CONTENT_LENGTH")
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        let mut headers = HashMap::new();
        headers.insert("CONTENT_LENGTH".to_string(), content_length.to_string());
        for (key, value) in &meta {
            if WANTED_HEADERS.contains(&key.as_str()) || key.starts_with(HEADER_PREFIX) {
                headers.insert(key.clone(), value.clone());
            }
        }

        let method = headers
            .get("REQUEST_METHOD")
            .cloned()
            .ok_or(FrameworkError::MissingMeta("REQUEST_METHOD"))?;
        let path = headers
            .get("PATH_INFO")
            .cloned()
            .ok_or(FrameworkError::MissingMeta("PATH_INFO"))?;
        let content_type = headers.get("CONTENT_TYPE").cloned().unwrap_or_default();

        Ok(Self {
            meta,
            input: RefCell::new(input),
            headers,
            method,
            path,
            content_length,
            content_type,
            query: OnceCell::new(),
            body: OnceCell::new(),
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub const fn content_length(&self) -> usize {
        self.content_length
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Filtered metadata: `CONTENT_LENGTH` (normalized), the allow-listed
    /// keys, and every `HTTP_`-prefixed entry.
    pub const fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Parsed query parameters, or `None` when the call carried no query
    /// string. Computed on first access, cached afterwards.
    pub fn query(&self) -> Option<&HashMap<String, Vec<String>>> {
        self.query
            .get_or_init(|| {
                self.meta
                    .get("QUERY_STRING")
                    .filter(|raw| !raw.is_empty())
                    .map(|raw| query::parse(raw))
            })
            .as_ref()
    }

    /// Parsed request body. Computed on first access, cached afterwards;
    /// the input stream is read at most once.
    ///
    /// A content type containing `form` selects form decoding (multipart
    /// when a boundary is declared, urlencoded otherwise); anything else
    /// yields the raw bytes up to the declared content length.
    pub fn body(&self) -> Result<&Body, FrameworkError> {
        if let Some(body) = self.body.get() {
            return Ok(body);
        }
        let parsed = self.parse_body()?;
        Ok(self.body.get_or_init(|| parsed))
    }

    fn parse_body(&self) -> Result<Body, FrameworkError> {
        let content_type = self.content_type.to_ascii_lowercase();
        let raw = self.read_input()?;

        if content_type.contains("form") {
            let fields = if content_type.contains("multipart") {
                let boundary = form::boundary(&self.content_type)?;
                form::parse_multipart(&raw, &boundary)?
            } else {
                form::parse_urlencoded(&raw)
            };
            Ok(Body::Form(fields))
        } else {
            Ok(Body::Raw(raw))
        }
    }

    /// Read at most `content_length` bytes from the input stream. Short
    /// input returns short per the stream's own contract.
    fn read_input(&self) -> Result<Vec<u8>, FrameworkError> {
        let mut buf = Vec::with_capacity(self.content_length);
        self.input
            .borrow_mut()
            .by_ref()
            .take(self.content_length as u64)
            .read_to_end(&mut buf)?;
        Ok(buf)
    }
}
