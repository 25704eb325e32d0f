//! Response rendering module
//!
//! Normalizes a handler's return value plus a status code into an
//! [`Envelope`]: status line, ordered header list, one body chunk. The
//! renderer injects `Content-Type: text/html` when the handler supplied no
//! content type, and for any 4xx/5xx status it discards the handler body
//! and emits the status-line text instead. That overwrite is a documented
//! behavior of this framework; handlers cannot control error bodies.

pub mod status;

/// Body value a handler can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// UTF-8 text, encoded as-is.
    Text(String),
    /// Raw bytes, emitted unchanged.
    Bytes(Vec<u8>),
    /// A JSON value, serialized to text before encoding.
    Json(serde_json::Value),
}

impl ResponseBody {
    /// Encode the body into the bytes put on the wire.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(text) => text.into_bytes(),
            Self::Bytes(bytes) => bytes,
            Self::Json(value) => value.to_string().into_bytes(),
        }
    }
}

impl From<&str> for ResponseBody {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ResponseBody {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for ResponseBody {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<serde_json::Value> for ResponseBody {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// Ordered header list; emission order is insertion order.
pub type HeaderList = Vec<(String, String)>;

/// What a handler returns: a body, or a body plus extra headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerResult {
    Body(ResponseBody),
    WithHeaders(ResponseBody, HeaderList),
}

impl From<ResponseBody> for HandlerResult {
    fn from(body: ResponseBody) -> Self {
        Self::Body(body)
    }
}

impl From<&str> for HandlerResult {
    fn from(body: &str) -> Self {
        Self::Body(body.into())
    }
}

impl From<String> for HandlerResult {
    fn from(body: String) -> Self {
        Self::Body(body.into())
    }
}

impl From<Vec<u8>> for HandlerResult {
    fn from(body: Vec<u8>) -> Self {
        Self::Body(body.into())
    }
}

impl From<serde_json::Value> for HandlerResult {
    fn from(body: serde_json::Value) -> Self {
        Self::Body(body.into())
    }
}

impl<B: Into<ResponseBody>> From<(B, HeaderList)> for HandlerResult {
    fn from((body, headers): (B, HeaderList)) -> Self {
        Self::WithHeaders(body.into(), headers)
    }
}

/// The fully rendered response, ready for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub code: u16,
    pub status_line: String,
    pub headers: HeaderList,
    pub body: Vec<u8>,
}

/// Pending response: status code, body, headers after default injection.
#[derive(Debug)]
pub struct Response {
    code: u16,
    body: ResponseBody,
    headers: HeaderList,
}

impl Response {
    /// Destructure a handler result and inject the default content type
    /// when no header key case-insensitively contains `content-type`.
    pub fn new(code: u16, result: HandlerResult) -> Self {
        let (body, mut headers) = match result {
            HandlerResult::Body(body) => (body, Vec::new()),
            HandlerResult::WithHeaders(body, headers) => (body, headers),
        };

        let has_content_type = headers
            .iter()
            .any(|(key, _)| key.to_ascii_lowercase().contains("content-type"));
        if !has_content_type {
            headers.push(("Content-Type".to_string(), "text/html".to_string()));
        }

        Self { code, body, headers }
    }

    /// Response with an empty body, used for dispatcher-generated statuses.
    pub fn empty(code: u16) -> Self {
        Self::new(code, HandlerResult::Body(ResponseBody::Text(String::new())))
    }

    pub const fn code(&self) -> u16 {
        self.code
    }

    /// Render the envelope, invoking `start_response` exactly once with
    /// the status line and header list before the body is produced.
    ///
    /// Any 4xx/5xx status replaces the body with the status-line text.
    pub fn render<F>(self, start_response: F) -> Envelope
    where
        F: FnOnce(&str, &[(String, String)]),
    {
        let status_line = status::status_line(self.code);

        let body = if (400..600).contains(&self.code) {
            status_line.clone().into_bytes()
        } else {
            self.body.into_bytes()
        };

        start_response(&status_line, &self.headers);

        Envelope {
            code: self.code,
            status_line,
            headers: self.headers,
            body,
        }
    }
}
