//! Framework error types
//!
//! Every in-band failure (missing route, wrong method) is reported as an
//! HTTP response, never as an error. `FrameworkError` covers the faults
//! that escape that model and propagate to the serving layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameworkError {
    /// A required metadata key was absent from the call environment.
    #[error("missing required environ key: {0}")]
    MissingMeta(&'static str),

    /// The request body claimed to be a form but could not be parsed.
    #[error("malformed form payload: {0}")]
    MalformedForm(String),

    /// The configured host/port pair does not form a socket address.
    #[error("invalid bind address '{addr}': {reason}")]
    InvalidAddress { addr: String, reason: String },

    /// Reading the request input stream failed.
    #[error("failed to read request body: {0}")]
    BodyRead(#[from] std::io::Error),
}
