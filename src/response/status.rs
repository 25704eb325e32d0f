//! Status line formatting
//!
//! Reason phrases come from hyper's canonical table. A code with no known
//! phrase is a defined condition, not a panic: it renders with the
//! `Unknown Status` fallback and logs a warning.

use crate::logger;
use hyper::StatusCode;

/// Fallback reason phrase for codes outside the canonical table.
pub const UNKNOWN_STATUS: &str = "Unknown Status";

/// Canonical reason phrase for a status code, if one exists.
pub fn reason_phrase(code: u16) -> Option<&'static str> {
    StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason())
}

/// Status line in `"<code> <reason>"` form.
pub fn status_line(code: u16) -> String {
    match reason_phrase(code) {
        Some(reason) => format!("{code} {reason}"),
        None => {
            logger::log_warning(&format!("no reason phrase for status code {code}"));
            format!("{code} {UNKNOWN_STATUS}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_status_lines() {
        assert_eq!(status_line(200), "200 OK");
        assert_eq!(status_line(404), "404 Not Found");
        assert_eq!(status_line(405), "405 Method Not Allowed");
    }

    #[test]
    fn test_unknown_code_uses_fallback() {
        assert_eq!(status_line(599), "599 Unknown Status");
        assert_eq!(status_line(1000), "1000 Unknown Status");
    }

    #[test]
    fn test_reason_phrase_lookup() {
        assert_eq!(reason_phrase(500), Some("Internal Server Error"));
        assert_eq!(reason_phrase(599), None);
    }
}
