//! Query string parsing
//!
//! Splits a raw query string into key/value pairs with percent-decoding.
//! Pairs without a value (`a` or `a=`) are dropped; repeated keys keep
//! every value in order of appearance.

use std::collections::HashMap;

/// Parse a query string into a map from key to the ordered list of values.
///
/// `"a=1&a=2&b=3"` becomes `{"a": ["1", "2"], "b": ["3"]}`.
pub fn parse(raw: &str) -> HashMap<String, Vec<String>> {
    let mut query: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in parse_pairs(raw) {
        query.entry(key).or_default().push(value);
    }
    query
}

/// Parse a query string into decoded key/value pairs, preserving order.
pub fn parse_pairs(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            if value.is_empty() {
                return None;
            }
            Some((percent_decode(key), percent_decode(value)))
        })
        .collect()
}

/// Decode percent-escapes and `+`-as-space in a query component.
///
/// Invalid escapes are passed through literally; non-UTF-8 decode results
/// are replaced rather than rejected.
pub fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(high), Some(low)) => {
                        out.push(high << 4 | low);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
