//! Reversible escaping into `[a-z0-9-]`, used for build slugs and stable mount names.
//!
//! Every byte outside `[a-z0-9]` becomes `-` followed by two lowercase hex
//! digits, so `-` itself is always escaped and decoding is unambiguous.

const ESCAPE: char = '-';

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_lowercase() || b.is_ascii_digit() {
            out.push(char::from(b));
        } else {
            out.push(ESCAPE);
            out.push_str(&format!("{b:02x}"));
        }
    }
    out
}

/// Inverse of [`escape`]. `None` for input `escape` could not have produced.
pub fn unescape(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == ESCAPE as u8 {
            let hi = hex_value(*bytes.get(i + 1)?)?;
            let lo = hex_value(*bytes.get(i + 2)?)?;
            out.push(hi << 4 | lo);
            i += 3;
        } else if bytes[i].is_ascii_lowercase() || bytes[i].is_ascii_digit() {
            out.push(bytes[i]);
            i += 1;
        } else {
            return None;
        }
    }
    String::from_utf8(out).ok()
}

/// Lowercase hex digit only; `escape` never emits anything else.
fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}
