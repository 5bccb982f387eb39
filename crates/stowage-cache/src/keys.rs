//! Object key helpers.

use std::fmt::Write;

/// Encode an object key as a single file name.
///
/// Bytes outside `[A-Za-z0-9._-]` become `%XX`, as does a leading `.`, so
/// distinct keys never share a file and no object name starts with a dot.
pub fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for (i, byte) in key.bytes().enumerate() {
        let keep = byte.is_ascii_alphanumeric()
            || matches!(byte, b'-' | b'_')
            || (byte == b'.' && i > 0);
        if keep {
            out.push(byte as char);
        } else {
            let _ = write!(out, "%{:02X}", byte);
        }
    }
    if out.is_empty() {
        out.push('%');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_key() {
        assert_eq!(encode_key("abc123"), "abc123");
        assert_eq!(encode_key("ci/cache/abc123"), "ci%2Fcache%2Fabc123");
        assert_eq!(encode_key("cache:key"), "cache%3Akey");
        assert_eq!(encode_key("build.tar"), "build.tar");
        assert_eq!(encode_key(".."), "%2E.");
        assert_eq!(encode_key("100%"), "100%25");
        assert_eq!(encode_key(""), "%");
    }

    #[test]
    fn test_distinct_keys_stay_distinct() {
        let keys = ["a/b", "a_b", "a%2Fb", "a:b", "a\\b", "é", "%C3%A9"];
        let encoded: std::collections::HashSet<String> =
            keys.iter().map(|k| encode_key(k)).collect();
        assert_eq!(encoded.len(), keys.len());
    }
}
