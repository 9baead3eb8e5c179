//! ASCII string helpers for the handshake parser
//!
//! HTTP/1.1 header grammar is ASCII; none of these helpers are
//! Unicode-aware and none need to be.

/// Strip leading and trailing ASCII whitespace
pub fn trim(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_ascii_whitespace())
}

/// Lowercase an ASCII string (header-name case folding)
pub fn to_lower(s: &str) -> String {
    s.to_ascii_lowercase()
}

/// Split on runs of ASCII whitespace, dropping empty tokens
pub fn tokenize(s: &str) -> Vec<&str> {
    s.split(|c: char| c.is_ascii_whitespace())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_strips_surrounding_whitespace() {
        assert_eq!(trim("  value \t"), "value");
        assert_eq!(trim("value"), "value");
        assert_eq!(trim(" \t "), "");
    }

    #[test]
    fn to_lower_folds_ascii_only() {
        assert_eq!(to_lower("Sec-WebSocket-Key"), "sec-websocket-key");
        assert_eq!(to_lower("already lower"), "already lower");
    }

    #[test]
    fn tokenize_splits_on_whitespace_runs() {
        assert_eq!(tokenize("GET / HTTP/1.1"), ["GET", "/", "HTTP/1.1"]);
        assert_eq!(tokenize("  a   b\tc  "), ["a", "b", "c"]);
        assert!(tokenize("   ").is_empty());
    }
}
