//! Operations on paths.

use crate::error::{HttpError, Result};

/// Composes `webroot` and `path` into a filesystem path: scans the request
/// path one byte at a time, rejects traversal and disallowed bytes, and
/// joins under a single separating slash.
///
/// `path` is the request path as received (it may start with `/`; that
/// leading slash, if present, is dropped before scanning).
pub fn sanitize(webroot: &[u8], path: &[u8]) -> Result<Vec<u8>> {
    let mut real = Vec::with_capacity(webroot.len() + path.len() + 16);
    real.extend_from_slice(webroot);
    if real.last() != Some(&b'/') {
        real.push(b'/');
    }

    let start = if path.first() == Some(&b'/') { 1 } else { 0 };

    // `prev` starts as `/`, matching the separator we just emitted -- this
    // lets the "/." and "//" checks below fire correctly on the very first
    // scanned byte.
    let mut prev = b'/';
    for &c in &path[start..] {
        if c == b'.' && prev == b'.' {
            return Err(HttpError::PathExploit);
        }
        if (c == b'/' && prev == b'/') || (c == b'.' && prev == b'/') {
            return Err(HttpError::PathInvalid);
        }
        if is_allowed(c) {
            real.push(c);
        } else {
            return Err(HttpError::PathInvalid);
        }
        prev = c;
    }

    if real.last() == Some(&b'/') {
        real.extend_from_slice(b"index.html");
    }

    Ok(real)
}

/// The allow-list: the ASCII range `'-'` (0x2D) through `'9'` (0x39) -- which
/// also admits `/`, `.`, and the digits -- plus the letters and underscore.
/// This is intentionally narrow and intentionally lets `/` and `.` through;
/// see DESIGN.md.
fn is_allowed(c: u8) -> bool {
    matches!(c, b'-'..=b'9' | b'A'..=b'Z' | b'a'..=b'z' | b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_join() {
        assert_eq!(
            sanitize(b"/srv/www", b"/index.html").unwrap(),
            b"/srv/www/index.html"
        );
        assert_eq!(
            sanitize(b"/srv/www", b"index.html").unwrap(),
            b"/srv/www/index.html"
        );
    }

    #[test]
    fn test_root_gets_index() {
        assert_eq!(sanitize(b"/srv/www", b"/").unwrap(), b"/srv/www/index.html");
    }

    #[test]
    fn test_trailing_slash_gets_index() {
        assert_eq!(
            sanitize(b"/srv/www", b"/sub/").unwrap(),
            b"/srv/www/sub/index.html"
        );
    }

    #[test]
    fn test_traversal_rejected() {
        match sanitize(b"/srv/www", b"/../etc/passwd") {
            Err(HttpError::PathExploit) => (),
            other => panic!("expected PathExploit, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_embedded_traversal_rejected() {
        match sanitize(b"/srv/www", b"/a/../../etc/passwd") {
            Err(HttpError::PathExploit) => (),
            other => panic!("expected PathExploit, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_double_slash_rejected() {
        match sanitize(b"/srv/www", b"/foo//bar") {
            Err(HttpError::PathInvalid) => (),
            other => panic!("expected PathInvalid, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_dot_after_slash_rejected() {
        match sanitize(b"/srv/www", b"/.hidden") {
            Err(HttpError::PathInvalid) => (),
            other => panic!("expected PathInvalid, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_disallowed_byte_rejected() {
        match sanitize(b"/srv/www", b"/foo bar") {
            Err(HttpError::PathInvalid) => (),
            other => panic!("expected PathInvalid, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_dotted_extension_allowed() {
        // A single interior dot not immediately following a slash is fine --
        // it's how every file extension gets through.
        assert_eq!(
            sanitize(b"/srv/www", b"/style.css").unwrap(),
            b"/srv/www/style.css"
        );
    }

    #[test]
    fn test_webroot_always_prefixes() {
        let out = sanitize(b"/srv/www", b"/a/b/c.txt").unwrap();
        assert!(out.starts_with(b"/srv/www/"));
    }
}
