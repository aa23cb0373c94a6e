//! HTTP request parsing.
//!
//! This is a two-phase parser: phase one, `find_headers`, finds the header
//! block (tolerating a bare `\n` as well as `\r\n`); phase two, `parse`,
//! validates the request line, collects headers, and pulls in any payload.

use crate::error::{HttpError, ParseOutcome, Result};
use crate::percent::{decode_form, unescape};

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
}

impl Method {
    fn from_bytes(b: &[u8]) -> Option<Method> {
        Some(match b {
            b"GET" => Method::Get,
            b"HEAD" => Method::Head,
            b"POST" => Method::Post,
            b"PUT" => Method::Put,
            b"DELETE" => Method::Delete,
            b"CONNECT" => Method::Connect,
            b"OPTIONS" => Method::Options,
            b"TRACE" => Method::Trace,
            _ => return None,
        })
    }

    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Method::Get => b"GET",
            Method::Head => b"HEAD",
            Method::Post => b"POST",
            Method::Put => b"PUT",
            Method::Delete => b"DELETE",
            Method::Connect => b"CONNECT",
            Method::Options => b"OPTIONS",
            Method::Trace => b"TRACE",
        }
    }
}

/// The maximum length we'll accept for a decoded request path.
pub const MAX_PATH_LEN: usize = 8000;

#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub path: Vec<u8>,
    pub query: Option<Vec<u8>>,
    pub headers: Vec<(Vec<u8>, Vec<u8>)>,
    pub keep_alive: bool,
    pub payload: Option<Vec<u8>>,
}

impl Request {
    /// Case-insensitive header lookup, first match wins.
    pub fn header(&self, name: &[u8]) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }
}

/// Scans `buf` for the end of the header block -- the first blank line,
/// whether terminated by `\r\n\r\n` or a bare `\n\n` -- and returns the byte
/// ranges of each line up to (but not including) that blank line, plus the
/// offset of whatever follows it (the start of any payload).
///
/// Returns `None` if no blank line has arrived yet.
pub(crate) fn find_headers(buf: &[u8]) -> Option<(Vec<(usize, usize)>, usize)> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < buf.len() {
        if buf[i] == b'\n' {
            let mut end = i;
            if end > start && buf[end - 1] == b'\r' {
                end -= 1;
            }
            let blank = end == start;
            lines.push((start, end));
            start = i + 1;
            if blank {
                return Some((lines, start));
            }
        }
        i += 1;
    }
    None
}

/// Parses a single request out of `buf`.  On `Complete`, the `usize` is the
/// number of bytes consumed (request line, headers, blank line, and any
/// payload) -- the caller drops that many bytes from its accumulator before
/// looking for the next pipelined request.
pub fn parse(buf: &[u8]) -> ParseOutcome<Request> {
    let (mut lines, headers_end) = match find_headers(buf) {
        Some(v) => v,
        None => return ParseOutcome::NeedMore,
    };
    // The blank terminator line is the last entry; drop it before treating
    // the rest as request-line + headers.
    lines.pop();

    if lines.is_empty() {
        return ParseOutcome::Error(HttpError::Malformed);
    }

    let (rl_start, rl_end) = lines[0];
    let (method, path, query) = match parse_request_line(&buf[rl_start..rl_end]) {
        Ok(v) => v,
        Err(e) => return ParseOutcome::Error(e),
    };

    let mut headers = Vec::with_capacity(lines.len() - 1);
    let mut keep_alive = true;
    let mut got_host = false;

    for (idx, &(start, end)) in lines.iter().enumerate().skip(1) {
        let line = &buf[start..end];
        if line.is_empty() {
            continue;
        }
        if line[0] == b' ' || line[0] == b'\t' {
            // RFC 7230 3.2.4 obsoletes header folding; the old C parser
            // rejected it outright and so do we.
            let _ = idx;
            return ParseOutcome::Error(HttpError::Malformed);
        }

        let colon = match line.iter().position(|&b| b == b':') {
            Some(c) => c,
            None => return ParseOutcome::Error(HttpError::Malformed),
        };
        let name = line[..colon].to_vec();
        let value = line[colon + 1..]
            .iter()
            .skip_while(|&&b| b == b' ' || b == b'\t')
            .cloned()
            .collect::<Vec<u8>>();

        if name.eq_ignore_ascii_case(b"host") {
            got_host = true;
        }
        if name.eq_ignore_ascii_case(b"connection") {
            keep_alive = !value.eq_ignore_ascii_case(b"close");
        }
        if name.eq_ignore_ascii_case(b"expect") {
            return ParseOutcome::Error(HttpError::SpanishInquisition);
        }
        if name.eq_ignore_ascii_case(b"if-match")
            || name.eq_ignore_ascii_case(b"if-unmodified-since")
        {
            return ParseOutcome::Error(HttpError::PreconditionFailed);
        }

        headers.push((name, value));
    }

    if !got_host {
        return ParseOutcome::Error(HttpError::MissingHost);
    }

    let content_length = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(b"content-length"))
        .and_then(|(_, v)| std::str::from_utf8(v).ok())
        .and_then(|s| s.trim().parse::<usize>().ok());

    let payload_len = content_length.unwrap_or(0);
    if method != Method::Post || payload_len == 0 {
        let req = Request {
            method,
            path,
            query,
            headers,
            keep_alive,
            payload: None,
        };
        return ParseOutcome::Complete(req, headers_end);
    }

    if buf.len() - headers_end < payload_len {
        return ParseOutcome::NeedMore;
    }
    let raw_payload = &buf[headers_end..headers_end + payload_len];
    let consumed = headers_end + payload_len;

    let is_form_urlencoded = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(b"content-type"))
        .map(|(_, v)| v.eq_ignore_ascii_case(b"application/x-www-form-urlencoded"))
        .unwrap_or(false);

    if !is_form_urlencoded {
        let req = Request {
            method,
            path,
            query,
            headers,
            keep_alive,
            payload: None,
        };
        return ParseOutcome::PartialError(req, consumed, HttpError::UnsupportedFormEncoding);
    }

    match decode_form(raw_payload) {
        Ok(decoded) => {
            let req = Request {
                method,
                path,
                query,
                headers,
                keep_alive,
                payload: Some(decoded),
            };
            ParseOutcome::Complete(req, consumed)
        }
        Err(e) => ParseOutcome::Error(e),
    }
}

/// Splits the request line into method, decoded path, and decoded query
/// string.  Analog of `http_request_parse`'s status-line handling plus its
/// `strstr(path, "?")` query extraction.
fn parse_request_line(line: &[u8]) -> Result<(Method, Vec<u8>, Option<Vec<u8>>)> {
    let parts: Vec<_> = line.splitn(3, |b| *b == b' ').collect();
    if parts.len() != 3 {
        return Err(HttpError::Malformed);
    }

    let method = Method::from_bytes(parts[0]).ok_or(HttpError::BadMethod)?;

    if parts[2] != b"HTTP/1.1" {
        return Err(HttpError::BadProtocol);
    }

    let raw_target = parts[1];
    if raw_target.len() > MAX_PATH_LEN {
        return Err(HttpError::UriTooLong);
    }

    let (raw_path, raw_query) = match raw_target.iter().position(|&b| b == b'?') {
        Some(q) => (&raw_target[..q], Some(&raw_target[q + 1..])),
        None => (raw_target, None),
    };

    let mut path = Vec::with_capacity(raw_path.len());
    unescape(raw_path, &mut path)?;
    if path.len() > MAX_PATH_LEN {
        return Err(HttpError::UriTooLong);
    }

    let query = match raw_query {
        Some(q) => {
            let mut decoded = Vec::with_capacity(q.len());
            unescape(q, &mut decoded)?;
            Some(decoded)
        }
        None => None,
    };

    Ok((method, path, query))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_more_without_blank_line() {
        let buf = b"GET / HTTP/1.1\r\nHost: x\r\n";
        match parse(buf) {
            ParseOutcome::NeedMore => (),
            other => panic!("expected NeedMore, got {:?}", other),
        }
    }

    #[test]
    fn test_simple_get() {
        let buf = b"GET /foo HTTP/1.1\r\nHost: example.com\r\n\r\n";
        match parse(buf) {
            ParseOutcome::Complete(req, consumed) => {
                assert_eq!(req.method, Method::Get);
                assert_eq!(req.path, b"/foo");
                assert_eq!(consumed, buf.len());
                assert!(req.keep_alive);
            }
            other => panic!("expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn test_bare_lf_tolerated() {
        let buf = b"GET / HTTP/1.1\nHost: example.com\n\n";
        match parse(buf) {
            ParseOutcome::Complete(req, consumed) => {
                assert_eq!(req.path, b"/");
                assert_eq!(consumed, buf.len());
            }
            other => panic!("expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_host_rejected() {
        let buf = b"GET / HTTP/1.1\r\n\r\n";
        match parse(buf) {
            ParseOutcome::Error(HttpError::MissingHost) => (),
            other => panic!("expected MissingHost, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_method_rejected() {
        let buf = b"FROB / HTTP/1.1\r\nHost: x\r\n\r\n";
        match parse(buf) {
            ParseOutcome::Error(HttpError::BadMethod) => (),
            other => panic!("expected BadMethod, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_protocol_rejected() {
        let buf = b"GET / HTTP/1.0\r\nHost: x\r\n\r\n";
        match parse(buf) {
            ParseOutcome::Error(HttpError::BadProtocol) => (),
            other => panic!("expected BadProtocol, got {:?}", other),
        }
    }

    #[test]
    fn test_folded_header_rejected() {
        let buf = b"GET / HTTP/1.1\r\nHost: x\r\n continuation\r\n\r\n";
        match parse(buf) {
            ParseOutcome::Error(HttpError::Malformed) => (),
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_expect_header_rejected() {
        let buf = b"GET / HTTP/1.1\r\nHost: x\r\nExpect: 100-continue\r\n\r\n";
        match parse(buf) {
            ParseOutcome::Error(HttpError::SpanishInquisition) => (),
            other => panic!("expected SpanishInquisition, got {:?}", other),
        }
    }

    #[test]
    fn test_connection_close_overrides_keepalive() {
        let buf = b"GET / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n";
        match parse(buf) {
            ParseOutcome::Complete(req, _) => assert!(!req.keep_alive),
            other => panic!("expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn test_query_string_decoded() {
        let buf = b"GET /search?q=a+b%26c HTTP/1.1\r\nHost: x\r\n\r\n";
        match parse(buf) {
            ParseOutcome::Complete(req, _) => {
                assert_eq!(req.path, b"/search");
                // `unescape` alone doesn't map '+' to space -- that's
                // `decode_form`'s job, and query strings go through plain
                // `unescape`.
                assert_eq!(req.query.unwrap(), b"a+b&c");
            }
            other => panic!("expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn test_uri_too_long_rejected() {
        let long_path = vec![b'a'; MAX_PATH_LEN + 1];
        let mut buf = Vec::new();
        buf.extend_from_slice(b"GET /");
        buf.extend_from_slice(&long_path);
        buf.extend_from_slice(b" HTTP/1.1\r\nHost: x\r\n\r\n");
        match parse(&buf) {
            ParseOutcome::Error(HttpError::UriTooLong) => (),
            other => panic!("expected UriTooLong, got {:?}", other),
        }
    }

    #[test]
    fn test_post_needs_more_payload() {
        let buf = b"POST / HTTP/1.1\r\nHost: x\r\nContent-Length: 20\r\nContent-Type: application/x-www-form-urlencoded\r\n\r\nshort";
        match parse(buf) {
            ParseOutcome::NeedMore => (),
            other => panic!("expected NeedMore, got {:?}", other),
        }
    }

    #[test]
    fn test_post_form_urlencoded_decoded() {
        let buf = b"POST / HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\nContent-Type: application/x-www-form-urlencoded\r\n\r\na=1+2";
        match parse(buf) {
            ParseOutcome::Complete(req, consumed) => {
                assert_eq!(req.payload.unwrap(), b"a=1 2");
                assert_eq!(consumed, buf.len());
            }
            other => panic!("expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn test_post_unsupported_form_encoding() {
        let buf = b"POST / HTTP/1.1\r\nHost: x\r\nContent-Length: 4\r\nContent-Type: application/json\r\n\r\n1234";
        match parse(buf) {
            ParseOutcome::PartialError(req, consumed, HttpError::UnsupportedFormEncoding) => {
                assert_eq!(req.method, Method::Post);
                assert_eq!(consumed, buf.len());
            }
            other => panic!("expected PartialError, got {:?}", other),
        }
    }

    #[test]
    fn test_precondition_headers_rejected() {
        let buf = b"GET / HTTP/1.1\r\nHost: x\r\nIf-Match: \"abc\"\r\n\r\n";
        match parse(buf) {
            ParseOutcome::Error(HttpError::PreconditionFailed) => (),
            other => panic!("expected PreconditionFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_header_without_colon_rejected() {
        let buf = b"GET / HTTP/1.1\r\nHost x\r\n\r\n";
        match parse(buf) {
            ParseOutcome::Error(HttpError::Malformed) => (),
            other => panic!("expected Malformed, got {:?}", other),
        }
    }
}
