//! HTTP response assembly.

extern crate time;

use std::borrow::Cow;

use crate::error::HttpError;
use crate::filetype;
use crate::status::{self, StatusEntry};

/// How `set_content` should pick a `Content-Type` for the bytes it's given.
pub enum AutoContentType<'a> {
    /// Leave whatever `Content-Type` (if any) is already on the response.
    Off,
    /// Derive from the file extension of this path, the way a static file
    /// response does.
    FromPath(&'a [u8]),
    /// Sniff the body itself, for content with no backing path (CGI output
    /// that didn't supply its own `Content-Type`).
    FromBody,
}

/// A response under construction.  `serialize` turns it into the bytes that
/// go on the wire; everything before that is just bookkeeping while headers
/// and body accumulate.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(Vec<u8>, Vec<u8>)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16) -> Response {
        Response {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn add_header(&mut self, name: &[u8], value: &[u8]) -> &mut Self {
        self.headers.push((name.to_vec(), value.to_vec()));
        self
    }

    /// Stores `body` as the response content. When `auto_content_type` asks
    /// for detection, any existing `Content-Type` header is dropped first and
    /// replaced with the detected one.
    pub fn set_content(&mut self, body: Vec<u8>, auto_content_type: AutoContentType) -> &mut Self {
        let detected = match auto_content_type {
            AutoContentType::Off => None,
            AutoContentType::FromPath(path) => Some(filetype::from_path(path)),
            AutoContentType::FromBody => Some(filetype::from_body(&body)),
        };
        if let Some(content_type) = detected {
            self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(b"content-type"));
            self.add_header(b"Content-Type", &content_type);
        }
        self.body = body;
        self
    }

    fn header(&self, name: &[u8]) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }

    /// Renders the response to bytes.  `head_only` elides the body (for
    /// responses to a HEAD request); `keep_alive` picks the `Connection`
    /// header value.  Every response always carries a `Content-Length` --
    /// there is no chunked transfer encoding here, since we speak HTTP/1.1
    /// only and always know the body length up front.
    pub fn serialize(
        &self,
        server_ident: &str,
        now: time::Timespec,
        head_only: bool,
        keep_alive: bool,
    ) -> Vec<u8> {
        let entry = status::lookup(self.status);

        let canned;
        let body: &[u8] = if !self.body.is_empty() {
            &self.body
        } else if self.status != 200 {
            canned = canned_error_body(entry);
            &canned
        } else {
            &[]
        };

        let content_type: Cow<[u8]> = match self.header(b"content-type") {
            Some(v) => Cow::from(v.to_vec()),
            None => filetype::from_body(body),
        };

        let mut out = Vec::with_capacity(256 + body.len());
        out.extend_from_slice(b"HTTP/1.1 ");
        out.extend_from_slice(entry.code.to_string().as_bytes());
        out.push(b' ');
        out.extend_from_slice(entry.reason.as_bytes());
        out.extend_from_slice(b"\r\n");

        let date = format!("{}", time::at_utc(now).rfc822());
        write_header(&mut out, b"Date", date.as_bytes());
        write_header(&mut out, b"Server", server_ident.as_bytes());
        write_header(
            &mut out,
            b"Connection",
            if keep_alive { b"keep-alive" } else { b"close" },
        );
        write_header(&mut out, b"Content-Length", body.len().to_string().as_bytes());
        write_header(&mut out, b"Content-Type", &content_type);

        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case(b"content-type") {
                continue;
            }
            write_header(&mut out, name, value);
        }

        out.extend_from_slice(b"\r\n");

        if !head_only {
            out.extend_from_slice(body);
        }

        out
    }
}

fn write_header(out: &mut Vec<u8>, name: &[u8], value: &[u8]) {
    out.extend_from_slice(name);
    out.extend_from_slice(b": ");
    out.extend_from_slice(value);
    out.extend_from_slice(b"\r\n");
}

/// Builds a canned `<html><body>...</body>` error page for a status that
/// wasn't given an explicit body.
fn canned_error_body(entry: &StatusEntry) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(b"<html><body>");
    body.extend_from_slice(entry.reason.as_bytes());
    if !entry.message.is_empty() {
        body.extend_from_slice(b": ");
        body.extend_from_slice(entry.message.as_bytes());
    }
    body.extend_from_slice(b"</body></html>\r\n");
    body
}

/// Maps a protocol-level error to the status code it should be reported as.
/// `None` means the error isn't reportable at all -- the client is already
/// gone.  Analog of the old `barf()`'s match over `HttpError`, extended for
/// the larger error set and the CGI failure modes.
pub fn status_for_error(err: &HttpError) -> Option<u16> {
    match err {
        HttpError::ConnectionClosed => None,
        HttpError::BadMethod => Some(405),
        HttpError::Malformed => Some(400),
        HttpError::UriTooLong => Some(414),
        HttpError::BadProtocol => Some(505),
        HttpError::MissingHost => Some(400),
        HttpError::RequestTimeout => Some(408),
        HttpError::UnsupportedFormEncoding => Some(501),
        HttpError::SpanishInquisition => Some(417),
        HttpError::PreconditionFailed => Some(412),
        HttpError::PathExploit => Some(400),
        HttpError::PathInvalid => Some(400),
        HttpError::CgiProgPathInvalid => Some(500),
        HttpError::CgiScriptPathInvalid => Some(500),
        HttpError::CgiExecFailed => Some(500),
        HttpError::CgiStatusNonzero { status, .. } => Some(status.unwrap_or(502)),
        HttpError::Io(_) => Some(500),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch() -> time::Timespec {
        time::Timespec::new(0, 0)
    }

    #[test]
    fn test_serialize_ok_response() {
        let mut r = Response::new(200);
        r.add_header(b"Content-Type", b"text/html");
        r.set_content(b"<p>hi</p>".to_vec(), AutoContentType::Off);
        let bytes = r.serialize("httpd/0.2", epoch(), false, true);
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 9\r\n"));
        assert!(text.contains("Connection: keep-alive\r\n"));
        assert!(text.ends_with("<p>hi</p>"));
    }

    #[test]
    fn test_head_elides_body() {
        let mut r = Response::new(200);
        r.set_content(b"hello".to_vec(), AutoContentType::Off);
        let bytes = r.serialize("httpd/0.2", epoch(), true, true);
        assert!(!bytes.ends_with(b"hello"));
    }

    #[test]
    fn test_non_200_gets_canned_body() {
        let r = Response::new(404);
        let bytes = r.serialize("httpd/0.2", epoch(), false, false);
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("<html><body>Not Found"));
        assert!(text.contains("Connection: close\r\n"));
    }

    #[test]
    fn test_status_for_error_maps_connection_closed_to_none() {
        assert_eq!(status_for_error(&HttpError::ConnectionClosed), None);
        assert_eq!(status_for_error(&HttpError::UriTooLong), Some(414));
    }

    #[test]
    fn test_set_content_auto_detects_from_path() {
        let mut r = Response::new(200);
        r.set_content(b"<html></html>".to_vec(), AutoContentType::FromPath(b"index.htm"));
        assert_eq!(r.header(b"content-type"), Some(&b"text/html"[..]));
    }

    #[test]
    fn test_set_content_auto_detect_replaces_existing_header() {
        let mut r = Response::new(200);
        r.add_header(b"Content-Type", b"application/octet-stream");
        r.set_content(b"plain text".to_vec(), AutoContentType::FromBody);
        let content_types: Vec<_> = r.headers.iter().filter(|(n, _)| n.eq_ignore_ascii_case(b"content-type")).collect();
        assert_eq!(content_types.len(), 1);
        assert_eq!(content_types[0].1, b"text/plain");
    }

    #[test]
    fn test_cgi_status_nonzero_defaults_to_502() {
        let err = HttpError::CgiStatusNonzero {
            status: None,
            headers: Vec::new(),
            body: Vec::new(),
        };
        assert_eq!(status_for_error(&err), Some(502));
    }
}
