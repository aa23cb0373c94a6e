//! HTTP protocol errors

use std::io;
use std::result;

/// Errors that may kill off an HTTP request or connection.
#[derive(Debug)]
pub enum HttpError {
  /// The client has gone away or sent us something that leads us to believe
  /// that they'd like to.  This is the one error that can't reasonably be
  /// reported back to the client.
  ConnectionClosed,
  /// The client used a method other than GET, HEAD or POST.
  BadMethod,
  /// The request-line or a header line was malformed.  Note that any request
  /// from an HTTP/0.9 client will be detected this way.
  Malformed,
  /// The decoded path exceeded the maximum length (8000 characters).
  UriTooLong,
  /// The protocol sent by the client was unrecognized (not `HTTP/1.1`).
  BadProtocol,
  /// No `Host` header appeared on the wire.
  MissingHost,
  /// A request didn't arrive (or complete) within the connection's
  /// request/keep-alive deadline.
  RequestTimeout,
  /// A payload was present whose `Content-Type` isn't one we decode.  The
  /// caller may still have a partially-populated `Request` to inspect.
  UnsupportedFormEncoding,
  /// The client sent the 'Expect' header, which we were ironically not
  /// expecting.
  SpanishInquisition,
  /// The client sent 'If-Match' or 'If-Unmodified-Since' headers, and we are
  /// treating the test they described as having failed.
  PreconditionFailed,
  /// The sanitized path attempted to traverse above the document root.
  PathExploit,
  /// The sanitized path contained a byte, or byte sequence, we don't allow.
  PathInvalid,
  /// The CGI interpreter path doesn't refer to an existing regular file.
  CgiProgPathInvalid,
  /// The CGI script path doesn't refer to an existing regular file.
  CgiScriptPathInvalid,
  /// Spawning, writing to, or reading from the CGI child failed, or its
  /// output didn't contain a parseable header block.
  CgiExecFailed,
  /// The CGI child exited with a non-zero status.  The parsed headers and
  /// body are attached in case the script would still like to serve them;
  /// `status` is the code requested via a `Status:` header, if any.
  CgiStatusNonzero {
    status: Option<u16>,
    headers: Vec<(Vec<u8>, Vec<u8>)>,
    body: Vec<u8>,
  },
  /// For convenience, `io::Error`s can be propagated as `HttpError`s.
  /// We treat them as internal server errors unless their `kind()` says
  /// otherwise at the dispatch site.
  Io(io::Error),
}

impl From<io::Error> for HttpError {
  fn from(e: io::Error) -> HttpError {
    HttpError::Io(e)
  }
}

/// Alias for a Result in HttpError.
pub type Result<R> = result::Result<R, HttpError>;

/// The outcome of feeding bytes to the request parser.
///
/// `NeedMore` is not an error: it tells the connection engine to keep
/// accumulating bytes and retry once more have arrived.
#[derive(Debug)]
pub enum ParseOutcome<T> {
  /// A full value was parsed; the `usize` is how many bytes of the input
  /// buffer it consumed.
  Complete(T, usize),
  /// Not enough bytes have arrived yet to make a decision either way.
  NeedMore,
  /// The input can never be completed into a valid value.
  Error(HttpError),
  /// A value was parsed, consuming `usize` bytes, but it isn't one we can
  /// act on directly -- e.g. a POST payload in an encoding we don't decode.
  /// The caller gets the partial value back so it can still answer with a
  /// sensible status and decide whether the connection survives.
  PartialError(T, usize, HttpError),
}
