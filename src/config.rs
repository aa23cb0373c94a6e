//! Compile-time configuration.
//!
//! The core exposes no runtime flags; everything an operator might want to
//! tune lives here as a constant.

/// Document root. `main` will `chdir` relative paths against this.
pub const WEBROOT: &str = "./htdocs";

/// TCP port the reference `main.rs` listens on.
pub const LISTEN_PORT: u16 = 8080;

/// Backlog passed to `listen(2)`.
pub const LISTEN_BACKLOG: i32 = 16;

/// Server identifier sent in the `Server` response header.
pub const SERVER_IDENT: &str = "httpd/0.2";

/// Seconds to wait for a complete first request before sending 408 and
/// closing the connection.
pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Seconds to keep an idle keep-alive connection open between requests.
pub const REQUEST_KEEPALIVE_TIMEOUT_SECONDS: u64 = 15;

/// Seconds to wait for a CGI child to finish producing output before it is
/// killed and the request fails.
pub const CGI_READ_TIMEOUT_SECONDS: u64 = 20;

/// Interpreter used to run `.php` scripts.
pub const CGI_INTERPRETER_PATH: &str = "/usr/bin/php-cgi";

/// Size of each chunk read from the socket or a CGI pipe per non-blocking
/// `read(2)` call.
pub const READ_CHUNK_BYTES: usize = 4096;

/// How long to sleep between non-blocking poll attempts.
pub const POLL_SLEEP_MILLIS: u64 = 5;

/// Longest request path we'll accept, after percent-decoding.
pub const MAX_PATH_LEN: usize = 8000;
