//! The core HTTP server: ties connection I/O, request parsing, path
//! resolution, static file serving, and CGI dispatch together.

extern crate time;

use std::ffi::OsStr;
use std::io::{self, Read};
use std::net::TcpStream;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cgi;
use crate::config;
use crate::con::Connection;
use crate::error::{HttpError, ParseOutcome, Result};
use crate::filetype;
use crate::path;
use crate::request::{self, Method, Request};
use crate::response::{self, Response};
use crate::unix;

/// Entry point for one accepted connection. Any error unwinding out of
/// `serve` just means the connection is done; there's nothing further to do
/// with it but let the socket close on drop. `run_flag` is the process-wide
/// shutdown signal: checked at every loop boundary so a connection winds
/// down after its current write instead of being cut off mid-response.
pub fn handle_connection(stream: TcpStream, remote: String, run_flag: Arc<AtomicBool>) {
    let mut con = match Connection::new(stream, remote) {
        Ok(con) => con,
        Err(e) => {
            crate::log::log(crate::log::Level::Warn, format_args!("failed to prepare connection: {}", e));
            return;
        }
    };
    if let Err(e) = serve(&mut con, &run_flag) {
        if !matches!(e, HttpError::ConnectionClosed) {
            con.log_error(format_args!("connection ended: {:?}", e));
        }
    }
}

fn serve(con: &mut Connection, run_flag: &AtomicBool) -> Result<()> {
    loop {
        if !run_flag.load(Ordering::SeqCst) {
            return Err(HttpError::ConnectionClosed);
        }

        match read_request(con, run_flag)? {
            None => return Ok(()),
            Some(ReqOutcome::Complete(req)) => {
                let keep_alive = req.keep_alive;
                let head_only = req.method == Method::Head;
                con.bump_request_count();
                let resp = dispatch(con, &req);
                send_response(con, &resp, head_only, keep_alive)?;
                if !keep_alive {
                    return Err(HttpError::ConnectionClosed);
                }
            }
            Some(ReqOutcome::PartialError(req, e)) => {
                let keep_alive = req.keep_alive;
                let head_only = req.method == Method::Head;
                let code = response::status_for_error(&e).unwrap_or(400);
                let resp = error_response(code, &e);
                send_response(con, &resp, head_only, keep_alive)?;
                if !keep_alive {
                    return Err(HttpError::ConnectionClosed);
                }
            }
            Some(ReqOutcome::Error(e)) => {
                match response::status_for_error(&e) {
                    None => return Err(HttpError::ConnectionClosed),
                    Some(code) => {
                        let resp = error_response(code, &e);
                        send_response(con, &resp, false, false)?;
                    }
                }
                return Err(HttpError::ConnectionClosed);
            }
        }
    }
}

enum ReqOutcome {
    Complete(Request),
    PartialError(Request, HttpError),
    Error(HttpError),
}

/// Waits for (and parses) the next pipelined request on `con`, applying the
/// two wall-clock deadlines: `REQUEST_KEEPALIVE_TIMEOUT_SECONDS` while no
/// bytes of a new request have arrived yet, and the longer
/// `REQUEST_TIMEOUT_SECONDS` once the first byte has shown up but the
/// request isn't complete yet. Returns `None` if the connection should just
/// be closed quietly (an idle keep-alive connection timing out, or a
/// shutdown signal arriving between requests, is not an error worth
/// reporting).
fn read_request(con: &mut Connection, run_flag: &AtomicBool) -> Result<Option<ReqOutcome>> {
    let mut deadline = deadline_for(con);

    loop {
        match request::parse(con.buffer()) {
            ParseOutcome::Complete(req, n) => {
                con.consume(n);
                return Ok(Some(ReqOutcome::Complete(req)));
            }
            ParseOutcome::PartialError(req, n, e) => {
                con.consume(n);
                return Ok(Some(ReqOutcome::PartialError(req, e)));
            }
            ParseOutcome::Error(e) => return Ok(Some(ReqOutcome::Error(e))),
            ParseOutcome::NeedMore => {}
        }

        if !run_flag.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let now = Instant::now();
        if now >= deadline {
            return if con.buffer().is_empty() {
                Ok(None)
            } else {
                Ok(Some(ReqOutcome::Error(HttpError::RequestTimeout)))
            };
        }

        let was_empty = con.buffer().is_empty();
        let step = deadline
            .saturating_duration_since(now)
            .min(Duration::from_millis(config::POLL_SLEEP_MILLIS * 40));
        con.wait_and_fill(step)?;

        if was_empty && !con.buffer().is_empty() {
            // The first byte of a new request just arrived -- restart the
            // clock under the longer per-request budget.
            deadline = Instant::now() + Duration::from_secs(config::REQUEST_TIMEOUT_SECONDS);
        }
    }
}

fn deadline_for(con: &Connection) -> Instant {
    let secs = if con.buffer().is_empty() {
        config::REQUEST_KEEPALIVE_TIMEOUT_SECONDS
    } else {
        config::REQUEST_TIMEOUT_SECONDS
    };
    Instant::now() + Duration::from_secs(secs)
}

fn send_response(con: &mut Connection, resp: &Response, head_only: bool, keep_alive: bool) -> Result<()> {
    let bytes = resp.serialize(config::SERVER_IDENT, time::get_time(), head_only, keep_alive);
    con.write_all(&bytes)
}

fn error_response(code: u16, err: &HttpError) -> Response {
    let mut resp = Response::new(code);
    if let HttpError::CgiStatusNonzero { headers, body, .. } = err {
        for (name, value) in headers {
            resp.add_header(name, value);
        }
        if !body.is_empty() {
            resp.set_content(body.clone(), response::AutoContentType::Off);
        }
    }
    resp
}

/// Routes a parsed request to either static file serving or CGI dispatch,
/// always producing *some* response -- covers GET/HEAD of a static file as
/// well as POST to a CGI script.
fn dispatch(con: &Connection, req: &Request) -> Response {
    if req.method != Method::Get && req.method != Method::Head && req.method != Method::Post {
        return error_response(501, &HttpError::BadMethod);
    }

    let file_path = match path::sanitize(config::WEBROOT.as_bytes(), &req.path) {
        Ok(p) => p,
        Err(e) => {
            let code = response::status_for_error(&e).unwrap_or(400);
            return error_response(code, &e);
        }
    };

    if filetype::is_cgi_extension(&file_path) {
        dispatch_cgi(req, &file_path)
    } else {
        dispatch_static(con, req, &file_path)
    }
}

fn dispatch_static(con: &Connection, req: &Request, file_path: &[u8]) -> Response {
    if req.method == Method::Post {
        // Static resources have no handler for a request body.
        return error_response(501, &HttpError::BadMethod);
    }

    let os_path = OsStr::from_bytes(file_path);
    let mut opened = match unix::safe_open(os_path) {
        Ok(f) => f,
        Err(e) => {
            let code = match e.kind() {
                io::ErrorKind::NotFound => 404,
                io::ErrorKind::PermissionDenied => 403,
                _ => 500,
            };
            con.log_error(format_args!(
                "open {}: {}",
                String::from_utf8_lossy(file_path),
                e
            ));
            return Response::new(code);
        }
    };

    let mut body = Vec::with_capacity(opened.length as usize);
    if opened.file.read_to_end(&mut body).is_err() {
        return Response::new(500);
    }

    let mut resp = Response::new(200);
    resp.set_content(body, response::AutoContentType::FromPath(file_path));
    resp
}

fn dispatch_cgi(req: &Request, file_path: &[u8]) -> Response {
    let params = cgi::CgiParams {
        script_filename: Path::new(OsStr::from_bytes(file_path)),
        script_name: &req.path,
        query: req.query.as_deref(),
        method: req.method,
        headers: &req.headers,
        payload: req.payload.as_deref(),
    };

    match cgi::exec(Path::new(config::CGI_INTERPRETER_PATH), &params) {
        Ok(resp) => resp,
        Err(e) => {
            let code = response::status_for_error(&e).unwrap_or(500);
            error_response(code, &e)
        }
    }
}
