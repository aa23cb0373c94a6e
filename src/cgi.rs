//! CGI/1.1 program execution.
//!
//! Builds the gateway's environment variables, runs the interpreter, and
//! reads back a header block plus body. A thread-per-connection Rust server
//! has no safe way to `fork` a process that's already running other threads,
//! so this uses `std::process::Command` for bidirectional pipes instead, and
//! reads the child's stdout non-blockingly against a deadline, the same
//! shape `con.rs` uses for the client socket.

use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::config;
use crate::error::{HttpError, Result};
use crate::request::{find_headers, Method};
use crate::response::{self, Response};
use crate::unix;

/// Everything `exec` needs to build a CGI environment and request body,
/// gathered from the inbound `Request` and the sanitized filesystem path.
pub struct CgiParams<'a> {
    pub script_filename: &'a Path,
    pub script_name: &'a [u8],
    pub query: Option<&'a [u8]>,
    pub method: Method,
    pub headers: &'a [(Vec<u8>, Vec<u8>)],
    pub payload: Option<&'a [u8]>,
}

/// Runs the interpreter at `interpreter` against `params.script_filename`
/// and turns its output into a `Response`.
pub fn exec(interpreter: &Path, params: &CgiParams) -> Result<Response> {
    if !interpreter.is_file() {
        return Err(HttpError::CgiProgPathInvalid);
    }
    if !params.script_filename.is_file() {
        return Err(HttpError::CgiScriptPathInvalid);
    }

    let mut command = Command::new(interpreter);
    command
        .arg(params.script_filename)
        .env_clear()
        .envs(build_env(params))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let mut child = command.spawn().map_err(|_| HttpError::CgiExecFailed)?;

    if let Some(payload) = params.payload {
        if let Some(stdin) = child.stdin.as_mut() {
            stdin.write_all(payload).map_err(|_| HttpError::CgiExecFailed)?;
        }
    }
    // Drop stdin so the child sees EOF, even when there was no payload.
    child.stdin.take();

    let output = read_with_deadline(&mut child)?;
    let exit = child.wait().map_err(|_| HttpError::CgiExecFailed)?;

    let (status, headers, body) = parse_cgi_output(&output);

    if !exit.success() {
        return Err(HttpError::CgiStatusNonzero {
            status,
            headers,
            body,
        });
    }

    let mut response = Response::new(status.unwrap_or(200));
    let mut saw_content_type = false;
    for (name, value) in headers {
        if name.eq_ignore_ascii_case(b"content-type") {
            saw_content_type = true;
        }
        response.add_header(&name, &value);
    }
    let auto_content_type = if saw_content_type {
        response::AutoContentType::Off
    } else {
        response::AutoContentType::FromBody
    };
    response.set_content(body, auto_content_type);
    Ok(response)
}

/// Reads the child's stdout until EOF, polling non-blockingly and giving up
/// if nothing has completed by `config::CGI_READ_TIMEOUT_SECONDS`.
fn read_with_deadline(child: &mut std::process::Child) -> Result<Vec<u8>> {
    let stdout = child.stdout.as_mut().ok_or(HttpError::CgiExecFailed)?;
    let fd = stdout.as_raw_fd();
    unix::set_nonblocking(fd).map_err(|_| HttpError::CgiExecFailed)?;

    let deadline = Instant::now() + Duration::from_secs(config::CGI_READ_TIMEOUT_SECONDS);
    let mut out = Vec::new();
    let mut chunk = [0u8; config::READ_CHUNK_BYTES];

    loop {
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(HttpError::CgiExecFailed);
        }

        match child
            .stdout
            .as_mut()
            .ok_or(HttpError::CgiExecFailed)?
            .read(&mut chunk)
        {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let step = remaining.min(Duration::from_millis(config::POLL_SLEEP_MILLIS * 20));
                let _ = unix::poll_readable(fd, step);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return Err(HttpError::CgiExecFailed),
        }
    }

    Ok(out)
}

/// Splits a CGI program's output into its `Status:`/`Content-Type:` header
/// lines (everything else passed through to the response verbatim) and the
/// body that follows. If no blank-line-terminated header block is found at
/// all, the whole output is treated as the body -- a script that forgets its
/// headers still gets served rather than dropped.
fn parse_cgi_output(output: &[u8]) -> (Option<u16>, Vec<(Vec<u8>, Vec<u8>)>, Vec<u8>) {
    let (mut lines, body_start) = match find_headers(output) {
        Some(v) => v,
        None => return (None, Vec::new(), output.to_vec()),
    };
    lines.pop(); // the blank terminator

    let mut status = None;
    let mut headers = Vec::with_capacity(lines.len());

    for (start, end) in lines {
        let line = &output[start..end];
        let colon = match line.iter().position(|&b| b == b':') {
            Some(c) => c,
            None => continue,
        };
        let name = &line[..colon];
        let value: Vec<u8> = line[colon + 1..]
            .iter()
            .skip_while(|&&b| b == b' ' || b == b'\t')
            .cloned()
            .collect();

        if name.eq_ignore_ascii_case(b"status") {
            status = value
                .iter()
                .take_while(|&&b| b.is_ascii_digit())
                .fold(None, |acc: Option<u16>, &b| {
                    Some(acc.unwrap_or(0) * 10 + (b - b'0') as u16)
                });
        } else {
            headers.push((name.to_vec(), value));
        }
    }

    (status, headers, output[body_start..].to_vec())
}

fn build_env(params: &CgiParams) -> Vec<(String, String)> {
    let mut env = Vec::new();
    env.push(("PATH".to_string(), "/usr/local/bin:/usr/bin:/bin".to_string()));
    env.push(("LANG".to_string(), "C".to_string()));
    env.push(("PWD".to_string(), config::WEBROOT.to_string()));
    env.push(("GATEWAY_INTERFACE".to_string(), "CGI/1.1".to_string()));
    env.push((
        "SCRIPT_FILENAME".to_string(),
        params.script_filename.to_string_lossy().into_owned(),
    ));
    env.push((
        "SCRIPT_NAME".to_string(),
        String::from_utf8_lossy(params.script_name).into_owned(),
    ));
    env.push(("DOCUMENT_ROOT".to_string(), config::WEBROOT.to_string()));
    env.push((
        "QUERY_STRING".to_string(),
        params
            .query
            .map(|q| String::from_utf8_lossy(q).into_owned())
            .unwrap_or_default(),
    ));
    env.push((
        "REQUEST_METHOD".to_string(),
        String::from_utf8_lossy(params.method.as_bytes()).into_owned(),
    ));
    env.push(("SERVER_SOFTWARE".to_string(), config::SERVER_IDENT.to_string()));
    env.push(("SERVER_PORT".to_string(), config::LISTEN_PORT.to_string()));
    env.push(("SERVER_PROTOCOL".to_string(), "HTTP/1.1".to_string()));
    // Satisfies PHP's cgi.force_redirect check, which otherwise refuses to
    // run a script invoked outside of a real web server.
    env.push(("REDIRECT_STATUS".to_string(), "true".to_string()));

    if let Some(payload) = params.payload {
        env.push(("CONTENT_LENGTH".to_string(), payload.len().to_string()));
    }

    for (name, value) in params.headers {
        if name.eq_ignore_ascii_case(b"content-type") {
            env.push((
                "CONTENT_TYPE".to_string(),
                String::from_utf8_lossy(value).into_owned(),
            ));
            continue;
        }
        if name.eq_ignore_ascii_case(b"content-length") {
            continue;
        }
        let mut env_name = String::with_capacity(name.len() + 5);
        env_name.push_str("HTTP_");
        for &b in name.iter() {
            env_name.push(if b == b'-' { '_' } else { (b as char).to_ascii_uppercase() });
        }
        env.push((env_name, String::from_utf8_lossy(value).into_owned()));
    }

    env
}
