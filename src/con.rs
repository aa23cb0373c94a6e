//! Connection-level I/O: a non-blocking byte accumulator wrapped around one
//! client socket.
//!
//! A socket server juggling many connections on a handful of threads needs
//! to never block a thread indefinitely: accumulate whatever bytes are
//! available and let the caller decide when it has a full request.
//! `fill`/`wait_and_fill` do the accumulating; `request::parse` works
//! directly against the resulting buffer.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use crate::config;
use crate::error::{HttpError, Result};
use crate::log::{self, Level};
use crate::unix;

pub struct Connection {
    stream: TcpStream,
    remote: String,
    buf: Vec<u8>,
    request_count: usize,
}

impl Connection {
    pub fn new(stream: TcpStream, remote: String) -> io::Result<Connection> {
        stream.set_nonblocking(true)?;
        Ok(Connection {
            stream,
            remote,
            buf: Vec::new(),
            request_count: 0,
        })
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    /// Drops the first `n` bytes of the accumulator -- the caller has fully
    /// consumed a request (or has given up on one) and wants whatever's left
    /// to look like the start of the next pipelined request.
    pub fn consume(&mut self, n: usize) {
        self.buf.drain(..n);
    }

    pub fn bump_request_count(&mut self) -> usize {
        self.request_count += 1;
        self.request_count
    }

    /// Reads whatever is available right now, without blocking, appending it
    /// to the accumulator. Returns the number of bytes read; `0` means
    /// nothing was ready (not EOF -- EOF is `ConnectionClosed`).
    pub fn fill(&mut self) -> Result<usize> {
        let mut chunk = [0u8; config::READ_CHUNK_BYTES];
        let mut total = 0;
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    if total == 0 {
                        return Err(HttpError::ConnectionClosed);
                    }
                    break;
                }
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    total += n;
                    if n < chunk.len() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }

    /// Polls up to `timeout` for readability, then fills. Returns `Ok(true)`
    /// if new bytes arrived, `Ok(false)` on a plain timeout.
    pub fn wait_and_fill(&mut self, timeout: Duration) -> Result<bool> {
        if unix::poll_readable(self.stream.as_raw_fd(), timeout)? {
            self.fill()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Writes the entire buffer, retrying on `WouldBlock` the way the old
    /// `timeout` shim retried a blocking write -- except here we poll and
    /// sleep in small increments rather than trusting the kernel to block
    /// for us, since the socket is non-blocking.
    pub fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < data.len() {
            match self.stream.write(&data[written..]) {
                Ok(0) => return Err(HttpError::ConnectionClosed),
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(config::POLL_SLEEP_MILLIS));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                // Don't use the default io::Error conversion here -- write
                // failures are the client's fault and can't typically be
                // reported, so it's important that we signal ConnectionClosed.
                Err(_) => return Err(HttpError::ConnectionClosed),
            }
        }
        Ok(())
    }

    pub fn log(&self, msg: std::fmt::Arguments) {
        log::log(Level::Info, format_args!("{} {}", self.remote, msg));
    }

    pub fn log_error(&self, msg: std::fmt::Arguments) {
        log::log(Level::Warn, format_args!("{} {}", self.remote, msg));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, TcpStream};

    fn make_pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, remote) = listener.accept().unwrap();
        let con = Connection::new(server, remote.to_string()).unwrap();
        (con, client)
    }

    #[test]
    fn test_fill_accumulates_available_bytes() {
        let (mut con, mut client) = make_pair();
        client.write_all(b"GET / HTTP/1.1\r\n").unwrap();
        client.flush().unwrap();
        // Give the kernel a moment to deliver the bytes to the peer socket.
        std::thread::sleep(Duration::from_millis(50));
        con.fill().unwrap();
        assert_eq!(con.buffer(), b"GET / HTTP/1.1\r\n");
    }

    #[test]
    fn test_consume_drains_prefix() {
        let (mut con, mut client) = make_pair();
        client.write_all(b"abcdef").unwrap();
        client.flush().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        con.fill().unwrap();
        con.consume(3);
        assert_eq!(con.buffer(), b"def");
    }

    #[test]
    fn test_connection_closed_on_eof() {
        let (mut con, client) = make_pair();
        drop(client);
        std::thread::sleep(Duration::from_millis(50));
        match con.fill() {
            Err(HttpError::ConnectionClosed) => (),
            other => panic!("expected ConnectionClosed, got {:?}", other.is_ok()),
        }
    }
}
