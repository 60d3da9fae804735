//! Minimal HTTP/1.x request head handling for the keepalive server.
//!
//! Only the request line and `Host` header are interpreted; that is all the
//! scope lookup needs.

use crate::config::EffectiveSettings;
use crate::util::{KeepaliveError, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
pub const MAX_HEADER_SIZE: usize = 64 * 1024;

/// The parts of a request used to pick a scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    /// Path without query string
    pub path: String,
    pub version: String,
    pub host: Option<String>,
}

/// Read bytes until the end of the header block
pub async fn read_request_head<R>(stream: &mut R) -> Result<RequestHead>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(1024);
    let mut tmp = [0u8; 1024];

    loop {
        let n = stream.read(&mut tmp).await?;
        if n == 0 {
            return Err(KeepaliveError::Protocol(
                "Connection closed before HTTP header complete".into(),
            ));
        }
        buf.extend_from_slice(&tmp[..n]);
        if let Some(end) = find_header_end(&buf) {
            let header = std::str::from_utf8(&buf[..end]).map_err(|e| {
                KeepaliveError::Protocol(format!("Invalid HTTP header encoding: {}", e))
            })?;
            return parse_request_head(header);
        }
        if buf.len() > MAX_HEADER_SIZE {
            return Err(KeepaliveError::Protocol("HTTP header too large".to_string()));
        }
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|window| window == HEADER_TERMINATOR)
        .map(|pos| pos + HEADER_TERMINATOR.len())
}

/// Parse the request line and `Host` header
pub fn parse_request_head(header: &str) -> Result<RequestHead> {
    let mut lines = header.split("\r\n");
    let request_line = lines
        .next()
        .ok_or_else(|| KeepaliveError::Protocol("Missing HTTP request line".into()))?;

    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return Err(KeepaliveError::Protocol("Invalid HTTP request line".into()));
    };
    let version = parts.next().unwrap_or("HTTP/1.0");

    let mut host = lines.find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("host")
            .then(|| value.trim().to_string())
    });

    // Absolute-form target carries its own authority.
    let mut path = target;
    if let Some(rest) = target
        .strip_prefix("http://")
        .or_else(|| target.strip_prefix("https://"))
    {
        let (authority, tail) = match rest.find('/') {
            Some(pos) => rest.split_at(pos),
            None => (rest, "/"),
        };
        host = Some(authority.to_string());
        path = tail;
    }

    let path = path.split(['?', '#']).next().unwrap_or_default();
    if !path.starts_with('/') {
        return Err(KeepaliveError::Protocol(format!(
            "Unsupported request target: {}",
            target
        )));
    }

    Ok(RequestHead {
        method: method.to_string(),
        path: path.to_string(),
        version: version.to_string(),
        host: host.filter(|h| !h.is_empty()),
    })
}

/// Successful response listing the settings that were in effect
pub async fn send_settings<W>(stream: &mut W, settings: &EffectiveSettings) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let body = format!("{}\n", settings);
    send_response(stream, 200, "OK", &body).await
}

/// Reason phrase for the status codes this server produces
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        200 => "OK",
        400 => "Bad Request",
        408 => "Request Timeout",
        500 => "Internal Server Error",
        _ => "Error",
    }
}

/// Error response without a body
pub async fn send_http_error<W>(stream: &mut W, code: u16, message: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    send_response(stream, code, message, "").await
}

async fn send_response<W>(stream: &mut W, code: u16, message: &str, body: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        code,
        message,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}
