//! Common test utilities and helpers

use http_tcp_keepalive::config::{SharedTree, parse_config};
use http_tcp_keepalive::server::Server;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{Duration, timeout};

/// Start a server on an ephemeral port over the given configuration text
#[allow(dead_code)]
pub async fn start_server(config: &str) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    let tree = Arc::new(parse_config(config)?.scopes.resolve());
    start_server_with_tree(Server::new(tree)).await
}

/// Start a server whose configuration is read through `shared`
#[allow(dead_code)]
pub async fn start_reloadable_server(
    shared: SharedTree,
) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    start_server_with_tree(Server::new_with_reloadable_config(shared)).await
}

/// Run an already configured server on an ephemeral port
#[allow(dead_code)]
pub async fn start_server_with_tree(server: Server) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        if let Err(e) = server.serve(listener).await {
            tracing::error!("[Test] Server error: {}", e);
        }
    });
    Ok((addr, handle))
}

/// Response status code and body
pub struct Response {
    pub status: u16,
    pub body: String,
}

/// Send a raw request and read the response until the server closes
#[allow(dead_code)]
pub async fn request(addr: SocketAddr, raw: &str) -> anyhow::Result<Response> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(raw.as_bytes()).await?;

    let mut buf = Vec::new();
    timeout(Duration::from_secs(5), stream.read_to_end(&mut buf)).await??;
    let text = String::from_utf8(buf)?;

    let status = text
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("empty response"))?
        .parse()?;
    let body = text
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    Ok(Response { status, body })
}

/// GET `path` with the given Host header
pub async fn get(addr: SocketAddr, host: &str, path: &str) -> anyhow::Result<Response> {
    request(
        addr,
        &format!("GET {path} HTTP/1.1\r\nHost: {host}\r\nUser-Agent: test\r\n\r\n"),
    )
    .await
}
