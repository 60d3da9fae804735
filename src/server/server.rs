//! HTTP server that applies per-scope TCP keepalive to every connection

use crate::config::{ResolvedTree, SharedTree};
use crate::keepalive::apply_keepalive;
use crate::server::handler::{read_request_head, reason_phrase, send_http_error, send_settings};
use crate::util::{KeepaliveError, Result};
use socket2::SockRef;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{Instrument, field, info_span};

/// How long a client may take to send a complete request head (default: 30s)
pub const DEFAULT_HEADER_TIMEOUT: Duration = Duration::from_secs(30);

/// Server accepts connections and applies the keepalive settings of the
/// scope each request resolves to
pub struct Server {
    tree: SharedTree,
    header_timeout: Duration,
}

impl Server {
    /// Create a server over a fixed configuration
    pub fn new(tree: Arc<ResolvedTree>) -> Self {
        Self::new_with_reloadable_config(Arc::new(RwLock::new(tree)))
    }

    /// Create a server whose configuration can be swapped by a reloader
    pub fn new_with_reloadable_config(tree: SharedTree) -> Self {
        Self {
            tree,
            header_timeout: DEFAULT_HEADER_TIMEOUT,
        }
    }

    /// Set the request head timeout. Slow clients get a 408 and are closed.
    pub fn with_header_timeout(mut self, header_timeout: Duration) -> Self {
        self.header_timeout = header_timeout;
        self
    }

    /// Start the server and listen for connections
    pub async fn listen(&self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("[Server] Listening on {}", addr);
        self.serve(listener).await
    }

    /// Accept connections from an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let tree = self.snapshot();
                    let header_timeout = self.header_timeout;
                    let span = info_span!(
                        "keepalive.connection",
                        peer_addr = %addr,
                        path = field::Empty
                    );

                    tokio::spawn(
                        async move {
                            if let Err(e) = handle_connection(stream, tree, header_timeout).await {
                                tracing::debug!("[Server] Connection error: {}", e);
                            }
                        }
                        .instrument(span),
                    );
                }
                Err(e) => {
                    tracing::error!("[Server] Accept error: {}", e);
                }
            }
        }
    }

    fn snapshot(&self) -> Arc<ResolvedTree> {
        self.tree
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Handle a single TCP connection: one request, then close
async fn handle_connection(
    mut stream: TcpStream,
    tree: Arc<ResolvedTree>,
    header_timeout: Duration,
) -> Result<()> {
    if let Err(err) = stream.set_nodelay(true) {
        tracing::debug!("[Server] Failed to enable TCP_NODELAY: {}", err);
    }

    let head = match tokio::time::timeout(header_timeout, read_request_head(&mut stream)).await {
        Ok(Ok(head)) => head,
        Ok(Err(KeepaliveError::Protocol(msg))) => {
            tracing::debug!("[Server] Bad request: {}", msg);
            send_http_error(&mut stream, 400, reason_phrase(400)).await?;
            return Ok(());
        }
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            tracing::debug!(
                "[Server] Request head not received within {:?}, closing",
                header_timeout
            );
            send_http_error(&mut stream, 408, reason_phrase(408)).await?;
            return Ok(());
        }
    };
    tracing::Span::current().record("path", head.path.as_str());

    let settings = tree.lookup(head.host.as_deref(), &head.path);
    tracing::debug!(
        "[Server] {} {} host={:?} -> {}",
        head.method,
        head.path,
        head.host,
        settings
    );

    let outcome = apply_keepalive(&settings, &SockRef::from(&stream));
    match outcome.status() {
        Some(code) => send_http_error(&mut stream, code, reason_phrase(code)).await,
        None => send_settings(&mut stream, &settings).await,
    }
}
