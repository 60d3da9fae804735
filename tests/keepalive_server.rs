//! End-to-end tests: scope resolution through the HTTP server

mod common;

use anyhow::Result;
use common::{get, request, start_server, start_server_with_tree};
use http_tcp_keepalive::config::parse_config;
use http_tcp_keepalive::server::Server;
use std::sync::Arc;
use std::time::{Duration, Instant};

const CONFIG: &str = r#"
tcp_keepidle 120;

server example.com {
    tcp_keepcnt 5;

    location /api {
        tcp_keepalive on;
    }

    location /api/bulk {
        tcp_keepalive on;
        tcp_keepintvl 1m30s;
    }
}

server off.test {
    tcp_keepalive off;
}
"#;

#[tokio::test]
async fn test_location_settings_applied() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    let (addr, server) = start_server(CONFIG).await?;

    let resp = get(addr, "example.com", "/api/users").await?;
    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.body,
        "tcp_keepalive=on tcp_keepcnt=5 tcp_keepidle=120 tcp_keepintvl=60\n"
    );

    let resp = get(addr, "example.com:8080", "/api/bulk/upload").await?;
    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.body,
        "tcp_keepalive=on tcp_keepcnt=5 tcp_keepidle=120 tcp_keepintvl=90\n"
    );

    server.abort();
    Ok(())
}

#[tokio::test]
async fn test_disabled_scope_continues() -> Result<()> {
    let (addr, server) = start_server(CONFIG).await?;

    let resp = get(addr, "off.test", "/").await?;
    assert_eq!(resp.status, 200);
    assert!(resp.body.starts_with("tcp_keepalive=off"));

    // Path outside any location uses the server scope.
    let resp = get(addr, "example.com", "/static/app.js").await?;
    assert_eq!(resp.status, 200);
    assert!(resp.body.starts_with("tcp_keepalive=off tcp_keepcnt=5"));

    server.abort();
    Ok(())
}

#[tokio::test]
async fn test_unknown_host_uses_default_server() -> Result<()> {
    let (addr, server) = start_server(CONFIG).await?;

    let resp = get(addr, "nobody.test", "/api").await?;
    assert_eq!(resp.status, 200);
    assert!(resp.body.starts_with("tcp_keepalive=on tcp_keepcnt=5"));

    server.abort();
    Ok(())
}

#[tokio::test]
async fn test_defaults_without_config() -> Result<()> {
    let (addr, server) = start_server("").await?;

    let resp = request(addr, "GET / HTTP/1.0\r\n\r\n").await?;
    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.body,
        "tcp_keepalive=off tcp_keepcnt=2 tcp_keepidle=60 tcp_keepintvl=60\n"
    );

    server.abort();
    Ok(())
}

#[tokio::test]
async fn test_bad_request() -> Result<()> {
    let (addr, server) = start_server(CONFIG).await?;

    let resp = request(addr, "NONSENSE\r\n\r\n").await?;
    assert_eq!(resp.status, 400);

    server.abort();
    Ok(())
}

/// Linux rejects `TCP_KEEPCNT=0`; the request must fail with 500 while
/// other connections are unaffected.
#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_rejected_option_aborts_request() -> Result<()> {
    let config = r#"
server a.test {
    location /broken {
        tcp_keepalive on;
        tcp_keepcnt 0;
    }
    location /ok {
        tcp_keepalive on;
    }
}
"#;
    let (addr, server) = start_server(config).await?;

    let resp = get(addr, "a.test", "/broken").await?;
    assert_eq!(resp.status, 500);
    assert!(resp.body.is_empty());

    let resp = get(addr, "a.test", "/ok").await?;
    assert_eq!(resp.status, 200);

    server.abort();
    Ok(())
}

#[tokio::test]
async fn test_stalled_request_head_times_out() -> Result<()> {
    let tree = Arc::new(parse_config(CONFIG)?.scopes.resolve());
    let server = Server::new(tree).with_header_timeout(Duration::from_millis(200));
    let (addr, server) = start_server_with_tree(server).await?;

    // Request line only, the header block never ends.
    let started = Instant::now();
    let resp = request(addr, "GET /api HTTP/1.1\r\nHost: example.com\r\n").await?;
    assert_eq!(resp.status, 408);
    assert!(resp.body.is_empty());
    assert!(started.elapsed() < Duration::from_secs(5));

    // Other clients are still served.
    let resp = get(addr, "example.com", "/api").await?;
    assert_eq!(resp.status, 200);

    server.abort();
    Ok(())
}
