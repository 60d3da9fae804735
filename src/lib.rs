//! Per-scope TCP keepalive for HTTP servers
//!
//! Keepalive parameters (enable flag, probe count, idle time, probe interval)
//! are declared per scope and applied as socket options to each accepted
//! connection.
//!
//! # Architecture
//!
//! - **config**: Scope settings, directive binding, inheritance and loading
//! - **keepalive**: Platform capabilities and the per-connection applicator
//! - **server**: Tokio HTTP server that runs the applicator per connection
//! - **util**: Error handling

/// Configuration: scope settings, directives, scope tree, file loader
pub mod config;
/// Keepalive application onto sockets
pub mod keepalive;
/// Server implementation
pub mod server;
/// Utility modules (error)
pub mod util;

pub use config::*;
pub use keepalive::*;

// Re-export commonly used types
pub use util::error::{KeepaliveError, Result};
