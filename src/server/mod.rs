//! Server implementation

pub mod server;
pub mod handler;

pub use server::*;
pub use handler::*;
