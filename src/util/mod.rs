/// Error types and Result alias
pub mod error;

pub use error::*;
