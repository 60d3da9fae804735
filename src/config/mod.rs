//! Keepalive configuration: per-scope directives, inheritance and loading

pub mod settings;
pub mod directive;
pub mod tree;
pub mod parser;
pub mod reloader;

pub use settings::*;
pub use directive::*;
pub use tree::*;
pub use parser::*;
pub use reloader::*;
