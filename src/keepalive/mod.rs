//! Keepalive application: platform capabilities, the socket seam and the
//! per-connection applicator

pub mod platform;
pub mod socket;
pub mod applicator;

pub use platform::*;
pub use socket::*;
pub use applicator::*;
