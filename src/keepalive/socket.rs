//! Socket-option seam between the applicator and the OS

use crate::keepalive::platform::cfg_tunables;
use socket2::{SockRef, Socket};
use std::io;
use std::time::Duration;

/// The four keepalive option setters the applicator issues.
///
/// Each call maps to one option on the socket. Implemented for
/// [`SockRef`]; tests substitute recorders.
pub trait KeepaliveSocket {
    /// `SO_KEEPALIVE`
    fn set_keepalive(&self, enable: bool) -> io::Result<()>;
    /// `TCP_KEEPCNT`
    fn set_probe_count(&self, count: u32) -> io::Result<()>;
    /// `TCP_KEEPIDLE`, or `TCP_KEEPALIVE` on BSD-derived kernels
    fn set_idle(&self, idle: Duration) -> io::Result<()>;
    /// `TCP_KEEPINTVL`
    fn set_interval(&self, interval: Duration) -> io::Result<()>;
}

impl KeepaliveSocket for SockRef<'_> {
    fn set_keepalive(&self, enable: bool) -> io::Result<()> {
        Socket::set_keepalive(self, enable)
    }

    fn set_probe_count(&self, count: u32) -> io::Result<()> {
        sys::set_probe_count(self, count)
    }

    fn set_idle(&self, idle: Duration) -> io::Result<()> {
        sys::set_idle(self, idle)
    }

    fn set_interval(&self, interval: Duration) -> io::Result<()> {
        sys::set_interval(self, interval)
    }
}

mod sys {
    use super::*;

    cfg_tunables! {
        independent {
            use nix::sys::socket::{setsockopt, sockopt};

            // One setsockopt per tunable. socket2's `set_tcp_keepalive` would
            // also write SO_KEEPALIVE on every call.
            pub(super) fn set_probe_count(socket: &Socket, count: u32) -> io::Result<()> {
                setsockopt(socket, sockopt::TcpKeepCount, &count).map_err(io::Error::from)
            }

            pub(super) fn set_idle(socket: &Socket, idle: Duration) -> io::Result<()> {
                setsockopt(socket, sockopt::TcpKeepIdle, &whole_seconds(idle))
                    .map_err(io::Error::from)
            }

            pub(super) fn set_interval(socket: &Socket, interval: Duration) -> io::Result<()> {
                setsockopt(socket, sockopt::TcpKeepInterval, &whole_seconds(interval))
                    .map_err(io::Error::from)
            }

            fn whole_seconds(duration: Duration) -> u32 {
                u32::try_from(duration.as_secs()).unwrap_or(u32::MAX)
            }
        }
        idle_only {
            use socket2::TcpKeepalive;

            pub(super) fn set_probe_count(_socket: &Socket, _count: u32) -> io::Result<()> {
                Err(io::Error::from(io::ErrorKind::Unsupported))
            }

            pub(super) fn set_idle(socket: &Socket, idle: Duration) -> io::Result<()> {
                Socket::set_tcp_keepalive(socket, &TcpKeepalive::new().with_time(idle))
            }

            pub(super) fn set_interval(_socket: &Socket, _interval: Duration) -> io::Result<()> {
                Err(io::Error::from(io::ErrorKind::Unsupported))
            }
        }
    }
}
