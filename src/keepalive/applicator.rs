//! Per-connection keepalive applicator
//!
//! Translates one scope's [`EffectiveSettings`] into socket options on one
//! connection. The host calls [`apply_keepalive`] once per connection, after
//! the active scope is known and before the request is serviced further.
//!
//! Call order is fixed: `SO_KEEPALIVE` first, then probe count, idle time and
//! interval. The first failing call stops the sequence.

use crate::config::EffectiveSettings;
use crate::keepalive::{Capabilities, KeepaliveSocket, Tunables};
use crate::util::{KeepaliveError, Result};
use std::io;

pub const KEEPALIVE_FLAG: &str = "SO_KEEPALIVE";
pub const PROBE_COUNT_OPTION: &str = "TCP_KEEPCNT";
pub const INTERVAL_OPTION: &str = "TCP_KEEPINTVL";

/// Result of one applicator invocation
#[derive(Debug)]
pub enum Outcome {
    /// Keepalive is disabled for the scope; nothing was touched
    Declined,
    /// All options were applied
    Continue,
    /// A socket-option call failed; the request must be answered with an
    /// internal error
    Abort(KeepaliveError),
}

impl Outcome {
    /// Whether the host may keep processing the request
    pub fn proceeds(&self) -> bool {
        !matches!(self, Outcome::Abort(_))
    }

    /// HTTP status to respond with when the request must stop here
    pub fn status(&self) -> Option<u16> {
        match self {
            Outcome::Abort(_) => Some(500),
            _ => None,
        }
    }

    /// The failure, if the outcome is [`Outcome::Abort`]
    pub fn error(&self) -> Option<&KeepaliveError> {
        match self {
            Outcome::Abort(e) => Some(e),
            _ => None,
        }
    }
}

/// Apply `settings` to `socket` using the running platform's capabilities
pub fn apply_keepalive<S>(settings: &EffectiveSettings, socket: &S) -> Outcome
where
    S: KeepaliveSocket + ?Sized,
{
    apply_keepalive_with(settings, socket, Capabilities::current())
}

/// Apply `settings` to `socket` for an explicit set of capabilities
pub fn apply_keepalive_with<S>(
    settings: &EffectiveSettings,
    socket: &S,
    caps: Capabilities,
) -> Outcome
where
    S: KeepaliveSocket + ?Sized,
{
    if !settings.enabled {
        tracing::trace!("[Keepalive] Disabled for this scope");
        return Outcome::Declined;
    }

    match set_options(settings, socket, caps) {
        Ok(()) => {
            tracing::debug!(
                probe_count = settings.probe_count,
                idle_secs = settings.idle.as_secs(),
                interval_secs = settings.interval.as_secs(),
                tunables = ?caps.tunables,
                "[Keepalive] Applied"
            );
            Outcome::Continue
        }
        Err(e) => {
            if let KeepaliveError::SocketOption { option, value, .. } = &e {
                tracing::error!(option = *option, value = *value, "[Keepalive] {}", e);
            } else {
                tracing::error!("[Keepalive] {}", e);
            }
            Outcome::Abort(e)
        }
    }
}

fn set_options<S>(settings: &EffectiveSettings, socket: &S, caps: Capabilities) -> Result<()>
where
    S: KeepaliveSocket + ?Sized,
{
    set_option(KEEPALIVE_FLAG, 1, || socket.set_keepalive(true))?;

    let idle_secs = settings.idle.as_secs();
    match caps.tunables {
        Tunables::IdleOnly => {
            set_option(caps.idle_option, idle_secs, || socket.set_idle(settings.idle))?;
        }
        Tunables::Independent => {
            set_option(PROBE_COUNT_OPTION, settings.probe_count.into(), || {
                socket.set_probe_count(settings.probe_count)
            })?;
            set_option(caps.idle_option, idle_secs, || socket.set_idle(settings.idle))?;
            set_option(INTERVAL_OPTION, settings.interval.as_secs(), || {
                socket.set_interval(settings.interval)
            })?;
        }
    }
    Ok(())
}

fn set_option(
    option: &'static str,
    value: u64,
    f: impl FnOnce() -> io::Result<()>,
) -> Result<()> {
    f().map_err(|source| KeepaliveError::SocketOption {
        option,
        value,
        source,
    })
}
