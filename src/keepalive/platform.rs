//! Which keepalive tunables the running platform exposes

/// Splits items by whether the target has independent probe count, idle
/// and interval options. The one place that lists those targets.
///
/// ```ignore
/// cfg_tunables! {
///     independent { /* linux-style items */ }
///     idle_only { /* everything else */ }
/// }
/// ```
macro_rules! cfg_tunables {
    (independent { $($yes:item)* } idle_only { $($no:item)* }) => {
        $crate::keepalive::platform::cfg_tunables! {
            @split any(
                target_os = "linux",
                target_os = "android",
                target_os = "freebsd",
                target_os = "dragonfly"
            ),
            { $($yes)* }
            { $($no)* }
        }
    };
    (@split $pred:meta, { $($yes:item)* } { $($no:item)* }) => {
        $( #[cfg($pred)] $yes )*
        $( #[cfg(not($pred))] $no )*
    };
}

pub(crate) use cfg_tunables;

cfg_tunables! {
    independent {
        const CURRENT: Capabilities = Capabilities::INDEPENDENT;
    }
    idle_only {
        const CURRENT: Capabilities = Capabilities::IDLE_ONLY;
    }
}

/// Shape of the per-socket keepalive controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tunables {
    /// Only a combined idle-time option (BSD-derived `TCP_KEEPALIVE`).
    /// Probe count and interval are not settable per socket.
    IdleOnly,
    /// Independent probe count, idle time and interval options.
    Independent,
}

/// Socket-option capabilities of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub tunables: Tunables,
    /// Name of the idle-time option, used in diagnostics
    pub idle_option: &'static str,
}

impl Capabilities {
    /// Linux-style `TCP_KEEPCNT` / `TCP_KEEPIDLE` / `TCP_KEEPINTVL`
    pub const INDEPENDENT: Capabilities = Capabilities {
        tunables: Tunables::Independent,
        idle_option: "TCP_KEEPIDLE",
    };

    /// A single `TCP_KEEPALIVE` idle option
    pub const IDLE_ONLY: Capabilities = Capabilities {
        tunables: Tunables::IdleOnly,
        idle_option: "TCP_KEEPALIVE",
    };

    /// Capabilities of the target this crate was compiled for
    pub const fn current() -> Capabilities {
        CURRENT
    }

    pub fn supports_probe_count(&self) -> bool {
        self.tunables == Tunables::Independent
    }

    pub fn supports_interval(&self) -> bool {
        self.tunables == Tunables::Independent
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::current()
    }
}
