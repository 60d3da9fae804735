//! Per-scope keepalive settings and the inheritance merge

use std::fmt;
use std::time::Duration;

/// Keepalive is off unless some scope turns it on
pub const DEFAULT_ENABLED: bool = false;
/// Unacknowledged probes before the peer is declared dead
pub const DEFAULT_PROBE_COUNT: u32 = 2;
/// Idle time before the first probe
pub const DEFAULT_IDLE: Duration = Duration::from_secs(60);
/// Time between probes
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Directive values declared in a single scope.
///
/// `None` means the directive was not set in this scope and the value is
/// inherited from the enclosing one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeSettings {
    pub enabled: Option<bool>,
    pub probe_count: Option<u32>,
    pub idle: Option<Duration>,
    pub interval: Option<Duration>,
}

impl ScopeSettings {
    /// Create a record with every field unset
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `enabled`
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Set `probe_count`
    #[must_use]
    pub fn with_probe_count(mut self, count: u32) -> Self {
        self.probe_count = Some(count);
        self
    }

    /// Set `idle`
    #[must_use]
    pub fn with_idle(mut self, idle: Duration) -> Self {
        self.idle = Some(idle);
        self
    }

    /// Set `interval`
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// True when no directive was declared in this scope
    pub fn is_unset(&self) -> bool {
        *self == Self::default()
    }
}

/// Fully resolved keepalive settings for one scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveSettings {
    pub enabled: bool,
    pub probe_count: u32,
    pub idle: Duration,
    pub interval: Duration,
}

impl Default for EffectiveSettings {
    /// The synthetic root every global scope is merged over
    fn default() -> Self {
        Self {
            enabled: DEFAULT_ENABLED,
            probe_count: DEFAULT_PROBE_COUNT,
            idle: DEFAULT_IDLE,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl fmt::Display for EffectiveSettings {
    /// Renders the settings in directive form
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tcp_keepalive={} tcp_keepcnt={} tcp_keepidle={} tcp_keepintvl={}",
            if self.enabled { "on" } else { "off" },
            self.probe_count,
            self.idle.as_secs(),
            self.interval.as_secs()
        )
    }
}

/// Merge a scope's own settings over its parent's resolved settings.
///
/// Every field is taken from `child` when set, otherwise from `parent`.
pub fn merge_scope_settings(parent: &EffectiveSettings, child: &ScopeSettings) -> EffectiveSettings {
    EffectiveSettings {
        enabled: child.enabled.unwrap_or(parent.enabled),
        probe_count: child.probe_count.unwrap_or(parent.probe_count),
        idle: child.idle.unwrap_or(parent.idle),
        interval: child.interval.unwrap_or(parent.interval),
    }
}
