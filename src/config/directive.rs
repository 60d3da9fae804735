//! Directive binding: maps already-tokenized `name value` pairs onto
//! [`ScopeSettings`] fields.

use crate::config::ScopeSettings;
use crate::util::{KeepaliveError, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// The four keepalive directives. Each is legal in every scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    /// `tcp_keepalive on|off`
    Enable,
    /// `tcp_keepcnt <n>`
    ProbeCount,
    /// `tcp_keepidle <duration>`
    Idle,
    /// `tcp_keepintvl <duration>`
    Interval,
}

impl Directive {
    pub const ALL: [Directive; 4] = [
        Directive::Enable,
        Directive::ProbeCount,
        Directive::Idle,
        Directive::Interval,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Directive::Enable => "tcp_keepalive",
            Directive::ProbeCount => "tcp_keepcnt",
            Directive::Idle => "tcp_keepidle",
            Directive::Interval => "tcp_keepintvl",
        }
    }

    /// Whether the directive has already been declared in `settings`
    fn is_set_in(self, settings: &ScopeSettings) -> bool {
        match self {
            Directive::Enable => settings.enabled.is_some(),
            Directive::ProbeCount => settings.probe_count.is_some(),
            Directive::Idle => settings.idle.is_some(),
            Directive::Interval => settings.interval.is_some(),
        }
    }

    /// Convert `value` and store it in `settings`.
    ///
    /// A directive may appear at most once per scope.
    pub fn apply(self, settings: &mut ScopeSettings, value: &str) -> Result<()> {
        if self.is_set_in(settings) {
            return Err(KeepaliveError::DuplicateDirective(self.name()));
        }

        let invalid = || KeepaliveError::InvalidValue {
            directive: self.name(),
            value: value.to_string(),
        };

        match self {
            Directive::Enable => settings.enabled = Some(parse_flag(value).ok_or_else(invalid)?),
            Directive::ProbeCount => {
                settings.probe_count = Some(value.parse::<u32>().map_err(|_| invalid())?)
            }
            Directive::Idle => settings.idle = Some(parse_seconds(value).ok_or_else(invalid)?),
            Directive::Interval => {
                settings.interval = Some(parse_seconds(value).ok_or_else(invalid)?)
            }
        }
        Ok(())
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Directive {
    type Err = KeepaliveError;

    fn from_str(s: &str) -> Result<Self> {
        Directive::ALL
            .into_iter()
            .find(|d| d.name() == s)
            .ok_or_else(|| KeepaliveError::UnknownDirective(s.to_string()))
    }
}

/// Look up `name` and apply `value` to `settings`
pub fn set_directive(settings: &mut ScopeSettings, name: &str, value: &str) -> Result<()> {
    name.parse::<Directive>()?.apply(settings, value)
}

fn parse_flag(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("on") {
        Some(true)
    } else if value.eq_ignore_ascii_case("off") {
        Some(false)
    } else {
        None
    }
}

/// Parse a seconds value: a bare integer, or a sequence of `<n><unit>`
/// terms such as `1m30s`. Units are `y` (365 days), `M` (30 days), `w`,
/// `d`, `h`, `m` and `s`.
pub fn parse_seconds(value: &str) -> Option<Duration> {
    if value.is_empty() {
        return None;
    }
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    let mut last_unit = u64::MAX;

    for c in value.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c {
            'y' => 31_536_000,
            'M' => 2_592_000,
            'w' => 604_800,
            'd' => 86_400,
            'h' => 3_600,
            'm' => 60,
            's' => 1,
            _ => return None,
        };
        // Units must be given largest first, each at most once.
        if digits.is_empty() || unit >= last_unit {
            return None;
        }
        let n: u64 = digits.parse().ok()?;
        total = total.checked_add(n.checked_mul(unit)?)?;
        digits.clear();
        last_unit = unit;
    }

    if !digits.is_empty() {
        // Trailing bare number after a unit, as in "1m30".
        let n: u64 = digits.parse().ok()?;
        if last_unit == 1 {
            return None;
        }
        total = total.checked_add(n)?;
    }

    Some(Duration::from_secs(total))
}
