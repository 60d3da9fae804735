//! Scope tree (global → server → location) and its resolved form

use crate::config::{EffectiveSettings, ScopeSettings, merge_scope_settings};
use std::sync::Arc;

/// A location block inside a server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationScope {
    /// Path prefix the location matches
    pub prefix: String,
    pub settings: ScopeSettings,
}

/// A virtual server and its locations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerScope {
    /// Server name matched against the `Host` header. Empty matches nothing
    /// and only serves as the default.
    pub name: String,
    pub settings: ScopeSettings,
    pub locations: Vec<LocationScope>,
}

impl ServerScope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a location and return it for directive binding
    pub fn location(&mut self, prefix: impl Into<String>) -> &mut LocationScope {
        self.locations.push(LocationScope {
            prefix: prefix.into(),
            settings: ScopeSettings::new(),
        });
        let last = self.locations.len() - 1;
        &mut self.locations[last]
    }
}

/// Unresolved configuration as declared, one [`ScopeSettings`] per scope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeTree {
    pub global: ScopeSettings,
    pub servers: Vec<ServerScope>,
}

impl ScopeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a server and return it for directive binding
    pub fn server(&mut self, name: impl Into<String>) -> &mut ServerScope {
        self.servers.push(ServerScope::new(name));
        let last = self.servers.len() - 1;
        &mut self.servers[last]
    }

    /// Resolve every scope against its parent.
    ///
    /// A tree without servers resolves to a single implicit default server
    /// that inherits the global settings.
    pub fn resolve(&self) -> ResolvedTree {
        let global = merge_scope_settings(&EffectiveSettings::default(), &self.global);

        let mut servers: Vec<ResolvedServer> = self
            .servers
            .iter()
            .map(|server| {
                let effective = merge_scope_settings(&global, &server.settings);
                let mut locations: Vec<ResolvedLocation> = server
                    .locations
                    .iter()
                    .map(|loc| ResolvedLocation {
                        prefix: loc.prefix.clone(),
                        settings: Arc::new(merge_scope_settings(&effective, &loc.settings)),
                    })
                    .collect();
                // Longest prefix first so lookup can stop at the first match.
                locations.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
                ResolvedServer {
                    name: server.name.to_ascii_lowercase(),
                    settings: Arc::new(effective),
                    locations,
                }
            })
            .collect();

        if servers.is_empty() {
            servers.push(ResolvedServer {
                name: String::new(),
                settings: Arc::new(global),
                locations: Vec::new(),
            });
        }

        ResolvedTree {
            global: Arc::new(global),
            servers,
        }
    }
}

#[derive(Debug, Clone)]
struct ResolvedLocation {
    prefix: String,
    settings: Arc<EffectiveSettings>,
}

#[derive(Debug, Clone)]
struct ResolvedServer {
    name: String,
    settings: Arc<EffectiveSettings>,
    locations: Vec<ResolvedLocation>,
}

impl ResolvedServer {
    fn lookup(&self, path: &str) -> &Arc<EffectiveSettings> {
        self.locations
            .iter()
            .find(|loc| path.starts_with(&loc.prefix))
            .map(|loc| &loc.settings)
            .unwrap_or(&self.settings)
    }
}

/// Immutable resolved configuration, shared by all connections
#[derive(Debug, Clone)]
pub struct ResolvedTree {
    global: Arc<EffectiveSettings>,
    // Never empty; the first entry is the default server.
    servers: Vec<ResolvedServer>,
}

impl ResolvedTree {
    /// Settings of the global scope
    pub fn global(&self) -> &Arc<EffectiveSettings> {
        &self.global
    }

    /// Settings of the named server scope, if declared
    pub fn server(&self, name: &str) -> Option<&Arc<EffectiveSettings>> {
        self.find_server(name).map(|s| &s.settings)
    }

    /// Settings that apply to a request for `path` on `host`.
    ///
    /// `host` may carry a port. Unknown hosts use the default server.
    pub fn lookup(&self, host: Option<&str>, path: &str) -> Arc<EffectiveSettings> {
        let server = host
            .and_then(|h| self.find_server(strip_port(h)))
            .unwrap_or(&self.servers[0]);
        Arc::clone(server.lookup(path))
    }

    fn find_server(&self, name: &str) -> Option<&ResolvedServer> {
        self.servers
            .iter()
            .find(|s| !s.name.is_empty() && s.name.eq_ignore_ascii_case(name))
    }
}

impl Default for ResolvedTree {
    fn default() -> Self {
        ScopeTree::new().resolve()
    }
}

fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.parse::<u16>().is_ok() => name,
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn scenario() -> ScopeTree {
        let mut tree = ScopeTree::new();
        tree.global = ScopeSettings::new().with_idle(secs(120));

        let server = tree.server("example.com");
        server.settings = ScopeSettings::new().with_probe_count(5);
        server.location("/api").settings = ScopeSettings::new().with_enabled(true);
        server.location("/api/stream").settings = ScopeSettings::new().with_interval(secs(10));

        tree.server("other.test").settings = ScopeSettings::new().with_enabled(true);
        tree
    }

    #[test]
    fn test_empty_tree_uses_defaults() {
        let resolved = ScopeTree::new().resolve();
        assert_eq!(**resolved.global(), EffectiveSettings::default());
        assert_eq!(*resolved.lookup(None, "/"), EffectiveSettings::default());
        assert_eq!(
            *resolved.lookup(Some("anything"), "/x"),
            EffectiveSettings::default()
        );
    }

    #[test]
    fn test_location_inherits_server_then_global() {
        let resolved = scenario().resolve();
        let loc = resolved.lookup(Some("example.com"), "/api/users");
        assert_eq!(
            *loc,
            EffectiveSettings {
                enabled: true,
                probe_count: 5,
                idle: secs(120),
                interval: secs(60),
            }
        );
    }

    #[test]
    fn test_longest_prefix_wins() {
        let resolved = scenario().resolve();
        let loc = resolved.lookup(Some("example.com"), "/api/stream/1");
        // "/api/stream" is a sibling of "/api", not nested, so it does not
        // inherit enabled=true from it.
        assert!(!loc.enabled);
        assert_eq!(loc.interval, secs(10));
        assert_eq!(loc.probe_count, 5);
    }

    #[test]
    fn test_unmatched_path_uses_server_scope() {
        let resolved = scenario().resolve();
        let settings = resolved.lookup(Some("example.com"), "/static/logo.png");
        assert_eq!(settings, *resolved.server("example.com").unwrap());
        assert!(!settings.enabled);
    }

    #[test]
    fn test_host_matching() {
        let resolved = scenario().resolve();
        assert!(resolved.lookup(Some("OTHER.test:8080"), "/").enabled);
        assert!(resolved.lookup(Some("other.test"), "/").enabled);
        // Unknown host falls back to the first server.
        let fallback = resolved.lookup(Some("unknown.test"), "/api");
        assert!(fallback.enabled);
        assert_eq!(fallback.probe_count, 5);
        assert!(resolved.lookup(None, "/api").enabled);
    }

    #[test]
    fn test_shared_settings_are_same_allocation() {
        let resolved = scenario().resolve();
        let a = resolved.lookup(Some("example.com"), "/api/a");
        let b = resolved.lookup(Some("example.com"), "/api/b");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("example.com:80"), "example.com");
        assert_eq!(strip_port("example.com"), "example.com");
        assert_eq!(strip_port("[::1]:8080"), "::1");
        assert_eq!(strip_port("::1"), "::1");
    }
}
