//! Configuration reloader with file watching and hot reload support
//!
//! A reload parses the whole file again and swaps in a freshly resolved
//! [`ResolvedTree`]. Connections that already looked up their settings keep
//! the tree they started with.

use crate::config::{Config, ResolvedTree, load_config};
use crate::util::{KeepaliveError, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config as WatchConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Shared handle to the currently active resolved configuration
pub type SharedTree = Arc<RwLock<Arc<ResolvedTree>>>;

/// Shortest wait before reading a changed file, so a writer can finish
const MIN_SETTLE_TIME: Duration = Duration::from_millis(100);

/// Reloader configuration
#[derive(Debug, Clone)]
pub struct ConfigReloaderConfig {
    /// Path to the configuration file
    pub path: PathBuf,
    /// Enable file watching
    pub watch_enabled: bool,
    /// Debounce time in milliseconds
    pub debounce_ms: u64,
}

impl Default for ConfigReloaderConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("keepalive.conf"),
            watch_enabled: true,
            debounce_ms: 500,
        }
    }
}

/// Configuration reloader
pub struct ConfigReloader {
    config: ConfigReloaderConfig,
    listen: String,
    tree: SharedTree,
    reload_count: RwLock<u64>,
    last_reload: RwLock<Option<Instant>>,
}

impl ConfigReloader {
    /// Load and resolve the initial configuration
    pub fn new(config: ConfigReloaderConfig) -> Result<Self> {
        let loaded = load_config(&config.path)?;
        info!(
            "[ConfigReloader] Loaded {:?}: {} server(s)",
            config.path,
            loaded.scopes.servers.len()
        );

        Ok(Self {
            listen: loaded.listen.clone(),
            tree: Arc::new(RwLock::new(Arc::new(loaded.scopes.resolve()))),
            config,
            reload_count: RwLock::new(0),
            last_reload: RwLock::new(None),
        })
    }

    /// Listen address from the initial load. Not affected by reloads.
    pub fn listen(&self) -> &str {
        &self.listen
    }

    /// Get current resolved tree (snapshot)
    pub fn current(&self) -> Arc<ResolvedTree> {
        self.tree
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Get the shared tree handle for the server
    pub fn shared(&self) -> SharedTree {
        Arc::clone(&self.tree)
    }

    pub fn reload_count(&self) -> u64 {
        *self.reload_count.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn last_reload(&self) -> Option<Instant> {
        *self.last_reload.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reload the configuration file manually.
    ///
    /// On error the current tree stays active.
    pub fn reload(&self) -> Result<()> {
        let start = Instant::now();
        info!("[ConfigReloader] Reloading {:?}", self.config.path);

        let Config { listen, scopes } = load_config(&self.config.path)?;
        if listen != self.listen {
            warn!(
                "[ConfigReloader] listen changed to {} but requires a restart, still on {}",
                listen, self.listen
            );
        }

        let resolved = Arc::new(scopes.resolve());
        *self.tree.write().unwrap_or_else(PoisonError::into_inner) = resolved;
        *self.reload_count.write().unwrap_or_else(PoisonError::into_inner) += 1;
        *self.last_reload.write().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());

        info!(
            "[ConfigReloader] Reload completed in {:?}",
            start.elapsed()
        );
        Ok(())
    }

    /// Start watching the configuration file for changes.
    ///
    /// The parent directory is watched rather than the file, so saves that
    /// replace the file by rename keep being picked up. Events are coalesced:
    /// the reload runs once `debounce_ms` after the first event of a burst.
    pub fn start_watching(self: Arc<Self>) -> Result<()> {
        if !self.config.watch_enabled {
            debug!("[ConfigReloader] File watching is disabled");
            return Ok(());
        }

        let file_name = self
            .config
            .path
            .file_name()
            .map(OsStr::to_os_string)
            .ok_or_else(|| {
                KeepaliveError::Watch(format!("{:?} does not name a file", self.config.path))
            })?;
        let watch_dir = match self.config.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        info!("[ConfigReloader] Watching {:?} in {:?}", file_name, watch_dir);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let debounce_duration =
            Duration::from_millis(self.config.debounce_ms).max(MIN_SETTLE_TIME);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if let Ok(event) = res
                    && is_config_event(&event, &file_name)
                {
                    let _ = tx.send(());
                }
            },
            WatchConfig::default(),
        )
        .map_err(|e| KeepaliveError::Watch(format!("Failed to create file watcher: {}", e)))?;

        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .map_err(|e| KeepaliveError::Watch(format!("Failed to watch {:?}: {}", watch_dir, e)))?;

        let reloader = Arc::clone(&self);
        tokio::spawn(async move {
            let _watcher = watcher; // Keep watcher alive

            while rx.recv().await.is_some() {
                tokio::time::sleep(debounce_duration).await;

                let mut coalesced = 0usize;
                while rx.try_recv().is_ok() {
                    coalesced += 1;
                }
                if coalesced > 0 {
                    debug!("[ConfigReloader] Coalesced {} file change event(s)", coalesced);
                }

                if let Err(e) = reloader.reload() {
                    error!("[ConfigReloader] Failed to reload configuration: {}", e);
                    warn!("[ConfigReloader] Keeping current configuration active");
                }
            }
        });

        Ok(())
    }
}

/// Whether a watcher event touches the configuration file.
///
/// Creates, writes and renames onto the file count. A rename away from it
/// does not, the file is gone until something takes its place.
fn is_config_event(event: &Event, file_name: &OsStr) -> bool {
    let relevant = match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => false,
        EventKind::Create(_) | EventKind::Modify(_) => true,
        _ => false,
    };
    relevant
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use std::path::Path;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, path| event.add_path(Path::new(path).to_path_buf()))
    }

    #[test]
    fn test_config_event_filter() {
        let name = OsStr::new("keepalive.conf");

        let write = EventKind::Modify(ModifyKind::Data(DataChange::Any));
        assert!(is_config_event(&event(write, &["/etc/app/keepalive.conf"]), name));
        assert!(!is_config_event(&event(write, &["/etc/app/keepalive.conf.tmp"]), name));

        let created = EventKind::Create(CreateKind::File);
        assert!(is_config_event(&event(created, &["/etc/app/keepalive.conf"]), name));

        // Rename of a temp file over the config
        let renamed = EventKind::Modify(ModifyKind::Name(RenameMode::Both));
        assert!(is_config_event(
            &event(renamed, &["/etc/app/.keepalive.conf.swp", "/etc/app/keepalive.conf"]),
            name
        ));
        let renamed_to = EventKind::Modify(ModifyKind::Name(RenameMode::To));
        assert!(is_config_event(&event(renamed_to, &["/etc/app/keepalive.conf"]), name));

        let renamed_away = EventKind::Modify(ModifyKind::Name(RenameMode::From));
        assert!(!is_config_event(&event(renamed_away, &["/etc/app/keepalive.conf"]), name));
        let removed = EventKind::Remove(RemoveKind::File);
        assert!(!is_config_event(&event(removed, &["/etc/app/keepalive.conf"]), name));
    }

    #[test]
    fn test_reloader_config_default() {
        let config = ConfigReloaderConfig::default();
        assert!(config.watch_enabled);
        assert_eq!(config.debounce_ms, 500);
        assert_eq!(config.path, PathBuf::from("keepalive.conf"));
    }

    #[test]
    fn test_manual_reload_swaps_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keepalive.conf");
        std::fs::write(&path, "listen 127.0.0.1:0;\n").unwrap();

        let reloader = ConfigReloader::new(ConfigReloaderConfig {
            path: path.clone(),
            watch_enabled: false,
            debounce_ms: 0,
        })
        .unwrap();
        let before = reloader.current();
        assert!(!before.lookup(None, "/").enabled);
        assert_eq!(reloader.listen(), "127.0.0.1:0");

        std::fs::write(&path, "listen 127.0.0.1:0;\ntcp_keepalive on;\n").unwrap();
        reloader.reload().unwrap();

        assert!(reloader.current().lookup(None, "/").enabled);
        assert_eq!(reloader.reload_count(), 1);
        assert!(reloader.last_reload().is_some());
        // Earlier snapshot is untouched.
        assert!(!before.lookup(None, "/").enabled);
    }

    #[test]
    fn test_failed_reload_keeps_current() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keepalive.conf");
        std::fs::write(&path, "tcp_keepalive on;\n").unwrap();

        let reloader = ConfigReloader::new(ConfigReloaderConfig {
            path: path.clone(),
            watch_enabled: false,
            debounce_ms: 0,
        })
        .unwrap();

        std::fs::write(&path, "tcp_keepalive maybe;\n").unwrap();
        assert!(reloader.reload().is_err());
        assert!(reloader.current().lookup(None, "/").enabled);
        assert_eq!(reloader.reload_count(), 0);
    }
}
