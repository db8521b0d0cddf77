//! File watcher for a configuration directory.
//!
//! Watches the YAML sources (`*.yaml`, `*.yml`) of one config directory and
//! emits change events through a tokio watch channel. Rapid changes are
//! debounced into a single event.

use super::handle::Config;
use notify_debouncer_mini::{DebouncedEvent, DebouncedEventKind, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// How often the blocking loop checks whether the handle was dropped.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Event types emitted when configuration files change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChangeEvent {
    /// One or more source files changed
    Changed(Vec<PathBuf>),
    /// Watcher encountered an error
    Error(String),
}

impl ConfigChangeEvent {
    /// Returns true if this event requires a config reload.
    pub fn requires_reload(&self) -> bool {
        matches!(self, ConfigChangeEvent::Changed(_))
    }

    /// Get the affected paths for this event.
    pub fn affected_paths(&self) -> Vec<&Path> {
        match self {
            ConfigChangeEvent::Changed(paths) => paths.iter().map(|p| p.as_path()).collect(),
            ConfigChangeEvent::Error(_) => vec![],
        }
    }
}

/// Configuration for the file watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce duration for coalescing rapid changes.
    pub debounce_duration: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(500),
        }
    }
}

/// Handle to control the config watcher.
pub struct ConfigWatcherHandle {
    /// Receiver for config change events.
    pub events: watch::Receiver<Option<ConfigChangeEvent>>,
    /// Handle to the watcher task. Dropping `events` stops the watcher.
    _task_handle: tokio::task::JoinHandle<()>,
}

impl ConfigWatcherHandle {
    /// Wait for the next config change event. `None` once the watcher stops.
    pub async fn wait_for_change(&mut self) -> Option<ConfigChangeEvent> {
        loop {
            if self.events.changed().await.is_err() {
                return None;
            }
            let event = self.events.borrow_and_update().clone();
            if event.is_some() {
                return event;
            }
        }
    }

    /// Get the latest event without waiting.
    pub fn latest_event(&self) -> Option<ConfigChangeEvent> {
        self.events.borrow().clone()
    }
}

/// Start watching `config_dir`. Must be called inside a tokio runtime.
///
/// # Example
/// ```ignore
/// let handle = start_config_watcher(Path::new("./config"), WatcherConfig::default())?;
/// let reloader = spawn_reloader(Arc::clone(&config), handle);
/// ```
pub fn start_config_watcher(
    config_dir: &Path,
    config: WatcherConfig,
) -> Result<ConfigWatcherHandle, notify::Error> {
    if !config_dir.is_dir() {
        return Err(notify::Error::path_not_found().add_path(config_dir.to_path_buf()));
    }

    let (event_tx, event_rx) = watch::channel(None);
    let (notify_tx, notify_rx) = mpsc::channel();

    let mut debouncer = new_debouncer(config.debounce_duration, notify_tx)?;
    debouncer
        .watcher()
        .watch(config_dir, notify::RecursiveMode::NonRecursive)?;
    info!("Watching config directory: {}", config_dir.display());

    let task_handle = tokio::task::spawn_blocking(move || {
        // Keep the debouncer alive
        let _debouncer = debouncer;
        process_notify_events(notify_rx, event_tx);
    });

    Ok(ConfigWatcherHandle {
        events: event_rx,
        _task_handle: task_handle,
    })
}

/// Reload `config` on every change reported by `watcher`. Reload failures
/// are logged and the previous tree stays active.
pub fn spawn_reloader(
    config: Arc<Config>,
    mut watcher: ConfigWatcherHandle,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = watcher.wait_for_change().await {
            if !event.requires_reload() {
                warn!("Config watcher reported: {:?}", event);
                continue;
            }
            match config.reload() {
                Ok(()) => debug!("Config reloaded after change to {:?}", event.affected_paths()),
                Err(e) => error!("Config reload failed, keeping previous values: {}", e),
            }
        }
    })
}

/// Process events from the notify debouncer and convert to ConfigChangeEvents.
fn process_notify_events(
    rx: mpsc::Receiver<Result<Vec<DebouncedEvent>, notify::Error>>,
    tx: watch::Sender<Option<ConfigChangeEvent>>,
) {
    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(events)) => {
                if let Some(event) = classify_events(events) {
                    debug!("Config change detected: {:?}", event);
                    if tx.send(Some(event)).is_err() {
                        info!("Config watcher receiver dropped, stopping");
                        return;
                    }
                }
            }
            Ok(Err(e)) => {
                error!("File watcher error: {}", e);
                let _ = tx.send(Some(ConfigChangeEvent::Error(e.to_string())));
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if tx.is_closed() {
                    debug!("Config watcher receiver dropped, stopping");
                    return;
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                info!("Config watcher channel closed, stopping");
                return;
            }
        }
    }
}

/// Collapse a debounced batch into one event, keeping only source files.
fn classify_events(events: Vec<DebouncedEvent>) -> Option<ConfigChangeEvent> {
    let mut changed: Vec<PathBuf> = events
        .into_iter()
        .filter(|event| {
            matches!(
                event.kind,
                DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
            )
        })
        .map(|event| event.path)
        .filter(|path| is_source_file(path))
        .collect();

    if changed.is_empty() {
        return None;
    }
    changed.sort();
    changed.dedup();
    Some(ConfigChangeEvent::Changed(changed))
}

fn is_source_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}
