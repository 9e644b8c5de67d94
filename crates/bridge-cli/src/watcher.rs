//! File watcher with debouncing for markdown changes.
//!
//! Uses notify-debouncer-mini: the debouncer coalesces bursts per path on
//! its own thread, so one noisy file never stalls event delivery for the
//! others.

use anyhow::Result;
use bridge_core::engine::is_markdown;
use bridge_core::exclude::is_excluded;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEvent};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Quiescence window measured from the latest event for a path.
const DEBOUNCE_WINDOW: Duration = Duration::from_secs(2);

/// Watches a directory tree and emits debounced markdown change events.
pub struct FileWatcher {
    /// Watched root
    root: PathBuf,
    /// Debouncer handle (must keep alive)
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
    /// Receiver for changed paths
    event_rx: mpsc::UnboundedReceiver<PathBuf>,
}

impl FileWatcher {
    /// Watch `root` recursively, filtering by markdown extension and the
    /// configured exclusion patterns.
    pub fn new(root: PathBuf, excluded_patterns: Vec<String>) -> Result<Self> {
        let root = root.canonicalize().unwrap_or(root);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let filter_root = root.clone();

        let mut debouncer = new_debouncer(
            DEBOUNCE_WINDOW,
            move |result: Result<Vec<DebouncedEvent>, notify::Error>| match result {
                Ok(events) => {
                    for event in events {
                        if !Self::relevant(&event.path, &filter_root, &excluded_patterns) {
                            continue;
                        }
                        debug!("file changed: {}", event.path.display());
                        if event_tx.send(event.path).is_err() {
                            // Receiver dropped
                            return;
                        }
                    }
                }
                Err(e) => {
                    error!("file watcher error: {}", e);
                }
            },
        )?;

        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)?;

        Ok(Self {
            root,
            _debouncer: debouncer,
            event_rx,
        })
    }

    /// Should an event for `path` reach the sync engine?
    fn relevant(path: &Path, root: &Path, excluded_patterns: &[String]) -> bool {
        if !path.exists() || !is_markdown(path) {
            return false;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        let relative = relative.to_string_lossy();

        // Skip hidden files and directories
        if relative.starts_with('.') || relative.contains("/.") {
            return false;
        }

        !is_excluded(&relative, excluded_patterns)
    }

    /// Receive the next changed path.
    pub async fn recv(&mut self) -> Option<PathBuf> {
        self.event_rx.recv().await
    }

    /// The watched root.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_extension_hidden_and_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join("drafts")).unwrap();
        std::fs::write(root.join("note.md"), "x").unwrap();
        std::fs::write(root.join("note.txt"), "x").unwrap();
        std::fs::write(root.join("drafts/wip.md"), "x").unwrap();
        std::fs::create_dir_all(root.join(".obsidian")).unwrap();
        std::fs::write(root.join(".obsidian/cache.md"), "x").unwrap();

        let excluded = vec!["drafts/**".to_string()];

        assert!(FileWatcher::relevant(&root.join("note.md"), &root, &excluded));
        assert!(!FileWatcher::relevant(&root.join("note.txt"), &root, &excluded));
        assert!(!FileWatcher::relevant(&root.join("drafts/wip.md"), &root, &excluded));
        assert!(!FileWatcher::relevant(&root.join(".obsidian/cache.md"), &root, &excluded));
        assert!(!FileWatcher::relevant(&root.join("deleted.md"), &root, &excluded));
    }
}
