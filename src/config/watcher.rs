//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// A watcher that monitors a TOML file and publishes its parsed contents on
/// every change.
pub struct FileWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<toml::Table>,
}

impl FileWatcher {
    /// Create a new FileWatcher.
    ///
    /// Returns the watcher and a receiver for re-parsed file contents.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<toml::Table>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file in a background thread.
    ///
    /// The parent directory is watched so that editors which replace the file
    /// (write to temp + rename) are still observed. The returned watcher must
    /// be kept alive for notifications to continue.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();
        let file_name = self.path.file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let touches_file = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if !touches_file || !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    tracing::debug!(path = ?path, "Config file change detected, reloading");
                    match read_table(&path) {
                        Ok(table) => {
                            let _ = tx.send(table);
                        }
                        Err(e) => {
                            tracing::error!(
                                path = ?path,
                                error = %e,
                                "Failed to reload config file, keeping last values"
                            );
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config file watcher started");
        Ok(watcher)
    }
}

/// Read and parse a TOML file into a table.
pub fn read_table(path: &Path) -> Result<toml::Table, String> {
    let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    content.parse::<toml::Table>().map_err(|e| e.to_string())
}
