//! Hot reload of the gateway configuration file.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that save by writing a temp file and renaming it into place are
//! still picked up. Events for other files in that directory are ignored.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventHandler, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::parse_config;
use crate::config::schema::GatewayConfig;

/// Sends a fresh [`GatewayConfig`] whenever the watched file changes and
/// still validates.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching on notify's background thread.
    ///
    /// Updates stop when the returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let handler = ReloadHandler::new(self.path.clone(), self.update_tx);
        let mut watcher = RecommendedWatcher::new(
            handler,
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Re-reads the file on relevant events and forwards configs that changed.
struct ReloadHandler {
    path: PathBuf,
    last: Option<String>,
    tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl ReloadHandler {
    fn new(path: PathBuf, tx: mpsc::UnboundedSender<GatewayConfig>) -> Self {
        // Seeded with the current contents so the first event after startup
        // doesn't resend the config the caller already loaded.
        let last = fs::read_to_string(&path).ok();
        Self { path, last, tx }
    }

    fn is_relevant(&self, event: &Event) -> bool {
        (event.kind.is_modify() || event.kind.is_create())
            && event
                .paths
                .iter()
                .any(|p| p.file_name() == self.path.file_name())
    }

    fn reload(&mut self) {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!(path = ?self.path, error = %e, "Config file unreadable, keeping current configuration");
                return;
            }
        };

        if self.last.as_deref() == Some(contents.as_str()) {
            tracing::trace!(path = ?self.path, "Config unchanged");
            return;
        }

        match parse_config(&contents) {
            Ok(config) => {
                tracing::info!(path = ?self.path, backends = config.backends.len(), "Config reloaded");
                self.last = Some(contents);
                let _ = self.tx.send(config);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
            }
        }
    }
}

impl EventHandler for ReloadHandler {
    fn handle_event(&mut self, event: notify::Result<Event>) {
        match event {
            Ok(event) if self.is_relevant(&event) => self.reload(),
            Ok(_) => {}
            Err(e) => tracing::error!(error = ?e, "Watch error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind};
    use notify::EventKind;

    const ONE_BACKEND: &str = "[[backends]]\nname = \"users\"\naddress = \"127.0.0.1:3000\"\n";
    const TWO_BACKENDS: &str = "[[backends]]\nname = \"users\"\naddress = \"127.0.0.1:3000\"\n\
                                [[backends]]\nname = \"files\"\naddress = \"127.0.0.1:3001\"\n";

    fn modified(path: &Path) -> notify::Result<Event> {
        Ok(Event::new(EventKind::Modify(ModifyKind::Any)).add_path(path.to_path_buf()))
    }

    fn setup() -> (
        tempfile::TempDir,
        PathBuf,
        ReloadHandler,
        mpsc::UnboundedReceiver<GatewayConfig>,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        fs::write(&path, ONE_BACKEND).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = ReloadHandler::new(path.clone(), tx);
        (dir, path, handler, rx)
    }

    #[test]
    fn unchanged_file_is_not_resent() {
        let (_dir, path, mut handler, mut rx) = setup();
        handler.handle_event(modified(&path));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn changed_file_is_sent_once() {
        let (_dir, path, mut handler, mut rx) = setup();
        fs::write(&path, TWO_BACKENDS).unwrap();

        handler.handle_event(modified(&path));
        handler.handle_event(Ok(
            Event::new(EventKind::Create(CreateKind::File)).add_path(path.clone())
        ));

        assert_eq!(rx.try_recv().unwrap().backends.len(), 2);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn invalid_file_keeps_current() {
        let (_dir, path, mut handler, mut rx) = setup();
        fs::write(&path, "[[backends]]\nname = \"\"\naddress = \"x\"\n").unwrap();

        handler.handle_event(modified(&path));
        assert!(rx.try_recv().is_err());

        // a later fix is still picked up
        fs::write(&path, TWO_BACKENDS).unwrap();
        handler.handle_event(modified(&path));
        assert_eq!(rx.try_recv().unwrap().backends.len(), 2);
    }

    #[test]
    fn sibling_files_are_ignored() {
        let (dir, path, mut handler, mut rx) = setup();
        fs::write(&path, TWO_BACKENDS).unwrap();

        handler.handle_event(modified(&dir.path().join("other.toml")));
        assert!(rx.try_recv().is_err());
    }
}
