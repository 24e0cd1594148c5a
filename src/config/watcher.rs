//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GatewayConfig;

/// Watches the gateway configuration file and emits every valid revision.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    tracing::info!(path = ?path, "Config file change detected, reloading");
                    match load_config(&path) {
                        Ok(new_config) => {
                            if tx.send(new_config).is_err() {
                                tracing::debug!("Config update receiver dropped");
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Rejected config reload, keeping current rule table");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(host: &str) -> String {
        format!(
            r#"
            [[routes]]
            hosts = ["{host}"]
            backend = "127.0.0.1:9"
            "#
        )
    }

    fn serves(config: &GatewayConfig, host: &str) -> bool {
        config.routes.iter().any(|r| r.hosts.iter().any(|h| h == host))
    }

    /// Receive updates until one serves `host`, or give up after `within`.
    async fn wait_for(
        rx: &mut mpsc::UnboundedReceiver<GatewayConfig>,
        host: &str,
        within: Duration,
    ) -> Vec<GatewayConfig> {
        let mut seen = Vec::new();
        let _ = tokio::time::timeout(within, async {
            while let Some(config) = rx.recv().await {
                let done = serves(&config, host);
                seen.push(config);
                if done {
                    break;
                }
            }
        })
        .await;
        seen
    }

    #[tokio::test]
    async fn test_reloads_valid_edits_and_skips_invalid_ones() {
        let path = std::env::temp_dir().join(format!("gateway-watch-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, route("old.example.org")).unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(&path);
        let _handle = watcher.run().unwrap();

        std::fs::write(&path, route("new.example.org")).unwrap();
        let seen = wait_for(&mut rx, "new.example.org", Duration::from_secs(10)).await;
        assert!(
            seen.last().is_some_and(|c| serves(c, "new.example.org")),
            "edit was never picked up"
        );

        // Parses as TOML but fails validation.
        std::fs::write(
            &path,
            r#"
            [[routes]]
            hosts = ["bad.example.org"]
            backend = "no port here"
            "#,
        )
        .unwrap();
        std::fs::write(&path, route("fixed.example.org")).unwrap();

        let seen = wait_for(&mut rx, "fixed.example.org", Duration::from_secs(10)).await;
        assert!(seen.last().is_some_and(|c| serves(c, "fixed.example.org")));
        assert!(seen.iter().all(|c| !serves(c, "bad.example.org")));

        let _ = std::fs::remove_file(&path);
    }
}
