use amrview_core::GridConfig;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::BackendError;

/// Where grid configurations live. Implemented by [`crate::Backend`].
pub trait ConfigSource: Send + Sync + 'static {
    fn server_key(&self) -> String;
    fn fetch(&self, username: &str) -> BoxFuture<'static, Result<GridConfig, BackendError>>;
    fn save(&self, config: GridConfig, username: &str)
        -> BoxFuture<'static, Result<(), BackendError>>;
}

/// Read-through cache of grid configurations keyed by (server, username).
/// Entries are only ever replaced whole.
pub struct GridConfigStore {
    source: Arc<dyn ConfigSource>,
    entries: HashMap<(String, String), GridConfig>,
}

impl GridConfigStore {
    pub fn new(source: Arc<dyn ConfigSource>) -> Self {
        Self {
            source,
            entries: HashMap::new(),
        }
    }

    fn key(&self, username: &str) -> (String, String) {
        (self.source.server_key(), username.to_string())
    }

    pub fn cached(&self, username: &str) -> Option<&GridConfig> {
        self.entries.get(&self.key(username))
    }

    /// Cached entry, fetched on first use.
    pub async fn get(&mut self, username: &str) -> Result<&GridConfig, BackendError> {
        let key = self.key(username);
        if !self.entries.contains_key(&key) {
            let config = self.source.fetch(username).await?;
            self.entries.insert(key.clone(), config);
        }
        self.entries
            .get(&key)
            .ok_or_else(|| BackendError::Rejected {
                endpoint: "/config".to_string(),
                message: "configuration vanished from cache".to_string(),
            })
    }

    /// Drops the cached entry and fetches it again.
    pub async fn refresh(&mut self, username: &str) -> Result<&GridConfig, BackendError> {
        self.entries.remove(&self.key(username));
        self.get(username).await
    }

    /// Uploads `config` and replaces the cached entry once the server accepts it.
    pub async fn save(&mut self, mut config: GridConfig, username: &str) -> Result<(), BackendError> {
        let server = self.source.server_key();
        config.server_ip = server.clone();
        config.username = username.to_string();
        self.source.save(config.clone(), username).await?;
        tracing::info!(server = %server, username, "grid configuration saved");
        self.entries.insert((server, username.to_string()), config);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSource {
        fetches: AtomicUsize,
        supply_cells: Mutex<u32>,
        saved: Mutex<Vec<GridConfig>>,
    }

    impl ConfigSource for FakeSource {
        fn server_key(&self) -> String {
            "10.0.0.2:8000".to_string()
        }

        fn fetch(&self, username: &str) -> BoxFuture<'static, Result<GridConfig, BackendError>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let cells = *self.supply_cells.lock().unwrap();
            let config = serde_json::from_value(json!({
                "serverIP": "10.0.0.2:8000",
                "username": username,
                "supplyCells": cells,
                "theme": "dark"
            }))
            .map_err(|e| BackendError::Rejected {
                endpoint: "/config".into(),
                message: e.to_string(),
            });
            async move { config }.boxed()
        }

        fn save(
            &self,
            config: GridConfig,
            _username: &str,
        ) -> BoxFuture<'static, Result<(), BackendError>> {
            self.saved.lock().unwrap().push(config);
            async { Ok(()) }.boxed()
        }
    }

    #[tokio::test]
    async fn fetches_once_then_serves_from_cache() {
        let source = Arc::new(FakeSource::default());
        *source.supply_cells.lock().unwrap() = 6;
        let mut store = GridConfigStore::new(source.clone());

        assert_eq!(store.get("op").await.unwrap().supply_cells, Some(6));
        assert_eq!(store.get("op").await.unwrap().extra["theme"], "dark");
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        store.get("other").await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refresh_replaces_the_whole_entry() {
        let source = Arc::new(FakeSource::default());
        *source.supply_cells.lock().unwrap() = 6;
        let mut store = GridConfigStore::new(source.clone());
        store.get("op").await.unwrap();

        *source.supply_cells.lock().unwrap() = 9;
        assert_eq!(store.cached("op").unwrap().supply_cells, Some(6));
        assert_eq!(store.refresh("op").await.unwrap().supply_cells, Some(9));
    }

    #[tokio::test]
    async fn save_stamps_server_and_user_and_updates_cache() {
        let source = Arc::new(FakeSource::default());
        let mut store = GridConfigStore::new(source.clone());
        let mut config: GridConfig = serde_json::from_value(json!({
            "serverIP": "stale",
            "username": "someone-else",
            "demandCells": 4
        }))
        .unwrap();
        config.supply_cells = Some(3);

        store.save(config, "op").await.unwrap();

        let saved = source.saved.lock().unwrap();
        assert_eq!(saved[0].server_ip, "10.0.0.2:8000");
        assert_eq!(saved[0].username, "op");
        assert_eq!(store.cached("op").unwrap().demand_cells, Some(4));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }
}
