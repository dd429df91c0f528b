// file: src/database/connection.rs
// description: lazily built LanceDB handle, rebuilt when store settings change
// reference: https://docs.rs/tokio/latest/tokio/sync/struct.Mutex.html

use crate::database::client::LanceDbClient;
use crate::error::Result;
use crate::settings::StoreSettings;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info};

struct ConnectionState {
    settings: StoreSettings,
    client: LanceDbClient,
}

/// Single gate around connection setup. One caller reconnects, the rest wait and reuse.
pub struct ConnectionManager {
    state: Mutex<Option<ConnectionState>>,
    generation: AtomicU64,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub async fn ensure_ready(&self, desired: &StoreSettings) -> Result<LanceDbClient> {
        let mut state = self.state.lock().await;

        if let Some(current) = state.as_ref()
            && current.settings == *desired
        {
            debug!("Reusing LanceDB connection");
            return Ok(current.client.clone());
        }

        if state.is_some() {
            info!("Store settings changed, rebuilding LanceDB connection");
        }
        *state = None;

        let client = LanceDbClient::connect(desired).await?;
        *state = Some(ConnectionState {
            settings: desired.clone(),
            client: client.clone(),
        });
        self.generation.fetch_add(1, Ordering::SeqCst);

        Ok(client)
    }

    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        if state.take().is_some() {
            debug!("Dropped cached LanceDB connection");
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.is_some()
    }

    /// Number of connections built so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn local_settings(dir: &TempDir) -> StoreSettings {
        StoreSettings {
            connection_target: dir.path().display().to_string(),
            ..StoreSettings::default()
        }
    }

    #[tokio::test]
    async fn test_reuses_connection_for_equal_settings() {
        let dir = TempDir::new().unwrap();
        let manager = ConnectionManager::new();
        let settings = local_settings(&dir);

        manager.ensure_ready(&settings).await.unwrap();
        manager.ensure_ready(&settings.clone()).await.unwrap();
        assert_eq!(manager.generation(), 1);

        let mut changed = settings.clone();
        changed.collection_name = "other".to_string();
        manager.ensure_ready(&changed).await.unwrap();
        assert_eq!(manager.generation(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_connection() {
        let dir = TempDir::new().unwrap();
        let manager = Arc::new(ConnectionManager::new());
        let settings = local_settings(&dir);

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let manager = manager.clone();
                let settings = settings.clone();
                tokio::spawn(async move { manager.ensure_ready(&settings).await.map(|_| ()) })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(manager.generation(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_rebuild() {
        let dir = TempDir::new().unwrap();
        let manager = ConnectionManager::new();
        let settings = local_settings(&dir);

        manager.ensure_ready(&settings).await.unwrap();
        manager.invalidate().await;
        assert!(!manager.is_connected().await);

        manager.ensure_ready(&settings).await.unwrap();
        assert_eq!(manager.generation(), 2);
    }
}
