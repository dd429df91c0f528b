// file: src/settings/provider.rs
// description: settings providers backed by memory or a json file
// reference: https://docs.rs/tokio/latest/tokio/fs

use crate::error::{PipelineError, Result};
use crate::settings::model::Settings;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Source of the connection and bucket settings used by the store and importer.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn get(&self) -> Result<Settings>;

    async fn save(&self, settings: Settings) -> Result<()>;
}

pub struct InMemorySettingsProvider {
    current: RwLock<Settings>,
}

impl InMemorySettingsProvider {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: RwLock::new(settings),
        }
    }
}

#[async_trait]
impl SettingsProvider for InMemorySettingsProvider {
    async fn get(&self) -> Result<Settings> {
        Ok(self.current.read().await.clone())
    }

    async fn save(&self, settings: Settings) -> Result<()> {
        *self.current.write().await = settings;
        Ok(())
    }
}

/// Stores settings as pretty-printed JSON. A missing file yields the defaults.
pub struct FileSettingsProvider {
    path: PathBuf,
    defaults: Settings,
    gate: RwLock<()>,
}

impl FileSettingsProvider {
    pub fn new(path: impl Into<PathBuf>, defaults: Settings) -> Self {
        Self {
            path: path.into(),
            defaults,
            gate: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsProvider for FileSettingsProvider {
    async fn get(&self) -> Result<Settings> {
        let _guard = self.gate.read().await;

        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            debug!("No settings file at {:?}, using defaults", self.path);
            return Ok(self.defaults.clone());
        }

        let contents = fs::read_to_string(&self.path)
            .await
            .map_err(|source| PipelineError::FileOperation {
                path: self.path.clone(),
                source,
            })?;

        serde_json::from_str(&contents).map_err(|e| {
            PipelineError::Settings(format!(
                "Failed to parse settings file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    async fn save(&self, settings: Settings) -> Result<()> {
        let _guard = self.gate.write().await;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                PipelineError::Settings(format!("Failed to create settings directory: {}", e))
            })?;
        }

        let contents = serde_json::to_string_pretty(&settings)
            .map_err(|e| PipelineError::Serialization(e.to_string()))?;

        fs::write(&self.path, contents)
            .await
            .map_err(|source| PipelineError::FileOperation {
                path: self.path.clone(),
                source,
            })?;

        info!("Saved settings to {}", self.path.display());
        Ok(())
    }
}
