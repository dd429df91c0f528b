// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{PipelineError, Result};
use crate::settings::{ObjectStoreSettings, Settings, StoreSettings};
use crate::utils::Validator;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub store: StoreConfig,
    pub object_store: ObjectStoreConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    pub uri: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub bucket: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    pub collection: String,
    pub batch_size: usize,
    #[serde(default = "default_readiness_attempts")]
    pub readiness_attempts: u32,
    #[serde(default = "default_readiness_delay_ms")]
    pub readiness_delay_ms: u64,
    /// When set, connection settings are read from and saved to this JSON file.
    #[serde(default)]
    pub settings_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectStoreConfig {
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_force_path_style")]
    pub force_path_style: bool,
    #[serde(default)]
    pub default_prefix: Option<String>,
    #[serde(default = "default_max_keys")]
    pub max_keys: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub parallel_workers: usize,
    pub max_file_size_mb: usize,
    #[serde(default)]
    pub skip_patterns: Vec<String>,
}

fn default_scope() -> String {
    "_default".to_string()
}

fn default_readiness_attempts() -> u32 {
    10
}

fn default_readiness_delay_ms() -> u64 {
    1000
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_force_path_style() -> bool {
    true
}

fn default_max_keys() -> i64 {
    25
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(config::File::from(Path::new("config/default.toml")));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("FHIR_INGEST")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            store: StoreConfig {
                uri: "data/lancedb".to_string(),
                username: None,
                password: None,
                bucket: "fhir-prescriptions".to_string(),
                scope: default_scope(),
                collection: "prescriptions".to_string(),
                batch_size: 100,
                readiness_attempts: default_readiness_attempts(),
                readiness_delay_ms: default_readiness_delay_ms(),
                settings_path: None,
            },
            object_store: ObjectStoreConfig {
                access_key_id: String::new(),
                secret_access_key: String::new(),
                region: default_region(),
                bucket: String::new(),
                endpoint: None,
                force_path_style: default_force_path_style(),
                default_prefix: None,
                max_keys: default_max_keys(),
            },
            pipeline: PipelineConfig {
                parallel_workers: 4,
                max_file_size_mb: 10,
                skip_patterns: vec![".git/*".to_string()],
            },
        }
    }

    /// Connection settings seeded from this configuration.
    pub fn settings(&self) -> Settings {
        Settings {
            store: StoreSettings {
                connection_target: self.store.uri.clone(),
                username: self.store.username.clone().unwrap_or_default(),
                password: self.store.password.clone().unwrap_or_default(),
                bucket_name: self.store.bucket.clone(),
                scope_name: self.store.scope.clone(),
                collection_name: self.store.collection.clone(),
            },
            object_store: ObjectStoreSettings {
                access_key_id: self.object_store.access_key_id.clone(),
                secret_access_key: self.object_store.secret_access_key.clone(),
                region: self.object_store.region.clone(),
                bucket_name: self.object_store.bucket.clone(),
                endpoint_url: self.object_store.endpoint.clone(),
                force_path_style: self.object_store.force_path_style,
                default_prefix: self.object_store.default_prefix.clone(),
            },
        }
    }

    fn validate(&self) -> Result<()> {
        if self.pipeline.parallel_workers == 0 {
            return Err(PipelineError::Config(
                "parallel_workers must be greater than 0".to_string(),
            ));
        }

        Validator::validate_batch_size(self.store.batch_size)
            .map_err(|e| PipelineError::Config(format!("store.batch_size: {}", e)))?;

        if self.store.readiness_attempts == 0 {
            return Err(PipelineError::Config(
                "readiness_attempts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
