// file: src/retrieval/options.rs
// description: bucket import options with normalization and validation

use crate::error::{PipelineError, Result};
use crate::settings::ObjectStoreSettings;
use crate::utils::Validator;

pub const DEFAULT_MAX_KEYS: i64 = 25;
pub const MAX_KEYS_LIMIT: i64 = 500;
const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectImportOptions {
    pub settings: ObjectStoreSettings,
    /// When non-empty, exactly these keys are fetched and the prefix is ignored.
    pub object_keys: Vec<String>,
    pub prefix: Option<String>,
    pub max_keys: i64,
}

impl ObjectImportOptions {
    pub fn from_settings(settings: ObjectStoreSettings) -> Self {
        let prefix = settings.default_prefix.clone();
        Self {
            settings,
            object_keys: Vec::new(),
            prefix,
            max_keys: DEFAULT_MAX_KEYS,
        }
    }

    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.object_keys = keys;
        self
    }

    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn with_max_keys(mut self, max_keys: i64) -> Self {
        self.max_keys = max_keys;
        self
    }

    pub fn normalize(mut self) -> Self {
        self.prefix = self
            .prefix
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        self.object_keys = self
            .object_keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        self.max_keys = clamp_max_keys(self.max_keys);

        if self.settings.region.trim().is_empty() {
            self.settings.region = DEFAULT_REGION.to_string();
        }

        self.settings.endpoint_url = self
            .settings
            .endpoint_url
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());

        self
    }

    pub fn has_explicit_keys(&self) -> bool {
        !self.object_keys.is_empty()
    }

    pub fn page_size(&self) -> usize {
        clamp_max_keys(self.max_keys) as usize
    }

    pub fn validate(&self) -> Result<()> {
        if self.settings.bucket_name.trim().is_empty() {
            return Err(PipelineError::Validation(
                "Bucket name is required.".to_string(),
            ));
        }

        if let Some(endpoint) = &self.settings.endpoint_url {
            Validator::validate_url(endpoint).map_err(|_| {
                PipelineError::Validation(format!(
                    "Endpoint URL '{}' is not a valid absolute URI.",
                    endpoint
                ))
            })?;
        }

        Ok(())
    }
}

/// Non-positive values fall back to the default; the rest are capped.
pub fn clamp_max_keys(value: i64) -> i64 {
    if value <= 0 {
        DEFAULT_MAX_KEYS
    } else {
        value.min(MAX_KEYS_LIMIT)
    }
}
