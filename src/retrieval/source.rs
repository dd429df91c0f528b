// file: src/retrieval/source.rs
// description: paged listing and fetching of bucket objects
// reference: https://docs.rs/object_store

use crate::error::{PipelineError, Result};
use crate::retrieval::options::ObjectImportOptions;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::ObjectStore;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Object not found.")]
    NotFound,

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    /// Set when more objects follow; pass it back to continue after this page.
    pub next_continuation: Option<String>,
}

impl ListPage {
    pub fn is_truncated(&self) -> bool {
        self.next_continuation.is_some()
    }
}

#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Lists up to `page_size` keys starting with `prefix`, in key order.
    async fn list_page(
        &self,
        prefix: Option<&str>,
        continuation: Option<&str>,
        page_size: usize,
    ) -> Result<ListPage>;

    async fn fetch(&self, key: &str) -> std::result::Result<Bytes, FetchError>;
}

pub struct S3ObjectSource {
    store: AmazonS3,
}

impl S3ObjectSource {
    pub fn from_options(options: &ObjectImportOptions) -> Result<Self> {
        options.validate()?;
        let settings = &options.settings;

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(settings.bucket_name.trim())
            .with_region(settings.region.trim())
            .with_virtual_hosted_style_request(!settings.force_path_style);

        if !settings.access_key_id.is_empty() {
            builder = builder
                .with_access_key_id(&settings.access_key_id)
                .with_secret_access_key(&settings.secret_access_key);
        }

        if let Some(endpoint) = &settings.endpoint_url {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.to_ascii_lowercase().starts_with("http://"));
        }

        let store = builder
            .build()
            .map_err(|e| PipelineError::ObjectStore(e.to_string()))?;

        info!(
            "Configured S3 source for bucket {} ({})",
            settings.bucket_name,
            settings.endpoint_url.as_deref().unwrap_or(&settings.region)
        );

        Ok(Self { store })
    }
}

#[async_trait]
impl ObjectSource for S3ObjectSource {
    async fn list_page(
        &self,
        prefix: Option<&str>,
        continuation: Option<&str>,
        page_size: usize,
    ) -> Result<ListPage> {
        // Object store prefixes match whole path segments; list the parent and filter by string.
        let parent = prefix
            .and_then(|p| p.rfind('/').map(|idx| &p[..idx]))
            .filter(|p| !p.is_empty())
            .map(ObjectPath::from);
        let offset = continuation.map(to_object_path);

        let mut stream = match &offset {
            Some(offset) => self.store.list_with_offset(parent.as_ref(), offset),
            None => self.store.list(parent.as_ref()),
        };

        let mut keys = Vec::new();
        let mut has_more = false;
        while let Some(meta) = stream.next().await {
            let meta = meta.map_err(|e| PipelineError::ObjectStore(e.to_string()))?;
            let key = meta.location.to_string();

            if let Some(prefix) = prefix
                && !key.starts_with(prefix)
            {
                continue;
            }

            if keys.len() == page_size {
                has_more = true;
                break;
            }
            keys.push(key);
        }

        debug!("Listed {} key(s), more pending: {}", keys.len(), has_more);
        let next_continuation = if has_more { keys.last().cloned() } else { None };
        Ok(ListPage {
            keys,
            next_continuation,
        })
    }

    async fn fetch(&self, key: &str) -> std::result::Result<Bytes, FetchError> {
        match self.store.get(&to_object_path(key)).await {
            Ok(result) => result
                .bytes()
                .await
                .map_err(|e| FetchError::Other(e.to_string())),
            Err(object_store::Error::NotFound { .. }) => Err(FetchError::NotFound),
            Err(e) => Err(FetchError::Other(e.to_string())),
        }
    }
}

// Listed keys are already in store encoding; user-supplied ones may need escaping.
fn to_object_path(key: &str) -> ObjectPath {
    ObjectPath::parse(key).unwrap_or_else(|_| ObjectPath::from(key))
}

#[cfg(test)]
pub mod memory {
    use super::*;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Bucket stand-in with S3-like string prefixes and paging.
    #[derive(Default)]
    pub struct MemoryObjectSource {
        objects: BTreeMap<String, Bytes>,
        broken: HashMap<String, String>,
        pub list_calls: AtomicUsize,
    }

    impl MemoryObjectSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_object(mut self, key: &str, content: &str) -> Self {
            self.objects
                .insert(key.to_string(), Bytes::from(content.to_string()));
            self
        }

        /// Listed like any object, but fetching it fails with `message`.
        pub fn with_broken_object(mut self, key: &str, message: &str) -> Self {
            self.objects.insert(key.to_string(), Bytes::new());
            self.broken.insert(key.to_string(), message.to_string());
            self
        }
    }

    #[async_trait]
    impl ObjectSource for MemoryObjectSource {
        async fn list_page(
            &self,
            prefix: Option<&str>,
            continuation: Option<&str>,
            page_size: usize,
        ) -> Result<ListPage> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);

            let mut matching = self
                .objects
                .keys()
                .filter(|k| prefix.is_none_or(|p| k.starts_with(p)))
                .filter(|k| continuation.is_none_or(|c| k.as_str() > c))
                .cloned();

            let keys: Vec<String> = matching.by_ref().take(page_size).collect();
            let next_continuation = if matching.next().is_some() {
                keys.last().cloned()
            } else {
                None
            };

            Ok(ListPage {
                keys,
                next_continuation,
            })
        }

        async fn fetch(&self, key: &str) -> std::result::Result<Bytes, FetchError> {
            if let Some(message) = self.broken.get(key) {
                return Err(FetchError::Other(message.clone()));
            }
            self.objects.get(key).cloned().ok_or(FetchError::NotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryObjectSource;
    use super::*;
    use crate::settings::ObjectStoreSettings;

    #[test]
    fn test_fetch_error_messages() {
        assert_eq!(FetchError::NotFound.to_string(), "Object not found.");
        assert_eq!(FetchError::Other("denied".into()).to_string(), "denied");
    }

    #[test]
    fn test_s3_source_builds_for_custom_endpoint() {
        let options = ObjectImportOptions::from_settings(ObjectStoreSettings {
            access_key_id: "minio".to_string(),
            secret_access_key: "minio123".to_string(),
            bucket_name: "incoming".to_string(),
            endpoint_url: Some("http://localhost:9000".to_string()),
            ..ObjectStoreSettings::default()
        });
        assert!(S3ObjectSource::from_options(&options).is_ok());
    }

    #[test]
    fn test_s3_source_rejects_invalid_options() {
        let options = ObjectImportOptions::from_settings(ObjectStoreSettings::default());
        assert!(S3ObjectSource::from_options(&options).is_err());
    }

    #[tokio::test]
    async fn test_memory_source_paging() {
        let source = MemoryObjectSource::new()
            .with_object("rx/a.xml", "a")
            .with_object("rx/b.xml", "b")
            .with_object("rx/c.xml", "c")
            .with_object("other.xml", "o");

        let first = source.list_page(Some("rx/"), None, 2).await.unwrap();
        assert_eq!(first.keys, vec!["rx/a.xml", "rx/b.xml"]);
        assert!(first.is_truncated());

        let second = source
            .list_page(Some("rx/"), first.next_continuation.as_deref(), 2)
            .await
            .unwrap();
        assert_eq!(second.keys, vec!["rx/c.xml"]);
        assert!(!second.is_truncated());
    }
}
