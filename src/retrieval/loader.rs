// file: src/retrieval/loader.rs
// description: downloads bucket objects into raw documents for ingestion

use crate::error::{PipelineError, Result};
use crate::models::{ObjectFetchOutcome, RawDocument};
use crate::retrieval::options::ObjectImportOptions;
use crate::retrieval::source::{FetchError, ObjectSource, S3ObjectSource};
use crate::utils::CancellationSignal;
use tracing::{debug, error, info, warn};

/// Failure key for problems that are not tied to a single object.
pub const IMPORT_FAILURE_KEY: &str = "(S3 import)";
pub const CANCELLED_WARNING: &str =
    "Import was cancelled. Objects downloaded so far were kept.";

pub struct ObjectStoreRetriever;

impl ObjectStoreRetriever {
    /// Builds an S3 source from the options and downloads from it.
    /// Problems are reported in the outcome, never as an error.
    pub async fn load(
        options: ObjectImportOptions,
        cancel: &CancellationSignal,
    ) -> ObjectFetchOutcome {
        let options = options.normalize();

        match S3ObjectSource::from_options(&options) {
            Ok(source) => Self::load_from(&source, &options, cancel).await,
            Err(e) => {
                error!("Could not configure S3 client: {}", e);
                let mut outcome = ObjectFetchOutcome::default();
                outcome.add_failure(IMPORT_FAILURE_KEY, failure_message(e));
                outcome
            }
        }
    }

    pub async fn load_from(
        source: &dyn ObjectSource,
        options: &ObjectImportOptions,
        cancel: &CancellationSignal,
    ) -> ObjectFetchOutcome {
        let mut outcome = ObjectFetchOutcome::default();

        let result = if options.has_explicit_keys() {
            Self::load_keys(source, &options.object_keys, cancel, &mut outcome).await
        } else {
            Self::load_prefix(source, options, cancel, &mut outcome).await
        };

        match result {
            Ok(()) => {}
            Err(PipelineError::Cancelled) => {
                warn!(
                    "Import cancelled after {} object(s)",
                    outcome.files.len()
                );
                outcome.warnings.push(CANCELLED_WARNING.to_string());
            }
            Err(e) => {
                error!("S3 import failed: {}", e);
                outcome.add_failure(IMPORT_FAILURE_KEY, failure_message(e));
            }
        }

        if outcome.is_empty() {
            outcome.add_failure(IMPORT_FAILURE_KEY, "No objects were downloaded.");
        }

        info!(
            "S3 import finished: {} file(s), {} failure(s), {} warning(s)",
            outcome.files.len(),
            outcome.failures.len(),
            outcome.warnings.len()
        );
        outcome
    }

    async fn load_keys(
        source: &dyn ObjectSource,
        keys: &[String],
        cancel: &CancellationSignal,
        outcome: &mut ObjectFetchOutcome,
    ) -> Result<()> {
        for key in keys {
            cancel.check()?;
            Self::fetch_into(source, key, cancel, outcome).await?;
        }
        Ok(())
    }

    async fn load_prefix(
        source: &dyn ObjectSource,
        options: &ObjectImportOptions,
        cancel: &CancellationSignal,
        outcome: &mut ObjectFetchOutcome,
    ) -> Result<()> {
        let max_keys = options.page_size();
        let prefix = options.prefix.as_deref();
        let mut continuation: Option<String> = None;
        let mut truncated;

        loop {
            cancel.check()?;
            let page = cancel
                .run(source.list_page(prefix, continuation.as_deref(), max_keys))
                .await?;
            truncated = page.is_truncated();
            debug!("Listed page with {} key(s)", page.keys.len());

            for key in page.keys.iter().filter(|k| !k.ends_with('/')) {
                cancel.check()?;
                Self::fetch_into(source, key, cancel, outcome).await?;

                if outcome.files.len() >= max_keys {
                    break;
                }
            }

            continuation = match page.next_continuation {
                Some(token) if outcome.files.len() < max_keys => Some(token),
                _ => None,
            };
            if continuation.is_none() {
                break;
            }
        }

        if truncated && outcome.files.len() >= max_keys {
            warn!("Object limit of {} reached", max_keys);
            outcome.warnings.push(format!(
                "Reached the maximum of {} objects. Additional objects were not downloaded.",
                max_keys
            ));
        }

        if outcome.files.is_empty() && outcome.failures.is_empty() {
            let message = match prefix {
                None => "Bucket is empty.".to_string(),
                Some(p) => format!("No objects found with prefix '{}'.", p),
            };
            outcome.add_failure(IMPORT_FAILURE_KEY, message);
        }

        Ok(())
    }

    async fn fetch_into(
        source: &dyn ObjectSource,
        key: &str,
        cancel: &CancellationSignal,
        outcome: &mut ObjectFetchOutcome,
    ) -> Result<()> {
        let fetched = cancel.run(async { Ok(source.fetch(key).await) }).await?;

        match fetched {
            Ok(content) => {
                debug!("Downloaded {} ({} bytes)", key, content.len());
                outcome.files.push(RawDocument::new(file_name_for_key(key), content));
            }
            Err(FetchError::NotFound) => {
                warn!("Object {} not found", key);
                outcome.add_failure(key, FetchError::NotFound.to_string());
            }
            Err(FetchError::Other(message)) => {
                error!("Failed to download {}: {}", key, message);
                outcome.add_failure(key, message);
            }
        }
        Ok(())
    }
}

/// Last path segment of the key, or the whole key with `/` replaced when that is empty.
pub fn file_name_for_key(key: &str) -> String {
    match key.rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => key.replace('/', "_"),
    }
}

fn failure_message(error: PipelineError) -> String {
    match error {
        PipelineError::ObjectStore(message) => format!("S3 error: {}", message),
        PipelineError::Validation(message) | PipelineError::Config(message) => message,
        other => other.to_string(),
    }
}
