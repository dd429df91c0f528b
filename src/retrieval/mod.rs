// file: src/retrieval/mod.rs
// description: object storage retrieval module exports

pub mod loader;
pub mod options;
pub mod source;

pub use loader::{CANCELLED_WARNING, IMPORT_FAILURE_KEY, ObjectStoreRetriever, file_name_for_key};
pub use options::{ObjectImportOptions, clamp_max_keys};
pub use source::{FetchError, ListPage, ObjectSource, S3ObjectSource};
