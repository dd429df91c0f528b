// file: src/models/mod.rs
// description: data models module exports
// reference: internal module structure

pub mod document;
pub mod metadata;
pub mod outcome;
pub mod record;
pub mod search;

pub use document::{DocumentFormat, RawDocument};
pub use metadata::ExtractedMetadata;
pub use outcome::{
    IngestionFailure, IngestionOutcome, ObjectFailure, ObjectFetchOutcome, ProcessingResult,
};
pub use record::PrescriptionRecord;
pub use search::SearchCriteria;
