// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod config;
pub mod database;
pub mod error;
pub mod extractor;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod retrieval;
pub mod settings;
pub mod uploads;
pub mod utils;

pub use config::{Config, ObjectStoreConfig, PipelineConfig, StoreConfig};
pub use database::{
    BatchInserter, ConnectionManager, InsertStats, LanceDbClient, LanceRecordStore,
    MemoryRecordStore, ReadinessPolicy, RecordSink, SchemaManager, StructureStatus,
};
pub use error::{PipelineError, Result};
pub use extractor::{MetadataExtractor, PZN_SYSTEM, parse_timestamp};
pub use models::{
    DocumentFormat, ExtractedMetadata, IngestionFailure, IngestionOutcome, ObjectFailure,
    ObjectFetchOutcome, PrescriptionRecord, ProcessingResult, RawDocument, SearchCriteria,
};
pub use parser::{ConversionChain, XmlElement, XmlParser};
pub use pipeline::{DocumentProcessor, IngestionOrchestrator, PipelineStats, ProgressTracker};
pub use retrieval::{ObjectImportOptions, ObjectSource, ObjectStoreRetriever, S3ObjectSource};
pub use settings::{
    FileSettingsProvider, InMemorySettingsProvider, ObjectStoreSettings, Settings,
    SettingsProvider, StoreSettings,
};
pub use uploads::{FileScanner, ScanOutcome};
pub use utils::{
    CancellationHandle, CancellationSignal, HealthCheck, HealthReport, HealthStatus,
    OperationTimer, PerformanceMetrics, Validator,
};
