// file: src/models/outcome.rs
// description: per-file and per-batch results for processing, ingestion and object import

use crate::models::document::RawDocument;
use crate::models::record::PrescriptionRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub enum ProcessingResult {
    Succeeded {
        record: PrescriptionRecord,
        warnings: Vec<String>,
    },
    Failed {
        error_message: String,
    },
}

impl ProcessingResult {
    pub fn failed(message: impl Into<String>) -> Self {
        ProcessingResult::Failed {
            error_message: message.into(),
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, ProcessingResult::Succeeded { .. })
    }

    pub fn record(&self) -> Option<&PrescriptionRecord> {
        match self {
            ProcessingResult::Succeeded { record, .. } => Some(record),
            ProcessingResult::Failed { .. } => None,
        }
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            ProcessingResult::Succeeded { warnings, .. } => warnings,
            ProcessingResult::Failed { .. } => &[],
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ProcessingResult::Failed { error_message } => Some(error_message),
            ProcessingResult::Succeeded { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionFailure {
    pub file_name: String,
    pub error_message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionOutcome {
    pub stored_records: Vec<PrescriptionRecord>,
    pub failures: Vec<IngestionFailure>,
    pub warnings: Vec<String>,
    /// Set when the batch stopped early; completed records are still stored.
    pub cancelled: bool,
}

impl IngestionOutcome {
    pub fn add_failure(&mut self, file_name: &str, message: impl Into<String>) {
        self.failures.push(IngestionFailure {
            file_name: file_name.to_string(),
            error_message: message.into(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.warnings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectFailure {
    pub object_key: String,
    pub error_message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectFetchOutcome {
    pub files: Vec<RawDocument>,
    pub failures: Vec<ObjectFailure>,
    pub warnings: Vec<String>,
}

impl ObjectFetchOutcome {
    pub fn add_failure(&mut self, object_key: &str, message: impl Into<String>) {
        self.failures.push(ObjectFailure {
            object_key: object_key.to_string(),
            error_message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.failures.is_empty()
    }
}
