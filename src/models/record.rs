// file: src/models/record.rs
// description: persisted prescription record with extracted fields and payloads
// reference: internal data structures

use crate::models::document::DocumentFormat;
use crate::models::metadata::ExtractedMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionRecord {
    pub id: String,
    pub file_name: String,
    pub codes: Vec<String>,
    pub primary_code: Option<String>,
    pub issue_date: Option<DateTime<Utc>>,
    pub uploaded_at: DateTime<Utc>,
    pub canonical_payload: Option<Value>,
    pub raw_payload: String,
    pub content_hash: String,
    pub format: DocumentFormat,
}

impl PrescriptionRecord {
    /// Builds a record with a fresh id, stamped with the current instant.
    pub fn new(
        file_name: String,
        metadata: &ExtractedMetadata,
        canonical_payload: Option<Value>,
        raw_payload: String,
        format: DocumentFormat,
    ) -> Self {
        let content_hash = Self::compute_hash(&raw_payload);

        Self {
            id: Uuid::new_v4().simple().to_string(),
            file_name,
            codes: metadata.codes.clone(),
            primary_code: metadata.primary_code.clone(),
            issue_date: metadata.issue_date,
            uploaded_at: Utc::now(),
            canonical_payload,
            raw_payload,
            content_hash,
            format,
        }
    }

    pub fn compute_hash(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c == code)
    }
}
