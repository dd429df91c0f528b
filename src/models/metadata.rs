// file: src/models/metadata.rs
// description: structured fields pulled out of a prescription document

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedMetadata {
    pub codes: Vec<String>,
    pub primary_code: Option<String>,
    pub issue_date: Option<DateTime<Utc>>,
    pub warnings: Vec<String>,
}

impl ExtractedMetadata {
    pub fn has_code(&self) -> bool {
        !self.codes.is_empty()
    }
}
