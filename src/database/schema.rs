// file: src/database/schema.rs
// description: arrow schema for prescription records, row conversion and readiness polling
// reference: https://docs.rs/lancedb

use crate::error::{PipelineError, Result};
use crate::models::{DocumentFormat, PrescriptionRecord};
use crate::utils::CancellationSignal;
use arrow::array::{Array, AsArray};
use arrow::datatypes::Int64Type;
use arrow_array::builder::{ListBuilder, StringBuilder};
use arrow_array::{Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of inspecting the configured database and table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureStatus {
    pub database_uri: String,
    pub table_name: String,
    pub database_exists: bool,
    pub table_exists: bool,
}

impl StructureStatus {
    pub fn is_complete(&self) -> bool {
        self.database_exists && self.table_exists
    }
}

/// Bounded poll run once after creating a new database location.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_secs(1),
        }
    }
}

pub struct SchemaManager;

impl SchemaManager {
    pub fn records_schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("file_name", DataType::Utf8, false),
            Field::new(
                "codes",
                DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
                false,
            ),
            Field::new("primary_code", DataType::Utf8, true),
            // microseconds since the unix epoch, UTC
            Field::new("issue_date", DataType::Int64, true),
            Field::new("uploaded_at", DataType::Int64, false),
            Field::new("canonical_payload", DataType::Utf8, true),
            Field::new("raw_payload", DataType::Utf8, false),
            Field::new("content_hash", DataType::Utf8, false),
            Field::new("format", DataType::Utf8, false),
        ]))
    }

    pub fn records_to_batch(records: &[PrescriptionRecord]) -> Result<RecordBatch> {
        let ids: StringArray = records.iter().map(|r| Some(r.id.as_str())).collect();
        let file_names: StringArray = records.iter().map(|r| Some(r.file_name.as_str())).collect();

        let mut codes = ListBuilder::new(StringBuilder::new());
        for record in records {
            for code in &record.codes {
                codes.values().append_value(code);
            }
            codes.append(true);
        }

        let primary_codes: StringArray = records.iter().map(|r| r.primary_code.as_deref()).collect();
        let issue_dates: Int64Array = records
            .iter()
            .map(|r| r.issue_date.map(|d| d.timestamp_micros()))
            .collect();
        let uploaded_ats: Int64Array = records
            .iter()
            .map(|r| Some(r.uploaded_at.timestamp_micros()))
            .collect();

        let payloads = records
            .iter()
            .map(|r| {
                r.canonical_payload
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| PipelineError::Serialization(e.to_string()))?;
        let payloads: StringArray = payloads.iter().map(|p| p.as_deref()).collect();

        let raw_payloads: StringArray = records.iter().map(|r| Some(r.raw_payload.as_str())).collect();
        let hashes: StringArray = records.iter().map(|r| Some(r.content_hash.as_str())).collect();
        let formats: StringArray = records.iter().map(|r| Some(r.format.as_str())).collect();

        RecordBatch::try_new(
            Self::records_schema(),
            vec![
                Arc::new(ids),
                Arc::new(file_names),
                Arc::new(codes.finish()),
                Arc::new(primary_codes),
                Arc::new(issue_dates),
                Arc::new(uploaded_ats),
                Arc::new(payloads),
                Arc::new(raw_payloads),
                Arc::new(hashes),
                Arc::new(formats),
            ],
        )
        .map_err(|e| PipelineError::Database(format!("Failed to create record batch: {}", e)))
    }

    pub fn batch_to_records(batch: &RecordBatch) -> Result<Vec<PrescriptionRecord>> {
        let ids = string_column(batch, "id")?;
        let file_names = string_column(batch, "file_name")?;
        let primary_codes = string_column(batch, "primary_code")?;
        let payloads = string_column(batch, "canonical_payload")?;
        let raw_payloads = string_column(batch, "raw_payload")?;
        let hashes = string_column(batch, "content_hash")?;
        let formats = string_column(batch, "format")?;
        let issue_dates = int64_column(batch, "issue_date")?;
        let uploaded_ats = int64_column(batch, "uploaded_at")?;
        let codes = batch
            .column_by_name("codes")
            .and_then(|c| c.as_list_opt::<i32>())
            .ok_or_else(|| PipelineError::Database("Missing or invalid 'codes' column".to_string()))?;

        let mut records = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            let code_values = codes.value(i);
            let code_values = code_values.as_string_opt::<i32>().ok_or_else(|| {
                PipelineError::Database("Invalid 'codes' item type".to_string())
            })?;
            let row_codes = (0..code_values.len())
                .filter(|&j| !code_values.is_null(j))
                .map(|j| code_values.value(j).to_string())
                .collect();

            let canonical_payload = optional_str(payloads, i)
                .map(serde_json::from_str)
                .transpose()
                .map_err(|e| PipelineError::Serialization(format!("Stored payload is invalid: {}", e)))?;

            let issue_date = if issue_dates.is_null(i) {
                None
            } else {
                Some(micros_to_datetime(issue_dates.value(i))?)
            };

            records.push(PrescriptionRecord {
                id: ids.value(i).to_string(),
                file_name: file_names.value(i).to_string(),
                codes: row_codes,
                primary_code: optional_str(primary_codes, i).map(str::to_string),
                issue_date,
                uploaded_at: micros_to_datetime(uploaded_ats.value(i))?,
                canonical_payload,
                raw_payload: raw_payloads.value(i).to_string(),
                content_hash: hashes.value(i).to_string(),
                format: DocumentFormat::parse(formats.value(i)),
            });
        }

        Ok(records)
    }

    /// Polls `probe` until it reports ready, sleeping `policy.delay` between attempts.
    pub async fn wait_until_ready<F, Fut>(
        name: &str,
        policy: ReadinessPolicy,
        cancel: &CancellationSignal,
        mut probe: F,
    ) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let attempts = policy.attempts.max(1);

        for attempt in 1..=attempts {
            cancel.check()?;

            if probe().await {
                info!("Bucket '{}' is ready after {} attempt(s)", name, attempt);
                return Ok(());
            }

            debug!("Bucket '{}' not ready (attempt {}/{})", name, attempt, attempts);
            if attempt < attempts {
                cancel
                    .run(async {
                        tokio::time::sleep(policy.delay).await;
                        Ok(())
                    })
                    .await?;
            }
        }

        let waited = policy.delay.as_secs_f64() * f64::from(attempts);
        warn!("Gave up waiting for bucket '{}'", name);
        Err(PipelineError::Timeout(format!(
            "Bucket '{}' was not ready after waiting for {} seconds.",
            name,
            waited.round() as u64
        )))
    }
}

fn string_column<'b>(batch: &'b RecordBatch, name: &str) -> Result<&'b StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_string_opt::<i32>())
        .ok_or_else(|| PipelineError::Database(format!("Missing or invalid '{}' column", name)))
}

fn int64_column<'b>(batch: &'b RecordBatch, name: &str) -> Result<&'b Int64Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_primitive_opt::<Int64Type>())
        .ok_or_else(|| PipelineError::Database(format!("Missing or invalid '{}' column", name)))
}

fn optional_str(array: &StringArray, index: usize) -> Option<&str> {
    if array.is_null(index) {
        None
    } else {
        Some(array.value(index))
    }
}

fn micros_to_datetime(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| PipelineError::Database(format!("Timestamp out of range: {}", micros)))
}
