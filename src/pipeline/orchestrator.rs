// file: src/pipeline/orchestrator.rs
// description: runs a batch of documents through the processor and persists the records
// reference: orchestrates asynchronous ingestion workflow

use crate::config::PipelineConfig;
use crate::database::RecordSink;
use crate::error::Result;
use crate::models::{IngestionOutcome, ProcessingResult, RawDocument};
use crate::pipeline::processor::DocumentProcessor;
use crate::pipeline::progress::{PipelineStats, ProgressTracker};
use crate::utils::{CancellationSignal, OperationTimer};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const NOT_STARTED_MESSAGE: &str = "Ingestion was cancelled before this file was processed.";

enum FileOutcome {
    Processed(ProcessingResult),
    NotStarted,
    Panicked(String),
}

pub struct IngestionOrchestrator {
    processor: Arc<DocumentProcessor>,
    sink: Arc<dyn RecordSink>,
    parallel_workers: usize,
    show_progress: bool,
}

impl IngestionOrchestrator {
    pub fn new(processor: DocumentProcessor, sink: Arc<dyn RecordSink>, config: &PipelineConfig) -> Self {
        Self {
            processor: Arc::new(processor),
            sink,
            parallel_workers: config.parallel_workers.max(1),
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Processes every document, then stores all successful records in one batch.
    ///
    /// Per-file problems land in the outcome. Only a failed store call is an `Err`.
    pub async fn ingest(
        &self,
        batch: Vec<RawDocument>,
        cancel: &CancellationSignal,
    ) -> Result<IngestionOutcome> {
        let mut outcome = IngestionOutcome::default();
        if batch.is_empty() {
            warn!("No documents to ingest");
            return Ok(outcome);
        }

        let timer = OperationTimer::new("ingestion batch");
        let progress = ProgressTracker::new(batch.len(), self.show_progress);
        info!(
            "Processing {} document(s) with {} worker(s)",
            batch.len(),
            self.parallel_workers
        );

        let results = self.process_all(batch, cancel, &progress).await;

        let mut staged = Vec::new();
        for (file_name, result) in results {
            match result {
                FileOutcome::Processed(ProcessingResult::Succeeded { record, warnings }) => {
                    outcome
                        .warnings
                        .extend(warnings.iter().map(|w| format!("{}: {}", file_name, w)));
                    staged.push(record);
                }
                FileOutcome::Processed(ProcessingResult::Failed { error_message }) => {
                    outcome.add_failure(&file_name, error_message);
                }
                FileOutcome::NotStarted => {
                    outcome.cancelled = true;
                    outcome.add_failure(&file_name, NOT_STARTED_MESSAGE);
                }
                FileOutcome::Panicked(message) => {
                    outcome.add_failure(&file_name, format!("Processing task failed: {}", message));
                }
            }
        }

        if !staged.is_empty() {
            progress.set_message(format!("Storing {} record(s)", staged.len()));
            self.sink.store_batch(&staged).await?;
            outcome.stored_records = staged;
        }

        progress.finish();
        log_summary(&progress.get_stats(), &outcome);
        timer.finish_with_count(outcome.stored_records.len());

        Ok(outcome)
    }

    async fn process_all(
        &self,
        batch: Vec<RawDocument>,
        cancel: &CancellationSignal,
        progress: &ProgressTracker,
    ) -> Vec<(String, FileOutcome)> {
        let tasks = batch.into_iter().map(|document| {
            let processor = self.processor.clone();

            async move {
                let file_name = document.file_name.clone();
                if cancel.is_cancelled() {
                    progress.inc_files_failed();
                    return (file_name, FileOutcome::NotStarted);
                }

                let bytes = document.len() as u64;
                // The document moves into the task and is dropped when it ends.
                let joined =
                    tokio::task::spawn_blocking(move || processor.process_document(&document))
                        .await;

                let result = match joined {
                    Ok(result) => {
                        if result.succeeded() {
                            progress.inc_files_processed(bytes, result.warnings().len());
                        } else {
                            progress.inc_files_failed();
                        }
                        FileOutcome::Processed(result)
                    }
                    Err(e) => {
                        error!("Processing task for {} panicked: {}", file_name, e);
                        progress.inc_files_failed();
                        FileOutcome::Panicked(e.to_string())
                    }
                };
                (file_name, result)
            }
        });

        // `buffered` keeps results in input order.
        stream::iter(tasks)
            .buffered(self.parallel_workers)
            .collect()
            .await
    }
}

fn log_summary(stats: &PipelineStats, outcome: &IngestionOutcome) {
    info!("=== Ingestion Summary ===");
    info!("Files processed: {}", stats.files_processed);
    info!("Files failed: {}", outcome.failures.len());
    info!("Success rate: {:.2}%", stats.success_rate());
    info!("Records stored: {}", outcome.stored_records.len());
    info!("Warnings: {}", outcome.warnings.len());
    info!("Processing speed: {:.2} files/sec", stats.files_per_second());
    if outcome.cancelled {
        warn!("Batch was cancelled before all files were processed");
    }
    info!("=========================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::database::MemoryRecordStore;
    use crate::error::PipelineError;
    use crate::models::{PrescriptionRecord, SearchCriteria};
    use crate::utils::{CancellationHandle, HealthReport};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    const JSON_RX: &str = r#"{"resourceType":"Bundle","entry":[{"resource":{
        "resourceType":"MedicationRequest","authoredOn":"2023-05-01",
        "medicationCodeableConcept":{"coding":[
            {"system":"http://fhir.de/CodeSystem/ifa/pzn","code":"12345678"}]}}}]}"#;

    const NO_CODE_RX: &str = r#"{"resourceType":"Bundle","timestamp":"2024-02-03T08:00:00Z"}"#;

    fn orchestrator(sink: Arc<dyn RecordSink>) -> IngestionOrchestrator {
        let config = Config::default_config();
        IngestionOrchestrator::new(DocumentProcessor::new(&config.pipeline), sink, &config.pipeline)
    }

    struct FailingSink;

    #[async_trait]
    impl RecordSink for FailingSink {
        async fn store_batch(&self, _records: &[PrescriptionRecord]) -> Result<()> {
            Err(PipelineError::Database("connection refused".to_string()))
        }

        async fn search(&self, _criteria: &SearchCriteria) -> Result<Vec<PrescriptionRecord>> {
            Ok(Vec::new())
        }

        async fn test_connection(&self) -> HealthReport {
            HealthReport::new(Vec::new(), "test".to_string())
        }
    }

    #[tokio::test]
    async fn test_json_document_is_stored_without_warnings() {
        let sink = Arc::new(MemoryRecordStore::new());
        let outcome = orchestrator(sink.clone())
            .ingest(
                vec![RawDocument::new("rx.json", JSON_RX)],
                &CancellationSignal::never(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.stored_records.len(), 1);
        assert!(outcome.is_clean());
        let stored = sink.records().await;
        assert_eq!(stored[0].codes, vec!["12345678".to_string()]);
        assert_eq!(stored[0].primary_code.as_deref(), Some("12345678"));
    }

    #[tokio::test]
    async fn test_malformed_file_does_not_abort_batch() {
        let sink = Arc::new(MemoryRecordStore::new());
        let batch = vec![
            RawDocument::new("one.json", JSON_RX),
            RawDocument::new("two.xml", "<Bundle><entry></Bundle>"),
            RawDocument::new("three.json", JSON_RX),
        ];

        let outcome = orchestrator(sink.clone())
            .ingest(batch, &CancellationSignal::never())
            .await
            .unwrap();

        assert_eq!(outcome.stored_records.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].file_name, "two.xml");
        assert_eq!(outcome.stored_records[0].file_name, "one.json");
        assert_eq!(outcome.stored_records[1].file_name, "three.json");
        assert_eq!(sink.len().await, 2);
    }

    #[tokio::test]
    async fn test_warnings_are_prefixed_with_file_name() {
        let sink = Arc::new(MemoryRecordStore::new());
        let outcome = orchestrator(sink)
            .ingest(
                vec![RawDocument::new("nocode.json", NO_CODE_RX)],
                &CancellationSignal::never(),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome.warnings,
            vec!["nocode.json: No PZN code was found in the document.".to_string()]
        );
        assert_eq!(outcome.stored_records.len(), 1);
    }

    #[tokio::test]
    async fn test_failures_only_skip_the_sink() {
        let outcome = orchestrator(Arc::new(FailingSink))
            .ingest(
                vec![RawDocument::new("bad.json", "{")],
                &CancellationSignal::never(),
            )
            .await
            .unwrap();

        assert!(outcome.stored_records.is_empty());
        assert_eq!(outcome.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_sink_errors_propagate() {
        let result = orchestrator(Arc::new(FailingSink))
            .ingest(
                vec![RawDocument::new("rx.json", JSON_RX)],
                &CancellationSignal::never(),
            )
            .await;

        assert!(matches!(result, Err(PipelineError::Database(_))));
    }

    #[tokio::test]
    async fn test_cancelled_batch_reports_unstarted_files() {
        let handle = CancellationHandle::new();
        handle.cancel();
        let sink = Arc::new(MemoryRecordStore::new());

        let outcome = orchestrator(sink.clone())
            .ingest(
                vec![
                    RawDocument::new("a.json", JSON_RX),
                    RawDocument::new("b.json", JSON_RX),
                ],
                &handle.signal(),
            )
            .await
            .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.failures.len(), 2);
        assert_eq!(outcome.failures[0].error_message, NOT_STARTED_MESSAGE);
        assert!(sink.is_empty().await);
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_no_op() {
        let outcome = orchestrator(Arc::new(FailingSink))
            .ingest(Vec::new(), &CancellationSignal::never())
            .await
            .unwrap();

        assert!(outcome.is_clean());
        assert!(!outcome.cancelled);
    }
}
