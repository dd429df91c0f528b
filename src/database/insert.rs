// file: src/database/insert.rs
// description: LanceDB batch upsert of prescription records keyed by id
// reference: https://docs.rs/lancedb

use crate::database::client::LanceDbClient;
use crate::database::schema::SchemaManager;
use crate::error::{PipelineError, Result};
use crate::models::PrescriptionRecord;
use arrow_array::RecordBatchIterator;
use tracing::{debug, info};

pub struct BatchInserter<'a> {
    client: &'a LanceDbClient,
    batch_size: usize,
}

#[derive(Debug, Clone, Default)]
pub struct InsertStats {
    pub records_written: usize,
    pub batches: usize,
}

impl<'a> BatchInserter<'a> {
    pub fn new(client: &'a LanceDbClient, batch_size: usize) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
        }
    }

    /// Upserts by id in chunks of `batch_size`, creating the table on first write.
    pub async fn upsert(&self, records: &[PrescriptionRecord]) -> Result<InsertStats> {
        let mut stats = InsertStats::default();
        if records.is_empty() {
            return Ok(stats);
        }

        let table_name = self.client.table_name();
        let schema = SchemaManager::records_schema();

        for chunk in records.chunks(self.batch_size) {
            let batch = SchemaManager::records_to_batch(chunk)?;
            let reader = RecordBatchIterator::new(vec![Ok(batch)], schema.clone());

            if !self.client.table_exists(&table_name).await? {
                self.client
                    .get_connection()
                    .create_table(&table_name, reader)
                    .execute()
                    .await
                    .map_err(|e| PipelineError::Database(format!("Failed to create table: {}", e)))?;
                info!("Created new table: {}", table_name);
            } else {
                let table = self.client.get_table(&table_name).await?;
                let mut merge = table.merge_insert(&["id"]);
                merge.when_matched_update_all(None).when_not_matched_insert_all();
                merge
                    .execute(Box::new(reader))
                    .await
                    .map_err(|e| PipelineError::Database(format!("Failed to upsert records: {}", e)))?;
            }

            stats.records_written += chunk.len();
            stats.batches += 1;
            debug!("Wrote batch of {} record(s) to {}", chunk.len(), table_name);
        }

        info!(
            "Stored {} record(s) in {} batch(es)",
            stats.records_written, stats.batches
        );
        Ok(stats)
    }
}
