// file: src/database/client.rs
// description: LanceDB client wrapper bound to one set of store settings
// reference: https://docs.rs/lancedb

use crate::database::schema::SchemaManager;
use crate::error::{PipelineError, Result};
use crate::models::{PrescriptionRecord, SearchCriteria};
use crate::settings::StoreSettings;
use futures::StreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, Table, connect};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct LanceDbClient {
    connection: Connection,
    settings: StoreSettings,
}

impl LanceDbClient {
    pub async fn connect(settings: &StoreSettings) -> Result<Self> {
        let uri = settings.database_uri();
        info!("Connecting to LanceDB at {}", uri);

        let mut builder = connect(&uri);
        if !settings.is_local_target() && settings.has_credentials() {
            builder = builder
                .storage_option("aws_access_key_id", &settings.username)
                .storage_option("aws_secret_access_key", &settings.password);
        }

        let connection = builder
            .execute()
            .await
            .map_err(|e| PipelineError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            settings: settings.clone(),
        })
    }

    pub fn get_connection(&self) -> &Connection {
        &self.connection
    }

    pub fn table_name(&self) -> String {
        self.settings.table_name()
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub async fn ping(&self) -> Result<bool> {
        debug!("Checking LanceDB connection");

        match self.connection.table_names().execute().await {
            Ok(_) => Ok(true),
            Err(e) => Err(PipelineError::Database(format!(
                "LanceDB connection failed: {}",
                e
            ))),
        }
    }

    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| PipelineError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.iter().any(|name| name == table_name))
    }

    pub async fn get_table(&self, table_name: &str) -> Result<Table> {
        self.connection
            .open_table(table_name)
            .execute()
            .await
            .map_err(|e| {
                PipelineError::Database(format!("Failed to open table {}: {}", table_name, e))
            })
    }

    pub async fn create_table(&self) -> Result<()> {
        let table_name = self.table_name();
        self.connection
            .create_empty_table(&table_name, SchemaManager::records_schema())
            .execute()
            .await
            .map_err(|e| {
                PipelineError::Database(format!("Failed to create table {}: {}", table_name, e))
            })?;
        info!("Created table: {}", table_name);
        Ok(())
    }

    pub async fn get_record_count(&self) -> Result<u64> {
        let table_name = self.table_name();
        if !self.table_exists(&table_name).await? {
            return Ok(0);
        }

        let table = self.get_table(&table_name).await?;
        let count = table
            .count_rows(None)
            .await
            .map_err(|e| PipelineError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    /// Filters run as a table predicate; newest-first ordering is applied here.
    pub async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<PrescriptionRecord>> {
        let table_name = self.table_name();
        if !self.table_exists(&table_name).await? {
            warn!("Table '{}' does not exist, returning empty results", table_name);
            return Ok(Vec::new());
        }

        let table = self.get_table(&table_name).await?;
        let mut query = table.query();
        if let Some(predicate) = search_predicate(criteria) {
            debug!("Applied filter: {}", predicate);
            query = query.only_if(predicate);
        }

        let mut results_stream = query
            .execute()
            .await
            .map_err(|e| PipelineError::Database(format!("Search failed: {}", e)))?;

        let mut records = Vec::new();
        while let Some(batch_result) = results_stream.next().await {
            let batch = batch_result.map_err(|e| {
                PipelineError::Database(format!("Failed to read result batch: {}", e))
            })?;
            records.extend(SchemaManager::batch_to_records(&batch)?);
        }

        let matched = criteria.apply(records);
        info!("Search returned {} record(s)", matched.len());
        Ok(matched)
    }
}

fn search_predicate(criteria: &SearchCriteria) -> Option<String> {
    let mut clauses = Vec::new();
    if let Some(code) = &criteria.code {
        clauses.push(format!("array_has(codes, '{}')", code.replace('\'', "''")));
    }
    if let Some(from) = criteria.issue_date_from {
        clauses.push(format!("issue_date >= {}", from.timestamp_micros()));
    }
    if let Some(to) = criteria.issue_date_to {
        clauses.push(format!("issue_date <= {}", to.timestamp_micros()));
    }

    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" AND "))
    }
}
