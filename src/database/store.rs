// file: src/database/store.rs
// description: record sink contract with LanceDB and in-memory implementations
// reference: https://docs.rs/async-trait

use crate::database::client::LanceDbClient;
use crate::database::connection::ConnectionManager;
use crate::database::insert::BatchInserter;
use crate::database::schema::{ReadinessPolicy, SchemaManager, StructureStatus};
use crate::error::Result;
use crate::models::{PrescriptionRecord, SearchCriteria};
use crate::settings::{SettingsProvider, StoreSettings};
use crate::utils::{CancellationSignal, HealthCheck, HealthReport, OperationTimer};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Where prescription records are persisted and queried.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn store(&self, record: &PrescriptionRecord) -> Result<()> {
        self.store_batch(std::slice::from_ref(record)).await
    }

    async fn store_batch(&self, records: &[PrescriptionRecord]) -> Result<()>;

    /// Matching records, newest upload first.
    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<PrescriptionRecord>>;

    async fn test_connection(&self) -> HealthReport;
}

pub struct LanceRecordStore {
    settings: Arc<dyn SettingsProvider>,
    connections: Arc<ConnectionManager>,
    batch_size: usize,
    readiness: ReadinessPolicy,
}

impl LanceRecordStore {
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        connections: Arc<ConnectionManager>,
        batch_size: usize,
    ) -> Self {
        Self {
            settings,
            connections,
            batch_size,
            readiness: ReadinessPolicy::default(),
        }
    }

    pub fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    async fn store_settings(&self) -> Result<StoreSettings> {
        Ok(self.settings.get().await?.store)
    }

    async fn client(&self) -> Result<LanceDbClient> {
        let settings = self.store_settings().await?;
        self.connections.ensure_ready(&settings).await
    }

    pub async fn check_structure(&self) -> Result<StructureStatus> {
        let settings = self.store_settings().await?;
        let mut status = StructureStatus {
            database_uri: settings.database_uri(),
            table_name: settings.table_name(),
            database_exists: false,
            table_exists: false,
        };

        // Connecting would create a missing local database, so look before connecting.
        if settings.is_local_target() && !Path::new(&status.database_uri).exists() {
            debug!("Local database {} does not exist", status.database_uri);
            return Ok(status);
        }

        let client = self.connections.ensure_ready(&settings).await?;
        status.database_exists = client.ping().await.unwrap_or(false);
        if status.database_exists {
            status.table_exists = client.table_exists(&status.table_name).await?;
        }

        Ok(status)
    }

    /// Creates whatever `check_structure` reports as missing.
    pub async fn create_missing_structures(
        &self,
        cancel: &CancellationSignal,
    ) -> Result<StructureStatus> {
        let settings = self.store_settings().await?;
        let status = self.check_structure().await?;

        if !status.database_exists {
            info!("Creating database location {}", status.database_uri);
            if settings.is_local_target() {
                tokio::fs::create_dir_all(&status.database_uri).await?;
            }
            self.connections.invalidate().await;

            let connections = self.connections.clone();
            SchemaManager::wait_until_ready(&settings.bucket_name, self.readiness, cancel, || {
                let connections = connections.clone();
                let settings = settings.clone();
                async move {
                    match connections.ensure_ready(&settings).await {
                        Ok(client) => client.ping().await.unwrap_or(false),
                        Err(e) => {
                            debug!("Database not reachable yet: {}", e);
                            false
                        }
                    }
                }
            })
            .await?;
        }

        if !status.table_exists {
            cancel.check()?;
            self.client().await?.create_table().await?;
        }

        self.check_structure().await
    }
}

#[async_trait]
impl RecordSink for LanceRecordStore {
    async fn store_batch(&self, records: &[PrescriptionRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let client = self.client().await?;
        BatchInserter::new(&client, self.batch_size)
            .upsert(records)
            .await?;
        Ok(())
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<PrescriptionRecord>> {
        debug!("Searching records with {:?}", criteria);
        self.client().await?.search(criteria).await
    }

    async fn test_connection(&self) -> HealthReport {
        let timer = OperationTimer::new("store health check");
        let mut checks = Vec::new();

        let started = Instant::now();
        let settings = match self.store_settings().await {
            Ok(settings) => {
                checks.push(HealthCheck::healthy("settings", started.elapsed()));
                Some(settings)
            }
            Err(e) => {
                checks.push(HealthCheck::unhealthy("settings", e.to_string(), started.elapsed()));
                None
            }
        };

        if let Some(settings) = settings {
            let started = Instant::now();
            match self.connections.ensure_ready(&settings).await {
                Ok(client) => match client.ping().await {
                    Ok(_) => {
                        checks.push(HealthCheck::healthy("lancedb", started.elapsed()));
                        let started = Instant::now();
                        let table_name = settings.table_name();
                        match client.table_exists(&table_name).await {
                            Ok(true) => {
                                checks.push(HealthCheck::healthy("collection", started.elapsed()))
                            }
                            Ok(false) => checks.push(HealthCheck::degraded(
                                "collection",
                                format!("Table '{}' does not exist yet", table_name),
                                started.elapsed(),
                            )),
                            Err(e) => checks.push(HealthCheck::unhealthy(
                                "collection",
                                e.to_string(),
                                started.elapsed(),
                            )),
                        }
                    }
                    Err(e) => {
                        checks.push(HealthCheck::unhealthy("lancedb", e.to_string(), started.elapsed()))
                    }
                },
                Err(e) => {
                    warn!("Store connection failed: {}", e);
                    checks.push(HealthCheck::unhealthy("lancedb", e.to_string(), started.elapsed()));
                }
            }
        }

        timer.finish();
        HealthReport::new(checks, env!("CARGO_PKG_VERSION").to_string())
    }
}

/// Process-local sink. Same upsert and search semantics as the LanceDB store.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<Vec<PrescriptionRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<PrescriptionRecord> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordSink for MemoryRecordStore {
    async fn store_batch(&self, records: &[PrescriptionRecord]) -> Result<()> {
        let mut stored = self.records.write().await;
        for record in records {
            match stored.iter_mut().find(|existing| existing.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<PrescriptionRecord>> {
        Ok(criteria.apply(self.records.read().await.iter().cloned()))
    }

    async fn test_connection(&self) -> HealthReport {
        HealthReport::new(
            vec![HealthCheck::healthy("memory store", std::time::Duration::ZERO)],
            env!("CARGO_PKG_VERSION").to_string(),
        )
    }
}
