// file: src/database/mod.rs
// description: database operations module exports
// reference: internal module structure

pub mod client;
pub mod connection;
pub mod insert;
pub mod schema;
pub mod store;

pub use client::LanceDbClient;
pub use connection::ConnectionManager;
pub use insert::{BatchInserter, InsertStats};
pub use schema::{ReadinessPolicy, SchemaManager, StructureStatus};
pub use store::{LanceRecordStore, MemoryRecordStore, RecordSink};
