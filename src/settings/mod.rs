// file: src/settings/mod.rs
// description: connection settings model and provider exports
// reference: internal module structure

pub mod model;
pub mod provider;

pub use model::{ObjectStoreSettings, Settings, StoreSettings};
pub use provider::{FileSettingsProvider, InMemorySettingsProvider, SettingsProvider};
