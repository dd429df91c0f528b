// file: src/settings/model.rs
// description: connection and bucket settings compared by value to detect reconnects
// reference: document store and S3 credential settings

use serde::{Deserialize, Serialize};

pub const DEFAULT_SCOPE: &str = "_default";
pub const DEFAULT_COLLECTION: &str = "_default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub store: StoreSettings,
    pub object_store: ObjectStoreSettings,
}

impl Settings {
    pub fn redacted(&self) -> Self {
        Self {
            store: self.store.redacted(),
            object_store: self.object_store.redacted(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSettings {
    pub connection_target: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub bucket_name: String,
    #[serde(default)]
    pub scope_name: String,
    #[serde(default)]
    pub collection_name: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            connection_target: "data/lancedb".to_string(),
            username: String::new(),
            password: String::new(),
            bucket_name: "fhir-prescriptions".to_string(),
            scope_name: DEFAULT_SCOPE.to_string(),
            collection_name: "prescriptions".to_string(),
        }
    }
}

impl StoreSettings {
    pub fn resolved_scope(&self) -> &str {
        if self.scope_name.trim().is_empty() {
            DEFAULT_SCOPE
        } else {
            self.scope_name.trim()
        }
    }

    pub fn resolved_collection(&self) -> &str {
        if self.collection_name.trim().is_empty() {
            DEFAULT_COLLECTION
        } else {
            self.collection_name.trim()
        }
    }

    /// Database location: the bucket lives as a sub-database of the connection target.
    pub fn database_uri(&self) -> String {
        format!(
            "{}/{}",
            self.connection_target.trim_end_matches('/'),
            self.bucket_name.trim()
        )
    }

    /// Table backing the configured scope and collection.
    pub fn table_name(&self) -> String {
        let scope = self.resolved_scope();
        if scope == DEFAULT_SCOPE {
            self.resolved_collection().to_string()
        } else {
            format!("{}__{}", scope, self.resolved_collection())
        }
    }

    pub fn is_local_target(&self) -> bool {
        let target = self.connection_target.trim();
        !target.contains("://") || target.starts_with("file://")
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }

    /// Copy safe for display; the password is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.password.is_empty() {
            copy.password = "********".to_string();
        }
        copy
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStoreSettings {
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    pub region: String,
    #[serde(default)]
    pub bucket_name: String,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    #[serde(default)]
    pub default_prefix: Option<String>,
}

impl Default for ObjectStoreSettings {
    fn default() -> Self {
        Self {
            access_key_id: String::new(),
            secret_access_key: String::new(),
            region: "us-east-1".to_string(),
            bucket_name: String::new(),
            endpoint_url: None,
            force_path_style: true,
            default_prefix: None,
        }
    }
}

impl ObjectStoreSettings {
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.secret_access_key.is_empty() {
            copy.secret_access_key = "********".to_string();
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_for_default_scope() {
        let settings = StoreSettings::default();
        assert_eq!(settings.table_name(), "prescriptions");
    }

    #[test]
    fn test_table_name_for_custom_scope() {
        let settings = StoreSettings {
            scope_name: "pharmacy".to_string(),
            collection_name: "erezept".to_string(),
            ..StoreSettings::default()
        };
        assert_eq!(settings.table_name(), "pharmacy__erezept");
    }

    #[test]
    fn test_blank_names_resolve_to_default() {
        let settings = StoreSettings {
            scope_name: "  ".to_string(),
            collection_name: String::new(),
            ..StoreSettings::default()
        };
        assert_eq!(settings.resolved_scope(), "_default");
        assert_eq!(settings.table_name(), "_default");
    }

    #[test]
    fn test_database_uri_joins_bucket() {
        let settings = StoreSettings {
            connection_target: "s3://lake/".to_string(),
            ..StoreSettings::default()
        };
        assert_eq!(settings.database_uri(), "s3://lake/fhir-prescriptions");
        assert!(!settings.is_local_target());
        assert!(StoreSettings::default().is_local_target());
    }

    #[test]
    fn test_value_equality_detects_changes() {
        let a = Settings::default();
        let mut b = a.clone();
        assert_eq!(a, b);
        b.store.collection_name = "other".to_string();
        assert_ne!(a, b);
    }

    #[test]
    fn test_redaction_masks_secrets() {
        let settings = StoreSettings {
            password: "secret".to_string(),
            ..StoreSettings::default()
        };
        assert_eq!(settings.redacted().password, "********");
        assert_eq!(StoreSettings::default().redacted().password, "");
    }
}
