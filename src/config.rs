//! Configuration for the Mongo sink
//!
//! This module provides the configuration consumed by [`crate::MongoSink`]:
//! where to connect, which collection to write, how to shard it and which
//! fields each document carries.

use std::collections::HashSet;
#[cfg(feature = "toml")]
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::descriptor::ConnectionDescriptor;
use crate::error::{Error, Result};
use crate::layout::FieldSpec;
pub use crate::store::WriteConcern;

/// Collection written when none is configured
pub const DEFAULT_COLLECTION: &str = "logs";
/// Sink name used when none is configured
pub const DEFAULT_NAME: &str = "mongo";

/// Configuration options for a Mongo sink
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct AppenderConfig {
    /// Name the host knows the sink by
    pub name: String,
    /// `mongodb://` connection string; blank selects `mongodb://localhost/log4net`
    pub connection_string: String,
    /// Target collection; blank selects `logs`
    pub collection_name: String,
    /// Field to range-shard the collection on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard_key: Option<String>,
    /// Custom document fields; when non-empty they replace the default schema
    #[serde(skip_serializing)]
    pub fields: Vec<FieldSpec>,
    /// Durability of inserts
    pub write_concern: WriteConcern,
}

impl Default for AppenderConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            connection_string: String::new(),
            collection_name: String::new(),
            shard_key: None,
            fields: Vec::new(),
            write_concern: WriteConcern::Unacknowledged,
        }
    }
}

impl AppenderConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sink name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the connection string
    pub fn with_connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = connection_string.into();
        self
    }

    /// Set the collection name
    pub fn with_collection_name(mut self, collection_name: impl Into<String>) -> Self {
        self.collection_name = collection_name.into();
        self
    }

    /// Set the shard key
    pub fn with_shard_key(mut self, shard_key: impl Into<String>) -> Self {
        self.shard_key = Some(shard_key.into());
        self
    }

    /// Append a custom field
    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Replace the custom fields
    pub fn with_fields(mut self, fields: Vec<FieldSpec>) -> Self {
        self.fields = fields;
        self
    }

    /// Set the write concern
    pub fn with_write_concern(mut self, write_concern: WriteConcern) -> Self {
        self.write_concern = write_concern;
        self
    }

    /// Effective collection name
    pub fn collection_name(&self) -> &str {
        let name = self.collection_name.trim();
        if name.is_empty() {
            DEFAULT_COLLECTION
        } else {
            name
        }
    }

    /// Effective shard key; blank counts as unset
    pub fn shard_key(&self) -> Option<&str> {
        self.shard_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Parse the connection string
    pub fn descriptor(&self) -> Result<ConnectionDescriptor> {
        ConnectionDescriptor::parse(&self.connection_string)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.descriptor()?;

        let collection = self.collection_name();
        if collection.starts_with("system.") || collection.contains('$') {
            return Err(Error::config(format!(
                "Invalid collection name: {}",
                collection
            )));
        }

        if let Some(key) = self.shard_key() {
            if key.contains('$') || key.split('.').any(str::is_empty) {
                return Err(Error::config(format!("Invalid shard key: {}", key)));
            }
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(Error::config("Custom field names must not be empty"));
            }
            if field.name.starts_with('$') {
                return Err(Error::config(format!(
                    "Custom field name must not start with '$': {}",
                    field.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(Error::config(format!(
                    "Duplicate custom field: {}",
                    field.name
                )));
            }
        }

        Ok(())
    }

    /// Create a human-readable string representation of the configuration
    pub fn to_string_pretty(&self) -> String {
        let mut result = String::new();

        result.push_str(&format!("=== Mongo Sink '{}' ===\n\n", self.name));

        result.push_str("Connection:\n");
        match self.descriptor() {
            Ok(descriptor) => result.push_str(&format!("  Descriptor: {}\n", descriptor)),
            Err(e) => result.push_str(&format!("  Descriptor: <invalid: {}>\n", e.message())),
        }
        result.push_str(&format!("  Collection: {}\n", self.collection_name()));
        result.push_str(&format!("  Write Concern: {}\n", self.write_concern));

        result.push_str("\nSharding:\n");
        match self.shard_key() {
            Some(key) => result.push_str(&format!("  Shard Key: {}\n", key)),
            None => result.push_str("  Shard Key: <none>\n"),
        }

        result.push_str("\nDocument Schema:\n");
        if self.fields.is_empty() {
            result.push_str("  Default\n");
        } else {
            for field in &self.fields {
                let source = field
                    .source()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "<custom>".to_string());
                result.push_str(&format!("  {} <- {}\n", field.name, source));
            }
        }

        result
    }

    /// Load configuration from a TOML string
    #[cfg(feature = "toml")]
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Failed to parse TOML: {}", e)))
    }

    /// Load configuration from a TOML file
    #[cfg(feature = "toml")]
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::EventField;

    #[test]
    fn test_default_config() {
        let config = AppenderConfig::default();

        assert_eq!(config.name, "mongo");
        assert_eq!(config.collection_name(), "logs");
        assert_eq!(config.shard_key(), None);
        assert_eq!(config.write_concern, WriteConcern::Unacknowledged);
        assert!(config.fields.is_empty());
        assert_eq!(config.descriptor().unwrap().database(), "log4net");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = AppenderConfig::new()
            .with_name("audit")
            .with_connection_string("mongodb://db1,db2/audit")
            .with_collection_name("events")
            .with_shard_key("host")
            .with_field(FieldSpec::event("msg", EventField::Message))
            .with_write_concern(WriteConcern::Acknowledged);

        assert_eq!(config.collection_name(), "events");
        assert_eq!(config.shard_key(), Some("host"));
        assert_eq!(config.fields.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config = AppenderConfig::new()
            .with_collection_name("   ")
            .with_shard_key("  ");
        assert_eq!(config.collection_name(), "logs");
        assert_eq!(config.shard_key(), None);
    }

    #[test]
    fn test_config_validation() {
        let invalid_configs = vec![
            AppenderConfig::new().with_connection_string("mongodb://host:x/db"),
            AppenderConfig::new().with_collection_name("system.profile"),
            AppenderConfig::new().with_collection_name("lo$gs"),
            AppenderConfig::new().with_shard_key("$host"),
            AppenderConfig::new().with_shard_key("a..b"),
            AppenderConfig::new().with_field(FieldSpec::event("", EventField::Message)),
            AppenderConfig::new().with_field(FieldSpec::event("$m", EventField::Message)),
            AppenderConfig::new()
                .with_field(FieldSpec::event("m", EventField::Message))
                .with_field(FieldSpec::event("m", EventField::Level)),
        ];

        for config in invalid_configs {
            assert!(config.validate().is_err());
        }

        let err = AppenderConfig::new()
            .with_connection_string("ftp://x")
            .validate()
            .unwrap_err();
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_config_pretty_string() {
        let config = AppenderConfig::new()
            .with_connection_string("mongodb://u:pw@localhost/app")
            .with_shard_key("host")
            .with_field(FieldSpec::event("lvl", EventField::Level));
        let pretty = config.to_string_pretty();

        assert!(pretty.contains("Connection:"));
        assert!(pretty.contains("Sharding:"));
        assert!(pretty.contains("Shard Key: host"));
        assert!(pretty.contains("lvl <- level"));
        assert!(!pretty.contains(":pw@"));
    }

    #[test]
    fn test_config_from_json() {
        let config: AppenderConfig = serde_json::from_str(
            r#"{
                "connection_string": "mongodb://localhost/app",
                "shard_key": "host",
                "fields": [{"name": "msg", "source": "message"}],
                "write_concern": "acknowledged"
            }"#,
        )
        .unwrap();

        assert_eq!(config.name, "mongo");
        assert_eq!(config.fields[0].source(), Some(&EventField::Message));
        assert_eq!(config.write_concern, WriteConcern::Acknowledged);
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_config_from_toml() {
        let config = AppenderConfig::from_toml_str(
            r#"
            connection_string = "mongodb://localhost/app"
            collection_name = "events"

            [[fields]]
            name = "lvl"
            source = "level"
            "#,
        )
        .unwrap();

        assert_eq!(config.collection_name(), "events");
        assert_eq!(config.fields.len(), 1);
    }
}
