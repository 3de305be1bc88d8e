//! Administrative sharding commands

use serde_json::{json, Value};

use crate::document::Document;

/// Name of the command enabling sharding on a database
pub const ENABLE_SHARDING: &str = "enableSharding";
/// Name of the command sharding a collection
pub const SHARD_COLLECTION: &str = "shardCollection";
/// The store's primary identity field, always indexed
pub const ID_FIELD: &str = "_id";

/// `{ enableSharding: <database> }`
pub fn enable_sharding(database: &str) -> Document {
    let mut cmd = Document::new();
    cmd.insert(ENABLE_SHARDING.into(), Value::String(database.to_string()));
    cmd
}

/// `{ shardCollection: <database.collection>, key: { <shard_key>: 1 } }`
pub fn shard_collection(namespace: &str, shard_key: &str) -> Document {
    let mut key = Document::new();
    key.insert(shard_key.to_string(), json!(1));

    let mut cmd = Document::new();
    cmd.insert(SHARD_COLLECTION.into(), Value::String(namespace.to_string()));
    cmd.insert("key".into(), Value::Object(key));
    cmd
}

/// Whether an `enableSharding` failure means sharding is already on
pub fn is_already_enabled(message: &str) -> bool {
    message.to_lowercase().contains("already enabled")
}

/// Whether a `shardCollection` failure means the collection is already sharded
pub fn is_already_sharded(message: &str) -> bool {
    message.to_lowercase().contains("already ")
}
