#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use mongolog_rs::{
    AppenderConfig, ConnectionResolver, Document, Level, LoggingEvent, MemoryStore, MongoSink,
    ShardProvisioner,
};

pub const DESCRIPTOR: &str = "mongodb://localhost/app";
pub const NAMESPACE: &str = "app.logs";

pub fn config() -> AppenderConfig {
    AppenderConfig::new().with_connection_string(DESCRIPTOR)
}

pub fn sharded_config() -> AppenderConfig {
    config().with_shard_key("host")
}

pub fn sink(store: &MemoryStore, config: AppenderConfig) -> Result<MongoSink> {
    MongoSink::with_store(config, Arc::new(store.clone())).context("building sink")
}

/// Sink over explicitly shared resolver and provisioner
pub fn shared_sink(
    config: AppenderConfig,
    resolver: &Arc<ConnectionResolver>,
    provisioner: &Arc<ShardProvisioner>,
) -> Result<MongoSink> {
    MongoSink::new(config, resolver.clone(), provisioner.clone()).context("building sink")
}

pub fn event(message: &str) -> LoggingEvent {
    LoggingEvent::new(Level::Info, message)
        .with_logger_name("app.Foo")
        .with_thread("main")
}

/// Stored documents without the store-assigned `_id`
pub fn stored(store: &MemoryStore, namespace: &str) -> Vec<Document> {
    store
        .documents(namespace)
        .into_iter()
        .map(|doc| doc.into_iter().filter(|(k, _)| k != "_id").collect())
        .collect()
}

pub fn keys(doc: &Document) -> Vec<&str> {
    doc.keys().map(String::as_str).collect()
}
