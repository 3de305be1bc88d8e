//! # mongolog_rs
//!
//! A log sink that writes each log event as one document into a Mongo-style
//! document store.
//!
//! The sink resolves its connection string to a database handle once per
//! process, optionally range-shards the target collection the first time it
//! is written to, and converts events into documents either with a fixed
//! default schema or with a configured list of fields.
//!
//! ```no_run
//! use std::sync::Arc;
//! use mongolog_rs::{AppenderConfig, Level, LoggingEvent, MemoryStore, MongoSink};
//!
//! let config = AppenderConfig::new()
//!     .with_connection_string("mongodb://localhost/app")
//!     .with_shard_key("host");
//! let sink = MongoSink::with_store(config, Arc::new(MemoryStore::new()))?;
//!
//! let event = LoggingEvent::new(Level::Info, "service started");
//! sink.write(Some(&event))?;
//! # Ok::<(), mongolog_rs::Error>(())
//! ```

pub mod builder;
pub mod config;
pub mod descriptor;
pub mod document;
pub mod error;
pub mod event;
pub mod exception;
pub mod layout;
pub mod metrics;
pub mod resolver;
pub mod shard;
pub mod sink;
pub mod store;

pub use builder::DocumentBuilder;
pub use config::AppenderConfig;
pub use descriptor::ConnectionDescriptor;
pub use document::Document;
pub use error::{Error, Result, Stage};
pub use event::{ExceptionInfo, Level, LocationInfo, LoggingEvent};
pub use exception::serialize_exception;
pub use layout::{EventField, FieldSpec, Layout, LayoutResult};
pub use metrics::{MetricsCollector, SinkStats};
pub use resolver::{ConnectionResolver, DatabaseHandle};
pub use shard::ShardProvisioner;
pub use sink::MongoSink;
pub use store::{
    Collection, Database, DocumentStore, MemoryStore, StoreError, WriteConcern,
};
