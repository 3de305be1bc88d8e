//! The Mongo sink
//!
//! Ties the pieces together for each log call: resolve the database handle,
//! provision sharding on first use, build documents and issue one insert.
//! Nothing is buffered or retried.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::builder::DocumentBuilder;
use crate::config::AppenderConfig;
use crate::descriptor::ConnectionDescriptor;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::event::LoggingEvent;
use crate::metrics::{MetricsCollector, SinkStats};
use crate::resolver::ConnectionResolver;
use crate::shard::ShardProvisioner;
use crate::store::{Collection, DocumentStore, StoreResult};

/// Log sink writing one document per event
pub struct MongoSink {
    config: AppenderConfig,
    descriptor: ConnectionDescriptor,
    builder: DocumentBuilder,
    resolver: Arc<ConnectionResolver>,
    provisioner: Arc<ShardProvisioner>,
    metrics: Arc<MetricsCollector>,
    enabled: AtomicBool,
}

impl MongoSink {
    /// Create a sink over shared resolution and provisioning state.
    ///
    /// Sinks created over the same resolver and provisioner share handles
    /// and provisioning attempts. Fails if the configuration is invalid.
    pub fn new(
        config: AppenderConfig,
        resolver: Arc<ConnectionResolver>,
        provisioner: Arc<ShardProvisioner>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            descriptor: config.descriptor()?,
            builder: DocumentBuilder::new(config.fields.clone()),
            metrics: resolver.metrics().clone(),
            config,
            resolver,
            provisioner,
            enabled: AtomicBool::new(true),
        })
    }

    /// Create a sink with private resolution and provisioning state
    pub fn with_store(config: AppenderConfig, store: Arc<dyn DocumentStore>) -> Result<Self> {
        let metrics = Arc::new(MetricsCollector::new());
        let resolver = Arc::new(ConnectionResolver::with_metrics(store, metrics.clone()));
        let provisioner = Arc::new(ShardProvisioner::with_metrics(metrics));
        Self::new(config, resolver, provisioner)
    }

    /// Name of the sink
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The sink's configuration
    pub fn config(&self) -> &AppenderConfig {
        &self.config
    }

    /// Whether the sink writes anything
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Enable or disable the sink
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Resolver shared by this sink
    pub fn resolver(&self) -> &Arc<ConnectionResolver> {
        &self.resolver
    }

    /// Provisioner shared by this sink
    pub fn provisioner(&self) -> &Arc<ShardProvisioner> {
        &self.provisioner
    }

    /// Snapshot of the sink counters
    pub fn stats(&self) -> SinkStats {
        self.metrics.snapshot()
    }

    /// Write one event. An absent event is a no-op.
    ///
    /// Under the default unacknowledged write concern, store-side write
    /// failures are logged and counted but not returned.
    pub fn write(&self, event: Option<&LoggingEvent>) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let Some(event) = event else {
            self.metrics.record_skipped_events(1);
            return Ok(());
        };

        let collection = self.collection()?;

        let document = match self.builder.build(Some(event)) {
            Ok(Some(document)) => document,
            Ok(None) => return Ok(()),
            Err(e) => {
                self.metrics.record_format_failure();
                return Err(e);
            }
        };

        let result = collection.insert_one(document, self.config.write_concern);
        if self.finish_write(collection.as_ref(), result, 1)? {
            self.metrics.record_single_insert();
        }
        Ok(())
    }

    /// Write a batch of events with one insert call. Absent events are
    /// dropped; an empty batch is a no-op.
    ///
    /// If some events fail to format, the remaining documents are still
    /// inserted and the first format error is returned.
    pub fn write_batch<'a, I>(&self, events: I) -> Result<()>
    where
        I: IntoIterator<Item = Option<&'a LoggingEvent>>,
    {
        if !self.is_enabled() {
            return Ok(());
        }

        let mut skipped = 0;
        let events: Vec<&LoggingEvent> = events
            .into_iter()
            .filter_map(|event| {
                if event.is_none() {
                    skipped += 1;
                }
                event
            })
            .collect();
        if skipped > 0 {
            self.metrics.record_skipped_events(skipped);
        }
        if events.is_empty() {
            return Ok(());
        }

        let collection = self.collection()?;

        let mut documents: Vec<Document> = Vec::with_capacity(events.len());
        let mut first_error: Option<Error> = None;
        for event in events {
            match self.builder.build(Some(event)) {
                Ok(Some(document)) => documents.push(document),
                Ok(None) => {}
                Err(e) => {
                    self.metrics.record_format_failure();
                    first_error.get_or_insert(e);
                }
            }
        }

        if !documents.is_empty() {
            let count = documents.len();
            let result = collection.insert_many(documents, self.config.write_concern);
            if self.finish_write(collection.as_ref(), result, count)? {
                self.metrics.record_batch_insert(count);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Resolve the target collection, provisioning sharding on first use
    fn collection(&self) -> Result<Arc<dyn Collection>> {
        let db = self.resolver.resolve_descriptor(&self.descriptor)?;
        let shard_key = self.config.shard_key();

        self.provisioner.ensure_database_sharding(&db, shard_key)?;
        let collection = db.collection(self.config.collection_name());
        self.provisioner
            .ensure_collection_sharding(&db, collection.as_ref(), shard_key)?;

        Ok(collection)
    }

    /// Map a store write result according to the write concern.
    ///
    /// `Ok(false)` means an unacknowledged write was dropped.
    fn finish_write(
        &self,
        collection: &dyn Collection,
        result: StoreResult<()>,
        count: usize,
    ) -> Result<bool> {
        match result {
            Ok(()) => Ok(true),
            Err(e) if self.config.write_concern.is_acknowledged() => {
                Err(Error::write(collection.full_name(), e.message))
            }
            Err(e) => {
                self.metrics.record_dropped_writes(count);
                warn!(
                    sink = %self.config.name,
                    namespace = %collection.full_name(),
                    documents = count,
                    error = %e,
                    "unacknowledged write failed"
                );
                Ok(false)
            }
        }
    }
}

impl fmt::Debug for MongoSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoSink")
            .field("name", &self.config.name)
            .field("descriptor", &self.descriptor.to_string())
            .field("collection", &self.config.collection_name())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
