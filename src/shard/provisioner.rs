//! Idempotent shard provisioning
//!
//! Enables sharding on a database and shards a collection on the configured
//! key, issuing each administrative sequence at most once per process for a
//! given target.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::metrics::MetricsCollector;
use crate::resolver::DatabaseHandle;
use crate::shard::command::{self, ID_FIELD};
use crate::shard::state::{AttemptState, ShardState, ShardTarget};
use crate::store::{Collection, IndexOptions};

/// Provisions range sharding for databases and collections
#[derive(Debug)]
pub struct ShardProvisioner {
    state: ShardState,
    metrics: Arc<MetricsCollector>,
}

impl Default for ShardProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardProvisioner {
    /// Create a provisioner with no targets attempted
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(MetricsCollector::new()))
    }

    /// Create a provisioner reporting into a shared collector
    pub fn with_metrics(metrics: Arc<MetricsCollector>) -> Self {
        Self {
            state: ShardState::new(),
            metrics,
        }
    }

    /// Enable sharding on the database, once. No-op without a shard key.
    pub fn ensure_database_sharding(
        &self,
        db: &DatabaseHandle,
        shard_key: Option<&str>,
    ) -> Result<()> {
        if shard_key.is_none() {
            return Ok(());
        }

        let target = ShardTarget::database(db.key());
        self.state.attempt(&target, || {
            self.metrics.record_database_provision();
            self.enable_sharding(db)
        })?;
        Ok(())
    }

    /// Shard the collection on `shard_key`, once. No-op without a shard key.
    ///
    /// Indexes the key first (unless it is `_id`), then enables sharding on
    /// the database, then shards the collection.
    pub fn ensure_collection_sharding(
        &self,
        db: &DatabaseHandle,
        collection: &dyn Collection,
        shard_key: Option<&str>,
    ) -> Result<()> {
        let Some(shard_key) = shard_key else {
            return Ok(());
        };

        let target = ShardTarget::collection(db.key(), collection.name());
        self.state.attempt(&target, || {
            self.metrics.record_collection_provision();

            if shard_key != ID_FIELD {
                debug!(namespace = %collection.full_name(), shard_key, "creating shard key index");
                collection
                    .create_index(shard_key, IndexOptions { background: true })
                    .map_err(|e| Error::provisioning(collection.full_name(), e.message))?;
            }

            self.ensure_database_sharding(db, Some(shard_key))?;
            self.shard_collection(db, collection, shard_key)
        })?;
        Ok(())
    }

    /// Attempt state of a database
    pub fn database_state(&self, db: &DatabaseHandle) -> AttemptState {
        self.state.state(&ShardTarget::database(db.key()))
    }

    /// Attempt state of a collection
    pub fn collection_state(&self, db: &DatabaseHandle, collection: &str) -> AttemptState {
        self.state.state(&ShardTarget::collection(db.key(), collection))
    }

    fn enable_sharding(&self, db: &DatabaseHandle) -> Result<()> {
        self.metrics.record_admin_command();
        match db.database().run_admin_command(command::enable_sharding(db.name())) {
            Ok(_) => {
                debug!(database = db.name(), "sharding enabled");
                Ok(())
            }
            Err(e) if command::is_already_enabled(&e.message) => {
                self.metrics.record_already_applied();
                info!(database = db.name(), "sharding already enabled");
                Ok(())
            }
            Err(e) => Err(Error::provisioning(db.name(), e.message)),
        }
    }

    fn shard_collection(
        &self,
        db: &DatabaseHandle,
        collection: &dyn Collection,
        shard_key: &str,
    ) -> Result<()> {
        let namespace = collection.full_name();
        self.metrics.record_admin_command();
        match db
            .database()
            .run_admin_command(command::shard_collection(&namespace, shard_key))
        {
            Ok(_) => {
                debug!(namespace = %namespace, shard_key, "collection sharded");
                Ok(())
            }
            Err(e) if command::is_already_sharded(&e.message) => {
                self.metrics.record_already_applied();
                info!(namespace = %namespace, "collection already sharded");
                Ok(())
            }
            Err(e) => Err(Error::provisioning(namespace, e.message)),
        }
    }
}
