//! Connection resolution
//!
//! Maps connection descriptors to live database handles. Lookups are
//! lock-free reads of a concurrent map; the first resolution of a descriptor
//! constructs its handle under a lock scoped to that descriptor, so misses on
//! different descriptors never wait on each other.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::descriptor::ConnectionDescriptor;
use crate::error::{Error, Result};
use crate::metrics::MetricsCollector;
use crate::store::{Collection, Database, DocumentStore};

struct HandleInner {
    descriptor: ConnectionDescriptor,
    key: String,
    database: Arc<dyn Database>,
}

/// Shared handle to one live logical database.
///
/// Clones refer to the same handle; [`DatabaseHandle::ptr_eq`] compares identity.
#[derive(Clone)]
pub struct DatabaseHandle {
    inner: Arc<HandleInner>,
}

impl DatabaseHandle {
    fn new(descriptor: ConnectionDescriptor, database: Arc<dyn Database>) -> Self {
        let key = descriptor.normalized();
        Self {
            inner: Arc::new(HandleInner {
                descriptor,
                key,
                database,
            }),
        }
    }

    /// Descriptor the handle was resolved from
    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.inner.descriptor
    }

    /// Normalized descriptor, the cache key of this handle
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Database name
    pub fn name(&self) -> &str {
        self.inner.database.name()
    }

    /// Underlying store database
    pub fn database(&self) -> &Arc<dyn Database> {
        &self.inner.database
    }

    /// Handle to a collection of this database
    pub fn collection(&self, name: &str) -> Arc<dyn Collection> {
        self.inner.database.collection(name)
    }

    /// Whether two handles are the same instance
    pub fn ptr_eq(&self, other: &DatabaseHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for DatabaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseHandle")
            .field("descriptor", &self.inner.descriptor.to_string())
            .field("database", &self.name())
            .finish()
    }
}

/// Cache of database handles keyed by normalized descriptor
pub struct ConnectionResolver {
    store: Arc<dyn DocumentStore>,
    handles: DashMap<String, DatabaseHandle>,
    /// Per-descriptor creation locks
    creating: DashMap<String, Arc<Mutex<()>>>,
    metrics: Arc<MetricsCollector>,
}

impl ConnectionResolver {
    /// Create an empty resolver over a store client
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_metrics(store, Arc::new(MetricsCollector::new()))
    }

    /// Create an empty resolver reporting into a shared collector
    pub fn with_metrics(store: Arc<dyn DocumentStore>, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            store,
            handles: DashMap::new(),
            creating: DashMap::new(),
            metrics,
        }
    }

    /// Resolve a raw connection string; blank selects the default endpoint
    pub fn resolve(&self, raw: &str) -> Result<DatabaseHandle> {
        let descriptor = ConnectionDescriptor::parse(raw)?;
        self.resolve_descriptor(&descriptor)
    }

    /// Resolve a parsed descriptor
    pub fn resolve_descriptor(&self, descriptor: &ConnectionDescriptor) -> Result<DatabaseHandle> {
        let key = descriptor.normalized();

        if let Some(handle) = self.handles.get(&key) {
            self.metrics.record_cache_hit();
            return Ok(handle.clone());
        }

        let lock = self
            .creating
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock();

        // Another thread may have finished while we waited
        if let Some(handle) = self.handles.get(&key) {
            self.metrics.record_cache_hit();
            return Ok(handle.clone());
        }

        self.metrics.record_cache_miss();
        debug!(descriptor = %descriptor, "constructing database handle");

        let database = self
            .store
            .connect(descriptor)
            .map_err(|e| Error::connection(descriptor.to_string(), e.message))?;
        let handle = DatabaseHandle::new(descriptor.clone(), database);
        self.handles.insert(key, handle.clone());
        self.metrics.record_handle_created();

        Ok(handle)
    }

    /// Whether a handle for this descriptor is cached
    pub fn contains(&self, raw: &str) -> bool {
        ConnectionDescriptor::parse(raw)
            .map(|d| self.handles.contains_key(&d.normalized()))
            .unwrap_or(false)
    }

    /// Number of cached handles
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no handle has been created yet
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Shared metrics collector
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }
}

impl fmt::Debug for ConnectionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionResolver")
            .field("handles", &self.handles.len())
            .finish()
    }
}
