//! In-memory document store
//!
//! Keeps inserted documents, indexes and the cluster's sharding state in
//! process memory, and answers administrative commands the way a sharded
//! cluster router does. Every call is recorded so callers can inspect what
//! was issued.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::descriptor::ConnectionDescriptor;
use crate::document::Document;
use crate::store::{
    Collection, Database, DocumentStore, IndexOptions, StoreError, StoreResult, WriteConcern,
};

/// Shared state of one simulated cluster
#[derive(Debug)]
struct Cluster {
    /// Whether the cluster accepts sharding commands
    shardable: AtomicBool,
    /// Refuse to construct clients
    reject_connections: AtomicBool,
    /// Fail every insert
    fail_writes: AtomicBool,
    /// Delay applied to each admin command
    admin_latency: RwLock<Duration>,
    /// Documents by namespace
    documents: Mutex<HashMap<String, Vec<Document>>>,
    /// Indexed fields by namespace
    indexes: Mutex<HashMap<String, Vec<(String, IndexOptions)>>>,
    /// Databases with sharding enabled
    sharded_databases: Mutex<HashSet<String>>,
    /// Shard keys by namespace
    sharded_collections: Mutex<HashMap<String, String>>,
    /// Every admin command issued, in order
    admin_log: Mutex<Vec<Document>>,
    /// Number of clients constructed
    connects: AtomicUsize,
    /// Number of insert calls (single or batch)
    insert_calls: AtomicUsize,
}

/// A [`DocumentStore`] that keeps everything in memory
#[derive(Debug, Clone)]
pub struct MemoryStore {
    cluster: Arc<Cluster>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a store simulating a sharded cluster
    pub fn new() -> Self {
        Self {
            cluster: Arc::new(Cluster {
                shardable: AtomicBool::new(true),
                reject_connections: AtomicBool::new(false),
                fail_writes: AtomicBool::new(false),
                admin_latency: RwLock::new(Duration::ZERO),
                documents: Mutex::new(HashMap::new()),
                indexes: Mutex::new(HashMap::new()),
                sharded_databases: Mutex::new(HashSet::new()),
                sharded_collections: Mutex::new(HashMap::new()),
                admin_log: Mutex::new(Vec::new()),
                connects: AtomicUsize::new(0),
                insert_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Create a store simulating a standalone server without sharding
    pub fn unsharded() -> Self {
        let store = Self::new();
        store.set_shardable(false);
        store
    }

    /// Set whether sharding commands are accepted
    pub fn set_shardable(&self, shardable: bool) {
        self.cluster.shardable.store(shardable, Ordering::SeqCst);
    }

    /// Set whether client construction fails
    pub fn set_reject_connections(&self, reject: bool) {
        self.cluster.reject_connections.store(reject, Ordering::SeqCst);
    }

    /// Set whether inserts fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.cluster.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Delay every admin command, widening race windows
    pub fn set_admin_latency(&self, latency: Duration) {
        *self.cluster.admin_latency.write() = latency;
    }

    /// Pretend sharding was already enabled on a database
    pub fn mark_sharding_enabled(&self, database: &str) {
        self.cluster.sharded_databases.lock().insert(database.to_string());
    }

    /// Pretend a namespace was already sharded
    pub fn mark_collection_sharded(&self, namespace: &str, key: &str) {
        self.cluster
            .sharded_collections
            .lock()
            .insert(namespace.to_string(), key.to_string());
    }

    /// Documents stored in a namespace, in insertion order
    pub fn documents(&self, namespace: &str) -> Vec<Document> {
        self.cluster
            .documents
            .lock()
            .get(namespace)
            .cloned()
            .unwrap_or_default()
    }

    /// Indexed fields of a namespace
    pub fn indexes(&self, namespace: &str) -> Vec<(String, IndexOptions)> {
        self.cluster
            .indexes
            .lock()
            .get(namespace)
            .cloned()
            .unwrap_or_default()
    }

    /// Every admin command issued so far
    pub fn admin_commands(&self) -> Vec<Document> {
        self.cluster.admin_log.lock().clone()
    }

    /// Number of admin commands whose first key is `name`
    pub fn admin_command_count(&self, name: &str) -> usize {
        self.cluster
            .admin_log
            .lock()
            .iter()
            .filter(|cmd| cmd.keys().next().map(String::as_str) == Some(name))
            .count()
    }

    /// Whether a database has sharding enabled
    pub fn is_sharding_enabled(&self, database: &str) -> bool {
        self.cluster.sharded_databases.lock().contains(database)
    }

    /// Shard key of a namespace, if sharded
    pub fn shard_key(&self, namespace: &str) -> Option<String> {
        self.cluster.sharded_collections.lock().get(namespace).cloned()
    }

    /// Number of clients constructed
    pub fn connect_count(&self) -> usize {
        self.cluster.connects.load(Ordering::SeqCst)
    }

    /// Number of insert calls received
    pub fn insert_calls(&self) -> usize {
        self.cluster.insert_calls.load(Ordering::SeqCst)
    }
}

impl DocumentStore for MemoryStore {
    fn connect(&self, descriptor: &ConnectionDescriptor) -> StoreResult<Arc<dyn Database>> {
        if self.cluster.reject_connections.load(Ordering::SeqCst) {
            return Err(StoreError::new(format!(
                "No suitable servers found: {}",
                descriptor
            )));
        }

        self.cluster.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryDatabase {
            name: descriptor.database().to_string(),
            cluster: self.cluster.clone(),
        }))
    }
}

/// Database handle onto a [`MemoryStore`]
#[derive(Debug)]
pub struct MemoryDatabase {
    name: String,
    cluster: Arc<Cluster>,
}

impl MemoryDatabase {
    fn enable_sharding(&self, database: &str) -> StoreResult<Document> {
        let mut databases = self.cluster.sharded_databases.lock();
        if !databases.insert(database.to_string()) {
            return Err(StoreError::with_code(23, "already enabled"));
        }
        Ok(ok_reply())
    }

    fn shard_collection(&self, namespace: &str, key: Option<&Value>) -> StoreResult<Document> {
        let field = key
            .and_then(Value::as_object)
            .and_then(|k| k.keys().next().cloned())
            .ok_or_else(|| StoreError::with_code(9, "no shard key"))?;

        let database = namespace.split('.').next().unwrap_or_default();
        if !self.cluster.sharded_databases.lock().contains(database) {
            return Err(StoreError::with_code(
                20,
                format!("sharding not enabled for db {}", database),
            ));
        }

        if field != "_id" {
            let indexes = self.cluster.indexes.lock();
            let indexed = indexes
                .get(namespace)
                .map_or(false, |fields| fields.iter().any(|(f, _)| *f == field));
            if !indexed {
                return Err(StoreError::with_code(
                    115,
                    "please create an index that starts with the shard key before sharding.",
                ));
            }
        }

        let mut collections = self.cluster.sharded_collections.lock();
        if collections.contains_key(namespace) {
            return Err(StoreError::with_code(20, "already sharded"));
        }
        collections.insert(namespace.to_string(), field);
        Ok(ok_reply())
    }
}

impl Database for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn collection(&self, name: &str) -> Arc<dyn Collection> {
        Arc::new(MemoryCollection {
            database: self.name.clone(),
            name: name.to_string(),
            cluster: self.cluster.clone(),
        })
    }

    fn run_admin_command(&self, command: Document) -> StoreResult<Document> {
        self.cluster.admin_log.lock().push(command.clone());

        let latency = *self.cluster.admin_latency.read();
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }

        let Some((name, target)) = command.iter().next() else {
            return Err(StoreError::with_code(59, "empty command"));
        };

        if !self.cluster.shardable.load(Ordering::SeqCst) {
            return Err(StoreError::with_code(
                59,
                format!("no such command: '{}'", name),
            ));
        }

        let target = target.as_str().unwrap_or_default();
        match name.as_str() {
            "enableSharding" => self.enable_sharding(target),
            "shardCollection" => self.shard_collection(target, command.get("key")),
            other => Err(StoreError::with_code(
                59,
                format!("no such command: '{}'", other),
            )),
        }
    }
}

/// Collection handle onto a [`MemoryStore`]
#[derive(Debug)]
pub struct MemoryCollection {
    database: String,
    name: String,
    cluster: Arc<Cluster>,
}

impl MemoryCollection {
    fn store(&self, documents: Vec<Document>) -> StoreResult<()> {
        self.cluster.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.cluster.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::with_code(
                11600,
                "interrupted at shutdown",
            ));
        }

        let mut all = self.cluster.documents.lock();
        let stored = all.entry(self.full_name()).or_default();
        for mut doc in documents {
            if !doc.contains_key("_id") {
                doc.insert("_id".into(), json!(Uuid::new_v4().to_string()));
            }
            stored.push(doc);
        }
        Ok(())
    }
}

impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    fn insert_one(&self, document: Document, _concern: WriteConcern) -> StoreResult<()> {
        self.store(vec![document])
    }

    fn insert_many(&self, documents: Vec<Document>, _concern: WriteConcern) -> StoreResult<()> {
        self.store(documents)
    }

    fn create_index(&self, field: &str, options: IndexOptions) -> StoreResult<()> {
        let mut indexes = self.cluster.indexes.lock();
        let fields = indexes.entry(self.full_name()).or_default();
        if !fields.iter().any(|(f, _)| f == field) {
            fields.push((field.to_string(), options));
        }
        Ok(())
    }
}

fn ok_reply() -> Document {
    let mut reply = Document::new();
    reply.insert("ok".into(), json!(1));
    reply
}
