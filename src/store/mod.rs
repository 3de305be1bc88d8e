//! Document store client boundary
//!
//! The sink talks to the backing cluster only through these traits. A driver
//! adapter implements them; [`memory::MemoryStore`] implements them in-process.

pub mod memory;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::descriptor::ConnectionDescriptor;
use crate::document::Document;

pub use memory::MemoryStore;

/// Failure reported by the store client, with its diagnostic text verbatim
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct StoreError {
    /// Server error code, when the server sent one
    pub code: Option<i32>,
    /// Diagnostic text
    pub message: String,
}

impl StoreError {
    /// Create an error without a code
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Create an error carrying a server code
    pub fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

/// Result type for store client calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Durability requested for an insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteConcern {
    /// Fire-and-forget; failures are not reported to the caller
    #[default]
    Unacknowledged,
    /// Wait for the primary to acknowledge the write
    Acknowledged,
}

impl fmt::Display for WriteConcern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unacknowledged => write!(f, "unacknowledged"),
            Self::Acknowledged => write!(f, "acknowledged"),
        }
    }
}

impl WriteConcern {
    /// Whether the caller observes write failures
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, Self::Acknowledged)
    }
}

/// Options for index creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexOptions {
    /// Build the index without blocking other operations
    pub background: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self { background: true }
    }
}

/// Entry point of a store client
pub trait DocumentStore: Send + Sync {
    /// Construct a handle to the database a descriptor names.
    ///
    /// Construction may be lazy; it need not reach the network.
    fn connect(&self, descriptor: &ConnectionDescriptor) -> StoreResult<Arc<dyn Database>>;
}

/// A live logical database
pub trait Database: Send + Sync {
    /// Database name
    fn name(&self) -> &str;

    /// Handle to a collection; cheap and never fails
    fn collection(&self, name: &str) -> Arc<dyn Collection>;

    /// Run a command against the cluster's `admin` database
    fn run_admin_command(&self, command: Document) -> StoreResult<Document>;
}

/// A named collection within a database
pub trait Collection: Send + Sync {
    /// Collection name
    fn name(&self) -> &str;

    /// Name of the owning database
    fn database_name(&self) -> &str;

    /// Namespace in `database.collection` form
    fn full_name(&self) -> String {
        format!("{}.{}", self.database_name(), self.name())
    }

    /// Insert one document
    fn insert_one(&self, document: Document, concern: WriteConcern) -> StoreResult<()>;

    /// Insert a batch of documents in one call
    fn insert_many(&self, documents: Vec<Document>, concern: WriteConcern) -> StoreResult<()>;

    /// Create an ascending single-field index
    fn create_index(&self, field: &str, options: IndexOptions) -> StoreResult<()>;
}
