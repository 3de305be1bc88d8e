//! Error handling for the Mongo sink
//!
//! This module provides error types and result aliases for sink operations.
//! Every error names the stage that failed so the host logging framework can
//! report misconfiguration without guessing.

use std::fmt;
use thiserror::Error;

/// The pipeline stage an error was raised from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Parsing the descriptor or constructing the store client
    Connect,
    /// Administrative sharding commands and shard key indexing
    Provision,
    /// Evaluating a configured field layout
    Format,
    /// Issuing an acknowledged insert
    Write,
    /// Validating static configuration
    Config,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Provision => write!(f, "provision"),
            Self::Format => write!(f, "format"),
            Self::Write => write!(f, "write"),
            Self::Config => write!(f, "config"),
        }
    }
}

/// Errors that can occur in sink operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The descriptor is malformed or the client could not be constructed
    #[error("connect error for {descriptor}: {message}")]
    Connection {
        descriptor: String,
        message: String,
    },

    /// An administrative sharding call failed for a reason other than "already applied"
    #[error("provision error for {target}: {message}")]
    Provisioning {
        target: String,
        message: String,
    },

    /// A configured field layout failed while building a document
    #[error("format error in field '{field}': {message}")]
    Format {
        field: String,
        message: String,
    },

    /// An acknowledged write was rejected by the store
    #[error("write error on {collection}: {message}")]
    Write {
        collection: String,
        message: String,
    },

    /// Static configuration is invalid
    #[error("config error: {0}")]
    Config(String),
}

/// Result type for sink operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new connection error
    pub fn connection(descriptor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            descriptor: descriptor.into(),
            message: message.into(),
        }
    }

    /// Create a new provisioning error
    pub fn provisioning(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provisioning {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create a new format error
    pub fn format(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Format {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new write error
    pub fn write(collection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Write {
            collection: collection.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// The stage this error was raised from
    pub fn stage(&self) -> Stage {
        match self {
            Self::Connection { .. } => Stage::Connect,
            Self::Provisioning { .. } => Stage::Provision,
            Self::Format { .. } => Stage::Format,
            Self::Write { .. } => Stage::Write,
            Self::Config(_) => Stage::Config,
        }
    }

    /// The underlying diagnostic text, without the stage prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Connection { message, .. }
            | Self::Provisioning { message, .. }
            | Self::Format { message, .. }
            | Self::Write { message, .. } => message,
            Self::Config(message) => message,
        }
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Check if this is a provisioning error
    pub fn is_provisioning_error(&self) -> bool {
        matches!(self, Self::Provisioning { .. })
    }

    /// Check if this is a format error
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::Format { .. })
    }

    /// Check if this is a write error
    pub fn is_write_error(&self) -> bool {
        matches!(self, Self::Write { .. })
    }

    /// Get a user-friendly suggestion for resolving the error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Connection { .. } => Some(
                "Check the connection string: mongodb://[user:pass@]host[:port][,host...]/[database]"
                    .to_string(),
            ),
            Self::Provisioning { .. } => Some(
                "A shard key is configured; verify the cluster is sharded or clear the shard key"
                    .to_string(),
            ),
            Self::Config(_) => Some("Review the appender configuration".to_string()),
            _ => None,
        }
    }
}
