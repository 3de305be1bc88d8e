//! Inbound log events
//!
//! The host logging framework hands the sink one [`LoggingEvent`] per emitted
//! log line. Events are immutable once built; the sink only reads them.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upper bound on the number of causes walked or serialized for one error
pub const MAX_EXCEPTION_DEPTH: usize = 32;

/// Severity of a log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Level {
    /// Parse a level from a string
    pub fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "fatal" | "critical" => Ok(Self::Fatal),
            _ => Err(Error::config(format!("Unknown level: {}", s))),
        }
    }

    /// The upper-case name written into documents
    pub fn name(&self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Self::Trace,
            tracing::Level::DEBUG => Self::Debug,
            tracing::Level::INFO => Self::Info,
            tracing::Level::WARN => Self::Warn,
            tracing::Level::ERROR => Self::Error,
        }
    }
}

/// Source location captured by the host, if it captures locations at all
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationInfo {
    /// Source file name
    pub file_name: Option<String>,
    /// Method or function name
    pub method: Option<String>,
    /// Line number within the file
    pub line_number: Option<u32>,
    /// Enclosing type or module path
    pub class_name: Option<String>,
}

impl LocationInfo {
    /// Create a location from a file and line
    pub fn new(file_name: impl Into<String>, line_number: u32) -> Self {
        Self {
            file_name: Some(file_name.into()),
            line_number: Some(line_number),
            ..Self::default()
        }
    }

    /// Set the method name
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Set the class name
    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }
}

/// An error attached to a log event, with its chain of causes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    /// Error message
    pub message: Option<String>,
    /// Component or type the error originated from
    pub source: Option<String>,
    /// Captured backtrace text
    pub stack_trace: Option<String>,
    /// The error that caused this one
    pub inner: Option<Box<ExceptionInfo>>,
}

impl ExceptionInfo {
    /// Create an exception with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Capture an error and its `source()` chain.
    ///
    /// At most [`MAX_EXCEPTION_DEPTH`] levels are captured.
    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        let mut messages = Vec::new();
        let mut current = Some(err);
        while let Some(e) = current {
            if messages.len() == MAX_EXCEPTION_DEPTH {
                break;
            }
            messages.push(e.to_string());
            current = e.source();
        }

        // Build from the innermost cause outwards
        let mut chain: Option<Box<ExceptionInfo>> = None;
        for message in messages.into_iter().rev() {
            let mut info = ExceptionInfo::new(message);
            info.inner = chain;
            chain = Some(Box::new(info));
        }

        chain.map(|b| *b).unwrap_or_default()
    }

    /// Set the source
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the stack trace
    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    /// Set the cause
    pub fn with_inner(mut self, inner: ExceptionInfo) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    /// Number of errors in the chain, including this one
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut current = self.inner.as_deref();
        while let Some(inner) = current {
            depth += 1;
            current = inner.inner.as_deref();
        }
        depth
    }
}

/// One log event as delivered by the host logging framework
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingEvent {
    /// When the event was emitted
    pub timestamp: DateTime<Utc>,
    /// Severity
    pub level: Level,
    /// Emitting thread name or id
    pub thread_name: Option<String>,
    /// Identity of the user the process runs as
    pub user_name: Option<String>,
    /// Fully rendered message text
    pub message: String,
    /// Name of the logger that emitted the event
    pub logger_name: Option<String>,
    /// Application domain or service name
    pub domain: Option<String>,
    /// Source location, when captured
    pub location: Option<LocationInfo>,
    /// Attached error chain
    pub exception: Option<ExceptionInfo>,
    /// Ambient key/value context properties
    pub properties: BTreeMap<String, String>,
}

impl LoggingEvent {
    /// Create an event stamped with the current time
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            thread_name: None,
            user_name: None,
            message: message.into(),
            logger_name: None,
            domain: None,
            location: None,
            exception: None,
            properties: BTreeMap::new(),
        }
    }

    /// Set the timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the thread name
    pub fn with_thread(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = Some(thread_name.into());
        self
    }

    /// Capture the name of the current thread
    pub fn with_current_thread(mut self) -> Self {
        let current = std::thread::current();
        self.thread_name = Some(match current.name() {
            Some(name) => name.to_string(),
            None => format!("{:?}", current.id()),
        });
        self
    }

    /// Set the user name
    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    /// Set the logger name
    pub fn with_logger_name(mut self, logger_name: impl Into<String>) -> Self {
        self.logger_name = Some(logger_name.into());
        self
    }

    /// Set the domain
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the location
    pub fn with_location(mut self, location: LocationInfo) -> Self {
        self.location = Some(location);
        self
    }

    /// Attach an error chain
    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    /// Attach a context property
    pub fn with_property(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.properties.insert(key.into(), value.to_string());
        self
    }
}
