//! Field layouts for custom document schemas
//!
//! A [`FieldSpec`] pairs a document field name with a [`Layout`], the rule
//! that extracts a value from a [`LoggingEvent`]. When any field specs are
//! configured they replace the default document schema entirely.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::builder::machine_name;
use crate::document::{date_value, string_or_empty, string_or_null};
use crate::error::{Error, Result};
use crate::event::LoggingEvent;
use crate::exception::serialize_exception;

/// Error type a layout may fail with
pub type LayoutError = Box<dyn std::error::Error + Send + Sync>;

/// Result of evaluating a layout
pub type LayoutResult = std::result::Result<Value, LayoutError>;

/// Rule that turns a log event into a single field value
pub trait Layout: Send + Sync {
    /// Evaluate the layout against an event
    fn format(&self, event: &LoggingEvent) -> LayoutResult;
}

impl<F> Layout for F
where
    F: Fn(&LoggingEvent) -> LayoutResult + Send + Sync,
{
    fn format(&self, event: &LoggingEvent) -> LayoutResult {
        self(event)
    }
}

/// Built-in layouts reading one attribute of the event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventField {
    Timestamp,
    Level,
    Thread,
    UserName,
    Message,
    LoggerName,
    Domain,
    MachineName,
    FileName,
    Method,
    LineNumber,
    ClassName,
    /// The serialized exception chain, or null
    Exception,
    /// One context property by key, or null when missing
    Property(String),
    /// A constant string
    Literal(String),
}

impl EventField {
    /// Parse a field source such as `message` or `property:request_id`
    pub fn from_str(s: &str) -> Result<Self> {
        if let Some(key) = s.strip_prefix("property:") {
            if key.is_empty() {
                return Err(Error::config("Property field source needs a key"));
            }
            return Ok(Self::Property(key.to_string()));
        }
        if let Some(text) = s.strip_prefix("literal:") {
            return Ok(Self::Literal(text.to_string()));
        }

        match s.trim().to_lowercase().as_str() {
            "timestamp" | "date" => Ok(Self::Timestamp),
            "level" => Ok(Self::Level),
            "thread" => Ok(Self::Thread),
            "user_name" | "username" => Ok(Self::UserName),
            "message" => Ok(Self::Message),
            "logger_name" | "logger" => Ok(Self::LoggerName),
            "domain" => Ok(Self::Domain),
            "machine_name" | "host" => Ok(Self::MachineName),
            "file_name" | "file" => Ok(Self::FileName),
            "method" => Ok(Self::Method),
            "line_number" | "line" => Ok(Self::LineNumber),
            "class_name" | "class" => Ok(Self::ClassName),
            "exception" => Ok(Self::Exception),
            _ => Err(Error::config(format!("Unknown field source: {}", s))),
        }
    }
}

impl fmt::Display for EventField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timestamp => write!(f, "timestamp"),
            Self::Level => write!(f, "level"),
            Self::Thread => write!(f, "thread"),
            Self::UserName => write!(f, "user_name"),
            Self::Message => write!(f, "message"),
            Self::LoggerName => write!(f, "logger_name"),
            Self::Domain => write!(f, "domain"),
            Self::MachineName => write!(f, "machine_name"),
            Self::FileName => write!(f, "file_name"),
            Self::Method => write!(f, "method"),
            Self::LineNumber => write!(f, "line_number"),
            Self::ClassName => write!(f, "class_name"),
            Self::Exception => write!(f, "exception"),
            Self::Property(key) => write!(f, "property:{}", key),
            Self::Literal(text) => write!(f, "literal:{}", text),
        }
    }
}

impl Layout for EventField {
    fn format(&self, event: &LoggingEvent) -> LayoutResult {
        let location = event.location.as_ref();
        let value = match self {
            Self::Timestamp => date_value(&event.timestamp),
            Self::Level => Value::String(event.level.to_string()),
            Self::Thread => string_or_empty(event.thread_name.as_deref()),
            Self::UserName => string_or_null(event.user_name.as_deref()),
            Self::Message => Value::String(event.message.clone()),
            Self::LoggerName => string_or_empty(event.logger_name.as_deref()),
            Self::Domain => string_or_empty(event.domain.as_deref()),
            Self::MachineName => Value::String(machine_name().to_string()),
            Self::FileName => string_or_null(location.and_then(|l| l.file_name.as_deref())),
            Self::Method => string_or_null(location.and_then(|l| l.method.as_deref())),
            Self::LineNumber => location
                .and_then(|l| l.line_number)
                .map_or(Value::Null, Value::from),
            Self::ClassName => string_or_null(location.and_then(|l| l.class_name.as_deref())),
            Self::Exception => event
                .exception
                .as_ref()
                .map_or(Value::Null, |e| Value::Object(serialize_exception(e))),
            Self::Property(key) => string_or_null(event.properties.get(key).map(String::as_str)),
            Self::Literal(text) => Value::String(text.clone()),
        };
        Ok(value)
    }
}

/// A named field and the layout that produces its value
#[derive(Clone, Deserialize)]
#[serde(try_from = "FieldSpecDef")]
pub struct FieldSpec {
    /// Document field name
    pub name: String,
    /// Value extraction rule
    pub layout: Arc<dyn Layout>,
    /// Built-in source, when the layout is an [`EventField`]
    source: Option<EventField>,
}

impl FieldSpec {
    /// Create a field backed by a built-in event attribute
    pub fn event(name: impl Into<String>, field: EventField) -> Self {
        Self {
            name: name.into(),
            layout: Arc::new(field.clone()),
            source: Some(field),
        }
    }

    /// Create a field backed by any layout, including closures
    pub fn custom<L: Layout + 'static>(name: impl Into<String>, layout: L) -> Self {
        Self {
            name: name.into(),
            layout: Arc::new(layout),
            source: None,
        }
    }

    /// Built-in source of this field, if any
    pub fn source(&self) -> Option<&EventField> {
        self.source.as_ref()
    }

    /// Evaluate this field against an event
    pub fn format(&self, event: &LoggingEvent) -> Result<Value> {
        self.layout
            .format(event)
            .map_err(|e| Error::format(&self.name, e.to_string()))
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            Some(field) => field.to_string(),
            None => "<custom>".to_string(),
        };
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("source", &source)
            .finish()
    }
}

/// On-disk form of a field spec: `{ name = "...", source = "..." }`
#[derive(Deserialize)]
struct FieldSpecDef {
    name: String,
    source: String,
}

impl TryFrom<FieldSpecDef> for FieldSpec {
    type Error = Error;

    fn try_from(def: FieldSpecDef) -> Result<Self> {
        Ok(FieldSpec::event(def.name, EventField::from_str(&def.source)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ExceptionInfo, Level, LocationInfo};
    use serde_json::json;

    fn event() -> LoggingEvent {
        LoggingEvent::new(Level::Warn, "disk almost full")
            .with_logger_name("app.Disk")
            .with_property("volume", "/var")
            .with_location(LocationInfo::new("disk.rs", 12))
    }

    #[test]
    fn test_event_field_parsing() {
        assert_eq!(EventField::from_str("message").unwrap(), EventField::Message);
        assert_eq!(EventField::from_str("logger").unwrap(), EventField::LoggerName);
        assert_eq!(
            EventField::from_str("property:volume").unwrap(),
            EventField::Property("volume".into())
        );
        assert_eq!(
            EventField::from_str("literal:svc-a").unwrap(),
            EventField::Literal("svc-a".into())
        );
        assert!(EventField::from_str("property:").is_err());
        assert!(EventField::from_str("nonsense").is_err());
    }

    #[test]
    fn test_event_field_display_parses_back() {
        for field in [EventField::UserName, EventField::Property("k".into())] {
            assert_eq!(EventField::from_str(&field.to_string()).unwrap(), field);
        }
    }

    #[test]
    fn test_event_field_values() {
        let event = event();
        assert_eq!(EventField::Level.format(&event).unwrap(), json!("WARN"));
        assert_eq!(EventField::Message.format(&event).unwrap(), json!("disk almost full"));
        assert_eq!(EventField::Property("volume".into()).format(&event).unwrap(), json!("/var"));
        assert_eq!(EventField::Property("missing".into()).format(&event).unwrap(), Value::Null);
        assert_eq!(EventField::LineNumber.format(&event).unwrap(), json!(12));
        assert_eq!(EventField::Exception.format(&event).unwrap(), Value::Null);

        let with_error = event.with_exception(ExceptionInfo::new("EIO"));
        let value = EventField::Exception.format(&with_error).unwrap();
        assert_eq!(value["message"], json!("EIO"));
    }

    #[test]
    fn test_closure_layout_error_names_field() {
        let spec = FieldSpec::custom("ratio", |_: &LoggingEvent| -> LayoutResult {
            Err("division by zero".into())
        });

        let err = spec.format(&event()).unwrap_err();
        assert!(err.is_format_error());
        assert!(err.to_string().contains("ratio"));
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn test_field_spec_deserialize() {
        let spec: FieldSpec =
            serde_json::from_value(json!({"name": "lvl", "source": "level"})).unwrap();
        assert_eq!(spec.name, "lvl");
        assert_eq!(spec.source(), Some(&EventField::Level));

        let bad = serde_json::from_value::<FieldSpec>(json!({"name": "x", "source": "??"}));
        assert!(bad.is_err());
    }
}
