//! Document building
//!
//! Converts log events into documents, either with the fixed default schema
//! or with a configured list of [`FieldSpec`]s.

use std::sync::OnceLock;

use serde_json::Value;

use crate::document::{date_value, string_or_empty, string_or_null, Document};
use crate::error::Result;
use crate::event::LoggingEvent;
use crate::exception::serialize_exception;
use crate::layout::FieldSpec;

/// Host name of this machine, resolved once per process
pub fn machine_name() -> &'static str {
    static MACHINE_NAME: OnceLock<String> = OnceLock::new();
    MACHINE_NAME.get_or_init(|| {
        hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_default()
    })
}

/// Builds one document per log event
#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder {
    fields: Vec<FieldSpec>,
}

impl DocumentBuilder {
    /// Create a builder; an empty field list selects the default schema
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Whether configured fields replace the default schema
    pub fn is_custom(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Configured fields, in declaration order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Build the document for one event.
    ///
    /// Returns `Ok(None)` when there is no event.
    pub fn build(&self, event: Option<&LoggingEvent>) -> Result<Option<Document>> {
        let Some(event) = event else {
            return Ok(None);
        };

        if self.is_custom() {
            self.build_custom(event).map(Some)
        } else {
            Ok(Some(build_default(event)))
        }
    }

    fn build_custom(&self, event: &LoggingEvent) -> Result<Document> {
        let mut doc = Document::new();
        for field in &self.fields {
            let value = field.format(event)?;
            doc.insert(field.name.clone(), value);
        }
        Ok(doc)
    }
}

/// Build a document with the default schema
fn build_default(event: &LoggingEvent) -> Document {
    let mut doc = Document::new();
    doc.insert("timestamp".into(), date_value(&event.timestamp));
    doc.insert("level".into(), Value::String(event.level.to_string()));
    doc.insert("thread".into(), string_or_empty(event.thread_name.as_deref()));
    doc.insert("userName".into(), string_or_null(event.user_name.as_deref()));
    doc.insert("message".into(), Value::String(event.message.clone()));
    doc.insert("loggerName".into(), string_or_empty(event.logger_name.as_deref()));
    doc.insert("domain".into(), string_or_empty(event.domain.as_deref()));
    doc.insert("machineName".into(), Value::String(machine_name().to_string()));

    // Location block, only when the host captured one
    if let Some(location) = &event.location {
        doc.insert("fileName".into(), string_or_null(location.file_name.as_deref()));
        doc.insert("method".into(), string_or_empty(location.method.as_deref()));
        doc.insert(
            "lineNumber".into(),
            location.line_number.map_or(Value::Null, Value::from),
        );
        doc.insert("className".into(), string_or_empty(location.class_name.as_deref()));
    }

    if let Some(exception) = &event.exception {
        doc.insert("exception".into(), Value::Object(serialize_exception(exception)));
    }

    if !event.properties.is_empty() {
        let properties: Document = event
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        doc.insert("properties".into(), Value::Object(properties));
    }

    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ExceptionInfo, Level, LocationInfo};
    use crate::layout::{EventField, LayoutResult};
    use serde_json::json;

    fn keys(doc: &Document) -> Vec<&str> {
        doc.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_default_schema_minimal_event() -> Result<()> {
        let event = LoggingEvent::new(Level::Info, "hello").with_logger_name("app.Foo");
        let doc = DocumentBuilder::default().build(Some(&event))?.unwrap();

        assert_eq!(
            keys(&doc),
            vec![
                "timestamp",
                "level",
                "thread",
                "userName",
                "message",
                "loggerName",
                "domain",
                "machineName"
            ]
        );
        assert_eq!(doc["message"], json!("hello"));
        assert_eq!(doc["level"], json!("INFO"));
        assert_eq!(doc["loggerName"], json!("app.Foo"));
        assert_eq!(doc["thread"], json!(""));
        assert_eq!(doc["timestamp"], json!(event.timestamp.timestamp_millis()));
        Ok(())
    }

    #[test]
    fn test_default_schema_optional_blocks() -> Result<()> {
        let event = LoggingEvent::new(Level::Error, "failed")
            .with_location(LocationInfo::new("db.rs", 88).with_method("connect"))
            .with_exception(ExceptionInfo::new("timeout"))
            .with_property("tenant", "acme");
        let doc = DocumentBuilder::default().build(Some(&event))?.unwrap();

        assert_eq!(doc["fileName"], json!("db.rs"));
        assert_eq!(doc["method"], json!("connect"));
        assert_eq!(doc["lineNumber"], json!(88));
        assert_eq!(doc["className"], json!(""));
        assert_eq!(doc["exception"]["message"], json!("timeout"));
        assert_eq!(doc["properties"], json!({"tenant": "acme"}));
        assert_eq!(keys(&doc).last(), Some(&"properties"));
        Ok(())
    }

    #[test]
    fn test_machine_name_matches_host() {
        let expected = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_default();
        assert_eq!(machine_name(), expected);
        assert!(std::ptr::eq(machine_name(), machine_name()));
    }

    #[test]
    fn test_missing_event_builds_nothing() -> Result<()> {
        assert!(DocumentBuilder::default().build(None)?.is_none());
        let custom = DocumentBuilder::new(vec![FieldSpec::event("m", EventField::Message)]);
        assert!(custom.build(None)?.is_none());
        Ok(())
    }

    #[test]
    fn test_custom_schema_is_exclusive_and_ordered() -> Result<()> {
        let builder = DocumentBuilder::new(vec![
            FieldSpec::event("msg", EventField::Message),
            FieldSpec::event("lvl", EventField::Level),
            FieldSpec::event("svc", EventField::Literal("billing".into())),
        ]);
        let event = LoggingEvent::new(Level::Debug, "tick")
            .with_exception(ExceptionInfo::new("ignored"))
            .with_property("k", "v");

        let doc = builder.build(Some(&event))?.unwrap();
        assert_eq!(keys(&doc), vec!["msg", "lvl", "svc"]);
        assert_eq!(doc["svc"], json!("billing"));
        Ok(())
    }

    #[test]
    fn test_custom_field_failure_is_reported() {
        let builder = DocumentBuilder::new(vec![
            FieldSpec::event("msg", EventField::Message),
            FieldSpec::custom("bad", |_: &LoggingEvent| -> LayoutResult { Err("nope".into()) }),
        ]);

        let err = builder
            .build(Some(&LoggingEvent::new(Level::Info, "x")))
            .unwrap_err();
        assert!(err.is_format_error());
    }
}
