//! Exception serialization
//!
//! Flattens an [`ExceptionInfo`] chain into nested documents:
//! `{message, source, stackTrace, innerException: {...}}`.

use serde_json::Value;

use crate::document::{string_or_empty, string_or_null, Document};
use crate::event::{ExceptionInfo, MAX_EXCEPTION_DEPTH};

/// Serialize an error chain into a document.
///
/// Nesting stops after [`MAX_EXCEPTION_DEPTH`] levels.
pub fn serialize_exception(exception: &ExceptionInfo) -> Document {
    serialize_bounded(exception, MAX_EXCEPTION_DEPTH)
}

fn serialize_bounded(exception: &ExceptionInfo, remaining: usize) -> Document {
    let mut doc = Document::new();
    doc.insert("message".into(), string_or_empty(exception.message.as_deref()));
    doc.insert("source".into(), string_or_null(exception.source.as_deref()));
    doc.insert("stackTrace".into(), string_or_null(exception.stack_trace.as_deref()));

    if let Some(inner) = exception.inner.as_deref() {
        if remaining > 1 {
            doc.insert(
                "innerException".into(),
                Value::Object(serialize_bounded(inner, remaining - 1)),
            );
        }
    }

    doc
}
