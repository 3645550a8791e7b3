//! # Request Payloads and the File Payload Policy
//!
//! Payloads are not always JSON. A file upload arrives as a byte stream, and a
//! multipart form can mix plain fields with file parts. Streams are opaque to
//! the schema evaluator, so payload schemas that declare `type: file` are not
//! evaluated structurally. Instead the policy checks that every declared file
//! field actually carries a readable stream.
//!
//! ## Detection
//!
//! A payload schema is a file schema when either:
//!
//! - the top-level schema is `{ "type": "file" }` without `properties`
//!   (single-file payload), or
//! - one of its direct `properties` declares `{ "type": "file" }`
//!   (form payload with attachments).
//!
//! ## Failure
//!
//! Any declared file field whose value is not a readable stream fails the
//! whole payload with one fixed issue: `INVALID_TYPE`,
//! `Invalid multipart payload format`.

use crate::report::{ValidationIssue, ValidationReport, INVALID_TYPE};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

pub const INVALID_MULTIPART_MESSAGE: &str = "Invalid multipart payload format";

/// A byte stream handed over by the host, e.g. an uploaded file part.
///
/// The stream is readable while it still holds its reader. Taking the reader
/// (to consume the upload) leaves a non-readable stream behind.
pub struct FileStream {
    filename: Option<String>,
    reader: Option<Box<dyn Read + Send>>,
}

impl FileStream {
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        Self {
            filename: None,
            reader: Some(Box::new(reader)),
        }
    }

    /// A stream whose reader has already been consumed or closed.
    pub fn closed() -> Self {
        Self {
            filename: None,
            reader: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn is_readable(&self) -> bool {
        self.reader.is_some()
    }

    /// Take the underlying reader, leaving the stream closed.
    pub fn take_reader(&mut self) -> Option<Box<dyn Read + Send>> {
        self.reader.take()
    }
}

impl fmt::Debug for FileStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStream")
            .field("filename", &self.filename)
            .field("readable", &self.is_readable())
            .finish()
    }
}

/// One field of a multipart form.
#[derive(Debug)]
pub enum FormField {
    Value(Value),
    File(FileStream),
}

/// The request payload as the host parsed it.
#[derive(Debug, Default)]
pub enum RequestPayload {
    /// No body at all.
    #[default]
    Empty,
    /// A parsed body: JSON, url-encoded form fields, or multipart fields
    /// without attachments.
    Data(Value),
    /// A raw single-file body.
    Stream(FileStream),
    /// A multipart form that may carry file parts.
    Form(BTreeMap<String, FormField>),
}

impl RequestPayload {
    /// Whether the payload carries no content: no body, JSON `null`, an empty
    /// string, or an empty object.
    pub fn is_empty(&self) -> bool {
        match self {
            RequestPayload::Empty => true,
            RequestPayload::Data(Value::Null) => true,
            RequestPayload::Data(Value::String(s)) => s.is_empty(),
            RequestPayload::Data(Value::Object(map)) => map.is_empty(),
            RequestPayload::Data(_) => false,
            RequestPayload::Stream(_) => false,
            RequestPayload::Form(fields) => fields.is_empty(),
        }
    }

    /// The JSON value structural validation sees. File parts are left out of
    /// form payloads; raw streams have no JSON view.
    pub fn to_json_view(&self) -> Option<Value> {
        match self {
            RequestPayload::Empty => Some(Value::Null),
            RequestPayload::Data(value) => Some(value.clone()),
            RequestPayload::Stream(_) => None,
            RequestPayload::Form(fields) => Some(Value::Object(
                fields
                    .iter()
                    .filter_map(|(name, field)| match field {
                        FormField::Value(v) => Some((name.clone(), v.clone())),
                        FormField::File(_) => None,
                    })
                    .collect(),
            )),
        }
    }
}

/// Result of applying the file policy to a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCheck {
    /// The schema declares file content; `report` is the final answer and no
    /// structural validation should run.
    pub is_file_payload: bool,
    pub report: ValidationReport,
}

fn declares_file(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("file")
}

fn file_properties(schema: &Value) -> impl Iterator<Item = &String> {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|props| props.iter())
        .filter(|(_, prop)| declares_file(prop))
        .map(|(name, _)| name)
}

/// Whether a payload schema declares file content at the top level or in
/// one of its direct properties.
pub fn is_file_schema(schema: &Value) -> bool {
    let single = declares_file(schema) && schema.get("properties").is_none();
    single || file_properties(schema).next().is_some()
}

fn invalid_file_payload() -> ValidationReport {
    ValidationReport::invalid(vec![ValidationIssue::new(
        INVALID_TYPE,
        INVALID_MULTIPART_MESSAGE,
        "",
    )])
}

/// Apply the file policy to `payload` under `schema`.
///
/// Declared file fields that are absent from the payload are not an error;
/// requiredness of attachments is the host's concern.
pub fn check_file_payload(schema: &Value, payload: &RequestPayload) -> FileCheck {
    let mut is_file_payload = false;
    let mut has_error = false;

    if declares_file(schema) && schema.get("properties").is_none() {
        is_file_payload = true;
        if !matches!(payload, RequestPayload::Stream(stream) if stream.is_readable()) {
            has_error = true;
        }
    }

    for name in file_properties(schema) {
        is_file_payload = true;
        let readable = match payload {
            RequestPayload::Form(fields) => match fields.get(name) {
                None => true,
                Some(FormField::File(stream)) => stream.is_readable(),
                Some(FormField::Value(_)) => false,
            },
            RequestPayload::Data(Value::Object(map)) => !map.contains_key(name),
            _ => true,
        };
        if !readable {
            has_error = true;
        }
    }

    FileCheck {
        is_file_payload,
        report: if has_error {
            invalid_file_payload()
        } else {
            ValidationReport::ok()
        },
    }
}
