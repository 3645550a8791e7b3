#![allow(dead_code)]

//! Shared route fixtures for integration tests.

use brrtschema::{RouteDescriptor, RouteKey};
use http::Method;
use serde_json::{json, Map, Value};

pub const PLUGIN: &str = "ratify";

pub fn string_schema() -> Value {
    json!({ "type": "string", "minLength": 1 })
}

pub fn number_schema() -> Value {
    json!({ "type": "number", "minimum": 1 })
}

pub fn number_array_schema() -> Value {
    json!({ "type": "array", "items": number_schema() })
}

pub fn object_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "string": string_schema(),
            "numberArray": number_array_schema()
        }
    })
}

/// A route with a schema on every surface.
pub fn full_route() -> RouteDescriptor {
    RouteDescriptor::new(Method::POST, "/fnord/{string}/{number}").with_plugin(
        PLUGIN,
        json!({
            "path": {
                "type": "object",
                "properties": { "string": string_schema(), "number": number_schema() },
                "required": ["string", "number"]
            },
            "query": {
                "type": "object",
                "properties": {
                    "array": { "type": "array", "items": string_schema() },
                    "string": string_schema(),
                    "bool": { "type": "boolean" }
                }
            },
            "headers": {
                "type": "object",
                "properties": { "string": string_schema(), "Number": number_schema() }
            },
            "payload": object_schema(),
            "response": { "schema": object_schema() }
        }),
    )
}

/// Options under an unknown key only; registers with no schemas.
pub fn unknown_key_route() -> RouteDescriptor {
    RouteDescriptor::new(Method::POST, "/bad/fnord/{string}/{number}")
        .with_plugin(PLUGIN, json!({ "fake": object_schema() }))
}

/// A malformed header schema.
pub fn broken_route() -> RouteDescriptor {
    RouteDescriptor::new(Method::POST, "/yet/another/bad/fnord/{string}/{number}")
        .with_plugin(PLUGIN, json!({ "headers": { "type": "fnord", "items": 5 } }))
}

/// A response-only route with a string schema.
pub fn string_response_route() -> RouteDescriptor {
    RouteDescriptor::new(Method::POST, "/good/fnord/{string}/{number}")
        .with_plugin(PLUGIN, json!({ "response": { "schema": string_schema() } }))
}

/// A single-file upload.
pub fn file_route() -> RouteDescriptor {
    RouteDescriptor::new(Method::POST, "/good/fnord")
        .with_plugin(PLUGIN, json!({ "payload": { "type": "file" } }))
}

/// A payload that may be absent.
pub fn nullable_payload_route() -> RouteDescriptor {
    RouteDescriptor::new(Method::POST, "/good/fnord/allow/empty/body")
        .with_plugin(PLUGIN, json!({ "payload": { "type": ["object", "null"] } }))
}

/// A multipart form with one file part.
pub fn form_upload_route() -> RouteDescriptor {
    RouteDescriptor::new(Method::POST, "/good/fnord/form").with_plugin(
        PLUGIN,
        json!({
            "payload": {
                "type": "file",
                "properties": {
                    "users": { "type": "file" },
                    "numberArray": number_array_schema()
                }
            }
        }),
    )
}

pub fn mock_routes() -> Vec<RouteDescriptor> {
    vec![full_route(), unknown_key_route(), string_response_route()]
}

pub fn full_key() -> RouteKey {
    full_route().key()
}

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture is not an object: {other}"),
    }
}

pub mod temp_files {
    use std::io::Write;

    /// Write `content` to a temporary file with the given extension.
    pub fn route_table(content: &str, ext: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("brrtschema_routes_")
            .suffix(&format!(".{ext}"))
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }
}

pub mod tracing_capture {
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tracing::Level;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Collects formatted events on the current thread while alive.
    pub struct CapturedLogs {
        buffer: SharedBuffer,
        _guard: tracing::subscriber::DefaultGuard,
    }

    impl CapturedLogs {
        pub fn init(level: Level) -> Self {
            let buffer = SharedBuffer::default();
            let writer = buffer.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(move || writer.clone())
                .finish();
            let guard = tracing::subscriber::set_default(subscriber);
            Self {
                buffer,
                _guard: guard,
            }
        }

        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.buffer.0.lock().unwrap()).into_owned()
        }
    }
}
