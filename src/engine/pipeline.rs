use super::ValidationEngine;
use crate::payload::RequestPayload;
use crate::report::ValidationReport;
use crate::route::RouteKey;
use crate::surface::Surface;
use http::StatusCode;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::debug;

/// The request sections the pipeline validates, as the host parsed them.
///
/// Path params, query and headers are flat string maps on the way in;
/// validation coerces them in place, so the handler sees typed values
/// afterwards.
#[derive(Debug, Default)]
pub struct RequestParts {
    pub params: Map<String, Value>,
    pub query: Map<String, Value>,
    pub headers: Map<String, Value>,
    pub payload: RequestPayload,
}

impl RequestParts {
    /// The `content-type` header, matched case-insensitively.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .and_then(|(_, value)| value.as_str())
    }
}

/// A validation failure the host should turn into an error response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Rejection {
    pub status: StatusCode,
    pub surface: Surface,
    pub message: String,
    pub report: ValidationReport,
}

impl Rejection {
    pub fn new(status: StatusCode, surface: Surface, report: ValidationReport) -> Self {
        Self {
            status,
            surface,
            message: report.describe(surface),
            report,
        }
    }

    /// JSON error body: `{"error": ..., "surface": ..., "details": [...]}`.
    pub fn to_json(&self) -> Value {
        json!({
            "error": self.message,
            "surface": self.surface.as_str(),
            "details": self.report.issues(),
        })
    }
}

type SectionValidator = fn(&ValidationEngine, &RouteKey, &mut RequestParts) -> ValidationReport;

const REQUEST_VALIDATORS: [(Surface, SectionValidator); 4] = [
    (Surface::Path, validate_params),
    (Surface::Query, validate_query),
    (Surface::Headers, validate_headers),
    (Surface::Payload, validate_payload),
];

fn validate_params(engine: &ValidationEngine, route: &RouteKey, parts: &mut RequestParts) -> ValidationReport {
    engine.validate_path(route, &mut parts.params)
}

fn validate_query(engine: &ValidationEngine, route: &RouteKey, parts: &mut RequestParts) -> ValidationReport {
    engine.validate_query(route, &mut parts.query)
}

fn validate_headers(engine: &ValidationEngine, route: &RouteKey, parts: &mut RequestParts) -> ValidationReport {
    engine.validate_headers(route, &mut parts.headers)
}

fn validate_payload(engine: &ValidationEngine, route: &RouteKey, parts: &mut RequestParts) -> ValidationReport {
    let content_type = parts.content_type().map(str::to_owned);
    engine.validate_payload(route, &mut parts.payload, content_type.as_deref())
}

impl ValidationEngine {
    /// Validate path, query, headers and payload in that order.
    ///
    /// Stops at the first failing surface; later sections are left exactly
    /// as the host supplied them.
    ///
    /// # Errors
    ///
    /// A [`Rejection`] with status 400 naming the failing surface.
    pub fn validate_request(&self, route: &RouteKey, parts: &mut RequestParts) -> Result<(), Rejection> {
        for (surface, validate) in REQUEST_VALIDATORS {
            let report = validate(self, route, parts);
            if !report.valid {
                let rejection = Rejection::new(StatusCode::BAD_REQUEST, surface, report);
                debug!(route = %route, surface = %surface, message = %rejection.message, "Request rejected");
                return Err(rejection);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::route::RouteDescriptor;
    use http::Method;

    fn engine() -> (ValidationEngine, RouteKey) {
        let engine = ValidationEngine::new(EngineConfig::default());
        let route = RouteDescriptor::new(Method::POST, "/fnord/{id}").with_plugin(
            "ratify",
            json!({
                "path": { "type": "object", "properties": { "id": { "type": "integer" } } },
                "query": { "type": "object", "properties": { "limit": { "type": "integer" } } },
                "headers": { "type": "object", "properties": { "X-Version": { "type": "number" } } },
                "payload": { "type": "object", "properties": { "name": { "type": "string" } }, "required": ["name"] }
            }),
        );
        engine.register_routes(&[route.clone()]).unwrap();
        (engine, route.key())
    }

    fn parts(id: &str, limit: &str) -> RequestParts {
        RequestParts {
            params: json!({ "id": id }).as_object().cloned().unwrap(),
            query: json!({ "limit": limit }).as_object().cloned().unwrap(),
            headers: json!({ "Content-Type": "application/json", "X-Version": "2" })
                .as_object()
                .cloned()
                .unwrap(),
            payload: RequestPayload::Data(json!({ "name": "fnord" })),
        }
    }

    #[test]
    fn test_pipeline_passes_and_coerces() {
        let (engine, key) = engine();
        let mut request = parts("7", "10");
        engine.validate_request(&key, &mut request).unwrap();
        assert_eq!(request.params["id"], json!(7));
        assert_eq!(request.query["limit"], json!(10));
        assert_eq!(request.headers["x-version"], json!(2));
    }

    #[test]
    fn test_pipeline_short_circuits_on_path() {
        let (engine, key) = engine();
        let mut request = parts("abc", "10");
        let rejection = engine.validate_request(&key, &mut request).unwrap_err();
        assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
        assert_eq!(rejection.surface, Surface::Path);
        assert!(rejection.message.starts_with("Path parameters validation error:"));
        // Query was never touched.
        assert_eq!(request.query["limit"], json!("10"));
    }

    #[test]
    fn test_pipeline_reports_query_failure() {
        let (engine, key) = engine();
        let mut request = parts("1", "ten");
        let rejection = engine.validate_request(&key, &mut request).unwrap_err();
        assert_eq!(rejection.surface, Surface::Query);
        let body = rejection.to_json();
        assert_eq!(body["surface"], json!("query"));
        assert_eq!(body["details"][0]["code"], json!("INVALID_TYPE"));
        assert_eq!(body["details"][0]["path"], json!("/limit"));
    }

    #[test]
    fn test_pipeline_payload_without_content_type() {
        let (engine, key) = engine();
        let mut request = parts("1", "1");
        request.headers.remove("Content-Type");
        let rejection = engine.validate_request(&key, &mut request).unwrap_err();
        assert_eq!(rejection.surface, Surface::Payload);
        assert_eq!(rejection.report.issues()[0].code, "MISSING_CONTENT_TYPE");
    }

    #[test]
    fn test_validator_table_follows_pipeline_order() {
        assert_eq!(REQUEST_VALIDATORS.map(|(surface, _)| surface), Surface::REQUEST_PIPELINE);
    }

    #[test]
    fn test_content_type_lookup_is_case_insensitive() {
        let request = parts("1", "1");
        assert_eq!(request.content_type(), Some("application/json"));
        assert_eq!(RequestParts::default().content_type(), None);
    }
}
