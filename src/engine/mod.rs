//! # Validation Engine
//!
//! The engine ties the schema cache, coercion and the file payload policy
//! together behind one validator per [`Surface`].
//!
//! ## Lifecycle
//!
//! 1. **Registration**: the host hands over its route table once, either
//!    eagerly with [`ValidationEngine::register_routes`] or lazily on the
//!    first request with [`ValidationEngine::ensure_registered`].
//! 2. **Request phase**: [`ValidationEngine::validate_request`] runs path,
//!    query, headers and payload validation in that order and stops at the
//!    first failure with a 400 [`Rejection`].
//! 3. **Response phase**: [`ValidationEngine::check_response`] applies the
//!    route's sampling and `failAction` policy to the handler's output.
//!
//! ## Validators
//!
//! Every validator looks up the compiled schema for its surface and returns
//! `{valid: true}` straight away when none is registered. Otherwise the
//! surface value is normalized and coerced in place, then evaluated.
//!
//! | Surface | Normalization | Coercion |
//! |---------|---------------|----------|
//! | path | none | primitives |
//! | query | `name[i]` keys rebuilt into arrays | primitives, scalars wrapped into arrays |
//! | headers | keys lower-cased | primitives |
//! | payload | file policy, content-type check | form content types only |
//! | response | none | none |
//!
//! Request-time failures are returned as [`ValidationReport`] data; nothing
//! in the request path panics or returns an error type.

mod pipeline;
mod response;

pub use pipeline::*;
pub use response::*;

use crate::cache::{CompiledSchema, RegistrationSummary, SchemaCache};
use crate::coerce::{coerce, coerce_map_in_place, normalize_query_arrays};
use crate::config::{EngineConfig, NonStructuredResponse};
use crate::error::RegistrationError;
use crate::payload::{check_file_payload, FormField, RequestPayload};
use crate::report::{ValidationIssue, ValidationReport, INVALID_TYPE, MISSING_CONTENT_TYPE};
use crate::route::{RouteDescriptor, RouteKey};
use crate::surface::Surface;
use rand::Rng;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info};

/// Source of uniform draws in `1..=100` used for response sampling.
pub trait SampleSource: Send + Sync {
    fn draw(&self) -> u8;
}

/// Draws from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngSampler;

impl SampleSource for ThreadRngSampler {
    fn draw(&self) -> u8 {
        rand::thread_rng().gen_range(1..=100)
    }
}

type Registration = Result<RegistrationSummary, RegistrationError>;

/// Validates requests and responses of registered routes.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct ValidationEngine {
    cache: Arc<SchemaCache>,
    config: EngineConfig,
    sampler: Arc<dyn SampleSource>,
    lazy_registration: Mutex<Option<Registration>>,
}

impl ValidationEngine {
    pub fn new(config: EngineConfig) -> Self {
        let cache = Arc::new(SchemaCache::new(config.parallel_compile));
        Self::with_cache(cache, config)
    }

    /// Build an engine around an existing cache.
    pub fn with_cache(cache: Arc<SchemaCache>, config: EngineConfig) -> Self {
        info!(
            plugin_name = %config.plugin_name,
            non_structured_response = ?config.non_structured_response,
            max_query_array_index = config.max_query_array_index,
            "Validation engine created"
        );
        Self {
            cache,
            config,
            sampler: Arc::new(ThreadRngSampler),
            lazy_registration: Mutex::new(None),
        }
    }

    /// Replace the response sampling source.
    pub fn with_sampler(mut self, sampler: Arc<dyn SampleSource>) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compile and register the schemas of `routes`. Routes already
    /// registered are skipped.
    pub fn register_routes(&self, routes: &[RouteDescriptor]) -> Registration {
        self.cache.register_routes(routes, &self.config.plugin_name)
    }

    /// Register the host's route table on first use.
    ///
    /// The first caller runs `loader` and registers its routes; concurrent
    /// callers wait for it. The outcome, success or failure, is remembered
    /// and returned to every later caller without running `loader` again.
    pub fn ensure_registered<F>(&self, loader: F) -> Registration
    where
        F: FnOnce() -> anyhow::Result<Vec<RouteDescriptor>>,
    {
        let mut slot = self
            .lazy_registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(outcome) = slot.as_ref() {
            return outcome.clone();
        }

        let outcome = match loader() {
            Ok(routes) => self.register_routes(&routes),
            Err(e) => Err(RegistrationError::RouteSource(format!("{e:#}"))),
        };
        if let Err(e) = &outcome {
            error!(error = %e, "Unable to compile and validate schemas");
        }
        *slot = Some(outcome.clone());
        outcome
    }

    /// Forget all registered routes, including a remembered lazy
    /// registration outcome.
    pub fn reset(&self) {
        let mut slot = self
            .lazy_registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = None;
        self.cache.reset();
    }

    /// Validate path parameters, coercing them in place.
    pub fn validate_path(&self, route: &RouteKey, params: &mut Map<String, Value>) -> ValidationReport {
        let Some(schema) = self.cache.get(Surface::Path, route) else {
            return ValidationReport::ok();
        };
        coerce_map_in_place(params, schema.raw(), false);
        self.finish(route, Surface::Path, evaluate_map(&schema, params))
    }

    /// Validate the query map, rebuilding `name[i]` arrays and coercing in place.
    pub fn validate_query(&self, route: &RouteKey, query: &mut Map<String, Value>) -> ValidationReport {
        let Some(schema) = self.cache.get(Surface::Query, route) else {
            return ValidationReport::ok();
        };
        normalize_query_arrays(query, self.config.max_query_array_index);
        coerce_map_in_place(query, schema.raw(), true);
        self.finish(route, Surface::Query, evaluate_map(&schema, query))
    }

    /// Validate request headers. Keys are lower-cased in place first; when two
    /// names differ only by case, the lower-case one (or else the first in map
    /// order) is kept and the other dropped.
    pub fn validate_headers(&self, route: &RouteKey, headers: &mut Map<String, Value>) -> ValidationReport {
        let Some(schema) = self.cache.get(Surface::Headers, route) else {
            return ValidationReport::ok();
        };
        lowercase_keys(headers);
        coerce_map_in_place(headers, schema.raw(), false);
        self.finish(route, Surface::Headers, evaluate_map(&schema, headers))
    }

    /// Validate the request payload.
    ///
    /// File schemas go through the file policy only. Otherwise a non-empty
    /// payload needs a content type, and form content types are coerced
    /// before evaluation. JSON bodies are evaluated as sent.
    pub fn validate_payload(
        &self,
        route: &RouteKey,
        payload: &mut RequestPayload,
        content_type: Option<&str>,
    ) -> ValidationReport {
        let Some(schema) = self.cache.get(Surface::Payload, route) else {
            return ValidationReport::ok();
        };
        if let CompiledSchema::File { raw } = schema.as_ref() {
            let check = check_file_payload(raw, payload);
            return self.finish(route, Surface::Payload, check.report);
        }

        let content_type = content_type.map(str::trim).filter(|ct| !ct.is_empty());
        if content_type.is_none() && !payload.is_empty() {
            let report = ValidationReport::invalid(vec![ValidationIssue::new(
                MISSING_CONTENT_TYPE,
                "unable to validate payload: missing content-type header and had content",
                "",
            )]);
            return self.finish(route, Surface::Payload, report);
        }
        let coerce_body = content_type.is_some_and(is_form_content_type);

        let report = match payload {
            RequestPayload::Empty => evaluate(&schema, &Value::Null),
            RequestPayload::Data(value) => {
                if coerce_body {
                    let current = std::mem::take(value);
                    *value = coerce(current, schema.raw(), false);
                }
                evaluate(&schema, value)
            }
            RequestPayload::Form(fields) => {
                let mut view: Map<String, Value> = fields
                    .iter()
                    .filter_map(|(name, field)| match field {
                        FormField::Value(v) => Some((name.clone(), v.clone())),
                        FormField::File(_) => None,
                    })
                    .collect();
                if coerce_body {
                    coerce_map_in_place(&mut view, schema.raw(), false);
                    for (name, value) in &view {
                        if let Some(FormField::Value(slot)) = fields.get_mut(name) {
                            *slot = value.clone();
                        }
                    }
                }
                evaluate(&schema, &Value::Object(view))
            }
            RequestPayload::Stream(_) => ValidationReport::invalid(vec![ValidationIssue::new(
                INVALID_TYPE,
                "payload is a byte stream but the route declares a structured schema",
                "",
            )]),
        };
        self.finish(route, Surface::Payload, report)
    }

    /// Validate a response body against the route's response schema.
    ///
    /// Structural check only; sampling, error responses and `failAction` are
    /// applied by [`check_response`](Self::check_response).
    pub fn validate_response(&self, route: &RouteKey, body: &ResponseBody) -> ValidationReport {
        let Some(schema) = self.cache.get(Surface::Response, route) else {
            return ValidationReport::ok();
        };
        let report = match body {
            ResponseBody::Value(value) => evaluate(&schema, value),
            ResponseBody::Empty => evaluate(&schema, &Value::Null),
            ResponseBody::PassThrough => ValidationReport::ok(),
            ResponseBody::Stream => match self.config.non_structured_response {
                NonStructuredResponse::Skip => ValidationReport::ok(),
                NonStructuredResponse::Fail => ValidationReport::invalid(vec![ValidationIssue::new(
                    INVALID_TYPE,
                    "response body is not a structured value",
                    "",
                )]),
            },
        };
        self.finish(route, Surface::Response, report)
    }

    /// Run the validator of one surface on a standalone JSON value.
    ///
    /// Returns the report together with the value as the validator saw it
    /// after normalization and coercion. Path, query and headers expect an
    /// object.
    pub fn validate_value(
        &self,
        surface: Surface,
        route: &RouteKey,
        value: Value,
        content_type: Option<&str>,
    ) -> (ValidationReport, Value) {
        match surface {
            Surface::Path | Surface::Query | Surface::Headers => {
                let mut map = match value {
                    Value::Object(map) => map,
                    other => {
                        let report = ValidationReport::invalid(vec![ValidationIssue::new(
                            INVALID_TYPE,
                            format!("{} parameters must be an object", surface.label()),
                            "",
                        )]);
                        return (report, other);
                    }
                };
                let report = match surface {
                    Surface::Path => self.validate_path(route, &mut map),
                    Surface::Query => self.validate_query(route, &mut map),
                    _ => self.validate_headers(route, &mut map),
                };
                (report, Value::Object(map))
            }
            Surface::Payload => {
                let mut payload = if value.is_null() {
                    RequestPayload::Empty
                } else {
                    RequestPayload::Data(value)
                };
                let report = self.validate_payload(route, &mut payload, content_type);
                let seen = payload.to_json_view().unwrap_or(Value::Null);
                (report, seen)
            }
            Surface::Response => {
                let body = ResponseBody::Value(value);
                let report = self.validate_response(route, &body);
                match body {
                    ResponseBody::Value(value) => (report, value),
                    _ => (report, Value::Null),
                }
            }
        }
    }

    fn finish(&self, route: &RouteKey, surface: Surface, report: ValidationReport) -> ValidationReport {
        if !report.valid {
            debug!(
                route = %route,
                surface = %surface,
                errors = report.issues().len(),
                "Validation failed"
            );
        }
        report
    }
}

fn evaluate(schema: &CompiledSchema, instance: &Value) -> ValidationReport {
    match schema {
        CompiledSchema::Structural { validator, .. } => {
            ValidationReport::from_errors(validator.iter_errors(instance))
        }
        CompiledSchema::File { .. } => ValidationReport::ok(),
    }
}

/// Evaluate a request section without cloning it.
fn evaluate_map(schema: &CompiledSchema, map: &mut Map<String, Value>) -> ValidationReport {
    let instance = Value::Object(std::mem::take(map));
    let report = evaluate(schema, &instance);
    if let Value::Object(restored) = instance {
        *map = restored;
    }
    report
}

/// Lower-case header names. A name already in lower case wins over its
/// case variants; otherwise the first variant in map order is kept.
fn lowercase_keys(map: &mut Map<String, Value>) {
    if map.keys().all(|k| !k.bytes().any(|b| b.is_ascii_uppercase())) {
        return;
    }
    let (mixed, mut lowered): (Map<String, Value>, Map<String, Value>) = std::mem::take(map)
        .into_iter()
        .partition(|(k, _)| k.bytes().any(|b| b.is_ascii_uppercase()));
    for (name, value) in mixed {
        let key = name.to_ascii_lowercase();
        if lowered.contains_key(&key) {
            debug!(header = %name, kept = %key, "Duplicate header name differing only by case, dropping");
            continue;
        }
        lowered.insert(key, value);
    }
    *map = lowered;
}

fn is_form_content_type(content_type: &str) -> bool {
    let lowered = content_type.to_ascii_lowercase();
    lowered.starts_with("application/x-www-form-urlencoded") || lowered.starts_with("multipart/form-data")
}
