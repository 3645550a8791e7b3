//! # brrtschema
//!
//! **brrtschema** validates the inputs and outputs of HTTP routes against
//! JSON Schemas declared per route.
//!
//! ## Overview
//!
//! A host framework hands over its route table once. Each route may declare
//! a schema for any of five surfaces: path parameters, query parameters,
//! headers, request payload and response body. The schemas are compiled
//! into a shared cache at registration time; configuration errors surface
//! then, never per request.
//!
//! At request time each surface value is normalized and coerced (strings
//! that look like numbers or booleans become numbers or booleans, scalars
//! become one-element arrays where the schema wants an array) before the
//! compiled schema evaluates it. Payloads that carry uploaded files are
//! checked by a dedicated file policy instead.
//!
//! ## Architecture
//!
//! - **[`route`]** - Route descriptors, per-route options and route table loading
//! - **[`cache`]** - Schema compilation and the concurrent compiled-schema cache
//! - **[`coerce`]** - Schema-driven type coercion and query array normalization
//! - **[`payload`]** - Request payload shapes and the file payload policy
//! - **[`engine`]** - The five validators, the request pipeline and the response policy
//! - **[`report`]** - Validation reports and error codes
//! - **[`config`]** - Engine configuration from environment variables or YAML
//! - **[`telemetry`]** - Structured logging setup
//! - **[`cli`]** - The `brrtschema` command-line interface
//!
//! ## Example
//!
//! ```rust,ignore
//! use brrtschema::{EngineConfig, RequestParts, RouteDescriptor, ValidationEngine};
//! use http::Method;
//! use serde_json::json;
//!
//! let engine = ValidationEngine::new(EngineConfig::default());
//! let route = RouteDescriptor::new(Method::GET, "/users/{id}").with_plugin(
//!     "ratify",
//!     json!({ "path": { "type": "object", "properties": { "id": { "type": "integer" } } } }),
//! );
//! engine.register_routes(&[route.clone()])?;
//!
//! let mut parts = RequestParts::default();
//! parts.params.insert("id".into(), json!("42"));
//! engine.validate_request(&route.key(), &mut parts)?;
//! assert_eq!(parts.params["id"], json!(42));
//! ```

pub mod cache;
pub mod cli;
pub mod coerce;
pub mod config;
pub mod engine;
pub mod error;
pub mod payload;
pub mod report;
pub mod route;
pub mod surface;
pub mod telemetry;

pub use cache::{CompiledSchema, RegistrationSummary, SchemaCache, SchemaKey};
pub use config::{EngineConfig, NonStructuredResponse};
pub use engine::{
    Rejection, RequestParts, ResponseBody, ResponseContext, ResponseOutcome, SampleSource,
    SkipReason, ValidationEngine,
};
pub use error::RegistrationError;
pub use payload::{FileStream, FormField, RequestPayload};
pub use report::{ValidationIssue, ValidationReport};
pub use route::{load_routes, parse_routes, RouteDescriptor, RouteKey};
pub use surface::Surface;
