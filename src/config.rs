//! # Engine Configuration
//!
//! Settings that shape how the engine registers and applies route schemas.
//! Values come from defaults, a YAML file, or `BRRTS_*` environment variables.
//!
//! ## Environment Variables
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `BRRTS_PLUGIN_NAME` | `plugin_name` | `ratify` |
//! | `BRRTS_NON_STRUCTURED_RESPONSE` | `non_structured_response` (`fail` or `skip`) | `fail` |
//! | `BRRTS_PARALLEL_COMPILE` | `parallel_compile` | `true` |
//! | `BRRTS_MAX_QUERY_ARRAY_INDEX` | `max_query_array_index` | `1000` |
//!
//! Unparseable values fall back to the default.
//!
//! ## Example
//!
//! ```yaml
//! plugin_name: ratify
//! non_structured_response: skip
//! parallel_compile: false
//! max_query_array_index: 64
//! ```

use crate::coerce::DEFAULT_MAX_QUERY_ARRAY_INDEX;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

pub const DEFAULT_PLUGIN_NAME: &str = "ratify";

/// What to do when a response with a registered schema has a body the
/// evaluator cannot inspect (a raw byte stream).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NonStructuredResponse {
    /// Treat the body as a validation failure.
    #[default]
    Fail,
    /// Skip validation for that response.
    Skip,
}

impl NonStructuredResponse {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fail" => Some(NonStructuredResponse::Fail),
            "skip" => Some(NonStructuredResponse::Skip),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Key under `settings.plugins` holding a route's validation options.
    pub plugin_name: String,
    pub non_structured_response: NonStructuredResponse,
    /// Compile registration batches on scoped worker threads.
    pub parallel_compile: bool,
    /// Highest `name[<index>]` index rebuilt into a query array.
    pub max_query_array_index: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            plugin_name: DEFAULT_PLUGIN_NAME.to_string(),
            non_structured_response: NonStructuredResponse::default(),
            parallel_compile: true,
            max_query_array_index: DEFAULT_MAX_QUERY_ARRAY_INDEX,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `BRRTS_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let plugin_name = lookup("BRRTS_PLUGIN_NAME")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.plugin_name);

        let non_structured_response = lookup("BRRTS_NON_STRUCTURED_RESPONSE")
            .and_then(|v| NonStructuredResponse::parse(&v))
            .unwrap_or(defaults.non_structured_response);

        let parallel_compile = match lookup("BRRTS_PARALLEL_COMPILE") {
            Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => defaults.parallel_compile,
            },
            None => defaults.parallel_compile,
        };

        let max_query_array_index = lookup("BRRTS_MAX_QUERY_ARRAY_INDEX")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults.max_query_array_index);

        EngineConfig {
            plugin_name,
            non_structured_response,
            parallel_compile,
            max_query_array_index,
        }
    }

    /// Load configuration from a YAML file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse engine config {}", path.display()))
    }
}
