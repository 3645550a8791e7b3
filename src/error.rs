//! Configuration errors raised while registering a route table.
//!
//! These are operator mistakes found at startup. They are never produced by
//! request validation, which reports failures as
//! [`ValidationReport`](crate::report::ValidationReport) data instead.

use crate::surface::Surface;
use http::Method;
use thiserror::Error;

/// Why a route table could not be registered.
///
/// Cloneable so a failed lazy registration can be memoized and handed to
/// every later caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A declared schema is not a well-formed JSON Schema.
    #[error("Failed to validate schema for route: {path}, method: {method}, type: {surface}: {reason}")]
    InvalidSchema {
        path: String,
        method: Method,
        surface: Surface,
        reason: String,
    },

    /// The plugin entry on a route does not have the shape of validation options.
    #[error("Malformed validation options for route: {path}, method: {method}: {reason}")]
    MalformedOptions {
        path: String,
        method: Method,
        reason: String,
    },

    /// A compile worker thread panicked; the batch is abandoned.
    #[error("schema compile worker panicked")]
    WorkerPanicked,

    /// The host-supplied route source failed before any schema was compiled.
    #[error("failed to load route table: {0}")]
    RouteSource(String),
}

impl RegistrationError {
    /// The surface a schema error points at, if any.
    pub fn surface(&self) -> Option<Surface> {
        match self {
            RegistrationError::InvalidSchema { surface, .. } => Some(*surface),
            _ => None,
        }
    }
}
