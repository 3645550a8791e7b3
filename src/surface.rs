//! Validation surfaces.
//!
//! A surface is one part of an HTTP exchange that can carry a schema: path
//! parameters, the query string, request headers, the request payload, or the
//! response body. Every cache key and every validator is addressed by one of
//! these five variants, so the set is closed.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One of the five validation targets of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Surface {
    Path,
    Query,
    Headers,
    Payload,
    Response,
}

impl Surface {
    /// All surfaces, in registration order.
    pub const ALL: [Surface; 5] = [
        Surface::Path,
        Surface::Query,
        Surface::Headers,
        Surface::Payload,
        Surface::Response,
    ];

    /// Request-phase surfaces in the order the pipeline evaluates them.
    ///
    /// The order matters: a failure on an earlier surface short-circuits the
    /// later ones.
    pub const REQUEST_PIPELINE: [Surface; 4] = [
        Surface::Path,
        Surface::Query,
        Surface::Headers,
        Surface::Payload,
    ];

    /// Key used in route settings and cache keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Surface::Path => "path",
            Surface::Query => "query",
            Surface::Headers => "headers",
            Surface::Payload => "payload",
            Surface::Response => "response",
        }
    }

    /// Capitalized name used as the prefix of host-facing error messages.
    pub fn label(self) -> &'static str {
        match self {
            Surface::Path => "Path",
            Surface::Query => "Query",
            Surface::Headers => "Headers",
            Surface::Payload => "Payload",
            Surface::Response => "Response",
        }
    }

    /// Whether the surface belongs to the request phase.
    pub fn is_request(self) -> bool {
        !matches!(self, Surface::Response)
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a validation surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown validation surface '{0}' (expected path, query, headers, payload or response)")]
pub struct SurfaceParseError(pub String);

impl FromStr for Surface {
    type Err = SurfaceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "path" => Ok(Surface::Path),
            "query" => Ok(Surface::Query),
            "headers" => Ok(Surface::Headers),
            "payload" => Ok(Surface::Payload),
            "response" => Ok(Surface::Response),
            _ => Err(SurfaceParseError(s.to_string())),
        }
    }
}
