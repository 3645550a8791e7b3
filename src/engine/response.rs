use super::{Rejection, ValidationEngine};
use crate::config::NonStructuredResponse;
use crate::report::ValidationReport;
use crate::route::{FailAction, RouteKey, SampleRate};
use crate::surface::Surface;
use http::StatusCode;
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

/// What the handler produced, as far as schema validation can see it.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// A structured body (object, array, string or other JSON value).
    Value(Value),
    /// A raw byte stream the evaluator cannot inspect.
    Stream,
    /// A cached or pass-through artifact that is served as stored.
    PassThrough,
    /// No body.
    Empty,
}

/// The handler's response plus what the host knows about it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseContext {
    pub body: ResponseBody,
    /// The response is already an error generated by the host framework.
    pub is_error: bool,
}

impl ResponseContext {
    pub fn new(body: ResponseBody) -> Self {
        Self { body, is_error: false }
    }

    pub fn error(body: ResponseBody) -> Self {
        Self { body, is_error: true }
    }
}

/// Why a response was not validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The route registers no response schema.
    NoSchema,
    /// `sample` is `0` or `false`.
    SamplingDisabled,
    /// The sampling draw exceeded the configured rate.
    NotSampled,
    /// The response is already a framework error.
    ErrorResponse,
    PassThrough,
    /// A stream body under the `skip` policy for non-structured responses.
    NonStructured,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::NoSchema => "no_schema",
            SkipReason::SamplingDisabled => "sampling_disabled",
            SkipReason::NotSampled => "not_sampled",
            SkipReason::ErrorResponse => "error_response",
            SkipReason::PassThrough => "pass_through",
            SkipReason::NonStructured => "non_structured",
        })
    }
}

/// Result of the response phase when the response may proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    Passed,
    Skipped(SkipReason),
    /// Validation failed under `failAction: log`; the response goes out
    /// unmodified.
    Logged(ValidationReport),
}

impl ValidationEngine {
    /// Apply the route's response policy to a handler response.
    ///
    /// Order of checks: registered schema, sampling, framework error,
    /// pass-through body, then structural validation. Sampling is
    /// probabilistic: with `sample: 25`, roughly a quarter of responses are
    /// validated and which ones is not deterministic.
    ///
    /// # Errors
    ///
    /// A [`Rejection`] with status 500 when validation fails and the route's
    /// `failAction` is anything but `log`.
    pub fn check_response(
        &self,
        route: &RouteKey,
        response: &ResponseContext,
    ) -> Result<ResponseOutcome, Rejection> {
        if self.cache().get(Surface::Response, route).is_none() {
            return Ok(ResponseOutcome::Skipped(SkipReason::NoSchema));
        }
        let policy = self.cache().response_policy(route).unwrap_or_default();

        match policy.sample {
            SampleRate::Never => return Ok(ResponseOutcome::Skipped(SkipReason::SamplingDisabled)),
            SampleRate::Percent(rate) => {
                let draw = self.sampler.draw();
                if draw > rate {
                    debug!(route = %route, draw, rate, "Response not sampled for validation");
                    return Ok(ResponseOutcome::Skipped(SkipReason::NotSampled));
                }
            }
            SampleRate::Always => {}
        }

        if response.is_error {
            return Ok(ResponseOutcome::Skipped(SkipReason::ErrorResponse));
        }
        match response.body {
            ResponseBody::PassThrough => return Ok(ResponseOutcome::Skipped(SkipReason::PassThrough)),
            ResponseBody::Stream if self.config().non_structured_response == NonStructuredResponse::Skip => {
                return Ok(ResponseOutcome::Skipped(SkipReason::NonStructured));
            }
            _ => {}
        }

        let report = self.validate_response(route, &response.body);
        if report.valid {
            return Ok(ResponseOutcome::Passed);
        }

        match policy.fail_action {
            FailAction::Log => {
                warn!(
                    route = %route,
                    errors = report.issues().len(),
                    message = %report.describe(Surface::Response),
                    "Response validation failed, response sent unmodified"
                );
                Ok(ResponseOutcome::Logged(report))
            }
            FailAction::Error => Err(Rejection::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                Surface::Response,
                report,
            )),
        }
    }
}
