//! # Validation Reports
//!
//! Every validator returns a [`ValidationReport`]. Request-time failures are
//! data, not errors: the host decides which status code a failed report maps
//! to (400 for request surfaces, 500 or a logged warning for responses).
//!
//! ## Shape
//!
//! ```json
//! { "valid": false, "errors": [ { "code": "INVALID_TYPE", "message": "...", "path": "/id" } ] }
//! ```
//!
//! `errors` is only present when `valid` is `false`, and is never empty then.
//!
//! ## Error Codes
//!
//! Evaluator errors are mapped onto stable, upper-case codes so hosts can
//! branch on them without parsing messages:
//!
//! | Code | Meaning |
//! |------|---------|
//! | `INVALID_TYPE` | value has the wrong JSON type (also used for bad file streams) |
//! | `OBJECT_MISSING_REQUIRED_PROPERTY` | a `required` property is absent |
//! | `ENUM_MISMATCH` | value not in `enum` / not equal to `const` |
//! | `MINIMUM` / `MAXIMUM` | numeric bound violated |
//! | `MIN_LENGTH` / `MAX_LENGTH` | string length bound violated |
//! | `PATTERN` | string does not match `pattern` |
//! | `OBJECT_ADDITIONAL_PROPERTIES` | unexpected property present |
//! | `ARRAY_LENGTH_SHORT` / `ARRAY_LENGTH_LONG` | array size bound violated |
//! | `INVALID_FORMAT` | `format` check failed |
//! | `MISSING_CONTENT_TYPE` | payload present without a `content-type` header |
//! | `SCHEMA_VIOLATION` | any other keyword failure |

use crate::surface::Surface;
use jsonschema::error::ValidationErrorKind;
use serde::{Deserialize, Serialize};

pub const INVALID_TYPE: &str = "INVALID_TYPE";
pub const MISSING_CONTENT_TYPE: &str = "MISSING_CONTENT_TYPE";
pub const SCHEMA_VIOLATION: &str = "SCHEMA_VIOLATION";

/// A single failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: String,
    pub message: String,
    /// JSON pointer into the validated value; empty for the root.
    pub path: String,
}

impl ValidationIssue {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        ValidationIssue {
            code: code.into(),
            message: message.into(),
            path: path.into(),
        }
    }
}

impl From<&jsonschema::ValidationError<'_>> for ValidationIssue {
    fn from(error: &jsonschema::ValidationError<'_>) -> Self {
        ValidationIssue {
            code: error_code(error.kind()).to_string(),
            message: error.to_string(),
            path: error.instance_path().to_string(),
        }
    }
}

fn error_code(kind: &ValidationErrorKind) -> &'static str {
    match kind {
        ValidationErrorKind::Type { .. } => INVALID_TYPE,
        ValidationErrorKind::Required { .. } => "OBJECT_MISSING_REQUIRED_PROPERTY",
        ValidationErrorKind::Enum { .. } | ValidationErrorKind::Constant { .. } => "ENUM_MISMATCH",
        ValidationErrorKind::Minimum { .. } | ValidationErrorKind::ExclusiveMinimum { .. } => {
            "MINIMUM"
        }
        ValidationErrorKind::Maximum { .. } | ValidationErrorKind::ExclusiveMaximum { .. } => {
            "MAXIMUM"
        }
        ValidationErrorKind::MinLength { .. } => "MIN_LENGTH",
        ValidationErrorKind::MaxLength { .. } => "MAX_LENGTH",
        ValidationErrorKind::Pattern { .. } => "PATTERN",
        ValidationErrorKind::AdditionalProperties { .. } => "OBJECT_ADDITIONAL_PROPERTIES",
        ValidationErrorKind::MinItems { .. } => "ARRAY_LENGTH_SHORT",
        ValidationErrorKind::MaxItems { .. } => "ARRAY_LENGTH_LONG",
        ValidationErrorKind::Format { .. } => "INVALID_FORMAT",
        _ => SCHEMA_VIOLATION,
    }
}

/// Outcome of validating one surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ValidationIssue>>,
}

impl ValidationReport {
    /// A passing report with no `errors` key.
    pub fn ok() -> Self {
        ValidationReport {
            valid: true,
            errors: None,
        }
    }

    /// A failing report. An empty issue list still fails, with a generic issue
    /// so that `errors` is never empty on an invalid report.
    pub fn invalid(mut issues: Vec<ValidationIssue>) -> Self {
        if issues.is_empty() {
            issues.push(ValidationIssue::new(
                SCHEMA_VIOLATION,
                "value does not match schema",
                "",
            ));
        }
        ValidationReport {
            valid: false,
            errors: Some(issues),
        }
    }

    /// Build a report from the evaluator's error iterator.
    pub fn from_errors<'a>(errors: impl Iterator<Item = jsonschema::ValidationError<'a>>) -> Self {
        let issues: Vec<ValidationIssue> = errors.map(|e| ValidationIssue::from(&e)).collect();
        if issues.is_empty() {
            ValidationReport::ok()
        } else {
            ValidationReport::invalid(issues)
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        self.errors.as_deref().unwrap_or(&[])
    }

    /// Render the host-facing message for a failed surface, e.g.
    /// `Query parameters validation error: /limit: "x" is not of type "integer"`.
    pub fn describe(&self, surface: Surface) -> String {
        let details: Vec<String> = self
            .issues()
            .iter()
            .map(|issue| {
                if issue.path.is_empty() {
                    issue.message.clone()
                } else {
                    format!("{}: {}", issue.path, issue.message)
                }
            })
            .collect();
        format!(
            "{} parameters validation error: {}",
            surface.label(),
            details.join("; ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_report_serializes_without_errors() {
        let v = serde_json::to_value(ValidationReport::ok()).unwrap();
        assert_eq!(v, json!({ "valid": true }));
    }

    #[test]
    fn test_invalid_report_never_has_empty_errors() {
        let report = ValidationReport::invalid(vec![]);
        assert!(!report.valid);
        assert_eq!(report.issues().len(), 1);
        assert_eq!(report.issues()[0].code, SCHEMA_VIOLATION);
    }

    #[test]
    fn test_from_evaluator_errors() {
        let schema = json!({
            "type": "object",
            "properties": { "id": { "type": "integer" } },
            "required": ["id", "name"]
        });
        let validator = jsonschema::validator_for(&schema).unwrap();
        let instance = json!({ "id": "abc" });
        let report = ValidationReport::from_errors(validator.iter_errors(&instance));
        assert!(!report.valid);
        let codes: Vec<&str> = report.issues().iter().map(|i| i.code.as_str()).collect();
        assert!(codes.contains(&INVALID_TYPE));
        assert!(codes.contains(&"OBJECT_MISSING_REQUIRED_PROPERTY"));
        let type_issue = report
            .issues()
            .iter()
            .find(|i| i.code == INVALID_TYPE)
            .unwrap();
        assert_eq!(type_issue.path, "/id");
    }

    #[test]
    fn test_from_no_errors_is_ok() {
        let validator = jsonschema::validator_for(&json!({ "type": "string" })).unwrap();
        let instance = json!("fine");
        assert_eq!(
            ValidationReport::from_errors(validator.iter_errors(&instance)),
            ValidationReport::ok()
        );
    }

    #[test]
    fn test_describe_prefixes_surface_label() {
        let report = ValidationReport::invalid(vec![
            ValidationIssue::new(INVALID_TYPE, "bad", "/a"),
            ValidationIssue::new(MISSING_CONTENT_TYPE, "no header", ""),
        ]);
        assert_eq!(
            report.describe(Surface::Query),
            "Query parameters validation error: /a: bad; no header"
        );
    }
}
