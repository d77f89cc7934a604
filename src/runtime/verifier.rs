//! Response verification against the manifest contract.
//!
//! A variant's `parameters` block is treated as the exhaustive list of
//! properties the response body may carry: the generated schema sets
//! `additionalProperties: false`, so any undeclared field is a violation.

use crate::error::{ValidationFailure, Violation};
use crate::manifest::Manifest;
use crate::runtime::response::Response;
use crate::{HarnessError, Result};
use jsonschema::error::ValidationErrorKind;
use jsonschema::{JSONSchema, ValidationError};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Checks responses of any endpoint of one socket.
#[derive(Debug, Clone)]
pub struct ResponseVerifier {
    manifest: Arc<Manifest>,
}

impl ResponseVerifier {
    pub fn new(manifest: Arc<Manifest>) -> Self {
        Self { manifest }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// The JSON Schema a response body of `endpoint`/`variant` must satisfy.
    pub fn schema_for(&self, endpoint: &str, variant: &str) -> Result<Value> {
        let declared = self.manifest.variant(endpoint, variant)?;
        Ok(json!({
            "type": "object",
            "properties": Value::Object(declared.parameters.clone()),
            "additionalProperties": false,
        }))
    }

    /// Verify `response` against the contract of `endpoint`/`variant`.
    ///
    /// Exit code and content type are checked first and fail fast. Schema
    /// violations are collected and reported together.
    pub fn verify<'r>(
        &self,
        endpoint: &str,
        variant: &str,
        response: &'r Response,
    ) -> Result<&'r Response> {
        let expected_code = self.manifest.expected_exit_code(endpoint, variant)?;
        let expected_mimetype = self.manifest.expected_mimetype(endpoint)?;

        if response.code != expected_code {
            warn!(endpoint, variant, expected_code, actual = response.code, "Exit code mismatch");
            return Err(HarnessError::WrongExitCode {
                expected: expected_code,
                actual: response.code,
            });
        }

        if response.mimetype != expected_mimetype {
            warn!(endpoint, variant, expected_mimetype, actual = %response.mimetype, "Mimetype mismatch");
            return Err(HarnessError::WrongMimetype {
                expected: expected_mimetype.to_string(),
                actual: response.mimetype.clone(),
            });
        }

        let schema = self.schema_for(endpoint, variant)?;
        let compiled = JSONSchema::compile(&schema).map_err(|e| HarnessError::InvalidSchema {
            endpoint: endpoint.to_string(),
            variant: variant.to_string(),
            message: e.to_string(),
        })?;

        let instance = response.data.to_json();
        let violations: Vec<Violation> = match compiled.validate(&instance) {
            Ok(()) => {
                debug!(endpoint, variant, "Response matches contract");
                return Ok(response);
            }
            Err(errors) => errors
                .flat_map(|error| violations_from(&schema, error))
                .collect(),
        };

        warn!(endpoint, variant, violations = violations.len(), "Response violates contract");
        Err(HarnessError::Validation(ValidationFailure { violations }))
    }
}

fn violations_from(schema: &Value, error: ValidationError<'_>) -> Vec<Violation> {
    let instance_path = error.instance_path.to_string();
    let schema_path = error.schema_path.to_string();

    match &error.kind {
        // One violation per undeclared property.
        ValidationErrorKind::AdditionalProperties { unexpected } => unexpected
            .iter()
            .map(|name| Violation {
                instance_path: instance_path.clone(),
                schema_path: schema_path.clone(),
                message: format!("Additional properties are not allowed ('{}' was unexpected)", name),
                params: json!({ "additionalProperty": name }),
            })
            .collect(),
        ValidationErrorKind::Required { property } => vec![Violation {
            message: error.to_string(),
            params: json!({ "missingProperty": property }),
            instance_path,
            schema_path,
        }],
        _ => {
            let keyword = schema_path.rsplit('/').next().unwrap_or_default().to_string();
            let expected = schema.pointer(&schema_path).cloned().unwrap_or(Value::Null);
            vec![Violation {
                message: error.to_string(),
                params: json!({ keyword: expected }),
                instance_path,
                schema_path,
            }]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> ResponseVerifier {
        let manifest = Manifest::from_yaml_str(
            r#"
name: postcode
endpoints:
  search:
    response:
      success:
        exit_code: 200
        parameters:
          result:
            type: array
          count:
            type: integer
      not_found:
        exit_code: 404
        parameters:
          message:
            type: string
  export:
    mimetype: text/csv
    response:
      success: {}
"#,
        )
        .unwrap();
        ResponseVerifier::new(Arc::new(manifest))
    }

    #[test]
    fn schema_is_closed_object() {
        let schema = verifier().schema_for("search", "not_found").unwrap();
        assert_eq!(
            schema,
            json!({
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "additionalProperties": false
            })
        );
    }

    #[test]
    fn matching_response_passes_through_unchanged() {
        let response = Response::new(200, r#"{"result": [], "count": 0}"#, "application/json").unwrap();
        let verified = verifier().verify("search", "success", &response).unwrap();
        assert!(std::ptr::eq(verified, &response));
    }

    #[test]
    fn exit_code_mismatch_names_both_codes() {
        let response = Response::new(404, r#"{"result": []}"#, "application/json").unwrap();
        let err = verifier().verify("search", "success", &response).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("200") && message.contains("404"), "{}", message);
    }

    #[test]
    fn mimetype_mismatch_fails_before_schema() {
        let response = Response::new(200, "anything", "text/plain").unwrap();
        let err = verifier().verify("search", "success", &response).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::WrongMimetype { ref expected, ref actual }
                if expected == "application/json" && actual == "text/plain"
        ));
    }

    #[test]
    fn declared_mimetype_is_honoured() {
        let response = Response::new(200, serde_json::json!({}), "text/csv").unwrap();
        assert!(verifier().verify("export", "success", &response).is_ok());
    }

    #[test]
    fn every_violation_is_reported() {
        let response = Response::new(
            200,
            r#"{"result": "nope", "extra": 1, "other": true}"#,
            "application/json",
        )
        .unwrap();
        let err = verifier().verify("search", "success", &response).unwrap_err();
        let violations = err.violations().unwrap();

        assert_eq!(violations.len(), 3);
        assert!(violations
            .iter()
            .any(|v| v.params == json!({"additionalProperty": "extra"})));
        assert!(violations
            .iter()
            .any(|v| v.params == json!({"additionalProperty": "other"})));
        assert!(violations
            .iter()
            .any(|v| v.instance_path == "/result" && v.params == json!({"type": "array"})));

        let message = err.to_string();
        assert!(message.contains(r#"({"additionalProperty":"extra"})"#), "{}", message);
    }

    #[test]
    fn unknown_variant_is_an_error() {
        let response = Response::new(200, "{}", "application/json").unwrap();
        assert!(matches!(
            verifier().verify("search", "teapot", &response),
            Err(HarnessError::UnknownVariant { .. })
        ));
    }
}
