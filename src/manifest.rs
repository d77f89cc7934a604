//! Read-only model of a socket manifest (`socket.yml`).
//!
//! Only the parts the harness reads are typed. Everything else an endpoint
//! definition carries (description, inputs, ...) is kept verbatim in the
//! `extra` maps so it can be handed to the endpoint as invocation metadata.

use crate::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Exit code expected when a response variant does not declare one.
pub const DEFAULT_EXIT_CODE: u16 = 200;

/// Content type expected when an endpoint does not declare one.
pub const DEFAULT_MIMETYPE: &str = "application/json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    #[serde(default)]
    pub endpoints: BTreeMap<String, EndpointDefinition>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub response: BTreeMap<String, ResponseVariant>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseVariant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<u16>,
    /// JSON-Schema `properties` describing the response body.
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Manifest {
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(source)?;
        debug!(
            socket = %manifest.name,
            endpoints = manifest.endpoints.len(),
            "Parsed socket manifest"
        );
        Ok(manifest)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| HarnessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&source)
    }

    pub fn endpoint(&self, endpoint: &str) -> Result<&EndpointDefinition> {
        self.endpoints
            .get(endpoint)
            .ok_or_else(|| HarnessError::UnknownEndpoint(endpoint.to_string()))
    }

    pub fn variant(&self, endpoint: &str, variant: &str) -> Result<&ResponseVariant> {
        self.endpoint(endpoint)?
            .response
            .get(variant)
            .ok_or_else(|| HarnessError::UnknownVariant {
                endpoint: endpoint.to_string(),
                variant: variant.to_string(),
            })
    }

    pub fn expected_exit_code(&self, endpoint: &str, variant: &str) -> Result<u16> {
        Ok(self
            .variant(endpoint, variant)?
            .exit_code
            .unwrap_or(DEFAULT_EXIT_CODE))
    }

    pub fn expected_mimetype(&self, endpoint: &str) -> Result<&str> {
        Ok(self
            .endpoint(endpoint)?
            .mimetype
            .as_deref()
            .unwrap_or(DEFAULT_MIMETYPE))
    }

    /// The endpoint definition as a JSON value, `null` when not declared.
    pub fn endpoint_metadata(&self, endpoint: &str) -> Value {
        self.endpoints
            .get(endpoint)
            .and_then(|definition| serde_json::to_value(definition).ok())
            .unwrap_or(Value::Null)
    }
}
