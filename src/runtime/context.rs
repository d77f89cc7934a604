//! Invocation context synthesis.
//!
//! Builds the `meta` object an endpoint receives on the platform: socket
//! identity, a simulated CGI-style request and the endpoint's manifest
//! definition. Caller overrides are deep-merged over the generated defaults.

use crate::config::Environment;
use crate::manifest::Manifest;
use crate::runtime::merge::deep_merge;
use crate::{HarnessError, Result};
use fake::faker::internet::en::{IPv4, UserAgent};
use fake::Fake;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub const EXECUTED_BY: &str = "socket_endpoint";

const UNNAMED_INSTANCE: &str = "local";
const ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en,en-US;q=0.8,pl;q=0.6";
const ACCEPT_ENCODING: &str = "gzip, deflate, br";

/// Metadata handed to an endpoint as `meta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationContext {
    pub socket: String,
    pub api_host: Option<String>,
    pub token: Option<String>,
    pub instance: Option<String>,
    pub debug: bool,
    /// Always `<socket>/<endpoint>` unless overridden.
    pub executor: String,
    pub executed_by: String,
    pub request: RequestSimulation,
    /// The endpoint definition from the manifest, `null` when not declared.
    pub metadata: Value,
    /// Keys introduced by overrides.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The HTTP request the platform would have received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RequestSimulation {
    pub request_method: String,
    pub path_info: String,
    pub http_user_agent: String,
    pub http_connection: String,
    pub remote_addr: String,
    pub http_host: Option<String>,
    pub http_upgrade_insecure_requests: String,
    pub http_accept: String,
    pub http_accept_language: String,
    pub http_accept_encoding: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestSimulation {
    /// A POST to the endpoint's public URL from a random client.
    pub fn simulate(environment: &Environment, socket: &str, endpoint: &str) -> Self {
        let instance = environment.instance.as_deref().unwrap_or(UNNAMED_INSTANCE);

        Self {
            request_method: "POST".to_string(),
            path_info: format!("/v2/instances/{instance}/endpoints/sockets/{socket}/{endpoint}/"),
            http_user_agent: UserAgent().fake(),
            http_connection: "close".to_string(),
            remote_addr: IPv4().fake(),
            http_host: environment.api_host.clone(),
            http_upgrade_insecure_requests: "1".to_string(),
            http_accept: ACCEPT.to_string(),
            http_accept_language: ACCEPT_LANGUAGE.to_string(),
            http_accept_encoding: ACCEPT_ENCODING.to_string(),
            extra: Map::new(),
        }
    }
}

/// Builds invocation contexts for the endpoints of one socket.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    manifest: Arc<Manifest>,
    environment: Environment,
}

impl ContextBuilder {
    pub fn new(manifest: Arc<Manifest>, environment: Environment) -> Self {
        Self {
            manifest,
            environment,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Generate a fresh context for `endpoint` and deep-merge `overrides` into it.
    pub fn build(&self, endpoint: &str, overrides: Option<&Value>) -> Result<InvocationContext> {
        let defaults = self.defaults(endpoint);

        let Some(overrides) = overrides.filter(|o| !o.is_null() && !is_empty_object(o)) else {
            return Ok(defaults);
        };
        if !overrides.is_object() {
            return Err(HarnessError::InvalidOverride {
                path: ".".to_string(),
                message: format!("overrides must be a JSON object, got {}", json_kind(overrides)),
            });
        }

        let mut merged = serde_json::to_value(&defaults).map_err(|e| {
            HarnessError::InvalidOverride {
                path: String::new(),
                message: e.to_string(),
            }
        })?;
        deep_merge(&mut merged, overrides);
        debug!(endpoint, "Applied context overrides");

        serde_path_to_error::deserialize(merged).map_err(|e| HarnessError::InvalidOverride {
            path: e.path().to_string(),
            message: e.inner().to_string(),
        })
    }

    fn defaults(&self, endpoint: &str) -> InvocationContext {
        let socket = self.manifest.name.clone();
        let metadata = self.manifest.endpoint_metadata(endpoint);
        if metadata.is_null() {
            warn!(endpoint, socket = %socket, "Endpoint is not declared in the socket manifest");
        }

        InvocationContext {
            api_host: self.environment.api_host.clone(),
            token: self.environment.token.clone(),
            instance: self.environment.instance.clone(),
            debug: self.environment.debug_enabled(),
            executor: format!("{socket}/{endpoint}"),
            executed_by: EXECUTED_BY.to_string(),
            request: RequestSimulation::simulate(&self.environment, &socket, endpoint),
            metadata,
            extra: Map::new(),
            socket,
        }
    }
}

fn is_empty_object(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.is_empty())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
