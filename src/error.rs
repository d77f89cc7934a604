use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors produced while building contexts, loading endpoints, running them
/// or verifying what they returned.
#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    #[error("Failed to read {path}: {source}")]
    #[diagnostic(code(socket_test::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse socket manifest: {0}")]
    #[diagnostic(
        code(socket_test::manifest),
        help("check that socket.yml is valid YAML with a top-level `name` and `endpoints` map")
    )]
    ManifestParse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(socket_test::config))]
    Config(String),

    #[error("Endpoint '{0}' is not declared in the socket manifest")]
    #[diagnostic(code(socket_test::unknown_endpoint))]
    UnknownEndpoint(String),

    #[error("Endpoint '{endpoint}' declares no response named '{variant}'")]
    #[diagnostic(code(socket_test::unknown_variant))]
    UnknownVariant { endpoint: String, variant: String },

    #[error("Wrong exit code! Desired code is {expected}, got: {actual}")]
    #[diagnostic(code(socket_test::exit_code))]
    WrongExitCode { expected: u16, actual: u16 },

    #[error("Wrong mimetype! Desired mimetype is {expected}, got: {actual}")]
    #[diagnostic(code(socket_test::mimetype))]
    WrongMimetype { expected: String, actual: String },

    #[error("Response parameters of {endpoint}/{variant} are not a usable schema: {message}")]
    #[diagnostic(code(socket_test::schema))]
    InvalidSchema {
        endpoint: String,
        variant: String,
        message: String,
    },

    #[error("{0}")]
    #[diagnostic(code(socket_test::validation))]
    Validation(ValidationFailure),

    #[error("Response is not bound to an endpoint")]
    #[diagnostic(
        code(socket_test::unbound_response),
        help("verify responses built outside a run with Harness::verify")
    )]
    UnboundResponse,

    #[error("Malformed JSON payload: {0}")]
    #[diagnostic(code(socket_test::payload))]
    MalformedPayload(#[source] serde_json::Error),

    #[error("Invalid context override at '{path}': {message}")]
    #[diagnostic(code(socket_test::invalid_override))]
    InvalidOverride { path: String, message: String },

    #[error("Endpoint module '{0}' could not be found")]
    #[diagnostic(
        code(socket_test::module_not_found),
        help("register the endpoint with EndpointRegistry before running it")
    )]
    ModuleNotFound(String),

    #[error("Cannot mock '{dependency}' for endpoint '{endpoint}': no such dependency")]
    #[diagnostic(code(socket_test::mock_target))]
    MockTargetNotFound { endpoint: String, dependency: String },

    #[error("Dependency '{dependency}' required by endpoint '{endpoint}' is not available")]
    #[diagnostic(code(socket_test::missing_dependency))]
    MissingDependency { endpoint: String, dependency: String },

    #[error("Dependency '{dependency}' does not have the type requested by endpoint '{endpoint}'")]
    #[diagnostic(code(socket_test::dependency_type))]
    DependencyType { endpoint: String, dependency: String },

    #[error("Failed to load endpoint '{endpoint}': {source}")]
    #[diagnostic(code(socket_test::load))]
    Load {
        endpoint: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Endpoint(anyhow::Error),

    #[error("Endpoint '{endpoint}' panicked: {message}")]
    #[diagnostic(code(socket_test::panic))]
    EndpointPanic { endpoint: String, message: String },

    #[error("Endpoint '{0}' finished without producing a response")]
    #[diagnostic(
        code(socket_test::no_response),
        help("return Ok(Some(response)) or call set_response before returning")
    )]
    NoResponse(String),
}

impl HarnessError {
    /// Schema violations carried by a [`HarnessError::Validation`] failure.
    pub fn violations(&self) -> Option<&[Violation]> {
        match self {
            HarnessError::Validation(failure) => Some(&failure.violations),
            _ => None,
        }
    }
}

/// A single schema violation found in a response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// JSON pointer into the response data.
    pub instance_path: String,
    /// JSON pointer into the generated schema.
    pub schema_path: String,
    pub message: String,
    pub params: serde_json::Value,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.params)
    }
}

/// Every violation found while validating one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub violations: Vec<Violation>,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Validation error:")?;
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {}", violation)?;
        }
        Ok(())
    }
}
