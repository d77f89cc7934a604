//! Execution and verification harness for socket endpoint functions.
//!
//! An endpoint is a named function declared in a socket manifest
//! (`socket.yml`) together with the responses it may produce. The harness
//! runs an endpoint locally against a simulated invocation context, with
//! optional dependency substitution, and checks what it produced against the
//! manifest contract of a named response variant.
//!
//! ```rust,ignore
//! use socket_test::{EndpointRegistry, Harness, Manifest, RunContext, RunParams};
//!
//! let manifest = Manifest::load("socket.yml")?;
//! let mut registry = EndpointRegistry::new();
//! registry.register_fn("search", |invocation| async move {
//!     let response = invocation.http_response(200, r#"{"result": []}"#, "application/json")?;
//!     Ok(Some(response))
//! });
//!
//! let harness = Harness::new(manifest, registry);
//! let response = harness.run("search", RunContext::default(), RunParams::default()).await?;
//! response.is("success")?;
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod runtime;

pub use config::{Environment, HarnessConfig};
pub use error::{HarnessError, Result, ValidationFailure, Violation};
pub use manifest::{EndpointDefinition, Manifest, ResponseVariant};
pub use runtime::{
    Body, ContextBuilder, Endpoint, EndpointFuture, EndpointRegistry, ExecutionRecord, Harness,
    Invocation, InvocationContext, MockMap, ModuleLoader, ModuleScope, ProcessHandle,
    RequestSimulation, Response, ResponseFactory, ResponseVerifier, RunContext, RunParams,
    SetResponse,
};
