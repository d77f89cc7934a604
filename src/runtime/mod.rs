//! Runtime sub-system of the harness.
//!
//! Sub-modules:
//! - [`executor`]: Public entry point tying the other modules together.
//! - [`context`]: Invocation context synthesis.
//! - [`merge`]: Deep merge used for context overrides.
//! - [`loader`]: Endpoint modules, dependency substitution.
//! - [`invoker`]: Endpoint invocation and result settlement.
//! - [`process`]: Call-scoped exit suppression.
//! - [`response`]: Response model and normalization.
//! - [`verifier`]: Response contract verification.
//! - [`result`]: Execution trace.

pub mod context;
pub mod executor;
pub mod invoker;
pub mod loader;
pub mod merge;
pub mod process;
pub mod response;
pub mod result;
pub mod verifier;

pub use context::{ContextBuilder, InvocationContext, RequestSimulation};
pub use executor::{Harness, RunContext, RunParams};
pub use invoker::{Invocation, SetResponse};
pub use loader::{Endpoint, EndpointFuture, EndpointRegistry, MockMap, ModuleLoader, ModuleScope};
pub use process::ProcessHandle;
pub use response::{Body, Response, ResponseFactory};
pub use result::ExecutionRecord;
pub use verifier::ResponseVerifier;
