use crate::config::{Environment, HarnessConfig};
use crate::manifest::Manifest;
use crate::runtime::context::{ContextBuilder, InvocationContext};
use crate::runtime::invoker::{invoke_endpoint, InvocationInput};
use crate::runtime::loader::{MockMap, ModuleLoader};
use crate::runtime::response::{Response, ResponseFactory};
use crate::runtime::result::ExecutionRecord;
use crate::runtime::verifier::ResponseVerifier;
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Caller-supplied inputs of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    /// Endpoint arguments. Defaults to `{"DEBUG": false}`; unrelated to the
    /// `debug` flag of the invocation metadata.
    pub args: Value,
    pub config: Value,
    /// Partial invocation context deep-merged over the generated one.
    pub meta: Value,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            args: json!({ "DEBUG": false }),
            config: json!({}),
            meta: json!({}),
        }
    }
}

impl RunContext {
    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = meta;
        self
    }
}

/// Per-run harness parameters.
#[derive(Debug, Clone, Default)]
pub struct RunParams {
    pub mocks: Option<MockMap>,
}

impl RunParams {
    pub fn with_mocks(mocks: MockMap) -> Self {
        Self { mocks: Some(mocks) }
    }
}

/// Runs and verifies the endpoints of one socket.
///
/// Every run builds its own context, endpoint instance, exit control and
/// settlement cell, so a single harness can serve concurrent runs.
pub struct Harness {
    contexts: ContextBuilder,
    verifier: ResponseVerifier,
    loader: Arc<dyn ModuleLoader>,
}

impl Harness {
    /// Create a harness whose endpoints see the current process environment.
    pub fn new(manifest: Manifest, loader: impl ModuleLoader + 'static) -> Self {
        Self::with_environment(manifest, loader, Environment::from_env())
    }

    pub fn with_environment(
        manifest: Manifest,
        loader: impl ModuleLoader + 'static,
        environment: Environment,
    ) -> Self {
        info!(socket = %manifest.name, "Initializing socket harness");
        let manifest = Arc::new(manifest);
        Self {
            contexts: ContextBuilder::new(Arc::clone(&manifest), environment),
            verifier: ResponseVerifier::new(manifest),
            loader: Arc::new(loader),
        }
    }

    /// Load the manifest named by `config` and use its environment.
    pub fn from_config(config: &HarnessConfig, loader: impl ModuleLoader + 'static) -> Result<Self> {
        let manifest = Manifest::load(&config.manifest_path)?;
        Ok(Self::with_environment(
            manifest,
            loader,
            config.environment.clone(),
        ))
    }

    pub fn manifest(&self) -> &Manifest {
        self.verifier.manifest()
    }

    pub fn environment(&self) -> &Environment {
        self.contexts.environment()
    }

    /// Generate the invocation context `endpoint` would receive.
    pub fn build_context(
        &self,
        endpoint: &str,
        overrides: Option<&Value>,
    ) -> Result<InvocationContext> {
        self.contexts.build(endpoint, overrides)
    }

    /// The `HttpResponse` constructor for `endpoint`, for building expected
    /// responses outside a run.
    pub fn response_factory(&self, endpoint: &str) -> ResponseFactory {
        ResponseFactory::new(endpoint, self.verifier.clone())
    }

    pub fn verify<'r>(
        &self,
        endpoint: &str,
        variant: &str,
        response: &'r Response,
    ) -> Result<&'r Response> {
        self.verifier.verify(endpoint, variant, response)
    }

    /// Run `endpoint` and wait for its response.
    pub async fn run(
        &self,
        endpoint: &str,
        context: RunContext,
        params: RunParams,
    ) -> Result<Response> {
        self.run_recorded(endpoint, context, params).await.0
    }

    /// Like [`Harness::run`], also returning the execution trace.
    pub async fn run_recorded(
        &self,
        endpoint: &str,
        context: RunContext,
        params: RunParams,
    ) -> (Result<Response>, ExecutionRecord) {
        let mocks = params.mocks.as_ref();

        let meta = match self.contexts.build(endpoint, Some(&context.meta)) {
            Ok(meta) => meta,
            Err(e) => {
                let mut record = ExecutionRecord::start(endpoint, mocks);
                let outcome = Err(e);
                record.finish(&outcome, Vec::new(), Duration::ZERO);
                return (outcome, record);
            }
        };

        let input = InvocationInput {
            args: context.args,
            config: context.config,
            meta,
        };

        invoke_endpoint(
            self.loader.as_ref(),
            endpoint,
            input,
            self.response_factory(endpoint),
            mocks,
        )
        .await
    }
}
