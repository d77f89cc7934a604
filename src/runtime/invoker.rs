//! Endpoint invocation and result settlement.
//!
//! This module contains the hot path for actually *calling* an endpoint. It
//! wires together:
//! - Exit suppression for the duration of the call via [`ExitControl`].
//! - Module loading with per-call mocks via [`ModuleLoader`].
//! - A single-shot settlement cell shared by the endpoint's return value and
//!   [`Invocation::set_response`]; whichever settles first wins.
//! - Panic capture, so a panicking endpoint fails the run instead of the
//!   caller.

use crate::runtime::context::InvocationContext;
use crate::runtime::loader::{MockMap, ModuleLoader};
use crate::runtime::process::{ExitControl, ProcessHandle};
use crate::runtime::response::{Body, Response, ResponseFactory};
use crate::runtime::result::ExecutionRecord;
use crate::{HarnessError, Result};
use futures_util::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

type Settled = std::result::Result<Response, HarnessError>;

/// Everything an endpoint receives for one call.
pub struct Invocation {
    pub args: Value,
    pub config: Value,
    pub meta: InvocationContext,
    http: ResponseFactory,
    settle: SetResponse,
    process: ProcessHandle,
}

impl Invocation {
    /// The `HttpResponse` constructor bound to this endpoint.
    pub fn http(&self) -> &ResponseFactory {
        &self.http
    }

    /// Shorthand for `self.http().make(..)`.
    pub fn http_response(
        &self,
        code: u16,
        payload: impl Into<Body>,
        mimetype: impl Into<String>,
    ) -> Result<Response> {
        self.http.make(code, payload, mimetype)
    }

    /// Settle the run with `response` without returning it.
    ///
    /// Returns `false` when the run was already settled.
    pub fn set_response(&self, response: Response) -> bool {
        self.settle.send(response)
    }

    /// A handle that can settle the run from another task.
    pub fn set_response_handle(&self) -> SetResponse {
        self.settle.clone()
    }

    /// Request process termination. Suppressed and recorded during a run.
    pub fn exit(&self, code: i32) {
        self.process.exit(code);
    }

    pub fn process(&self) -> &ProcessHandle {
        &self.process
    }
}

/// Settles a run directly with a response.
#[derive(Clone)]
pub struct SetResponse {
    slot: Arc<Mutex<Option<oneshot::Sender<Settled>>>>,
    http: ResponseFactory,
}

impl SetResponse {
    fn new(http: ResponseFactory) -> (Self, oneshot::Receiver<Settled>) {
        let (tx, rx) = oneshot::channel();
        let handle = Self {
            slot: Arc::new(Mutex::new(Some(tx))),
            http,
        };
        (handle, rx)
    }

    /// Settle with an already built response. Returns `false` when the run
    /// was already settled.
    pub fn send(&self, response: Response) -> bool {
        let response = self.http.bind(response);
        self.settle(Ok(response))
    }

    /// Normalize a raw `(code, payload, mimetype)` triple and settle with it.
    pub fn send_raw(
        &self,
        code: u16,
        payload: impl Into<Body>,
        mimetype: impl Into<String>,
    ) -> Result<bool> {
        Ok(self.send(Response::new(code, payload, mimetype)?))
    }

    fn settle(&self, settled: Settled) -> bool {
        let sender = match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            Some(sender) => sender.send(settled).is_ok(),
            None => {
                debug!(endpoint = self.http.endpoint(), "Run already settled; ignoring");
                false
            }
        }
    }
}

/// Arguments of a single call, before the harness adds its own handles.
#[derive(Debug, Clone)]
pub struct InvocationInput {
    pub args: Value,
    pub config: Value,
    pub meta: InvocationContext,
}

/// Load `endpoint`, call it and wait for its result to settle.
#[tracing::instrument(skip_all, fields(endpoint = endpoint))]
pub async fn invoke_endpoint(
    loader: &dyn ModuleLoader,
    endpoint: &str,
    input: InvocationInput,
    http: ResponseFactory,
    mocks: Option<&MockMap>,
) -> (Result<Response>, ExecutionRecord) {
    info!("Running endpoint: {}", endpoint);

    let started = Instant::now();
    let mut record = ExecutionRecord::start(endpoint, mocks);

    let exits = ExitControl::new();
    let outcome = {
        let _suppression = exits.suppress();
        call_endpoint(loader, endpoint, input, http, mocks, exits.handle()).await
    };

    record.finish(&outcome, exits.requests(), started.elapsed());
    match &outcome {
        Ok(response) => debug!(code = response.code, "Endpoint settled"),
        Err(e) => warn!("Endpoint failed: {}", e),
    }
    (outcome, record)
}

async fn call_endpoint(
    loader: &dyn ModuleLoader,
    endpoint: &str,
    input: InvocationInput,
    http: ResponseFactory,
    mocks: Option<&MockMap>,
    process: ProcessHandle,
) -> Result<Response> {
    let function = loader.load(endpoint, mocks)?;

    let (settle, mut settled) = SetResponse::new(http.clone());
    let invocation = Invocation {
        args: input.args,
        config: input.config,
        meta: input.meta,
        http,
        settle: settle.clone(),
        process,
    };

    let call = match std::panic::catch_unwind(AssertUnwindSafe(|| function.call(invocation))) {
        Ok(call) => call,
        Err(panic) => return Err(panicked(endpoint, panic)),
    };
    let mut call = Box::pin(AssertUnwindSafe(call).catch_unwind());

    tokio::select! {
        biased;
        first = &mut settled => return first.unwrap_or_else(|_| Err(HarnessError::NoResponse(endpoint.to_string()))),
        returned = &mut call => match returned {
            Ok(Ok(Some(response))) => {
                settle.send(response);
            }
            Ok(Ok(None)) => debug!("Endpoint returned without a response; waiting for set_response"),
            Ok(Err(error)) => {
                let error = error
                    .downcast::<HarnessError>()
                    .unwrap_or_else(HarnessError::Endpoint);
                settle.settle(Err(error));
            }
            Err(panic) => {
                settle.settle(Err(panicked(endpoint, panic)));
            }
        },
    }

    // Only handles that escaped into other tasks can still settle the run.
    drop(call);
    drop(settle);
    settled
        .await
        .unwrap_or_else(|_| Err(HarnessError::NoResponse(endpoint.to_string())))
}

fn panicked(endpoint: &str, panic: Box<dyn Any + Send>) -> HarnessError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    HarnessError::EndpointPanic {
        endpoint: endpoint.to_string(),
        message,
    }
}
