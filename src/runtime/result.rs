//! Execution trace captured for every run.

use crate::runtime::loader::MockMap;
use crate::runtime::response::Response;
use crate::Result;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Represents a captured execution trace.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub endpoint: String,
    /// Dependency identifiers substituted for this run.
    pub mocks: Vec<String>,
    /// Exit codes the endpoint asked for while termination was suppressed.
    pub exit_requests: Vec<i32>,
    /// Response code on success, error text on failure.
    pub result: std::result::Result<u16, String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ExecutionRecord {
    pub(crate) fn start(endpoint: &str, mocks: Option<&MockMap>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            mocks: mocks
                .map(|m| m.ids().map(str::to_string).collect())
                .unwrap_or_default(),
            exit_requests: Vec::new(),
            result: Err("not settled".to_string()),
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    pub(crate) fn finish(
        &mut self,
        outcome: &Result<Response>,
        exit_requests: Vec<i32>,
        elapsed: Duration,
    ) {
        self.result = outcome
            .as_ref()
            .map(|response| response.code)
            .map_err(ToString::to_string);
        self.exit_requests = exit_requests;
        self.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    }

    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn requested_exit(&self) -> bool {
        !self.exit_requests.is_empty()
    }
}
