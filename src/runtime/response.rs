//! Response model and normalization.
//!
//! Endpoints produce a status code, a payload and a content type. The
//! harness turns that triple into a [`Response`] whose body is decoded
//! eagerly when the content type is JSON, so assertions and schema checks
//! operate on structured data.

use crate::runtime::verifier::ResponseVerifier;
use crate::{HarnessError, Result};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Response body as stored on a [`Response`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Body {
    Json(Value),
    Text(String),
    Binary(Vec<u8>),
}

impl Body {
    /// The body as a JSON value for schema validation. Raw payloads are
    /// presented as what a JSON consumer would see: text as a string,
    /// binary as `null`.
    pub fn to_json(&self) -> Value {
        match self {
            Body::Json(value) => value.clone(),
            Body::Text(text) => Value::String(text.clone()),
            Body::Binary(_) => Value::Null,
        }
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Binary(bytes)
    }
}

impl From<&[u8]> for Body {
    fn from(bytes: &[u8]) -> Self {
        Body::Binary(bytes.to_vec())
    }
}

/// Whether `mimetype` names a JSON encoding (`application/json` or a `+json`
/// structured suffix). Parameters such as `charset` are ignored.
pub fn is_json_mimetype(mimetype: &str) -> bool {
    let essence = mimetype
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// What an endpoint produced for one invocation.
#[derive(Clone, Serialize)]
pub struct Response {
    pub code: u16,
    pub data: Body,
    pub mimetype: String,
    #[serde(skip)]
    binding: Option<Binding>,
}

#[derive(Clone)]
struct Binding {
    endpoint: Arc<str>,
    verifier: ResponseVerifier,
}

impl Response {
    /// Normalize a raw `(code, payload, mimetype)` triple.
    ///
    /// JSON payloads are parsed; a payload that is not valid JSON is an error.
    pub fn new(code: u16, payload: impl Into<Body>, mimetype: impl Into<String>) -> Result<Self> {
        let mimetype = mimetype.into();
        let data = match payload.into() {
            Body::Text(text) if is_json_mimetype(&mimetype) => {
                Body::Json(serde_json::from_str(&text).map_err(HarnessError::MalformedPayload)?)
            }
            Body::Binary(bytes) if is_json_mimetype(&mimetype) => {
                Body::Json(serde_json::from_slice(&bytes).map_err(HarnessError::MalformedPayload)?)
            }
            body => body,
        };

        Ok(Self {
            code,
            data,
            mimetype,
            binding: None,
        })
    }

    /// Decoded JSON body, if the response carries one.
    pub fn json(&self) -> Option<&Value> {
        match &self.data {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.data {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Endpoint this response was produced for, once settled by a run.
    pub fn endpoint(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.endpoint.as_ref())
    }

    /// Verify this response against the manifest contract of `variant`.
    ///
    /// Returns the same response on success.
    pub fn is(&self, variant: &str) -> Result<&Self> {
        let binding = self.binding.as_ref().ok_or(HarnessError::UnboundResponse)?;
        binding.verifier.verify(&binding.endpoint, variant, self)
    }

    pub(crate) fn bind(mut self, endpoint: Arc<str>, verifier: ResponseVerifier) -> Self {
        self.binding = Some(Binding { endpoint, verifier });
        self
    }
}

impl PartialEq for Response {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code && self.data == other.data && self.mimetype == other.mimetype
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("code", &self.code)
            .field("data", &self.data)
            .field("mimetype", &self.mimetype)
            .field("endpoint", &self.endpoint())
            .finish()
    }
}

/// The `HttpResponse` constructor handed to endpoint code, bound to the
/// endpoint being run.
#[derive(Clone)]
pub struct ResponseFactory {
    endpoint: Arc<str>,
    verifier: ResponseVerifier,
}

impl ResponseFactory {
    pub fn new(endpoint: impl Into<Arc<str>>, verifier: ResponseVerifier) -> Self {
        Self {
            endpoint: endpoint.into(),
            verifier,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build a normalized response that can later verify itself with
    /// [`Response::is`].
    pub fn make(
        &self,
        code: u16,
        payload: impl Into<Body>,
        mimetype: impl Into<String>,
    ) -> Result<Response> {
        Ok(self.bind(Response::new(code, payload, mimetype)?))
    }

    pub(crate) fn bind(&self, response: Response) -> Response {
        response.bind(self.endpoint.clone(), self.verifier.clone())
    }
}

impl fmt::Debug for ResponseFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseFactory")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
