use crate::cli::{ContextArgs, SchemaArgs, VerifyArgs};
use crate::config::HarnessConfig;
use crate::manifest::{Manifest, DEFAULT_EXIT_CODE, DEFAULT_MIMETYPE};
use crate::runtime::{Body, ContextBuilder, Response, ResponseVerifier};
use anyhow::{Context as _, Result};
use colored::Colorize;
use itertools::Itertools;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Which socket a command operates on.
#[derive(Debug, Clone)]
pub struct SocketTarget {
    pub socket_dir: PathBuf,
    pub manifest: Option<PathBuf>,
}

impl SocketTarget {
    fn resolve(&self) -> Result<(HarnessConfig, Arc<Manifest>)> {
        let mut config = HarnessConfig::discover(&self.socket_dir)?;
        if let Some(manifest) = &self.manifest {
            config.manifest_path = manifest.clone();
        }
        let manifest = Manifest::load(&config.manifest_path)
            .with_context(|| format!("Loading {}", config.manifest_path.display()))?;
        Ok((config, Arc::new(manifest)))
    }
}

/// A response captured from an endpoint, as stored on disk.
#[derive(Debug, Deserialize)]
struct RecordedResponse {
    code: u16,
    #[serde(default = "default_mimetype")]
    mimetype: String,
    #[serde(default)]
    data: Value,
}

fn default_mimetype() -> String {
    DEFAULT_MIMETYPE.to_string()
}

impl RecordedResponse {
    fn normalize(self) -> crate::Result<Response> {
        let payload = match self.data {
            Value::String(text) => Body::Text(text),
            other => Body::Json(other),
        };
        Response::new(self.code, payload, self.mimetype)
    }
}

pub fn endpoints(target: &SocketTarget) -> Result<()> {
    let (_, manifest) = target.resolve()?;

    println!("{}", manifest.name.bold());
    for (name, definition) in &manifest.endpoints {
        let mimetype = definition.mimetype.as_deref().unwrap_or(DEFAULT_MIMETYPE);
        println!("  {} ({})", name.cyan(), mimetype);
        for (variant, declared) in &definition.response {
            let code = declared.exit_code.unwrap_or(DEFAULT_EXIT_CODE);
            let fields = declared.parameters.keys().join(", ");
            println!("    {} {} [{}]", code, variant, fields);
        }
    }
    Ok(())
}

pub fn context(target: &SocketTarget, args: ContextArgs) -> Result<()> {
    let (config, manifest) = target.resolve()?;
    let overrides = args
        .meta
        .as_deref()
        .map(serde_json::from_str::<Value>)
        .transpose()
        .context("--meta must be a JSON object")?;

    let builder = ContextBuilder::new(manifest, config.environment);
    let context = builder.build(&args.endpoint, overrides.as_ref())?;
    println!("{}", serde_json::to_string_pretty(&context)?);
    Ok(())
}

pub fn schema(target: &SocketTarget, args: SchemaArgs) -> Result<()> {
    let (_, manifest) = target.resolve()?;
    let verifier = ResponseVerifier::new(manifest);
    let schema = verifier.schema_for(&args.endpoint, &args.variant)?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

pub fn verify(target: &SocketTarget, args: VerifyArgs) -> Result<()> {
    let (_, manifest) = target.resolve()?;
    let source = std::fs::read_to_string(&args.response)
        .with_context(|| format!("Reading {}", args.response.display()))?;
    let recorded: RecordedResponse = serde_json::from_str(&source)
        .with_context(|| format!("Parsing {}", args.response.display()))?;
    let response = recorded.normalize()?;

    let verifier = ResponseVerifier::new(manifest);
    let label = format!("{}/{}", args.endpoint, args.variant);
    match verifier.verify(&args.endpoint, &args.variant, &response) {
        Ok(_) => {
            println!("{} {}", "PASS".green().bold(), label);
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "FAIL".red().bold(), label);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recorded_string_data_is_decoded_for_json() {
        let recorded: RecordedResponse = serde_json::from_value(json!({
            "code": 200,
            "data": "{\"result\": []}"
        }))
        .unwrap();
        let response = recorded.normalize().unwrap();
        assert_eq!(response.mimetype, "application/json");
        assert_eq!(response.json(), Some(&json!({"result": []})));
    }

    #[test]
    fn recorded_structured_data_is_kept() {
        let recorded: RecordedResponse = serde_json::from_value(json!({
            "code": 404,
            "mimetype": "application/json",
            "data": {"message": "nope"}
        }))
        .unwrap();
        let response = recorded.normalize().unwrap();
        assert_eq!(response.code, 404);
        assert_eq!(response.json(), Some(&json!({"message": "nope"})));
    }
}
