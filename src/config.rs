//! Harness configuration.
//!
//! The platform identity an endpoint sees (host, auth key, instance, debug)
//! comes from the process environment. It is captured once into an
//! [`Environment`] value so that building a context never reads ambient
//! process state, and tests can supply their own values.
//!
//! A socket directory may also carry a `socket-test.toml` file:
//!
//! ```toml
//! [harness]
//! manifest = "socket.yml"
//!
//! [environment]
//! host = "api.syncano.io"
//! auth_key = "..."
//! instance = "withered-voice-2245"
//! debug = false
//! ```
//!
//! Values from the file are fallbacks; the process environment wins.

use crate::{HarnessError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_HOST: &str = "SYNCANO_HOST";
pub const ENV_AUTH_KEY: &str = "SYNCANO_AUTH_KEY";
pub const ENV_INSTANCE_NAME: &str = "SYNCANO_INSTANCE_NAME";
pub const ENV_PROJECT_INSTANCE: &str = "SYNCANO_PROJECT_INSTANCE";
pub const ENV_DEBUG: &str = "DEBUG";

pub const CONFIG_FILE_NAME: &str = "socket-test.toml";
pub const DEFAULT_MANIFEST_FILE: &str = "socket.yml";

/// Platform identity exposed to endpoints through the invocation context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Environment {
    #[serde(rename = "host")]
    pub api_host: Option<String>,
    #[serde(rename = "auth_key")]
    pub token: Option<String>,
    pub instance: Option<String>,
    /// `None` when `DEBUG` is unset, so a file value can fill it in.
    pub debug: Option<bool>,
}

impl Environment {
    /// Capture the harness variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build an environment from an arbitrary variable lookup.
    ///
    /// Empty values count as unset. The instance name is taken from
    /// `SYNCANO_INSTANCE_NAME`, falling back to `SYNCANO_PROJECT_INSTANCE`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        Self {
            api_host: get(ENV_HOST),
            token: get(ENV_AUTH_KEY),
            instance: get(ENV_INSTANCE_NAME).or_else(|| get(ENV_PROJECT_INSTANCE)),
            debug: get(ENV_DEBUG).map(|value| is_truthy(&value)),
        }
    }

    /// Fill every unset field from `fallback`.
    pub fn or(self, fallback: Environment) -> Self {
        Self {
            api_host: self.api_host.or(fallback.api_host),
            token: self.token.or(fallback.token),
            instance: self.instance.or(fallback.instance),
            debug: self.debug.or(fallback.debug),
        }
    }

    /// The resolved `DEBUG` flag; unset means off.
    pub fn debug_enabled(&self) -> bool {
        self.debug.unwrap_or(false)
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(value.trim().to_ascii_lowercase().as_str(), "" | "0" | "false" | "no" | "off")
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    harness: HarnessSection,
    environment: Environment,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct HarnessSection {
    manifest: Option<PathBuf>,
}

/// Where the socket lives and what environment its endpoints see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub socket_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub environment: Environment,
}

impl HarnessConfig {
    /// Resolve configuration for the socket rooted at `socket_dir`.
    pub fn discover(socket_dir: impl AsRef<Path>) -> Result<Self> {
        Self::discover_with(socket_dir, Environment::from_env())
    }

    /// Like [`HarnessConfig::discover`] but with an explicit process environment.
    pub fn discover_with(socket_dir: impl AsRef<Path>, environment: Environment) -> Result<Self> {
        let socket_dir = socket_dir.as_ref().to_path_buf();
        let config_path = socket_dir.join(CONFIG_FILE_NAME);

        let file = if config_path.is_file() {
            debug!(path = %config_path.display(), "Loading harness config");
            let source =
                std::fs::read_to_string(&config_path).map_err(|source| HarnessError::Io {
                    path: config_path.clone(),
                    source,
                })?;
            toml::from_str::<ConfigFile>(&source).map_err(|e| {
                HarnessError::Config(format!("{}: {}", config_path.display(), e))
            })?
        } else {
            ConfigFile::default()
        };

        let manifest = file
            .harness
            .manifest
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST_FILE));
        let manifest_path = if manifest.is_absolute() {
            manifest
        } else {
            socket_dir.join(manifest)
        };

        Ok(Self {
            socket_dir,
            manifest_path,
            environment: environment.or(file.environment),
        })
    }
}
