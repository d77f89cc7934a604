//! Command-line interface for inspecting a socket and checking recorded
//! responses against its contract.

pub mod commands;

use crate::logging::Verbosity;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "socket-test",
    version,
    about = "Inspect socket endpoints and verify responses against socket.yml"
)]
pub struct Cli {
    /// Directory containing socket.yml
    #[arg(long, global = true, env = "SOCKET_TEST_DIR", default_value = ".")]
    pub socket_dir: PathBuf,

    /// Manifest path, overriding socket-test.toml and the socket.yml default
    #[arg(long, global = true)]
    pub manifest: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }

    pub fn target(&self) -> commands::SocketTarget {
        commands::SocketTarget {
            socket_dir: self.socket_dir.clone(),
            manifest: self.manifest.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List endpoints with their response variants
    Endpoints,
    /// Print the invocation context an endpoint would receive
    Context(ContextArgs),
    /// Print the JSON Schema a response variant must satisfy
    Schema(SchemaArgs),
    /// Verify a recorded response against a response variant
    Verify(VerifyArgs),
}

#[derive(Debug, Args)]
pub struct ContextArgs {
    /// Endpoint name
    pub endpoint: String,

    /// JSON object deep-merged over the generated context
    #[arg(long)]
    pub meta: Option<String>,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Endpoint name
    pub endpoint: String,

    /// Response variant name
    pub variant: String,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Endpoint name
    pub endpoint: String,

    /// Response variant name
    pub variant: String,

    /// JSON file with `code`, `mimetype` and `data` of the response
    #[arg(long, short)]
    pub response: PathBuf,
}
