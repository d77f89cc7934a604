use anyhow::Result;
use clap::Parser;
use socket_test::cli::{commands, Cli, Commands};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging with verbosity-aware level
    socket_test::logging::init(cli.verbosity());

    let target = cli.target();
    match cli.command {
        Commands::Endpoints => commands::endpoints(&target)?,
        Commands::Context(args) => commands::context(&target, args)?,
        Commands::Schema(args) => commands::schema(&target, args)?,
        Commands::Verify(args) => commands::verify(&target, args)?,
    }

    Ok(())
}
