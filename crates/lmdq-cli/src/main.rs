//! lmdq - local metadata query publisher

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lmdq_cli::cmd;
use lmdq_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; `update` reserves stdout for the snapshot path.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let quiet = cli.quiet;

    match cli.command {
        Commands::Update(args) => cmd::update::update(args, quiet).await,
        Commands::Validate {
            file,
            fingerprint,
            schema,
            index_targets,
        } => cmd::validate::validate(&file, &fingerprint, schema, &index_targets, quiet),
        Commands::Status { location, json } => cmd::status::status(&location, json),
        Commands::Hash { keys, certs } => cmd::hash::hash(&keys, &certs),
    }
}
