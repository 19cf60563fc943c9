//! One publisher run.

use anyhow::{Context, Result};

use lmdq_core::{HttpFeedSource, run_update};

use crate::UpdateArgs;
use crate::ui::ConsoleReporter;

/// Fetch, verify and publish every configured feed, then print the path of
/// the live snapshot.
pub async fn update(args: UpdateArgs, quiet: bool) -> Result<()> {
    let config = args.into_config().context("Invalid configuration")?;
    let source =
        HttpFeedSource::new(&config.fetch).context("Failed to initialise HTTP client")?;
    let reporter = ConsoleReporter::new(quiet);

    let published = run_update(&config, &source, &reporter).await?;
    println!("{}", published.path.display());
    Ok(())
}
