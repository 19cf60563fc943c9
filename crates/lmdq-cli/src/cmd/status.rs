//! Status command: what is live and what is left over.

use anyhow::{Context, Result};
use crossterm::style::Stylize;

use lmdq_core::status::{LiveStatus, inspect};

use crate::LocationArgs;
use crate::ui::Theme;

/// Show where the live link points, the feeds it serves and any stale
/// snapshot directories.
pub fn status(location: &LocationArgs, json: bool) -> Result<()> {
    let status = inspect(
        &location.base_dir,
        &location.live_link,
        &location.snapshot_prefix,
    )
    .with_context(|| format!("Failed to inspect {}", location.base_dir.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        render(&status);
    }
    Ok(())
}

fn render(status: &LiveStatus) {
    let theme = Theme::default();
    let label_width = 12;

    println!();
    println!("{}", "Publisher status".dark_grey());
    println!();

    println!(
        "{:<width$}{}",
        "Live link:",
        status.live_link.display(),
        width = label_width
    );

    let Some(target) = &status.target else {
        println!("{:<width$}{}", "Snapshot:", "No live snapshot", width = label_width);
        render_stale(status);
        println!();
        return;
    };
    println!(
        "{:<width$}{}",
        "Snapshot:",
        target.display(),
        width = label_width
    );

    if let Some(manifest) = &status.manifest {
        println!(
            "{:<width$}{}",
            "Created:",
            manifest.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            width = label_width
        );
        println!(
            "{:<width$}{}",
            "Schema:",
            manifest.schema,
            width = label_width
        );
        println!(
            "{:<width$}{} entities",
            "Entities:",
            manifest.total_entities(),
            width = label_width
        );
        if let Some(discovery) = &manifest.discovery {
            println!(
                "{:<width$}{} ({} bytes)",
                "Discovery:",
                discovery.path,
                discovery.bytes,
                width = label_width
            );
        }

        println!();
        println!("{}", format!("{} feeds", manifest.feeds.len()).dark_grey());
        println!();
        for feed in &manifest.feeds {
            let name_part = format!("{:<width$}", feed.name.as_str(), width = theme.name_width);
            println!(
                "  {} {:>6} entities  {}",
                name_part.with(theme.feed_name),
                feed.summary.entities,
                feed.signer.as_str().with(theme.secondary)
            );
        }
    } else {
        println!();
        println!("{}", "No manifest in live snapshot".with(theme.warning));
        for dir in &status.directories {
            let name_part = format!("{:<width$}", dir.name, width = theme.name_width);
            println!("  {} {:>6} files", name_part.with(theme.feed_name), dir.files);
        }
    }

    render_stale(status);
    println!();
}

fn render_stale(status: &LiveStatus) {
    if status.stale_snapshots.is_empty() {
        return;
    }
    let theme = Theme::default();
    println!();
    println!(
        "{}",
        format!("{} stale snapshots", status.stale_snapshots.len()).with(theme.warning)
    );
    for path in &status.stale_snapshots {
        println!("  {}", path.display());
    }
}
