//! One publisher run: fetch, validate and index every feed into a fresh
//! snapshot, then promote it.
//!
//! Feeds are handled one after another in configuration order. The first
//! failure abandons the snapshot and leaves the live link untouched.

use std::path::PathBuf;

use lmdq_schema::{FeedDescriptor, FeedName};
use tracing::{error, info, warn};

use crate::config::{DISCOVERY_DIR, DiscoveryConfig, UpdateConfig};
use crate::error::{FeedFailure, IndexingError, RunError, Stage};
use crate::fetch::FeedSource;
use crate::indexer;
use crate::manifest::{DiscoveryManifest, FeedManifest, SnapshotManifest};
use crate::reporter::Reporter;
use crate::snapshot::{PromoteOutcome, Snapshot};
use crate::validator::MetadataValidator;

/// A snapshot that every feed populated and that is now live.
#[derive(Debug, Clone)]
pub struct PublishedSnapshot {
    pub path: PathBuf,
    pub outcome: PromoteOutcome,
    pub manifest: SnapshotManifest,
}

/// Run the whole pipeline once.
///
/// # Errors
///
/// Returns a [`RunError`] for invalid configuration, a snapshot that cannot
/// be created, the first feed that fails any stage, a failed discovery copy,
/// or a failed promotion. Only [`RunError::Publish`] can happen after the
/// live link was considered for change, and even then it still points at a
/// complete snapshot.
pub async fn run_update<S, R>(config: &UpdateConfig, source: &S, reporter: &R) -> Result<PublishedSnapshot, RunError>
where
    S: FeedSource + ?Sized,
    R: Reporter + ?Sized,
{
    config.check()?;

    let mut snapshot = Snapshot::create(&config.base_dir, &config.snapshot_prefix).map_err(RunError::Snapshot)?;

    let manifest = match populate(config, &mut snapshot, source, reporter).await {
        Ok(manifest) => manifest,
        Err(err) => {
            error!("Update aborted: {err}");
            reporter.error(&format!("Update aborted, live data unchanged: {err}"));
            snapshot.abandon(config.reclaim_abandoned);
            return Err(err);
        }
    };

    reporter.section("Publishing");
    let path = snapshot.path().to_path_buf();
    let feeds: Vec<FeedName> = config.feeds.iter().map(|f| f.name.clone()).collect();
    let live_link = config.live_link_path();

    let outcome = snapshot.promote(&live_link, &feeds).map_err(|source| {
        error!("CRITICAL: failed to promote {}: {source}", path.display());
        reporter.error(&format!("Failed to promote {}: {source}", path.display()));
        RunError::Publish {
            snapshot: path.clone(),
            source,
        }
    })?;

    match &outcome {
        PromoteOutcome::Unchanged => {
            reporter.info(&format!("{} already live", path.display()));
        }
        PromoteOutcome::Promoted { reclaimed, previous } => {
            info!(
                "Published {} entities from {} feeds",
                manifest.total_entities(),
                manifest.feeds.len()
            );
            reporter.success(&format!(
                "{} -> {}",
                live_link.display(),
                path.display()
            ));
            if let (Some(previous), false) = (previous.as_ref(), *reclaimed) {
                reporter.warning(&format!(
                    "Previous snapshot {} could not be removed",
                    previous.display()
                ));
            }
        }
    }

    Ok(PublishedSnapshot {
        path,
        outcome,
        manifest,
    })
}

async fn populate<S, R>(
    config: &UpdateConfig,
    snapshot: &mut Snapshot,
    source: &S,
    reporter: &R,
) -> Result<SnapshotManifest, RunError>
where
    S: FeedSource + ?Sized,
    R: Reporter + ?Sized,
{
    let mut manifest = SnapshotManifest::new(snapshot.created_at(), config.schema);

    reporter.section("Feeds");
    for feed in &config.feeds {
        manifest
            .feeds
            .push(publish_feed(config, snapshot, feed, source, reporter).await?);
    }

    if let Some(discovery) = &config.discovery {
        reporter.section("Discovery");
        manifest.discovery = Some(copy_discovery(snapshot, discovery, source).await?);
        reporter.info(&format!("Copied discovery feed {}", discovery.url));
    }

    manifest
        .save(snapshot.path())
        .map_err(|source| RunError::Manifest {
            path: snapshot.path().to_path_buf(),
            source,
        })?;
    Ok(manifest)
}

async fn publish_feed<S, R>(
    config: &UpdateConfig,
    snapshot: &mut Snapshot,
    feed: &FeedDescriptor,
    source: &S,
    reporter: &R,
) -> Result<FeedManifest, RunError>
where
    S: FeedSource + ?Sized,
    R: Reporter + ?Sized,
{
    let fail = |stage: Stage, failure: FeedFailure| {
        reporter.feed_failed(&feed.name, stage, &failure.to_string());
        RunError::Feed {
            feed: feed.name.clone(),
            stage,
            source: failure,
        }
    };

    reporter.feed_stage(&feed.name, Stage::Fetch);
    let raw = source
        .fetch(&feed.url)
        .await
        .map_err(|e| fail(Stage::Fetch, e.into()))?;

    reporter.feed_stage(&feed.name, Stage::Validate);
    let document = MetadataValidator::new(config.schema, feed.fingerprint.clone())
        .validate(&raw)
        .map_err(|e| fail(Stage::Validate, e.into()))?;

    reporter.feed_stage(&feed.name, Stage::Index);
    let dir = snapshot
        .begin_feed(&feed.name)
        .map_err(|e| fail(Stage::Index, e.into()))?;
    let summary = indexer::index_document(&document, &dir, &config.index)
        .map_err(|e| fail(Stage::Index, e.into()))?;
    snapshot.mark_populated(&feed.name);

    if summary.entities == 0 {
        warn!("Feed {} contains no entities", feed.name);
    }
    info!(
        "Feed {}: {} entities, {} secondary keys",
        feed.name, summary.entities, summary.secondary_keys
    );
    reporter.feed_done(&feed.name, document.signer(), &summary);

    Ok(FeedManifest {
        name: feed.name.clone(),
        url: feed.url.clone(),
        signer: document.signer().clone(),
        summary,
    })
}

async fn copy_discovery<S>(snapshot: &Snapshot, discovery: &DiscoveryConfig, source: &S) -> Result<DiscoveryManifest, RunError>
where
    S: FeedSource + ?Sized,
{
    let fail = |failure: FeedFailure| RunError::Discovery {
        url: discovery.url.clone(),
        source: failure,
    };

    let body = source
        .fetch(&discovery.url)
        .await
        .map_err(|e| fail(e.into()))?;

    let dir = snapshot
        .create_dir(DISCOVERY_DIR)
        .map_err(|e| fail(e.into()))?;
    let path = dir.join(&discovery.file_name);
    std::fs::write(&path, &body).map_err(|source| fail(IndexingError::Write { path, source }.into()))?;

    Ok(DiscoveryManifest {
        url: discovery.url.clone(),
        path: discovery.relative_path(),
        bytes: body.len(),
    })
}
