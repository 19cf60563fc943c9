//! Read-only inspection of a base directory: what is live, what it holds,
//! and which snapshots are left over from abandoned or interrupted runs.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::is_snapshot_name;
use crate::error::PublishError;
use crate::manifest::{MANIFEST_FILE, SnapshotManifest};
use crate::snapshot::resolve_live_target;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirStats {
    pub name: String,
    pub files: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveStatus {
    pub live_link: PathBuf,
    /// Where the live link resolves to; `None` before the first promotion.
    pub target: Option<PathBuf>,
    pub manifest: Option<SnapshotManifest>,
    /// Subdirectories of the live snapshot and how many files each holds.
    pub directories: Vec<DirStats>,
    /// Snapshot directories other than the live one.
    pub stale_snapshots: Vec<PathBuf>,
}

/// Inspect `base_dir`.
///
/// # Errors
///
/// Returns a [`PublishError`] if the live path exists but is not a link, or
/// cannot be resolved.
pub fn inspect(base_dir: &Path, live_link: &str, snapshot_prefix: &str) -> Result<LiveStatus, PublishError> {
    let live_path = base_dir.join(live_link);
    let target = resolve_live_target(&live_path)?;

    let manifest = target.as_deref().and_then(|t| match SnapshotManifest::load(t) {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            debug!("No manifest in {}: {e}", t.display());
            None
        }
    });

    let directories = target.as_deref().map(directory_stats).unwrap_or_default();

    let mut stale_snapshots: Vec<PathBuf> = fs::read_dir(base_dir)
        .into_iter()
        .flatten()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter(|entry| is_snapshot_name(&entry.file_name().to_string_lossy(), snapshot_prefix))
        .map(|entry| entry.path())
        .filter(|path| fs::canonicalize(path).ok() != target)
        .collect();
    stale_snapshots.sort();

    Ok(LiveStatus {
        live_link: live_path,
        target,
        manifest,
        directories,
        stale_snapshots,
    })
}

fn directory_stats(snapshot: &Path) -> Vec<DirStats> {
    let mut stats: Vec<DirStats> = WalkDir::new(snapshot)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| DirStats {
            name: entry.file_name().to_string_lossy().into_owned(),
            files: WalkDir::new(entry.path())
                .min_depth(1)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file() && e.file_name() != MANIFEST_FILE)
                .count(),
        })
        .collect();
    stats.sort_by(|a, b| a.name.cmp(&b.name));
    stats
}
