//! Snapshot directories and atomic promotion of the live link.
//!
//! A snapshot moves through `Created -> Populating -> Promoted` or ends up
//! `Abandoned`. Only a snapshot in which every configured feed was populated
//! can be promoted. Promotion replaces the live link with a single
//! `rename(2)` of a freshly created link, so a reader resolving the live path
//! at any instant sees the previous target or the new one and nothing in
//! between.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use lmdq_schema::FeedName;
use tracing::{debug, info, warn};

use crate::error::{IndexingError, PublishError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Populating,
    Populated,
}

/// A new, not yet published data directory.
#[derive(Debug)]
pub struct Snapshot {
    path: PathBuf,
    created_at: DateTime<Utc>,
    feeds: BTreeMap<FeedName, FeedState>,
}

impl Snapshot {
    /// Create `<base_dir>/<prefix><unix seconds>` for the current time.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::CreateSnapshot`] if the directory cannot be
    /// created, including when a snapshot with the same name already exists.
    pub fn create(base_dir: &Path, prefix: &str) -> Result<Self, PublishError> {
        Self::create_at(base_dir, prefix, Utc::now())
    }

    /// Create the snapshot directory for an explicit creation time.
    ///
    /// # Errors
    ///
    /// See [`Snapshot::create`].
    pub fn create_at(base_dir: &Path, prefix: &str, created_at: DateTime<Utc>) -> Result<Self, PublishError> {
        let path = base_dir.join(format!("{prefix}{}", created_at.timestamp()));
        fs::create_dir(&path).map_err(|source| PublishError::CreateSnapshot {
            path: path.clone(),
            source,
        })?;
        info!("Created snapshot {}", path.display());
        Ok(Self {
            path,
            created_at,
            feeds: BTreeMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Create the feed's directory and mark the feed as populating.
    ///
    /// # Errors
    ///
    /// Returns [`IndexingError::CreateDir`] if the directory cannot be created.
    pub fn begin_feed(&mut self, feed: &FeedName) -> Result<PathBuf, IndexingError> {
        let dir = self.create_dir(feed.as_str())?;
        self.feeds.insert(feed.clone(), FeedState::Populating);
        Ok(dir)
    }

    /// Record that every entity of `feed` has been written.
    pub fn mark_populated(&mut self, feed: &FeedName) {
        if let Some(state) = self.feeds.get_mut(feed) {
            *state = FeedState::Populated;
        }
    }

    pub fn feed_state(&self, feed: &FeedName) -> Option<FeedState> {
        self.feeds.get(feed).copied()
    }

    /// Create a directory in the snapshot that does not belong to a feed.
    ///
    /// # Errors
    ///
    /// Returns [`IndexingError::CreateDir`] if the directory cannot be created.
    pub fn create_dir(&self, name: &str) -> Result<PathBuf, IndexingError> {
        let dir = self.path.join(name);
        fs::create_dir(&dir).map_err(|source| IndexingError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    /// Publish this snapshot through `live_link`.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Incomplete`] unless every feed in `feeds` has
    /// been populated, otherwise whatever [`promote_snapshot`] returns.
    pub fn promote(self, live_link: &Path, feeds: &[FeedName]) -> Result<PromoteOutcome, PublishError> {
        let missing: Vec<String> = feeds
            .iter()
            .filter(|f| self.feed_state(f) != Some(FeedState::Populated))
            .map(ToString::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(PublishError::Incomplete { missing });
        }
        promote_snapshot(live_link, &self.path)
    }

    /// Give up on this snapshot. The live link is never touched. With
    /// `reclaim`, the partial directory is removed.
    pub fn abandon(self, reclaim: bool) {
        if reclaim {
            match fs::remove_dir_all(&self.path) {
                Ok(()) => info!("Removed abandoned snapshot {}", self.path.display()),
                Err(e) => warn!(
                    "Failed to remove abandoned snapshot {}: {e}",
                    self.path.display()
                ),
            }
        } else {
            warn!("Abandoned snapshot left at {}", self.path.display());
        }
    }
}

/// What promotion did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromoteOutcome {
    /// The live link already pointed at the snapshot.
    Unchanged,
    Promoted {
        /// Where the live link pointed before, if anywhere.
        previous: Option<PathBuf>,
        /// Whether the previous snapshot directory was removed.
        reclaimed: bool,
    },
}

/// Point `live_link` at `new_snapshot` and reclaim the previous target.
///
/// 1. resolve where the live link points now,
/// 2. stop if that already is `new_snapshot`,
/// 3. create a temporary link to `new_snapshot` and rename it over the live
///    link, and
/// 4. best-effort remove the previous target directory.
///
/// A failure in step 4 is logged and reported through
/// [`PromoteOutcome::Promoted::reclaimed`], not as an error.
///
/// # Errors
///
/// Returns a [`PublishError`] if the snapshot is missing, the live path is
/// not a link, or the link cannot be replaced. The live link is unchanged in
/// every error case.
pub fn promote_snapshot(live_link: &Path, new_snapshot: &Path) -> Result<PromoteOutcome, PublishError> {
    let new_target = fs::canonicalize(new_snapshot).map_err(|source| PublishError::MissingSnapshot {
        path: new_snapshot.to_path_buf(),
        source,
    })?;

    let previous = resolve_live_target(live_link)?;
    if previous.as_deref() == Some(new_target.as_path()) {
        debug!(
            "{} already points at {}",
            live_link.display(),
            new_target.display()
        );
        return Ok(PromoteOutcome::Unchanged);
    }

    swap_live_link(live_link, new_snapshot)?;
    info!(
        "Promoted {} -> {}",
        live_link.display(),
        new_snapshot.display()
    );

    let reclaimed = previous.as_deref().is_some_and(reclaim);
    Ok(PromoteOutcome::Promoted {
        previous,
        reclaimed,
    })
}

/// The canonical directory `live_link` points at. `None` if there is no live
/// link yet or it dangles.
///
/// # Errors
///
/// Returns [`PublishError::NotALink`] if something other than a symbolic
/// link occupies the live path.
pub fn resolve_live_target(live_link: &Path) -> Result<Option<PathBuf>, PublishError> {
    let meta = match fs::symlink_metadata(live_link) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PublishError::ResolveLink {
                path: live_link.to_path_buf(),
                source,
            });
        }
    };
    if !meta.file_type().is_symlink() {
        return Err(PublishError::NotALink {
            path: live_link.to_path_buf(),
        });
    }
    match fs::canonicalize(live_link) {
        Ok(target) => Ok(Some(target)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("Live link {} dangles", live_link.display());
            Ok(None)
        }
        Err(source) => Err(PublishError::ResolveLink {
            path: live_link.to_path_buf(),
            source,
        }),
    }
}

/// Atomically replace `live_link` with a link to `new_snapshot`.
///
/// # Errors
///
/// Returns [`PublishError::CreateLink`] if the temporary link cannot be
/// created and [`PublishError::ReplaceLink`] if the rename fails.
pub fn swap_live_link(live_link: &Path, new_snapshot: &Path) -> Result<(), PublishError> {
    let target = link_target(live_link, new_snapshot);
    let temp = temp_link_path(live_link);

    // Left behind by an interrupted run
    if fs::symlink_metadata(&temp).is_ok_and(|m| m.file_type().is_symlink()) {
        let _ = fs::remove_file(&temp);
    }

    std::os::unix::fs::symlink(&target, &temp).map_err(|source| PublishError::CreateLink {
        path: temp.clone(),
        source,
    })?;

    if let Err(source) = fs::rename(&temp, live_link) {
        let _ = fs::remove_file(&temp);
        return Err(PublishError::ReplaceLink {
            path: live_link.to_path_buf(),
            source,
        });
    }
    Ok(())
}

/// Relative link target when the snapshot sits next to the link, so the
/// base directory can be moved as a whole.
fn link_target(live_link: &Path, snapshot: &Path) -> PathBuf {
    match (snapshot.parent(), snapshot.file_name()) {
        (Some(parent), Some(name)) if Some(parent) == live_link.parent() => PathBuf::from(name),
        _ => fs::canonicalize(snapshot).unwrap_or_else(|_| snapshot.to_path_buf()),
    }
}

fn temp_link_path(live_link: &Path) -> PathBuf {
    let name = live_link
        .file_name()
        .map_or_else(|| "live".into(), |n| n.to_string_lossy());
    live_link.with_file_name(format!(".{name}.tmp-{}", std::process::id()))
}

fn reclaim(previous: &Path) -> bool {
    if !previous.is_dir() {
        return false;
    }
    match fs::remove_dir_all(previous) {
        Ok(()) => {
            debug!("Reclaimed {}", previous.display());
            true
        }
        Err(e) => {
            warn!("Failed to reclaim {}: {e}", previous.display());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    const PREFIX: &str = "lmdqdata_";

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn feed(name: &str) -> FeedName {
        FeedName::new(name).unwrap()
    }

    fn populated(base: &Path, secs: i64, feeds: &[FeedName]) -> Snapshot {
        let mut snapshot = Snapshot::create_at(base, PREFIX, at(secs)).unwrap();
        for f in feeds {
            snapshot.begin_feed(f).unwrap();
            snapshot.mark_populated(f);
        }
        snapshot
    }

    #[test]
    fn snapshot_named_after_prefix_and_timestamp() {
        let base = tempdir().unwrap();
        let snapshot = Snapshot::create_at(base.path(), PREFIX, at(1_700_000_000)).unwrap();
        assert_eq!(snapshot.path(), base.path().join("lmdqdata_1700000000"));
        assert!(snapshot.path().is_dir());
    }

    #[test]
    fn same_second_collision_is_an_error() {
        let base = tempdir().unwrap();
        Snapshot::create_at(base.path(), PREFIX, at(42)).unwrap();
        let err = Snapshot::create_at(base.path(), PREFIX, at(42)).unwrap_err();
        assert!(matches!(err, PublishError::CreateSnapshot { .. }));
    }

    #[test]
    fn missing_base_dir_is_an_error() {
        let base = tempdir().unwrap();
        let err = Snapshot::create_at(&base.path().join("nope"), PREFIX, at(1)).unwrap_err();
        assert!(matches!(err, PublishError::CreateSnapshot { .. }));
    }

    #[test]
    fn first_promotion_creates_relative_link() {
        let base = tempdir().unwrap();
        let feeds = [feed("hub")];
        let snapshot = populated(base.path(), 1, &feeds);
        let live = base.path().join("lmdqdata");

        let outcome = snapshot.promote(&live, &feeds).unwrap();
        assert_eq!(
            outcome,
            PromoteOutcome::Promoted {
                previous: None,
                reclaimed: false
            }
        );
        assert_eq!(fs::read_link(&live).unwrap(), PathBuf::from("lmdqdata_1"));
        assert!(live.join("hub").is_dir());
    }

    #[test]
    fn promotion_reclaims_previous_snapshot() {
        let base = tempdir().unwrap();
        let feeds = [feed("hub")];
        let live = base.path().join("lmdqdata");
        populated(base.path(), 1, &feeds).promote(&live, &feeds).unwrap();

        let outcome = populated(base.path(), 2, &feeds).promote(&live, &feeds).unwrap();
        let PromoteOutcome::Promoted {
            previous,
            reclaimed,
        } = outcome
        else {
            panic!("expected promotion");
        };
        assert_eq!(
            previous,
            Some(fs::canonicalize(base.path()).unwrap().join("lmdqdata_1"))
        );
        assert!(reclaimed);
        assert!(!base.path().join("lmdqdata_1").exists());
        assert_eq!(fs::read_link(&live).unwrap(), PathBuf::from("lmdqdata_2"));
    }

    #[test]
    fn promoting_current_target_is_a_no_op() {
        let base = tempdir().unwrap();
        let feeds = [feed("hub")];
        let live = base.path().join("lmdqdata");
        let snapshot = populated(base.path(), 1, &feeds);
        let path = snapshot.path().to_path_buf();
        snapshot.promote(&live, &feeds).unwrap();

        assert_eq!(
            promote_snapshot(&live, &path).unwrap(),
            PromoteOutcome::Unchanged
        );
        assert!(path.join("hub").is_dir());
        assert_eq!(fs::read_link(&live).unwrap(), PathBuf::from("lmdqdata_1"));
    }

    #[test]
    fn incomplete_snapshot_is_not_promoted() {
        let base = tempdir().unwrap();
        let live = base.path().join("lmdqdata");
        let mut snapshot = Snapshot::create_at(base.path(), PREFIX, at(1)).unwrap();
        snapshot.begin_feed(&feed("a")).unwrap();
        snapshot.mark_populated(&feed("a"));
        snapshot.begin_feed(&feed("b")).unwrap();

        let err = snapshot.promote(&live, &[feed("a"), feed("b"), feed("c")]).unwrap_err();
        let PublishError::Incomplete { missing } = err else {
            panic!("expected incomplete, got {err}");
        };
        assert_eq!(missing, ["b", "c"]);
        assert!(fs::symlink_metadata(&live).is_err());
    }

    #[test]
    fn regular_directory_at_live_path_is_refused() {
        let base = tempdir().unwrap();
        let feeds = [feed("hub")];
        let live = base.path().join("lmdqdata");
        fs::create_dir(&live).unwrap();

        let err = populated(base.path(), 1, &feeds).promote(&live, &feeds).unwrap_err();
        assert!(matches!(err, PublishError::NotALink { .. }));
        assert!(live.is_dir());
        assert!(base.path().join("lmdqdata_1").is_dir());
    }

    #[test]
    fn dangling_live_link_is_replaced() {
        let base = tempdir().unwrap();
        let feeds = [feed("hub")];
        let live = base.path().join("lmdqdata");
        std::os::unix::fs::symlink("lmdqdata_0", &live).unwrap();

        let outcome = populated(base.path(), 1, &feeds).promote(&live, &feeds).unwrap();
        assert_eq!(
            outcome,
            PromoteOutcome::Promoted {
                previous: None,
                reclaimed: false
            }
        );
        assert!(live.join("hub").is_dir());
    }

    #[test]
    fn swap_without_reclaim_leaves_both_snapshots_consistent() {
        // A run interrupted between the link swap and reclamation.
        let base = tempdir().unwrap();
        let feeds = [feed("hub")];
        let live = base.path().join("lmdqdata");
        populated(base.path(), 1, &feeds).promote(&live, &feeds).unwrap();
        let next = populated(base.path(), 2, &feeds);

        swap_live_link(&live, next.path()).unwrap();

        assert_eq!(
            fs::canonicalize(&live).unwrap(),
            fs::canonicalize(next.path()).unwrap()
        );
        assert!(base.path().join("lmdqdata_1/hub").is_dir());
        assert!(!base.path().join(format!(".lmdqdata.tmp-{}", std::process::id())).exists());

        // The next run finds a stale snapshot, not a broken link.
        let third = populated(base.path(), 3, &feeds);
        third.promote(&live, &feeds).unwrap();
        assert!(!base.path().join("lmdqdata_2").exists());
        assert!(base.path().join("lmdqdata_1").exists());
    }

    #[test]
    fn snapshot_outside_link_directory_gets_absolute_target() {
        let base = tempdir().unwrap();
        let links = tempdir().unwrap();
        let feeds = [feed("hub")];
        let live = links.path().join("current");
        let snapshot = populated(base.path(), 1, &feeds);
        let expected = fs::canonicalize(snapshot.path()).unwrap();

        snapshot.promote(&live, &feeds).unwrap();
        assert_eq!(fs::read_link(&live).unwrap(), expected);
    }

    #[test]
    fn abandon_with_reclaim_removes_directory() {
        let base = tempdir().unwrap();
        let snapshot = populated(base.path(), 1, &[feed("hub")]);
        let path = snapshot.path().to_path_buf();
        snapshot.abandon(true);
        assert!(!path.exists());

        let snapshot = populated(base.path(), 2, &[feed("hub")]);
        let path = snapshot.path().to_path_buf();
        snapshot.abandon(false);
        assert!(path.exists());
    }
}
