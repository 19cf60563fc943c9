//! Run configuration.
//!
//! Assembled by the CLI from flags and `LMDQ_*` environment variables, then
//! checked once before a run touches the filesystem.

use std::path::{Path, PathBuf};

use lmdq_schema::{ConfigError, FeedDescriptor, SchemaRef};

use crate::fetch::FetchOptions;
use crate::indexer::IndexOptions;
use crate::manifest::MANIFEST_FILE;

pub const DEFAULT_SNAPSHOT_PREFIX: &str = "lmdqdata_";
pub const DEFAULT_LIVE_LINK: &str = "lmdqdata";

/// Snapshot subdirectory the discovery feed is copied into.
pub const DISCOVERY_DIR: &str = "discofeed";

/// A discovery feed copied verbatim into every snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub url: String,
    /// File name inside [`DISCOVERY_DIR`].
    pub file_name: String,
}

impl DiscoveryConfig {
    /// Without an explicit `file_name`, the last path segment of `url` is
    /// used.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the URL is empty or no usable file name
    /// can be derived.
    pub fn new(url: &str, file_name: Option<&str>) -> Result<Self, ConfigError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ConfigError::Missing("discovery-url"));
        }
        let file_name = file_name.unwrap_or_else(|| filename_from_url(url));
        check_segment("discovery-file", file_name)?;
        Ok(Self {
            url: url.to_string(),
            file_name: file_name.to_string(),
        })
    }

    /// Path of the copy relative to the snapshot root.
    pub fn relative_path(&self) -> String {
        format!("{DISCOVERY_DIR}/{}", self.file_name)
    }
}

/// Everything one publisher run needs.
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    pub feeds: Vec<FeedDescriptor>,
    /// Directory holding the snapshots and the live link.
    pub base_dir: PathBuf,
    pub snapshot_prefix: String,
    /// Name of the live link inside `base_dir`.
    pub live_link: String,
    pub schema: SchemaRef,
    pub index: IndexOptions,
    pub fetch: FetchOptions,
    pub discovery: Option<DiscoveryConfig>,
    /// Remove the partial snapshot of a failed run.
    pub reclaim_abandoned: bool,
}

impl UpdateConfig {
    /// A configuration with defaults for everything but feeds and base
    /// directory.
    pub fn new(feeds: Vec<FeedDescriptor>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            feeds,
            base_dir: base_dir.into(),
            snapshot_prefix: DEFAULT_SNAPSHOT_PREFIX.to_string(),
            live_link: DEFAULT_LIVE_LINK.to_string(),
            schema: SchemaRef::default(),
            index: IndexOptions::default(),
            fetch: FetchOptions::default(),
            discovery: None,
            reclaim_abandoned: false,
        }
    }

    pub fn live_link_path(&self) -> PathBuf {
        self.base_dir.join(&self.live_link)
    }

    /// Check the configuration for problems detectable without I/O.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.feeds.is_empty() {
            return Err(ConfigError::NoFeeds);
        }
        if self.base_dir.as_os_str().is_empty() {
            return Err(ConfigError::Missing("base-dir"));
        }
        check_segment("snapshot-prefix", &self.snapshot_prefix)?;
        check_segment("live-link", &self.live_link)?;

        if is_snapshot_name(&self.live_link, &self.snapshot_prefix) {
            return Err(ConfigError::Invalid {
                name: "live-link",
                reason: format!(
                    "'{}' could collide with a snapshot named '{}<timestamp>'",
                    self.live_link, self.snapshot_prefix
                ),
            });
        }

        for feed in &self.feeds {
            let name = feed.name.as_str();
            if name == DISCOVERY_DIR || name == MANIFEST_FILE {
                return Err(ConfigError::ReservedFeedName(name.to_string()));
            }
        }

        if self.fetch.timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: "fetch-timeout",
                reason: "must be at least one second".to_string(),
            });
        }
        Ok(())
    }
}

/// True if `name` is `prefix` followed by nothing but digits.
pub fn is_snapshot_name(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit()))
}

/// Extract the last path segment of a URL, ignoring any query or fragment.
pub fn filename_from_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

fn check_segment(name: &'static str, value: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        name,
        reason: reason.to_string(),
    };
    if value.is_empty() {
        return Err(ConfigError::Missing(name));
    }
    if value == "." || value == ".." {
        return Err(invalid("must not be '.' or '..'"));
    }
    if Path::new(value).components().count() != 1 || value.contains(['/', '\\', '\0']) {
        return Err(invalid("must be a single path segment"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmdq_schema::parse_feed_list;
    use std::time::Duration;

    const FP: &str = "9777a99c407c7448352e9678525c920de05a74e2";

    fn config(feeds: &str) -> UpdateConfig {
        UpdateConfig::new(parse_feed_list(feeds).unwrap(), "/srv/lmdq")
    }

    #[test]
    fn defaults_pass() {
        let cfg = config(&format!("hub::https://md.example.org/hub.xml::{FP}"));
        cfg.check().unwrap();
        assert_eq!(cfg.live_link_path(), PathBuf::from("/srv/lmdq/lmdqdata"));
    }

    #[test]
    fn reserved_feed_names() {
        let cfg = config(&format!("discofeed::https://md.example.org/hub.xml::{FP}"));
        assert_eq!(
            cfg.check(),
            Err(ConfigError::ReservedFeedName("discofeed".into()))
        );
    }

    #[test]
    fn live_link_must_not_look_like_a_snapshot() {
        let mut cfg = config(&format!("hub::https://md.example.org/hub.xml::{FP}"));
        cfg.live_link = "lmdqdata_".into();
        assert!(matches!(
            cfg.check(),
            Err(ConfigError::Invalid { name: "live-link", .. })
        ));
        cfg.live_link = "current".into();
        cfg.check().unwrap();
    }

    #[test]
    fn path_like_names_are_refused() {
        let mut cfg = config(&format!("hub::https://md.example.org/hub.xml::{FP}"));
        cfg.live_link = "../escape".into();
        assert!(cfg.check().is_err());
        cfg.live_link = "lmdqdata".into();
        cfg.snapshot_prefix = String::new();
        assert_eq!(cfg.check(), Err(ConfigError::Missing("snapshot-prefix")));
    }

    #[test]
    fn zero_timeout_is_refused() {
        let mut cfg = config(&format!("hub::https://md.example.org/hub.xml::{FP}"));
        cfg.fetch.timeout = Duration::ZERO;
        assert!(cfg.check().is_err());
    }

    #[test]
    fn discovery_file_name_from_url() {
        let d = DiscoveryConfig::new(
            "https://wayf.example.org/disco/wayf-interfed.discofeed.jsgz?v=2",
            None,
        )
        .unwrap();
        assert_eq!(d.file_name, "wayf-interfed.discofeed.jsgz");
        assert_eq!(d.relative_path(), "discofeed/wayf-interfed.discofeed.jsgz");

        let d = DiscoveryConfig::new("https://wayf.example.org/", Some("feed.json")).unwrap();
        assert_eq!(d.file_name, "feed.json");

        assert!(DiscoveryConfig::new("https://wayf.example.org/", None).is_err());
    }
}
