//! Per-snapshot manifest.
//!
//! Written into the snapshot directory before promotion. The leading dot
//! keeps it out of every lookup key namespace, since content addresses are
//! bare hex.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use lmdq_schema::{FeedName, KeyFingerprint, SchemaRef};
use serde::{Deserialize, Serialize};

use crate::indexer::IndexSummary;

pub const MANIFEST_FILE: &str = ".lmdq-manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub created_at: DateTime<Utc>,
    /// Publisher that wrote the snapshot.
    pub generator: String,
    pub schema: SchemaRef,
    pub feeds: Vec<FeedManifest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery: Option<DiscoveryManifest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedManifest {
    pub name: FeedName,
    pub url: String,
    pub signer: KeyFingerprint,
    #[serde(flatten)]
    pub summary: IndexSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryManifest {
    pub url: String,
    /// Path relative to the snapshot root.
    pub path: String,
    pub bytes: usize,
}

impl SnapshotManifest {
    pub fn new(created_at: DateTime<Utc>, schema: SchemaRef) -> Self {
        Self {
            created_at,
            generator: crate::USER_AGENT.to_string(),
            schema,
            feeds: Vec::new(),
            discovery: None,
        }
    }

    /// Load the manifest of a snapshot directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse.
    pub fn load(snapshot_dir: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(snapshot_dir.join(MANIFEST_FILE))?;
        serde_json::from_str(&content).map_err(io::Error::other)
    }

    /// Write the manifest into `snapshot_dir`, via a temporary file and a
    /// rename so readers never see a partial manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization, writing or the rename fails.
    pub fn save(&self, snapshot_dir: &Path) -> io::Result<()> {
        let content = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        let path = snapshot_dir.join(MANIFEST_FILE);
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, &path)
    }

    /// Entities across all feeds.
    pub fn total_entities(&self) -> usize {
        self.feeds.iter().map(|f| f.summary.entities).sum()
    }
}
