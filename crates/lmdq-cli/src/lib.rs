//! lmdq - local metadata query publisher
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
//!
//! Fetches signed SAML metadata aggregates, verifies them against pinned
//! signing keys, and publishes one file per entity lookup key into a
//! snapshot directory that is swapped in atomically behind a symlink.
//!
//! # Commands
//!
//! - `update`: run the publisher once (typically from cron).
//! - `validate`: check a local aggregate without publishing anything.
//! - `status`: show what the live link points at and leftover snapshots.
//! - `hash`: print lookup addresses and signing key fingerprints.

pub mod cmd;
pub mod ui;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use lmdq_core::config::{DEFAULT_LIVE_LINK, DEFAULT_SNAPSHOT_PREFIX};
use lmdq_core::{DiscoveryConfig, FetchOptions, IndexOptions, UpdateConfig};
use lmdq_schema::{
    ConfigError, DuplicatePolicy, IndexTarget, KeyFingerprint, SchemaRef, parse_feed_list,
};

#[derive(Debug, Parser)]
#[command(name = "lmdq")]
#[command(author, version, about = "lmdq - publish signed SAML metadata for per-entity lookup")]
pub struct Cli {
    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch, verify and publish every configured feed
    Update(UpdateArgs),
    /// Verify a local aggregate and list its entities
    Validate {
        /// Aggregate file
        file: PathBuf,
        /// Expected signing key fingerprint (sha1 of the RSA modulus)
        #[arg(long)]
        fingerprint: KeyFingerprint,
        /// Schema to validate against
        #[arg(long, default_value = "saml-metadata")]
        schema: SchemaRef,
        /// Secondary lookup keys to count, as Role/Endpoint[binding]
        #[arg(long = "index-target", value_delimiter = ',')]
        index_targets: Vec<IndexTarget>,
    },
    /// Show the live snapshot and any leftovers
    Status {
        #[command(flatten)]
        location: LocationArgs,
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Print lookup addresses of keys and fingerprints of certificates
    Hash {
        /// Entity IDs or endpoint locations
        #[arg(required_unless_present = "certs")]
        keys: Vec<String>,
        /// PEM or DER certificate files
        #[arg(long = "cert")]
        certs: Vec<PathBuf>,
    },
}

/// Where snapshots and the live link live.
#[derive(Debug, Clone, Args)]
pub struct LocationArgs {
    /// Directory holding the snapshots and the live link
    #[arg(long, env = "LMDQ_BASE_DIR")]
    pub base_dir: PathBuf,
    /// Name prefix of snapshot directories
    #[arg(long, env = "LMDQ_SNAPSHOT_PREFIX", default_value = DEFAULT_SNAPSHOT_PREFIX)]
    pub snapshot_prefix: String,
    /// Name of the live link inside the base directory
    #[arg(long, env = "LMDQ_LIVE_LINK", default_value = DEFAULT_LIVE_LINK)]
    pub live_link: String,
}

#[derive(Debug, Clone, Args)]
pub struct UpdateArgs {
    /// Feeds as name::url::fingerprint, separated by ';;'
    #[arg(long, env = "LMDQ_FEEDS")]
    pub feeds: String,

    #[command(flatten)]
    pub location: LocationArgs,

    /// Schema every aggregate is validated against
    #[arg(long, env = "LMDQ_SCHEMA", default_value = "saml-metadata")]
    pub schema: SchemaRef,

    /// Secondary lookup keys, as Role/Endpoint[binding] (repeatable or comma separated)
    #[arg(long = "index-target", env = "LMDQ_INDEX_TARGETS", value_delimiter = ',')]
    pub index_targets: Vec<IndexTarget>,

    /// What to do when an entity ID appears twice in one feed: overwrite, warn or reject
    #[arg(long, env = "LMDQ_DUPLICATES", default_value = "overwrite")]
    pub duplicates: DuplicatePolicy,

    /// Per-request timeout in seconds
    #[arg(long, env = "LMDQ_FETCH_TIMEOUT", default_value_t = 30)]
    pub fetch_timeout: u64,

    /// Skip TLS certificate verification (signatures are still checked)
    #[arg(long, env = "LMDQ_INSECURE_TRANSPORT")]
    pub insecure_transport: bool,

    /// Discovery feed copied verbatim into every snapshot
    #[arg(long, env = "LMDQ_DISCOVERY_URL")]
    pub discovery_url: Option<String>,

    /// File name for the discovery copy (defaults to the URL's last segment)
    #[arg(long, env = "LMDQ_DISCOVERY_FILE", requires = "discovery_url")]
    pub discovery_file: Option<String>,

    /// Delete the partial snapshot when a run fails
    #[arg(long, env = "LMDQ_RECLAIM_ABANDONED")]
    pub reclaim_abandoned: bool,
}

impl UpdateArgs {
    /// Assemble and check the run configuration.
    pub fn into_config(self) -> Result<UpdateConfig, ConfigError> {
        let feeds = parse_feed_list(&self.feeds)?;
        let mut config = UpdateConfig::new(feeds, self.location.base_dir);
        config.snapshot_prefix = self.location.snapshot_prefix;
        config.live_link = self.location.live_link;
        config.schema = self.schema;
        config.index = IndexOptions {
            targets: if self.index_targets.is_empty() {
                IndexTarget::defaults()
            } else {
                self.index_targets
            },
            duplicates: self.duplicates,
        };
        config.fetch = FetchOptions {
            timeout: Duration::from_secs(self.fetch_timeout),
            insecure_transport: self.insecure_transport,
        };
        config.discovery = self
            .discovery_url
            .as_deref()
            .map(|url| DiscoveryConfig::new(url, self.discovery_file.as_deref()))
            .transpose()?;
        config.reclaim_abandoned = self.reclaim_abandoned;

        config.check()?;
        Ok(config)
    }
}
