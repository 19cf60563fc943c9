//! lMDQ core: validate, decompose and publish signed SAML metadata aggregates.
//!
//! A run fetches every configured feed, verifies each aggregate
//! ([`validator`]), splits it into one file per lookup key inside a fresh
//! snapshot directory ([`indexer`]), and only when every feed succeeded swaps
//! the live link over to the new snapshot ([`snapshot`]). Consumers reading
//! through the live link see either the previous complete dataset or the new
//! complete dataset.
//!
//! # Directory Layout
//!
//! ```text
//! <base>/
//! ├── lmdqdata -> lmdqdata_1700000000     # live link
//! └── lmdqdata_1700000000/
//!     ├── .lmdq-manifest.json
//!     ├── <feed-name>/<sha1-hex>          # one entity fragment per lookup key
//!     └── discofeed/<file>                # optional discovery passthrough
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod indexer;
pub mod manifest;
pub mod pipeline;
pub mod reporter;
pub mod schema;
pub mod snapshot;
pub mod status;
pub mod validator;
pub mod xml;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{DiscoveryConfig, UpdateConfig};
pub use error::{
    FeedFailure, FetchError, IndexingError, PublishError, RunError, SchemaViolation, Stage,
    ValidationError,
};
pub use fetch::{FeedSource, FetchOptions, HttpFeedSource};
pub use indexer::{EntityRecord, IndexOptions, IndexSummary};
pub use pipeline::{PublishedSnapshot, run_update};
pub use reporter::{NullReporter, Reporter};
pub use snapshot::{PromoteOutcome, Snapshot, promote_snapshot};
pub use validator::{MetadataValidator, ValidatedDocument, validate_metadata};

/// User Agent string for feed fetches
pub const USER_AGENT: &str = concat!("lmdq/", env!("CARGO_PKG_VERSION"));
