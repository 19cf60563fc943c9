//! Error taxonomy for a publisher run.
//!
//! Every failure is fatal to the run that hit it. There is no retry anywhere;
//! the only decision left to the caller is how to report it.

use std::path::PathBuf;
use std::time::Duration;

use lmdq_schema::{ConfigError, FeedName, KeyFingerprint};
use thiserror::Error;

/// The aggregate is not well-formed or does not match the selected schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Document validation error {code}: {message}")]
pub struct SchemaViolation {
    /// Implementation-defined validation error code.
    pub code: i32,
    /// Human-readable detail.
    pub message: String,
}

impl SchemaViolation {
    /// Not UTF-8, not well-formed, truncated, or carrying a DTD.
    pub const NOT_WELL_FORMED: i32 = -1;
    /// Attribute value outside its allowed range.
    pub const INVALID_VALUE: i32 = 1824;
    /// The document element is not a global element of the schema.
    pub const NO_GLOBAL_DECLARATION: i32 = 1845;
    /// A required attribute is missing or empty.
    pub const MISSING_ATTRIBUTE: i32 = 1868;
    /// An element appears where the schema does not allow it.
    pub const UNEXPECTED_ELEMENT: i32 = 1871;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_well_formed(message: impl Into<String>) -> Self {
        Self::new(Self::NOT_WELL_FORMED, message)
    }
}

/// Why an aggregate was refused. Checked in this order, first failure wins.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error(transparent)]
    SchemaViolation(#[from] SchemaViolation),

    #[error("Metadata not signed")]
    NotSigned,

    #[error("Ambiguous signature: {count} signing certificates found, expected exactly one")]
    AmbiguousSignature { count: usize },

    #[error("Signature check failed. {reason}")]
    SignatureInvalid { reason: String },

    /// The content digest does not match the signed digest value. A sub-case
    /// of [`ValidationError::SignatureInvalid`].
    #[error("Signature check failed. Signature digest mismatch, {fingerprint} = {expected}")]
    DigestMismatch {
        fingerprint: KeyFingerprint,
        expected: KeyFingerprint,
    },

    #[error("Untrusted signer: signed by {actual}, expected {expected}")]
    UntrustedSigner {
        actual: KeyFingerprint,
        expected: KeyFingerprint,
    },
}

impl ValidationError {
    pub(crate) fn signature_invalid(reason: impl std::fmt::Display) -> Self {
        Self::SignatureInvalid {
            reason: reason.to_string(),
        }
    }

    /// True for cryptographic verification failures, digest mismatches included.
    pub fn is_signature_invalid(&self) -> bool {
        matches!(
            self,
            Self::SignatureInvalid { .. } | Self::DigestMismatch { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Status code: {status} ({url})")]
    Status { url: String, status: u16 },

    #[error("Timed out after {}s fetching {url}", timeout.as_secs())]
    Timeout { url: String, timeout: Duration },

    #[error("Transport error fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum IndexingError {
    #[error("Entity #{position} has no entityID")]
    MissingEntityId { position: usize },

    #[error("Duplicate entityID '{entity_id}'")]
    DuplicateEntity { entity_id: String },

    #[error("Failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Create new datafolder {} failed: {source}", path.display())]
    CreateSnapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot {} is not accessible: {source}", path.display())]
    MissingSnapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot is incomplete, feeds not populated: {}", missing.join(", "))]
    Incomplete { missing: Vec<String> },

    #[error("Failed to resolve live link {}: {source}", path.display())]
    ResolveLink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} exists and is not a symbolic link", path.display())]
    NotALink { path: PathBuf },

    #[error("Failed to create link {}: {source}", path.display())]
    CreateLink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to replace live link {}: {source}", path.display())]
    ReplaceLink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Pipeline stage a feed failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Validate,
    Index,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Fetch => "fetch",
            Self::Validate => "validation",
            Self::Index => "indexing",
        })
    }
}

#[derive(Error, Debug)]
pub enum FeedFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Indexing(#[from] IndexingError),
}

/// Why a run did not promote a new snapshot.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to create snapshot: {0}")]
    Snapshot(#[source] PublishError),

    #[error("Feed '{feed}' failed during {stage}: {source}")]
    Feed {
        feed: FeedName,
        stage: Stage,
        #[source]
        source: FeedFailure,
    },

    #[error("Discovery feed {url} failed: {source}")]
    Discovery {
        url: String,
        #[source]
        source: FeedFailure,
    },

    #[error("Failed to write snapshot manifest {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to publish snapshot {}: {source}", snapshot.display())]
    Publish {
        snapshot: PathBuf,
        #[source]
        source: PublishError,
    },
}

impl RunError {
    /// Live pointer swap failures are the highest-severity class.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Publish { .. })
    }

    /// Name of the failing feed, if the failure belongs to one.
    pub fn feed(&self) -> Option<&FeedName> {
        match self {
            Self::Feed { feed, .. } => Some(feed),
            _ => None,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Feed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
