//! Configuration errors.

use thiserror::Error;

/// Malformed or missing configuration. Always fatal, always before a run starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The feed list contained no feeds at all.
    #[error("No feeds configured")]
    NoFeeds,

    /// A feed tuple did not split into exactly `name::url::fingerprint`.
    #[error("Wrong feed format '{0}'")]
    FeedFormat(String),

    /// One of the three feed fields was empty.
    #[error("Feed, url and hash string wrong '{0}'")]
    EmptyFeedField(String),

    /// A feed name cannot be used as a single directory segment.
    #[error("Invalid feed name '{0}': must be a single path segment")]
    InvalidFeedName(String),

    /// Two feeds share a name.
    #[error("Duplicate feed name '{0}'")]
    DuplicateFeed(String),

    /// A feed name collides with a directory the publisher reserves.
    #[error("Feed name '{0}' is reserved")]
    ReservedFeedName(String),

    /// A signer fingerprint is not a 40 digit hex SHA-1.
    #[error("Invalid key fingerprint '{0}': expected 40 hex characters")]
    InvalidFingerprint(String),

    /// Unknown schema reference.
    #[error("Unknown schema '{0}' (expected saml-metadata, ws-federation or saml-protocol)")]
    UnknownSchema(String),

    /// An index target did not parse as `Role/Endpoint[binding]`.
    #[error("Invalid index target '{0}': expected Role/Endpoint or Role/Endpoint[binding]")]
    InvalidIndexTarget(String),

    /// Unknown duplicate entity policy.
    #[error("Unknown duplicate policy '{0}' (expected overwrite, warn or reject)")]
    UnknownDuplicatePolicy(String),

    /// A required setting was absent or empty.
    #[error("Missing config for '{0}'")]
    Missing(&'static str),

    /// A directory or link name setting is unusable.
    #[error("Invalid value for '{name}': {reason}")]
    Invalid {
        /// Setting name.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}
