//! Feed descriptors and the `name::url::fingerprint;;...` list format.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, KeyFingerprint};

/// Separator between feed tuples.
pub const FEED_SEPARATOR: &str = ";;";

/// Separator between the fields of one feed tuple.
pub const FIELD_SEPARATOR: &str = "::";

/// Name of a feed. Also the name of the feed's directory inside a snapshot,
/// so it must be a single, non-special path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedName(String);

impl FeedName {
    /// Create a validated feed name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidFeedName`] for empty names, `.`/`..`,
    /// names containing a path separator or NUL, and names starting with `.`
    /// (those are reserved for publisher bookkeeping files).
    pub fn new(s: &str) -> Result<Self, ConfigError> {
        let invalid = s.is_empty()
            || s.starts_with('.')
            || s.chars().any(|c| c == '/' || c == '\\' || c == '\0');
        if invalid {
            return Err(ConfigError::InvalidFeedName(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Return the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FeedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for FeedName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One configured metadata feed. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDescriptor {
    /// Unique feed name.
    pub name: FeedName,
    /// Where the aggregate is fetched from.
    pub url: String,
    /// Fingerprint the aggregate's signer must have.
    pub fingerprint: KeyFingerprint,
}

impl FeedDescriptor {
    /// Parse a single `name::url::fingerprint` tuple.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the tuple does not have exactly three
    /// non-empty fields, or if the name or fingerprint is malformed.
    pub fn parse(tuple: &str) -> Result<Self, ConfigError> {
        let fields: Vec<&str> = tuple.split(FIELD_SEPARATOR).collect();
        let [name, url, fingerprint] = fields.as_slice() else {
            return Err(ConfigError::FeedFormat(tuple.to_string()));
        };
        if name.is_empty() || url.is_empty() || fingerprint.is_empty() {
            return Err(ConfigError::EmptyFeedField(tuple.to_string()));
        }

        Ok(Self {
            name: FeedName::new(name)?,
            url: (*url).to_string(),
            fingerprint: KeyFingerprint::new(fingerprint)?,
        })
    }
}

/// Parse a full feed list, e.g.
/// `hub::https://md.example.org/hub.xml::3c9a...;;edu::https://...::...`.
///
/// Surrounding whitespace around each tuple is ignored; empty tuples are not.
///
/// # Errors
///
/// Returns a [`ConfigError`] for an empty list, any malformed tuple, or a
/// repeated feed name.
pub fn parse_feed_list(list: &str) -> Result<Vec<FeedDescriptor>, ConfigError> {
    if list.trim().is_empty() {
        return Err(ConfigError::NoFeeds);
    }

    let mut feeds: Vec<FeedDescriptor> = Vec::new();
    for tuple in list.split(FEED_SEPARATOR) {
        let feed = FeedDescriptor::parse(tuple.trim())?;
        if feeds.iter().any(|f| f.name == feed.name) {
            return Err(ConfigError::DuplicateFeed(feed.name.to_string()));
        }
        feeds.push(feed);
    }
    Ok(feeds)
}
