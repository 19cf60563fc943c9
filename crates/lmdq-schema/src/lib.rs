//! Shared types for the lMDQ metadata publisher.
//!
//! Everything in this crate is plain data: parsing and validation of the
//! configuration-facing values (feed descriptors, fingerprints, index
//! targets) and the content addresses used as on-disk file names. No I/O
//! happens here.

pub mod error;
pub mod feed;
pub mod hash;
pub mod types;

// Re-exports
pub use error::ConfigError;
pub use feed::{FeedDescriptor, FeedName, parse_feed_list};
pub use hash::{ContentAddress, KeyFingerprint};
pub use types::{DuplicatePolicy, IndexTarget, SchemaRef};

/// SAML 2.0 metadata namespace.
pub const MD_NS: &str = "urn:oasis:names:tc:SAML:2.0:metadata";

/// SAML 2.0 protocol namespace.
pub const SAMLP_NS: &str = "urn:oasis:names:tc:SAML:2.0:protocol";

/// XML Signature namespace.
pub const DS_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// SAML HTTP-Redirect binding, used by the default secondary index.
pub const HTTP_REDIRECT_BINDING: &str = "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect";
