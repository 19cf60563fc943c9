//! Content addresses and signer fingerprints.

use serde::{Deserialize, Deserializer, Serialize};
use sha1::{Digest, Sha1};

use crate::ConfigError;

/// Hex-encoded SHA-1 of a lookup key (an `entityID` or an endpoint location).
///
/// Used verbatim as a file name inside a feed directory, so two keys with the
/// same address resolve to the same file. Collisions are not defended against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ContentAddress(String);

impl ContentAddress {
    /// Compute the address of a lookup key.
    pub fn of(key: &str) -> Self {
        Self(hex::encode(Sha1::digest(key.as_bytes())))
    }

    /// Return the inner hex string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ContentAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A signer key fingerprint (40 lower-case hex characters).
///
/// This is the allowlist entry a feed is pinned to: the SHA-1 of the signing
/// certificate's RSA modulus, in the form `openssl x509 -noout -modulus`
/// prints it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct KeyFingerprint(String);

impl KeyFingerprint {
    /// Create a validated fingerprint. Upper-case input is normalised.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidFingerprint`] unless `s` is exactly 40
    /// ASCII hex characters.
    pub fn new(s: &str) -> Result<Self, ConfigError> {
        let s = s.trim();
        if s.len() == 40 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(ConfigError::InvalidFingerprint(s.to_string()))
        }
    }

    /// Fingerprint of an RSA modulus given as upper-case hex.
    pub fn from_modulus_hex(modulus_hex: &str) -> Self {
        let line = format!("Modulus={modulus_hex}\n");
        Self(hex::encode(Sha1::digest(line.as_bytes())))
    }

    /// Return the inner hex string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for KeyFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for KeyFingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for KeyFingerprint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for KeyFingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}
