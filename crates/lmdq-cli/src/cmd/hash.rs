//! Hash command: lookup addresses and signer fingerprints.

use std::path::PathBuf;

use anyhow::{Context, Result};

use lmdq_core::xml::dsig::certificate_fingerprint;
use lmdq_schema::ContentAddress;

/// Print `<sha1> <key>` for every key, then `<fingerprint> <file>` for every
/// certificate.
pub fn hash(keys: &[String], certs: &[PathBuf]) -> Result<()> {
    for key in keys {
        println!("{} {key}", ContentAddress::of(key));
    }

    for cert in certs {
        let raw = std::fs::read(cert)
            .with_context(|| format!("Failed to read {}", cert.display()))?;
        let fingerprint = certificate_fingerprint(&raw)
            .with_context(|| format!("Not a usable RSA certificate: {}", cert.display()))?;
        println!("{fingerprint} {}", cert.display());
    }
    Ok(())
}
