//! Trust decisions for fetched aggregates.
//!
//! An aggregate is accepted only if, in order:
//!
//! 1. it is well-formed and matches the selected schema,
//! 2. its document element carries exactly one signing certificate,
//! 3. that certificate yields an RSA key fingerprint,
//! 4. the enveloped signature verifies with that key, and
//! 5. the fingerprint equals the one pinned for the feed.
//!
//! The first failing check determines the error. Passing all of them yields a
//! [`ValidatedDocument`], the only input the indexer accepts.

use lmdq_schema::{DS_NS, KeyFingerprint, SchemaRef};
use roxmltree::Node;
use tracing::debug;

use crate::error::ValidationError;
use crate::schema;
use crate::xml::dsig::{self, SignatureBlock};
use crate::xml::{MetadataDocument, is};

/// An aggregate that passed every validation check.
///
/// Cannot be constructed any other way than through [`MetadataValidator`].
#[derive(Debug)]
pub struct ValidatedDocument<'input> {
    document: MetadataDocument<'input>,
    signer: KeyFingerprint,
}

impl<'input> ValidatedDocument<'input> {
    /// The document element.
    pub fn root(&self) -> Node<'_, 'input> {
        self.document.root()
    }

    pub fn document(&self) -> &MetadataDocument<'input> {
        &self.document
    }

    /// Fingerprint of the key that signed the aggregate.
    pub fn signer(&self) -> &KeyFingerprint {
        &self.signer
    }

    #[cfg(test)]
    pub(crate) fn unchecked(document: MetadataDocument<'input>, signer: KeyFingerprint) -> Self {
        Self { document, signer }
    }
}

/// Validates aggregates against one schema and one pinned signer.
#[derive(Debug, Clone)]
pub struct MetadataValidator {
    schema: SchemaRef,
    expected: KeyFingerprint,
}

impl MetadataValidator {
    pub fn new(schema: SchemaRef, expected: KeyFingerprint) -> Self {
        Self { schema, expected }
    }

    /// Run every check on `raw`.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] of the first check that fails.
    pub fn validate<'input>(&self, raw: &'input [u8]) -> Result<ValidatedDocument<'input>, ValidationError> {
        let document = MetadataDocument::parse(raw)?;
        schema::validate(&document, self.schema)?;

        let signer = {
            let root = document.root();
            let certificates = dsig::signing_certificates(root);
            let certificate = match certificates.as_slice() {
                [] => return Err(ValidationError::NotSigned),
                [one] => *one,
                many => {
                    return Err(ValidationError::AmbiguousSignature { count: many.len() });
                }
            };

            let (fingerprint, key) =
                dsig::certificate_key(certificate).map_err(ValidationError::signature_invalid)?;
            debug!("Aggregate signed by key {fingerprint}");

            let signature = certificate
                .ancestors()
                .find(|n| is(*n, DS_NS, "Signature"))
                .ok_or_else(|| ValidationError::signature_invalid("missing <ds:Signature>"))?;
            let block = SignatureBlock::parse(signature).map_err(ValidationError::signature_invalid)?;

            let digest =
                dsig::reference_digest(root, &block).map_err(ValidationError::signature_invalid)?;
            if digest != block.reference.digest_value {
                return Err(ValidationError::DigestMismatch {
                    fingerprint,
                    expected: self.expected.clone(),
                });
            }

            let verified =
                dsig::verify_signature_value(&block, &key).map_err(ValidationError::signature_invalid)?;
            if !verified {
                return Err(ValidationError::signature_invalid(format!(
                    "Signature value does not verify, {fingerprint} = {}",
                    self.expected
                )));
            }
            fingerprint
        };

        if signer != self.expected {
            return Err(ValidationError::UntrustedSigner {
                actual: signer,
                expected: self.expected.clone(),
            });
        }

        Ok(ValidatedDocument { document, signer })
    }
}

/// Validate `raw` against `schema`, requiring the signer `expected`.
///
/// # Errors
///
/// See [`MetadataValidator::validate`].
pub fn validate_metadata<'input>(
    raw: &'input [u8],
    schema: SchemaRef,
    expected: &KeyFingerprint,
) -> Result<ValidatedDocument<'input>, ValidationError> {
    MetadataValidator::new(schema, expected.clone()).validate(raw)
}
