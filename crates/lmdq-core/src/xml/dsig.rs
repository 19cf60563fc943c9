//! Enveloped XML-Signature verification of a document element.
//!
//! Supports one `Reference` covering the document element (`URI=""` or
//! `URI="#<root ID>"`), the enveloped-signature transform, inclusive and
//! exclusive canonicalization, SHA-1/SHA-2 digests and RSA PKCS#1 v1.5
//! signatures.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use lmdq_schema::{DS_NS, KeyFingerprint};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Public};
use openssl::sign::Verifier;
use openssl::x509::X509;
use roxmltree::Node;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use thiserror::Error;

use super::c14n::{self, C14nMethod, EXC_C14N};
use super::{child_elements, children_named, is};

pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

#[derive(Error, Debug)]
pub enum DsigError {
    #[error("missing <ds:{0}>")]
    Missing(&'static str),

    #[error("unsupported {kind} algorithm '{uri}'")]
    Unsupported { kind: &'static str, uri: String },

    #[error("expected exactly one <ds:Reference>, found {0}")]
    ReferenceCount(usize),

    #[error("reference '{0}' does not cover the document element")]
    ForeignReference(String),

    #[error("invalid base64 in <ds:{element}>: {source}")]
    Base64 {
        element: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("invalid signing certificate: {0}")]
    Certificate(#[source] openssl::error::ErrorStack),

    #[error("signing key is not an RSA key")]
    NotRsa,

    #[error("signature verification error: {0}")]
    Crypto(#[source] openssl::error::ErrorStack),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "http://www.w3.org/2000/09/xmldsig#sha1" => Some(Self::Sha1),
            "http://www.w3.org/2001/04/xmlenc#sha256" => Some(Self::Sha256),
            "http://www.w3.org/2001/04/xmldsig-more#sha384" => Some(Self::Sha384),
            "http://www.w3.org/2001/04/xmlenc#sha512" => Some(Self::Sha512),
            _ => None,
        }
    }

    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => Sha1::digest(data).to_vec(),
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    fn message_digest(self) -> MessageDigest {
        match self {
            Self::Sha1 => MessageDigest::sha1(),
            Self::Sha256 => MessageDigest::sha256(),
            Self::Sha384 => MessageDigest::sha384(),
            Self::Sha512 => MessageDigest::sha512(),
        }
    }
}

/// RSA PKCS#1 v1.5 with the given digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureAlgorithm(pub DigestAlgorithm);

impl SignatureAlgorithm {
    pub fn from_uri(uri: &str) -> Option<Self> {
        let digest = match uri {
            "http://www.w3.org/2000/09/xmldsig#rsa-sha1" => DigestAlgorithm::Sha1,
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256" => DigestAlgorithm::Sha256,
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384" => DigestAlgorithm::Sha384,
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512" => DigestAlgorithm::Sha512,
            _ => return None,
        };
        Some(Self(digest))
    }
}

#[derive(Debug, Clone)]
pub struct Reference {
    pub uri: String,
    pub enveloped: bool,
    pub c14n: C14nMethod,
    pub digest: DigestAlgorithm,
    pub digest_value: Vec<u8>,
}

/// The parts of a `<ds:Signature>` element needed to verify it.
#[derive(Debug, Clone)]
pub struct SignatureBlock<'a, 'input> {
    pub element: Node<'a, 'input>,
    pub signed_info: Node<'a, 'input>,
    pub c14n: C14nMethod,
    pub algorithm: SignatureAlgorithm,
    pub reference: Reference,
    pub signature_value: Vec<u8>,
}

impl<'a, 'input> SignatureBlock<'a, 'input> {
    /// Parse a `<ds:Signature>` element.
    ///
    /// # Errors
    ///
    /// Returns a [`DsigError`] for missing parts, unsupported algorithms,
    /// more than one reference, or undecodable values.
    pub fn parse(signature: Node<'a, 'input>) -> Result<Self, DsigError> {
        let signed_info = ds_child(signature, "SignedInfo")?;
        let c14n = c14n_method(ds_child(signed_info, "CanonicalizationMethod")?)?;

        let method = ds_child(signed_info, "SignatureMethod")?;
        let method_uri = method.attribute("Algorithm").unwrap_or_default();
        let algorithm = SignatureAlgorithm::from_uri(method_uri).ok_or_else(|| {
            DsigError::Unsupported {
                kind: "signature",
                uri: method_uri.to_string(),
            }
        })?;

        let references: Vec<_> = children_named(signed_info, DS_NS, "Reference").collect();
        let [reference] = references.as_slice() else {
            return Err(DsigError::ReferenceCount(references.len()));
        };

        let signature_value = decode_base64(ds_child(signature, "SignatureValue")?, "SignatureValue")?;

        Ok(Self {
            element: signature,
            signed_info,
            c14n,
            algorithm,
            reference: parse_reference(*reference)?,
            signature_value,
        })
    }
}

fn parse_reference(reference: Node<'_, '_>) -> Result<Reference, DsigError> {
    let mut enveloped = false;
    let mut c14n = C14nMethod::default();
    if let Some(transforms) = children_named(reference, DS_NS, "Transforms").next() {
        for transform in children_named(transforms, DS_NS, "Transform") {
            match transform.attribute("Algorithm").unwrap_or_default() {
                ENVELOPED_SIGNATURE => enveloped = true,
                _ => c14n = c14n_method(transform)?,
            }
        }
    }

    let digest_uri = ds_child(reference, "DigestMethod")?
        .attribute("Algorithm")
        .unwrap_or_default();
    let digest = DigestAlgorithm::from_uri(digest_uri).ok_or_else(|| DsigError::Unsupported {
        kind: "digest",
        uri: digest_uri.to_string(),
    })?;

    Ok(Reference {
        uri: reference.attribute("URI").unwrap_or_default().to_string(),
        enveloped,
        c14n,
        digest,
        digest_value: decode_base64(ds_child(reference, "DigestValue")?, "DigestValue")?,
    })
}

/// A canonicalization method element, with its optional
/// `InclusiveNamespaces/@PrefixList`.
fn c14n_method(node: Node<'_, '_>) -> Result<C14nMethod, DsigError> {
    let uri = node.attribute("Algorithm").unwrap_or_default();
    let method = C14nMethod::from_algorithm(uri).ok_or_else(|| DsigError::Unsupported {
        kind: "canonicalization",
        uri: uri.to_string(),
    })?;
    let prefixes = children_named(node, EXC_C14N, "InclusiveNamespaces")
        .next()
        .and_then(|n| n.attribute("PrefixList"))
        .map(|list| list.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    Ok(method.with_inclusive_prefixes(prefixes))
}

fn ds_child<'a, 'input>(node: Node<'a, 'input>, local: &'static str) -> Result<Node<'a, 'input>, DsigError> {
    children_named(node, DS_NS, local)
        .next()
        .ok_or(DsigError::Missing(local))
}

fn decode_base64(node: Node<'_, '_>, element: &'static str) -> Result<Vec<u8>, DsigError> {
    let text: String = node
        .descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .flat_map(str::chars)
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    BASE64
        .decode(text)
        .map_err(|source| DsigError::Base64 { element, source })
}

/// The `<ds:X509Certificate>` elements under the document element's own
/// `ds:Signature/ds:KeyInfo/ds:X509Data`.
pub fn signing_certificates<'a, 'input>(root: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
    child_elements(root)
        .filter(|n| is(*n, DS_NS, "Signature"))
        .flat_map(|sig| children_named(sig, DS_NS, "KeyInfo"))
        .flat_map(|info| children_named(info, DS_NS, "X509Data"))
        .flat_map(|data| children_named(data, DS_NS, "X509Certificate"))
        .collect()
}

/// Decode an `<ds:X509Certificate>` and return its public key together with
/// the fingerprint of its RSA modulus.
///
/// # Errors
///
/// Returns a [`DsigError`] if the certificate does not decode or its key is
/// not RSA.
pub fn certificate_key(cert: Node<'_, '_>) -> Result<(KeyFingerprint, PKey<Public>), DsigError> {
    let der = decode_base64(cert, "X509Certificate")?;
    let x509 = X509::from_der(&der).map_err(DsigError::Certificate)?;
    x509_key(&x509)
}

/// Fingerprint of a PEM or DER encoded certificate file.
///
/// # Errors
///
/// Returns a [`DsigError`] if the input is neither, or its key is not RSA.
pub fn certificate_fingerprint(encoded: &[u8]) -> Result<KeyFingerprint, DsigError> {
    let parsed = if encoded.starts_with(b"-----BEGIN") {
        X509::from_pem(encoded)
    } else {
        X509::from_der(encoded)
    };
    let x509 = parsed.map_err(DsigError::Certificate)?;
    x509_key(&x509).map(|(fingerprint, _)| fingerprint)
}

fn x509_key(x509: &X509) -> Result<(KeyFingerprint, PKey<Public>), DsigError> {
    let key = x509.public_key().map_err(DsigError::Certificate)?;
    let rsa = key.rsa().map_err(|_| DsigError::NotRsa)?;
    let modulus = rsa.n().to_hex_str().map_err(DsigError::Certificate)?;
    Ok((KeyFingerprint::from_modulus_hex(&modulus), key))
}

/// Recompute the digest of the document element as the reference describes.
///
/// # Errors
///
/// Returns [`DsigError::ForeignReference`] if the reference points anywhere
/// but the document element.
pub fn reference_digest(root: Node<'_, '_>, block: &SignatureBlock<'_, '_>) -> Result<Vec<u8>, DsigError> {
    let reference = &block.reference;
    let covers_root = match reference.uri.strip_prefix('#') {
        None => reference.uri.is_empty(),
        Some(id) => ["ID", "Id", "id"]
            .iter()
            .any(|attr| root.attribute(*attr) == Some(id)),
    };
    if !covers_root {
        return Err(DsigError::ForeignReference(reference.uri.clone()));
    }

    let exclude = reference.enveloped.then(|| block.element.id());
    let octets = c14n::canonicalize(root, &reference.c14n, exclude);
    Ok(reference.digest.digest(octets.as_bytes()))
}

/// Canonical form of `<ds:SignedInfo>`; the bytes the signature value signs.
pub fn signed_info_octets(block: &SignatureBlock<'_, '_>) -> String {
    c14n::canonicalize(block.signed_info, &block.c14n, None)
}

/// Check the signature value over the canonical `SignedInfo` with `key`.
///
/// # Errors
///
/// Returns [`DsigError::Crypto`] if OpenSSL cannot run the verification at
/// all, e.g. for a signature of the wrong length.
pub fn verify_signature_value(block: &SignatureBlock<'_, '_>, key: &PKey<Public>) -> Result<bool, DsigError> {
    let octets = signed_info_octets(block);
    let mut verifier =
        Verifier::new(block.algorithm.0.message_digest(), key).map_err(DsigError::Crypto)?;
    verifier
        .update(octets.as_bytes())
        .map_err(DsigError::Crypto)?;
    verifier
        .verify(&block.signature_value)
        .map_err(DsigError::Crypto)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FEDERATION_FINGERPRINT, TestSigner, entity};
    use crate::xml::MetadataDocument;

    #[test]
    fn fingerprint_of_embedded_certificate() {
        let signed = TestSigner::federation().sign(&entity("https://idp.example.org", None));
        let doc = MetadataDocument::parse(signed.as_bytes()).unwrap();
        let certs = signing_certificates(doc.root());
        assert_eq!(certs.len(), 1);
        let (fingerprint, _) = certificate_key(certs[0]).unwrap();
        assert_eq!(fingerprint.as_str(), FEDERATION_FINGERPRINT);
    }

    #[test]
    fn fingerprint_of_pem_and_der_files() {
        let pem = include_bytes!("../../testdata/rogue.crt");
        let fingerprint = certificate_fingerprint(pem).unwrap();
        assert_eq!(fingerprint.as_str(), crate::test_support::ROGUE_FINGERPRINT);

        let der = X509::from_pem(pem).unwrap().to_der().unwrap();
        assert_eq!(certificate_fingerprint(&der).unwrap(), fingerprint);
        assert!(certificate_fingerprint(b"not a certificate").is_err());
    }

    #[test]
    fn parses_signature_block() {
        let signed = TestSigner::federation().sign(&entity("https://idp.example.org", None));
        let doc = MetadataDocument::parse(signed.as_bytes()).unwrap();
        let sig = child_elements(doc.root())
            .find(|n| is(*n, DS_NS, "Signature"))
            .unwrap();
        let block = SignatureBlock::parse(sig).unwrap();
        assert_eq!(block.algorithm, SignatureAlgorithm(DigestAlgorithm::Sha256));
        assert_eq!(block.reference.uri, "#_aggregate");
        assert!(block.reference.enveloped);
        assert_eq!(block.reference.digest_value.len(), 32);
        assert_eq!(
            reference_digest(doc.root(), &block).unwrap(),
            block.reference.digest_value
        );
    }

    #[test]
    fn reference_to_another_element_is_refused() {
        let signed = TestSigner::federation()
            .sign(&entity("https://idp.example.org", None))
            .replace("URI=\"#_aggregate\"", "URI=\"#elsewhere\"");
        let doc = MetadataDocument::parse(signed.as_bytes()).unwrap();
        let sig = child_elements(doc.root())
            .find(|n| is(*n, DS_NS, "Signature"))
            .unwrap();
        let block = SignatureBlock::parse(sig).unwrap();
        assert!(matches!(
            reference_digest(doc.root(), &block),
            Err(DsigError::ForeignReference(_))
        ));
    }

    #[test]
    fn unknown_digest_is_unsupported() {
        let signed = TestSigner::federation()
            .sign(&entity("https://idp.example.org", None))
            .replace("xmlenc#sha256", "xmldsig#md5");
        let doc = MetadataDocument::parse(signed.as_bytes()).unwrap();
        let sig = child_elements(doc.root())
            .find(|n| is(*n, DS_NS, "Signature"))
            .unwrap();
        assert!(matches!(
            SignatureBlock::parse(sig),
            Err(DsigError::Unsupported { kind: "digest", .. })
        ));
    }
}
