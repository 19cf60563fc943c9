//! Signed aggregate fixtures for unit tests.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use lmdq_schema::{DS_NS, KeyFingerprint};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::sign::Signer;
use openssl::x509::X509;

use crate::xml::dsig::{self, SignatureBlock};
use crate::xml::{MetadataDocument, child_elements, is};

pub(crate) const FEDERATION_FINGERPRINT: &str = "9777a99c407c7448352e9678525c920de05a74e2";
pub(crate) const ROGUE_FINGERPRINT: &str = "4b69db3b85329e486e37d624dcd84afd1f8d1318";

const FEDERATION_KEY: &str = include_str!("../testdata/federation.key");
const FEDERATION_CERT: &str = include_str!("../testdata/federation.crt");
const ROGUE_KEY: &str = include_str!("../testdata/rogue.key");
const ROGUE_CERT: &str = include_str!("../testdata/rogue.crt");

const AGGREGATE: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<md:EntitiesDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" xmlns:ds="http://www.w3.org/2000/09/xmldsig#" ID="_aggregate" Name="urn:test:federation">
<ds:Signature>
<ds:SignedInfo>
<ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>
<ds:SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"/>
<ds:Reference URI="#_aggregate">
<ds:Transforms>
<ds:Transform Algorithm="http://www.w3.org/2000/09/xmldsig#enveloped-signature"/>
<ds:Transform Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>
</ds:Transforms>
<ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>
<ds:DigestValue>{DIGEST}</ds:DigestValue>
</ds:Reference>
</ds:SignedInfo>
<ds:SignatureValue>{SIGNATURE}</ds:SignatureValue>
<ds:KeyInfo><ds:X509Data><ds:X509Certificate>{CERT}</ds:X509Certificate></ds:X509Data></ds:KeyInfo>
</ds:Signature>
{ENTITIES}
</md:EntitiesDescriptor>
"##;

const UNSIGNED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<md:EntitiesDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" xmlns:ds="http://www.w3.org/2000/09/xmldsig#" Name="urn:test:federation">
{ENTITIES}
</md:EntitiesDescriptor>
"#;

/// Signs aggregates with one of the test keys.
pub(crate) struct TestSigner {
    key: PKey<Private>,
    cert_base64: String,
}

impl TestSigner {
    pub(crate) fn federation() -> Self {
        Self::load(FEDERATION_KEY, FEDERATION_CERT)
    }

    pub(crate) fn rogue() -> Self {
        Self::load(ROGUE_KEY, ROGUE_CERT)
    }

    fn load(key_pem: &str, cert_pem: &str) -> Self {
        let key = PKey::private_key_from_pem(key_pem.as_bytes()).unwrap();
        let cert = X509::from_pem(cert_pem.as_bytes()).unwrap();
        Self {
            key,
            cert_base64: BASE64.encode(cert.to_der().unwrap()),
        }
    }

    /// Embed another signer's certificate while still signing with this key.
    pub(crate) fn with_certificate_of(mut self, other: &TestSigner) -> Self {
        self.cert_base64.clone_from(&other.cert_base64);
        self
    }

    pub(crate) fn certificate_base64(&self) -> &str {
        &self.cert_base64
    }

    /// An aggregate holding `entities`, enveloped-signed with this key.
    pub(crate) fn sign(&self, entities: &str) -> String {
        let fill = |digest: &str, signature: &str| {
            AGGREGATE
                .replace("{CERT}", &self.cert_base64)
                .replace("{DIGEST}", digest)
                .replace("{SIGNATURE}", signature)
                .replace("{ENTITIES}", entities)
        };

        let unsigned = fill("", "");
        let digest = {
            let doc = MetadataDocument::parse(unsigned.as_bytes()).unwrap();
            let block = SignatureBlock::parse(signature_element(&doc)).unwrap();
            BASE64.encode(dsig::reference_digest(doc.root(), &block).unwrap())
        };

        let digested = fill(&digest, "");
        let signature = {
            let doc = MetadataDocument::parse(digested.as_bytes()).unwrap();
            let block = SignatureBlock::parse(signature_element(&doc)).unwrap();
            let mut signer = Signer::new(MessageDigest::sha256(), &self.key).unwrap();
            signer
                .update(dsig::signed_info_octets(&block).as_bytes())
                .unwrap();
            BASE64.encode(signer.sign_to_vec().unwrap())
        };

        fill(&digest, &signature)
    }
}

fn signature_element<'a, 'input>(doc: &'a MetadataDocument<'input>) -> roxmltree::Node<'a, 'input> {
    child_elements(doc.root())
        .find(|n| is(*n, DS_NS, "Signature"))
        .unwrap()
}

pub(crate) fn federation_fingerprint() -> KeyFingerprint {
    KeyFingerprint::new(FEDERATION_FINGERPRINT).unwrap()
}

pub(crate) fn rogue_fingerprint() -> KeyFingerprint {
    KeyFingerprint::new(ROGUE_FINGERPRINT).unwrap()
}

/// An aggregate with no signature at all.
pub(crate) fn unsigned_aggregate(entities: &str) -> String {
    UNSIGNED.replace("{ENTITIES}", entities)
}

/// An entity descriptor. With `sso`, an identity provider whose HTTP-Redirect
/// single sign-on endpoint is at that location; without, a service provider.
pub(crate) fn entity(entity_id: &str, sso: Option<&str>) -> String {
    match sso {
        Some(location) => format!(
            r#"<md:EntityDescriptor entityID="{entity_id}">
<md:IDPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
<md:SingleSignOnService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="{location}/post"/>
<md:SingleSignOnService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" Location="{location}"/>
</md:IDPSSODescriptor>
</md:EntityDescriptor>
"#
        ),
        None => format!(
            r#"<md:EntityDescriptor entityID="{entity_id}">
<md:SPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
<md:AssertionConsumerService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="{entity_id}/acs" index="0"/>
</md:SPSSODescriptor>
</md:EntityDescriptor>
"#
        ),
    }
}

/// Replace the text between the first `open` and the following `close`.
pub(crate) fn replace_between(doc: &str, open: &str, close: &str, with: &str) -> String {
    let start = doc.find(open).unwrap() + open.len();
    let end = start + doc[start..].find(close).unwrap();
    format!("{}{with}{}", &doc[..start], &doc[end..])
}
