//! Structural schema checks for aggregates.
//!
//! These cover the parts of the SAML schemas the publisher depends on: the
//! document element, the entity tree under it, the attributes lookups are
//! keyed on, and the endpoint attributes secondary keys are read from. Codes
//! follow the numbering libxml2 uses for the same failures.

use lmdq_schema::{DS_NS, MD_NS, SAMLP_NS, SchemaRef};
use roxmltree::Node;

use crate::error::SchemaViolation;
use crate::xml::{MetadataDocument, child_elements, is, qualified_name};

/// Longest `entityID` the metadata schema allows.
pub const MAX_ENTITY_ID_LEN: usize = 1024;

const ENTITY_CHILDREN: &[&str] = &[
    "Extensions",
    "Organization",
    "ContactPerson",
    "AdditionalMetadataLocation",
    "AffiliationDescriptor",
];

const ROLE_DESCRIPTORS: &[&str] = &[
    "RoleDescriptor",
    "IDPSSODescriptor",
    "SPSSODescriptor",
    "AuthnAuthorityDescriptor",
    "AttributeAuthorityDescriptor",
    "PDPDescriptor",
];

const ENDPOINTS: &[&str] = &[
    "ArtifactResolutionService",
    "SingleLogoutService",
    "ManageNameIDService",
    "SingleSignOnService",
    "NameIDMappingService",
    "AssertionIDRequestService",
    "AssertionConsumerService",
    "AttributeConsumingServiceEndpoint",
    "AuthnQueryService",
    "AttributeService",
    "AuthzService",
];

const PROTOCOL_ROOTS: &[&str] = &[
    "AuthnRequest",
    "Response",
    "LogoutRequest",
    "LogoutResponse",
    "ArtifactResolve",
    "ArtifactResponse",
    "AttributeQuery",
    "AuthnQuery",
    "AuthzDecisionQuery",
    "AssertionIDRequest",
    "ManageNameIDRequest",
    "ManageNameIDResponse",
    "NameIDMappingRequest",
    "NameIDMappingResponse",
];

/// Check a parsed document against `schema`.
///
/// # Errors
///
/// Returns the first [`SchemaViolation`] found, in document order.
pub fn validate(document: &MetadataDocument<'_>, schema: SchemaRef) -> Result<(), SchemaViolation> {
    let root = document.root();
    match schema {
        SchemaRef::SamlMetadata => {
            if is(root, MD_NS, "EntitiesDescriptor") {
                check_entities(root)
            } else if is(root, MD_NS, "EntityDescriptor") {
                check_entity(root)
            } else {
                Err(no_declaration(root))
            }
        }
        SchemaRef::SamlProtocol => {
            let known = root.tag_name().namespace() == Some(SAMLP_NS)
                && PROTOCOL_ROOTS.contains(&root.tag_name().name());
            if !known {
                return Err(no_declaration(root));
            }
            require(root, "ID")?;
            require(root, "Version")?;
            Ok(())
        }
    }
}

fn check_entities(node: Node<'_, '_>) -> Result<(), SchemaViolation> {
    for child in child_elements(node) {
        if is(child, DS_NS, "Signature") || is(child, MD_NS, "Extensions") {
            continue;
        }
        if is(child, MD_NS, "EntityDescriptor") {
            check_entity(child)?;
        } else if is(child, MD_NS, "EntitiesDescriptor") {
            check_entities(child)?;
        } else {
            return Err(unexpected(child));
        }
    }
    Ok(())
}

fn check_entity(node: Node<'_, '_>) -> Result<(), SchemaViolation> {
    let entity_id = require(node, "entityID")?;
    if entity_id.chars().count() > MAX_ENTITY_ID_LEN {
        return Err(SchemaViolation::new(
            SchemaViolation::INVALID_VALUE,
            format!(
                "Element '{}', attribute 'entityID': has a length of {}; this exceeds the allowed maximum length of '{MAX_ENTITY_ID_LEN}'.",
                qualified_name(node),
                entity_id.chars().count()
            ),
        ));
    }

    for child in child_elements(node) {
        if is(child, DS_NS, "Signature") {
            continue;
        }
        let in_md = child.tag_name().namespace() == Some(MD_NS);
        let name = child.tag_name().name();
        if in_md && ROLE_DESCRIPTORS.contains(&name) {
            check_role(child)?;
        } else if !(in_md && ENTITY_CHILDREN.contains(&name)) {
            return Err(unexpected(child));
        }
    }
    Ok(())
}

fn check_role(node: Node<'_, '_>) -> Result<(), SchemaViolation> {
    require(node, "protocolSupportEnumeration")?;
    for child in child_elements(node) {
        if child.tag_name().namespace() == Some(MD_NS) && ENDPOINTS.contains(&child.tag_name().name()) {
            require(child, "Binding")?;
            require(child, "Location")?;
        }
    }
    Ok(())
}

fn require<'a>(node: Node<'a, '_>, attr: &str) -> Result<&'a str, SchemaViolation> {
    match node.attribute(attr) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(SchemaViolation::new(
            SchemaViolation::MISSING_ATTRIBUTE,
            format!(
                "Element '{}': The attribute '{attr}' is required but missing.",
                qualified_name(node)
            ),
        )),
    }
}

fn no_declaration(node: Node<'_, '_>) -> SchemaViolation {
    SchemaViolation::new(
        SchemaViolation::NO_GLOBAL_DECLARATION,
        format!(
            "Element '{}': No matching global declaration available for the validation root.",
            qualified_name(node)
        ),
    )
}

fn unexpected(node: Node<'_, '_>) -> SchemaViolation {
    SchemaViolation::new(
        SchemaViolation::UNEXPECTED_ELEMENT,
        format!(
            "Element '{}': This element is not expected.",
            qualified_name(node)
        ),
    )
}
