//! Decompose a validated aggregate into content-addressed entity files.
//!
//! Every entity is written under the hex SHA-1 of its `entityID`, and again
//! under the hex SHA-1 of every endpoint location picked out by the configured
//! [`IndexTarget`]s. Each file is a standalone XML document holding the
//! entity's subtree in inclusive canonical form, comments preserved.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use lmdq_schema::{ContentAddress, DuplicatePolicy, IndexTarget, MD_NS};
use roxmltree::Node;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::IndexingError;
use crate::validator::ValidatedDocument;
use crate::xml::c14n::{self, C14nMethod};
use crate::xml::{children_named, is};

/// Prepended to every entity fragment.
pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOptions {
    pub targets: Vec<IndexTarget>,
    pub duplicates: DuplicatePolicy,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            targets: IndexTarget::defaults(),
            duplicates: DuplicatePolicy::default(),
        }
    }
}

/// One entity of an aggregate, serialized and ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    pub entity_id: String,
    /// Standalone XML document holding the entity.
    pub fragment: String,
    /// Secondary lookup keys, in document order, without repeats.
    pub endpoint_locations: Vec<String>,
}

impl EntityRecord {
    /// Build the record for an `md:EntityDescriptor` element.
    ///
    /// # Errors
    ///
    /// Returns [`IndexingError::MissingEntityId`] if the entity has no
    /// non-empty `entityID`. `position` is only used for the message.
    pub fn from_node(node: Node<'_, '_>, position: usize, targets: &[IndexTarget]) -> Result<Self, IndexingError> {
        let entity_id = node
            .attribute("entityID")
            .filter(|id| !id.is_empty())
            .ok_or(IndexingError::MissingEntityId { position })?;

        let method = C14nMethod::Inclusive {
            with_comments: true,
        };
        let mut fragment = String::from(XML_DECLARATION);
        fragment.push_str(&c14n::canonicalize(node, &method, None));

        Ok(Self {
            entity_id: entity_id.to_string(),
            fragment,
            endpoint_locations: endpoint_locations(node, targets),
        })
    }

    pub fn primary_address(&self) -> ContentAddress {
        ContentAddress::of(&self.entity_id)
    }

    pub fn secondary_addresses(&self) -> impl Iterator<Item = ContentAddress> + '_ {
        self.endpoint_locations.iter().map(|l| ContentAddress::of(l))
    }
}

/// What indexing one feed produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSummary {
    /// Entities written under their primary key.
    pub entities: usize,
    /// Secondary keys written.
    pub secondary_keys: usize,
    /// Distinct files in the feed directory.
    pub files: usize,
}

/// The entity elements of an aggregate: the document element itself if it is
/// an `EntityDescriptor`, otherwise the `EntityDescriptor` children of the
/// `EntitiesDescriptor` document element. Nested `EntitiesDescriptor` groups
/// are not descended into.
pub fn entity_nodes<'a, 'input>(root: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
    if is(root, MD_NS, "EntityDescriptor") {
        vec![root]
    } else if is(root, MD_NS, "EntitiesDescriptor") {
        children_named(root, MD_NS, "EntityDescriptor").collect()
    } else {
        Vec::new()
    }
}

/// Build the records of every entity in `document`, in document order.
///
/// # Errors
///
/// Returns [`IndexingError::MissingEntityId`] for an entity without an
/// `entityID`.
pub fn extract_entities(document: &ValidatedDocument<'_>, targets: &[IndexTarget]) -> Result<Vec<EntityRecord>, IndexingError> {
    entity_nodes(document.root())
        .into_iter()
        .enumerate()
        .map(|(position, node)| EntityRecord::from_node(node, position, targets))
        .collect()
}

/// Write every entity of `document` into `dest`, which must already exist.
///
/// Entities are processed in document order; a later entity that shares a
/// key with an earlier one replaces its file.
///
/// # Errors
///
/// Returns an [`IndexingError`] if an entity lacks an `entityID`, an
/// `entityID` repeats under [`DuplicatePolicy::Reject`], or a write fails.
/// Files written before the failure are left in place.
pub fn index_document(document: &ValidatedDocument<'_>, dest: &Path, options: &IndexOptions) -> Result<IndexSummary, IndexingError> {
    let mut seen = HashSet::new();
    let mut files = HashSet::new();
    let mut summary = IndexSummary::default();

    for (position, node) in entity_nodes(document.root()).into_iter().enumerate() {
        let record = EntityRecord::from_node(node, position, &options.targets)?;

        if !seen.insert(record.entity_id.clone()) {
            match options.duplicates {
                DuplicatePolicy::Overwrite => {
                    debug!("Duplicate entityID {}, last occurrence wins", record.entity_id);
                }
                DuplicatePolicy::Warn => {
                    warn!("Duplicate entityID {}, last occurrence wins", record.entity_id);
                }
                DuplicatePolicy::Reject => {
                    return Err(IndexingError::DuplicateEntity {
                        entity_id: record.entity_id,
                    });
                }
            }
        }

        let primary = record.primary_address();
        write_fragment(dest, &primary, &record.fragment)?;
        files.insert(primary);
        summary.entities += 1;

        for address in record.secondary_addresses() {
            write_fragment(dest, &address, &record.fragment)?;
            files.insert(address);
            summary.secondary_keys += 1;
        }
    }

    summary.files = files.len();
    debug!(
        "Indexed {} entities, {} secondary keys into {}",
        summary.entities,
        summary.secondary_keys,
        dest.display()
    );
    Ok(summary)
}

fn write_fragment(dest: &Path, address: &ContentAddress, fragment: &str) -> Result<(), IndexingError> {
    let path = dest.join(address.as_str());
    fs::write(&path, fragment).map_err(|source| IndexingError::Write { path, source })
}

fn endpoint_locations(entity: Node<'_, '_>, targets: &[IndexTarget]) -> Vec<String> {
    let mut locations: Vec<String> = Vec::new();
    for target in targets {
        for role in children_named(entity, MD_NS, &target.role) {
            for endpoint in children_named(role, MD_NS, &target.endpoint) {
                let binding = target.binding.as_deref();
                if binding.is_some_and(|b| endpoint.attribute("Binding") != Some(b)) {
                    continue;
                }
                let Some(location) = endpoint.attribute("Location").filter(|l| !l.is_empty()) else {
                    continue;
                };
                if !locations.iter().any(|l| l == location) {
                    locations.push(location.to_string());
                }
            }
        }
    }
    locations
}
