//! Offline validation of an aggregate file.

use std::path::Path;

use anyhow::{Context, Result};
use crossterm::style::Stylize;

use lmdq_core::indexer::extract_entities;
use lmdq_core::validate_metadata;
use lmdq_schema::{IndexTarget, KeyFingerprint, SchemaRef};

/// Run the same checks `update` applies to a fetched feed, then list the
/// entities and their lookup addresses.
pub fn validate(
    file: &Path,
    fingerprint: &KeyFingerprint,
    schema: SchemaRef,
    targets: &[IndexTarget],
    quiet: bool,
) -> Result<()> {
    let raw = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let document = validate_metadata(&raw, schema, fingerprint)?;

    let targets = if targets.is_empty() {
        IndexTarget::defaults()
    } else {
        targets.to_vec()
    };
    let entities = extract_entities(&document, &targets)?;
    let secondary: usize = entities.iter().map(|e| e.endpoint_locations.len()).sum();

    if !quiet {
        for entity in &entities {
            println!(
                "{} {}",
                entity.primary_address().as_str().dark_grey(),
                entity.entity_id
            );
            for (address, location) in entity.secondary_addresses().zip(&entity.endpoint_locations) {
                println!("  {} {location}", address.as_str().dark_grey());
            }
        }
        println!();
    }
    println!(
        "{}: valid, signed by {}, {} entities, {} endpoint keys",
        file.display(),
        document.signer(),
        entities.len(),
        secondary
    );
    Ok(())
}
