//! Subcommand implementations.

pub mod hash;
pub mod status;
pub mod update;
pub mod validate;
