// crates/ledgersql-config/src/lib.rs
// ============================================================================
// Module: LedgerSQL Config Library
// Description: Configuration model and validation for ledgersql.toml.
// Purpose: Single source of truth for node configuration semantics.
// Dependencies: ledgersql-core, ledgersql-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `ledgersql-config` loads `ledgersql.toml`, validates it fail-closed, and
//! converts each section into the runtime settings of the core and store
//! crates.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
