// crates/ledgersql-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic example for docs and `ledgersql config example`.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example `ledgersql.toml`. Every key is shown with its default
//! except the store path.

/// Returns a canonical example `ledgersql.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[store]
path = "/var/lib/ledgersql/projection.db"
busy_timeout_ms = 5000
journal_mode = "wal"
sync_mode = "full"
read_pool_size = 4

[sync]
enabled = true
auto_load_tables = true
idle_wait_ms = 500
chain_id = "main"

[check_hash]
expiry_interval_ms = 1000
max_pending_per_table = 1024

[apply]
verify_affected_rows = true
dry_run_on_apply = true
"#,
    )
}
