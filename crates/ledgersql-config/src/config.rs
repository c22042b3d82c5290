// crates/ledgersql-config/src/config.rs
// ============================================================================
// Module: LedgerSQL Configuration
// Description: Configuration loading and validation for a projection node.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: ledgersql-core, ledgersql-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults, so an empty file is a valid configuration.
//! Sections convert into [`SqliteStoreConfig`], [`TableStorageConfig`],
//! [`CheckHashConfig`], and [`ProcessorConfig`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use ledgersql_core::CheckHashConfig;
use ledgersql_core::ProcessorConfig;
use ledgersql_core::TableStorageConfig;
use ledgersql_core::runtime::check_hash::DEFAULT_EXPIRY_INTERVAL_MS;
use ledgersql_core::runtime::check_hash::DEFAULT_MAX_PENDING_PER_TABLE;
use ledgersql_core::runtime::sync::DEFAULT_CHAIN_ID;
use ledgersql_core::runtime::sync::DEFAULT_IDLE_WAIT_MS;
use ledgersql_store_sqlite::SqliteStoreConfig;
use ledgersql_store_sqlite::SqliteStoreMode;
use ledgersql_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "ledgersql.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "LEDGERSQL_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default `SQLite` database path.
const DEFAULT_STORE_PATH: &str = "ledgersql.db";
/// Maximum busy timeout in milliseconds.
pub(crate) const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;
/// Maximum number of pooled read connections.
pub(crate) const MAX_READ_POOL_SIZE: usize = 64;
/// Minimum worker idle wait in milliseconds.
pub(crate) const MIN_IDLE_WAIT_MS: u64 = 1;
/// Maximum worker idle wait in milliseconds.
pub(crate) const MAX_IDLE_WAIT_MS: u64 = 60_000;
/// Maximum chain identifier length.
pub(crate) const MAX_CHAIN_ID_LENGTH: usize = 64;
/// Minimum check-hash expiry sweep interval in milliseconds.
pub(crate) const MIN_EXPIRY_INTERVAL_MS: u64 = 10;
/// Maximum check-hash expiry sweep interval in milliseconds.
pub(crate) const MAX_EXPIRY_INTERVAL_MS: u64 = 3_600_000;
/// Maximum pending check-hash entries per table.
pub(crate) const MAX_PENDING_LIMIT: usize = 65_536;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Projection node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSqlConfig {
    /// `SQLite` store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Sync engine configuration.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Check-hash tracker configuration.
    #[serde(default)]
    pub check_hash: CheckHashSection,
    /// Apply-path configuration.
    #[serde(default)]
    pub apply: ApplyConfig,
}

impl LedgerSqlConfig {
    /// Loads configuration from disk using the default resolution rules:
    /// the explicit path, then `LEDGERSQL_CONFIG`, then `ledgersql.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] when validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.sync.validate()?;
        self.check_hash.validate()?;
        Ok(())
    }
}

/// `SQLite` store section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file path.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// Synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Number of read-only connections.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            read_pool_size: default_read_pool_size(),
        }
    }
}

impl StoreConfig {
    /// Validates the store section.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("store.path", &self.path.to_string_lossy())?;
        if self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "store.busy_timeout_ms must be at most {MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        if self.read_pool_size == 0 || self.read_pool_size > MAX_READ_POOL_SIZE {
            return Err(ConfigError::Invalid(format!(
                "store.read_pool_size must be between 1 and {MAX_READ_POOL_SIZE}"
            )));
        }
        Ok(())
    }

    /// Returns the `SQLite` store settings.
    #[must_use]
    pub fn to_store_config(&self) -> SqliteStoreConfig {
        SqliteStoreConfig {
            path: self.path.clone(),
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
            read_pool_size: self.read_pool_size,
        }
    }
}

/// Sync engine section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Initial state of the process-wide sync gate.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Reload auto-sync tables from the store at startup.
    #[serde(default = "default_true")]
    pub auto_load_tables: bool,
    /// Worker idle wait in milliseconds.
    #[serde(default = "default_idle_wait_ms")]
    pub idle_wait_ms: u64,
    /// Chain identifier stamped on sync records.
    #[serde(default = "default_chain_id")]
    pub chain_id: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_load_tables: true,
            idle_wait_ms: default_idle_wait_ms(),
            chain_id: default_chain_id(),
        }
    }
}

impl SyncConfig {
    /// Validates the sync section.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout_range(
            "sync.idle_wait_ms",
            self.idle_wait_ms,
            MIN_IDLE_WAIT_MS,
            MAX_IDLE_WAIT_MS,
        )?;
        let chain_id = self.chain_id.as_str();
        if chain_id.is_empty() || chain_id.len() > MAX_CHAIN_ID_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "sync.chain_id must be 1 to {MAX_CHAIN_ID_LENGTH} characters"
            )));
        }
        let allowed = |byte: u8| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_';
        if !chain_id.bytes().all(allowed) {
            return Err(ConfigError::Invalid(
                "sync.chain_id must contain only ascii letters, digits, '-' or '_'".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the sync engine settings.
    #[must_use]
    pub fn to_storage_config(&self) -> TableStorageConfig {
        TableStorageConfig {
            chain_id: self.chain_id.clone(),
            enabled: self.enabled,
            idle_wait: Duration::from_millis(self.idle_wait_ms),
        }
    }
}

/// Check-hash tracker section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckHashSection {
    /// Expiry sweep interval in milliseconds.
    #[serde(default = "default_expiry_interval_ms")]
    pub expiry_interval_ms: u64,
    /// Maximum unconfirmed submissions per table.
    #[serde(default = "default_max_pending_per_table")]
    pub max_pending_per_table: usize,
}

impl Default for CheckHashSection {
    fn default() -> Self {
        Self {
            expiry_interval_ms: default_expiry_interval_ms(),
            max_pending_per_table: default_max_pending_per_table(),
        }
    }
}

impl CheckHashSection {
    /// Validates the check-hash section.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout_range(
            "check_hash.expiry_interval_ms",
            self.expiry_interval_ms,
            MIN_EXPIRY_INTERVAL_MS,
            MAX_EXPIRY_INTERVAL_MS,
        )?;
        if self.max_pending_per_table == 0 || self.max_pending_per_table > MAX_PENDING_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "check_hash.max_pending_per_table must be between 1 and {MAX_PENDING_LIMIT}"
            )));
        }
        Ok(())
    }

    /// Returns the tracker settings.
    #[must_use]
    pub const fn to_tracker_config(&self) -> CheckHashConfig {
        CheckHashConfig {
            max_pending_per_table: self.max_pending_per_table,
            expiry_interval: Duration::from_millis(self.expiry_interval_ms),
        }
    }
}

/// Apply-path section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyConfig {
    /// Verify declared affected-row counts.
    #[serde(default = "default_true")]
    pub verify_affected_rows: bool,
    /// Dry-run writes against caught-up tables.
    #[serde(default = "default_true")]
    pub dry_run_on_apply: bool,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            verify_affected_rows: true,
            dry_run_on_apply: true,
        }
    }
}

impl ApplyConfig {
    /// Returns the processor settings.
    #[must_use]
    pub const fn to_processor_config(self) -> ProcessorConfig {
        ProcessorConfig {
            verify_affected_rows: self.verify_affected_rows,
            dry_run_on_apply: self.dry_run_on_apply,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default store path.
fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

/// Default busy timeout (ms).
const fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// Default read pool size.
const fn default_read_pool_size() -> usize {
    4
}

/// Serde helper for flags that default on.
const fn default_true() -> bool {
    true
}

/// Default worker idle wait (ms).
const fn default_idle_wait_ms() -> u64 {
    DEFAULT_IDLE_WAIT_MS
}

/// Default chain identifier.
fn default_chain_id() -> String {
    DEFAULT_CHAIN_ID.to_string()
}

/// Default expiry sweep interval (ms).
const fn default_expiry_interval_ms() -> u64 {
    DEFAULT_EXPIRY_INTERVAL_MS
}

/// Default pending limit per table.
const fn default_max_pending_per_table() -> usize {
    DEFAULT_MAX_PENDING_PER_TABLE
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a millisecond setting against an inclusive range.
fn validate_timeout_range(
    field: &str,
    value_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Result<(), ConfigError> {
    if value_ms < min_ms || value_ms > max_ms {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {min_ms} and {max_ms} milliseconds",
        )));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = LedgerSqlConfig::from_toml("").unwrap();
        assert_eq!(config, LedgerSqlConfig::default());
        assert_eq!(config.store.path, PathBuf::from("ledgersql.db"));
        assert_eq!(config.sync.chain_id, "main");
        assert!(config.apply.dry_run_on_apply);
    }

    #[test]
    fn sections_convert_to_runtime_settings() {
        let config = LedgerSqlConfig::from_toml(
            "[sync]\nenabled = false\nidle_wait_ms = 25\nchain_id = \"test-net\"\n\n[check_hash]\n\
             expiry_interval_ms = 250\nmax_pending_per_table = 8\n\n[apply]\n\
             verify_affected_rows = false\n",
        )
        .unwrap();
        let storage = config.sync.to_storage_config();
        assert!(!storage.enabled);
        assert_eq!(storage.idle_wait, Duration::from_millis(25));
        assert_eq!(storage.chain_id, "test-net");
        let tracker = config.check_hash.to_tracker_config();
        assert_eq!(tracker.max_pending_per_table, 8);
        assert_eq!(tracker.expiry_interval, Duration::from_millis(250));
        let processor = config.apply.to_processor_config();
        assert!(!processor.verify_affected_rows);
        assert!(processor.dry_run_on_apply);
    }

    #[test]
    fn store_section_maps_modes() {
        let config = LedgerSqlConfig::from_toml(
            "[store]\npath = \"data/p.db\"\njournal_mode = \"delete\"\nsync_mode = \"normal\"\n",
        )
        .unwrap();
        let store = config.store.to_store_config();
        assert_eq!(store.path, PathBuf::from("data/p.db"));
        assert_eq!(store.journal_mode, SqliteStoreMode::Delete);
        assert_eq!(store.sync_mode, SqliteSyncMode::Normal);
        assert_eq!(store.read_pool_size, 4);
    }

    #[test]
    fn validate_timeout_range_checks_bounds() {
        assert!(validate_timeout_range("t", 100, 100, 1000).is_ok());
        assert!(validate_timeout_range("t", 1000, 100, 1000).is_ok());
        assert!(validate_timeout_range("t", 99, 100, 1000).is_err());
        let err = validate_timeout_range("sync.idle_wait_ms", 1001, 100, 1000).unwrap_err();
        assert!(err.to_string().contains("sync.idle_wait_ms"));
    }

    #[test]
    fn validate_path_string_rejects_blank_and_long_components() {
        assert!(validate_path_string("store.path", "./data/a.db").is_ok());
        assert!(validate_path_string("store.path", "   ").is_err());
        let component = "a".repeat(MAX_PATH_COMPONENT_LENGTH + 1);
        let err = validate_path_string("store.path", &component).unwrap_err();
        assert!(err.to_string().contains("store.path path component too long"));
    }

    #[test]
    fn chain_id_charset_is_enforced() {
        let with_chain = |chain_id: String| SyncConfig {
            chain_id,
            ..SyncConfig::default()
        };
        assert!(with_chain("main net".to_string()).validate().is_err());
        assert!(with_chain("a".repeat(MAX_CHAIN_ID_LENGTH + 1)).validate().is_err());
        assert!(with_chain("test_net-2".to_string()).validate().is_ok());
    }
}
