// crates/ledgersql-cli/src/main.rs
// ============================================================================
// Module: LedgerSQL CLI Entry Point
// Description: Command dispatcher for projection administration.
// Purpose: Apply ledger batches and inspect or manage projected tables.
// Dependencies: clap, ledgersql-config, ledgersql-core, ledgersql-store-sqlite,
//               serde, tracing-subscriber
// ============================================================================

//! ## Overview
//! The `ledgersql` binary opens the `SQLite` projection named by
//! `ledgersql.toml` (or `--store-path`) and runs one administrative command:
//! applying a closed ledger's table transactions, querying a table, listing
//! sync records, toggling auto-sync, or dropping a table. Logs go to stderr
//! through `tracing-subscriber`; command output goes to stdout as canonical
//! JSON or text.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use ledgersql_config::LedgerSqlConfig;
use ledgersql_config::config_toml_example;
use ledgersql_core::AccountId;
use ledgersql_core::ApplyContext;
use ledgersql_core::CheckHashTracker;
use ledgersql_core::Hash256;
use ledgersql_core::JsonRow;
use ledgersql_core::StorageId;
use ledgersql_core::SyncRecord;
use ledgersql_core::SyncStatusStore;
use ledgersql_core::TableName;
use ledgersql_core::TableRules;
use ledgersql_core::TableStorage;
use ledgersql_core::TableTx;
use ledgersql_core::TxExecutor;
use ledgersql_core::TxOutcome;
use ledgersql_core::TxProcessor;
use ledgersql_core::runtime::SyncStep;
use ledgersql_core::runtime::TableSyncSnapshot;
use ledgersql_store_sqlite::SqliteTxStore;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of an apply batch or query input.
const MAX_INPUT_BYTES: usize = 8 * 1024 * 1024;
/// Maximum size of a rules file.
const MAX_RULES_BYTES: usize = 1024 * 1024;
/// Default log filter when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "ledgersql", disable_help_subcommand = true, version)]
struct Cli {
    /// Shared store and logging options.
    #[command(flatten)]
    global: GlobalArgs,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
struct GlobalArgs {
    /// Config file path (defaults to ledgersql.toml or `LEDGERSQL_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Direct `SQLite` store path (overrides config).
    #[arg(long = "store-path", value_name = "PATH", global = true)]
    store_path: Option<PathBuf>,
    /// Log filter used when `RUST_LOG` is unset.
    #[arg(
        long = "log-level",
        value_name = "FILTER",
        global = true,
        default_value = DEFAULT_LOG_FILTER
    )]
    log_level: String,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply the table transactions of one closed ledger.
    Apply(ApplyCommand),
    /// Run a select or assert against a projected table.
    Query(QueryCommand),
    /// List persisted sync records.
    Status(StatusCommand),
    /// Enable or disable auto-sync for a table.
    AutoSync(AutoSyncCommand),
    /// Drop a projected table and mark its record deleted.
    Drop(DropCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Output formats for structured commands.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Canonical JSON output.
    Json,
    /// Human-readable text output.
    Text,
}

/// Arguments for `apply`.
#[derive(Args, Debug)]
struct ApplyCommand {
    /// JSON ledger batch (`ledger_seq`, `ledger_hash`, `txs`, `rules`).
    #[arg(long, value_name = "PATH")]
    input: PathBuf,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

/// Arguments for `query`.
#[derive(Args, Debug)]
struct QueryCommand {
    /// JSON table transaction carrying a select or assert.
    #[arg(long, value_name = "PATH")]
    input: PathBuf,
    /// Optional JSON table rules applied to the caller.
    #[arg(long, value_name = "PATH")]
    rules: Option<PathBuf>,
}

/// Arguments for `status`.
#[derive(Args, Debug)]
struct StatusCommand {
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Table selector by owner and logical name.
#[derive(Args, Debug, Clone)]
struct TableArgs {
    /// Owner account.
    #[arg(long, value_name = "ACCOUNT")]
    owner: String,
    /// Logical table name.
    #[arg(long, value_name = "NAME")]
    table: String,
}

/// Arguments for `auto-sync`.
#[derive(Args, Debug)]
struct AutoSyncCommand {
    /// Table selector.
    #[command(flatten)]
    table: TableArgs,
    /// Enable auto-sync.
    #[arg(
        long,
        action = ArgAction::SetTrue,
        conflicts_with = "disable",
        required_unless_present = "disable"
    )]
    enable: bool,
    /// Disable auto-sync.
    #[arg(long, action = ArgAction::SetTrue)]
    disable: bool,
}

/// Arguments for `drop`.
#[derive(Args, Debug)]
struct DropCommand {
    /// Table selector.
    #[command(flatten)]
    table: TableArgs,
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate the configuration.
    Validate,
    /// Print a canonical example configuration.
    Example,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying a human-readable message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Parses arguments, installs logging, and dispatches the command.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli.global.log_level)?;
    match cli.command {
        Commands::Apply(command) => command_apply(&cli.global, &command),
        Commands::Query(command) => command_query(&cli.global, &command),
        Commands::Status(command) => command_status(&cli.global, &command),
        Commands::AutoSync(command) => command_auto_sync(&cli.global, &command),
        Commands::Drop(command) => command_drop(&cli.global, &command),
        Commands::Config {
            command,
        } => command_config(&cli.global, &command),
    }
}

/// Installs the stderr log subscriber.
fn init_logging(fallback: &str) -> CliResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .map_err(|err| CliError::new(format!("invalid log filter {fallback}: {err}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| CliError::new(format!("failed to install logging: {err}")))
}

// ============================================================================
// SECTION: Node
// ============================================================================

/// Store, sync engine, and processor opened for one command.
struct Node {
    /// `SQLite` backend.
    store: Arc<SqliteTxStore>,
    /// Sync engine over the backend.
    storage: Arc<TableStorage<SqliteTxStore>>,
    /// Apply processor.
    processor: TxProcessor<SqliteTxStore>,
}

/// Resolves configuration: `--store-path` alone uses defaults, otherwise the
/// config file is loaded and the store path optionally overridden.
fn resolve_config(global: &GlobalArgs) -> CliResult<LedgerSqlConfig> {
    let mut config = match (&global.config, &global.store_path) {
        (None, Some(_)) => LedgerSqlConfig::default(),
        _ => LedgerSqlConfig::load(global.config.as_deref())
            .map_err(|err| CliError::new(format!("failed to load config: {err}")))?,
    };
    if let Some(store_path) = &global.store_path {
        config.store.path.clone_from(store_path);
        config.validate().map_err(|err| CliError::new(format!("invalid config: {err}")))?;
    }
    Ok(config)
}

/// Opens the store and wires the sync engine and processor.
fn open_node(config: &LedgerSqlConfig) -> CliResult<Node> {
    let store = Arc::new(
        SqliteTxStore::new(config.store.to_store_config())
            .map_err(|err| CliError::new(format!("failed to open store: {err}")))?,
    );
    let storage = Arc::new(TableStorage::new(Arc::clone(&store), config.sync.to_storage_config()));
    if config.sync.auto_load_tables {
        let loaded = storage
            .load_from_store()
            .map_err(|err| CliError::new(format!("failed to load sync tables: {err}")))?;
        info!(loaded, "projection opened");
    }
    let tracker = Arc::new(CheckHashTracker::new(config.check_hash.to_tracker_config()));
    let processor =
        TxProcessor::new(Arc::clone(&storage), tracker, config.apply.to_processor_config());
    Ok(Node {
        store,
        storage,
        processor,
    })
}

// ============================================================================
// SECTION: Apply Command
// ============================================================================

/// One closed ledger's table transactions.
#[derive(Debug, Deserialize)]
struct ApplyBatch {
    /// Ledger sequence being closed.
    ledger_seq: u64,
    /// Ledger hash; zero when omitted.
    #[serde(default)]
    ledger_hash: Option<Hash256>,
    /// Transactions in ledger order.
    txs: Vec<TableTx>,
    /// Table rules keyed by storage id.
    #[serde(default)]
    rules: BTreeMap<StorageId, TableRules>,
}

/// Result of one transaction in a batch.
#[derive(Debug, Serialize)]
struct TxResult {
    /// Transaction hash.
    tx_hash: Hash256,
    /// Target table.
    storage_id: StorageId,
    /// Flattened outcome.
    outcome: TxOutcome,
    /// Rows returned by reads.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    rows: Vec<JsonRow>,
    /// Confirmed check hash, when declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    check_hash: Option<Hash256>,
}

/// Sync rejection or failure observed while draining the batch.
#[derive(Debug, Serialize)]
struct SyncFailure {
    /// Failed table.
    storage_id: StorageId,
    /// Ledger sequence of the failed item.
    ledger_seq: u64,
    /// Transaction index of the failed item.
    tx_seq: u64,
    /// Failure message.
    error: String,
}

/// Output for `apply`.
#[derive(Debug, Serialize)]
struct ApplyOutput {
    /// Ledger sequence applied.
    ledger_seq: u64,
    /// Per-transaction results in ledger order.
    results: Vec<TxResult>,
    /// Items the sync worker applied.
    applied: usize,
    /// Items the backend rejected; their tables kept draining.
    rejected: Vec<SyncFailure>,
    /// Items the sync worker failed.
    failures: Vec<SyncFailure>,
    /// Items still queued or parked (gate closed or table in error).
    pending: usize,
}

impl ApplyOutput {
    /// Returns true when every transaction and sync step succeeded.
    fn all_ok(&self) -> bool {
        self.failures.is_empty()
            && self.rejected.is_empty()
            && self.results.iter().all(|result| result.outcome.success)
    }
}

/// Executes `apply`.
fn command_apply(global: &GlobalArgs, command: &ApplyCommand) -> CliResult<ExitCode> {
    let batch: ApplyBatch = read_json(&command.input, "apply batch", MAX_INPUT_BYTES)?;
    let node = open_node(&resolve_config(global)?)?;
    let output = apply_batch(&node, &batch)?;
    match command.format {
        OutputFormat::Json => write_json(&output)?,
        OutputFormat::Text => write_text(&render_apply_text(&output))?,
    }
    Ok(if output.all_ok() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Applies a batch, confirms declared check hashes, and drains the queue.
fn apply_batch(node: &Node, batch: &ApplyBatch) -> CliResult<ApplyOutput> {
    let ledger_hash = batch.ledger_hash.unwrap_or(Hash256::ZERO);
    let mut results = Vec::with_capacity(batch.txs.len());
    for (index, tx) in batch.txs.iter().enumerate() {
        let ctx = ApplyContext {
            ledger_seq: batch.ledger_seq,
            ledger_hash,
            tx_seq: u64::try_from(index).unwrap_or(u64::MAX),
        };
        let applied = node
            .processor
            .apply(tx, batch.rules.get(&tx.storage_id), &ctx)
            .and_then(|receipt| {
                let confirmed = node.processor.confirm(tx, batch.ledger_seq)?;
                Ok((receipt, confirmed))
            });
        let result = match applied {
            Ok((receipt, check_hash)) => TxResult {
                tx_hash: tx.tx_hash,
                storage_id: tx.storage_id.clone(),
                outcome: TxOutcome::ok(format!("{} ok", tx.operation.label())),
                rows: receipt.rows,
                check_hash,
            },
            Err(err) => TxResult {
                tx_hash: tx.tx_hash,
                storage_id: tx.storage_id.clone(),
                outcome: TxOutcome::failed(err.to_string(), err.class()),
                rows: Vec::new(),
                check_hash: None,
            },
        };
        results.push(result);
    }
    let steps =
        node.storage.drain().map_err(|err| CliError::new(format!("sync drain failed: {err}")))?;
    let mut applied = 0_usize;
    let mut rejected = Vec::new();
    let mut failures = Vec::new();
    for step in steps {
        match step {
            SyncStep::Applied {
                ..
            } => applied += 1,
            SyncStep::Rejected {
                storage_id,
                position,
                error,
            } => rejected.push(SyncFailure {
                storage_id,
                ledger_seq: position.ledger_seq,
                tx_seq: position.tx_seq,
                error: error.to_string(),
            }),
            SyncStep::Failed {
                storage_id,
                position,
                error,
            } => failures.push(SyncFailure {
                storage_id,
                ledger_seq: position.ledger_seq,
                tx_seq: position.tx_seq,
                error: error.to_string(),
            }),
        }
    }
    let snapshots = node
        .storage
        .snapshots()
        .map_err(|err| CliError::new(format!("failed to read sync state: {err}")))?;
    let pending = snapshots.iter().map(|snapshot| snapshot.queued + snapshot.parked).sum();
    Ok(ApplyOutput {
        ledger_seq: batch.ledger_seq,
        results,
        applied,
        rejected,
        failures,
        pending,
    })
}

/// Renders apply output in text form.
fn render_apply_text(output: &ApplyOutput) -> String {
    let mut buffer = format!("ledger {}\n", output.ledger_seq);
    for result in &output.results {
        let state = if result.outcome.success { "ok" } else { "rejected" };
        buffer.push_str(&format!(
            "  tx {} {} {}: {}\n",
            result.tx_hash, result.storage_id, state, result.outcome.message
        ));
    }
    for rejection in &output.rejected {
        buffer.push_str(&format!(
            "  sync {} at {}:{} rejected: {}\n",
            rejection.storage_id, rejection.ledger_seq, rejection.tx_seq, rejection.error
        ));
    }
    for failure in &output.failures {
        buffer.push_str(&format!(
            "  sync {} at {}:{} failed: {}\n",
            failure.storage_id, failure.ledger_seq, failure.tx_seq, failure.error
        ));
    }
    buffer.push_str(&format!("applied {} pending {}\n", output.applied, output.pending));
    buffer
}

// ============================================================================
// SECTION: Query Command
// ============================================================================

/// Executes `query`.
fn command_query(global: &GlobalArgs, command: &QueryCommand) -> CliResult<ExitCode> {
    let tx: TableTx = read_json(&command.input, "query", MAX_INPUT_BYTES)?;
    let rules: Option<TableRules> = command
        .rules
        .as_deref()
        .map(|path| read_json(path, "rules", MAX_RULES_BYTES))
        .transpose()?;
    let node = open_node(&resolve_config(global)?)?;
    let rows = run_query(&node, &tx, rules.as_ref())?;
    write_json(&rows)?;
    Ok(ExitCode::SUCCESS)
}

/// Runs a read-only transaction through the processor.
fn run_query(node: &Node, tx: &TableTx, rules: Option<&TableRules>) -> CliResult<Vec<JsonRow>> {
    if !tx.operation.is_read_only() {
        return Err(CliError::new(format!(
            "query requires a select or assert, got {}",
            tx.operation.label()
        )));
    }
    let ctx = ApplyContext {
        ledger_seq: 0,
        ledger_hash: Hash256::ZERO,
        tx_seq: 0,
    };
    node.processor
        .apply(tx, rules, &ctx)
        .map(|receipt| receipt.rows)
        .map_err(|err| CliError::new(format!("query failed: {err}")))
}

// ============================================================================
// SECTION: Status Command
// ============================================================================

/// Output for `status`.
#[derive(Debug, Serialize)]
struct StatusOutput {
    /// Every persisted record.
    records: Vec<SyncRecord>,
    /// Engine view of the loaded auto-sync tables.
    tables: Vec<TableSyncSnapshot>,
}

/// Executes `status`.
fn command_status(global: &GlobalArgs, command: &StatusCommand) -> CliResult<ExitCode> {
    let node = open_node(&resolve_config(global)?)?;
    let output = StatusOutput {
        records: node
            .store
            .list_records()
            .map_err(|err| CliError::new(format!("failed to list records: {err}")))?,
        tables: node
            .storage
            .snapshots()
            .map_err(|err| CliError::new(format!("failed to read sync state: {err}")))?,
    };
    match command.format {
        OutputFormat::Json => write_json(&output)?,
        OutputFormat::Text => write_text(&render_status_text(&output))?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Renders status output in text form.
fn render_status_text(output: &StatusOutput) -> String {
    if output.records.is_empty() {
        return "no tables\n".to_string();
    }
    let mut buffer = String::new();
    for record in &output.records {
        let status = output
            .tables
            .iter()
            .find(|table| table.storage_id == record.storage_id)
            .map_or_else(|| "unloaded".to_string(), |table| table.status.to_string());
        let flags = match (record.deleted, record.auto_sync) {
            (true, _) => "deleted",
            (false, true) => "auto",
            (false, false) => "manual",
        };
        buffer.push_str(&format!(
            "{} {}/{} at {}:{} {status} {flags}\n",
            record.storage_id, record.owner, record.table_name, record.ledger_seq, record.tx_seq
        ));
    }
    buffer
}

// ============================================================================
// SECTION: Table Admin Commands
// ============================================================================

/// Output for table admin commands.
#[derive(Debug, Serialize)]
struct TableAdminOutput {
    /// Affected table.
    storage_id: StorageId,
    /// Action performed.
    action: &'static str,
}

/// Parses owner and table arguments.
fn parse_table(args: &TableArgs) -> CliResult<(AccountId, TableName)> {
    let owner = AccountId::new(args.owner.clone())
        .map_err(|err| CliError::new(format!("invalid owner: {err}")))?;
    let table = TableName::new(args.table.clone())
        .map_err(|err| CliError::new(format!("invalid table name: {err}")))?;
    Ok((owner, table))
}

/// Executes `auto-sync`.
fn command_auto_sync(global: &GlobalArgs, command: &AutoSyncCommand) -> CliResult<ExitCode> {
    let (owner, table) = parse_table(&command.table)?;
    let node = open_node(&resolve_config(global)?)?;
    let enable = command.enable && !command.disable;
    let storage_id = node
        .storage
        .set_auto_sync(&owner, &table, enable)
        .map_err(|err| CliError::new(format!("auto-sync update failed: {err}")))?;
    write_json(&TableAdminOutput {
        storage_id,
        action: if enable { "auto_sync_enabled" } else { "auto_sync_disabled" },
    })?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `drop`.
fn command_drop(global: &GlobalArgs, command: &DropCommand) -> CliResult<ExitCode> {
    let (owner, table) = parse_table(&command.table)?;
    let node = open_node(&resolve_config(global)?)?;
    let storage_id = drop_table(&node, &owner, &table)?;
    write_json(&TableAdminOutput {
        storage_id,
        action: "dropped",
    })?;
    Ok(ExitCode::SUCCESS)
}

/// Drops the backend table of a live logical table and marks it deleted.
fn drop_table(node: &Node, owner: &AccountId, table: &TableName) -> CliResult<StorageId> {
    let storage_id = node
        .store
        .find_storage_id(owner, table)
        .map_err(|err| CliError::new(format!("table lookup failed: {err}")))?
        .ok_or_else(|| CliError::new(format!("no live table {owner}/{table}")))?;
    node.store
        .drop_table(&storage_id)
        .map_err(|err| CliError::new(format!("drop failed: {err}")))?;
    node.store
        .mark_deleted(&storage_id)
        .map_err(|err| CliError::new(format!("failed to mark {storage_id} deleted: {err}")))?;
    info!(storage_id = %storage_id, "table dropped by admin");
    Ok(storage_id)
}

// ============================================================================
// SECTION: Config Command
// ============================================================================

/// Executes `config` subcommands.
fn command_config(global: &GlobalArgs, command: &ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate => {
            let config = resolve_config(global)?;
            write_text(&format!("config ok: store {}\n", config.store.path.display()))?;
        }
        ConfigCommand::Example => write_text(&config_toml_example())?,
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Reads and parses a bounded JSON input.
fn read_json<T: DeserializeOwned>(path: &Path, kind: &str, max_bytes: usize) -> CliResult<T> {
    let bytes = read_bytes_with_limit(path, max_bytes).map_err(|err| match err {
        ReadLimitError::Io(err) => {
            CliError::new(format!("failed to read {kind} {}: {err}", path.display()))
        }
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(format!(
            "{kind} {} is {size} bytes, limit is {limit}",
            path.display()
        )),
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|err| CliError::new(format!("invalid {kind} {}: {err}", path.display())))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes canonical JSON to stdout with a trailing newline.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let mut bytes = serde_jcs::to_vec(value)
        .map_err(|err| CliError::new(format!("failed to encode output: {err}")))?;
    bytes.push(b'\n');
    let mut stdout = std::io::stdout();
    stdout.write_all(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes text to stdout.
fn write_text(text: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    write!(&mut stdout, "{text}").map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
