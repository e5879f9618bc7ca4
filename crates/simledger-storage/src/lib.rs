//! DuckDB-backed results collection for stepped simulations.
//!
//! The [`Collector`] gathers model- and agent-level metrics each tick plus
//! arbitrary caller-declared tables, buffers ad hoc rows per table, and bulk
//! appends everything to DuckDB. Each collector run is stamped with a
//! monotonically increasing run id so rows from different runs never collide.

use chrono::Utc;
use duckdb::{
    Connection, appender_params_from_iter, params, params_from_iter,
    types::{TimeUnit, Value as SqlValue},
};
use simledger_core::{
    AGENT_ID_COLUMN, AgentView, BulkMode, CollectorConfig, ColumnSpec, ColumnType, ConfigError,
    EntityView, ModelView, ReporterError, ReporterRegistry, RUN_ID_COLUMN, Row, STEP_COLUMN, Value,
};
use std::collections::{HashMap, hash_map::Entry};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Run-tracking table shared by every collector against one database.
pub const RUNS_TABLE: &str = "runs";
/// Built-in stream of one row per step from the model reporters.
pub const MODEL_TABLE: &str = "model";
/// Built-in stream of one row per agent per step from the agent reporters.
pub const AGENTS_TABLE: &str = "agents";

/// Collection failure surfaced to the caller; nothing is swallowed.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Storage was unreachable while acquiring the run id; collection
    /// cannot proceed without one.
    #[error("run registration failed: {0}")]
    RunRegistration(#[source] duckdb::Error),
    #[error(transparent)]
    Reporter(#[from] ReporterError),
    #[error("table `{0}` does not exist")]
    UnknownTable(String),
    #[error("row for table `{table}` is missing declared column `{column}`")]
    MissingColumn { table: String, column: String },
    #[error("schema conflict for table `{table}`: {detail}")]
    SchemaConflict { table: String, detail: String },
    /// A bulk write was rejected by storage. Not retried automatically:
    /// re-running a partially applied bulk insert risks duplicate rows.
    #[error("bulk write of {rows} rows to `{table}` failed: {source}")]
    Write {
        table: String,
        rows: usize,
        source: duckdb::Error,
    },
    #[error("collector is closed")]
    Closed,
    #[error("duckdb error: {0}")]
    DuckDb(#[from] duckdb::Error),
}

/// Where the configured DSN points.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StorageTarget {
    Memory,
    File(String),
}

fn parse_dsn(dsn: &str) -> Result<StorageTarget, CollectorError> {
    if let Some(rest) = dsn.strip_prefix("duckdb:") {
        if rest.is_empty() || rest == ":memory:" {
            return Ok(StorageTarget::Memory);
        }
        return Ok(StorageTarget::File(rest.to_string()));
    }
    if dsn == ":memory:" {
        return Ok(StorageTarget::Memory);
    }
    if let Some((scheme, _)) = dsn.split_once(':')
        && scheme.len() > 1
        && scheme.chars().all(|c| c.is_ascii_alphabetic())
    {
        return Err(CollectorError::Config(ConfigError::Invalid(
            "unsupported storage driver in connection DSN",
        )));
    }
    // Bare paths are treated as DuckDB database files.
    Ok(StorageTarget::File(dsn.to_string()))
}

/// Bulk-load strategy chosen from the DSN and the `bulk_mode` override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkStrategy {
    /// DuckDB's native appender, the backend-optimized path.
    Appender,
    /// Prepared per-row INSERTs inside one transaction. Functionally
    /// equivalent to the appender, only slower.
    BatchedInsert,
}

fn resolve_strategy(mode: BulkMode) -> BulkStrategy {
    match mode {
        // The only supported driver is DuckDB, whose appender is the fast
        // path; Auto therefore resolves to it.
        BulkMode::Auto | BulkMode::Appender => BulkStrategy::Appender,
        BulkMode::Insert => BulkStrategy::BatchedInsert,
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// The appender resolves table names the way unquoted SQL does; route
/// anything needing quoting through the INSERT path instead.
fn appender_compatible(table: &str) -> bool {
    let mut chars = table.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && table
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Boolean(*flag),
        Value::Int(int) => SqlValue::BigInt(*int),
        Value::Real(real) => SqlValue::Double(*real),
        Value::Text(text) => SqlValue::Text(text.clone()),
        Value::Timestamp(ts) => SqlValue::Timestamp(TimeUnit::Microsecond, ts.timestamp_micros()),
    }
}

/// Assigns and caches the run identifier for one collector run.
#[derive(Debug, Default)]
pub struct RunRegistry {
    current: Option<i64>,
}

impl RunRegistry {
    /// The id acquired for this run, if any.
    #[must_use]
    pub fn current(&self) -> Option<i64> {
        self.current
    }

    /// Acquire the run id, registering a new run on first call. Later
    /// calls return the cached id without touching storage.
    pub fn acquire(&mut self, conn: &mut Connection) -> Result<i64, CollectorError> {
        if let Some(id) = self.current {
            return Ok(id);
        }
        let id = Self::register(conn).map_err(CollectorError::RunRegistration)?;
        self.current = Some(id);
        debug!(run_id = id, "registered run");
        Ok(id)
    }

    // One read-modify-write transaction so two collectors sharing a
    // database file cannot race to the same id.
    fn register(conn: &mut Connection) -> Result<i64, duckdb::Error> {
        let tx = conn.transaction()?;
        tx.execute(
            "create table if not exists runs (id bigint primary key, creation timestamp)",
            [],
        )?;
        let max: Option<i64> = tx.query_row("select max(id) from runs", [], |row| row.get(0))?;
        let id = max.map_or(1, |value| value + 1);
        let created = Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string();
        tx.execute(
            "insert into runs (id, creation) values (?, ?)",
            params![id, created],
        )?;
        tx.commit()?;
        Ok(id)
    }
}

/// Cached schema of one storage table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHandle {
    name: String,
    columns: Vec<ColumnSpec>,
}

impl TableHandle {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }
}

fn same_column_names(a: &[ColumnSpec], b: &[ColumnSpec]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(left, right)| left.name == right.name)
}

fn column_names(columns: &[ColumnSpec]) -> String {
    columns
        .iter()
        .map(|column| column.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn storage_columns(conn: &Connection, table: &str) -> Result<Vec<String>, duckdb::Error> {
    let mut stmt = conn.prepare(
        "select column_name from information_schema.columns
         where table_name = ? order by ordinal_position",
    )?;
    let mut rows = stmt.query(params![table])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get(0)?);
    }
    Ok(columns)
}

fn create_table_sql(name: &str, columns: &[ColumnSpec]) -> String {
    let body = columns
        .iter()
        .map(|column| format!("{} {}", quote_ident(&column.name), column.kind.sql_type()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("create table if not exists {} ({})", quote_ident(name), body)
}

/// Tracks table name -> column schema and lazily creates storage tables.
#[derive(Debug, Default)]
pub struct TableCatalog {
    tables: HashMap<String, TableHandle>,
}

impl TableCatalog {
    #[must_use]
    pub fn handle(&self, name: &str) -> Option<&TableHandle> {
        self.tables.get(name)
    }

    /// Create the storage table if absent and cache its handle. Idempotent
    /// for an identical column set; a different column set under the same
    /// name is a schema conflict, whether the clash is with the in-memory
    /// handle or with a table already present in storage.
    pub fn ensure_table(
        &mut self,
        conn: &Connection,
        name: &str,
        columns: &[ColumnSpec],
    ) -> Result<&TableHandle, CollectorError> {
        match self.tables.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                let handle = entry.into_mut();
                if !same_column_names(&handle.columns, columns) {
                    return Err(CollectorError::SchemaConflict {
                        table: name.to_string(),
                        detail: format!(
                            "cached columns ({}) differ from declared ({})",
                            column_names(&handle.columns),
                            column_names(columns)
                        ),
                    });
                }
                Ok(&*handle)
            }
            Entry::Vacant(entry) => {
                let existing = storage_columns(conn, name)?;
                if existing.is_empty() {
                    conn.execute(&create_table_sql(name, columns), [])?;
                } else {
                    let declared: Vec<&str> =
                        columns.iter().map(|column| column.name.as_str()).collect();
                    if existing != declared {
                        return Err(CollectorError::SchemaConflict {
                            table: name.to_string(),
                            detail: format!(
                                "existing columns ({}) differ from declared ({})",
                                existing.join(", "),
                                column_names(columns)
                            ),
                        });
                    }
                }
                Ok(&*entry.insert(TableHandle {
                    name: name.to_string(),
                    columns: columns.to_vec(),
                }))
            }
        }
    }

    /// Ensure a table shaped like `row`, with column types inferred from
    /// its cells. Used for the lazily created model/agents streams.
    pub fn ensure_for_row(
        &mut self,
        conn: &Connection,
        name: &str,
        row: &Row,
    ) -> Result<&TableHandle, CollectorError> {
        let columns: Vec<ColumnSpec> = row
            .iter()
            .map(|(column, value)| ColumnSpec::new(column, ColumnType::of(value)))
            .collect();
        self.ensure_table(conn, name, &columns)
    }

    /// Check `row` against the declared schema: every declared column must
    /// be present, or be filled with an explicit null when `ignore_missing`
    /// is set. Extra keys pass through untouched.
    pub fn validate_row(
        handle: &TableHandle,
        row: &mut Row,
        ignore_missing: bool,
    ) -> Result<(), CollectorError> {
        for column in &handle.columns {
            if row.contains(&column.name) {
                continue;
            }
            if !ignore_missing {
                return Err(CollectorError::MissingColumn {
                    table: handle.name.clone(),
                    column: column.name.clone(),
                });
            }
            row.set(column.name.clone(), Value::Null);
        }
        Ok(())
    }
}

/// In-memory buffer of pending rows per ad hoc table.
///
/// `add_row` returns the drained batch once the table's threshold is
/// reached; the caller writes it before returning to its own caller, so the
/// buffered length stays strictly below the threshold in steady state.
#[derive(Debug, Default)]
pub struct RowCache {
    buffers: HashMap<String, Vec<Row>>,
}

impl RowCache {
    pub fn add_row(&mut self, table: &str, row: Row, threshold: usize) -> Option<Vec<Row>> {
        let buffer = self.buffers.entry(table.to_string()).or_default();
        buffer.push(row);
        if buffer.len() >= threshold {
            Some(std::mem::take(buffer))
        } else {
            None
        }
    }

    #[must_use]
    pub fn len(&self, table: &str) -> usize {
        self.buffers.get(table).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffers.values().all(Vec::is_empty)
    }

    /// Drain every non-empty buffer, leaving the cache empty.
    pub fn drain_all(&mut self) -> Vec<(String, Vec<Row>)> {
        self.buffers
            .iter_mut()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(table, rows)| (table.clone(), std::mem::take(rows)))
            .collect()
    }
}

/// Hook invoked around each bulk write.
///
/// Injected into the bulk writer at construction; replaces engine-level
/// query-logging hooks with an explicit seam the caller controls.
pub trait WriteObserver: Send {
    fn write_started(&self, table: &str, rows: usize) {
        let _ = (table, rows);
    }

    fn write_finished(&self, table: &str, rows: usize, succeeded: bool) {
        let _ = (table, rows, succeeded);
    }
}

/// Default observer emitting `tracing` events.
#[derive(Debug, Default)]
pub struct TracingWriteObserver;

impl WriteObserver for TracingWriteObserver {
    fn write_started(&self, table: &str, rows: usize) {
        debug!(table, rows, "bulk write started");
    }

    fn write_finished(&self, table: &str, rows: usize, succeeded: bool) {
        if succeeded {
            debug!(table, rows, "bulk write finished");
        } else {
            warn!(table, rows, "bulk write failed");
        }
    }
}

/// Converts a batch of rows for one table into a backend bulk insert.
pub struct BulkWriter {
    strategy: BulkStrategy,
    observer: Box<dyn WriteObserver>,
}

impl fmt::Debug for BulkWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkWriter")
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl BulkWriter {
    #[must_use]
    pub fn new(strategy: BulkStrategy, observer: Box<dyn WriteObserver>) -> Self {
        Self { strategy, observer }
    }

    #[must_use]
    pub fn strategy(&self) -> BulkStrategy {
        self.strategy
    }

    /// Append all rows to `handle`'s table. Declared columns are bound in
    /// schema order with nulls for absent cells; keys outside the schema
    /// are ignored. Strategy selection affects speed, never the rows that
    /// land.
    pub fn write_batch(
        &self,
        conn: &mut Connection,
        handle: &TableHandle,
        rows: &[Row],
    ) -> Result<(), CollectorError> {
        if rows.is_empty() {
            return Ok(());
        }
        self.observer.write_started(handle.name(), rows.len());
        let result = match self.strategy {
            BulkStrategy::Appender if appender_compatible(handle.name()) => {
                append_rows(conn, handle, rows)
            }
            _ => insert_rows(conn, handle, rows),
        };
        self.observer
            .write_finished(handle.name(), rows.len(), result.is_ok());
        result.map_err(|source| CollectorError::Write {
            table: handle.name().to_string(),
            rows: rows.len(),
            source,
        })
    }
}

fn bound_values(handle: &TableHandle, row: &Row) -> Vec<SqlValue> {
    handle
        .columns()
        .iter()
        .map(|column| sql_value(row.get(&column.name).unwrap_or(&Value::Null)))
        .collect()
}

fn append_rows(
    conn: &Connection,
    handle: &TableHandle,
    rows: &[Row],
) -> Result<(), duckdb::Error> {
    let mut appender = conn.appender(handle.name())?;
    for row in rows {
        appender.append_row(appender_params_from_iter(bound_values(handle, row)))?;
    }
    appender.flush()?;
    Ok(())
}

fn insert_sql(handle: &TableHandle) -> String {
    let columns = handle
        .columns()
        .iter()
        .map(|column| quote_ident(&column.name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = std::iter::repeat_n("?", handle.columns().len())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "insert into {} ({}) values ({})",
        quote_ident(handle.name()),
        columns,
        placeholders
    )
}

fn insert_rows(
    conn: &mut Connection,
    handle: &TableHandle,
    rows: &[Row],
) -> Result<(), duckdb::Error> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(&insert_sql(handle))?;
        for row in rows {
            stmt.execute(params_from_iter(bound_values(handle, row)))?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Results collector for one simulation run.
///
/// Single logical writer: every operation takes `&mut self`, so a shared
/// collector must be serialized by the caller. Writes are blocking and
/// happen inline on the thread that crossed a flush threshold.
pub struct Collector<M: ModelView> {
    config: CollectorConfig,
    conn: Option<Connection>,
    model_reporters: ReporterRegistry<M>,
    agent_reporters: ReporterRegistry<M::Agent>,
    runs: RunRegistry,
    catalog: TableCatalog,
    cache: RowCache,
    writer: BulkWriter,
}

impl<M: ModelView> fmt::Debug for Collector<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collector")
            .field("connection", &self.config.connection)
            .field("run_id", &self.runs.current())
            .field("closed", &self.conn.is_none())
            .finish_non_exhaustive()
    }
}

impl<M: ModelView> Collector<M> {
    /// Open the configured storage target and declare the config's ad hoc
    /// tables. Fails fast on invalid configuration.
    pub fn new(
        config: CollectorConfig,
        model_reporters: ReporterRegistry<M>,
        agent_reporters: ReporterRegistry<M::Agent>,
    ) -> Result<Self, CollectorError> {
        Self::with_observer(
            config,
            model_reporters,
            agent_reporters,
            Box::new(TracingWriteObserver),
        )
    }

    /// Like [`new`](Self::new), with an explicit observer around each bulk
    /// write.
    pub fn with_observer(
        config: CollectorConfig,
        model_reporters: ReporterRegistry<M>,
        agent_reporters: ReporterRegistry<M::Agent>,
        observer: Box<dyn WriteObserver>,
    ) -> Result<Self, CollectorError> {
        config.validate()?;
        let target = parse_dsn(&config.connection)?;
        let conn = match &target {
            StorageTarget::Memory => Connection::open_in_memory()?,
            StorageTarget::File(path) => Connection::open(path)?,
        };
        let writer = BulkWriter::new(resolve_strategy(config.bulk_mode), observer);

        let mut catalog = TableCatalog::default();
        for (name, declared) in &config.table_schemas {
            let mut columns = Vec::with_capacity(declared.len() + 1);
            columns.push(ColumnSpec::new(RUN_ID_COLUMN, ColumnType::Integer));
            columns.extend(declared.iter().cloned());
            catalog.ensure_table(&conn, name, &columns)?;
        }

        Ok(Self {
            config,
            conn: Some(conn),
            model_reporters,
            agent_reporters,
            runs: RunRegistry::default(),
            catalog,
            cache: RowCache::default(),
            writer,
        })
    }

    /// Acquire (or return the cached) run id for this collector run.
    pub fn add_run_id(&mut self) -> Result<i64, CollectorError> {
        let conn = self.conn.as_mut().ok_or(CollectorError::Closed)?;
        self.runs.acquire(conn)
    }

    /// The run id, once acquired.
    #[must_use]
    pub fn run_id(&self) -> Option<i64> {
        self.runs.current()
    }

    /// Rows currently buffered for one ad hoc table.
    #[must_use]
    pub fn cached_rows(&self, table: &str) -> usize {
        self.cache.len(table)
    }

    /// Collect one step: evaluates every model reporter once and every
    /// agent reporter once per agent, writing both row sets immediately.
    pub fn collect(&mut self, model: &M) -> Result<(), CollectorError> {
        let conn = self.conn.as_mut().ok_or(CollectorError::Closed)?;
        let run_id = self.runs.acquire(conn)?;
        // The scheduler increments its counter right before invoking
        // collection, so the step being recorded is the count minus one.
        let step = model.completed_steps().saturating_sub(1) as i64;

        if !self.model_reporters.is_empty() {
            let mut row = Row::with_capacity(self.model_reporters.len() + 2);
            row.set(RUN_ID_COLUMN, run_id);
            row.set(STEP_COLUMN, step);
            self.model_reporters.evaluate_into(model, &mut row)?;
            let handle = self.catalog.ensure_for_row(conn, MODEL_TABLE, &row)?;
            self.writer
                .write_batch(conn, handle, std::slice::from_ref(&row))?;
        }

        if !self.agent_reporters.is_empty() {
            let rows = record_agents(&self.agent_reporters, model, run_id, step)?;
            if let Some(first) = rows.first() {
                let handle = self.catalog.ensure_for_row(conn, AGENTS_TABLE, first)?;
                self.writer.write_batch(conn, handle, &rows)?;
            }
        }

        Ok(())
    }

    /// Append one row to a declared ad hoc table, flushing that table's
    /// buffer synchronously once its threshold is reached.
    pub fn add_table_row(
        &mut self,
        table: &str,
        row: Row,
        ignore_missing: bool,
    ) -> Result<(), CollectorError> {
        let conn = self.conn.as_mut().ok_or(CollectorError::Closed)?;
        let run_id = self.runs.acquire(conn)?;
        let Some(handle) = self.catalog.handle(table) else {
            return Err(CollectorError::UnknownTable(table.to_string()));
        };

        let mut stored = Row::with_capacity(row.len() + 1);
        stored.set(RUN_ID_COLUMN, run_id);
        for (column, value) in row {
            stored.set(column, value);
        }
        TableCatalog::validate_row(handle, &mut stored, ignore_missing)?;

        let threshold = self.config.flush_threshold_for(table);
        if let Some(batch) = self.cache.add_row(table, stored, threshold) {
            self.writer.write_batch(conn, handle, &batch)?;
        }
        Ok(())
    }

    /// Append many rows to a declared ad hoc table through the same cache
    /// and threshold path, filling absent declared columns with nulls.
    pub fn add_table_rows(&mut self, table: &str, rows: Vec<Row>) -> Result<(), CollectorError> {
        for row in rows {
            self.add_table_row(table, row, true)?;
        }
        Ok(())
    }

    /// Write out every buffered row, leaving all caches empty.
    pub fn flush(&mut self) -> Result<(), CollectorError> {
        let conn = self.conn.as_mut().ok_or(CollectorError::Closed)?;
        for (table, rows) in self.cache.drain_all() {
            let Some(handle) = self.catalog.handle(&table) else {
                return Err(CollectorError::UnknownTable(table));
            };
            self.writer.write_batch(conn, handle, &rows)?;
        }
        Ok(())
    }

    /// Run database maintenance to optimize and compact storage.
    pub fn optimize(&mut self) -> Result<(), CollectorError> {
        self.flush()?;
        let conn = self.conn.as_mut().ok_or(CollectorError::Closed)?;
        conn.execute("PRAGMA optimize;", [])?;
        conn.execute("VACUUM;", [])?;
        Ok(())
    }

    /// Flush buffered rows and release the storage session. Every
    /// subsequent operation fails with [`CollectorError::Closed`].
    pub fn close(&mut self) -> Result<(), CollectorError> {
        self.flush()?;
        let Some(conn) = self.conn.take() else {
            return Err(CollectorError::Closed);
        };
        conn.close().map_err(|(_, err)| CollectorError::from(err))?;
        Ok(())
    }
}

fn record_agents<M: ModelView>(
    reporters: &ReporterRegistry<M::Agent>,
    model: &M,
    run_id: i64,
    step: i64,
) -> Result<Vec<Row>, CollectorError> {
    let mut rows = Vec::new();
    if let Some(attributes) = reporters.attribute_names() {
        // All reporters are attribute lookups: one batched extraction per
        // agent instead of a per-reporter dispatch.
        let names: Vec<String> = reporters.names().map(str::to_string).collect();
        for agent in model.agents() {
            let mut row = agent_row_prefix(run_id, step, agent, names.len());
            for (index, value) in agent.attributes(&attributes).into_iter().enumerate() {
                let value = value.ok_or_else(|| ReporterError::MissingAttribute {
                    reporter: names[index].clone(),
                    attribute: attributes[index].clone(),
                })?;
                row.set(names[index].clone(), value);
            }
            rows.push(row);
        }
    } else {
        for agent in model.agents() {
            let mut row = agent_row_prefix(run_id, step, agent, reporters.len());
            reporters.evaluate_into(agent, &mut row)?;
            rows.push(row);
        }
    }
    Ok(rows)
}

fn agent_row_prefix<A: AgentView>(run_id: i64, step: i64, agent: &A, reporters: usize) -> Row {
    let mut row = Row::with_capacity(reporters + 3);
    row.set(RUN_ID_COLUMN, run_id);
    row.set(STEP_COLUMN, step);
    row.set(AGENT_ID_COLUMN, agent.agent_id());
    row
}

impl<M: ModelView> Drop for Collector<M> {
    fn drop(&mut self) {
        if self.conn.is_some()
            && !self.cache.is_empty()
            && let Err(err) = self.flush()
        {
            warn!("failed to flush cached rows on drop: {err}");
        }
    }
}
