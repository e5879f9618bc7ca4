//! Core types shared across the simledger workspace.
//!
//! Everything here is storage-free: the value/row representation handed
//! between the cache, catalog, and writer, the declared-schema types, the
//! collector configuration, the reporter variant type and registry, and the
//! view traits a simulation engine implements to feed the collector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Default number of cached rows per ad hoc table before a flush is forced.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 128;

/// Column implicitly prefixed onto every stored row.
pub const RUN_ID_COLUMN: &str = "runID";
/// Step column stamped onto model and agent stream rows.
pub const STEP_COLUMN: &str = "step";
/// Agent identifier column stamped onto agent stream rows.
pub const AGENT_ID_COLUMN: &str = "agentId";

/// Scalar cell value carried through the collection pipeline.
///
/// Rows are plain ordered `column -> Value` mappings; there is no
/// frame-shaped intermediate between collection and storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Whether this cell is the explicit null marker.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Real(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(flag) => Self::Bool(flag),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(int) => Self::Int(int),
                None => Self::Real(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(text) => Self::Text(text),
            // Nested structures are stored as their JSON text.
            other => Self::Text(other.to_string()),
        }
    }
}

/// Ordered `column -> Value` mapping.
///
/// Insertion order is preserved so schema-declared columns stay in schema
/// order and extra keys keep the order the caller supplied them in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, Value)>,
}

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: Vec::with_capacity(capacity),
        }
    }

    /// Set a cell, replacing any existing cell of the same name in place.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        if let Some(cell) = self.cells.iter_mut().find(|(name, _)| *name == column) {
            cell.1 = value;
        } else {
            self.cells.push((column, value));
        }
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.cells.iter().any(|(name, _)| name == column)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }
}

impl<C: Into<String>, V: Into<Value>> FromIterator<(C, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (C, V)>>(iter: I) -> Self {
        let mut row = Self::new();
        for (column, value) in iter {
            row.set(column, value);
        }
        row
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.into_iter()
    }
}

/// Storage type of a declared column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Boolean,
    Timestamp,
}

impl ColumnType {
    /// DDL type name used when creating the storage-side column.
    #[must_use]
    pub fn sql_type(self) -> &'static str {
        match self {
            Self::Integer => "bigint",
            Self::Real => "double",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
        }
    }

    /// Infer a column type from a sampled cell. Nulls carry no type
    /// information and default to `text`.
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null | Value::Text(_) => Self::Text,
            Value::Bool(_) => Self::Boolean,
            Value::Int(_) => Self::Integer,
            Value::Real(_) => Self::Real,
            Value::Timestamp(_) => Self::Timestamp,
        }
    }
}

/// One declared column of an ad hoc table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnType,
}

impl ColumnSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ColumnType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// How the bulk writer loads a batch into storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BulkMode {
    /// Pick the fastest strategy the configured backend supports.
    #[default]
    Auto,
    /// Force the native appender bulk-load path.
    Appender,
    /// Force the generic prepared-INSERT fallback.
    Insert,
}

/// Indicates an invalid collector configuration value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Static configuration for a collector.
///
/// The caller parses whatever config format it likes and hands over the
/// deserialized struct; file handling is not this crate's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Storage DSN: `duckdb:<path>`, `duckdb::memory:`, or a bare file path.
    pub connection: String,
    /// Cached rows per ad hoc table before a flush is forced.
    pub flush_threshold: usize,
    /// Per-table overrides of `flush_threshold`.
    pub table_flush_thresholds: BTreeMap<String, usize>,
    /// Ad hoc table declarations: table name -> ordered column list. Every
    /// declared table implicitly gains a leading `runID` column.
    pub table_schemas: BTreeMap<String, Vec<ColumnSpec>>,
    /// Bulk-load strategy override.
    pub bulk_mode: BulkMode,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            connection: "duckdb::memory:".to_string(),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            table_flush_thresholds: BTreeMap::new(),
            table_schemas: BTreeMap::new(),
            bulk_mode: BulkMode::Auto,
        }
    }
}

impl CollectorConfig {
    /// Validates the configuration. Called once at collector construction;
    /// a failure here is fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.is_empty() {
            return Err(ConfigError::Invalid("connection must be non-empty"));
        }
        if self.flush_threshold == 0 {
            return Err(ConfigError::Invalid("flush_threshold must be positive"));
        }
        if self.table_flush_thresholds.values().any(|&t| t == 0) {
            return Err(ConfigError::Invalid(
                "per-table flush thresholds must be positive",
            ));
        }
        for (table, columns) in &self.table_schemas {
            if table.is_empty() {
                return Err(ConfigError::Invalid("table names must be non-empty"));
            }
            if matches!(table.as_str(), "runs" | "model" | "agents") {
                return Err(ConfigError::Invalid(
                    "table name collides with a built-in table",
                ));
            }
            if columns.is_empty() {
                return Err(ConfigError::Invalid(
                    "declared tables must list at least one column",
                ));
            }
            for (index, column) in columns.iter().enumerate() {
                if column.name.is_empty() {
                    return Err(ConfigError::Invalid("column names must be non-empty"));
                }
                if column.name == RUN_ID_COLUMN {
                    return Err(ConfigError::Invalid(
                        "runID is added implicitly and must not be declared",
                    ));
                }
                if columns[..index].iter().any(|prior| prior.name == column.name) {
                    return Err(ConfigError::Invalid("duplicate column name in table"));
                }
            }
        }
        Ok(())
    }

    /// Flush threshold applying to one table (override or global default).
    #[must_use]
    pub fn flush_threshold_for(&self, table: &str) -> usize {
        self.table_flush_thresholds
            .get(table)
            .copied()
            .unwrap_or(self.flush_threshold)
    }
}

/// Reporter registration or evaluation failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReporterError {
    /// The specification is not one of the supported reporter forms.
    #[error("unsupported reporter `{name}`: {reason}")]
    Unsupported { name: String, reason: &'static str },
    /// A reporter with this name is already registered.
    #[error("duplicate reporter `{0}`")]
    Duplicate(String),
    /// An attribute reporter referenced an attribute the entity does not
    /// expose.
    #[error("reporter `{reporter}` references missing attribute `{attribute}`")]
    MissingAttribute { reporter: String, attribute: String },
}

/// Entity-to-value function boxed behind a reporter.
pub type ReporterFn<E> = Box<dyn Fn(&E) -> Value + Send + Sync>;
/// Argument-list function used by [`Reporter::FunctionWithArgs`].
pub type ArgsFn = Box<dyn Fn(&[Value]) -> Value + Send + Sync>;
/// Zero-argument closure whose bindings were fixed at registration time.
pub type BoundFn = Box<dyn Fn() -> Value + Send + Sync>;

/// A named rule for deriving one metric value from an entity.
///
/// The four supported forms are a closed set; evaluation is one exhaustive
/// match with no runtime type inspection.
pub enum Reporter<E: ?Sized> {
    /// Read the named attribute off the entity.
    Attribute(String),
    /// Invoke the callable with the entity as its sole argument.
    Function(ReporterFn<E>),
    /// Invoke the function with exactly these arguments, ignoring the
    /// entity. Used for values not derived from any single entity.
    FunctionWithArgs { call: ArgsFn, args: Vec<Value> },
    /// Invoke the pre-bound closure directly.
    Bound(BoundFn),
}

impl<E: ?Sized> Reporter<E> {
    #[must_use]
    pub fn attribute(name: impl Into<String>) -> Self {
        Self::Attribute(name.into())
    }

    #[must_use]
    pub fn function(call: impl Fn(&E) -> Value + Send + Sync + 'static) -> Self {
        Self::Function(Box::new(call))
    }

    #[must_use]
    pub fn with_args(
        call: impl Fn(&[Value]) -> Value + Send + Sync + 'static,
        args: Vec<Value>,
    ) -> Self {
        Self::FunctionWithArgs {
            call: Box::new(call),
            args,
        }
    }

    #[must_use]
    pub fn bound(call: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        Self::Bound(Box::new(call))
    }

    /// Short label for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Attribute(_) => "attribute",
            Self::Function(_) => "function",
            Self::FunctionWithArgs { .. } => "function-with-args",
            Self::Bound(_) => "bound",
        }
    }
}

impl<E: ?Sized> fmt::Debug for Reporter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute(name) => f.debug_tuple("Attribute").field(name).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

/// Ordered collection of named reporters for one entity kind.
///
/// A plain value object the collector composes over; there is no base
/// collector to inherit from.
pub struct ReporterRegistry<E: ?Sized> {
    entries: Vec<(String, Reporter<E>)>,
}

impl<E: ?Sized> Default for ReporterRegistry<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<E: ?Sized> fmt::Debug for ReporterRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, reporter) in &self.entries {
            map.entry(name, &reporter.kind());
        }
        map.finish()
    }
}

impl<E: ?Sized> ReporterRegistry<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reporter, failing fast on malformed specifications.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        reporter: Reporter<E>,
    ) -> Result<(), ReporterError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ReporterError::Unsupported {
                name,
                reason: "reporter name must be non-empty",
            });
        }
        if self.entries.iter().any(|(existing, _)| *existing == name) {
            return Err(ReporterError::Duplicate(name));
        }
        if let Reporter::Attribute(attribute) = &reporter
            && attribute.is_empty()
        {
            return Err(ReporterError::Unsupported {
                name,
                reason: "attribute reporter names an empty attribute",
            });
        }
        self.entries.push((name, reporter));
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Reporter<E>)> {
        self.entries
            .iter()
            .map(|(name, reporter)| (name.as_str(), reporter))
    }

    /// When every registered reporter is an attribute reporter, the ordered
    /// attribute names; enables single-pass multi-attribute extraction.
    #[must_use]
    pub fn attribute_names(&self) -> Option<Vec<String>> {
        self.entries
            .iter()
            .map(|(_, reporter)| match reporter {
                Reporter::Attribute(attribute) => Some(attribute.clone()),
                _ => None,
            })
            .collect()
    }
}

impl<E: EntityView + ?Sized> ReporterRegistry<E> {
    /// Evaluate every reporter against `entity`, appending one cell per
    /// reporter onto `row` in registration order.
    pub fn evaluate_into(&self, entity: &E, row: &mut Row) -> Result<(), ReporterError> {
        for (name, reporter) in &self.entries {
            let value = match reporter {
                Reporter::Attribute(attribute) => entity.attribute(attribute).ok_or_else(|| {
                    ReporterError::MissingAttribute {
                        reporter: name.clone(),
                        attribute: attribute.clone(),
                    }
                })?,
                Reporter::Function(call) => call(entity),
                Reporter::FunctionWithArgs { call, args } => call(args),
                Reporter::Bound(call) => call(),
            };
            row.set(name.clone(), value);
        }
        Ok(())
    }
}

/// Read access to named attributes of a simulation entity.
///
/// The collector makes no assumptions about model or agent internals beyond
/// what registered reporters request through this trait.
pub trait EntityView {
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Multi-attribute extraction in one call. The default delegates to
    /// [`attribute`](Self::attribute) per name; engines may override it
    /// with a cheaper batched lookup.
    fn attributes(&self, names: &[String]) -> Vec<Option<Value>> {
        names.iter().map(|name| self.attribute(name)).collect()
    }
}

/// One agent snapshot inside a model snapshot.
pub trait AgentView: EntityView {
    fn agent_id(&self) -> i64;
}

/// Model snapshot handed to `Collector::collect` each tick.
pub trait ModelView: EntityView {
    type Agent: AgentView;

    /// Completed step count, read *after* the scheduler has incremented it
    /// for the step being collected. Rows are stamped with this value
    /// minus one, so the first collected step lands as step 0.
    fn completed_steps(&self) -> u64;

    /// Agent snapshots currently held by the model.
    fn agents(&self) -> impl Iterator<Item = &Self::Agent>;
}
