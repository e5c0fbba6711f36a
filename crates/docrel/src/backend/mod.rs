//! The relational backend: execution surface, SQL dialect, batched write
//! interface, and the meta-schema updater.
//!
//! Core code is polymorphic over two seams:
//!
//! - [`Dialect`]: generates every DDL/DML string the engine emits
//! - [`SqlExecutor`]: runs those strings against a backend (PostgreSQL in
//!   production, an in-memory double in tests)

pub mod dialect;
pub mod meta;
pub mod param;
pub mod postgres;
pub mod write;

use async_trait::async_trait;

use crate::error::BackendError;

pub use dialect::{Dialect, PostgresDialect};
pub use meta::{SchemaUpdater, SnapshotLoader, META_SCHEMA_NAME};
pub use param::{bind_column_value, SqlParam};
pub use postgres::{PgExecutor, PostgresBackend, PostgresErrorHandler};
pub use write::WriteInterface;

/// One column of a described table, as reported by the backend's
/// information schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescription {
    pub name: String,
    /// Canonical type name per [`dialect::normalize_type_name`].
    pub type_name: String,
    pub nullable: bool,
}

/// A described table: columns in ordinal order plus the primary-key column
/// names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescription {
    pub name: String,
    pub columns: Vec<ColumnDescription>,
    pub primary_key: Vec<String>,
}

impl TableDescription {
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDescription> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// The SQL execution surface the engine consumes.
///
/// One executor represents one backend connection; `begin`/`commit`/
/// `rollback` scope the single transaction every write path runs inside.
/// All errors come back untranslated ([`BackendError`]); the write interface
/// and schema updater push them through the configured
/// [`crate::error::ErrorHandler`] with the right statement context.
#[async_trait]
pub trait SqlExecutor: Send {
    /// Begin a transaction on this connection.
    async fn begin(&mut self) -> Result<(), BackendError>;

    /// Commit the open transaction.
    async fn commit(&mut self) -> Result<(), BackendError>;

    /// Roll the open transaction back.
    async fn rollback(&mut self) -> Result<(), BackendError>;

    /// Execute one statement, returning the affected row count.
    async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> Result<u64, BackendError>;

    /// Execute one prepared statement once per parameter row, as a batch.
    async fn execute_batch(
        &mut self,
        sql: &str,
        rows: &[Vec<SqlParam>],
    ) -> Result<u64, BackendError>;

    /// Run a query whose single result column is a document id.
    async fn query_dids(
        &mut self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Vec<i64>, BackendError>;

    /// Run a query whose result columns are all text, as the meta tables
    /// are. Used when reloading the catalog.
    async fn query_text_rows(&mut self, sql: &str) -> Result<Vec<Vec<String>>, BackendError>;

    /// Names of all schemas in the backend.
    async fn schema_names(&mut self) -> Result<Vec<String>, BackendError>;

    /// Names of all tables in a schema.
    async fn table_names(&mut self, schema: &str) -> Result<Vec<String>, BackendError>;

    /// Columns and primary key of a table.
    async fn describe_table(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<TableDescription, BackendError>;
}
