//! PostgreSQL backend: pooled connections, the [`SqlExecutor`]
//! implementation, and SQLSTATE-aware error translation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Client, Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::types::ToSql;
use tokio_postgres::Config as PgConfig;
use tracing::info;

use crate::config::BackendConfig;
use crate::error::{BackendError, Context, DocrelError, ErrorHandler, Result};

use super::param::SqlParam;
use super::{ColumnDescription, SqlExecutor, TableDescription};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLSTATE codes signalling a transient transaction conflict.
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const UNIQUE_VIOLATION: &str = "23505";

/// Recycle query run before a pooled connection is handed out again.
///
/// An executor dropped between `begin` and `commit`/`rollback` returns its
/// connection with the transaction still open; the recycle query closes it
/// before the next checkout. Outside a transaction `ROLLBACK` is a no-op.
fn recycling_method() -> RecyclingMethod {
    RecyclingMethod::Custom("ROLLBACK".to_string())
}

/// Owner of the PostgreSQL connection pool.
pub struct PostgresBackend {
    pool: Pool,
}

impl PostgresBackend {
    /// Connect to PostgreSQL and verify the connection.
    pub async fn new(config: &BackendConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(POOL_CONNECTION_TIMEOUT);

        let mgr_config = ManagerConfig {
            recycling_method: recycling_method(),
        };
        let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(config.pool_size)
            .build()
            .map_err(|e| DocrelError::System(format!("creating PostgreSQL pool: {e}")))?;

        // Test connection
        let client = pool
            .get()
            .await
            .map_err(|e| DocrelError::System(format!("testing PostgreSQL connection: {e}")))?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| DocrelError::System(format!("testing PostgreSQL connection: {e}")))?;

        info!(
            "Connected to PostgreSQL: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self { pool })
    }

    /// Check out a pooled connection as an executor.
    pub async fn executor(&self) -> Result<PgExecutor> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DocrelError::System(format!("acquiring PostgreSQL connection: {e}")))?;
        Ok(PgExecutor { client })
    }
}

/// [`SqlExecutor`] over one pooled PostgreSQL connection.
pub struct PgExecutor {
    client: Client,
}

fn to_sql_refs(params: &[SqlParam]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

#[async_trait]
impl SqlExecutor for PgExecutor {
    async fn begin(&mut self) -> std::result::Result<(), BackendError> {
        self.client.batch_execute("BEGIN").await?;
        Ok(())
    }

    async fn commit(&mut self) -> std::result::Result<(), BackendError> {
        self.client.batch_execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> std::result::Result<(), BackendError> {
        self.client.batch_execute("ROLLBACK").await?;
        Ok(())
    }

    async fn execute(
        &mut self,
        sql: &str,
        params: &[SqlParam],
    ) -> std::result::Result<u64, BackendError> {
        let refs = to_sql_refs(params);
        Ok(self.client.execute(sql, &refs).await?)
    }

    async fn execute_batch(
        &mut self,
        sql: &str,
        rows: &[Vec<SqlParam>],
    ) -> std::result::Result<u64, BackendError> {
        let stmt = self.client.prepare(sql).await?;
        let mut affected = 0;
        for row in rows {
            let refs = to_sql_refs(row);
            affected += self.client.execute(&stmt, &refs).await?;
        }
        Ok(affected)
    }

    async fn query_dids(
        &mut self,
        sql: &str,
        params: &[SqlParam],
    ) -> std::result::Result<Vec<i64>, BackendError> {
        let refs = to_sql_refs(params);
        let rows = self.client.query(sql, &refs).await?;
        let mut dids = Vec::with_capacity(rows.len());
        for row in rows {
            dids.push(row.try_get::<_, i64>(0)?);
        }
        Ok(dids)
    }

    async fn query_text_rows(
        &mut self,
        sql: &str,
    ) -> std::result::Result<Vec<Vec<String>>, BackendError> {
        let rows = self.client.query(sql, &[]).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut cells = Vec::with_capacity(row.len());
            for i in 0..row.len() {
                cells.push(row.try_get::<_, String>(i)?);
            }
            out.push(cells);
        }
        Ok(out)
    }

    async fn schema_names(&mut self) -> std::result::Result<Vec<String>, BackendError> {
        let rows = self
            .client
            .query("SELECT schema_name FROM information_schema.schemata", &[])
            .await?;
        let mut names = Vec::with_capacity(rows.len());
        for row in rows {
            names.push(row.try_get::<_, String>(0)?);
        }
        Ok(names)
    }

    async fn table_names(&mut self, schema: &str) -> std::result::Result<Vec<String>, BackendError> {
        let rows = self
            .client
            .query(
                "SELECT table_name FROM information_schema.tables WHERE table_schema = $1",
                &[&schema],
            )
            .await?;
        let mut names = Vec::with_capacity(rows.len());
        for row in rows {
            names.push(row.try_get::<_, String>(0)?);
        }
        Ok(names)
    }

    async fn describe_table(
        &mut self,
        schema: &str,
        table: &str,
    ) -> std::result::Result<TableDescription, BackendError> {
        let rows = self
            .client
            .query(
                "SELECT column_name, data_type, is_nullable \
                 FROM information_schema.columns \
                 WHERE table_schema = $1 AND table_name = $2 \
                 ORDER BY ordinal_position",
                &[&schema, &table],
            )
            .await?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            columns.push(ColumnDescription {
                name: row.try_get::<_, String>(0)?,
                type_name: row.try_get::<_, String>(1)?,
                nullable: row.try_get::<_, String>(2)? == "YES",
            });
        }

        let pk_rows = self
            .client
            .query(
                "SELECT kcu.column_name \
                 FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                   ON tc.constraint_name = kcu.constraint_name \
                  AND tc.table_schema = kcu.table_schema \
                 WHERE tc.constraint_type = 'PRIMARY KEY' \
                   AND tc.table_schema = $1 AND tc.table_name = $2 \
                 ORDER BY kcu.ordinal_position",
                &[&schema, &table],
            )
            .await?;
        let mut primary_key = Vec::with_capacity(pk_rows.len());
        for row in pk_rows {
            primary_key.push(row.try_get::<_, String>(0)?);
        }

        Ok(TableDescription {
            name: table.to_string(),
            columns,
            primary_key,
        })
    }
}

/// Translates PostgreSQL SQLSTATEs into the canonical taxonomy.
///
/// Serialization failures and deadlocks are retriable regardless of context.
/// A unique violation under DDL means two transactions raced to register the
/// same catalog object; the loser must retry with a fresh snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresErrorHandler;

impl PostgresErrorHandler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn shared() -> Arc<dyn ErrorHandler> {
        Arc::new(Self)
    }
}

impl ErrorHandler for PostgresErrorHandler {
    fn handle(&self, context: Context, error: BackendError) -> DocrelError {
        match error.sqlstate.as_deref() {
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                DocrelError::Rollback(error.message)
            }
            Some(UNIQUE_VIOLATION) if context == Context::Ddl => {
                DocrelError::Rollback(error.message)
            }
            _ => DocrelError::System(format!("{context:?} statement failed: {}", error.message)),
        }
    }
}
