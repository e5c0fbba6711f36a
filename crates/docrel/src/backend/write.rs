//! Dialect-neutral write interface.
//!
//! Every structural and data mutation the engine performs goes through this
//! type: schema/table/column DDL mirrored into the meta tables, batched row
//! inserts, and keyed deletes. Statements are generated by the configured
//! [`Dialect`] and failures are translated by the configured
//! [`ErrorHandler`] under the context they were raised in.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::{MetaCollection, MetaDatabase};
use crate::core::{FieldType, TableRefOrdering};
use crate::d2r::{CatalogChange, DocPartData};
use crate::error::{Context, ErrorHandler, Result};

use super::dialect::Dialect;
use super::param::{bind_column_value, SqlParam};
use super::SqlExecutor;

/// Batched writer over a [`SqlExecutor`].
pub struct WriteInterface {
    dialect: Arc<dyn Dialect>,
    error_handler: Arc<dyn ErrorHandler>,
    max_insert_batch_size: usize,
    max_delete_batch_size: usize,
}

impl WriteInterface {
    pub fn new(
        dialect: Arc<dyn Dialect>,
        error_handler: Arc<dyn ErrorHandler>,
        max_insert_batch_size: usize,
        max_delete_batch_size: usize,
    ) -> Self {
        Self {
            dialect,
            error_handler,
            max_insert_batch_size: max_insert_batch_size.max(1),
            max_delete_batch_size: max_delete_batch_size.max(1),
        }
    }

    // ===== Database and collection structure =====

    /// Create the backing schema for a new database and record it.
    pub async fn add_database(
        &self,
        executor: &mut dyn SqlExecutor,
        name: &str,
        identifier: &str,
    ) -> Result<()> {
        debug!(database = name, identifier, "adding database");
        self.ddl(executor, &self.dialect.create_schema_stmt(identifier), &[])
            .await?;
        self.ddl(
            executor,
            &self.dialect.insert_meta_database_stmt(),
            &[text(name), text(identifier)],
        )
        .await
    }

    /// Record a new collection. Its root doc-part table arrives later as a
    /// [`CatalogChange::DocPartAdded`].
    pub async fn add_collection(
        &self,
        executor: &mut dyn SqlExecutor,
        database: &str,
        name: &str,
        identifier: &str,
    ) -> Result<()> {
        debug!(database, collection = name, identifier, "adding collection");
        self.ddl(
            executor,
            &self.dialect.insert_meta_collection_stmt(),
            &[text(database), text(name), text(identifier)],
        )
        .await
    }

    /// Replay the catalog changes one translator run produced: tables and
    /// columns first appear here, together with their meta rows. Changes are
    /// applied in recording order, so a doc-part always exists before the
    /// columns it receives.
    pub async fn apply_catalog_changes(
        &self,
        executor: &mut dyn SqlExecutor,
        database: &MetaDatabase,
        collection: &str,
        changes: &[CatalogChange],
    ) -> Result<()> {
        let schema = database.identifier();
        for change in changes {
            match change {
                CatalogChange::DocPartAdded {
                    table_ref,
                    identifier,
                } => {
                    debug!(schema, table = %identifier, "creating doc-part table");
                    self.ddl(
                        executor,
                        &self.dialect.create_doc_part_table_stmt(schema, identifier),
                        &[],
                    )
                    .await?;
                    self.ddl(
                        executor,
                        &self.dialect.create_did_index_stmt(schema, identifier),
                        &[],
                    )
                    .await?;
                    self.ddl(
                        executor,
                        &self.dialect.insert_meta_doc_part_stmt(),
                        &[
                            text(database.name()),
                            text(collection),
                            text(&table_ref.to_path_string()),
                            text(identifier),
                        ],
                    )
                    .await?;
                }
                CatalogChange::FieldAdded {
                    table_ref,
                    doc_part_identifier,
                    field,
                } => {
                    self.ddl(
                        executor,
                        &self.dialect.add_column_stmt(
                            schema,
                            doc_part_identifier,
                            &field.identifier,
                            field.field_type,
                        ),
                        &[],
                    )
                    .await?;
                    self.ddl(
                        executor,
                        &self.dialect.insert_meta_field_stmt(),
                        &[
                            text(database.name()),
                            text(collection),
                            text(&table_ref.to_path_string()),
                            text(&field.name),
                            text(field.field_type.as_str()),
                            text(&field.identifier),
                        ],
                    )
                    .await?;
                }
                CatalogChange::ScalarAdded {
                    table_ref,
                    doc_part_identifier,
                    scalar,
                } => {
                    self.ddl(
                        executor,
                        &self.dialect.add_column_stmt(
                            schema,
                            doc_part_identifier,
                            &scalar.identifier,
                            scalar.field_type,
                        ),
                        &[],
                    )
                    .await?;
                    self.ddl(
                        executor,
                        &self.dialect.insert_meta_scalar_stmt(),
                        &[
                            text(database.name()),
                            text(collection),
                            text(&table_ref.to_path_string()),
                            text(scalar.field_type.as_str()),
                            text(&scalar.identifier),
                        ],
                    )
                    .await?;
                }
            }
        }
        Ok(())
    }

    /// Drop every doc-part table of a collection and purge its meta rows.
    pub async fn drop_collection(
        &self,
        executor: &mut dyn SqlExecutor,
        database: &MetaDatabase,
        collection: &MetaCollection,
    ) -> Result<()> {
        debug!(
            database = database.name(),
            collection = collection.name(),
            "dropping collection"
        );
        let schema = database.identifier();
        for sql in self.dialect.drop_collection_tables_stmts(schema, collection) {
            self.ddl(executor, &sql, &[]).await?;
        }
        let key = [text(database.name()), text(collection.name())];
        for sql in [
            self.dialect.delete_meta_scalars_stmt(),
            self.dialect.delete_meta_fields_stmt(),
            self.dialect.delete_meta_doc_parts_stmt(),
            self.dialect.delete_meta_collection_stmt(),
        ] {
            self.ddl(executor, &sql, &key).await?;
        }
        Ok(())
    }

    /// Drop a database's schema and purge every meta row under it.
    pub async fn drop_database(
        &self,
        executor: &mut dyn SqlExecutor,
        database: &MetaDatabase,
    ) -> Result<()> {
        debug!(database = database.name(), "dropping database");
        self.ddl(
            executor,
            &self.dialect.drop_schema_stmt(database.identifier()),
            &[],
        )
        .await?;
        for sql in self.dialect.delete_meta_database_contents_stmts() {
            self.ddl(executor, &sql, &[text(database.name())]).await?;
        }
        self.ddl(
            executor,
            &self.dialect.delete_meta_database_stmt(),
            &[text(database.name())],
        )
        .await
    }

    // ===== Row data =====

    /// Insert the rows of one doc-part, in batches of at most the configured
    /// insert batch size.
    pub async fn insert_doc_part_data(
        &self,
        executor: &mut dyn SqlExecutor,
        schema: &str,
        data: &DocPartData,
    ) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let mut field_types: Vec<FieldType> = Vec::new();
        let sql = self
            .dialect
            .insert_doc_part_stmt(schema, data, &mut field_types);
        debug_assert_eq!(
            field_types.len(),
            data.ordered_scalars().len() + data.ordered_fields().len(),
            "statement column list diverged from the declared column order"
        );

        debug!(
            schema,
            table = data.identifier(),
            rows = data.rows().len(),
            "inserting doc-part rows"
        );
        for chunk in data.rows().chunks(self.max_insert_batch_size) {
            let mut batch: Vec<Vec<SqlParam>> = Vec::with_capacity(chunk.len());
            for row in chunk {
                let mut params: Vec<SqlParam> = Vec::with_capacity(4 + field_types.len());
                params.push(SqlParam::I64(row.did));
                params.push(SqlParam::I32(row.rid));
                params.push(match row.pid {
                    Some(pid) => SqlParam::I32(pid),
                    None => SqlParam::Null(FieldType::Int32),
                });
                params.push(match row.seq {
                    Some(seq) => SqlParam::I32(seq),
                    None => SqlParam::Null(FieldType::Int32),
                });
                let scalar_count = data.ordered_scalars().len();
                for (position, declared) in field_types.iter().enumerate() {
                    let value = if position < scalar_count {
                        row.scalar_value(position)
                    } else {
                        row.field_value(position - scalar_count)
                    };
                    params.push(bind_column_value(*declared, value)?);
                }
                batch.push(params);
            }
            executor
                .execute_batch(&sql, &batch)
                .await
                .map_err(|e| self.error_handler.handle(Context::Insert, e))?;
        }
        Ok(())
    }

    /// Delete every row of the given documents from every doc-part of a
    /// collection, returning how many distinct documents were targeted.
    /// Doc-parts are visited deepest-first and the id set is split into
    /// batches of at most the configured delete batch size.
    pub async fn delete_collection_doc_parts(
        &self,
        executor: &mut dyn SqlExecutor,
        schema: &str,
        collection: &MetaCollection,
        dids: &[i64],
    ) -> Result<u64> {
        let mut distinct = dids.to_vec();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.is_empty() {
            return Ok(0);
        }
        debug!(
            schema,
            collection = collection.name(),
            documents = distinct.len(),
            "deleting documents"
        );
        let doc_parts = collection.ordered_doc_parts(TableRefOrdering::Desc);
        for chunk in distinct.chunks(self.max_delete_batch_size) {
            for doc_part in &doc_parts {
                let sql = self
                    .dialect
                    .delete_doc_parts_stmt(schema, doc_part.identifier(), chunk);
                executor
                    .execute(&sql, &[])
                    .await
                    .map_err(|e| self.error_handler.handle(Context::Delete, e))?;
            }
        }
        Ok(distinct.len() as u64)
    }

    // ===== Reads used by the delete paths =====

    /// All document ids present in a doc-part table.
    pub async fn read_all_dids(
        &self,
        executor: &mut dyn SqlExecutor,
        schema: &str,
        table: &str,
    ) -> Result<Vec<i64>> {
        let sql = self.dialect.select_dids_stmt(schema, table);
        executor
            .query_dids(&sql, &[])
            .await
            .map_err(|e| self.error_handler.handle(Context::Read, e))
    }

    /// Document ids of rows whose given column holds the given value.
    pub async fn read_dids_by_column(
        &self,
        executor: &mut dyn SqlExecutor,
        schema: &str,
        table: &str,
        column: &str,
        value: SqlParam,
    ) -> Result<Vec<i64>> {
        let sql = self.dialect.select_dids_by_column_stmt(schema, table, column);
        executor
            .query_dids(&sql, &[value])
            .await
            .map_err(|e| self.error_handler.handle(Context::Read, e))
    }

    async fn ddl(
        &self,
        executor: &mut dyn SqlExecutor,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<()> {
        executor
            .execute(sql, params)
            .await
            .map_err(|e| self.error_handler.handle(Context::Ddl, e))?;
        Ok(())
    }
}

fn text(s: &str) -> SqlParam {
    SqlParam::Text(s.to_string())
}
