//! The persistent meta-schema and its updater.
//!
//! The catalog is durably mirrored in five tables under a reserved schema.
//! On startup the updater either bootstraps that schema or verifies that an
//! existing one is semantically compatible with the layout this version
//! expects; an incompatible layout is fatal.

use std::sync::Arc;

use tracing::{debug, info};

use crate::catalog::MetaSnapshot;
use crate::core::{FieldType, TableRef};
use crate::error::{Context, DocrelError, ErrorHandler, Result};

use super::dialect::{normalize_type_name, Dialect};
use super::{ColumnDescription, SqlExecutor, TableDescription};

/// Reserved schema holding the meta tables. No user database may map to it.
pub const META_SCHEMA_NAME: &str = "torodb";

/// The five meta tables, in creation order.
const META_TABLES: [&str; 5] = [
    "meta_database",
    "meta_collection",
    "meta_doc_part",
    "meta_field",
    "meta_scalar",
];

/// Validates or bootstraps the persistent meta-schema.
pub struct SchemaUpdater {
    dialect: Arc<dyn Dialect>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl SchemaUpdater {
    pub fn new(dialect: Arc<dyn Dialect>, error_handler: Arc<dyn ErrorHandler>) -> Self {
        Self {
            dialect,
            error_handler,
        }
    }

    /// Ensure the meta-schema exists and matches the expected layout.
    ///
    /// When the schema is absent it is created together with all five meta
    /// tables. When present, each table must carry the expected columns with
    /// the same type and nullability and the same primary key; extra columns
    /// are tolerated, anything else is [`DocrelError::InvalidDatabase`].
    pub async fn check_or_create(&self, executor: &mut dyn SqlExecutor) -> Result<()> {
        let schemas = executor
            .schema_names()
            .await
            .map_err(|e| self.error_handler.handle(Context::Read, e))?;

        if schemas.iter().any(|s| s == META_SCHEMA_NAME) {
            debug!(schema = META_SCHEMA_NAME, "meta-schema found, validating");
            self.check(executor).await?;
            info!(schema = META_SCHEMA_NAME, "meta-schema validated");
        } else {
            info!(schema = META_SCHEMA_NAME, "meta-schema absent, creating");
            self.create(executor).await?;
        }
        Ok(())
    }

    async fn create(&self, executor: &mut dyn SqlExecutor) -> Result<()> {
        let d = self.dialect.as_ref();
        let stmts = [
            d.create_schema_stmt(META_SCHEMA_NAME),
            d.create_meta_database_table_stmt(),
            d.create_meta_collection_table_stmt(),
            d.create_meta_doc_part_table_stmt(),
            d.create_meta_field_table_stmt(),
            d.create_meta_scalar_table_stmt(),
        ];
        for sql in &stmts {
            executor
                .execute(sql, &[])
                .await
                .map_err(|e| self.error_handler.handle(Context::Ddl, e))?;
        }
        Ok(())
    }

    async fn check(&self, executor: &mut dyn SqlExecutor) -> Result<()> {
        let tables = executor
            .table_names(META_SCHEMA_NAME)
            .await
            .map_err(|e| self.error_handler.handle(Context::Read, e))?;

        for expected in expected_meta_tables() {
            if !tables.iter().any(|t| t == &expected.name) {
                return Err(DocrelError::InvalidDatabase(format!(
                    "meta table '{}.{}' is missing",
                    META_SCHEMA_NAME, expected.name
                )));
            }
            let actual = executor
                .describe_table(META_SCHEMA_NAME, &expected.name)
                .await
                .map_err(|e| self.error_handler.handle(Context::Read, e))?;
            check_table(&expected, &actual)?;
        }
        Ok(())
    }
}

/// Rebuilds a [`MetaSnapshot`] from the persisted meta tables.
///
/// Identifiers come back exactly as allocated before the restart; nothing is
/// re-derived through the factory. Each collection's document-id sequence is
/// seeded past the highest `did` present in its root doc-part, so restarts
/// never reuse ids.
pub struct SnapshotLoader {
    dialect: Arc<dyn Dialect>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl SnapshotLoader {
    pub fn new(dialect: Arc<dyn Dialect>, error_handler: Arc<dyn ErrorHandler>) -> Self {
        Self {
            dialect,
            error_handler,
        }
    }

    pub async fn load(&self, executor: &mut dyn SqlExecutor) -> Result<MetaSnapshot> {
        let mut snapshot = MetaSnapshot::new();

        for row in self.rows(executor, &self.dialect.select_meta_databases_stmt()).await? {
            let [name, identifier] = into_cells(row)?;
            snapshot.restore_database(name, identifier);
        }
        for row in self.rows(executor, &self.dialect.select_meta_collections_stmt()).await? {
            let [database, name, identifier] = into_cells(row)?;
            self.database_mut(&mut snapshot, &database)?
                .restore_collection(name, identifier);
        }
        for row in self.rows(executor, &self.dialect.select_meta_doc_parts_stmt()).await? {
            let [database, collection, tableref, identifier] = into_cells(row)?;
            self.collection_mut(&mut snapshot, &database, &collection)?
                .restore_doc_part(TableRef::parse_path(&tableref), identifier);
        }
        for row in self.rows(executor, &self.dialect.select_meta_fields_stmt()).await? {
            let [database, collection, tableref, name, type_name, identifier] = into_cells(row)?;
            let field_type = parse_field_type(&type_name)?;
            let table_ref = TableRef::parse_path(&tableref);
            self.doc_part_mut(&mut snapshot, &database, &collection, &table_ref)?
                .restore_field(name, field_type, identifier);
        }
        for row in self.rows(executor, &self.dialect.select_meta_scalars_stmt()).await? {
            let [database, collection, tableref, type_name, identifier] = into_cells(row)?;
            let field_type = parse_field_type(&type_name)?;
            let table_ref = TableRef::parse_path(&tableref);
            self.doc_part_mut(&mut snapshot, &database, &collection, &table_ref)?
                .restore_scalar(field_type, identifier);
        }

        self.seed_did_sequences(executor, &mut snapshot).await?;
        info!(
            databases = snapshot.databases().count(),
            "catalog reloaded from meta-schema"
        );
        Ok(snapshot)
    }

    /// Advance every collection's `did` sequence past the ids already in its
    /// root doc-part table.
    async fn seed_did_sequences(
        &self,
        executor: &mut dyn SqlExecutor,
        snapshot: &mut MetaSnapshot,
    ) -> Result<()> {
        let mut seeds: Vec<(String, String, i64)> = Vec::new();
        for db in snapshot.databases() {
            for col in db.collections() {
                let Some(root) = col.doc_part_by_ref(&TableRef::root()) else {
                    continue;
                };
                let sql = self
                    .dialect
                    .select_dids_stmt(db.identifier(), root.identifier());
                let dids = executor
                    .query_dids(&sql, &[])
                    .await
                    .map_err(|e| self.error_handler.handle(Context::Read, e))?;
                if let Some(max) = dids.into_iter().max() {
                    seeds.push((db.name().to_string(), col.name().to_string(), max + 1));
                }
            }
        }
        for (database, collection, next_did) in seeds {
            if let Some(col) = snapshot
                .database_by_name_mut(&database)
                .and_then(|d| d.collection_by_name_mut(&collection))
            {
                col.restore_next_did(next_did);
            }
        }
        Ok(())
    }

    async fn rows(
        &self,
        executor: &mut dyn SqlExecutor,
        sql: &str,
    ) -> Result<Vec<Vec<String>>> {
        executor
            .query_text_rows(sql)
            .await
            .map_err(|e| self.error_handler.handle(Context::Read, e))
    }

    fn database_mut<'s>(
        &self,
        snapshot: &'s mut MetaSnapshot,
        database: &str,
    ) -> Result<&'s mut crate::catalog::MetaDatabase> {
        snapshot.database_by_name_mut(database).ok_or_else(|| {
            DocrelError::InvalidDatabase(format!(
                "meta row references unknown database '{database}'"
            ))
        })
    }

    fn collection_mut<'s>(
        &self,
        snapshot: &'s mut MetaSnapshot,
        database: &str,
        collection: &str,
    ) -> Result<&'s mut crate::catalog::MetaCollection> {
        self.database_mut(snapshot, database)?
            .collection_by_name_mut(collection)
            .ok_or_else(|| {
                DocrelError::InvalidDatabase(format!(
                    "meta row references unknown collection '{database}.{collection}'"
                ))
            })
    }

    fn doc_part_mut<'s>(
        &self,
        snapshot: &'s mut MetaSnapshot,
        database: &str,
        collection: &str,
        table_ref: &TableRef,
    ) -> Result<&'s mut crate::catalog::MetaDocPart> {
        self.collection_mut(snapshot, database, collection)?
            .doc_part_by_ref_mut(table_ref)
            .ok_or_else(|| {
                DocrelError::InvalidDatabase(format!(
                    "meta row references unknown doc-part '{database}.{collection}.{table_ref}'"
                ))
            })
    }
}

fn into_cells<const N: usize>(row: Vec<String>) -> Result<[String; N]> {
    let len = row.len();
    row.try_into().map_err(|_| {
        DocrelError::InvalidDatabase(format!(
            "meta row has {len} columns where {N} were expected"
        ))
    })
}

fn parse_field_type(type_name: &str) -> Result<FieldType> {
    FieldType::parse(type_name).ok_or_else(|| {
        DocrelError::InvalidDatabase(format!("meta row carries unknown field type '{type_name}'"))
    })
}

/// Semantic compatibility of an observed table against its reference
/// layout. Column order and extra columns do not matter.
fn check_table(expected: &TableDescription, actual: &TableDescription) -> Result<()> {
    for col in &expected.columns {
        let Some(found) = actual.column(&col.name) else {
            return Err(DocrelError::InvalidDatabase(format!(
                "meta table '{}' lacks column '{}'",
                expected.name, col.name
            )));
        };
        let found_type = normalize_type_name(&found.type_name);
        if found_type != col.type_name {
            return Err(DocrelError::InvalidDatabase(format!(
                "meta table '{}' column '{}' has type '{}', expected '{}'",
                expected.name, col.name, found_type, col.type_name
            )));
        }
        if found.nullable != col.nullable {
            return Err(DocrelError::InvalidDatabase(format!(
                "meta table '{}' column '{}' has the wrong nullability",
                expected.name, col.name
            )));
        }
    }

    let mut expected_pk = expected.primary_key.clone();
    let mut actual_pk = actual.primary_key.clone();
    expected_pk.sort();
    actual_pk.sort();
    if expected_pk != actual_pk {
        return Err(DocrelError::InvalidDatabase(format!(
            "meta table '{}' has primary key ({}), expected ({})",
            expected.name,
            actual.primary_key.join(", "),
            expected.primary_key.join(", ")
        )));
    }
    Ok(())
}

fn text_col(name: &str) -> ColumnDescription {
    ColumnDescription {
        name: name.to_string(),
        type_name: "text".to_string(),
        nullable: false,
    }
}

fn table(name: &str, columns: &[&str], primary_key: &[&str]) -> TableDescription {
    TableDescription {
        name: name.to_string(),
        columns: columns.iter().map(|c| text_col(c)).collect(),
        primary_key: primary_key.iter().map(|c| (*c).to_string()).collect(),
    }
}

/// Reference layout of the five meta tables.
pub fn expected_meta_tables() -> Vec<TableDescription> {
    vec![
        table("meta_database", &["name", "identifier"], &["name"]),
        table(
            "meta_collection",
            &["database", "name", "identifier"],
            &["database", "name"],
        ),
        table(
            "meta_doc_part",
            &["database", "collection", "tableref", "identifier"],
            &["database", "collection", "tableref"],
        ),
        table(
            "meta_field",
            &["database", "collection", "tableref", "name", "type", "identifier"],
            &["database", "collection", "tableref", "name", "type"],
        ),
        table(
            "meta_scalar",
            &["database", "collection", "tableref", "type", "identifier"],
            &["database", "collection", "tableref", "type"],
        ),
    ]
}
