//! SQL syntax strategy for the backend.
//!
//! Every DDL/DML string the engine emits is generated through a [`Dialect`].
//! Identifiers are always quoted; only data values travel as bound
//! parameters.

use crate::catalog::MetaCollection;
use crate::core::FieldType;
use crate::d2r::DocPartData;

use super::meta::META_SCHEMA_NAME;

/// SQL generator the write interface and schema updater are polymorphic
/// over.
pub trait Dialect: Send + Sync {
    /// Dialect identifier (e.g. "postgres").
    fn name(&self) -> &str;

    /// Quote an identifier for unambiguous use in statements.
    fn quote_ident(&self, name: &str) -> String;

    /// `schema.table` with both parts quoted.
    fn qualify(&self, schema: &str, table: &str) -> String {
        format!("{}.{}", self.quote_ident(schema), self.quote_ident(table))
    }

    /// Parameter placeholder for a 1-based position.
    fn param_placeholder(&self, index: usize) -> String;

    /// Column type backing a [`FieldType`].
    fn column_type(&self, t: FieldType) -> &'static str;

    // ===== Schema and doc-part DDL =====

    fn create_schema_stmt(&self, schema: &str) -> String;
    fn drop_schema_stmt(&self, schema: &str) -> String;

    /// Shredded table with the four internal columns; data columns are added
    /// as the catalog observes them.
    fn create_doc_part_table_stmt(&self, schema: &str, table: &str) -> String;

    /// The `did` index every doc-part carries so deletes stay keyed.
    fn create_did_index_stmt(&self, schema: &str, table: &str) -> String;

    fn drop_table_stmt(&self, schema: &str, table: &str) -> String;

    fn add_column_stmt(&self, schema: &str, table: &str, column: &str, t: FieldType) -> String;

    // ===== Doc-part DML =====

    /// Parameterised INSERT for one doc-part. Fills `field_types` with the
    /// declared type of every bound column in positional order
    /// `(scalars…, fields…)`, excluding the internal columns.
    fn insert_doc_part_stmt(
        &self,
        schema: &str,
        data: &DocPartData,
        field_types: &mut Vec<FieldType>,
    ) -> String;

    /// DELETE of every row of a doc-part whose `did` is in the given set.
    fn delete_doc_parts_stmt(&self, schema: &str, table: &str, dids: &[i64]) -> String;

    /// All document ids present in a doc-part table.
    fn select_dids_stmt(&self, schema: &str, table: &str) -> String;

    /// Document ids of rows whose given column equals the bound parameter.
    fn select_dids_by_column_stmt(&self, schema: &str, table: &str, column: &str) -> String;

    // ===== Meta-schema DDL =====

    fn create_meta_database_table_stmt(&self) -> String;
    fn create_meta_collection_table_stmt(&self) -> String;
    fn create_meta_doc_part_table_stmt(&self) -> String;
    fn create_meta_field_table_stmt(&self) -> String;
    fn create_meta_scalar_table_stmt(&self) -> String;

    // ===== Meta-schema DML =====

    /// INSERT with params `(name, identifier)`.
    fn insert_meta_database_stmt(&self) -> String;
    /// INSERT with params `(database, name, identifier)`.
    fn insert_meta_collection_stmt(&self) -> String;
    /// INSERT with params `(database, collection, tableref, identifier)`.
    fn insert_meta_doc_part_stmt(&self) -> String;
    /// INSERT with params `(database, collection, tableref, name, type, identifier)`.
    fn insert_meta_field_stmt(&self) -> String;
    /// INSERT with params `(database, collection, tableref, type, identifier)`.
    fn insert_meta_scalar_stmt(&self) -> String;

    /// DELETE with param `(name)`.
    fn delete_meta_database_stmt(&self) -> String;
    /// DELETEs with params `(database, name)` / `(database, collection)`.
    fn delete_meta_collection_stmt(&self) -> String;
    fn delete_meta_doc_parts_stmt(&self) -> String;
    fn delete_meta_fields_stmt(&self) -> String;
    fn delete_meta_scalars_stmt(&self) -> String;

    /// DELETEs of every meta row of a database, params `(database)`.
    fn delete_meta_database_contents_stmts(&self) -> Vec<String>;

    // ===== Meta-schema reads (catalog reload) =====

    /// SELECT of `(name, identifier)` rows.
    fn select_meta_databases_stmt(&self) -> String;
    /// SELECT of `(database, name, identifier)` rows.
    fn select_meta_collections_stmt(&self) -> String;
    /// SELECT of `(database, collection, tableref, identifier)` rows.
    fn select_meta_doc_parts_stmt(&self) -> String;
    /// SELECT of `(database, collection, tableref, name, type, identifier)` rows.
    fn select_meta_fields_stmt(&self) -> String;
    /// SELECT of `(database, collection, tableref, type, identifier)` rows.
    fn select_meta_scalars_stmt(&self) -> String;

    /// Doc-part tables of a collection in an arbitrary but complete order,
    /// used when a whole collection is dropped.
    fn drop_collection_tables_stmts(&self, schema: &str, collection: &MetaCollection) -> Vec<String> {
        collection
            .ordered_doc_parts(crate::core::TableRefOrdering::Desc)
            .iter()
            .map(|p| self.drop_table_stmt(schema, p.identifier()))
            .collect()
    }
}

/// Canonicalise backend-reported type names so semantic equality checks do
/// not trip over information-schema spellings.
#[must_use]
pub fn normalize_type_name(raw: &str) -> String {
    match raw.to_lowercase().as_str() {
        "character varying" => "varchar".to_string(),
        "double precision" => "double".to_string(),
        "timestamp with time zone" => "timestamptz".to_string(),
        "time without time zone" => "time".to_string(),
        "int4" => "integer".to_string(),
        "int8" => "bigint".to_string(),
        other => other.to_string(),
    }
}

/// PostgreSQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn meta_table(&self, table: &str) -> String {
        self.qualify(META_SCHEMA_NAME, table)
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn column_type(&self, t: FieldType) -> &'static str {
        match t {
            FieldType::Null | FieldType::Bool | FieldType::Child => "boolean",
            FieldType::Int32 => "integer",
            FieldType::Int64 => "bigint",
            FieldType::Double => "double precision",
            FieldType::String => "text",
            FieldType::Instant => "timestamptz",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::Binary => "bytea",
        }
    }

    fn create_schema_stmt(&self, schema: &str) -> String {
        format!("CREATE SCHEMA {}", self.quote_ident(schema))
    }

    fn drop_schema_stmt(&self, schema: &str) -> String {
        format!("DROP SCHEMA {} CASCADE", self.quote_ident(schema))
    }

    fn create_doc_part_table_stmt(&self, schema: &str, table: &str) -> String {
        format!(
            "CREATE TABLE {} (\"did\" bigint NOT NULL, \"rid\" integer NOT NULL, \
             \"pid\" integer NULL, \"seq\" integer NULL)",
            self.qualify(schema, table)
        )
    }

    fn create_did_index_stmt(&self, schema: &str, table: &str) -> String {
        format!(
            "CREATE INDEX {} ON {} (\"did\")",
            self.quote_ident(&format!("{table}_did_idx")),
            self.qualify(schema, table)
        )
    }

    fn drop_table_stmt(&self, schema: &str, table: &str) -> String {
        format!("DROP TABLE {}", self.qualify(schema, table))
    }

    fn add_column_stmt(&self, schema: &str, table: &str, column: &str, t: FieldType) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {} {} NULL",
            self.qualify(schema, table),
            self.quote_ident(column),
            self.column_type(t)
        )
    }

    fn insert_doc_part_stmt(
        &self,
        schema: &str,
        data: &DocPartData,
        field_types: &mut Vec<FieldType>,
    ) -> String {
        let mut columns: Vec<String> = crate::catalog::INTERNAL_COLUMNS
            .iter()
            .map(|c| self.quote_ident(c))
            .collect();
        for scalar in data.ordered_scalars() {
            columns.push(self.quote_ident(&scalar.identifier));
            field_types.push(scalar.field_type);
        }
        for field in data.ordered_fields() {
            columns.push(self.quote_ident(&field.identifier));
            field_types.push(field.field_type);
        }
        let placeholders: Vec<String> = (1..=columns.len())
            .map(|i| self.param_placeholder(i))
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.qualify(schema, data.identifier()),
            columns.join(", "),
            placeholders.join(", ")
        )
    }

    fn delete_doc_parts_stmt(&self, schema: &str, table: &str, dids: &[i64]) -> String {
        let ids: Vec<String> = dids.iter().map(|d| d.to_string()).collect();
        format!(
            "DELETE FROM {} WHERE \"did\" IN ({})",
            self.qualify(schema, table),
            ids.join(", ")
        )
    }

    fn select_dids_stmt(&self, schema: &str, table: &str) -> String {
        format!("SELECT \"did\" FROM {}", self.qualify(schema, table))
    }

    fn select_dids_by_column_stmt(&self, schema: &str, table: &str, column: &str) -> String {
        format!(
            "SELECT \"did\" FROM {} WHERE {} = $1",
            self.qualify(schema, table),
            self.quote_ident(column)
        )
    }

    fn create_meta_database_table_stmt(&self) -> String {
        format!(
            "CREATE TABLE {} (\"name\" text NOT NULL, \"identifier\" text NOT NULL UNIQUE, \
             PRIMARY KEY (\"name\"))",
            self.meta_table("meta_database")
        )
    }

    fn create_meta_collection_table_stmt(&self) -> String {
        format!(
            "CREATE TABLE {} (\"database\" text NOT NULL, \"name\" text NOT NULL, \
             \"identifier\" text NOT NULL UNIQUE, PRIMARY KEY (\"database\", \"name\"))",
            self.meta_table("meta_collection")
        )
    }

    fn create_meta_doc_part_table_stmt(&self) -> String {
        format!(
            "CREATE TABLE {} (\"database\" text NOT NULL, \"collection\" text NOT NULL, \
             \"tableref\" text NOT NULL, \"identifier\" text NOT NULL UNIQUE, \
             PRIMARY KEY (\"database\", \"collection\", \"tableref\"))",
            self.meta_table("meta_doc_part")
        )
    }

    fn create_meta_field_table_stmt(&self) -> String {
        format!(
            "CREATE TABLE {} (\"database\" text NOT NULL, \"collection\" text NOT NULL, \
             \"tableref\" text NOT NULL, \"name\" text NOT NULL, \"type\" text NOT NULL, \
             \"identifier\" text NOT NULL UNIQUE, \
             PRIMARY KEY (\"database\", \"collection\", \"tableref\", \"name\", \"type\"))",
            self.meta_table("meta_field")
        )
    }

    fn create_meta_scalar_table_stmt(&self) -> String {
        format!(
            "CREATE TABLE {} (\"database\" text NOT NULL, \"collection\" text NOT NULL, \
             \"tableref\" text NOT NULL, \"type\" text NOT NULL, \
             \"identifier\" text NOT NULL UNIQUE, \
             PRIMARY KEY (\"database\", \"collection\", \"tableref\", \"type\"))",
            self.meta_table("meta_scalar")
        )
    }

    fn insert_meta_database_stmt(&self) -> String {
        format!(
            "INSERT INTO {} (\"name\", \"identifier\") VALUES ($1, $2)",
            self.meta_table("meta_database")
        )
    }

    fn insert_meta_collection_stmt(&self) -> String {
        format!(
            "INSERT INTO {} (\"database\", \"name\", \"identifier\") VALUES ($1, $2, $3)",
            self.meta_table("meta_collection")
        )
    }

    fn insert_meta_doc_part_stmt(&self) -> String {
        format!(
            "INSERT INTO {} (\"database\", \"collection\", \"tableref\", \"identifier\") \
             VALUES ($1, $2, $3, $4)",
            self.meta_table("meta_doc_part")
        )
    }

    fn insert_meta_field_stmt(&self) -> String {
        format!(
            "INSERT INTO {} (\"database\", \"collection\", \"tableref\", \"name\", \"type\", \
             \"identifier\") VALUES ($1, $2, $3, $4, $5, $6)",
            self.meta_table("meta_field")
        )
    }

    fn insert_meta_scalar_stmt(&self) -> String {
        format!(
            "INSERT INTO {} (\"database\", \"collection\", \"tableref\", \"type\", \
             \"identifier\") VALUES ($1, $2, $3, $4, $5)",
            self.meta_table("meta_scalar")
        )
    }

    fn delete_meta_database_stmt(&self) -> String {
        format!(
            "DELETE FROM {} WHERE \"name\" = $1",
            self.meta_table("meta_database")
        )
    }

    fn delete_meta_collection_stmt(&self) -> String {
        format!(
            "DELETE FROM {} WHERE \"database\" = $1 AND \"name\" = $2",
            self.meta_table("meta_collection")
        )
    }

    fn delete_meta_doc_parts_stmt(&self) -> String {
        format!(
            "DELETE FROM {} WHERE \"database\" = $1 AND \"collection\" = $2",
            self.meta_table("meta_doc_part")
        )
    }

    fn delete_meta_fields_stmt(&self) -> String {
        format!(
            "DELETE FROM {} WHERE \"database\" = $1 AND \"collection\" = $2",
            self.meta_table("meta_field")
        )
    }

    fn delete_meta_scalars_stmt(&self) -> String {
        format!(
            "DELETE FROM {} WHERE \"database\" = $1 AND \"collection\" = $2",
            self.meta_table("meta_scalar")
        )
    }

    fn delete_meta_database_contents_stmts(&self) -> Vec<String> {
        ["meta_scalar", "meta_field", "meta_doc_part", "meta_collection"]
            .iter()
            .map(|t| format!("DELETE FROM {} WHERE \"database\" = $1", self.meta_table(t)))
            .collect()
    }

    fn select_meta_databases_stmt(&self) -> String {
        format!(
            "SELECT \"name\", \"identifier\" FROM {}",
            self.meta_table("meta_database")
        )
    }

    fn select_meta_collections_stmt(&self) -> String {
        format!(
            "SELECT \"database\", \"name\", \"identifier\" FROM {}",
            self.meta_table("meta_collection")
        )
    }

    fn select_meta_doc_parts_stmt(&self) -> String {
        format!(
            "SELECT \"database\", \"collection\", \"tableref\", \"identifier\" FROM {}",
            self.meta_table("meta_doc_part")
        )
    }

    fn select_meta_fields_stmt(&self) -> String {
        format!(
            "SELECT \"database\", \"collection\", \"tableref\", \"name\", \"type\", \
             \"identifier\" FROM {} ORDER BY \"identifier\"",
            self.meta_table("meta_field")
        )
    }

    fn select_meta_scalars_stmt(&self) -> String {
        format!(
            "SELECT \"database\", \"collection\", \"tableref\", \"type\", \"identifier\" \
             FROM {} ORDER BY \"identifier\"",
            self.meta_table("meta_scalar")
        )
    }
}
