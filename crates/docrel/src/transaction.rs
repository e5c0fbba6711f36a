//! The write transaction: the public surface of the engine.
//!
//! A [`WriteTransaction`] owns one backend connection and one catalog
//! snapshot for its whole lifetime. Structural objects (databases,
//! collections, doc-parts, columns) are created on first sighting and never
//! rolled back from the snapshot on failure; the caller discards a failed
//! transaction's snapshot instead of repairing it.

use std::sync::Arc;

use tracing::info;

use crate::backend::{bind_column_value, Dialect, SqlExecutor, WriteInterface};
use crate::catalog::{IdentifierFactory, MetaSnapshot};
use crate::config::WriterConfig;
use crate::core::{DocValue, FieldType, TableRef};
use crate::error::{Context, ErrorHandler, Result, UserError};
use crate::pipeline::InsertPipeline;

/// A dot-separated path of object keys naming a field inside a document,
/// e.g. `address.city`. Array traversal is implicit: a path into an array of
/// objects names the field of the element objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeReference {
    keys: Vec<String>,
}

impl AttributeReference {
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }

    /// Parse a dot-separated path. Empty input yields the empty reference,
    /// which no operation accepts.
    pub fn parse(path: &str) -> Self {
        if path.is_empty() {
            return Self { keys: Vec::new() };
        }
        Self {
            keys: path.split('.').map(str::to_string).collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// The doc-part holding the referenced field: every key but the last.
    fn table_ref(&self) -> TableRef {
        let mut table_ref = TableRef::root();
        for key in &self.keys[..self.keys.len().saturating_sub(1)] {
            table_ref = table_ref.child(key.clone());
        }
        table_ref
    }

    fn field_name(&self) -> Option<&str> {
        self.keys.last().map(String::as_str)
    }
}

impl std::fmt::Display for AttributeReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.keys.join("."))
    }
}

/// One writing transaction over a backend connection and a private catalog
/// snapshot.
pub struct WriteTransaction<E: SqlExecutor> {
    executor: E,
    snapshot: MetaSnapshot,
    factory: IdentifierFactory,
    write_interface: WriteInterface,
    error_handler: Arc<dyn ErrorHandler>,
    docs_per_flush: usize,
}

impl<E: SqlExecutor> WriteTransaction<E> {
    pub fn new(
        executor: E,
        snapshot: MetaSnapshot,
        dialect: Arc<dyn Dialect>,
        error_handler: Arc<dyn ErrorHandler>,
        writer: &WriterConfig,
    ) -> Self {
        let write_interface = WriteInterface::new(
            dialect,
            Arc::clone(&error_handler),
            writer.max_insert_batch_size,
            writer.max_delete_batch_size,
        );
        Self {
            executor,
            snapshot,
            factory: IdentifierFactory::new(),
            write_interface,
            error_handler,
            docs_per_flush: writer.docs_per_flush,
        }
    }

    /// Begin the backend transaction.
    pub async fn begin(&mut self) -> Result<()> {
        self.executor
            .begin()
            .await
            .map_err(|e| self.error_handler.handle(Context::Unknown, e))
    }

    /// Commit the backend transaction and release the snapshot, now holding
    /// every structural object this transaction created.
    pub async fn commit(mut self) -> Result<MetaSnapshot> {
        self.executor
            .commit()
            .await
            .map_err(|e| self.error_handler.handle(Context::Unknown, e))?;
        Ok(self.snapshot)
    }

    /// Roll the backend transaction back and discard the snapshot.
    pub async fn rollback(mut self) -> Result<()> {
        self.executor
            .rollback()
            .await
            .map_err(|e| self.error_handler.handle(Context::Unknown, e))
    }

    /// Shred and persist a stream of documents into a collection, creating
    /// the database and collection on first sighting. The stream is consumed
    /// in a single pass, flushed to the backend every `docs_per_flush`
    /// documents. Returns the assigned document ids in input order.
    pub async fn insert<I>(
        &mut self,
        db_name: &str,
        collection: &str,
        docs: I,
    ) -> Result<Vec<i64>>
    where
        I: IntoIterator<Item = DocValue>,
    {
        let (db_created, col_created, schema, col_identifier) = {
            let (db, db_created) = self
                .snapshot
                .get_or_create_database(&self.factory, db_name)?;
            let schema = db.identifier().to_string();
            let (col, col_created) = db.get_or_create_collection(&self.factory, collection)?;
            (db_created, col_created, schema, col.identifier().to_string())
        };
        if db_created {
            info!(database = db_name, identifier = %schema, "database created");
            self.write_interface
                .add_database(&mut self.executor, db_name, &schema)
                .await?;
        }
        if col_created {
            info!(database = db_name, collection, "collection created");
            self.write_interface
                .add_collection(&mut self.executor, db_name, collection, &col_identifier)
                .await?;
        }

        let db = self
            .snapshot
            .database_by_name_mut(db_name)
            .ok_or_else(|| crate::error::DocrelError::System(format!(
                "database {db_name} vanished from the snapshot"
            )))?;
        let pipeline =
            InsertPipeline::new(&self.write_interface, &self.factory, self.docs_per_flush);
        pipeline
            .insert(&mut self.executor, db, collection, docs)
            .await
    }

    /// Delete every document of a collection, returning how many were
    /// removed. Unknown databases and collections hold no documents, so they
    /// yield zero rather than an error.
    pub async fn delete_all(&mut self, db_name: &str, collection: &str) -> Result<u64> {
        let Some(db) = self.snapshot.database_by_name(db_name) else {
            return Ok(0);
        };
        let Some(col) = db.collection_by_name(collection) else {
            return Ok(0);
        };
        let Some(root) = col.doc_part_by_ref(&TableRef::root()) else {
            return Ok(0);
        };

        let dids = self
            .write_interface
            .read_all_dids(&mut self.executor, db.identifier(), root.identifier())
            .await?;
        self.write_interface
            .delete_collection_doc_parts(&mut self.executor, db.identifier(), col, &dids)
            .await
    }

    /// Delete every document whose referenced field holds the given scalar
    /// value, returning how many were removed.
    ///
    /// An unknown database, collection, doc-part, or field matches nothing
    /// and yields zero. The empty reference and non-scalar values are caller
    /// mistakes.
    pub async fn delete_by_att_ref(
        &mut self,
        db_name: &str,
        collection: &str,
        att_ref: &AttributeReference,
        value: &DocValue,
    ) -> Result<u64> {
        if att_ref.is_empty() {
            return Err(UserError::InvalidAttributeReference.into());
        }
        let value_type = value.field_type();
        if value_type == FieldType::Child {
            return Err(UserError::UnindexableType(value_type.as_str()).into());
        }

        let Some(db) = self.snapshot.database_by_name(db_name) else {
            return Ok(0);
        };
        let Some(col) = db.collection_by_name(collection) else {
            return Ok(0);
        };
        let Some(doc_part) = col.doc_part_by_ref(&att_ref.table_ref()) else {
            return Ok(0);
        };
        let Some(field_name) = att_ref.field_name() else {
            return Err(UserError::InvalidAttributeReference.into());
        };
        let Some(field) = doc_part.field_by_name_and_type(field_name, value_type) else {
            return Ok(0);
        };

        let param = bind_column_value(field.field_type, Some(value))?;
        let dids = self
            .write_interface
            .read_dids_by_column(
                &mut self.executor,
                db.identifier(),
                doc_part.identifier(),
                &field.identifier,
                param,
            )
            .await?;

        // A nested doc-part may hold several matching rows per document; the
        // write interface counts each document once.
        self.write_interface
            .delete_collection_doc_parts(&mut self.executor, db.identifier(), col, &dids)
            .await
    }

    /// Drop a collection: every doc-part table, its meta rows, and its
    /// catalog entry, atomically with the enclosing transaction.
    pub async fn drop_collection(&mut self, db_name: &str, collection: &str) -> Result<()> {
        {
            let db = self
                .snapshot
                .database_by_name(db_name)
                .ok_or_else(|| UserError::DatabaseNotFound(db_name.to_string()))?;
            let col = db.collection_by_name(collection).ok_or_else(|| {
                UserError::CollectionNotFound {
                    db: db_name.to_string(),
                    collection: collection.to_string(),
                }
            })?;
            self.write_interface
                .drop_collection(&mut self.executor, db, col)
                .await?;
        }
        if let Some(db) = self.snapshot.database_by_name_mut(db_name) {
            db.remove_collection(collection);
        }
        info!(database = db_name, collection, "collection dropped");
        Ok(())
    }

    /// Drop a database: its schema, every meta row under it, and its catalog
    /// entry, atomically with the enclosing transaction.
    pub async fn drop_database(&mut self, db_name: &str) -> Result<()> {
        {
            let db = self
                .snapshot
                .database_by_name(db_name)
                .ok_or_else(|| UserError::DatabaseNotFound(db_name.to_string()))?;
            self.write_interface
                .drop_database(&mut self.executor, db)
                .await?;
        }
        self.snapshot.remove_database(db_name);
        info!(database = db_name, "database dropped");
        Ok(())
    }

    /// The snapshot as this transaction currently sees it.
    #[must_use]
    pub fn snapshot(&self) -> &MetaSnapshot {
        &self.snapshot
    }
}
