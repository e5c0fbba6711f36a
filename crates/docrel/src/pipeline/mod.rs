//! The insert pipeline: translation, catalog replay, and batched flushes.
//!
//! Documents are consumed as a single-pass stream and shredded as they
//! arrive. Every `docs_per_flush` documents the catalog changes the
//! translator recorded are replayed against the backend (DDL plus meta
//! rows), and only then are the accumulated rows flushed, parent doc-parts
//! before child doc-parts. Bounding the flush interval keeps memory
//! proportional to `docs_per_flush`, not to the size of the insert.

use tracing::debug;

use crate::backend::{SqlExecutor, WriteInterface};
use crate::catalog::{IdentifierFactory, MetaDatabase};
use crate::core::{DocValue, TableRefOrdering};
use crate::d2r::{D2RTranslator, DocPartData};
use crate::error::Result;

/// Orchestrates the write path for one batch of documents.
pub struct InsertPipeline<'a> {
    write_interface: &'a WriteInterface,
    factory: &'a IdentifierFactory,
    docs_per_flush: usize,
}

impl<'a> InsertPipeline<'a> {
    pub fn new(
        write_interface: &'a WriteInterface,
        factory: &'a IdentifierFactory,
        docs_per_flush: usize,
    ) -> Self {
        Self {
            write_interface,
            factory,
            docs_per_flush: docs_per_flush.max(1),
        }
    }

    /// Shred and persist a stream of documents into a collection, returning
    /// the assigned document ids in input order. The stream is consumed
    /// lazily, one document at a time, with a flush to the backend every
    /// `docs_per_flush` documents.
    ///
    /// The first error aborts the run; the caller owns the transaction and
    /// decides whether to roll back.
    pub async fn insert<I>(
        &self,
        executor: &mut dyn SqlExecutor,
        db: &mut MetaDatabase,
        collection: &str,
        docs: I,
    ) -> Result<Vec<i64>>
    where
        I: IntoIterator<Item = DocValue>,
    {
        let mut translator = D2RTranslator::new(self.factory, collection);
        let mut dids = Vec::new();
        let mut buffered = 0usize;

        for doc in docs {
            dids.push(translator.translate(db, &doc)?);
            buffered += 1;
            if buffered == self.docs_per_flush {
                self.flush(executor, db, collection, &mut translator)
                    .await?;
                buffered = 0;
            }
        }
        if buffered > 0 {
            self.flush(executor, db, collection, &mut translator)
                .await?;
        }
        Ok(dids)
    }

    async fn flush(
        &self,
        executor: &mut dyn SqlExecutor,
        db: &MetaDatabase,
        collection: &str,
        translator: &mut D2RTranslator<'_>,
    ) -> Result<()> {
        let changes = translator.take_changes();
        if !changes.is_empty() {
            debug!(collection, changes = changes.len(), "replaying catalog changes");
            self.write_interface
                .apply_catalog_changes(executor, db, collection, &changes)
                .await?;
        }

        let mut batches: Vec<DocPartData> = translator.drain(db)?;
        // Parents before children, so a child row never lands before the
        // rows it references.
        batches.sort_by(|a, b| {
            TableRefOrdering::Asc.compare(
                (a.table_ref(), a.identifier()),
                (b.table_ref(), b.identifier()),
            )
        });

        for batch in &batches {
            self.write_interface
                .insert_doc_part_data(executor, db.identifier(), batch)
                .await?;
        }
        Ok(())
    }
}
