//! The streaming document shredder.
//!
//! The translator walks each document depth-first, computes the [`TableRef`]
//! of every node, mutates the catalog on first sighting of a new doc-part,
//! field, or scalar type, and accumulates one [`DocPartRow`] per visited
//! node. Rows for a doc-part come out `did`-monotonic then `rid`-monotonic;
//! ordering across doc-parts is the pipeline's business.
//!
//! The translator never talks to the backend and never rolls anything back:
//! catalog mutations are recorded as [`CatalogChange`]s for the pipeline to
//! replay inside the enclosing transaction, which keeps a document's rows
//! and its catalog changes atomic together.

use std::collections::BTreeMap;

use crate::catalog::{IdentifierFactory, MetaDatabase};
use crate::core::{DocValue, FieldType, TableRef};
use crate::error::{DocrelError, Result};

use super::docpart::{CatalogChange, DocPartData, DocPartRow};

/// Streaming shredder for one collection.
///
/// One translator serves one insert pipeline run; it borrows the identifier
/// factory and is handed the owning transaction's `MetaDatabase` on every
/// call.
pub struct D2RTranslator<'f> {
    factory: &'f IdentifierFactory,
    collection: String,
    rows: BTreeMap<TableRef, Vec<DocPartRow>>,
    changes: Vec<CatalogChange>,
}

impl<'f> D2RTranslator<'f> {
    pub fn new(factory: &'f IdentifierFactory, collection: impl Into<String>) -> Self {
        Self {
            factory,
            collection: collection.into(),
            rows: BTreeMap::new(),
            changes: Vec::new(),
        }
    }

    /// Shred one document, allocating its `did`. The document root must be
    /// an object.
    pub fn translate(&mut self, db: &mut MetaDatabase, doc: &DocValue) -> Result<i64> {
        let DocValue::Object(entries) = doc else {
            return Err(DocrelError::System(
                "document root must be an object".to_string(),
            ));
        };
        let root = TableRef::root();
        self.get_or_create_doc_part(db, &root)?;
        let did = db
            .collection_by_name_mut(&self.collection)
            .ok_or_else(|| {
                DocrelError::System(format!("unknown collection {}", self.collection))
            })?
            .next_did();
        self.translate_object(db, &root, did, None, None, entries)?;
        Ok(did)
    }

    /// Whether any rows are waiting to be flushed.
    #[must_use]
    pub fn has_rows(&self) -> bool {
        self.rows.values().any(|r| !r.is_empty())
    }

    /// Catalog mutations recorded since the last call, in creation order.
    pub fn take_changes(&mut self) -> Vec<CatalogChange> {
        std::mem::take(&mut self.changes)
    }

    /// Drain the accumulated rows into per-doc-part batches. The column
    /// orders are snapshotted from the catalog at this point, so every row
    /// emitted earlier in the run aligns with (a prefix of) them.
    pub fn drain(&mut self, db: &MetaDatabase) -> Result<Vec<DocPartData>> {
        let col = db.collection_by_name(&self.collection).ok_or_else(|| {
            DocrelError::System(format!("unknown collection {}", self.collection))
        })?;
        let mut out = Vec::with_capacity(self.rows.len());
        for (table_ref, rows) in std::mem::take(&mut self.rows) {
            if rows.is_empty() {
                continue;
            }
            let meta = col.doc_part_by_ref(&table_ref).ok_or_else(|| {
                DocrelError::System(format!("rows emitted for unknown doc-part {table_ref}"))
            })?;
            out.push(DocPartData::new(meta, rows));
        }
        Ok(out)
    }

    fn translate_object(
        &mut self,
        db: &mut MetaDatabase,
        table_ref: &TableRef,
        did: i64,
        pid: Option<i32>,
        seq: Option<i32>,
        entries: &BTreeMap<String, DocValue>,
    ) -> Result<i32> {
        self.get_or_create_doc_part(db, table_ref)?;
        let rid = self.next_rid(db, table_ref)?;
        let mut row = DocPartRow::new(did, rid, pid, seq);

        for (key, value) in entries {
            match value {
                DocValue::Object(child_entries) => {
                    let position =
                        self.get_or_create_field(db, table_ref, key, FieldType::Child)?;
                    row.set_field_value(position, DocValue::Bool(false));
                    let child_ref = table_ref.child(key.clone());
                    self.translate_object(db, &child_ref, did, Some(rid), None, child_entries)?;
                }
                DocValue::Array(elements) => {
                    let position =
                        self.get_or_create_field(db, table_ref, key, FieldType::Child)?;
                    row.set_field_value(position, DocValue::Bool(true));
                    let child_ref = table_ref.child(key.clone());
                    self.get_or_create_doc_part(db, &child_ref)?;
                    self.translate_array(db, &child_ref, did, rid, 1, elements)?;
                }
                scalar => {
                    let position =
                        self.get_or_create_field(db, table_ref, key, scalar.field_type())?;
                    row.set_field_value(position, scalar.clone());
                }
            }
        }

        self.rows.entry(table_ref.clone()).or_default().push(row);
        Ok(rid)
    }

    fn translate_array(
        &mut self,
        db: &mut MetaDatabase,
        table_ref: &TableRef,
        did: i64,
        pid: i32,
        dimension: u32,
        elements: &[DocValue],
    ) -> Result<()> {
        for (index, element) in elements.iter().enumerate() {
            let seq = Some(index as i32);
            match element {
                DocValue::Object(entries) => {
                    self.translate_object(db, table_ref, did, Some(pid), seq, entries)?;
                }
                DocValue::Array(inner) => {
                    // An array directly inside an array has no key of its
                    // own: the slot row carries a child scalar and the inner
                    // elements live in the next dimension's doc-part.
                    let rid = self.next_rid(db, table_ref)?;
                    let mut row = DocPartRow::new(did, rid, Some(pid), seq);
                    let position =
                        self.get_or_create_scalar(db, table_ref, FieldType::Child)?;
                    row.set_scalar_value(position, DocValue::Bool(true));
                    self.rows.entry(table_ref.clone()).or_default().push(row);

                    let inner_ref = table_ref.child_dimension(dimension + 1);
                    self.get_or_create_doc_part(db, &inner_ref)?;
                    self.translate_array(db, &inner_ref, did, rid, dimension + 1, inner)?;
                }
                scalar => {
                    let rid = self.next_rid(db, table_ref)?;
                    let mut row = DocPartRow::new(did, rid, Some(pid), seq);
                    let position =
                        self.get_or_create_scalar(db, table_ref, scalar.field_type())?;
                    row.set_scalar_value(position, scalar.clone());
                    self.rows.entry(table_ref.clone()).or_default().push(row);
                }
            }
        }
        Ok(())
    }

    fn get_or_create_doc_part(
        &mut self,
        db: &mut MetaDatabase,
        table_ref: &TableRef,
    ) -> Result<()> {
        let (part, created) =
            db.get_or_create_doc_part(self.factory, &self.collection, table_ref)?;
        if created {
            self.changes.push(CatalogChange::DocPartAdded {
                table_ref: table_ref.clone(),
                identifier: part.identifier().to_string(),
            });
        }
        Ok(())
    }

    /// Returns the declared position of the field, creating it if new.
    fn get_or_create_field(
        &mut self,
        db: &mut MetaDatabase,
        table_ref: &TableRef,
        name: &str,
        t: FieldType,
    ) -> Result<usize> {
        let part = self.doc_part_mut(db, table_ref)?;
        let doc_part_identifier = part.identifier().to_string();
        let (field, created) = part.get_or_create_field(self.factory, name, t)?;
        let field = field.clone();
        let position = part
            .fields()
            .iter()
            .position(|f| f.field_type == t && f.name == name)
            .ok_or_else(|| {
                DocrelError::System(format!("field {name} vanished right after creation"))
            })?;
        if created {
            self.changes.push(CatalogChange::FieldAdded {
                table_ref: table_ref.clone(),
                doc_part_identifier,
                field,
            });
        }
        Ok(position)
    }

    /// Returns the declared position of the scalar column, creating it if
    /// new.
    fn get_or_create_scalar(
        &mut self,
        db: &mut MetaDatabase,
        table_ref: &TableRef,
        t: FieldType,
    ) -> Result<usize> {
        let part = self.doc_part_mut(db, table_ref)?;
        let doc_part_identifier = part.identifier().to_string();
        let (scalar, created) = part.get_or_create_scalar(self.factory, t)?;
        let scalar = scalar.clone();
        let position = part
            .scalars()
            .iter()
            .position(|s| s.field_type == t)
            .ok_or_else(|| {
                DocrelError::System("scalar column vanished right after creation".to_string())
            })?;
        if created {
            self.changes.push(CatalogChange::ScalarAdded {
                table_ref: table_ref.clone(),
                doc_part_identifier,
                scalar,
            });
        }
        Ok(position)
    }

    fn next_rid(&mut self, db: &mut MetaDatabase, table_ref: &TableRef) -> Result<i32> {
        Ok(self.doc_part_mut(db, table_ref)?.next_rid())
    }

    fn doc_part_mut<'d>(
        &self,
        db: &'d mut MetaDatabase,
        table_ref: &TableRef,
    ) -> Result<&'d mut crate::catalog::MetaDocPart> {
        db.collection_by_name_mut(&self.collection)
            .and_then(|c| c.doc_part_by_ref_mut(table_ref))
            .ok_or_else(|| {
                DocrelError::System(format!("doc-part {table_ref} vanished mid-translation"))
            })
    }
}
