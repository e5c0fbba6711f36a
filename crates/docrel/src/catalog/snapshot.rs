//! The mutable metadata catalog (meta-snapshot).
//!
//! A snapshot is the hierarchical naming map a write transaction owns:
//! database → collection → doc-part → field/scalar. Entries are created
//! lazily by the translator on first sighting and become durable when the
//! enclosing transaction commits. The catalog is monotone: nothing is
//! removed except by an explicit drop of its enclosing collection or
//! database.
//!
//! All physical identifiers are allocated through the
//! [`IdentifierFactory`], which is handed the full set of identifiers
//! already taken in the relevant scope so allocation is collision-free and
//! deterministic.

use std::collections::{BTreeMap, HashSet};

use crate::core::{FieldType, TableRef, TableRefOrdering};
use crate::error::Result;

use super::identifier::IdentifierFactory;

/// Internal column names every shredded table carries; reserved in the
/// column namespace of every doc-part.
pub const INTERNAL_COLUMNS: [&str; 4] = ["did", "rid", "pid", "seq"];

/// A typed, named column of a doc-part. Two observed types for the same
/// logical name yield two distinct fields (type fan-out, never coercion).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaField {
    pub name: String,
    pub field_type: FieldType,
    pub identifier: String,
}

/// A column holding scalars stored directly in array slots of a doc-part;
/// at most one per scalar type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaScalar {
    pub field_type: FieldType,
    pub identifier: String,
}

/// The per-subpath table backing part of a collection.
///
/// Fields and scalars are kept in insertion order; that order is the
/// declared column order every emitted row must follow.
#[derive(Debug, Clone)]
pub struct MetaDocPart {
    table_ref: TableRef,
    identifier: String,
    fields: Vec<MetaField>,
    scalars: Vec<MetaScalar>,
    next_rid: i32,
}

impl MetaDocPart {
    fn new(table_ref: TableRef, identifier: String) -> Self {
        Self {
            table_ref,
            identifier,
            fields: Vec::new(),
            scalars: Vec::new(),
            next_rid: 0,
        }
    }

    #[must_use]
    pub fn table_ref(&self) -> &TableRef {
        &self.table_ref
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Fields in declared (insertion) order.
    #[must_use]
    pub fn fields(&self) -> &[MetaField] {
        &self.fields
    }

    /// Scalars in declared (insertion) order.
    #[must_use]
    pub fn scalars(&self) -> &[MetaScalar] {
        &self.scalars
    }

    #[must_use]
    pub fn field_by_name_and_type(&self, name: &str, t: FieldType) -> Option<&MetaField> {
        self.fields
            .iter()
            .find(|f| f.field_type == t && f.name == name)
    }

    #[must_use]
    pub fn scalar_by_type(&self, t: FieldType) -> Option<&MetaScalar> {
        self.scalars.iter().find(|s| s.field_type == t)
    }

    /// Observe a `(name, type)` pair, creating its column on first sighting.
    /// Returns the field and whether it was created by this call.
    pub fn get_or_create_field(
        &mut self,
        factory: &IdentifierFactory,
        name: &str,
        t: FieldType,
    ) -> Result<(&MetaField, bool)> {
        if let Some(pos) = self
            .fields
            .iter()
            .position(|f| f.field_type == t && f.name == name)
        {
            return Ok((&self.fields[pos], false));
        }
        let taken = self.column_identifiers();
        let identifier = factory.to_field_identifier(&taken, name, t)?;
        self.fields.push(MetaField {
            name: name.to_string(),
            field_type: t,
            identifier,
        });
        Ok((self.fields.last().unwrap(), true))
    }

    /// Observe a scalar type stored directly in an array slot.
    pub fn get_or_create_scalar(
        &mut self,
        factory: &IdentifierFactory,
        t: FieldType,
    ) -> Result<(&MetaScalar, bool)> {
        if let Some(pos) = self.scalars.iter().position(|s| s.field_type == t) {
            return Ok((&self.scalars[pos], false));
        }
        let taken = self.column_identifiers();
        let identifier = factory.to_scalar_identifier(&taken, t)?;
        self.scalars.push(MetaScalar {
            field_type: t,
            identifier,
        });
        Ok((self.scalars.last().unwrap(), true))
    }

    /// Re-attach a persisted field with its already-allocated identifier.
    /// Used when rebuilding a snapshot from the meta tables; never allocates.
    pub fn restore_field(&mut self, name: String, field_type: FieldType, identifier: String) {
        if self.field_by_name_and_type(&name, field_type).is_none() {
            self.fields.push(MetaField {
                name,
                field_type,
                identifier,
            });
        }
    }

    /// Re-attach a persisted scalar column. Never allocates.
    pub fn restore_scalar(&mut self, field_type: FieldType, identifier: String) {
        if self.scalar_by_type(field_type).is_none() {
            self.scalars.push(MetaScalar {
                field_type,
                identifier,
            });
        }
    }

    /// Allocate the next row id within this doc-part. Monotonic for the
    /// lifetime of the in-memory entry.
    pub fn next_rid(&mut self) -> i32 {
        let rid = self.next_rid;
        self.next_rid += 1;
        rid
    }

    fn column_identifiers(&self) -> HashSet<String> {
        INTERNAL_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(self.fields.iter().map(|f| f.identifier.clone()))
            .chain(self.scalars.iter().map(|s| s.identifier.clone()))
            .collect()
    }
}

/// A named collection: its doc-parts keyed by [`TableRef`] plus the
/// document-id sequence for this collection's lifetime.
#[derive(Debug, Clone)]
pub struct MetaCollection {
    name: String,
    identifier: String,
    doc_parts: BTreeMap<TableRef, MetaDocPart>,
    next_did: i64,
}

impl MetaCollection {
    fn new(name: String, identifier: String) -> Self {
        Self {
            name,
            identifier,
            doc_parts: BTreeMap::new(),
            next_did: 0,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[must_use]
    pub fn doc_part_by_ref(&self, table_ref: &TableRef) -> Option<&MetaDocPart> {
        self.doc_parts.get(table_ref)
    }

    #[must_use]
    pub fn doc_part_by_ref_mut(&mut self, table_ref: &TableRef) -> Option<&mut MetaDocPart> {
        self.doc_parts.get_mut(table_ref)
    }

    /// All contained doc-parts sorted by the requested ordering: `Asc` for
    /// inserts (parents first), `Desc` for deletes (children first).
    #[must_use]
    pub fn ordered_doc_parts(&self, ordering: TableRefOrdering) -> Vec<&MetaDocPart> {
        let mut parts: Vec<&MetaDocPart> = self.doc_parts.values().collect();
        parts.sort_by(|a, b| {
            ordering.compare(
                (a.table_ref(), a.identifier()),
                (b.table_ref(), b.identifier()),
            )
        });
        parts
    }

    /// Number of doc-parts in this collection.
    #[must_use]
    pub fn doc_part_count(&self) -> usize {
        self.doc_parts.len()
    }

    /// Re-attach a persisted doc-part with its already-allocated identifier.
    pub fn restore_doc_part(&mut self, table_ref: TableRef, identifier: String) -> &mut MetaDocPart {
        self.doc_parts
            .entry(table_ref.clone())
            .or_insert_with(|| MetaDocPart::new(table_ref, identifier))
    }

    /// Seed the document-id sequence after a reload, so ids assigned before
    /// the restart are never reused.
    pub fn restore_next_did(&mut self, next_did: i64) {
        self.next_did = self.next_did.max(next_did);
    }

    /// Allocate the next document id. Monotonically increasing and unique
    /// within the collection's lifetime.
    pub fn next_did(&mut self) -> i64 {
        let did = self.next_did;
        self.next_did += 1;
        did
    }
}

/// A named database: its collections plus the physical schema identifier.
#[derive(Debug, Clone)]
pub struct MetaDatabase {
    name: String,
    identifier: String,
    collections: BTreeMap<String, MetaCollection>,
}

impl MetaDatabase {
    fn new(name: String, identifier: String) -> Self {
        Self {
            name,
            identifier,
            collections: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical schema identifier backing this database.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[must_use]
    pub fn collection_by_name(&self, name: &str) -> Option<&MetaCollection> {
        self.collections.get(name)
    }

    #[must_use]
    pub fn collection_by_name_mut(&mut self, name: &str) -> Option<&mut MetaCollection> {
        self.collections.get_mut(name)
    }

    pub fn collections(&self) -> impl Iterator<Item = &MetaCollection> {
        self.collections.values()
    }

    /// Look up a collection, creating it (with a fresh identifier) on first
    /// sighting. Returns whether this call created it.
    pub fn get_or_create_collection(
        &mut self,
        factory: &IdentifierFactory,
        name: &str,
    ) -> Result<(&mut MetaCollection, bool)> {
        if self.collections.contains_key(name) {
            return Ok((self.collections.get_mut(name).unwrap(), false));
        }
        // Collections and doc-parts share the table namespace of the schema.
        let taken = self.table_identifiers();
        let identifier = factory.to_collection_identifier(&taken, name)?;
        self.collections
            .insert(name.to_string(), MetaCollection::new(name.to_string(), identifier));
        Ok((self.collections.get_mut(name).unwrap(), true))
    }

    /// Look up a doc-part of `collection`, creating it on first sighting.
    ///
    /// A non-root ref requires its parent doc-part to exist already; the
    /// translator guarantees that by walking the document tree top-down.
    pub fn get_or_create_doc_part(
        &mut self,
        factory: &IdentifierFactory,
        collection: &str,
        table_ref: &TableRef,
    ) -> Result<(&mut MetaDocPart, bool)> {
        if self
            .collections
            .get(collection)
            .is_some_and(|c| c.doc_parts.contains_key(table_ref))
        {
            let part = self
                .collections
                .get_mut(collection)
                .unwrap()
                .doc_parts
                .get_mut(table_ref)
                .unwrap();
            return Ok((part, false));
        }

        let taken = self.table_identifiers();
        let col = self.collections.get(collection).ok_or_else(|| {
            crate::error::DocrelError::System(format!(
                "doc-part requested for unknown collection {collection}"
            ))
        })?;
        let collection_identifier = col.identifier().to_string();
        let parent_identifier = table_ref
            .parent()
            .and_then(|p| col.doc_part_by_ref(&p))
            .map(|p| p.identifier().to_string());
        debug_assert!(
            table_ref.is_root() || parent_identifier.is_some(),
            "parent doc-part of {table_ref} must be created first"
        );

        let identifier = factory.to_doc_part_identifier(
            &taken,
            &collection_identifier,
            parent_identifier.as_deref(),
            table_ref,
        )?;
        let col = self.collections.get_mut(collection).unwrap();
        col.doc_parts
            .insert(table_ref.clone(), MetaDocPart::new(table_ref.clone(), identifier));
        Ok((col.doc_parts.get_mut(table_ref).unwrap(), true))
    }

    /// Re-attach a persisted collection with its already-allocated
    /// identifier.
    pub fn restore_collection(&mut self, name: String, identifier: String) -> &mut MetaCollection {
        self.collections
            .entry(name.clone())
            .or_insert_with(|| MetaCollection::new(name, identifier))
    }

    /// Drop a collection from the snapshot. Backend purge is the caller's
    /// responsibility and happens in the same transaction.
    pub fn remove_collection(&mut self, name: &str) -> Option<MetaCollection> {
        self.collections.remove(name)
    }

    fn table_identifiers(&self) -> HashSet<String> {
        self.collections
            .values()
            .flat_map(|c| {
                std::iter::once(c.identifier().to_string())
                    .chain(c.doc_parts.values().map(|p| p.identifier().to_string()))
            })
            .collect()
    }
}

/// The root of the catalog: logical database name → [`MetaDatabase`].
///
/// Single-writer: a snapshot is mutated only by the transaction that owns
/// it. Concurrent writers hold disjoint snapshots and reconcile at commit
/// through backend-level DDL serialization.
#[derive(Debug, Clone, Default)]
pub struct MetaSnapshot {
    databases: BTreeMap<String, MetaDatabase>,
}

impl MetaSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn database_by_name(&self, name: &str) -> Option<&MetaDatabase> {
        self.databases.get(name)
    }

    #[must_use]
    pub fn database_by_name_mut(&mut self, name: &str) -> Option<&mut MetaDatabase> {
        self.databases.get_mut(name)
    }

    pub fn databases(&self) -> impl Iterator<Item = &MetaDatabase> {
        self.databases.values()
    }

    /// Look up a database, creating it (with a fresh schema identifier) on
    /// first sighting.
    pub fn get_or_create_database(
        &mut self,
        factory: &IdentifierFactory,
        name: &str,
    ) -> Result<(&mut MetaDatabase, bool)> {
        if self.databases.contains_key(name) {
            return Ok((self.databases.get_mut(name).unwrap(), false));
        }
        let taken: HashSet<String> = self
            .databases
            .values()
            .map(|d| d.identifier().to_string())
            .collect();
        let identifier = factory.to_database_identifier(&taken, name)?;
        self.databases
            .insert(name.to_string(), MetaDatabase::new(name.to_string(), identifier));
        Ok((self.databases.get_mut(name).unwrap(), true))
    }

    /// Re-attach a persisted database with its already-allocated schema
    /// identifier.
    pub fn restore_database(&mut self, name: String, identifier: String) -> &mut MetaDatabase {
        self.databases
            .entry(name.clone())
            .or_insert_with(|| MetaDatabase::new(name, identifier))
    }

    /// Drop a database from the snapshot. Backend purge is the caller's
    /// responsibility and happens in the same transaction.
    pub fn remove_database(&mut self, name: &str) -> Option<MetaDatabase> {
        self.databases.remove(name)
    }
}
