//! Row batches produced by the shredder.
//!
//! A [`DocPartData`] carries every row the translator emitted for one
//! doc-part, together with the declared column order (scalars, then fields)
//! those rows were aligned to. The write interface binds parameters in
//! exactly that order.

use crate::catalog::{MetaDocPart, MetaField, MetaScalar};
use crate::core::{DocValue, TableRef};

/// One shredded row: the four internal fields plus column values aligned to
/// the declared scalar/field order of the doc-part.
///
/// The value vectors may be shorter than the declared lists when the row was
/// emitted before later documents widened the doc-part; missing positions
/// are null.
#[derive(Debug, Clone, PartialEq)]
pub struct DocPartRow {
    pub did: i64,
    pub rid: i32,
    pub pid: Option<i32>,
    pub seq: Option<i32>,
    scalar_values: Vec<Option<DocValue>>,
    field_values: Vec<Option<DocValue>>,
}

impl DocPartRow {
    pub(crate) fn new(did: i64, rid: i32, pid: Option<i32>, seq: Option<i32>) -> Self {
        Self {
            did,
            rid,
            pid,
            seq,
            scalar_values: Vec::new(),
            field_values: Vec::new(),
        }
    }

    /// Place a value at a declared field position, growing the vector with
    /// nulls as needed.
    pub(crate) fn set_field_value(&mut self, position: usize, value: DocValue) {
        if self.field_values.len() <= position {
            self.field_values.resize(position + 1, None);
        }
        self.field_values[position] = Some(value);
    }

    /// Place a value at a declared scalar position.
    pub(crate) fn set_scalar_value(&mut self, position: usize, value: DocValue) {
        if self.scalar_values.len() <= position {
            self.scalar_values.resize(position + 1, None);
        }
        self.scalar_values[position] = Some(value);
    }

    /// Value at a declared scalar position, null when never set.
    #[must_use]
    pub fn scalar_value(&self, position: usize) -> Option<&DocValue> {
        self.scalar_values.get(position).and_then(|v| v.as_ref())
    }

    /// Value at a declared field position, null when never set.
    #[must_use]
    pub fn field_value(&self, position: usize) -> Option<&DocValue> {
        self.field_values.get(position).and_then(|v| v.as_ref())
    }
}

/// The rows emitted for one doc-part in one translator run, with the column
/// order they follow.
#[derive(Debug, Clone)]
pub struct DocPartData {
    table_ref: TableRef,
    identifier: String,
    scalars: Vec<MetaScalar>,
    fields: Vec<MetaField>,
    rows: Vec<DocPartRow>,
}

impl DocPartData {
    pub(crate) fn new(meta: &MetaDocPart, rows: Vec<DocPartRow>) -> Self {
        Self {
            table_ref: meta.table_ref().clone(),
            identifier: meta.identifier().to_string(),
            scalars: meta.scalars().to_vec(),
            fields: meta.fields().to_vec(),
            rows,
        }
    }

    #[must_use]
    pub fn table_ref(&self) -> &TableRef {
        &self.table_ref
    }

    /// Physical table identifier of the backing doc-part.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Declared scalar columns, in the order row values are bound.
    #[must_use]
    pub fn ordered_scalars(&self) -> &[MetaScalar] {
        &self.scalars
    }

    /// Declared field columns, in the order row values are bound.
    #[must_use]
    pub fn ordered_fields(&self) -> &[MetaField] {
        &self.fields
    }

    #[must_use]
    pub fn rows(&self) -> &[DocPartRow] {
        &self.rows
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A catalog mutation the translator performed, to be replayed against the
/// backend (DDL plus meta-table rows) before the affected rows are flushed.
///
/// Changes are recorded in creation order, so a doc-part always precedes the
/// fields and scalars it contains.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogChange {
    DocPartAdded {
        table_ref: TableRef,
        identifier: String,
    },
    FieldAdded {
        table_ref: TableRef,
        doc_part_identifier: String,
        field: MetaField,
    },
    ScalarAdded {
        table_ref: TableRef,
        doc_part_identifier: String,
        scalar: MetaScalar,
    },
}
