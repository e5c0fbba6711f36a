//! Deterministic logical-name to physical-identifier mapping.
//!
//! SQL identifiers cannot be bound as statement parameters, so every physical
//! name the engine emits must be validated and generated here. The factory is
//! a pure function of the logical name plus the set of identifiers already
//! allocated in the same scope: given the same inputs against the same prior
//! snapshot it always produces the same output. Reversibility is not
//! required; the logical name is persisted alongside the physical one in the
//! meta tables.

use std::collections::HashSet;

use crate::core::{FieldType, TableRef};
use crate::error::{DocrelError, Result};

/// PostgreSQL truncates identifiers at 63 bytes; staying inside that bound
/// keeps physical names unambiguous without quoting tricks.
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Collision suffixes tried before giving up with `CatalogConflict`.
const RETRY_BUDGET: u32 = 1_000;

/// Allocates unique, dialect-safe physical identifiers.
#[derive(Debug, Clone)]
pub struct IdentifierFactory {
    max_len: usize,
    reserved: HashSet<String>,
}

impl Default for IdentifierFactory {
    fn default() -> Self {
        let mut reserved = HashSet::new();
        // The meta-schema name can never back a user database.
        reserved.insert(crate::backend::meta::META_SCHEMA_NAME.to_string());
        Self {
            max_len: MAX_IDENTIFIER_LENGTH,
            reserved,
        }
    }
}

impl IdentifierFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Physical schema identifier for a logical database name.
    pub fn to_database_identifier(
        &self,
        taken: &HashSet<String>,
        name: &str,
    ) -> Result<String> {
        self.allocate("database", &sanitize(name), taken)
    }

    /// Physical collection tag (root table name) for a logical collection.
    pub fn to_collection_identifier(
        &self,
        taken: &HashSet<String>,
        name: &str,
    ) -> Result<String> {
        self.allocate("collection", &sanitize(name), taken)
    }

    /// Physical table identifier for a doc-part.
    ///
    /// The root doc-part reuses the collection identifier, which the
    /// collection already holds in the table namespace; a child appends the
    /// sanitized last path segment to its parent's identifier, so table
    /// names read as the path they back (`col_tags`, `col_tags_inner`).
    pub fn to_doc_part_identifier(
        &self,
        taken: &HashSet<String>,
        collection_identifier: &str,
        parent_identifier: Option<&str>,
        table_ref: &TableRef,
    ) -> Result<String> {
        let base = match (parent_identifier, table_ref.last_name()) {
            (Some(parent), Some(last)) => format!("{parent}_{}", sanitize(&last)),
            _ => return Ok(collection_identifier.to_string()),
        };
        self.allocate("doc_part", &base, taken)
    }

    /// Physical column identifier for a named field.
    ///
    /// The type discriminator suffix keeps the two columns apart when the
    /// same logical name is observed with two types.
    pub fn to_field_identifier(
        &self,
        taken: &HashSet<String>,
        name: &str,
        field_type: FieldType,
    ) -> Result<String> {
        let base = format!("{}_{}", sanitize(name), field_type.short_code());
        self.allocate("field", &base, taken)
    }

    /// Physical column identifier for an array-anonymous scalar.
    pub fn to_scalar_identifier(
        &self,
        taken: &HashSet<String>,
        field_type: FieldType,
    ) -> Result<String> {
        let base = format!("v_{}", field_type.short_code());
        self.allocate("scalar", &base, taken)
    }

    /// Deterministic allocation: the sanitized base, then `base_1`, `base_2`,
    /// … until a free identifier is found or the budget runs out.
    fn allocate(&self, scope: &str, base: &str, taken: &HashSet<String>) -> Result<String> {
        let candidate = truncate_to(base, self.max_len);
        if self.is_free(&candidate, taken) {
            return Ok(candidate);
        }
        for attempt in 1..=RETRY_BUDGET {
            let suffix = format!("_{attempt}");
            let head = truncate_to(base, self.max_len.saturating_sub(suffix.len()));
            let candidate = format!("{head}{suffix}");
            if self.is_free(&candidate, taken) {
                return Ok(candidate);
            }
        }
        Err(DocrelError::CatalogConflict {
            scope: scope.to_string(),
            logical: base.to_string(),
        })
    }

    fn is_free(&self, candidate: &str, taken: &HashSet<String>) -> bool {
        !taken.contains(candidate) && !self.reserved.contains(candidate)
    }
}

/// Map a logical name onto the conservative identifier charset
/// `[a-z0-9_]`, never starting with a digit and never empty.
fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            'a'..='z' | '0'..='9' | '_' => out.push(c),
            'A'..='Z' => out.push(c.to_ascii_lowercase()),
            _ => out.push('_'),
        }
    }
    if out.is_empty() {
        out.push('_');
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Truncate on a UTF-8 boundary; sanitized names are ASCII so this is a
/// plain byte cut in practice.
fn truncate_to(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
