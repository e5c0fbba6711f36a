//! Logical subpath addressing for doc-parts.
//!
//! A [`TableRef`] is the path of object keys from the document root to a
//! doc-part. Array positions are never path segments (they become the `seq`
//! row attribute), so two subpaths that differ only by array indices collapse
//! to the same ref. The one exception is an array nested directly inside
//! another array: it has no key of its own, so the inner level is addressed
//! by a dimension segment.

use std::fmt;

/// One step of a [`TableRef`] path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TableRefSegment {
    /// An object key.
    Key(String),
    /// Nesting depth of an array stored directly inside another array.
    /// The outermost array of a field is dimension 1 and carries no segment;
    /// an array element that is itself an array gets dimension 2, and so on.
    Dimension(u32),
}

/// Path identifying a doc-part within a collection. The root has an empty
/// path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TableRef {
    segments: Vec<TableRefSegment>,
}

impl TableRef {
    /// The root ref (empty path).
    #[must_use]
    pub fn root() -> TableRef {
        TableRef::default()
    }

    /// Child ref for an object key.
    #[must_use]
    pub fn child(&self, key: impl Into<String>) -> TableRef {
        let mut segments = self.segments.clone();
        segments.push(TableRefSegment::Key(key.into()));
        TableRef { segments }
    }

    /// Child ref for an array nested inside this (array) doc-part.
    #[must_use]
    pub fn child_dimension(&self, dimension: u32) -> TableRef {
        let mut segments = self.segments.clone();
        segments.push(TableRefSegment::Dimension(dimension));
        TableRef { segments }
    }

    /// Parent ref, or `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<TableRef> {
        if self.segments.is_empty() {
            return None;
        }
        Some(TableRef {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Path length; the root has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn segments(&self) -> &[TableRefSegment] {
        &self.segments
    }

    /// Last segment rendered as a name, used to derive table identifiers.
    #[must_use]
    pub fn last_name(&self) -> Option<String> {
        self.segments.last().map(|s| match s {
            TableRefSegment::Key(k) => k.clone(),
            TableRefSegment::Dimension(d) => format!("${d}"),
        })
    }

    /// Textual form persisted in the `meta_doc_part.tableref` column.
    ///
    /// Segments are joined with `.`; literal dots and backslashes inside keys
    /// are backslash-escaped, dimension segments render as `$<n>`. The root
    /// renders as the empty string.
    #[must_use]
    pub fn to_path_string(&self) -> String {
        let parts: Vec<String> = self
            .segments
            .iter()
            .map(|s| match s {
                TableRefSegment::Key(k) => k.replace('\\', "\\\\").replace('.', "\\."),
                TableRefSegment::Dimension(d) => format!("${d}"),
            })
            .collect();
        parts.join(".")
    }

    /// Parse the persisted textual form. Inverse of [`to_path_string`].
    ///
    /// [`to_path_string`]: TableRef::to_path_string
    #[must_use]
    pub fn parse_path(path: &str) -> TableRef {
        if path.is_empty() {
            return TableRef::root();
        }
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = path.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                }
                '.' => {
                    segments.push(Self::parse_segment(&current));
                    current.clear();
                }
                _ => current.push(c),
            }
        }
        segments.push(Self::parse_segment(&current));
        TableRef { segments }
    }

    fn parse_segment(raw: &str) -> TableRefSegment {
        if let Some(rest) = raw.strip_prefix('$') {
            if let Ok(d) = rest.parse::<u32>() {
                return TableRefSegment::Dimension(d);
            }
        }
        TableRefSegment::Key(raw.to_string())
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.to_path_string())
        }
    }
}

/// Total orders over the doc-parts of a collection.
///
/// `Asc` yields parents before children (insert order); `Desc` yields
/// children before parents (delete order). Siblings tie-break by physical
/// table identifier so the orders are stable and deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRefOrdering {
    Asc,
    Desc,
}

impl TableRefOrdering {
    /// Compare two doc-parts given their refs and physical identifiers.
    #[must_use]
    pub fn compare(
        self,
        a: (&TableRef, &str),
        b: (&TableRef, &str),
    ) -> std::cmp::Ordering {
        let asc = a.0.depth().cmp(&b.0.depth()).then_with(|| a.1.cmp(b.1));
        match self {
            TableRefOrdering::Asc => asc,
            TableRefOrdering::Desc => asc.reverse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_has_empty_path() {
        let root = TableRef::root();
        assert!(root.is_root());
        assert_eq!(root.depth(), 0);
        assert_eq!(root.to_path_string(), "");
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_child_and_parent() {
        let tags = TableRef::root().child("tags");
        assert_eq!(tags.depth(), 1);
        assert_eq!(tags.parent(), Some(TableRef::root()));
        assert_eq!(tags.last_name().as_deref(), Some("tags"));

        let inner = tags.child_dimension(2);
        assert_eq!(inner.parent(), Some(tags.clone()));
        assert_eq!(inner.last_name().as_deref(), Some("$2"));
    }

    #[test]
    fn test_path_string_escapes_dots() {
        let r = TableRef::root().child("a.b").child("c\\d");
        let path = r.to_path_string();
        assert_eq!(path, "a\\.b.c\\\\d");
        assert_eq!(TableRef::parse_path(&path), r);
    }

    #[test]
    fn test_path_round_trip_with_dimension() {
        let r = TableRef::root().child("tags").child_dimension(2);
        assert_eq!(TableRef::parse_path(&r.to_path_string()), r);
    }

    #[test]
    fn test_asc_puts_parents_first() {
        let root = TableRef::root();
        let tags = root.child("tags");
        let deep = tags.child("inner");

        let mut parts = vec![
            (deep.clone(), "col_tags_inner"),
            (root.clone(), "col"),
            (tags.clone(), "col_tags"),
        ];
        parts.sort_by(|a, b| TableRefOrdering::Asc.compare((&a.0, a.1), (&b.0, b.1)));
        assert_eq!(parts[0].0, root);
        assert_eq!(parts[1].0, tags);
        assert_eq!(parts[2].0, deep);

        parts.sort_by(|a, b| TableRefOrdering::Desc.compare((&a.0, a.1), (&b.0, b.1)));
        assert_eq!(parts[0].0, deep);
        assert_eq!(parts[2].0, root);
    }

    #[test]
    fn test_sibling_tie_break_is_by_identifier() {
        let a = TableRef::root().child("b_field");
        let b = TableRef::root().child("a_field");
        let mut parts = vec![(a.clone(), "col_b_field"), (b.clone(), "col_a_field")];
        parts.sort_by(|x, y| TableRefOrdering::Asc.compare((&x.0, x.1), (&y.0, y.1)));
        assert_eq!(parts[0].1, "col_a_field");
    }
}
