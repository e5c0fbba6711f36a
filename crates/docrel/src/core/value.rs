//! Document value types for database-agnostic shredding.
//!
//! A [`DocValue`] is an immutable tagged tree: objects, arrays, and a closed
//! set of scalar types. Object key order is irrelevant; array order is
//! significant and surfaces as the `seq` internal column after shredding.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// The closed set of column types the catalog can observe.
///
/// One variant per scalar type plus [`FieldType::Child`], the marker for a
/// field whose value is an object or array stored in a child doc-part. A
/// `Child` column (and a `Child` scalar in an array slot) stores a boolean:
/// `true` when the child is an array, `false` when it is an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldType {
    Null,
    Bool,
    Int32,
    Int64,
    Double,
    String,
    Instant,
    Date,
    Time,
    Binary,
    Child,
}

impl FieldType {
    /// Single-character discriminator appended to physical column names so
    /// the same logical name observed with two types maps to two columns.
    #[must_use]
    pub fn short_code(self) -> char {
        match self {
            FieldType::Null => 'n',
            FieldType::Bool => 'b',
            FieldType::Int32 => 'i',
            FieldType::Int64 => 'l',
            FieldType::Double => 'd',
            FieldType::String => 's',
            FieldType::Instant => 't',
            FieldType::Date => 'a',
            FieldType::Time => 'm',
            FieldType::Binary => 'r',
            FieldType::Child => 'e',
        }
    }

    /// Parse the textual form persisted in the `meta_field`/`meta_scalar`
    /// tables. Inverse of [`FieldType::as_str`].
    #[must_use]
    pub fn parse(s: &str) -> Option<FieldType> {
        Some(match s {
            "null" => FieldType::Null,
            "boolean" => FieldType::Bool,
            "integer" => FieldType::Int32,
            "long" => FieldType::Int64,
            "double" => FieldType::Double,
            "string" => FieldType::String,
            "instant" => FieldType::Instant,
            "date" => FieldType::Date,
            "time" => FieldType::Time,
            "binary" => FieldType::Binary,
            "child" => FieldType::Child,
            _ => return None,
        })
    }

    /// Textual form persisted in the meta tables.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Null => "null",
            FieldType::Bool => "boolean",
            FieldType::Int32 => "integer",
            FieldType::Int64 => "long",
            FieldType::Double => "double",
            FieldType::String => "string",
            FieldType::Instant => "instant",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::Binary => "binary",
            FieldType::Child => "child",
        }
    }
}

/// An immutable JSON-like document value.
///
/// Scalar variants map one-to-one onto [`FieldType`]; `Object` and `Array`
/// are the structural variants the translator decomposes into child
/// doc-parts.
#[derive(Debug, Clone, PartialEq)]
pub enum DocValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
    Instant(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    Binary(Vec<u8>),
    Object(BTreeMap<String, DocValue>),
    Array(Vec<DocValue>),
}

impl DocValue {
    /// The catalog type this value is stored under.
    ///
    /// Objects and arrays report [`FieldType::Child`]: their presence in a
    /// parent row is recorded through a child-marker column while the
    /// contents live in a child doc-part.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            DocValue::Null => FieldType::Null,
            DocValue::Bool(_) => FieldType::Bool,
            DocValue::Int32(_) => FieldType::Int32,
            DocValue::Int64(_) => FieldType::Int64,
            DocValue::Double(_) => FieldType::Double,
            DocValue::String(_) => FieldType::String,
            DocValue::Instant(_) => FieldType::Instant,
            DocValue::Date(_) => FieldType::Date,
            DocValue::Time(_) => FieldType::Time,
            DocValue::Binary(_) => FieldType::Binary,
            DocValue::Object(_) | DocValue::Array(_) => FieldType::Child,
        }
    }

    /// Whether this value is a scalar (neither object nor array).
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        !matches!(self, DocValue::Object(_) | DocValue::Array(_))
    }

    /// Build an object value from an iterator of key/value pairs.
    pub fn object<I, K>(entries: I) -> DocValue
    where
        I: IntoIterator<Item = (K, DocValue)>,
        K: Into<String>,
    {
        DocValue::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Borrow the object map, if this value is an object.
    #[must_use]
    pub fn as_object(&self) -> Option<&BTreeMap<String, DocValue>> {
        match self {
            DocValue::Object(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow the array elements, if this value is an array.
    #[must_use]
    pub fn as_array(&self) -> Option<&[DocValue]> {
        match self {
            DocValue::Array(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for DocValue {
    fn from(v: bool) -> Self {
        DocValue::Bool(v)
    }
}

impl From<i32> for DocValue {
    fn from(v: i32) -> Self {
        DocValue::Int32(v)
    }
}

impl From<i64> for DocValue {
    fn from(v: i64) -> Self {
        DocValue::Int64(v)
    }
}

impl From<f64> for DocValue {
    fn from(v: f64) -> Self {
        DocValue::Double(v)
    }
}

impl From<String> for DocValue {
    fn from(v: String) -> Self {
        DocValue::String(v)
    }
}

impl From<&str> for DocValue {
    fn from(v: &str) -> Self {
        DocValue::String(v.to_string())
    }
}

impl From<Vec<u8>> for DocValue {
    fn from(v: Vec<u8>) -> Self {
        DocValue::Binary(v)
    }
}

impl From<DateTime<Utc>> for DocValue {
    fn from(v: DateTime<Utc>) -> Self {
        DocValue::Instant(v)
    }
}

impl From<NaiveDate> for DocValue {
    fn from(v: NaiveDate) -> Self {
        DocValue::Date(v)
    }
}

impl From<NaiveTime> for DocValue {
    fn from(v: NaiveTime) -> Self {
        DocValue::Time(v)
    }
}

impl<V: Into<DocValue>> From<Vec<V>> for DocValue {
    fn from(v: Vec<V>) -> Self {
        DocValue::Array(v.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_of_scalars() {
        assert_eq!(DocValue::Null.field_type(), FieldType::Null);
        assert_eq!(DocValue::Int32(1).field_type(), FieldType::Int32);
        assert_eq!(DocValue::from("x").field_type(), FieldType::String);
        assert_eq!(DocValue::Binary(vec![1]).field_type(), FieldType::Binary);
    }

    #[test]
    fn test_field_type_of_containers_is_child() {
        assert_eq!(DocValue::object([("a", 1i32.into())]).field_type(), FieldType::Child);
        let arr = DocValue::Array(vec![DocValue::Int32(1), DocValue::Int32(2)]);
        assert_eq!(arr.field_type(), FieldType::Child);
    }

    #[test]
    fn test_short_codes_are_unique() {
        let all = [
            FieldType::Null,
            FieldType::Bool,
            FieldType::Int32,
            FieldType::Int64,
            FieldType::Double,
            FieldType::String,
            FieldType::Instant,
            FieldType::Date,
            FieldType::Time,
            FieldType::Binary,
            FieldType::Child,
        ];
        let mut codes: Vec<char> = all.iter().map(|t| t.short_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn test_field_type_round_trips_through_text() {
        for t in [
            FieldType::Null,
            FieldType::Bool,
            FieldType::Int32,
            FieldType::Int64,
            FieldType::Double,
            FieldType::String,
            FieldType::Instant,
            FieldType::Date,
            FieldType::Time,
            FieldType::Binary,
            FieldType::Child,
        ] {
            assert_eq!(FieldType::parse(t.as_str()), Some(t));
        }
        assert_eq!(FieldType::parse("varchar"), None);
    }

    #[test]
    fn test_object_builder_ignores_key_order() {
        let a = DocValue::object([("b", 2i32.into()), ("a", 1i32.into())]);
        let b = DocValue::object([("a", 1i32.into()), ("b", 2i32.into())]);
        assert_eq!(a, b);
    }
}
