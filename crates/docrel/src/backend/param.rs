//! SQL parameter values for the execution surface.
//!
//! [`SqlParam`] is the owned, type-safe form a [`DocValue`] takes when it is
//! bound to a prepared statement. NULLs carry the column's [`FieldType`] so
//! binary protocols can pick the right wire encoding.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};

use crate::core::{DocValue, FieldType};
use crate::error::{DocrelError, Result};

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// NULL with the declared column type.
    Null(FieldType),
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Text(String),
    Bytes(Vec<u8>),
    Instant(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl SqlParam {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlParam::Null(_))
    }
}

impl ToSql for SqlParam {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            SqlParam::Null(_) => Ok(IsNull::Yes),
            SqlParam::Bool(v) => v.to_sql(ty, out),
            SqlParam::I32(v) => v.to_sql(ty, out),
            SqlParam::I64(v) => v.to_sql(ty, out),
            SqlParam::F64(v) => v.to_sql(ty, out),
            SqlParam::Text(v) => v.to_sql(ty, out),
            SqlParam::Bytes(v) => v.to_sql(ty, out),
            SqlParam::Instant(v) => v.to_sql(ty, out),
            SqlParam::Date(v) => v.to_sql(ty, out),
            SqlParam::Time(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Dispatch happens per variant at bind time.
        true
    }

    to_sql_checked!();
}

/// Convert a shredded column value into a bound parameter.
///
/// `None` means the row never observed the column and binds NULL. A
/// `Null`-typed column stores presence as boolean `true`; a `Child` column
/// stores the array-vs-object marker. A value whose type does not match the
/// declared column type is an internal invariant violation: the translator
/// aligned values to declared positions, so a mismatch here is a bug, never
/// a coercion point.
pub fn bind_column_value(declared: FieldType, value: Option<&DocValue>) -> Result<SqlParam> {
    let Some(value) = value else {
        return Ok(SqlParam::Null(declared));
    };
    let param = match (declared, value) {
        (FieldType::Null, DocValue::Null) => SqlParam::Bool(true),
        (FieldType::Child, DocValue::Bool(v)) => SqlParam::Bool(*v),
        (FieldType::Bool, DocValue::Bool(v)) => SqlParam::Bool(*v),
        (FieldType::Int32, DocValue::Int32(v)) => SqlParam::I32(*v),
        (FieldType::Int64, DocValue::Int64(v)) => SqlParam::I64(*v),
        (FieldType::Double, DocValue::Double(v)) => SqlParam::F64(*v),
        (FieldType::String, DocValue::String(v)) => SqlParam::Text(v.clone()),
        (FieldType::Binary, DocValue::Binary(v)) => SqlParam::Bytes(v.clone()),
        (FieldType::Instant, DocValue::Instant(v)) => SqlParam::Instant(*v),
        (FieldType::Date, DocValue::Date(v)) => SqlParam::Date(*v),
        (FieldType::Time, DocValue::Time(v)) => SqlParam::Time(*v),
        (declared, value) => {
            return Err(DocrelError::System(format!(
                "value of type {:?} bound to column of type {declared:?}",
                value.field_type()
            )))
        }
    };
    Ok(param)
}
