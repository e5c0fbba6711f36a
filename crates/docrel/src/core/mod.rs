//! Core value and addressing types shared by every layer:
//!
//! - [`value`]: the immutable document tree and the [`value::FieldType`]
//!   column-type enum
//! - [`tableref`]: logical doc-part paths and the insert/delete orderings

pub mod tableref;
pub mod value;

pub use tableref::{TableRef, TableRefOrdering, TableRefSegment};
pub use value::{DocValue, FieldType};
