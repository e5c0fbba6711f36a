//! The metadata catalog: the mutable meta-snapshot a write transaction owns
//! and the identifier factory that keeps its physical names collision-free.

pub mod identifier;
pub mod snapshot;

pub use identifier::IdentifierFactory;
pub use snapshot::{
    MetaCollection, MetaDatabase, MetaDocPart, MetaField, MetaScalar, MetaSnapshot,
    INTERNAL_COLUMNS,
};
