//! Document-to-relational translation: the shredder and its output batches.

pub mod docpart;
pub mod translator;

pub use docpart::{CatalogChange, DocPartData, DocPartRow};
pub use translator::D2RTranslator;
