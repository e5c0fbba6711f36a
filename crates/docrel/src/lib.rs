//! # docrel
//!
//! Document-to-relational mapping engine.
//!
//! This library shreds JSON-like documents into plain relational tables and
//! keeps a queryable catalog of the mapping, with support for:
//!
//! - **Structure-driven shredding**: one table per document part, one typed
//!   column per (field, type) pair, grown on demand
//! - **Batched writes** over pooled PostgreSQL connections
//! - **A persistent meta-schema** validated or bootstrapped on startup
//! - **Keyed deletes** by document id or by attribute value
//!
//! ## Example
//!
//! ```rust,no_run
//! use docrel::{Config, DocValue, MetaSnapshot, PostgresBackend, PostgresDialect,
//!              PostgresErrorHandler, WriteTransaction};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> docrel::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let backend = PostgresBackend::new(&config.backend).await?;
//!     let executor = backend.executor().await?;
//!     let mut tx = WriteTransaction::new(
//!         executor,
//!         MetaSnapshot::new(),
//!         Arc::new(PostgresDialect::new()),
//!         PostgresErrorHandler::shared(),
//!         &config.writer,
//!     );
//!     tx.begin().await?;
//!     let doc = DocValue::object([("name", DocValue::from("ada"))]);
//!     let dids = tx.insert("db1", "col1", [doc]).await?;
//!     println!("Inserted {} documents", dids.len());
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod catalog;
pub mod config;
pub mod core;
pub mod d2r;
pub mod error;
pub mod pipeline;
pub mod transaction;

// Re-exports for convenient access
pub use backend::{
    Dialect, PostgresBackend, PostgresDialect, PostgresErrorHandler, SchemaUpdater,
    SnapshotLoader, SqlExecutor, WriteInterface,
};
pub use catalog::{IdentifierFactory, MetaSnapshot};
pub use config::{BackendConfig, Config, WriterConfig};
pub use crate::core::{DocValue, FieldType, TableRef};
pub use d2r::D2RTranslator;
pub use error::{DocrelError, Result, UserError};
pub use pipeline::InsertPipeline;
pub use transaction::{AttributeReference, WriteTransaction};
