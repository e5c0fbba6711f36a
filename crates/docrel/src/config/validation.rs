//! Configuration validation.

use super::Config;
use crate::backend::META_SCHEMA_NAME;
use crate::error::{DocrelError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.backend.host.is_empty() {
        return Err(DocrelError::Config("backend.host is required".into()));
    }
    if config.backend.database.is_empty() {
        return Err(DocrelError::Config("backend.database is required".into()));
    }
    if config.backend.user.is_empty() {
        return Err(DocrelError::Config("backend.user is required".into()));
    }
    if config.backend.r#type != "postgres" {
        return Err(DocrelError::Config(format!(
            "backend.type must be 'postgres', got '{}'",
            config.backend.r#type
        )));
    }
    if config.backend.database == META_SCHEMA_NAME {
        return Err(DocrelError::Config(format!(
            "backend.database must not be the reserved name '{META_SCHEMA_NAME}'"
        )));
    }
    if config.backend.pool_size == 0 {
        return Err(DocrelError::Config(
            "backend.pool_size must be at least 1".into(),
        ));
    }

    if config.writer.max_insert_batch_size == 0 {
        return Err(DocrelError::Config(
            "writer.max_insert_batch_size must be at least 1".into(),
        ));
    }
    if config.writer.max_delete_batch_size == 0 {
        return Err(DocrelError::Config(
            "writer.max_delete_batch_size must be at least 1".into(),
        ));
    }
    if config.writer.docs_per_flush == 0 {
        return Err(DocrelError::Config(
            "writer.docs_per_flush must be at least 1".into(),
        ));
    }

    Ok(())
}
