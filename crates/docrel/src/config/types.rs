//! Configuration type definitions.

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend database configuration (PostgreSQL).
    pub backend: BackendConfig,

    /// Write-path behavior configuration.
    #[serde(default)]
    pub writer: WriterConfig,
}

/// Backend database (PostgreSQL) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Database type (always "postgres" for now).
    #[serde(default = "default_postgres")]
    pub r#type: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_postgres_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Connection pool size (default: 4).
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

/// Write-path behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Rows bound per multi-row INSERT batch (default: 30).
    #[serde(default = "default_insert_batch_size")]
    pub max_insert_batch_size: usize,

    /// Document ids per DELETE batch (default: 100).
    #[serde(default = "default_delete_batch_size")]
    pub max_delete_batch_size: usize,

    /// Documents translated before accumulated rows are flushed
    /// (default: 100).
    #[serde(default = "default_docs_per_flush")]
    pub docs_per_flush: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_insert_batch_size: default_insert_batch_size(),
            max_delete_batch_size: default_delete_batch_size(),
            docs_per_flush: default_docs_per_flush(),
        }
    }
}

fn default_postgres() -> String {
    "postgres".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_pool_size() -> usize {
    4
}

fn default_insert_batch_size() -> usize {
    30
}

fn default_delete_batch_size() -> usize {
    100
}

fn default_docs_per_flush() -> usize {
    100
}
