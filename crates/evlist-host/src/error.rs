//! Error types for the host layer.

use evlist_core::ListError;

use crate::config::ConfigError;

/// Errors surfaced by host-layer operations and the `evlist` binary.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// A list operation failed.
    #[error("list error: {0}")]
    List(#[from] ListError),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Reading input failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Input or output JSON was malformed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
