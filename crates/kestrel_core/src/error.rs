//! # Registry Error Types
//!
//! Recoverable failures only. Misuse of the registry (invalid entities,
//! double attachment, conflicting groups) is a programmer error and is
//! reported through assertions instead.

use thiserror::Error;

/// Errors that can occur while configuring or restoring a registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(String),

    /// A configuration document could not be serialized.
    #[error("failed to serialize configuration: {0}")]
    ConfigSerialize(String),

    /// A file could not be read.
    #[error("failed to read {path}: {message}")]
    Io {
        /// The path that was being read.
        path: String,
        /// The underlying I/O error message.
        message: String,
    },

    /// An entity snapshot is inconsistent or truncated.
    #[error("malformed entity snapshot: {0}")]
    MalformedSnapshot(String),

    /// A snapshot was restored into a registry that still has live entities.
    #[error("registry still has {alive} alive entities")]
    RegistryNotEmpty {
        /// Number of alive entities found.
        alive: usize,
    },
}

/// Result type for registry operations.
pub type EcsResult<T> = Result<T, EcsError>;
