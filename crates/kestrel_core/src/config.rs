//! # Registry Configuration
//!
//! Tunables loaded once at startup, usually from a TOML file:
//!
//! ```toml
//! sparse_page_size = 4096
//! entity_capacity = 100000
//! pool_capacity = 1024
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ecs::Entity;
use crate::error::{EcsError, EcsResult};

/// Default number of entries per sparse page.
pub const DEFAULT_SPARSE_PAGE_SIZE: usize = 4096;

/// Memory layout settings for a [`Registry`](crate::Registry).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Entries per sparse page. Must be a power of two.
    pub sparse_page_size: usize,
    /// Entity slots reserved when the registry is created.
    pub entity_capacity: usize,
    /// Packed capacity reserved for every new component pool.
    pub pool_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            sparse_page_size: DEFAULT_SPARSE_PAGE_SIZE,
            entity_capacity: 0,
            pool_capacity: 0,
        }
    }
}

impl RegistryConfig {
    /// Parses and validates a configuration from TOML text.
    ///
    /// Missing keys fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ConfigParse`] for malformed TOML or unknown keys,
    /// and [`EcsError::InvalidConfig`] for out-of-range values.
    pub fn from_toml_str(text: &str) -> EcsResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| EcsError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Io`] if the file cannot be read, otherwise the
    /// same errors as [`RegistryConfig::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> EcsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| EcsError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(
            path = %path.display(),
            sparse_page_size = config.sparse_page_size,
            entity_capacity = config.entity_capacity,
            "registry configuration loaded"
        );
        Ok(config)
    }

    /// Serializes the configuration back to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ConfigSerialize`] if serialization fails.
    pub fn to_toml_string(&self) -> EcsResult<String> {
        toml::to_string(self).map_err(|e| EcsError::ConfigSerialize(e.to_string()))
    }

    /// Checks every value against the limits of the entity identifier.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] describing the first bad value.
    pub fn validate(&self) -> EcsResult<()> {
        let max_slots = Entity::INDEX_MASK as usize;

        if !self.sparse_page_size.is_power_of_two() {
            return Err(EcsError::InvalidConfig(format!(
                "sparse_page_size must be a power of two, got {}",
                self.sparse_page_size
            )));
        }
        if self.sparse_page_size > max_slots + 1 {
            return Err(EcsError::InvalidConfig(format!(
                "sparse_page_size {} exceeds the entity index range",
                self.sparse_page_size
            )));
        }
        if self.entity_capacity > max_slots {
            return Err(EcsError::InvalidConfig(format!(
                "entity_capacity {} exceeds the maximum of {max_slots}",
                self.entity_capacity
            )));
        }
        if self.pool_capacity > max_slots {
            return Err(EcsError::InvalidConfig(format!(
                "pool_capacity {} exceeds the maximum of {max_slots}",
                self.pool_capacity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RegistryConfig::default();
        assert_eq!(config.sparse_page_size, DEFAULT_SPARSE_PAGE_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_document() {
        let config = RegistryConfig::from_toml_str("sparse_page_size = 1024\n").unwrap();
        assert_eq!(config.sparse_page_size, 1024);
        assert_eq!(config.entity_capacity, 0);
    }

    #[test]
    fn test_rejects_non_power_of_two_page() {
        let err = RegistryConfig::from_toml_str("sparse_page_size = 1000\n").unwrap_err();
        assert!(matches!(err, EcsError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        let err = RegistryConfig::from_toml_str("page_size = 1024\n").unwrap_err();
        assert!(matches!(err, EcsError::ConfigParse(_)));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = RegistryConfig {
            sparse_page_size: 256,
            entity_capacity: 10_000,
            pool_capacity: 64,
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(RegistryConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = RegistryConfig::from_toml_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, EcsError::Io { .. }));
    }
}
