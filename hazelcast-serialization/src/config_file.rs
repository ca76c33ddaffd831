//! Declarative configuration loading from TOML.
//!
//! Only the scalar options can be declared in a file. Factories, serializers
//! and strategies are added in code on the builder the file produces.
//!
//! # Example TOML
//!
//! ```toml
//! byte-order = "little-endian"
//! portable-version = 2
//! check-class-def-errors = true
//! buffer-initial-capacity = 8192
//! max-pooled-buffers = 4
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{parse_byte_order, ConfigError, SerializationConfigBuilder};

/// File-based mirror of the scalar options of
/// [`SerializationConfig`](crate::config::SerializationConfig).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileSerializationConfig {
    /// `big-endian`, `little-endian` or `native`.
    pub byte_order: Option<String>,
    /// Default portable version.
    pub portable_version: Option<i32>,
    /// Check configured class definitions for unregistered nested classes.
    pub check_class_def_errors: Option<bool>,
    /// Enable the legacy whole-object fallback.
    pub enable_legacy_fallback: Option<bool>,
    /// Initial capacity of pooled buffers in bytes.
    pub buffer_initial_capacity: Option<usize>,
    /// Number of idle buffers kept for reuse.
    pub max_pooled_buffers: Option<usize>,
}

impl TryFrom<FileSerializationConfig> for SerializationConfigBuilder {
    type Error = ConfigError;

    fn try_from(file: FileSerializationConfig) -> Result<Self, Self::Error> {
        let mut builder = SerializationConfigBuilder::new();

        if let Some(order) = file.byte_order {
            builder = builder.byte_order(parse_byte_order(&order)?);
        }
        if let Some(version) = file.portable_version {
            builder = builder.portable_version(version);
        }
        if let Some(check) = file.check_class_def_errors {
            builder = builder.check_class_def_errors(check);
        }
        if let Some(enabled) = file.enable_legacy_fallback {
            builder = builder.enable_legacy_fallback(enabled);
        }
        if let Some(capacity) = file.buffer_initial_capacity {
            builder = builder.buffer_initial_capacity(capacity);
        }
        if let Some(max) = file.max_pooled_buffers {
            builder = builder.max_pooled_buffers(max);
        }

        Ok(builder)
    }
}

impl SerializationConfigBuilder {
    /// Parses a builder from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file_config: FileSerializationConfig = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("failed to parse TOML config: {e}")))?;
        file_config.try_into()
    }

    /// Loads a builder from a TOML file.
    pub fn from_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("failed to read TOML config file: {e}")))?;
        Self::from_toml_str(&content)
    }
}
