//! Error types for serialization operations.

use std::io;
use thiserror::Error;

/// The main error type for the serialization engine.
#[derive(Debug, Error)]
pub enum HazelcastError {
    /// Generic serialization/deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A Portable field was read or written with an incompatible type, or a
    /// morphing conversion between versions is not allowed.
    #[error("invalid portable field: {0}")]
    InvalidPortableField(String),

    /// A structural schema referenced by a payload is not known locally.
    ///
    /// This is retryable: fetch the schema and decode again.
    #[error("missing schema: schema id {schema_id} is not registered locally")]
    MissingSchema {
        /// Identifier of the schema that could not be resolved.
        schema_id: i64,
    },

    /// A schema could not be resolved even after fetching it from the cluster.
    #[error("unknown schema: schema id {schema_id} could not be resolved")]
    UnknownSchema {
        /// Identifier of the schema that could not be resolved.
        schema_id: i64,
    },

    /// Reading or writing outside the valid region of a buffer.
    #[error("buffer bounds error: {0}")]
    Bounds(String),

    /// Conflicting registration of a factory, serializer or class definition.
    #[error("registration error: {0}")]
    Registration(String),

    /// Configuration errors (invalid settings).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// I/O errors from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl HazelcastError {
    /// Returns true if the operation can succeed after the caller resolves
    /// the missing state (currently only a missing schema).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::MissingSchema { .. })
    }

    /// Returns true for the engine's own typed failures, which propagate
    /// through the service boundary without being rewrapped.
    pub(crate) fn is_typed(&self) -> bool {
        !matches!(self, Self::Bounds(_) | Self::Io(_))
    }

    /// Rewraps low-level buffer failures into a serialization error that
    /// carries `context`. Typed errors are returned unchanged.
    pub(crate) fn with_context(self, context: impl FnOnce() -> String) -> Self {
        if self.is_typed() {
            self
        } else {
            Self::Serialization(format!("{}: {}", context(), self))
        }
    }
}

/// A specialized `Result` type for serialization operations.
pub type Result<T> = std::result::Result<T, HazelcastError>;
