//! Binary serialization engine for the Hazelcast wire format.
//!
//! Values are encoded into [`Data`] blobs by a [`SerializationService`]
//! built from a [`SerializationConfig`]. Supported object formats are
//! portable (versioned, self-describing), identified data (positional),
//! compact (schema fingerprinted), built-in value types and user
//! serializers.

#![warn(missing_docs)]

pub mod config;
#[cfg(feature = "config-file")]
pub mod config_file;
pub mod error;
pub mod partition;
pub mod serialization;

pub use config::{ConfigError, SerializationConfig, SerializationConfigBuilder};
pub use error::{HazelcastError, Result};
pub use partition::{
    compute_partition_hash, DefaultPartitioningStrategy, NoPartitioningStrategy, PartitionAware,
    PartitioningStrategy,
};
pub use serialization::{
    ByteOrder, Data, DataInput, DataOutput, DeserializeOutcome, Deserializable, HazelcastObject,
    ObjectDataInput, ObjectDataOutput, Serializable, SerializationService,
};
