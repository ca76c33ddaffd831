//! Serialization framework for Hazelcast's binary format.
//!
//! [`SerializationService`] turns values into [`Data`] blobs and back. It
//! dispatches to the identified data, portable, built-in and custom codecs,
//! falling back to the compact format for values that declare it.

mod builtin;
mod byte_order;
mod data;
mod data_input;
mod data_output;
mod identified;
mod json;
mod object;
mod pool;
mod service;
mod traits;

pub mod compact;
pub mod portable;

pub use builtin::{
    ConstantSerializer, Serializer, BOOL_ARRAY_TYPE_ID, BOOL_TYPE_ID, BYTE_ARRAY_TYPE_ID,
    BYTE_TYPE_ID, CHAR_ARRAY_TYPE_ID, CHAR_TYPE_ID, DECIMAL_TYPE_ID, DOUBLE_ARRAY_TYPE_ID,
    DOUBLE_TYPE_ID, FLOAT_ARRAY_TYPE_ID, FLOAT_TYPE_ID, INT_ARRAY_TYPE_ID, INT_TYPE_ID,
    LEGACY_TYPE_ID, LONG_ARRAY_TYPE_ID, LONG_TYPE_ID, NULL_TYPE_ID, SHORT_ARRAY_TYPE_ID,
    SHORT_TYPE_ID, STRING_ARRAY_TYPE_ID, STRING_TYPE_ID, UUID_TYPE_ID,
};
pub use byte_order::ByteOrder;
pub use compact::{
    Compact, CompactFactory, CompactReader, CompactSerializer, CompactWriter, FieldKind, Schema,
    SchemaFetch, SchemaFetcher, SchemaField, SchemaRegistry, COMPACT_TYPE_ID,
};
pub use data::{Data, DATA_OFFSET, TYPE_OFFSET};
pub use data_input::{DataInput, ObjectDataInput};
pub use data_output::{DataOutput, NullDataOutput, ObjectDataOutput, Reserved, NULL_ARRAY_LENGTH};
pub use identified::{
    DataSerializableFactory, FactoryRegistry, IdentifiedDataSerializable,
    IdentifiedDataSerializer, IDENTIFIED_DATA_SERIALIZABLE_TYPE_ID,
};
pub use json::{HazelcastJsonValue, JSON_TYPE_ID};
pub use object::{AsAny, HazelcastObject};
pub use pool::BufferPool;
pub use portable::{
    ClassDefinition, ClassDefinitionBuilder, FieldDefinition, FieldType, Portable,
    PortableFactory, PortableReader, PortableSerializer, PortableWriter, PORTABLE_TYPE_ID,
};
pub use service::{DeserializeOutcome, SerializationService};
pub use traits::{Deserializable, Serializable};
