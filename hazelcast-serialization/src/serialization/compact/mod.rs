//! Compact serialization: the schema-based structural fallback.
//!
//! A compact payload is `i64 schema_id` followed by the field values in
//! schema order. The schema itself (type name plus ordered field names and
//! kinds) is not carried in the payload; readers find it by id in the
//! [`SchemaRegistry`], and fall back to a [`SchemaFetcher`] when it is
//! unknown.

mod serializer;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::error::{HazelcastError, Result};
use crate::serialization::HazelcastObject;

pub use serializer::{CompactSerializer, DefaultCompactReader, DefaultCompactWriter};

/// Wire type id of compact values.
pub const COMPACT_TYPE_ID: i32 = -55;

/// Rabin fingerprint initial value shared with other cluster members.
const RABIN_FINGERPRINT_INIT: u64 = 0xc15d213aa4d7a795;

fn fingerprint_byte(mut fp: u64, byte: u8) -> u64 {
    for i in 0..8 {
        let bit = (byte >> i) & 1;
        if (fp ^ bit as u64) & 1 == 1 {
            fp = (fp >> 1) ^ RABIN_FINGERPRINT_INIT;
        } else {
            fp >>= 1;
        }
    }
    fp
}

// Ints are folded in little-endian byte order.
fn fingerprint_int(fp: u64, value: i32) -> u64 {
    value.to_le_bytes().iter().fold(fp, |fp, &b| fingerprint_byte(fp, b))
}

fn fingerprint_str(fp: u64, value: &str) -> u64 {
    let fp = fingerprint_int(fp, value.len() as i32);
    value.bytes().fold(fp, fingerprint_byte)
}

/// Computes a 64-bit Rabin fingerprint of `data`.
pub fn rabin_fingerprint_64(data: &[u8]) -> i64 {
    data.iter().fold(RABIN_FINGERPRINT_INIT, |fp, &b| fingerprint_byte(fp, b)) as i64
}

/// Kind of a compact field, as numbered on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum FieldKind {
    Boolean = 1,
    ArrayOfBoolean = 2,
    Int8 = 3,
    Int16 = 7,
    ArrayOfInt16 = 8,
    Int32 = 9,
    ArrayOfInt32 = 10,
    Int64 = 11,
    ArrayOfInt64 = 12,
    Float32 = 13,
    ArrayOfFloat32 = 14,
    Float64 = 15,
    ArrayOfFloat64 = 16,
    String = 17,
    ArrayOfString = 18,
    Compact = 29,
    NullableBoolean = 33,
    NullableInt8 = 35,
    NullableInt16 = 37,
    NullableInt32 = 39,
    NullableInt64 = 41,
    NullableFloat32 = 43,
    NullableFloat64 = 45,
}

impl FieldKind {
    const ALL: [FieldKind; 23] = [
        Self::Boolean,
        Self::ArrayOfBoolean,
        Self::Int8,
        Self::Int16,
        Self::ArrayOfInt16,
        Self::Int32,
        Self::ArrayOfInt32,
        Self::Int64,
        Self::ArrayOfInt64,
        Self::Float32,
        Self::ArrayOfFloat32,
        Self::Float64,
        Self::ArrayOfFloat64,
        Self::String,
        Self::ArrayOfString,
        Self::Compact,
        Self::NullableBoolean,
        Self::NullableInt8,
        Self::NullableInt16,
        Self::NullableInt32,
        Self::NullableInt64,
        Self::NullableFloat32,
        Self::NullableFloat64,
    ];

    /// Creates a FieldKind from its wire representation.
    pub fn from_id(id: i32) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.id() == id)
            .ok_or_else(|| {
                HazelcastError::Serialization(format!("unknown compact field kind id: {}", id))
            })
    }

    /// Returns the wire representation of this field kind.
    pub fn id(self) -> i32 {
        self as i32
    }

    /// Returns true if a value of this kind may be absent.
    pub fn is_nullable(self) -> bool {
        !matches!(
            self,
            Self::Boolean
                | Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Float32
                | Self::Float64
        )
    }
}

/// A named, typed field of a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaField {
    name: String,
    kind: FieldKind,
}

impl SchemaField {
    /// Creates a new field descriptor.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Returns the field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field kind.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }
}

/// The shape of a compact type: its name and its fields in write order.
///
/// The schema id is a fingerprint over the type name and the ordered
/// fields, so the same fields written in another order form another schema.
#[derive(Clone)]
pub struct Schema {
    type_name: String,
    fields: Vec<SchemaField>,
    field_indices: HashMap<String, usize>,
    schema_id: i64,
}

impl Schema {
    /// Creates a schema, rejecting duplicate field names.
    pub fn new(type_name: impl Into<String>, fields: Vec<SchemaField>) -> Result<Self> {
        let type_name = type_name.into();
        let mut field_indices = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            if field_indices.insert(field.name.clone(), i).is_some() {
                return Err(HazelcastError::Registration(format!(
                    "field '{}' appears twice in compact schema of '{}'",
                    field.name, type_name
                )));
            }
        }
        let schema_id = Self::compute_schema_id(&type_name, &fields);
        Ok(Self {
            type_name,
            fields,
            field_indices,
            schema_id,
        })
    }

    fn compute_schema_id(type_name: &str, fields: &[SchemaField]) -> i64 {
        let fp = fingerprint_str(RABIN_FINGERPRINT_INIT, type_name);
        let fp = fingerprint_int(fp, fields.len() as i32);
        fields.iter().fold(fp, |fp, field| {
            let fp = fingerprint_str(fp, &field.name);
            fingerprint_int(fp, field.kind.id())
        }) as i64
    }

    /// Returns the type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the schema ID (fingerprint).
    pub fn schema_id(&self) -> i64 {
        self.schema_id
    }

    /// Returns the fields in write order.
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    /// Returns the number of fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Returns a field by name.
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.field_indices.get(name).map(|&i| &self.fields[i])
    }

    /// Returns true if the schema has a field with this name.
    pub fn has_field(&self, name: &str) -> bool {
        self.field_indices.contains_key(name)
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.schema_id == other.schema_id
            && self.type_name == other.type_name
            && self.fields == other.fields
    }
}

impl Eq for Schema {}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("type_name", &self.type_name)
            .field("schema_id", &self.schema_id)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Trait for types serialized with the structural compact format.
///
/// Used when no other codec matches a value. The value must also return
/// itself from [`HazelcastObject::as_compact`].
pub trait Compact: HazelcastObject {
    /// Returns the type name the schema is registered under.
    fn type_name(&self) -> &str;

    /// Writes this object's fields to the given writer.
    fn write_compact(&self, writer: &mut dyn CompactWriter) -> Result<()>;

    /// Reads this object's fields from the given reader.
    fn read_compact(&mut self, reader: &mut dyn CompactReader) -> Result<()>;
}

/// Creates blank instances of one compact type for decoding.
pub trait CompactFactory: Send + Sync {
    /// Returns the type name of the values this factory creates.
    fn type_name(&self) -> &str;

    /// Creates a blank instance.
    fn create(&self) -> Box<dyn Compact>;
}

/// Receives the fields of a compact value in write order.
///
/// Every field name may be written once.
pub trait CompactWriter {
    /// Writes a boolean field.
    fn write_boolean(&mut self, name: &str, value: bool) -> Result<()>;

    /// Writes an 8-bit integer field.
    fn write_int8(&mut self, name: &str, value: i8) -> Result<()>;

    /// Writes a 16-bit integer field.
    fn write_int16(&mut self, name: &str, value: i16) -> Result<()>;

    /// Writes a 32-bit integer field.
    fn write_int32(&mut self, name: &str, value: i32) -> Result<()>;

    /// Writes a 64-bit integer field.
    fn write_int64(&mut self, name: &str, value: i64) -> Result<()>;

    /// Writes a 32-bit float field.
    fn write_float32(&mut self, name: &str, value: f32) -> Result<()>;

    /// Writes a 64-bit float field.
    fn write_float64(&mut self, name: &str, value: f64) -> Result<()>;

    /// Writes a nullable string field.
    fn write_string(&mut self, name: &str, value: Option<&str>) -> Result<()>;

    /// Writes a nullable boolean field.
    fn write_nullable_boolean(&mut self, name: &str, value: Option<bool>) -> Result<()>;

    /// Writes a nullable 8-bit integer field.
    fn write_nullable_int8(&mut self, name: &str, value: Option<i8>) -> Result<()>;

    /// Writes a nullable 16-bit integer field.
    fn write_nullable_int16(&mut self, name: &str, value: Option<i16>) -> Result<()>;

    /// Writes a nullable 32-bit integer field.
    fn write_nullable_int32(&mut self, name: &str, value: Option<i32>) -> Result<()>;

    /// Writes a nullable 64-bit integer field.
    fn write_nullable_int64(&mut self, name: &str, value: Option<i64>) -> Result<()>;

    /// Writes a nullable 32-bit float field.
    fn write_nullable_float32(&mut self, name: &str, value: Option<f32>) -> Result<()>;

    /// Writes a nullable 64-bit float field.
    fn write_nullable_float64(&mut self, name: &str, value: Option<f64>) -> Result<()>;

    /// Writes a boolean array field.
    fn write_array_of_boolean(&mut self, name: &str, value: Option<&[bool]>) -> Result<()>;

    /// Writes a 16-bit integer array field.
    fn write_array_of_int16(&mut self, name: &str, value: Option<&[i16]>) -> Result<()>;

    /// Writes a 32-bit integer array field.
    fn write_array_of_int32(&mut self, name: &str, value: Option<&[i32]>) -> Result<()>;

    /// Writes a 64-bit integer array field.
    fn write_array_of_int64(&mut self, name: &str, value: Option<&[i64]>) -> Result<()>;

    /// Writes a 32-bit float array field.
    fn write_array_of_float32(&mut self, name: &str, value: Option<&[f32]>) -> Result<()>;

    /// Writes a 64-bit float array field.
    fn write_array_of_float64(&mut self, name: &str, value: Option<&[f64]>) -> Result<()>;

    /// Writes a string array field.
    fn write_array_of_string(&mut self, name: &str, value: Option<&[String]>) -> Result<()>;

    /// Writes a nested compact value.
    fn write_compact(&mut self, name: &str, value: Option<&dyn Compact>) -> Result<()>;
}

/// Looks up compact fields by name in a decoded record.
///
/// Fields missing from the writer's schema read as zero, `false` or `None`;
/// a field present with another kind is an error.
pub trait CompactReader {
    /// Returns the schema the payload was written with.
    fn schema(&self) -> &Schema;

    /// Returns the kind of a field, if the writer's schema has it.
    fn field_kind(&self, name: &str) -> Option<FieldKind> {
        self.schema().field(name).map(SchemaField::kind)
    }

    /// Reads a boolean field.
    fn read_boolean(&mut self, name: &str) -> Result<bool>;

    /// Reads an 8-bit integer field.
    fn read_int8(&mut self, name: &str) -> Result<i8>;

    /// Reads a 16-bit integer field.
    fn read_int16(&mut self, name: &str) -> Result<i16>;

    /// Reads a 32-bit integer field.
    fn read_int32(&mut self, name: &str) -> Result<i32>;

    /// Reads a 64-bit integer field.
    fn read_int64(&mut self, name: &str) -> Result<i64>;

    /// Reads a 32-bit float field.
    fn read_float32(&mut self, name: &str) -> Result<f32>;

    /// Reads a 64-bit float field.
    fn read_float64(&mut self, name: &str) -> Result<f64>;

    /// Reads a nullable string field.
    fn read_string(&mut self, name: &str) -> Result<Option<String>>;

    /// Reads a nullable boolean field.
    fn read_nullable_boolean(&mut self, name: &str) -> Result<Option<bool>>;

    /// Reads a nullable 8-bit integer field.
    fn read_nullable_int8(&mut self, name: &str) -> Result<Option<i8>>;

    /// Reads a nullable 16-bit integer field.
    fn read_nullable_int16(&mut self, name: &str) -> Result<Option<i16>>;

    /// Reads a nullable 32-bit integer field.
    fn read_nullable_int32(&mut self, name: &str) -> Result<Option<i32>>;

    /// Reads a nullable 64-bit integer field.
    fn read_nullable_int64(&mut self, name: &str) -> Result<Option<i64>>;

    /// Reads a nullable 32-bit float field.
    fn read_nullable_float32(&mut self, name: &str) -> Result<Option<f32>>;

    /// Reads a nullable 64-bit float field.
    fn read_nullable_float64(&mut self, name: &str) -> Result<Option<f64>>;

    /// Reads a boolean array field.
    fn read_array_of_boolean(&mut self, name: &str) -> Result<Option<Vec<bool>>>;

    /// Reads a 16-bit integer array field.
    fn read_array_of_int16(&mut self, name: &str) -> Result<Option<Vec<i16>>>;

    /// Reads a 32-bit integer array field.
    fn read_array_of_int32(&mut self, name: &str) -> Result<Option<Vec<i32>>>;

    /// Reads a 64-bit integer array field.
    fn read_array_of_int64(&mut self, name: &str) -> Result<Option<Vec<i64>>>;

    /// Reads a 32-bit float array field.
    fn read_array_of_float32(&mut self, name: &str) -> Result<Option<Vec<f32>>>;

    /// Reads a 64-bit float array field.
    fn read_array_of_float64(&mut self, name: &str) -> Result<Option<Vec<f64>>>;

    /// Reads a string array field.
    fn read_array_of_string(&mut self, name: &str) -> Result<Option<Vec<String>>>;

    /// Reads a nested compact value. Each nested value can be taken once.
    fn read_compact(&mut self, name: &str) -> Result<Option<Box<dyn Compact>>>;
}

/// Registry of known compact schemas, keyed by schema id.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: DashMap<i64, Arc<Schema>>,
}

impl SchemaRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema, returning the cached instance.
    ///
    /// A different schema under an existing id is a registration error.
    pub fn register(&self, schema: Schema) -> Result<Arc<Schema>> {
        match self.schemas.entry(schema.schema_id()) {
            Entry::Occupied(existing) => {
                if **existing.get() == schema {
                    Ok(Arc::clone(existing.get()))
                } else {
                    Err(HazelcastError::Registration(format!(
                        "schema id {} of '{}' is already taken by '{}'",
                        schema.schema_id(),
                        schema.type_name(),
                        existing.get().type_name()
                    )))
                }
            }
            Entry::Vacant(slot) => {
                debug!(
                    schema_id = schema.schema_id(),
                    type_name = schema.type_name(),
                    fields = schema.field_count(),
                    "registered compact schema"
                );
                Ok(Arc::clone(slot.insert(Arc::new(schema)).value()))
            }
        }
    }

    /// Looks up a schema by its ID.
    pub fn get(&self, schema_id: i64) -> Option<Arc<Schema>> {
        self.schemas.get(&schema_id).map(|s| Arc::clone(&s))
    }

    /// Returns true if a schema with this id is registered.
    pub fn contains(&self, schema_id: i64) -> bool {
        self.schemas.contains_key(&schema_id)
    }

    /// Returns the number of registered schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Returns true if no schemas are registered.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Removes every schema.
    pub fn clear(&self) {
        self.schemas.clear();
    }
}

/// Source of schemas the local registry does not know, typically the
/// cluster.
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    /// Fetches the schema with the given id, or `None` if it does not exist.
    async fn fetch(&self, schema_id: i64) -> Result<Option<Schema>>;
}

/// A pending lookup of a schema referenced by a payload.
///
/// Returned by [`SerializationService::try_to_object`] instead of failing
/// when a compact payload names an unknown schema. Awaiting
/// [`SchemaFetch::resolve`] registers the fetched schema, after which the
/// same blob decodes.
///
/// [`SerializationService::try_to_object`]: crate::serialization::SerializationService::try_to_object
#[must_use = "the schema must be fetched before the value can be decoded"]
pub struct SchemaFetch {
    schema_id: i64,
    fetcher: Option<Arc<dyn SchemaFetcher>>,
    registry: Arc<SchemaRegistry>,
}

impl SchemaFetch {
    pub(crate) fn new(
        schema_id: i64,
        fetcher: Option<Arc<dyn SchemaFetcher>>,
        registry: Arc<SchemaRegistry>,
    ) -> Self {
        Self {
            schema_id,
            fetcher,
            registry,
        }
    }

    /// Returns the id of the missing schema.
    pub fn schema_id(&self) -> i64 {
        self.schema_id
    }

    /// Fetches and registers the schema.
    ///
    /// Fails with [`HazelcastError::UnknownSchema`] if no fetcher is
    /// configured, or if the fetcher does not return the requested schema.
    pub async fn resolve(self) -> Result<Arc<Schema>> {
        let unknown = || HazelcastError::UnknownSchema {
            schema_id: self.schema_id,
        };
        let fetcher = self.fetcher.as_ref().ok_or_else(unknown)?;
        match fetcher.fetch(self.schema_id).await? {
            Some(schema) if schema.schema_id() == self.schema_id => {
                self.registry.register(schema)
            }
            _ => Err(unknown()),
        }
    }
}

impl fmt::Debug for SchemaFetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaFetch")
            .field("schema_id", &self.schema_id)
            .field("has_fetcher", &self.fetcher.is_some())
            .finish()
    }
}
