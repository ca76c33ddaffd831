//! Portable values: named, versioned fields described by class definitions.
//!
//! A portable payload is self-describing and randomly addressable:
//!
//! ```text
//! i32 endOffset | i32 fieldCount | (fieldCount + 1) x i32 offsets |
//! per field: i16 nameLen | name bytes | u8 typeTag | value
//! ```
//!
//! The last offset slot points at the optional raw-data section. Field
//! schemas are described by [`ClassDefinition`]s, cached per factory in a
//! [`PortableContext`].

mod class_definition_writer;
mod context;
mod discovery;
mod morphing;
mod reader;
mod serializer;
mod writer;

use std::collections::HashMap;
use std::fmt;

use crate::error::{HazelcastError, Result};
use crate::serialization::{DataInput, DataOutput, HazelcastObject};

pub use class_definition_writer::ClassDefinitionWriter;
pub use context::PortableContext;
pub use discovery::{discover_class_definition, DiscoveredClassDefinition};
pub use morphing::MorphingPortableReader;
pub use reader::DefaultPortableReader;
pub use serializer::{PortableSerializer, PORTABLE_TYPE_ID};
pub use writer::DefaultPortableWriter;

/// Deepest chain of nested portables that is read or rebuilt from the wire.
pub(crate) const MAX_NESTING_DEPTH: usize = 64;

/// Supported field types in Portable serialization, with their wire tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    /// Nested Portable object.
    Portable = 0,
    /// Signed 8-bit integer.
    Byte = 1,
    /// Boolean value.
    Bool = 2,
    /// 16-bit Unicode character.
    Char = 3,
    /// Signed 16-bit integer.
    Short = 4,
    /// Signed 32-bit integer.
    Int = 5,
    /// Signed 64-bit integer.
    Long = 6,
    /// 32-bit floating point.
    Float = 7,
    /// 64-bit floating point.
    Double = 8,
    /// UTF-8 string.
    Utf8 = 9,
    /// Array of Portable objects.
    PortableArray = 10,
    /// Array of bytes.
    ByteArray = 11,
    /// Array of booleans.
    BoolArray = 12,
    /// Array of chars.
    CharArray = 13,
    /// Array of shorts.
    ShortArray = 14,
    /// Array of ints.
    IntArray = 15,
    /// Array of longs.
    LongArray = 16,
    /// Array of floats.
    FloatArray = 17,
    /// Array of doubles.
    DoubleArray = 18,
    /// Array of strings.
    Utf8Array = 19,
}

impl FieldType {
    /// Creates a FieldType from its wire tag.
    pub fn from_id(id: u8) -> Result<Self> {
        Ok(match id {
            0 => Self::Portable,
            1 => Self::Byte,
            2 => Self::Bool,
            3 => Self::Char,
            4 => Self::Short,
            5 => Self::Int,
            6 => Self::Long,
            7 => Self::Float,
            8 => Self::Double,
            9 => Self::Utf8,
            10 => Self::PortableArray,
            11 => Self::ByteArray,
            12 => Self::BoolArray,
            13 => Self::CharArray,
            14 => Self::ShortArray,
            15 => Self::IntArray,
            16 => Self::LongArray,
            17 => Self::FloatArray,
            18 => Self::DoubleArray,
            19 => Self::Utf8Array,
            _ => {
                return Err(HazelcastError::Serialization(format!(
                    "unknown portable field type id: {}",
                    id
                )))
            }
        })
    }

    /// Returns the wire tag of this field type.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Returns true if this is an array type.
    pub fn is_array(self) -> bool {
        matches!(
            self,
            Self::PortableArray
                | Self::ByteArray
                | Self::BoolArray
                | Self::CharArray
                | Self::ShortArray
                | Self::IntArray
                | Self::LongArray
                | Self::FloatArray
                | Self::DoubleArray
                | Self::Utf8Array
        )
    }

    /// Returns true for nested portable fields and portable arrays.
    pub fn is_portable(self) -> bool {
        matches!(self, Self::Portable | Self::PortableArray)
    }
}

/// One named field of a class definition, with its position and type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    index: usize,
    name: String,
    field_type: FieldType,
    factory_id: i32,
    class_id: i32,
    version: i32,
}

impl FieldDefinition {
    /// Creates a field definition for a primitive, string or array field.
    pub fn new(index: usize, name: impl Into<String>, field_type: FieldType) -> Self {
        Self::with_class(index, name, field_type, 0, 0, 0)
    }

    /// Creates a field definition carrying a nested class identity.
    pub fn with_class(
        index: usize,
        name: impl Into<String>,
        field_type: FieldType,
        factory_id: i32,
        class_id: i32,
        version: i32,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            field_type,
            factory_id,
            class_id,
            version,
        }
    }

    /// Returns the position of this field in write order.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field type.
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Returns the factory ID for nested Portable fields.
    pub fn factory_id(&self) -> i32 {
        self.factory_id
    }

    /// Returns the class ID for nested Portable fields.
    pub fn class_id(&self) -> i32 {
        self.class_id
    }

    /// Returns the version for nested Portable fields.
    pub fn version(&self) -> i32 {
        self.version
    }
}

/// Version value of a definition whose version is assigned at registration.
pub const UNSET_VERSION: i32 = -1;

/// The versioned field layout of one (factory id, class id) pair.
///
/// Built once through [`ClassDefinitionBuilder`] and immutable afterwards.
#[derive(Debug, Clone)]
pub struct ClassDefinition {
    factory_id: i32,
    class_id: i32,
    version: i32,
    fields: Vec<FieldDefinition>,
    field_indices: HashMap<String, usize>,
}

impl ClassDefinition {
    /// Returns the factory ID.
    pub fn factory_id(&self) -> i32 {
        self.factory_id
    }

    /// Returns the class ID.
    pub fn class_id(&self) -> i32 {
        self.class_id
    }

    /// Returns the schema version, or [`UNSET_VERSION`].
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Returns the number of fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Returns all field definitions in index order.
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.field_indices.get(name).map(|&i| &self.fields[i])
    }

    /// Returns the field at `index`.
    pub fn field_at(&self, index: usize) -> Option<&FieldDefinition> {
        self.fields.get(index)
    }

    /// Returns true if a field with the given name exists.
    pub fn has_field(&self, name: &str) -> bool {
        self.field_indices.contains_key(name)
    }

    /// Returns the field names in index order.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Returns the type of the named field.
    pub fn field_type(&self, name: &str) -> Result<FieldType> {
        self.field(name)
            .map(FieldDefinition::field_type)
            .ok_or_else(|| self.unknown_field(name))
    }

    /// Returns the nested class id of the named field.
    pub fn field_class_id(&self, name: &str) -> Result<i32> {
        self.field(name)
            .map(FieldDefinition::class_id)
            .ok_or_else(|| self.unknown_field(name))
    }

    pub(crate) fn with_version_if_unset(mut self, version: i32) -> Self {
        if self.version < 0 {
            self.version = version;
        }
        self
    }

    pub(crate) fn unknown_field(&self, name: &str) -> HazelcastError {
        HazelcastError::InvalidPortableField(format!("unknown field '{}' in {}", name, self))
    }
}

impl PartialEq for ClassDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.factory_id == other.factory_id
            && self.class_id == other.class_id
            && self.version == other.version
            && self.fields == other.fields
    }
}

impl Eq for ClassDefinition {}

impl fmt::Display for ClassDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ClassDefinition(factory_id={}, class_id={}, version={}, fields={})",
            self.factory_id,
            self.class_id,
            self.version,
            self.fields.len()
        )
    }
}

/// Builder for [`ClassDefinition`]s.
///
/// ```ignore
/// let person = ClassDefinitionBuilder::new(1, 5)
///     .add_int_field("id")?
///     .add_string_field("name")?
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ClassDefinitionBuilder {
    factory_id: i32,
    class_id: i32,
    version: i32,
    fields: Vec<FieldDefinition>,
    field_indices: HashMap<String, usize>,
}

macro_rules! add_field_methods {
    ($($(#[$doc:meta])* $method:ident => $field_type:ident;)*) => {
        $(
            $(#[$doc])*
            pub fn $method(mut self, name: impl Into<String>) -> Result<Self> {
                self.push(name, FieldType::$field_type)?;
                Ok(self)
            }
        )*
    };
}

impl ClassDefinitionBuilder {
    /// Starts a definition whose version is assigned at registration.
    pub fn new(factory_id: i32, class_id: i32) -> Self {
        Self::with_version(factory_id, class_id, UNSET_VERSION)
    }

    /// Starts a definition with an explicit version.
    pub fn with_version(factory_id: i32, class_id: i32, version: i32) -> Self {
        Self {
            factory_id,
            class_id,
            version,
            fields: Vec::new(),
            field_indices: HashMap::new(),
        }
    }

    /// Returns the factory ID.
    pub fn factory_id(&self) -> i32 {
        self.factory_id
    }

    /// Returns the class ID.
    pub fn class_id(&self) -> i32 {
        self.class_id
    }

    /// Returns the version.
    pub fn version(&self) -> i32 {
        self.version
    }

    add_field_methods! {
        /// Adds a byte field.
        add_byte_field => Byte;
        /// Adds a boolean field.
        add_bool_field => Bool;
        /// Adds a char field.
        add_char_field => Char;
        /// Adds a short field.
        add_short_field => Short;
        /// Adds an int field.
        add_int_field => Int;
        /// Adds a long field.
        add_long_field => Long;
        /// Adds a float field.
        add_float_field => Float;
        /// Adds a double field.
        add_double_field => Double;
        /// Adds a string field.
        add_string_field => Utf8;
        /// Adds a byte array field.
        add_byte_array_field => ByteArray;
        /// Adds a boolean array field.
        add_bool_array_field => BoolArray;
        /// Adds a char array field.
        add_char_array_field => CharArray;
        /// Adds a short array field.
        add_short_array_field => ShortArray;
        /// Adds an int array field.
        add_int_array_field => IntArray;
        /// Adds a long array field.
        add_long_array_field => LongArray;
        /// Adds a float array field.
        add_float_array_field => FloatArray;
        /// Adds a double array field.
        add_double_array_field => DoubleArray;
        /// Adds a string array field.
        add_string_array_field => Utf8Array;
    }

    /// Adds a nested portable field described by `nested`.
    pub fn add_portable_field(
        mut self,
        name: impl Into<String>,
        nested: &ClassDefinition,
    ) -> Result<Self> {
        self.push_nested(name, FieldType::Portable, nested)?;
        Ok(self)
    }

    /// Adds a portable array field whose elements are described by `nested`.
    pub fn add_portable_array_field(
        mut self,
        name: impl Into<String>,
        nested: &ClassDefinition,
    ) -> Result<Self> {
        self.push_nested(name, FieldType::PortableArray, nested)?;
        Ok(self)
    }

    /// Adds a prepared field definition. Its index must equal the number of
    /// fields added so far.
    pub fn add_field(mut self, field: FieldDefinition) -> Result<Self> {
        self.push_field(field)?;
        Ok(self)
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, field_type: FieldType) -> Result<()> {
        let index = self.fields.len();
        self.push_field(FieldDefinition::new(index, name, field_type))
    }

    pub(crate) fn push_nested(
        &mut self,
        name: impl Into<String>,
        field_type: FieldType,
        nested: &ClassDefinition,
    ) -> Result<()> {
        let name = name.into();
        if nested.class_id() == 0 {
            return Err(HazelcastError::Registration(format!(
                "portable field '{}' references a class definition with class id 0",
                name
            )));
        }
        let index = self.fields.len();
        self.push_field(FieldDefinition::with_class(
            index,
            name,
            field_type,
            nested.factory_id(),
            nested.class_id(),
            nested.version(),
        ))
    }

    fn push_field(&mut self, field: FieldDefinition) -> Result<()> {
        if field.index != self.fields.len() {
            return Err(HazelcastError::Registration(format!(
                "field '{}' has index {} but {} fields were added before it",
                field.name,
                field.index,
                self.fields.len()
            )));
        }
        if self.field_indices.contains_key(&field.name) {
            return Err(HazelcastError::Registration(format!(
                "field '{}' is defined twice in class {} of factory {}",
                field.name, self.class_id, self.factory_id
            )));
        }
        self.field_indices.insert(field.name.clone(), field.index);
        self.fields.push(field);
        Ok(())
    }

    /// Finishes the definition.
    pub fn build(self) -> ClassDefinition {
        ClassDefinition {
            factory_id: self.factory_id,
            class_id: self.class_id,
            version: self.version,
            fields: self.fields,
            field_indices: self.field_indices,
        }
    }
}

/// A type serialized in the Portable format.
///
/// ```ignore
/// impl Portable for Person {
///     fn factory_id(&self) -> i32 { 1 }
///     fn class_id(&self) -> i32 { 5 }
///
///     fn write_portable(&self, writer: &mut dyn PortableWriter) -> Result<()> {
///         writer.write_int("id", self.id)?;
///         writer.write_string("name", Some(self.name.as_str()))
///     }
///
///     fn read_portable(&mut self, reader: &mut dyn PortableReader) -> Result<()> {
///         self.id = reader.read_int("id")?;
///         self.name = reader.read_string("name")?.unwrap_or_default();
///         Ok(())
///     }
/// }
/// ```
pub trait Portable: HazelcastObject {
    /// Returns the factory ID.
    fn factory_id(&self) -> i32;

    /// Returns the class ID. Must be non-zero.
    fn class_id(&self) -> i32;

    /// Returns the class version, overriding the configured default.
    fn class_version(&self) -> Option<i32> {
        None
    }

    /// Writes the fields of this value.
    fn write_portable(&self, writer: &mut dyn PortableWriter) -> Result<()>;

    /// Reads the fields of this value.
    fn read_portable(&mut self, reader: &mut dyn PortableReader) -> Result<()>;
}

/// Creates empty portable values for one factory id.
pub trait PortableFactory: Send + Sync {
    /// Returns the factory ID this factory handles.
    fn factory_id(&self) -> i32;

    /// Creates a new blank instance for the given class ID.
    fn create(&self, class_id: i32) -> Option<Box<dyn Portable>>;
}

/// Trait for writing named Portable fields.
pub trait PortableWriter {
    /// Returns the version of the class being written.
    fn version(&self) -> i32;

    /// Writes a byte field.
    fn write_byte(&mut self, name: &str, value: i8) -> Result<()>;

    /// Writes a boolean field.
    fn write_bool(&mut self, name: &str, value: bool) -> Result<()>;

    /// Writes a char field.
    fn write_char(&mut self, name: &str, value: char) -> Result<()>;

    /// Writes a short field.
    fn write_short(&mut self, name: &str, value: i16) -> Result<()>;

    /// Writes an int field.
    fn write_int(&mut self, name: &str, value: i32) -> Result<()>;

    /// Writes a long field.
    fn write_long(&mut self, name: &str, value: i64) -> Result<()>;

    /// Writes a float field.
    fn write_float(&mut self, name: &str, value: f32) -> Result<()>;

    /// Writes a double field.
    fn write_double(&mut self, name: &str, value: f64) -> Result<()>;

    /// Writes a string field.
    fn write_string(&mut self, name: &str, value: Option<&str>) -> Result<()>;

    /// Writes a nested portable field.
    fn write_portable(&mut self, name: &str, value: Option<&dyn Portable>) -> Result<()>;

    /// Writes a null nested portable field of a known class.
    fn write_null_portable(&mut self, name: &str, factory_id: i32, class_id: i32) -> Result<()>;

    /// Writes a byte array field.
    fn write_byte_array(&mut self, name: &str, value: Option<&[u8]>) -> Result<()>;

    /// Writes a boolean array field.
    fn write_bool_array(&mut self, name: &str, value: Option<&[bool]>) -> Result<()>;

    /// Writes a char array field.
    fn write_char_array(&mut self, name: &str, value: Option<&[char]>) -> Result<()>;

    /// Writes a short array field.
    fn write_short_array(&mut self, name: &str, value: Option<&[i16]>) -> Result<()>;

    /// Writes an int array field.
    fn write_int_array(&mut self, name: &str, value: Option<&[i32]>) -> Result<()>;

    /// Writes a long array field.
    fn write_long_array(&mut self, name: &str, value: Option<&[i64]>) -> Result<()>;

    /// Writes a float array field.
    fn write_float_array(&mut self, name: &str, value: Option<&[f32]>) -> Result<()>;

    /// Writes a double array field.
    fn write_double_array(&mut self, name: &str, value: Option<&[f64]>) -> Result<()>;

    /// Writes a string array field.
    fn write_string_array(&mut self, name: &str, value: Option<&[String]>) -> Result<()>;

    /// Writes a portable array field. All elements must share one class.
    fn write_portable_array(&mut self, name: &str, value: Option<&[&dyn Portable]>)
        -> Result<()>;

    /// Switches to the raw-data section and returns it for free-form writes.
    ///
    /// Named field writes fail afterwards.
    fn raw_data_output(&mut self) -> Result<&mut dyn DataOutput>;
}

/// Trait for reading named Portable fields in any order.
pub trait PortableReader {
    /// Returns the version of the class on the wire.
    fn version(&self) -> i32;

    /// Returns true if a field with the given name exists.
    fn has_field(&self, name: &str) -> bool;

    /// Returns the field names in index order.
    fn field_names(&self) -> Vec<String>;

    /// Returns the type of the named field.
    fn field_type(&self, name: &str) -> Result<FieldType>;

    /// Returns the nested class id of the named field.
    fn field_class_id(&self, name: &str) -> Result<i32>;

    /// Reads a byte field.
    fn read_byte(&mut self, name: &str) -> Result<i8>;

    /// Reads a boolean field.
    fn read_bool(&mut self, name: &str) -> Result<bool>;

    /// Reads a char field.
    fn read_char(&mut self, name: &str) -> Result<char>;

    /// Reads a short field.
    fn read_short(&mut self, name: &str) -> Result<i16>;

    /// Reads an int field.
    fn read_int(&mut self, name: &str) -> Result<i32>;

    /// Reads a long field.
    fn read_long(&mut self, name: &str) -> Result<i64>;

    /// Reads a float field.
    fn read_float(&mut self, name: &str) -> Result<f32>;

    /// Reads a double field.
    fn read_double(&mut self, name: &str) -> Result<f64>;

    /// Reads a string field.
    fn read_string(&mut self, name: &str) -> Result<Option<String>>;

    /// Reads a nested portable field.
    fn read_portable(&mut self, name: &str) -> Result<Option<Box<dyn Portable>>>;

    /// Reads a byte array field.
    fn read_byte_array(&mut self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Reads a boolean array field.
    fn read_bool_array(&mut self, name: &str) -> Result<Option<Vec<bool>>>;

    /// Reads a char array field.
    fn read_char_array(&mut self, name: &str) -> Result<Option<Vec<char>>>;

    /// Reads a short array field.
    fn read_short_array(&mut self, name: &str) -> Result<Option<Vec<i16>>>;

    /// Reads an int array field.
    fn read_int_array(&mut self, name: &str) -> Result<Option<Vec<i32>>>;

    /// Reads a long array field.
    fn read_long_array(&mut self, name: &str) -> Result<Option<Vec<i64>>>;

    /// Reads a float array field.
    fn read_float_array(&mut self, name: &str) -> Result<Option<Vec<f32>>>;

    /// Reads a double array field.
    fn read_double_array(&mut self, name: &str) -> Result<Option<Vec<f64>>>;

    /// Reads a string array field.
    fn read_string_array(&mut self, name: &str) -> Result<Option<Vec<String>>>;

    /// Reads a portable array field.
    fn read_portable_array(&mut self, name: &str) -> Result<Option<Vec<Box<dyn Portable>>>>;

    /// Switches to the raw-data section and returns it for free-form reads.
    ///
    /// Named field reads fail afterwards.
    fn raw_data_input(&mut self) -> Result<&mut dyn DataInput>;
}

fn downcast_portable<T: Portable>(value: Box<dyn Portable>) -> Result<T> {
    let type_name = (*value).concrete_type_name();
    value.into_any().downcast::<T>().map(|v| *v).map_err(|_| {
        HazelcastError::Serialization(format!(
            "portable of type {} is not a {}",
            type_name,
            std::any::type_name::<T>()
        ))
    })
}

/// Typed helpers over [`PortableReader`].
pub trait PortableReaderExt: PortableReader {
    /// Reads a nested portable field as a concrete type.
    fn read_portable_as<T: Portable>(&mut self, name: &str) -> Result<Option<T>> {
        self.read_portable(name)?.map(downcast_portable).transpose()
    }

    /// Reads a portable array field as a vector of a concrete type.
    fn read_portable_array_as<T: Portable>(&mut self, name: &str) -> Result<Option<Vec<T>>> {
        match self.read_portable_array(name)? {
            Some(values) => values
                .into_iter()
                .map(downcast_portable)
                .collect::<Result<Vec<T>>>()
                .map(Some),
            None => Ok(None),
        }
    }
}

impl<R: PortableReader + ?Sized> PortableReaderExt for R {}
