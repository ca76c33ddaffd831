//! Compact writer, reader and codec.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::{
    Compact, CompactFactory, CompactReader, CompactWriter, FieldKind, Schema, SchemaField,
    SchemaRegistry,
};
use crate::error::{HazelcastError, Result};
use crate::serialization::{DataInput, DataOutput, ObjectDataInput, ObjectDataOutput};

/// Codec for compact values.
///
/// Schemas are derived while writing and registered in the shared
/// [`SchemaRegistry`]; reading looks them up by id.
pub struct CompactSerializer {
    registry: Arc<SchemaRegistry>,
    factories: HashMap<String, Arc<dyn CompactFactory>>,
}

impl fmt::Debug for CompactSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut type_names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        type_names.sort_unstable();
        f.debug_struct("CompactSerializer")
            .field("schemas", &self.registry.len())
            .field("factories", &type_names)
            .finish()
    }
}

impl CompactSerializer {
    /// Creates a codec over `registry`, decoding through `factories`.
    pub fn new<I>(registry: Arc<SchemaRegistry>, factories: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn CompactFactory>>,
    {
        let factories = factories
            .into_iter()
            .map(|factory| (factory.type_name().to_string(), factory))
            .collect();
        Self {
            registry,
            factories,
        }
    }

    /// Returns the schema registry.
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Writes `i64 schema_id` followed by the field values.
    pub fn write(&self, out: &mut ObjectDataOutput<'_>, value: &dyn Compact) -> Result<()> {
        let start = out.position();
        out.write_long(0)?;
        let mut writer = DefaultCompactWriter::new(self, out, value.type_name());
        value.write_compact(&mut writer)?;
        let schema = self.registry.register(writer.into_schema()?)?;
        out.write_long_at(start, schema.schema_id())
    }

    /// Reads a compact value.
    ///
    /// Fails with [`HazelcastError::MissingSchema`] if the payload's schema
    /// is not registered.
    pub fn read(&self, input: &mut ObjectDataInput<'_>) -> Result<Box<dyn Compact>> {
        let schema_id = input.read_long()?;
        let schema = self
            .registry
            .get(schema_id)
            .ok_or(HazelcastError::MissingSchema { schema_id })?;
        let factory = self.factories.get(schema.type_name()).ok_or_else(|| {
            HazelcastError::Serialization(format!(
                "no compact factory registered for type '{}' (schema id {})",
                schema.type_name(),
                schema_id
            ))
        })?;
        let mut values = HashMap::with_capacity(schema.field_count());
        for field in schema.fields() {
            let value = self.read_value(field.kind(), input).map_err(|e| {
                e.with_context(|| {
                    format!(
                        "failed to read field '{}' of compact type '{}'",
                        field.name(),
                        schema.type_name()
                    )
                })
            })?;
            values.insert(field.name().to_string(), value);
        }
        let mut instance = factory.create();
        let mut reader = DefaultCompactReader { schema, values };
        instance.read_compact(&mut reader)?;
        Ok(instance)
    }

    fn read_value(&self, kind: FieldKind, input: &mut ObjectDataInput<'_>) -> Result<FieldValue> {
        Ok(match kind {
            FieldKind::Boolean => FieldValue::Boolean(input.read_bool()?),
            FieldKind::Int8 => FieldValue::Int8(input.read_byte()?),
            FieldKind::Int16 => FieldValue::Int16(input.read_short()?),
            FieldKind::Int32 => FieldValue::Int32(input.read_int()?),
            FieldKind::Int64 => FieldValue::Int64(input.read_long()?),
            FieldKind::Float32 => FieldValue::Float32(input.read_float()?),
            FieldKind::Float64 => FieldValue::Float64(input.read_double()?),
            FieldKind::String => FieldValue::String(input.read_string()?),
            FieldKind::NullableBoolean => {
                FieldValue::NullableBoolean(read_nullable(input, |i| i.read_bool())?)
            }
            FieldKind::NullableInt8 => {
                FieldValue::NullableInt8(read_nullable(input, |i| i.read_byte())?)
            }
            FieldKind::NullableInt16 => {
                FieldValue::NullableInt16(read_nullable(input, |i| i.read_short())?)
            }
            FieldKind::NullableInt32 => {
                FieldValue::NullableInt32(read_nullable(input, |i| i.read_int())?)
            }
            FieldKind::NullableInt64 => {
                FieldValue::NullableInt64(read_nullable(input, |i| i.read_long())?)
            }
            FieldKind::NullableFloat32 => {
                FieldValue::NullableFloat32(read_nullable(input, |i| i.read_float())?)
            }
            FieldKind::NullableFloat64 => {
                FieldValue::NullableFloat64(read_nullable(input, |i| i.read_double())?)
            }
            FieldKind::ArrayOfBoolean => FieldValue::ArrayOfBoolean(input.read_bool_array()?),
            FieldKind::ArrayOfInt16 => FieldValue::ArrayOfInt16(input.read_short_array()?),
            FieldKind::ArrayOfInt32 => FieldValue::ArrayOfInt32(input.read_int_array()?),
            FieldKind::ArrayOfInt64 => FieldValue::ArrayOfInt64(input.read_long_array()?),
            FieldKind::ArrayOfFloat32 => FieldValue::ArrayOfFloat32(input.read_float_array()?),
            FieldKind::ArrayOfFloat64 => FieldValue::ArrayOfFloat64(input.read_double_array()?),
            FieldKind::ArrayOfString => FieldValue::ArrayOfString(input.read_string_array()?),
            FieldKind::Compact => FieldValue::Compact(if input.read_bool()? {
                Some(self.read(input)?)
            } else {
                None
            }),
        })
    }
}

fn read_nullable<'a, T>(
    input: &mut ObjectDataInput<'a>,
    read: impl FnOnce(&mut ObjectDataInput<'a>) -> Result<T>,
) -> Result<Option<T>> {
    if input.read_bool()? {
        read(input).map(Some)
    } else {
        Ok(None)
    }
}

/// Writes the field values of one compact value and records its schema.
pub struct DefaultCompactWriter<'w, 'a> {
    serializer: &'w CompactSerializer,
    out: &'w mut ObjectDataOutput<'a>,
    type_name: String,
    fields: Vec<SchemaField>,
    written: HashSet<String>,
}

impl<'w, 'a> DefaultCompactWriter<'w, 'a> {
    fn new(
        serializer: &'w CompactSerializer,
        out: &'w mut ObjectDataOutput<'a>,
        type_name: &str,
    ) -> Self {
        Self {
            serializer,
            out,
            type_name: type_name.to_string(),
            fields: Vec::new(),
            written: HashSet::new(),
        }
    }

    fn field(&mut self, name: &str, kind: FieldKind) -> Result<()> {
        if !self.written.insert(name.to_string()) {
            return Err(HazelcastError::Registration(format!(
                "field '{}' of compact type '{}' has already been written",
                name, self.type_name
            )));
        }
        self.fields.push(SchemaField::new(name, kind));
        Ok(())
    }

    fn nullable<T>(
        &mut self,
        name: &str,
        kind: FieldKind,
        value: Option<T>,
        write: impl FnOnce(&mut ObjectDataOutput<'a>, T) -> Result<()>,
    ) -> Result<()> {
        self.field(name, kind)?;
        self.out.write_bool(value.is_some())?;
        match value {
            Some(v) => write(&mut *self.out, v),
            None => Ok(()),
        }
    }

    fn into_schema(self) -> Result<Schema> {
        Schema::new(self.type_name, self.fields)
    }
}

impl CompactWriter for DefaultCompactWriter<'_, '_> {
    fn write_boolean(&mut self, name: &str, value: bool) -> Result<()> {
        self.field(name, FieldKind::Boolean)?;
        self.out.write_bool(value)
    }

    fn write_int8(&mut self, name: &str, value: i8) -> Result<()> {
        self.field(name, FieldKind::Int8)?;
        self.out.write_byte(value)
    }

    fn write_int16(&mut self, name: &str, value: i16) -> Result<()> {
        self.field(name, FieldKind::Int16)?;
        self.out.write_short(value)
    }

    fn write_int32(&mut self, name: &str, value: i32) -> Result<()> {
        self.field(name, FieldKind::Int32)?;
        self.out.write_int(value)
    }

    fn write_int64(&mut self, name: &str, value: i64) -> Result<()> {
        self.field(name, FieldKind::Int64)?;
        self.out.write_long(value)
    }

    fn write_float32(&mut self, name: &str, value: f32) -> Result<()> {
        self.field(name, FieldKind::Float32)?;
        self.out.write_float(value)
    }

    fn write_float64(&mut self, name: &str, value: f64) -> Result<()> {
        self.field(name, FieldKind::Float64)?;
        self.out.write_double(value)
    }

    fn write_string(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        self.field(name, FieldKind::String)?;
        self.out.write_string(value)
    }

    fn write_nullable_boolean(&mut self, name: &str, value: Option<bool>) -> Result<()> {
        self.nullable(name, FieldKind::NullableBoolean, value, |o, v| o.write_bool(v))
    }

    fn write_nullable_int8(&mut self, name: &str, value: Option<i8>) -> Result<()> {
        self.nullable(name, FieldKind::NullableInt8, value, |o, v| o.write_byte(v))
    }

    fn write_nullable_int16(&mut self, name: &str, value: Option<i16>) -> Result<()> {
        self.nullable(name, FieldKind::NullableInt16, value, |o, v| o.write_short(v))
    }

    fn write_nullable_int32(&mut self, name: &str, value: Option<i32>) -> Result<()> {
        self.nullable(name, FieldKind::NullableInt32, value, |o, v| o.write_int(v))
    }

    fn write_nullable_int64(&mut self, name: &str, value: Option<i64>) -> Result<()> {
        self.nullable(name, FieldKind::NullableInt64, value, |o, v| o.write_long(v))
    }

    fn write_nullable_float32(&mut self, name: &str, value: Option<f32>) -> Result<()> {
        self.nullable(name, FieldKind::NullableFloat32, value, |o, v| o.write_float(v))
    }

    fn write_nullable_float64(&mut self, name: &str, value: Option<f64>) -> Result<()> {
        self.nullable(name, FieldKind::NullableFloat64, value, |o, v| o.write_double(v))
    }

    fn write_array_of_boolean(&mut self, name: &str, value: Option<&[bool]>) -> Result<()> {
        self.field(name, FieldKind::ArrayOfBoolean)?;
        self.out.write_bool_array(value)
    }

    fn write_array_of_int16(&mut self, name: &str, value: Option<&[i16]>) -> Result<()> {
        self.field(name, FieldKind::ArrayOfInt16)?;
        self.out.write_short_array(value)
    }

    fn write_array_of_int32(&mut self, name: &str, value: Option<&[i32]>) -> Result<()> {
        self.field(name, FieldKind::ArrayOfInt32)?;
        self.out.write_int_array(value)
    }

    fn write_array_of_int64(&mut self, name: &str, value: Option<&[i64]>) -> Result<()> {
        self.field(name, FieldKind::ArrayOfInt64)?;
        self.out.write_long_array(value)
    }

    fn write_array_of_float32(&mut self, name: &str, value: Option<&[f32]>) -> Result<()> {
        self.field(name, FieldKind::ArrayOfFloat32)?;
        self.out.write_float_array(value)
    }

    fn write_array_of_float64(&mut self, name: &str, value: Option<&[f64]>) -> Result<()> {
        self.field(name, FieldKind::ArrayOfFloat64)?;
        self.out.write_double_array(value)
    }

    fn write_array_of_string(&mut self, name: &str, value: Option<&[String]>) -> Result<()> {
        self.field(name, FieldKind::ArrayOfString)?;
        self.out.write_string_array(value)
    }

    fn write_compact(&mut self, name: &str, value: Option<&dyn Compact>) -> Result<()> {
        self.field(name, FieldKind::Compact)?;
        self.out.write_bool(value.is_some())?;
        match value {
            Some(nested) => self.serializer.write(&mut *self.out, nested),
            None => Ok(()),
        }
    }
}

/// A decoded field value, named after its [`FieldKind`].
enum FieldValue {
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(Option<String>),
    NullableBoolean(Option<bool>),
    NullableInt8(Option<i8>),
    NullableInt16(Option<i16>),
    NullableInt32(Option<i32>),
    NullableInt64(Option<i64>),
    NullableFloat32(Option<f32>),
    NullableFloat64(Option<f64>),
    ArrayOfBoolean(Option<Vec<bool>>),
    ArrayOfInt16(Option<Vec<i16>>),
    ArrayOfInt32(Option<Vec<i32>>),
    ArrayOfInt64(Option<Vec<i64>>),
    ArrayOfFloat32(Option<Vec<f32>>),
    ArrayOfFloat64(Option<Vec<f64>>),
    ArrayOfString(Option<Vec<String>>),
    Compact(Option<Box<dyn Compact>>),
}

impl FieldValue {
    fn kind(&self) -> FieldKind {
        match self {
            Self::Boolean(_) => FieldKind::Boolean,
            Self::Int8(_) => FieldKind::Int8,
            Self::Int16(_) => FieldKind::Int16,
            Self::Int32(_) => FieldKind::Int32,
            Self::Int64(_) => FieldKind::Int64,
            Self::Float32(_) => FieldKind::Float32,
            Self::Float64(_) => FieldKind::Float64,
            Self::String(_) => FieldKind::String,
            Self::NullableBoolean(_) => FieldKind::NullableBoolean,
            Self::NullableInt8(_) => FieldKind::NullableInt8,
            Self::NullableInt16(_) => FieldKind::NullableInt16,
            Self::NullableInt32(_) => FieldKind::NullableInt32,
            Self::NullableInt64(_) => FieldKind::NullableInt64,
            Self::NullableFloat32(_) => FieldKind::NullableFloat32,
            Self::NullableFloat64(_) => FieldKind::NullableFloat64,
            Self::ArrayOfBoolean(_) => FieldKind::ArrayOfBoolean,
            Self::ArrayOfInt16(_) => FieldKind::ArrayOfInt16,
            Self::ArrayOfInt32(_) => FieldKind::ArrayOfInt32,
            Self::ArrayOfInt64(_) => FieldKind::ArrayOfInt64,
            Self::ArrayOfFloat32(_) => FieldKind::ArrayOfFloat32,
            Self::ArrayOfFloat64(_) => FieldKind::ArrayOfFloat64,
            Self::ArrayOfString(_) => FieldKind::ArrayOfString,
            Self::Compact(_) => FieldKind::Compact,
        }
    }
}

/// Reads the decoded fields of one compact value by name.
pub struct DefaultCompactReader {
    schema: Arc<Schema>,
    values: HashMap<String, FieldValue>,
}

impl DefaultCompactReader {
    fn mismatch(&self, name: &str, actual: FieldKind, requested: FieldKind) -> HazelcastError {
        HazelcastError::Serialization(format!(
            "field '{}' of compact type '{}' is {:?}, cannot read it as {:?}",
            name,
            self.schema.type_name(),
            actual,
            requested
        ))
    }
}

macro_rules! read_field {
    ($($method:ident => $variant:ident, $ty:ty, $default:expr;)*) => {
        $(
            fn $method(&mut self, name: &str) -> Result<$ty> {
                match self.values.get(name) {
                    None => Ok($default),
                    Some(FieldValue::$variant(v)) => Ok(v.clone()),
                    Some(other) => Err(self.mismatch(name, other.kind(), FieldKind::$variant)),
                }
            }
        )*
    };
}

impl CompactReader for DefaultCompactReader {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    read_field! {
        read_boolean => Boolean, bool, false;
        read_int8 => Int8, i8, 0;
        read_int16 => Int16, i16, 0;
        read_int32 => Int32, i32, 0;
        read_int64 => Int64, i64, 0;
        read_float32 => Float32, f32, 0.0;
        read_float64 => Float64, f64, 0.0;
        read_string => String, Option<String>, None;
        read_nullable_boolean => NullableBoolean, Option<bool>, None;
        read_nullable_int8 => NullableInt8, Option<i8>, None;
        read_nullable_int16 => NullableInt16, Option<i16>, None;
        read_nullable_int32 => NullableInt32, Option<i32>, None;
        read_nullable_int64 => NullableInt64, Option<i64>, None;
        read_nullable_float32 => NullableFloat32, Option<f32>, None;
        read_nullable_float64 => NullableFloat64, Option<f64>, None;
        read_array_of_boolean => ArrayOfBoolean, Option<Vec<bool>>, None;
        read_array_of_int16 => ArrayOfInt16, Option<Vec<i16>>, None;
        read_array_of_int32 => ArrayOfInt32, Option<Vec<i32>>, None;
        read_array_of_int64 => ArrayOfInt64, Option<Vec<i64>>, None;
        read_array_of_float32 => ArrayOfFloat32, Option<Vec<f32>>, None;
        read_array_of_float64 => ArrayOfFloat64, Option<Vec<f64>>, None;
        read_array_of_string => ArrayOfString, Option<Vec<String>>, None;
    }

    fn read_compact(&mut self, name: &str) -> Result<Option<Box<dyn Compact>>> {
        match self.values.remove(name) {
            None => Ok(None),
            Some(FieldValue::Compact(v)) => Ok(v),
            Some(other) => {
                let kind = other.kind();
                self.values.insert(name.to_string(), other);
                Err(self.mismatch(name, kind, FieldKind::Compact))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::HazelcastObject;

    #[derive(Debug, Default, PartialEq)]
    struct Address {
        city: Option<String>,
        zip: i32,
    }

    impl HazelcastObject for Address {
        fn as_compact(&self) -> Option<&dyn Compact> {
            Some(self)
        }
    }

    impl Compact for Address {
        fn type_name(&self) -> &str {
            "address"
        }

        fn write_compact(&self, writer: &mut dyn CompactWriter) -> Result<()> {
            writer.write_string("city", self.city.as_deref())?;
            writer.write_int32("zip", self.zip)
        }

        fn read_compact(&mut self, reader: &mut dyn CompactReader) -> Result<()> {
            self.city = reader.read_string("city")?;
            self.zip = reader.read_int32("zip")?;
            Ok(())
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Employee {
        name: Option<String>,
        age: i32,
        salary: Option<i64>,
        scores: Option<Vec<f64>>,
        tags: Option<Vec<String>>,
        address: Option<Address>,
        active: bool,
    }

    impl HazelcastObject for Employee {
        fn as_compact(&self) -> Option<&dyn Compact> {
            Some(self)
        }
    }

    impl Compact for Employee {
        fn type_name(&self) -> &str {
            "employee"
        }

        fn write_compact(&self, writer: &mut dyn CompactWriter) -> Result<()> {
            writer.write_string("name", self.name.as_deref())?;
            writer.write_int32("age", self.age)?;
            writer.write_nullable_int64("salary", self.salary)?;
            writer.write_array_of_float64("scores", self.scores.as_deref())?;
            writer.write_array_of_string("tags", self.tags.as_deref())?;
            writer.write_compact("address", self.address.as_ref().map(|a| a as &dyn Compact))?;
            writer.write_boolean("active", self.active)
        }

        fn read_compact(&mut self, reader: &mut dyn CompactReader) -> Result<()> {
            self.name = reader.read_string("name")?;
            self.age = reader.read_int32("age")?;
            self.salary = reader.read_nullable_int64("salary")?;
            self.scores = reader.read_array_of_float64("scores")?;
            self.tags = reader.read_array_of_string("tags")?;
            self.address = match reader.read_compact("address")? {
                Some(nested) => Some(*nested.into_any().downcast::<Address>().map_err(|_| {
                    HazelcastError::Serialization("address field is not an Address".to_string())
                })?),
                None => None,
            };
            self.active = reader.read_boolean("active")?;
            Ok(())
        }
    }

    /// An older shape of `employee` that only knows the name.
    #[derive(Debug, Default)]
    struct EmployeeV0 {
        name: Option<String>,
        age: i32,
        nickname: Option<String>,
    }

    impl HazelcastObject for EmployeeV0 {}

    impl Compact for EmployeeV0 {
        fn type_name(&self) -> &str {
            "employee"
        }

        fn write_compact(&self, writer: &mut dyn CompactWriter) -> Result<()> {
            writer.write_string("name", self.name.as_deref())
        }

        fn read_compact(&mut self, reader: &mut dyn CompactReader) -> Result<()> {
            self.name = reader.read_string("name")?;
            self.age = reader.read_int32("age")?;
            self.nickname = reader.read_string("nickname")?;
            Ok(())
        }
    }

    struct Factory<T>(&'static str, fn() -> T);

    impl<T: Compact> CompactFactory for Factory<T> {
        fn type_name(&self) -> &str {
            self.0
        }

        fn create(&self) -> Box<dyn Compact> {
            Box::new((self.1)())
        }
    }

    fn serializer() -> CompactSerializer {
        let factories: Vec<Arc<dyn CompactFactory>> = vec![
            Arc::new(Factory("employee", Employee::default)),
            Arc::new(Factory("address", Address::default)),
        ];
        CompactSerializer::new(Arc::new(SchemaRegistry::new()), factories)
    }

    fn write(serializer: &CompactSerializer, value: &dyn Compact) -> Vec<u8> {
        let mut out = ObjectDataOutput::new();
        serializer.write(&mut out, value).unwrap();
        out.into_bytes()
    }

    fn sample() -> Employee {
        Employee {
            name: Some("Ada".to_string()),
            age: 36,
            salary: None,
            scores: Some(vec![1.5, 2.5]),
            tags: Some(Vec::new()),
            address: Some(Address {
                city: Some("London".to_string()),
                zip: 1815,
            }),
            active: true,
        }
    }

    #[test]
    fn test_round_trip_with_nested_value() {
        let serializer = serializer();
        let original = sample();
        let bytes = write(&serializer, &original);
        let mut input = ObjectDataInput::new(&bytes);
        let decoded = serializer.read(&mut input).unwrap();
        assert_eq!(input.position(), bytes.len());
        let decoded = decoded.into_any().downcast::<Employee>().unwrap();
        assert_eq!(*decoded, original);
    }

    #[test]
    fn test_payload_starts_with_schema_id() {
        let serializer = serializer();
        let bytes = write(&serializer, &sample());
        let schema_id = i64::from_be_bytes(bytes[..8].try_into().unwrap());
        let schema = serializer.registry().get(schema_id).unwrap();
        assert_eq!(schema.type_name(), "employee");
        assert_eq!(
            schema.fields().iter().map(|f| f.name()).collect::<Vec<_>>(),
            vec!["name", "age", "salary", "scores", "tags", "address", "active"]
        );
        // employee and its nested address
        assert_eq!(serializer.registry().len(), 2);
    }

    #[test]
    fn test_unknown_schema_is_missing_schema() {
        let writer_side = serializer();
        let bytes = write(&writer_side, &sample());
        let reader_side = serializer();
        let mut input = ObjectDataInput::new(&bytes);
        let err = reader_side.read(&mut input).err().unwrap();
        assert!(matches!(err, HazelcastError::MissingSchema { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_absent_fields_read_as_defaults() {
        let serializer = serializer();
        let old = EmployeeV0 {
            name: Some("Grace".to_string()),
            ..Default::default()
        };
        let bytes = write(&serializer, &old);
        let mut input = ObjectDataInput::new(&bytes);
        let decoded = serializer.read(&mut input).unwrap();
        let decoded = decoded.into_any().downcast::<Employee>().unwrap();
        assert_eq!(decoded.name.as_deref(), Some("Grace"));
        assert_eq!(decoded.age, 0);
        assert!(decoded.address.is_none());
        assert!(!decoded.active);
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        struct Strict;
        impl HazelcastObject for Strict {}
        impl Compact for Strict {
            fn type_name(&self) -> &str {
                "address"
            }
            fn write_compact(&self, writer: &mut dyn CompactWriter) -> Result<()> {
                writer.write_int64("zip", 1)
            }
            fn read_compact(&mut self, _reader: &mut dyn CompactReader) -> Result<()> {
                Ok(())
            }
        }

        let serializer = serializer();
        let bytes = write(&serializer, &Strict);
        let mut input = ObjectDataInput::new(&bytes);
        let err = serializer.read(&mut input).err().unwrap();
        assert!(err.to_string().contains("zip"));
    }

    #[test]
    fn test_duplicate_field_is_rejected() {
        struct Twice;
        impl HazelcastObject for Twice {}
        impl Compact for Twice {
            fn type_name(&self) -> &str {
                "twice"
            }
            fn write_compact(&self, writer: &mut dyn CompactWriter) -> Result<()> {
                writer.write_int32("x", 1)?;
                writer.write_int32("x", 2)
            }
            fn read_compact(&mut self, _reader: &mut dyn CompactReader) -> Result<()> {
                Ok(())
            }
        }

        let mut out = ObjectDataOutput::new();
        let err = serializer().write(&mut out, &Twice).unwrap_err();
        assert!(matches!(err, HazelcastError::Registration(_)));
    }

    #[test]
    fn test_missing_factory_names_type() {
        struct Orphan;
        impl HazelcastObject for Orphan {}
        impl Compact for Orphan {
            fn type_name(&self) -> &str {
                "orphan"
            }
            fn write_compact(&self, _writer: &mut dyn CompactWriter) -> Result<()> {
                Ok(())
            }
            fn read_compact(&mut self, _reader: &mut dyn CompactReader) -> Result<()> {
                Ok(())
            }
        }

        let serializer = serializer();
        let bytes = write(&serializer, &Orphan);
        assert_eq!(bytes.len(), 8);
        let mut input = ObjectDataInput::new(&bytes);
        let err = serializer.read(&mut input).err().unwrap();
        assert!(err.to_string().contains("orphan"));
    }

    #[test]
    fn test_truncated_payload_names_field() {
        let serializer = serializer();
        let bytes = write(&serializer, &sample());
        let mut input = ObjectDataInput::new(&bytes[..12]);
        let err = serializer.read(&mut input).err().unwrap();
        assert!(matches!(err, HazelcastError::Serialization(_)));
        assert!(err.to_string().contains("'name'"));
    }
}
