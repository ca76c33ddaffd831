//! Derives class definitions from a value's own write logic.

use std::sync::Arc;

use super::{
    ClassDefinition, ClassDefinitionBuilder, FieldType, Portable, PortableContext, PortableWriter,
};
use crate::error::{HazelcastError, Result};
use crate::serialization::data_output::NullDataOutput;
use crate::serialization::DataOutput;

/// A [`PortableWriter`] that records field names and types instead of
/// writing values.
///
/// Nested portables are derived recursively and registered in the context.
/// Raw data written through it is discarded.
pub struct ClassDefinitionWriter<'c> {
    context: &'c PortableContext,
    builder: ClassDefinitionBuilder,
    raw: NullDataOutput,
}

impl<'c> ClassDefinitionWriter<'c> {
    /// Creates a writer filling `builder`.
    pub fn new(context: &'c PortableContext, builder: ClassDefinitionBuilder) -> Self {
        Self {
            context,
            builder,
            raw: NullDataOutput::default(),
        }
    }

    /// Registers the recorded definition and returns the cached instance.
    pub fn register_and_get(self) -> Result<Arc<ClassDefinition>> {
        self.context.register(self.builder.build())
    }

    fn nested_definition(&self, portable: &dyn Portable) -> Result<Arc<ClassDefinition>> {
        let version = self.context.version_of(portable);
        let builder =
            ClassDefinitionBuilder::with_version(portable.factory_id(), portable.class_id(), version);
        let mut writer = ClassDefinitionWriter::new(self.context, builder);
        portable.write_portable(&mut writer)?;
        writer.register_and_get()
    }

    fn missing_definition(&self, name: &str) -> HazelcastError {
        HazelcastError::Serialization(format!(
            "cannot derive field '{}' of class {} (factory {}) from a null portable; \
             register its class definition explicitly",
            name,
            self.builder.class_id(),
            self.builder.factory_id()
        ))
    }
}

impl PortableWriter for ClassDefinitionWriter<'_> {
    fn version(&self) -> i32 {
        self.builder.version()
    }

    fn write_byte(&mut self, name: &str, _value: i8) -> Result<()> {
        self.builder.push(name, FieldType::Byte)
    }

    fn write_bool(&mut self, name: &str, _value: bool) -> Result<()> {
        self.builder.push(name, FieldType::Bool)
    }

    fn write_char(&mut self, name: &str, _value: char) -> Result<()> {
        self.builder.push(name, FieldType::Char)
    }

    fn write_short(&mut self, name: &str, _value: i16) -> Result<()> {
        self.builder.push(name, FieldType::Short)
    }

    fn write_int(&mut self, name: &str, _value: i32) -> Result<()> {
        self.builder.push(name, FieldType::Int)
    }

    fn write_long(&mut self, name: &str, _value: i64) -> Result<()> {
        self.builder.push(name, FieldType::Long)
    }

    fn write_float(&mut self, name: &str, _value: f32) -> Result<()> {
        self.builder.push(name, FieldType::Float)
    }

    fn write_double(&mut self, name: &str, _value: f64) -> Result<()> {
        self.builder.push(name, FieldType::Double)
    }

    fn write_string(&mut self, name: &str, _value: Option<&str>) -> Result<()> {
        self.builder.push(name, FieldType::Utf8)
    }

    fn write_portable(&mut self, name: &str, value: Option<&dyn Portable>) -> Result<()> {
        let portable = value.ok_or_else(|| self.missing_definition(name))?;
        let nested = self.nested_definition(portable)?;
        self.builder.push_nested(name, FieldType::Portable, &nested)
    }

    fn write_null_portable(&mut self, name: &str, factory_id: i32, class_id: i32) -> Result<()> {
        let version = self
            .context
            .class_version(factory_id, class_id)
            .unwrap_or(self.context.portable_version());
        let nested = self
            .context
            .lookup(factory_id, class_id, version)
            .ok_or_else(|| self.missing_definition(name))?;
        self.builder.push_nested(name, FieldType::Portable, &nested)
    }

    fn write_byte_array(&mut self, name: &str, _value: Option<&[u8]>) -> Result<()> {
        self.builder.push(name, FieldType::ByteArray)
    }

    fn write_bool_array(&mut self, name: &str, _value: Option<&[bool]>) -> Result<()> {
        self.builder.push(name, FieldType::BoolArray)
    }

    fn write_char_array(&mut self, name: &str, _value: Option<&[char]>) -> Result<()> {
        self.builder.push(name, FieldType::CharArray)
    }

    fn write_short_array(&mut self, name: &str, _value: Option<&[i16]>) -> Result<()> {
        self.builder.push(name, FieldType::ShortArray)
    }

    fn write_int_array(&mut self, name: &str, _value: Option<&[i32]>) -> Result<()> {
        self.builder.push(name, FieldType::IntArray)
    }

    fn write_long_array(&mut self, name: &str, _value: Option<&[i64]>) -> Result<()> {
        self.builder.push(name, FieldType::LongArray)
    }

    fn write_float_array(&mut self, name: &str, _value: Option<&[f32]>) -> Result<()> {
        self.builder.push(name, FieldType::FloatArray)
    }

    fn write_double_array(&mut self, name: &str, _value: Option<&[f64]>) -> Result<()> {
        self.builder.push(name, FieldType::DoubleArray)
    }

    fn write_string_array(&mut self, name: &str, _value: Option<&[String]>) -> Result<()> {
        self.builder.push(name, FieldType::Utf8Array)
    }

    fn write_portable_array(
        &mut self,
        name: &str,
        value: Option<&[&dyn Portable]>,
    ) -> Result<()> {
        let portables = value.unwrap_or_default();
        let first = portables.first().ok_or_else(|| self.missing_definition(name))?;
        if let Some(other) = portables.iter().find(|p| {
            p.factory_id() != first.factory_id() || p.class_id() != first.class_id()
        }) {
            return Err(HazelcastError::Serialization(format!(
                "portable array '{}' mixes class {} and class {}",
                name,
                first.class_id(),
                other.class_id()
            )));
        }
        let nested = self.nested_definition(*first)?;
        self.builder.push_nested(name, FieldType::PortableArray, &nested)
    }

    fn raw_data_output(&mut self) -> Result<&mut dyn DataOutput> {
        Ok(&mut self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::portable::PortableReader;
    use crate::serialization::HazelcastObject;

    #[derive(Debug, Default)]
    struct Address {
        city: String,
    }

    impl HazelcastObject for Address {
        fn as_portable(&self) -> Option<&dyn Portable> {
            Some(self)
        }
    }

    impl Portable for Address {
        fn factory_id(&self) -> i32 {
            1
        }

        fn class_id(&self) -> i32 {
            6
        }

        fn write_portable(&self, writer: &mut dyn PortableWriter) -> Result<()> {
            writer.write_string("city", Some(self.city.as_str()))
        }

        fn read_portable(&mut self, reader: &mut dyn PortableReader) -> Result<()> {
            self.city = reader.read_string("city")?.unwrap_or_default();
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct Person {
        address: Option<Address>,
        history: Vec<Address>,
    }

    impl HazelcastObject for Person {}

    impl Portable for Person {
        fn factory_id(&self) -> i32 {
            1
        }

        fn class_id(&self) -> i32 {
            5
        }

        fn class_version(&self) -> Option<i32> {
            Some(2)
        }

        fn write_portable(&self, writer: &mut dyn PortableWriter) -> Result<()> {
            writer.write_long("id", 1)?;
            writer.write_portable("address", self.address.as_ref().map(|a| a as &dyn Portable))?;
            let history: Vec<&dyn Portable> =
                self.history.iter().map(|a| a as &dyn Portable).collect();
            writer.write_portable_array("history", Some(history.as_slice()))?;
            writer.raw_data_output()?.write_int(99)
        }

        fn read_portable(&mut self, _reader: &mut dyn PortableReader) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_derives_nested_definitions() {
        let ctx = PortableContext::new(0);
        let person = Person {
            address: Some(Address::default()),
            history: vec![Address::default()],
        };
        let cd = ctx.lookup_or_register(&person).unwrap();
        assert_eq!(cd.version(), 2);
        assert_eq!(cd.field_type("id").unwrap(), FieldType::Long);
        assert_eq!(cd.field_type("address").unwrap(), FieldType::Portable);
        assert_eq!(cd.field_class_id("history").unwrap(), 6);
        assert!(ctx.lookup(1, 6, 0).is_some());
    }

    #[test]
    fn test_null_nested_without_definition_fails() {
        let ctx = PortableContext::new(0);
        let person = Person {
            address: None,
            history: vec![Address::default()],
        };
        let err = ctx.lookup_or_register(&person).unwrap_err();
        assert!(err.to_string().contains("address"));
    }

    #[test]
    fn test_empty_portable_array_without_definition_fails() {
        let ctx = PortableContext::new(0);
        let person = Person {
            address: Some(Address::default()),
            history: Vec::new(),
        };
        assert!(ctx.lookup_or_register(&person).is_err());
    }

    #[test]
    fn test_write_null_portable_uses_registered_definition() {
        let ctx = PortableContext::new(0);
        ctx.register(
            ClassDefinitionBuilder::new(1, 6)
                .add_string_field("city")
                .unwrap()
                .build(),
        )
        .unwrap();
        let mut writer = ClassDefinitionWriter::new(&ctx, ClassDefinitionBuilder::new(1, 7));
        writer.write_null_portable("home", 1, 6).unwrap();
        let cd = writer.register_and_get().unwrap();
        assert_eq!(cd.field_class_id("home").unwrap(), 6);
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let ctx = PortableContext::new(0);
        let mut writer = ClassDefinitionWriter::new(&ctx, ClassDefinitionBuilder::new(1, 7));
        writer.write_int("x", 1).unwrap();
        assert!(writer.write_int("x", 2).is_err());
    }
}
