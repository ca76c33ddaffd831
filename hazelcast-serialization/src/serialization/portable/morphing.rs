//! Reader for payloads written with a different class version.

use std::sync::Arc;

use super::reader::{incompatible_field, FieldSlot};
use super::{
    ClassDefinition, DefaultPortableReader, FieldType, Portable, PortableReader, PortableSerializer,
};
use crate::error::Result;
use crate::serialization::{DataInput, ObjectDataInput};

/// Reads a payload whose class definition differs from the local version.
///
/// Fields the wire definition does not know read as zero, `false` or `None`.
/// Numeric fields widen losslessly: a short on the wire can be read as an
/// int, an int as a long or double, and so on. Any other type mismatch is an
/// error.
pub struct MorphingPortableReader<'r, 'a> {
    inner: DefaultPortableReader<'r, 'a>,
}

impl<'r, 'a> MorphingPortableReader<'r, 'a> {
    /// Reads the payload header at the current input position.
    pub fn new(
        serializer: &'r PortableSerializer,
        input: &'r mut ObjectDataInput<'a>,
        class_def: Arc<ClassDefinition>,
    ) -> Result<Self> {
        Self::nested(serializer, input, class_def, 0)
    }

    pub(crate) fn nested(
        serializer: &'r PortableSerializer,
        input: &'r mut ObjectDataInput<'a>,
        class_def: Arc<ClassDefinition>,
        depth: usize,
    ) -> Result<Self> {
        Ok(Self {
            inner: DefaultPortableReader::nested(serializer, input, class_def, depth)?,
        })
    }

    /// Returns the wire class definition.
    pub fn class_definition(&self) -> &ClassDefinition {
        self.inner.class_definition()
    }

    /// Moves the input past the payload.
    pub fn end(&mut self) -> Result<()> {
        self.inner.end()
    }

    /// Locates a field that must have exactly `expected` type when present.
    fn exact(&self, name: &str, expected: FieldType) -> Result<Option<FieldSlot>> {
        match self.inner.locate(name)? {
            Some(slot) if slot.field_type != expected => {
                Err(incompatible_field(name, slot.field_type, expected))
            }
            found => Ok(found),
        }
    }
}

impl PortableReader for MorphingPortableReader<'_, '_> {
    fn version(&self) -> i32 {
        self.inner.version()
    }

    fn has_field(&self, name: &str) -> bool {
        self.inner.has_field(name)
    }

    fn field_names(&self) -> Vec<String> {
        self.inner.field_names()
    }

    fn field_type(&self, name: &str) -> Result<FieldType> {
        self.inner.field_type(name)
    }

    fn field_class_id(&self, name: &str) -> Result<i32> {
        self.inner.field_class_id(name)
    }

    fn read_byte(&mut self, name: &str) -> Result<i8> {
        match self.exact(name, FieldType::Byte)? {
            Some(slot) => self.inner.byte_at(&slot),
            None => Ok(0),
        }
    }

    fn read_bool(&mut self, name: &str) -> Result<bool> {
        match self.exact(name, FieldType::Bool)? {
            Some(slot) => self.inner.bool_at(&slot),
            None => Ok(false),
        }
    }

    fn read_char(&mut self, name: &str) -> Result<char> {
        match self.exact(name, FieldType::Char)? {
            Some(slot) => self.inner.char_at(&slot),
            None => Ok('\0'),
        }
    }

    fn read_short(&mut self, name: &str) -> Result<i16> {
        let Some(slot) = self.inner.locate(name)? else {
            return Ok(0);
        };
        match slot.field_type {
            FieldType::Short => self.inner.short_at(&slot),
            FieldType::Byte => Ok(i16::from(self.inner.byte_at(&slot)?)),
            other => Err(incompatible_field(name, other, FieldType::Short)),
        }
    }

    fn read_int(&mut self, name: &str) -> Result<i32> {
        let Some(slot) = self.inner.locate(name)? else {
            return Ok(0);
        };
        match slot.field_type {
            FieldType::Int => self.inner.int_at(&slot),
            FieldType::Byte => Ok(i32::from(self.inner.byte_at(&slot)?)),
            FieldType::Char => Ok(i32::from(self.inner.char_code_at(&slot)?)),
            FieldType::Short => Ok(i32::from(self.inner.short_at(&slot)?)),
            other => Err(incompatible_field(name, other, FieldType::Int)),
        }
    }

    fn read_long(&mut self, name: &str) -> Result<i64> {
        let Some(slot) = self.inner.locate(name)? else {
            return Ok(0);
        };
        match slot.field_type {
            FieldType::Long => self.inner.long_at(&slot),
            FieldType::Int => Ok(i64::from(self.inner.int_at(&slot)?)),
            FieldType::Byte => Ok(i64::from(self.inner.byte_at(&slot)?)),
            FieldType::Char => Ok(i64::from(self.inner.char_code_at(&slot)?)),
            FieldType::Short => Ok(i64::from(self.inner.short_at(&slot)?)),
            other => Err(incompatible_field(name, other, FieldType::Long)),
        }
    }

    fn read_float(&mut self, name: &str) -> Result<f32> {
        let Some(slot) = self.inner.locate(name)? else {
            return Ok(0.0);
        };
        match slot.field_type {
            FieldType::Float => self.inner.float_at(&slot),
            FieldType::Int => Ok(self.inner.int_at(&slot)? as f32),
            FieldType::Byte => Ok(f32::from(self.inner.byte_at(&slot)?)),
            FieldType::Char => Ok(f32::from(self.inner.char_code_at(&slot)?)),
            FieldType::Short => Ok(f32::from(self.inner.short_at(&slot)?)),
            other => Err(incompatible_field(name, other, FieldType::Float)),
        }
    }

    fn read_double(&mut self, name: &str) -> Result<f64> {
        let Some(slot) = self.inner.locate(name)? else {
            return Ok(0.0);
        };
        match slot.field_type {
            FieldType::Double => self.inner.double_at(&slot),
            FieldType::Long => Ok(self.inner.long_at(&slot)? as f64),
            FieldType::Float => Ok(f64::from(self.inner.float_at(&slot)?)),
            FieldType::Int => Ok(f64::from(self.inner.int_at(&slot)?)),
            FieldType::Byte => Ok(f64::from(self.inner.byte_at(&slot)?)),
            FieldType::Char => Ok(f64::from(self.inner.char_code_at(&slot)?)),
            FieldType::Short => Ok(f64::from(self.inner.short_at(&slot)?)),
            other => Err(incompatible_field(name, other, FieldType::Double)),
        }
    }

    fn read_string(&mut self, name: &str) -> Result<Option<String>> {
        match self.exact(name, FieldType::Utf8)? {
            Some(slot) => self.inner.string_at(&slot),
            None => Ok(None),
        }
    }

    fn read_portable(&mut self, name: &str) -> Result<Option<Box<dyn Portable>>> {
        match self.exact(name, FieldType::Portable)? {
            Some(slot) => self.inner.portable_at(&slot),
            None => Ok(None),
        }
    }

    fn read_byte_array(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        match self.exact(name, FieldType::ByteArray)? {
            Some(slot) => self.inner.array_at(&slot, |input| input.read_byte_array()),
            None => Ok(None),
        }
    }

    fn read_bool_array(&mut self, name: &str) -> Result<Option<Vec<bool>>> {
        match self.exact(name, FieldType::BoolArray)? {
            Some(slot) => self.inner.array_at(&slot, |input| input.read_bool_array()),
            None => Ok(None),
        }
    }

    fn read_char_array(&mut self, name: &str) -> Result<Option<Vec<char>>> {
        match self.exact(name, FieldType::CharArray)? {
            Some(slot) => self.inner.array_at(&slot, |input| input.read_char_array()),
            None => Ok(None),
        }
    }

    fn read_short_array(&mut self, name: &str) -> Result<Option<Vec<i16>>> {
        match self.exact(name, FieldType::ShortArray)? {
            Some(slot) => self.inner.array_at(&slot, |input| input.read_short_array()),
            None => Ok(None),
        }
    }

    fn read_int_array(&mut self, name: &str) -> Result<Option<Vec<i32>>> {
        match self.exact(name, FieldType::IntArray)? {
            Some(slot) => self.inner.array_at(&slot, |input| input.read_int_array()),
            None => Ok(None),
        }
    }

    fn read_long_array(&mut self, name: &str) -> Result<Option<Vec<i64>>> {
        match self.exact(name, FieldType::LongArray)? {
            Some(slot) => self.inner.array_at(&slot, |input| input.read_long_array()),
            None => Ok(None),
        }
    }

    fn read_float_array(&mut self, name: &str) -> Result<Option<Vec<f32>>> {
        match self.exact(name, FieldType::FloatArray)? {
            Some(slot) => self.inner.array_at(&slot, |input| input.read_float_array()),
            None => Ok(None),
        }
    }

    fn read_double_array(&mut self, name: &str) -> Result<Option<Vec<f64>>> {
        match self.exact(name, FieldType::DoubleArray)? {
            Some(slot) => self.inner.array_at(&slot, |input| input.read_double_array()),
            None => Ok(None),
        }
    }

    fn read_string_array(&mut self, name: &str) -> Result<Option<Vec<String>>> {
        match self.exact(name, FieldType::Utf8Array)? {
            Some(slot) => self.inner.array_at(&slot, |input| input.read_string_array()),
            None => Ok(None),
        }
    }

    fn read_portable_array(&mut self, name: &str) -> Result<Option<Vec<Box<dyn Portable>>>> {
        match self.exact(name, FieldType::PortableArray)? {
            Some(slot) => self.inner.portable_array_at(&slot),
            None => Ok(None),
        }
    }

    fn raw_data_input(&mut self) -> Result<&mut dyn DataInput> {
        self.inner.raw_data_input()
    }
}
