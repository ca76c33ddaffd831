//! Default implementation of PortableReader.

use std::sync::Arc;

use super::{ClassDefinition, FieldDefinition, FieldType, Portable, PortableReader, PortableSerializer};
use crate::error::{HazelcastError, Result};
use crate::serialization::data_input::checked_position;
use crate::serialization::{DataInput, ObjectDataInput};

/// Where a field's value starts, with the identity carried by its definition.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldSlot {
    pub(crate) field_type: FieldType,
    pub(crate) factory_id: i32,
    pub(crate) class_id: i32,
    pub(crate) position: usize,
}

/// Reads fields of a payload whose class definition matches the local one.
///
/// Fields are located through the offset table, so they can be read in any
/// order. Dotted paths such as `"address.city"` descend into nested
/// portables without materialising them.
pub struct DefaultPortableReader<'r, 'a> {
    serializer: &'r PortableSerializer,
    input: &'r mut ObjectDataInput<'a>,
    class_def: Arc<ClassDefinition>,
    offset: usize,
    final_position: usize,
    raw: bool,
    depth: usize,
}

impl<'r, 'a> DefaultPortableReader<'r, 'a> {
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
        let final_position = checked_position(input.read_int()?)?;
        let field_count = input.read_int()?;
        if usize::try_from(field_count).ok() != Some(class_def.field_count()) {
            return Err(HazelcastError::Serialization(format!(
                "field count {} on the wire does not match {}",
                field_count, class_def
            )));
        }
        let offset = input.position();
        Ok(Self {
            serializer,
            input,
            class_def,
            offset,
            final_position,
            raw: false,
            depth,
        })
    }

    /// Returns the class definition the payload was written with.
    pub fn class_definition(&self) -> &ClassDefinition {
        &self.class_def
    }

    /// Moves the input past the payload.
    pub fn end(&mut self) -> Result<()> {
        self.input.set_position(self.final_position)
    }

    /// Finds the value position of a field or dotted path. `None` means the
    /// path names no field of the definition.
    pub(crate) fn locate(&self, name: &str) -> Result<Option<FieldSlot>> {
        if self.raw {
            return Err(HazelcastError::Serialization(format!(
                "cannot read field '{}' of {} after the raw data section was opened",
                name, self.class_def
            )));
        }
        if let Some(fd) = self.class_def.field(name) {
            return self.slot(self.offset, fd).map(Some);
        }
        if name.contains('.') {
            return self.locate_nested(name);
        }
        Ok(None)
    }

    fn slot(&self, offset: usize, fd: &FieldDefinition) -> Result<FieldSlot> {
        let pos = checked_position(self.input.read_int_at(offset + fd.index() * 4)?)?;
        let name_len = self.input.read_short_at(pos)?;
        let name_len = usize::try_from(name_len).map_err(|_| {
            HazelcastError::Serialization(format!("negative field name length {}", name_len))
        })?;
        Ok(FieldSlot {
            field_type: fd.field_type(),
            factory_id: fd.factory_id(),
            class_id: fd.class_id(),
            position: pos + 2 + name_len + 1,
        })
    }

    fn locate_nested(&self, path: &str) -> Result<Option<FieldSlot>> {
        let mut class_def = Arc::clone(&self.class_def);
        let mut offset = self.offset;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let Some(fd) = class_def.field(segment) else {
                return Ok(None);
            };
            let slot = self.slot(offset, fd)?;
            if segments.peek().is_none() {
                return Ok(Some(slot));
            }
            if fd.field_type() != FieldType::Portable {
                return Err(HazelcastError::InvalidPortableField(format!(
                    "'{}' in path '{}' is {:?}, not a nested portable",
                    segment,
                    path,
                    fd.field_type()
                )));
            }
            let pos = slot.position;
            if self.input.read_bool_at(pos)? {
                return Err(HazelcastError::Serialization(format!(
                    "parent field '{}' of path '{}' is null",
                    segment, path
                )));
            }
            let factory_id = self.input.read_int_at(pos + 1)?;
            let class_id = self.input.read_int_at(pos + 5)?;
            let version = self.input.read_int_at(pos + 9)?;
            let header = pos + 13;
            let nested = self.serializer.class_definition_at(
                &*self.input,
                header,
                factory_id,
                class_id,
                version,
            )?;
            let field_count = self.input.read_int_at(header + 4)?;
            if usize::try_from(field_count).ok() != Some(nested.field_count()) {
                return Err(HazelcastError::Serialization(format!(
                    "field count {} on the wire does not match {}",
                    field_count, nested
                )));
            }
            class_def = nested;
            offset = header + 8;
        }
        Ok(None)
    }

    /// Like [`locate`](Self::locate) but the field must exist with exactly
    /// `expected` type.
    fn require(&self, name: &str, expected: FieldType) -> Result<FieldSlot> {
        let slot = self
            .locate(name)?
            .ok_or_else(|| self.class_def.unknown_field(name))?;
        if slot.field_type != expected {
            return Err(incompatible_field(name, slot.field_type, expected));
        }
        Ok(slot)
    }

    fn read_at<T>(
        &mut self,
        pos: usize,
        f: impl FnOnce(&mut ObjectDataInput<'a>) -> Result<T>,
    ) -> Result<T> {
        self.input.preserving_position(|input| {
            input.set_position(pos)?;
            f(input)
        })
    }

    pub(crate) fn byte_at(&self, slot: &FieldSlot) -> Result<i8> {
        self.input.read_byte_at(slot.position)
    }

    pub(crate) fn bool_at(&self, slot: &FieldSlot) -> Result<bool> {
        self.input.read_bool_at(slot.position)
    }

    pub(crate) fn char_at(&self, slot: &FieldSlot) -> Result<char> {
        self.input.read_char_at(slot.position)
    }

    /// Reads a char field as its UTF-16 code unit.
    pub(crate) fn char_code_at(&self, slot: &FieldSlot) -> Result<u16> {
        Ok(self.input.read_short_at(slot.position)? as u16)
    }

    pub(crate) fn short_at(&self, slot: &FieldSlot) -> Result<i16> {
        self.input.read_short_at(slot.position)
    }

    pub(crate) fn int_at(&self, slot: &FieldSlot) -> Result<i32> {
        self.input.read_int_at(slot.position)
    }

    pub(crate) fn long_at(&self, slot: &FieldSlot) -> Result<i64> {
        self.input.read_long_at(slot.position)
    }

    pub(crate) fn float_at(&self, slot: &FieldSlot) -> Result<f32> {
        self.input.read_float_at(slot.position)
    }

    pub(crate) fn double_at(&self, slot: &FieldSlot) -> Result<f64> {
        self.input.read_double_at(slot.position)
    }

    pub(crate) fn string_at(&mut self, slot: &FieldSlot) -> Result<Option<String>> {
        self.read_at(slot.position, |input| input.read_string())
    }

    pub(crate) fn portable_at(&mut self, slot: &FieldSlot) -> Result<Option<Box<dyn Portable>>> {
        let serializer = self.serializer;
        let depth = self.depth + 1;
        let expected = *slot;
        self.read_at(slot.position, |input| {
            let is_null = input.read_bool()?;
            let factory_id = input.read_int()?;
            let class_id = input.read_int()?;
            check_identity(&expected, factory_id, class_id)?;
            if is_null {
                return Ok(None);
            }
            serializer.read_internal(input, factory_id, class_id, depth).map(Some)
        })
    }

    pub(crate) fn portable_array_at(
        &mut self,
        slot: &FieldSlot,
    ) -> Result<Option<Vec<Box<dyn Portable>>>> {
        let serializer = self.serializer;
        let depth = self.depth + 1;
        let expected = *slot;
        self.read_at(slot.position, |input| {
            let len = input.read_int()?;
            let factory_id = input.read_int()?;
            let class_id = input.read_int()?;
            if len == -1 {
                return Ok(None);
            }
            let len = usize::try_from(len).map_err(|_| {
                HazelcastError::Serialization(format!("invalid portable array length: {}", len))
            })?;
            check_identity(&expected, factory_id, class_id)?;
            let table = input.position();
            input.bytes_at(table, len.saturating_mul(4))?;
            let mut values = Vec::with_capacity(len);
            for i in 0..len {
                let start = checked_position(input.read_int_at(table + i * 4)?)?;
                input.set_position(start)?;
                values.push(serializer.read_internal(input, factory_id, class_id, depth)?);
            }
            Ok(Some(values))
        })
    }

    pub(crate) fn array_at<T>(
        &mut self,
        slot: &FieldSlot,
        read: impl FnOnce(&mut ObjectDataInput<'a>) -> Result<Option<T>>,
    ) -> Result<Option<T>> {
        self.read_at(slot.position, read)
    }

    pub(crate) fn open_raw(&mut self) -> Result<&mut ObjectDataInput<'a>> {
        if !self.raw {
            let slot = self.offset + self.class_def.field_count() * 4;
            let pos = checked_position(self.input.read_int_at(slot)?)?;
            if pos == 0 {
                return Err(HazelcastError::Serialization(format!(
                    "{} has no raw data section",
                    self.class_def
                )));
            }
            self.input.set_position(pos)?;
            self.raw = true;
        }
        Ok(&mut *self.input)
    }
}

pub(crate) fn incompatible_field(name: &str, actual: FieldType, requested: FieldType) -> HazelcastError {
    HazelcastError::InvalidPortableField(format!(
        "field '{}' is {:?} and cannot be read as {:?}",
        name, actual, requested
    ))
}

fn check_identity(expected: &FieldSlot, factory_id: i32, class_id: i32) -> Result<()> {
    if expected.factory_id != factory_id || expected.class_id != class_id {
        return Err(HazelcastError::Serialization(format!(
            "invalid nested portable: expected (factory {}, class {}) but found (factory {}, class {})",
            expected.factory_id, expected.class_id, factory_id, class_id
        )));
    }
    Ok(())
}

impl PortableReader for DefaultPortableReader<'_, '_> {
    fn version(&self) -> i32 {
        self.class_def.version()
    }

    fn has_field(&self, name: &str) -> bool {
        self.class_def.has_field(name)
    }

    fn field_names(&self) -> Vec<String> {
        self.class_def.field_names()
    }

    fn field_type(&self, name: &str) -> Result<FieldType> {
        self.class_def.field_type(name)
    }

    fn field_class_id(&self, name: &str) -> Result<i32> {
        self.class_def.field_class_id(name)
    }

    fn read_byte(&mut self, name: &str) -> Result<i8> {
        let slot = self.require(name, FieldType::Byte)?;
        self.byte_at(&slot)
    }

    fn read_bool(&mut self, name: &str) -> Result<bool> {
        let slot = self.require(name, FieldType::Bool)?;
        self.bool_at(&slot)
    }

    fn read_char(&mut self, name: &str) -> Result<char> {
        let slot = self.require(name, FieldType::Char)?;
        self.char_at(&slot)
    }

    fn read_short(&mut self, name: &str) -> Result<i16> {
        let slot = self.require(name, FieldType::Short)?;
        self.short_at(&slot)
    }

    fn read_int(&mut self, name: &str) -> Result<i32> {
        let slot = self.require(name, FieldType::Int)?;
        self.int_at(&slot)
    }

    fn read_long(&mut self, name: &str) -> Result<i64> {
        let slot = self.require(name, FieldType::Long)?;
        self.long_at(&slot)
    }

    fn read_float(&mut self, name: &str) -> Result<f32> {
        let slot = self.require(name, FieldType::Float)?;
        self.float_at(&slot)
    }

    fn read_double(&mut self, name: &str) -> Result<f64> {
        let slot = self.require(name, FieldType::Double)?;
        self.double_at(&slot)
    }

    fn read_string(&mut self, name: &str) -> Result<Option<String>> {
        let slot = self.require(name, FieldType::Utf8)?;
        self.string_at(&slot)
    }

    fn read_portable(&mut self, name: &str) -> Result<Option<Box<dyn Portable>>> {
        let slot = self.require(name, FieldType::Portable)?;
        self.portable_at(&slot)
    }

    fn read_byte_array(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        let slot = self.require(name, FieldType::ByteArray)?;
        self.array_at(&slot, |input| input.read_byte_array())
    }

    fn read_bool_array(&mut self, name: &str) -> Result<Option<Vec<bool>>> {
        let slot = self.require(name, FieldType::BoolArray)?;
        self.array_at(&slot, |input| input.read_bool_array())
    }

    fn read_char_array(&mut self, name: &str) -> Result<Option<Vec<char>>> {
        let slot = self.require(name, FieldType::CharArray)?;
        self.array_at(&slot, |input| input.read_char_array())
    }

    fn read_short_array(&mut self, name: &str) -> Result<Option<Vec<i16>>> {
        let slot = self.require(name, FieldType::ShortArray)?;
        self.array_at(&slot, |input| input.read_short_array())
    }

    fn read_int_array(&mut self, name: &str) -> Result<Option<Vec<i32>>> {
        let slot = self.require(name, FieldType::IntArray)?;
        self.array_at(&slot, |input| input.read_int_array())
    }

    fn read_long_array(&mut self, name: &str) -> Result<Option<Vec<i64>>> {
        let slot = self.require(name, FieldType::LongArray)?;
        self.array_at(&slot, |input| input.read_long_array())
    }

    fn read_float_array(&mut self, name: &str) -> Result<Option<Vec<f32>>> {
        let slot = self.require(name, FieldType::FloatArray)?;
        self.array_at(&slot, |input| input.read_float_array())
    }

    fn read_double_array(&mut self, name: &str) -> Result<Option<Vec<f64>>> {
        let slot = self.require(name, FieldType::DoubleArray)?;
        self.array_at(&slot, |input| input.read_double_array())
    }

    fn read_string_array(&mut self, name: &str) -> Result<Option<Vec<String>>> {
        let slot = self.require(name, FieldType::Utf8Array)?;
        self.array_at(&slot, |input| input.read_string_array())
    }

    fn read_portable_array(&mut self, name: &str) -> Result<Option<Vec<Box<dyn Portable>>>> {
        let slot = self.require(name, FieldType::PortableArray)?;
        self.portable_array_at(&slot)
    }

    fn raw_data_input(&mut self) -> Result<&mut dyn DataInput> {
        Ok(self.open_raw()?)
    }
}
