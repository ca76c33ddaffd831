//! Default implementation of PortableWriter.

use std::collections::HashSet;
use std::sync::Arc;

use super::{ClassDefinition, FieldType, Portable, PortableSerializer, PortableWriter};
use crate::error::{HazelcastError, Result};
use crate::serialization::data_output::{length_prefix, Reserved};
use crate::serialization::{DataOutput, ObjectDataOutput};

/// Writes the self-describing portable layout for one class definition.
///
/// Construction writes the header and the zero-filled offset table; every
/// named field patches its slot with the position of its name. [`end`]
/// patches the end offset once all fields are written.
///
/// [`end`]: DefaultPortableWriter::end
pub struct DefaultPortableWriter<'w, 'a> {
    serializer: &'w PortableSerializer,
    out: &'w mut ObjectDataOutput<'a>,
    class_def: Arc<ClassDefinition>,
    end_slot: Option<Reserved>,
    offset: usize,
    written: HashSet<String>,
    raw: bool,
}

impl<'w, 'a> DefaultPortableWriter<'w, 'a> {
    /// Starts a payload for `class_def` at the current output position.
    pub fn new(
        serializer: &'w PortableSerializer,
        out: &'w mut ObjectDataOutput<'a>,
        class_def: Arc<ClassDefinition>,
    ) -> Result<Self> {
        let end_slot = out.reserve_int();
        out.write_int(length_prefix(class_def.field_count())?)?;
        let offset = out.position();
        out.write_zero_bytes((class_def.field_count() + 1) * 4);
        Ok(Self {
            serializer,
            out,
            class_def,
            end_slot: Some(end_slot),
            offset,
            written: HashSet::new(),
            raw: false,
        })
    }

    /// Returns the class definition being written.
    pub fn class_definition(&self) -> &ClassDefinition {
        &self.class_def
    }

    /// Patches the end offset. Fails if a field of the definition was never
    /// written, or if called twice.
    pub fn end(&mut self) -> Result<()> {
        let end_slot = self.end_slot.take().ok_or_else(|| {
            HazelcastError::Serialization(format!(
                "portable writer for {} has already ended",
                self.class_def
            ))
        })?;
        if self.written.len() != self.class_def.field_count() {
            let missing: Vec<&str> = self
                .class_def
                .fields()
                .iter()
                .map(|f| f.name())
                .filter(|name| !self.written.contains(*name))
                .collect();
            return Err(HazelcastError::InvalidPortableField(format!(
                "fields {:?} of {} were not written",
                missing, self.class_def
            )));
        }
        let end = length_prefix(self.out.position())?;
        self.out.patch_int(end_slot, end)
    }

    /// Records the position of a named field and writes its name and tag.
    /// Returns the nested class identity carried by the definition.
    fn set_position(&mut self, name: &str, field_type: FieldType) -> Result<(i32, i32)> {
        if self.raw {
            return Err(HazelcastError::Serialization(format!(
                "cannot write field '{}' of {} after the raw data section was opened",
                name, self.class_def
            )));
        }
        let class_def = Arc::clone(&self.class_def);
        let fd = class_def
            .field(name)
            .ok_or_else(|| class_def.unknown_field(name))?;
        if fd.field_type() != field_type {
            return Err(HazelcastError::InvalidPortableField(format!(
                "field '{}' of {} is {:?}, not {:?}",
                name,
                class_def,
                fd.field_type(),
                field_type
            )));
        }
        if !self.written.insert(name.to_string()) {
            return Err(HazelcastError::Registration(format!(
                "field '{}' of {} has already been written",
                name, class_def
            )));
        }
        let name_len = i16::try_from(name.len()).map_err(|_| {
            HazelcastError::Serialization(format!("field name '{}' is too long", name))
        })?;
        let pos = length_prefix(self.out.position())?;
        self.out.write_int_at(self.offset + fd.index() * 4, pos)?;
        self.out.write_short(name_len)?;
        self.out.write_bytes(name.as_bytes())?;
        self.out.write_byte(field_type.id() as i8)?;
        Ok((fd.factory_id(), fd.class_id()))
    }
}

fn check_portable_attributes(
    name: &str,
    factory_id: i32,
    class_id: i32,
    portable: &dyn Portable,
) -> Result<()> {
    check_nested_identity(
        name,
        (factory_id, class_id),
        (portable.factory_id(), portable.class_id()),
    )
}

fn check_nested_identity(name: &str, expected: (i32, i32), actual: (i32, i32)) -> Result<()> {
    if expected != actual {
        return Err(HazelcastError::Serialization(format!(
            "field '{}' expects portable (factory {}, class {}) but got (factory {}, class {})",
            name, expected.0, expected.1, actual.0, actual.1
        )));
    }
    Ok(())
}

impl PortableWriter for DefaultPortableWriter<'_, '_> {
    fn version(&self) -> i32 {
        self.class_def.version()
    }

    fn write_byte(&mut self, name: &str, value: i8) -> Result<()> {
        self.set_position(name, FieldType::Byte)?;
        self.out.write_byte(value)
    }

    fn write_bool(&mut self, name: &str, value: bool) -> Result<()> {
        self.set_position(name, FieldType::Bool)?;
        self.out.write_bool(value)
    }

    fn write_char(&mut self, name: &str, value: char) -> Result<()> {
        self.set_position(name, FieldType::Char)?;
        self.out.write_char(value)
    }

    fn write_short(&mut self, name: &str, value: i16) -> Result<()> {
        self.set_position(name, FieldType::Short)?;
        self.out.write_short(value)
    }

    fn write_int(&mut self, name: &str, value: i32) -> Result<()> {
        self.set_position(name, FieldType::Int)?;
        self.out.write_int(value)
    }

    fn write_long(&mut self, name: &str, value: i64) -> Result<()> {
        self.set_position(name, FieldType::Long)?;
        self.out.write_long(value)
    }

    fn write_float(&mut self, name: &str, value: f32) -> Result<()> {
        self.set_position(name, FieldType::Float)?;
        self.out.write_float(value)
    }

    fn write_double(&mut self, name: &str, value: f64) -> Result<()> {
        self.set_position(name, FieldType::Double)?;
        self.out.write_double(value)
    }

    fn write_string(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        self.set_position(name, FieldType::Utf8)?;
        self.out.write_string(value)
    }

    fn write_portable(&mut self, name: &str, value: Option<&dyn Portable>) -> Result<()> {
        let (factory_id, class_id) = self.set_position(name, FieldType::Portable)?;
        self.out.write_bool(value.is_none())?;
        self.out.write_int(factory_id)?;
        self.out.write_int(class_id)?;
        if let Some(portable) = value {
            check_portable_attributes(name, factory_id, class_id, portable)?;
            self.serializer.write_internal(self.out, portable)?;
        }
        Ok(())
    }

    fn write_null_portable(&mut self, name: &str, factory_id: i32, class_id: i32) -> Result<()> {
        let expected = self.set_position(name, FieldType::Portable)?;
        check_nested_identity(name, expected, (factory_id, class_id))?;
        self.out.write_bool(true)?;
        self.out.write_int(factory_id)?;
        self.out.write_int(class_id)
    }

    fn write_byte_array(&mut self, name: &str, value: Option<&[u8]>) -> Result<()> {
        self.set_position(name, FieldType::ByteArray)?;
        self.out.write_byte_array(value)
    }

    fn write_bool_array(&mut self, name: &str, value: Option<&[bool]>) -> Result<()> {
        self.set_position(name, FieldType::BoolArray)?;
        self.out.write_bool_array(value)
    }

    fn write_char_array(&mut self, name: &str, value: Option<&[char]>) -> Result<()> {
        self.set_position(name, FieldType::CharArray)?;
        self.out.write_char_array(value)
    }

    fn write_short_array(&mut self, name: &str, value: Option<&[i16]>) -> Result<()> {
        self.set_position(name, FieldType::ShortArray)?;
        self.out.write_short_array(value)
    }

    fn write_int_array(&mut self, name: &str, value: Option<&[i32]>) -> Result<()> {
        self.set_position(name, FieldType::IntArray)?;
        self.out.write_int_array(value)
    }

    fn write_long_array(&mut self, name: &str, value: Option<&[i64]>) -> Result<()> {
        self.set_position(name, FieldType::LongArray)?;
        self.out.write_long_array(value)
    }

    fn write_float_array(&mut self, name: &str, value: Option<&[f32]>) -> Result<()> {
        self.set_position(name, FieldType::FloatArray)?;
        self.out.write_float_array(value)
    }

    fn write_double_array(&mut self, name: &str, value: Option<&[f64]>) -> Result<()> {
        self.set_position(name, FieldType::DoubleArray)?;
        self.out.write_double_array(value)
    }

    fn write_string_array(&mut self, name: &str, value: Option<&[String]>) -> Result<()> {
        self.set_position(name, FieldType::Utf8Array)?;
        self.out.write_string_array(value)
    }

    fn write_portable_array(
        &mut self,
        name: &str,
        value: Option<&[&dyn Portable]>,
    ) -> Result<()> {
        let (factory_id, class_id) = self.set_position(name, FieldType::PortableArray)?;
        let Some(portables) = value else {
            self.out.write_int(-1)?;
            self.out.write_int(factory_id)?;
            return self.out.write_int(class_id);
        };
        self.out.write_int(length_prefix(portables.len())?)?;
        self.out.write_int(factory_id)?;
        self.out.write_int(class_id)?;
        if portables.is_empty() {
            return Ok(());
        }
        let table = self.out.position();
        self.out.write_zero_bytes(portables.len() * 4);
        for (i, portable) in portables.iter().enumerate() {
            check_portable_attributes(name, factory_id, class_id, *portable)?;
            let start = length_prefix(self.out.position())?;
            self.out.write_int_at(table + i * 4, start)?;
            self.serializer.write_internal(self.out, *portable)?;
        }
        Ok(())
    }

    fn raw_data_output(&mut self) -> Result<&mut dyn DataOutput> {
        if !self.raw {
            let pos = length_prefix(self.out.position())?;
            let slot = self.offset + self.class_def.field_count() * 4;
            self.out.write_int_at(slot, pos)?;
            self.raw = true;
        }
        Ok(&mut *self.out)
    }
}
