//! Reconstruction of class definitions from self-describing payloads.

use super::{
    ClassDefinition, ClassDefinitionBuilder, FieldDefinition, FieldType, MAX_NESTING_DEPTH,
};
use crate::error::{HazelcastError, Result};
use crate::serialization::data_input::checked_position;
use crate::serialization::ObjectDataInput;

/// A class definition recovered from wire bytes, with the definitions of its
/// nested portable fields.
#[derive(Debug, Clone)]
pub struct DiscoveredClassDefinition {
    /// The recovered definition.
    pub definition: ClassDefinition,
    /// Definitions of non-null nested portables, in field order.
    pub nested: Vec<DiscoveredClassDefinition>,
    /// False when a nested portable was null or a portable array was empty
    /// somewhere below this definition, so its shape is only provisional.
    pub registrable: bool,
}

impl DiscoveredClassDefinition {
    /// Visits this definition and every nested one, children first.
    pub fn for_each_nested_first<F>(&self, f: &mut F) -> Result<()>
    where
        F: FnMut(&DiscoveredClassDefinition) -> Result<()>,
    {
        for child in &self.nested {
            child.for_each_nested_first(f)?;
        }
        f(self)
    }
}

/// Walks the portable payload starting at `position` (its end-offset slot)
/// and rebuilds its class definition from the per-field name and type tags.
///
/// Only positional reads are used; the input's cursor is not moved and no
/// registry is touched.
pub fn discover_class_definition(
    input: &ObjectDataInput<'_>,
    position: usize,
    factory_id: i32,
    class_id: i32,
    version: i32,
) -> Result<DiscoveredClassDefinition> {
    discover(input, position, factory_id, class_id, version, 0)
}

fn discover(
    input: &ObjectDataInput<'_>,
    position: usize,
    factory_id: i32,
    class_id: i32,
    version: i32,
    depth: usize,
) -> Result<DiscoveredClassDefinition> {
    if depth > MAX_NESTING_DEPTH {
        return Err(HazelcastError::Serialization(format!(
            "portable nesting deeper than {} levels while reading class {} of factory {}",
            MAX_NESTING_DEPTH, class_id, factory_id
        )));
    }

    let field_count = input.read_int_at(position + 4)?;
    let field_count = usize::try_from(field_count).map_err(|_| {
        HazelcastError::Serialization(format!(
            "negative field count {} for class {} of factory {}",
            field_count, class_id, factory_id
        ))
    })?;
    let offset = position + 8;
    // the offset table must fit, including the raw-data slot
    input.bytes_at(offset, field_count.saturating_add(1).saturating_mul(4))?;

    let mut builder = ClassDefinitionBuilder::with_version(factory_id, class_id, version);
    let mut nested = Vec::new();
    let mut registrable = true;

    for index in 0..field_count {
        let mut pos = checked_position(input.read_int_at(offset + index * 4)?)?;
        let name_len = input.read_short_at(pos)?;
        let name_len = usize::try_from(name_len).map_err(|_| {
            HazelcastError::Serialization(format!("negative field name length {}", name_len))
        })?;
        pos += 2;
        let name = std::str::from_utf8(input.bytes_at(pos, name_len)?)
            .map_err(|e| HazelcastError::Serialization(format!("invalid field name: {}", e)))?
            .to_string();
        pos += name_len;
        let field_type = FieldType::from_id(input.read_byte_at(pos)? as u8)?;
        pos += 1;

        let field = match field_type {
            FieldType::Portable => {
                let is_null = input.read_bool_at(pos)?;
                let nested_factory_id = input.read_int_at(pos + 1)?;
                let nested_class_id = input.read_int_at(pos + 5)?;
                let mut nested_version = version;
                if is_null {
                    registrable = false;
                } else {
                    nested_version = input.read_int_at(pos + 9)?;
                    let child = discover(
                        input,
                        pos + 13,
                        nested_factory_id,
                        nested_class_id,
                        nested_version,
                        depth + 1,
                    )?;
                    registrable &= child.registrable;
                    nested.push(child);
                }
                FieldDefinition::with_class(
                    index,
                    name,
                    field_type,
                    nested_factory_id,
                    nested_class_id,
                    nested_version,
                )
            }
            FieldType::PortableArray => {
                let len = input.read_int_at(pos)?;
                let nested_factory_id = input.read_int_at(pos + 4)?;
                let nested_class_id = input.read_int_at(pos + 8)?;
                let mut nested_version = version;
                if len > 0 {
                    let first = checked_position(input.read_int_at(pos + 12)?)?;
                    nested_version = input.read_int_at(first)?;
                    let child = discover(
                        input,
                        first + 4,
                        nested_factory_id,
                        nested_class_id,
                        nested_version,
                        depth + 1,
                    )?;
                    registrable &= child.registrable;
                    nested.push(child);
                } else {
                    registrable = false;
                }
                FieldDefinition::with_class(
                    index,
                    name,
                    field_type,
                    nested_factory_id,
                    nested_class_id,
                    nested_version,
                )
            }
            _ => FieldDefinition::new(index, name, field_type),
        };
        builder.push_field(field)?;
    }

    Ok(DiscoveredClassDefinition {
        definition: builder.build(),
        nested,
        registrable,
    })
}
