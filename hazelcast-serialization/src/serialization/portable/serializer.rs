//! Portable serialization framework integration.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{
    ClassDefinition, DefaultPortableReader, DefaultPortableWriter, MorphingPortableReader,
    Portable, PortableContext, PortableFactory, MAX_NESTING_DEPTH,
};
use crate::error::{HazelcastError, Result};
use crate::serialization::{DataInput, DataOutput, ObjectDataInput, ObjectDataOutput};

/// Type identifier for Portable serialization.
pub const PORTABLE_TYPE_ID: i32 = -1;

/// Serializer for Portable objects.
///
/// Owns the class definition cache and the registered factories. A
/// top-level portable is written as `factory_id, class_id, version` followed
/// by the self-describing payload; nested portables reuse the same routine
/// after their own `is_null, factory_id, class_id` prefix.
pub struct PortableSerializer {
    context: PortableContext,
    factories: HashMap<i32, Arc<dyn PortableFactory>>,
}

impl fmt::Debug for PortableSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut factory_ids: Vec<_> = self.factories.keys().copied().collect();
        factory_ids.sort_unstable();
        f.debug_struct("PortableSerializer")
            .field("context", &self.context)
            .field("factories", &factory_ids)
            .finish()
    }
}

impl PortableSerializer {
    /// Creates a serializer for the given default version and factories.
    pub fn new(portable_version: i32, factories: HashMap<i32, Arc<dyn PortableFactory>>) -> Self {
        Self {
            context: PortableContext::new(portable_version),
            factories,
        }
    }

    /// Returns the class definition cache.
    pub fn context(&self) -> &PortableContext {
        &self.context
    }

    /// Registers class definitions up front, for classes whose values may be
    /// null or empty when their definition would otherwise be derived.
    pub fn register_class_definitions<I>(&self, definitions: I) -> Result<()>
    where
        I: IntoIterator<Item = ClassDefinition>,
    {
        for cd in definitions {
            self.context.register(cd)?;
        }
        Ok(())
    }

    /// Writes a top-level portable.
    pub fn write(&self, out: &mut ObjectDataOutput<'_>, portable: &dyn Portable) -> Result<()> {
        if portable.class_id() == 0 {
            return Err(HazelcastError::Serialization(format!(
                "portable class id cannot be zero ({})",
                (*portable).concrete_type_name()
            )));
        }
        out.write_int(portable.factory_id())?;
        out.write_int(portable.class_id())?;
        self.write_internal(out, portable)
    }

    /// Writes the version and payload of a portable.
    pub(crate) fn write_internal(
        &self,
        out: &mut ObjectDataOutput<'_>,
        portable: &dyn Portable,
    ) -> Result<()> {
        let cd = self.context.lookup_or_register(portable)?;
        out.write_int(cd.version())?;
        let mut writer = DefaultPortableWriter::new(self, out, cd)?;
        portable.write_portable(&mut writer)?;
        writer.end()
    }

    /// Reads a top-level portable.
    pub fn read(&self, input: &mut ObjectDataInput<'_>) -> Result<Box<dyn Portable>> {
        let factory_id = input.read_int()?;
        let class_id = input.read_int()?;
        self.read_internal(input, factory_id, class_id, 0)
    }

    /// Reads the version and payload of a portable whose identity was
    /// already read. `depth` counts the enclosing portables.
    pub(crate) fn read_internal(
        &self,
        input: &mut ObjectDataInput<'_>,
        factory_id: i32,
        class_id: i32,
        depth: usize,
    ) -> Result<Box<dyn Portable>> {
        if depth > MAX_NESTING_DEPTH {
            return Err(HazelcastError::Serialization(format!(
                "portable nesting deeper than {} levels while reading class {} of factory {}",
                MAX_NESTING_DEPTH, class_id, factory_id
            )));
        }
        self.read_payload(input, factory_id, class_id, depth).map_err(|e| {
            e.with_context(|| {
                format!(
                    "failed to read portable of class {} (factory {})",
                    class_id, factory_id
                )
            })
        })
    }

    fn read_payload(
        &self,
        input: &mut ObjectDataInput<'_>,
        factory_id: i32,
        class_id: i32,
        depth: usize,
    ) -> Result<Box<dyn Portable>> {
        let version = input.read_int()?;
        let mut portable = self.create(factory_id, class_id)?;
        let local_version = self.find_portable_version(factory_id, class_id, portable.as_ref())?;
        let position = input.position();
        let cd = self.class_definition_at(input, position, factory_id, class_id, version)?;

        if local_version == version {
            let mut reader = DefaultPortableReader::nested(self, input, cd, depth)?;
            portable.read_portable(&mut reader)?;
            reader.end()?;
        } else {
            let mut reader = MorphingPortableReader::nested(self, input, cd, depth)?;
            portable.read_portable(&mut reader)?;
            reader.end()?;
        }
        Ok(portable)
    }

    /// Returns the cached definition for a payload, or rebuilds it from the
    /// payload starting at `position`.
    pub(crate) fn class_definition_at(
        &self,
        input: &ObjectDataInput<'_>,
        position: usize,
        factory_id: i32,
        class_id: i32,
        version: i32,
    ) -> Result<Arc<ClassDefinition>> {
        match self.context.lookup(factory_id, class_id, version) {
            Some(cd) => Ok(cd),
            None => self
                .context
                .read_class_definition(input, position, factory_id, class_id, version),
        }
    }

    /// Returns the version local values of a class are read as. The first
    /// answer is pinned for the lifetime of the context.
    fn find_portable_version(
        &self,
        factory_id: i32,
        class_id: i32,
        portable: &dyn Portable,
    ) -> Result<i32> {
        if let Some(version) = self.context.class_version(factory_id, class_id) {
            return Ok(version);
        }
        let version = self.context.version_of(portable);
        self.context.set_class_version(factory_id, class_id, version)?;
        Ok(version)
    }

    fn create(&self, factory_id: i32, class_id: i32) -> Result<Box<dyn Portable>> {
        let factory = self.factories.get(&factory_id).ok_or_else(|| {
            HazelcastError::Serialization(format!(
                "could not find portable factory for factory id {}",
                factory_id
            ))
        })?;
        factory.create(class_id).ok_or_else(|| {
            HazelcastError::Serialization(format!(
                "portable factory {} could not create an instance of class id {}",
                factory_id, class_id
            ))
        })
    }
}
