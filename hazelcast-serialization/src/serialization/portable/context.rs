//! Registry of portable class definitions.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};

use super::discovery::{discover_class_definition, DiscoveredClassDefinition};
use super::{ClassDefinition, ClassDefinitionBuilder, ClassDefinitionWriter, Portable};
use crate::error::{HazelcastError, Result};
use crate::serialization::ObjectDataInput;

/// Definitions of one factory, keyed by `(class_id, version)`.
#[derive(Debug)]
struct FactoryDefinitions {
    factory_id: i32,
    versioned: DashMap<(i32, i32), Arc<ClassDefinition>>,
    current_versions: DashMap<i32, i32>,
}

impl FactoryDefinitions {
    fn new(factory_id: i32) -> Self {
        Self {
            factory_id,
            versioned: DashMap::new(),
            current_versions: DashMap::new(),
        }
    }

    fn register(&self, cd: ClassDefinition) -> Result<Arc<ClassDefinition>> {
        if cd.factory_id() != self.factory_id {
            return Err(HazelcastError::Registration(format!(
                "invalid factory id {} for {}",
                self.factory_id, cd
            )));
        }
        match self.versioned.entry((cd.class_id(), cd.version())) {
            Entry::Occupied(existing) => {
                if **existing.get() == cd {
                    Ok(Arc::clone(existing.get()))
                } else {
                    Err(HazelcastError::Registration(format!(
                        "incompatible class definitions with the same class id: {} vs {}",
                        cd,
                        existing.get()
                    )))
                }
            }
            Entry::Vacant(slot) => {
                debug!(
                    factory_id = cd.factory_id(),
                    class_id = cd.class_id(),
                    version = cd.version(),
                    fields = cd.field_count(),
                    "registered portable class definition"
                );
                let cd = Arc::new(cd);
                slot.insert(Arc::clone(&cd));
                Ok(cd)
            }
        }
    }

    fn set_class_version(&self, class_id: i32, version: i32) -> Result<()> {
        let current = *self.current_versions.entry(class_id).or_insert(version);
        if current != version {
            return Err(HazelcastError::Registration(format!(
                "class id {} of factory {} is already registered with version {}, not {}",
                class_id, self.factory_id, current, version
            )));
        }
        Ok(())
    }
}

/// Process-wide cache of portable class definitions, one bucket per factory.
///
/// Entries are only ever added; [`PortableContext::clear`] empties the whole
/// context when the owning service is disposed.
#[derive(Debug)]
pub struct PortableContext {
    portable_version: i32,
    factories: DashMap<i32, Arc<FactoryDefinitions>>,
}

impl PortableContext {
    /// Creates an empty context using `portable_version` for unversioned
    /// classes.
    pub fn new(portable_version: i32) -> Self {
        Self {
            portable_version,
            factories: DashMap::new(),
        }
    }

    /// Returns the default portable version.
    pub fn portable_version(&self) -> i32 {
        self.portable_version
    }

    fn factory(&self, factory_id: i32) -> Arc<FactoryDefinitions> {
        Arc::clone(
            &self
                .factories
                .entry(factory_id)
                .or_insert_with(|| Arc::new(FactoryDefinitions::new(factory_id))),
        )
    }

    /// Returns the version a value is written with.
    pub fn version_of(&self, portable: &dyn Portable) -> i32 {
        portable.class_version().unwrap_or(self.portable_version)
    }

    /// Looks up a cached definition.
    pub fn lookup(&self, factory_id: i32, class_id: i32, version: i32) -> Option<Arc<ClassDefinition>> {
        let factory = self.factories.get(&factory_id)?;
        let cd = factory.versioned.get(&(class_id, version))?;
        Some(Arc::clone(&cd))
    }

    /// Registers a definition. Unversioned definitions get the default
    /// version; registering an equal definition again returns the cached one.
    pub fn register(&self, cd: ClassDefinition) -> Result<Arc<ClassDefinition>> {
        let cd = cd.with_version_if_unset(self.portable_version);
        self.factory(cd.factory_id()).register(cd)
    }

    /// Returns the version pinned for a class, if any.
    pub fn class_version(&self, factory_id: i32, class_id: i32) -> Option<i32> {
        let factory = self.factories.get(&factory_id)?;
        let version = factory.current_versions.get(&class_id)?;
        Some(*version)
    }

    /// Pins the version of a class; a different version for the same class
    /// is a registration conflict.
    pub fn set_class_version(&self, factory_id: i32, class_id: i32, version: i32) -> Result<()> {
        self.factory(factory_id).set_class_version(class_id, version)
    }

    /// Returns the definition of `portable`, deriving and registering it from
    /// the value's own write logic when it is not cached yet.
    ///
    /// The value's version is pinned for its class; writing another version
    /// of the same class afterwards is a registration conflict.
    pub fn lookup_or_register(&self, portable: &dyn Portable) -> Result<Arc<ClassDefinition>> {
        let version = self.version_of(portable);
        self.set_class_version(portable.factory_id(), portable.class_id(), version)?;
        if let Some(cd) = self.lookup(portable.factory_id(), portable.class_id(), version) {
            return Ok(cd);
        }
        let builder =
            ClassDefinitionBuilder::with_version(portable.factory_id(), portable.class_id(), version);
        let mut writer = ClassDefinitionWriter::new(self, builder);
        portable.write_portable(&mut writer)?;
        writer.register_and_get()
    }

    /// Rebuilds the definition of the payload at `position` from the wire and
    /// registers it unless a nested portable left its shape incomplete.
    pub fn read_class_definition(
        &self,
        input: &ObjectDataInput<'_>,
        position: usize,
        factory_id: i32,
        class_id: i32,
        version: i32,
    ) -> Result<Arc<ClassDefinition>> {
        let discovered = discover_class_definition(input, position, factory_id, class_id, version)?;
        debug!(factory_id, class_id, version, "discovered portable class definition from the wire");
        self.register_discovered(discovered)
    }

    /// Registers a discovered definition and its nested definitions.
    pub fn register_discovered(
        &self,
        discovered: DiscoveredClassDefinition,
    ) -> Result<Arc<ClassDefinition>> {
        for child in &discovered.nested {
            child.for_each_nested_first(&mut |d| {
                if d.registrable {
                    self.register(d.definition.clone())?;
                }
                Ok(())
            })?;
        }
        if discovered.registrable {
            self.register(discovered.definition)
        } else {
            warn!(
                factory_id = discovered.definition.factory_id(),
                class_id = discovered.definition.class_id(),
                version = discovered.definition.version(),
                "not caching class definition discovered with null nested portables"
            );
            Ok(Arc::new(discovered.definition))
        }
    }

    /// Returns the number of cached definitions.
    pub fn definition_count(&self) -> usize {
        self.factories.iter().map(|f| f.versioned.len()).sum()
    }

    /// Drops every cached definition and pinned version.
    pub fn clear(&self) {
        self.factories.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::portable::{PortableReader, PortableWriter};
    use crate::serialization::HazelcastObject;

    fn person(version: i32) -> ClassDefinition {
        ClassDefinitionBuilder::with_version(1, 5, version)
            .add_int_field("id")
            .unwrap()
            .add_string_field("name")
            .unwrap()
            .build()
    }

    #[derive(Debug, Default)]
    struct Person {
        id: i32,
        name: String,
    }

    impl HazelcastObject for Person {
        fn as_portable(&self) -> Option<&dyn Portable> {
            Some(self)
        }
    }

    impl Portable for Person {
        fn factory_id(&self) -> i32 {
            1
        }

        fn class_id(&self) -> i32 {
            5
        }

        fn write_portable(&self, writer: &mut dyn PortableWriter) -> Result<()> {
            writer.write_int("id", self.id)?;
            writer.write_string("name", Some(self.name.as_str()))
        }

        fn read_portable(&mut self, reader: &mut dyn PortableReader) -> Result<()> {
            self.id = reader.read_int("id")?;
            self.name = reader.read_string("name")?.unwrap_or_default();
            Ok(())
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let ctx = PortableContext::new(0);
        let cd = ctx.register(person(0)).unwrap();
        let found = ctx.lookup(1, 5, 0).unwrap();
        assert!(Arc::ptr_eq(&cd, &found));
        assert!(ctx.lookup(1, 5, 1).is_none());
        assert!(ctx.lookup(2, 5, 0).is_none());
    }

    #[test]
    fn test_register_assigns_default_version() {
        let ctx = PortableContext::new(3);
        let cd = ClassDefinitionBuilder::new(1, 9).add_int_field("x").unwrap().build();
        let registered = ctx.register(cd).unwrap();
        assert_eq!(registered.version(), 3);
        assert!(ctx.lookup(1, 9, 3).is_some());
    }

    #[test]
    fn test_register_equal_definition_returns_cached() {
        let ctx = PortableContext::new(0);
        let first = ctx.register(person(0)).unwrap();
        let second = ctx.register(person(0)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(ctx.definition_count(), 1);
    }

    #[test]
    fn test_register_conflicting_definition_fails() {
        let ctx = PortableContext::new(0);
        ctx.register(person(0)).unwrap();
        let conflicting = ClassDefinitionBuilder::with_version(1, 5, 0)
            .add_long_field("id")
            .unwrap()
            .build();
        assert!(matches!(
            ctx.register(conflicting),
            Err(HazelcastError::Registration(_))
        ));
    }

    #[test]
    fn test_different_versions_coexist() {
        let ctx = PortableContext::new(0);
        ctx.register(person(0)).unwrap();
        ctx.register(person(1)).unwrap();
        assert_eq!(ctx.definition_count(), 2);
    }

    #[test]
    fn test_class_version_pinning() {
        let ctx = PortableContext::new(0);
        assert_eq!(ctx.class_version(1, 5), None);
        ctx.set_class_version(1, 5, 2).unwrap();
        ctx.set_class_version(1, 5, 2).unwrap();
        assert_eq!(ctx.class_version(1, 5), Some(2));
        let err = ctx.set_class_version(1, 5, 3).unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn test_lookup_or_register_derives_definition() {
        let ctx = PortableContext::new(0);
        let cd = ctx.lookup_or_register(&Person::default()).unwrap();
        assert_eq!(*cd, person(0));
        let again = ctx.lookup_or_register(&Person::default()).unwrap();
        assert!(Arc::ptr_eq(&cd, &again));
        assert_eq!(ctx.class_version(1, 5), Some(0));
    }

    #[test]
    fn test_register_discovered_skips_provisional() {
        let ctx = PortableContext::new(0);
        let discovered = DiscoveredClassDefinition {
            definition: person(0),
            nested: Vec::new(),
            registrable: false,
        };
        let cd = ctx.register_discovered(discovered).unwrap();
        assert_eq!(cd.class_id(), 5);
        assert!(ctx.lookup(1, 5, 0).is_none());
    }

    #[test]
    fn test_register_discovered_registers_nested() {
        let ctx = PortableContext::new(0);
        let address = ClassDefinitionBuilder::with_version(1, 6, 0)
            .add_string_field("city")
            .unwrap()
            .build();
        let discovered = DiscoveredClassDefinition {
            definition: person(0),
            nested: vec![DiscoveredClassDefinition {
                definition: address,
                nested: Vec::new(),
                registrable: true,
            }],
            registrable: true,
        };
        ctx.register_discovered(discovered).unwrap();
        assert!(ctx.lookup(1, 5, 0).is_some());
        assert!(ctx.lookup(1, 6, 0).is_some());
    }

    #[test]
    fn test_clear() {
        let ctx = PortableContext::new(0);
        ctx.register(person(0)).unwrap();
        ctx.set_class_version(1, 5, 0).unwrap();
        ctx.clear();
        assert_eq!(ctx.definition_count(), 0);
        assert_eq!(ctx.class_version(1, 5), None);
    }
}
