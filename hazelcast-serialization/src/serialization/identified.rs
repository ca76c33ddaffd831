//! Factory-created values identified by a (factory id, class id) pair.
//!
//! The payload is `bool identified | i32 factory_id | i32 class_id` followed
//! by whatever the value writes itself, in order and without field names.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};

use super::{DataInput, DataOutput, HazelcastObject};
use crate::error::{HazelcastError, Result};

/// Wire type id of identified values.
pub const IDENTIFIED_DATA_SERIALIZABLE_TYPE_ID: i32 = -2;

/// A value written as its factory id, class id and hand-written fields.
///
/// No class metadata travels with the value, so reader and writer must agree
/// on the field order. The value must also return itself from [`HazelcastObject::as_identified`] to be picked up by the service.
pub trait IdentifiedDataSerializable: HazelcastObject {
    /// Id of the factory that recreates this value.
    fn factory_id(&self) -> i32;

    /// Id of this class inside its factory.
    fn class_id(&self) -> i32;

    /// Writes the fields in a fixed order.
    fn write_data(&self, output: &mut dyn DataOutput) -> Result<()>;

    /// Reads the fields back in the order they were written.
    fn read_data(&mut self, input: &mut dyn DataInput) -> Result<()>;
}

/// Creates empty identified values for one factory id.
pub trait DataSerializableFactory: Send + Sync {
    /// An empty value for `class_id`, or `None` when the factory does not
    /// know the class.
    fn create(&self, class_id: i32) -> Option<Box<dyn IdentifiedDataSerializable>>;
}

fn same_factory(a: &Arc<dyn DataSerializableFactory>, b: &Arc<dyn DataSerializableFactory>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Identified factories keyed by factory id.
///
/// Safe to share between threads. Entries are never replaced; only
/// [`FactoryRegistry::clear`] removes them.
#[derive(Default)]
pub struct FactoryRegistry {
    factories: DashMap<i32, Arc<dyn DataSerializableFactory>>,
}

impl std::fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<i32> = self.factories.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        f.debug_struct("FactoryRegistry").field("factory_ids", &ids).finish()
    }
}

impl FactoryRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `factory` under `factory_id`.
    ///
    /// Registering the same factory instance again is a no-op; binding a
    /// different factory to an id already in use is a registration error.
    pub fn register(&self, factory_id: i32, factory: Arc<dyn DataSerializableFactory>) -> Result<()> {
        match self.factories.entry(factory_id) {
            Entry::Occupied(existing) => {
                if same_factory(existing.get(), &factory) {
                    warn!(factory_id, "data serializable factory registered twice, ignoring");
                    Ok(())
                } else {
                    Err(HazelcastError::Registration(format!(
                        "a different data serializable factory is already registered for factory id {}",
                        factory_id
                    )))
                }
            }
            Entry::Vacant(slot) => {
                debug!(factory_id, "registered data serializable factory");
                slot.insert(factory);
                Ok(())
            }
        }
    }

    /// The factory registered under `factory_id`.
    pub fn get(&self, factory_id: i32) -> Option<Arc<dyn DataSerializableFactory>> {
        self.factories.get(&factory_id).map(|f| Arc::clone(&f))
    }

    /// Asks the factory registered under `factory_id` for an empty `class_id` value.
    pub fn create(
        &self,
        factory_id: i32,
        class_id: i32,
    ) -> Option<Box<dyn IdentifiedDataSerializable>> {
        self.get(factory_id)?.create(class_id)
    }

    /// True when `factory_id` has a factory.
    pub fn contains(&self, factory_id: i32) -> bool {
        self.factories.contains_key(&factory_id)
    }

    /// Number of factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Removes every factory.
    pub fn clear(&self) {
        self.factories.clear();
    }
}

/// Codec for identified data serializable values.
#[derive(Debug, Default)]
pub struct IdentifiedDataSerializer {
    registry: FactoryRegistry,
}

impl IdentifiedDataSerializer {
    /// Creates a serializer reading through `registry`.
    pub fn new(registry: FactoryRegistry) -> Self {
        Self { registry }
    }

    /// Returns the factory registry.
    pub fn registry(&self) -> &FactoryRegistry {
        &self.registry
    }

    /// Writes the identity header and the value's own data.
    pub fn write(&self, output: &mut dyn DataOutput, value: &dyn IdentifiedDataSerializable) -> Result<()> {
        output.write_bool(true)?;
        output.write_int(value.factory_id())?;
        output.write_int(value.class_id())?;
        value.write_data(output)
    }

    /// Reads an identity header, creates a blank instance through the
    /// registered factory and lets it read its data.
    pub fn read(&self, input: &mut dyn DataInput) -> Result<Box<dyn IdentifiedDataSerializable>> {
        if !input.read_bool()? {
            return Err(HazelcastError::Serialization(
                "only identified data serializable payloads are supported".to_string(),
            ));
        }
        let factory_id = input.read_int()?;
        let class_id = input.read_int()?;
        let factory = self.registry.get(factory_id).ok_or_else(|| {
            HazelcastError::Serialization(format!(
                "no data serializable factory registered for factory id {} (class id {})",
                factory_id, class_id
            ))
        })?;
        let mut value = factory.create(class_id).ok_or_else(|| {
            HazelcastError::Serialization(format!(
                "data serializable factory {} cannot create class id {}",
                factory_id, class_id
            ))
        })?;
        value.read_data(input).map_err(|e| {
            e.with_context(|| {
                format!(
                    "failed to read identified data of class {} (factory {})",
                    class_id, factory_id
                )
            })
        })?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::{ObjectDataInput, ObjectDataOutput};

    const TEST_FACTORY_ID: i32 = 1000;
    const TEST_CLASS_ID: i32 = 1;

    #[derive(Debug, Default, PartialEq)]
    struct TestData {
        value: i32,
        name: String,
    }

    impl HazelcastObject for TestData {
        fn as_identified(&self) -> Option<&dyn IdentifiedDataSerializable> {
            Some(self)
        }
    }

    impl IdentifiedDataSerializable for TestData {
        fn factory_id(&self) -> i32 {
            TEST_FACTORY_ID
        }

        fn class_id(&self) -> i32 {
            TEST_CLASS_ID
        }

        fn write_data(&self, output: &mut dyn DataOutput) -> Result<()> {
            output.write_int(self.value)?;
            output.write_string(Some(self.name.as_str()))
        }

        fn read_data(&mut self, input: &mut dyn DataInput) -> Result<()> {
            self.value = input.read_int()?;
            self.name = input.read_string()?.unwrap_or_default();
            Ok(())
        }
    }

    struct TestFactory;

    impl DataSerializableFactory for TestFactory {
        fn create(&self, class_id: i32) -> Option<Box<dyn IdentifiedDataSerializable>> {
            match class_id {
                TEST_CLASS_ID => Some(Box::new(TestData::default())),
                _ => None,
            }
        }
    }

    fn serializer() -> IdentifiedDataSerializer {
        let registry = FactoryRegistry::new();
        registry.register(TEST_FACTORY_ID, Arc::new(TestFactory)).unwrap();
        IdentifiedDataSerializer::new(registry)
    }

    #[test]
    fn test_type_id_constant() {
        assert_eq!(IDENTIFIED_DATA_SERIALIZABLE_TYPE_ID, -2);
    }

    #[test]
    fn test_round_trip() {
        let serializer = serializer();
        let original = TestData {
            value: 42,
            name: "hz".to_string(),
        };
        let mut output = ObjectDataOutput::new();
        serializer.write(&mut output, &original).unwrap();
        let bytes = output.into_bytes();
        assert_eq!(bytes[0], 1);

        let mut input = ObjectDataInput::new(&bytes);
        let value = serializer.read(&mut input).unwrap();
        let decoded = value.into_any().downcast::<TestData>().unwrap();
        assert_eq!(*decoded, original);
    }

    #[test]
    fn test_unregistered_factory_names_the_id() {
        let serializer = serializer();
        let mut output = ObjectDataOutput::new();
        output.write_bool(true).unwrap();
        output.write_int(99).unwrap();
        output.write_int(1).unwrap();
        let bytes = output.into_bytes();
        let mut input = ObjectDataInput::new(&bytes);
        let err = serializer.read(&mut input).err().unwrap();
        assert!(matches!(err, HazelcastError::Serialization(_)));
        assert!(err.to_string().contains("99"));
    }

    #[test]
    fn test_non_identified_flag_rejected() {
        let bytes = [0u8, 0, 0, 3, 232, 0, 0, 0, 1];
        let mut input = ObjectDataInput::new(&bytes);
        assert!(serializer().read(&mut input).is_err());
    }

    #[test]
    fn test_unknown_class_id_rejected() {
        let serializer = serializer();
        let mut output = ObjectDataOutput::new();
        output.write_bool(true).unwrap();
        output.write_int(TEST_FACTORY_ID).unwrap();
        output.write_int(77).unwrap();
        let bytes = output.into_bytes();
        let mut input = ObjectDataInput::new(&bytes);
        let err = serializer.read(&mut input).err().unwrap();
        assert!(err.to_string().contains("77"));
    }

    #[test]
    fn test_truncated_data_carries_ids() {
        let serializer = serializer();
        let mut output = ObjectDataOutput::new();
        serializer
            .write(
                &mut output,
                &TestData {
                    value: 1,
                    name: "abc".to_string(),
                },
            )
            .unwrap();
        let bytes = output.into_bytes();
        let mut input = ObjectDataInput::new(&bytes[..bytes.len() - 1]);
        let err = serializer.read(&mut input).err().unwrap();
        assert!(matches!(err, HazelcastError::Serialization(_)));
        assert!(err.to_string().contains("factory 1000"));
    }

    #[test]
    fn test_registering_same_factory_twice_is_noop() {
        let registry = FactoryRegistry::new();
        let factory: Arc<dyn DataSerializableFactory> = Arc::new(TestFactory);
        registry.register(1, Arc::clone(&factory)).unwrap();
        registry.register(1, factory).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registering_different_factory_fails() {
        let registry = FactoryRegistry::new();
        registry.register(1, Arc::new(TestFactory)).unwrap();
        let err = registry.register(1, Arc::new(TestFactory)).unwrap_err();
        assert!(matches!(err, HazelcastError::Registration(_)));
    }

    #[test]
    fn test_registry_create_and_clear() {
        let registry = FactoryRegistry::new();
        assert!(registry.is_empty());
        registry.register(TEST_FACTORY_ID, Arc::new(TestFactory)).unwrap();
        assert!(registry.contains(TEST_FACTORY_ID));
        assert!(registry.create(TEST_FACTORY_ID, TEST_CLASS_ID).is_some());
        assert!(registry.create(TEST_FACTORY_ID, 2).is_none());
        assert!(registry.create(5, TEST_CLASS_ID).is_none());
        registry.clear();
        assert!(registry.is_empty());
    }
}
