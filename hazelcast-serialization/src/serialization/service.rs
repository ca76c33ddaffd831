//! The serialization service: codec registry, dispatch and blob framing.

use std::any::{Any, TypeId};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace, warn};

use super::builtin::{constant_serializers, NULL_TYPE_ID};
use super::compact::{Compact, CompactSerializer, SchemaFetch, SchemaFetcher, SchemaRegistry};
use super::compact::COMPACT_TYPE_ID;
use super::data::DATA_OFFSET;
use super::identified::{
    FactoryRegistry, IdentifiedDataSerializable, IdentifiedDataSerializer,
    IDENTIFIED_DATA_SERIALIZABLE_TYPE_ID,
};
use super::object::concrete_type_id;
use super::pool::BufferPool;
use super::portable::{
    ClassDefinition, Portable, PortableContext, PortableFactory, PortableSerializer,
    PORTABLE_TYPE_ID,
};
use super::{
    ByteOrder, Data, DataInput, DataOutput, HazelcastObject, ObjectDataInput, ObjectDataOutput,
    Serializer,
};
use crate::config::{GlobalSerializerConfig, SerializationConfig};
use crate::error::{HazelcastError, Result};
use crate::partition::{same_object, NoPartitioningStrategy, PartitioningStrategy};

/// The codec chosen for a value on the write path.
enum SerializerAdapter<'v> {
    Identified(&'v dyn IdentifiedDataSerializable),
    Portable(&'v dyn Portable),
    Compact(&'v dyn Compact),
    Stream(Arc<dyn Serializer>),
}

impl SerializerAdapter<'_> {
    fn type_id(&self) -> i32 {
        match self {
            Self::Identified(_) => IDENTIFIED_DATA_SERIALIZABLE_TYPE_ID,
            Self::Portable(_) => PORTABLE_TYPE_ID,
            Self::Compact(_) => COMPACT_TYPE_ID,
            Self::Stream(serializer) => serializer.wire_type_id(),
        }
    }
}

/// Result of [`SerializationService::try_to_object`].
#[derive(Debug)]
pub enum DeserializeOutcome {
    /// The decoded value, `None` for a serialized null.
    Value(Option<Box<dyn Any + Send + Sync>>),
    /// The blob references a compact schema this process does not know.
    /// Resolve the fetch, then decode again.
    MissingSchema(SchemaFetch),
}

fn same_serializer(a: &Arc<dyn Serializer>, b: &Arc<dyn Serializer>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Converts values to [`Data`] blobs and back.
///
/// Built once from a [`SerializationConfig`] and shared between threads.
/// Registries only grow; [`SerializationService::dispose`] clears them.
///
/// # Example
///
/// ```ignore
/// let service = SerializationService::new(SerializationConfig::default())?;
/// let data = service.to_data(&"hello".to_string())?;
/// let value: Option<String> = service.to_object_as(&data)?;
/// ```
pub struct SerializationService {
    byte_order: ByteOrder,
    pool: BufferPool,
    portable: PortableSerializer,
    identified: IdentifiedDataSerializer,
    compact: CompactSerializer,
    schema_fetcher: Option<Arc<dyn SchemaFetcher>>,
    constants: DashMap<TypeId, Arc<dyn Serializer>>,
    custom: DashMap<TypeId, Arc<dyn Serializer>>,
    lookup_cache: DashMap<TypeId, Arc<dyn Serializer>>,
    by_id: DashMap<i32, Arc<dyn Serializer>>,
    legacy: Option<Arc<dyn Serializer>>,
    global: Option<GlobalSerializerConfig>,
    strategy: Arc<dyn PartitioningStrategy>,
}

impl fmt::Debug for SerializationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializationService")
            .field("byte_order", &self.byte_order)
            .field("portable", &self.portable)
            .field("identified", &self.identified)
            .field("compact", &self.compact)
            .field("constants", &self.constants.len())
            .field("custom", &self.custom.len())
            .field("legacy", &self.legacy.is_some())
            .field("global", &self.global.is_some())
            .finish()
    }
}

impl SerializationService {
    /// Builds a service from `config`, registering every configured factory,
    /// class definition and serializer.
    pub fn new(config: SerializationConfig) -> Result<Self> {
        let portable = PortableSerializer::new(
            config.portable_version(),
            portable_factories(config.portable_factories())?,
        );
        if config.check_class_def_errors() {
            check_class_definitions(config.class_definitions())?;
        }
        portable.register_class_definitions(config.class_definitions().iter().cloned())?;

        let factories = FactoryRegistry::new();
        for (factory_id, factory) in config.data_serializable_factories() {
            factories.register(*factory_id, Arc::clone(factory))?;
        }

        let schemas = Arc::new(SchemaRegistry::new());
        let compact = CompactSerializer::new(schemas, config.compact_factories().iter().cloned());

        let service = Self {
            byte_order: config.byte_order(),
            pool: BufferPool::new(config.buffer_initial_capacity(), config.max_pooled_buffers()),
            portable,
            identified: IdentifiedDataSerializer::new(factories),
            compact,
            schema_fetcher: config.schema_fetcher().cloned(),
            constants: DashMap::new(),
            custom: DashMap::new(),
            lookup_cache: DashMap::new(),
            by_id: DashMap::new(),
            legacy: config
                .legacy_fallback()
                .then(|| config.legacy_serializer().cloned())
                .flatten(),
            global: config.global_serializer().cloned(),
            strategy: Arc::clone(config.partitioning_strategy()),
        };

        for (type_id, serializer) in constant_serializers() {
            service.register_constant(type_id, serializer)?;
        }
        for (type_id, serializer) in config.custom_serializers() {
            service.register_custom(*type_id, Arc::clone(serializer))?;
        }
        if let Some(legacy) = &service.legacy {
            service.register_id(Arc::clone(legacy))?;
        }
        if let Some(global) = &service.global {
            service.register_id(Arc::clone(global.serializer()))?;
        }
        debug!(
            byte_order = ?service.byte_order,
            portable_version = config.portable_version(),
            "serialization service created"
        );
        Ok(service)
    }

    /// Returns the byte order of payloads.
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Returns the portable class definition cache.
    pub fn portable_context(&self) -> &PortableContext {
        self.portable.context()
    }

    /// Returns the compact schema registry.
    pub fn schema_registry(&self) -> &Arc<SchemaRegistry> {
        self.compact.registry()
    }

    /// Serializes `value`, taking the partition key from the configured
    /// strategy.
    pub fn to_data(&self, value: &dyn HazelcastObject) -> Result<Data> {
        self.to_data_with_strategy(value, self.strategy.as_ref())
    }

    /// Serializes `value`, taking the partition key from `strategy`.
    pub fn to_data_with_strategy(
        &self,
        value: &dyn HazelcastObject,
        strategy: &dyn PartitioningStrategy,
    ) -> Result<Data> {
        let adapter = self.serializer_for(value)?;
        let type_id = adapter.type_id();
        let mut out = self.output();
        out.write_int_with_order(0, ByteOrder::BigEndian)?;
        out.write_int_with_order(type_id, ByteOrder::BigEndian)?;
        self.write_payload(&mut out, &adapter, value)
            .map_err(|e| {
                e.with_context(|| {
                    format!(
                        "failed to serialize {} with type id {}",
                        value.concrete_type_name(),
                        type_id
                    )
                })
            })?;
        let partition_hash = self.partition_hash(value, strategy)?;
        out.write_int_at_with_order(0, partition_hash, ByteOrder::BigEndian)?;
        Data::new(out.as_bytes().to_vec())
    }

    /// Deserializes a blob. A serialized null yields `None`.
    pub fn to_object(&self, data: &Data) -> Result<Option<Box<dyn Any + Send + Sync>>> {
        if data.as_bytes().is_empty() {
            return Ok(None);
        }
        let type_id = data.type_id();
        let mut input = ObjectDataInput::attached(data.as_bytes(), DATA_OFFSET, self.byte_order, self);
        self.read_payload(&mut input, type_id).map_err(|e| {
            e.with_context(|| format!("failed to deserialize data with type id {}", type_id))
        })
    }

    /// Deserializes a blob into a `T`.
    pub fn to_object_as<T: Any>(&self, data: &Data) -> Result<Option<T>> {
        match self.to_object(data)? {
            None => Ok(None),
            Some(value) => value.downcast::<T>().map(|v| Some(*v)).map_err(|_| {
                HazelcastError::Serialization(format!(
                    "data with type id {} does not decode to a {}",
                    data.type_id(),
                    std::any::type_name::<T>()
                ))
            }),
        }
    }

    /// Deserializes a blob, turning a missing compact schema into a
    /// [`SchemaFetch`] the caller can await before decoding again.
    pub fn try_to_object(&self, data: &Data) -> Result<DeserializeOutcome> {
        match self.to_object(data) {
            Ok(value) => Ok(DeserializeOutcome::Value(value)),
            Err(HazelcastError::MissingSchema { schema_id }) => {
                Ok(DeserializeOutcome::MissingSchema(SchemaFetch::new(
                    schema_id,
                    self.schema_fetcher.clone(),
                    Arc::clone(self.compact.registry()),
                )))
            }
            Err(e) => Err(e),
        }
    }

    /// Binds a serializer to `T`, a concrete type or a supertype named by
    /// [`HazelcastObject::interfaces`] or [`HazelcastObject::base_types`].
    ///
    /// The serializer's type id must be positive.
    pub fn register_custom_serializer<T: ?Sized + 'static>(
        &self,
        serializer: Arc<dyn Serializer>,
    ) -> Result<()> {
        self.register_custom(TypeId::of::<T>(), serializer)
    }

    /// Binds a serializer with a non-positive type id to `T`.
    pub fn register_constant_serializer<T: ?Sized + 'static>(
        &self,
        serializer: Arc<dyn Serializer>,
    ) -> Result<()> {
        self.register_constant(TypeId::of::<T>(), serializer)
    }

    /// Clears the class definition cache, cached type lookups, compact
    /// schemas and pooled buffers.
    pub fn dispose(&self) {
        self.portable.context().clear();
        self.compact.registry().clear();
        self.lookup_cache.clear();
        self.pool.clear();
        debug!("serialization service disposed");
    }

    pub(crate) fn write_object(
        &self,
        out: &mut ObjectDataOutput<'_>,
        value: Option<&dyn HazelcastObject>,
    ) -> Result<()> {
        match value {
            None => out.write_int(NULL_TYPE_ID),
            Some(value) => {
                let adapter = self.serializer_for(value)?;
                out.write_int(adapter.type_id())?;
                self.write_payload(out, &adapter, value)
            }
        }
    }

    pub(crate) fn read_object(
        &self,
        input: &mut ObjectDataInput<'_>,
    ) -> Result<Option<Box<dyn Any + Send + Sync>>> {
        let type_id = input.read_int()?;
        self.read_payload(input, type_id)
    }

    fn output(&self) -> ObjectDataOutput<'_> {
        ObjectDataOutput::attached(self.pool.take(), self.byte_order, self, &self.pool)
    }

    fn register_custom(&self, type_id: TypeId, serializer: Arc<dyn Serializer>) -> Result<()> {
        if serializer.wire_type_id() <= 0 {
            return Err(HazelcastError::Registration(format!(
                "custom serializer type id must be positive, got {}",
                serializer.wire_type_id()
            )));
        }
        self.bind_type(&self.custom, type_id, &serializer)?;
        self.register_id(serializer)
    }

    fn register_constant(&self, type_id: TypeId, serializer: Arc<dyn Serializer>) -> Result<()> {
        if serializer.wire_type_id() > 0 {
            return Err(HazelcastError::Registration(format!(
                "constant serializer type id must not be positive, got {}",
                serializer.wire_type_id()
            )));
        }
        self.bind_type(&self.constants, type_id, &serializer)?;
        self.register_id(serializer)
    }

    fn bind_type(
        &self,
        map: &DashMap<TypeId, Arc<dyn Serializer>>,
        type_id: TypeId,
        serializer: &Arc<dyn Serializer>,
    ) -> Result<()> {
        match map.entry(type_id) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                if same_serializer(existing.get(), serializer) {
                    Ok(())
                } else {
                    Err(HazelcastError::Registration(format!(
                        "a different serializer is already registered for this type (type id {})",
                        existing.get().wire_type_id()
                    )))
                }
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                debug!(type_id = serializer.wire_type_id(), "registered serializer");
                slot.insert(Arc::clone(serializer));
                Ok(())
            }
        }
    }

    fn register_id(&self, serializer: Arc<dyn Serializer>) -> Result<()> {
        let id = serializer.wire_type_id();
        match self.by_id.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                if same_serializer(existing.get(), &serializer) {
                    Ok(())
                } else {
                    Err(HazelcastError::Registration(format!(
                        "a different serializer is already registered for type id {}",
                        id
                    )))
                }
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(serializer);
                Ok(())
            }
        }
    }

    fn serializer_for<'v>(&self, value: &'v dyn HazelcastObject) -> Result<SerializerAdapter<'v>> {
        if let Some(identified) = value.as_identified() {
            return Ok(SerializerAdapter::Identified(identified));
        }
        if let Some(portable) = value.as_portable() {
            return Ok(SerializerAdapter::Portable(portable));
        }
        let type_id = concrete_type_id(value);
        if let Some(serializer) = self.constants.get(&type_id) {
            return Ok(SerializerAdapter::Stream(Arc::clone(&serializer)));
        }
        if let Some(serializer) = self.lookup_custom(value, type_id) {
            return Ok(SerializerAdapter::Stream(serializer));
        }
        let global_overrides = self.global.as_ref().is_some_and(|g| g.override_legacy());
        if let (Some(legacy), false) = (&self.legacy, global_overrides) {
            return Ok(SerializerAdapter::Stream(Arc::clone(legacy)));
        }
        if let Some(global) = &self.global {
            return Ok(SerializerAdapter::Stream(Arc::clone(global.serializer())));
        }
        if let Some(compact) = value.as_compact() {
            return Ok(SerializerAdapter::Compact(compact));
        }
        Err(HazelcastError::Serialization(format!(
            "there is no suitable serializer for {}",
            value.concrete_type_name()
        )))
    }

    fn lookup_custom(&self, value: &dyn HazelcastObject, type_id: TypeId) -> Option<Arc<dyn Serializer>> {
        if let Some(serializer) = self.custom.get(&type_id) {
            return Some(Arc::clone(&serializer));
        }
        if let Some(serializer) = self.lookup_cache.get(&type_id) {
            return Some(Arc::clone(&serializer));
        }
        let found = value
            .interfaces()
            .into_iter()
            .chain(value.base_types())
            .find_map(|supertype| self.custom.get(&supertype).map(|s| Arc::clone(&s)))?;
        trace!(
            type_name = value.concrete_type_name(),
            type_id = found.wire_type_id(),
            "cached serializer found through a supertype"
        );
        Some(Arc::clone(&*self.lookup_cache.entry(type_id).or_insert(found)))
    }

    fn serializer_by_id(&self, type_id: i32) -> Result<Arc<dyn Serializer>> {
        self.by_id
            .get(&type_id)
            .map(|s| Arc::clone(&s))
            .ok_or_else(|| {
                let space = if type_id > 0 { "custom" } else { "built-in" };
                HazelcastError::Serialization(format!(
                    "there is no {} serializer registered for type id {}",
                    space, type_id
                ))
            })
    }

    fn write_payload(
        &self,
        out: &mut ObjectDataOutput<'_>,
        adapter: &SerializerAdapter<'_>,
        value: &dyn HazelcastObject,
    ) -> Result<()> {
        match adapter {
            SerializerAdapter::Identified(identified) => self.identified.write(out, *identified),
            SerializerAdapter::Portable(portable) => self.portable.write(out, *portable),
            SerializerAdapter::Compact(compact) => self.compact.write(out, *compact),
            SerializerAdapter::Stream(serializer) => serializer.write(out, value),
        }
    }

    fn read_payload(
        &self,
        input: &mut ObjectDataInput<'_>,
        type_id: i32,
    ) -> Result<Option<Box<dyn Any + Send + Sync>>> {
        let value = match type_id {
            NULL_TYPE_ID => return Ok(None),
            PORTABLE_TYPE_ID => self.portable.read(input)?.into_any(),
            IDENTIFIED_DATA_SERIALIZABLE_TYPE_ID => self.identified.read(input)?.into_any(),
            COMPACT_TYPE_ID => self.compact.read(input)?.into_any(),
            _ => self.serializer_by_id(type_id)?.read(input)?,
        };
        Ok(Some(value))
    }

    fn partition_hash(
        &self,
        value: &dyn HazelcastObject,
        strategy: &dyn PartitioningStrategy,
    ) -> Result<i32> {
        match strategy.partition_key(value) {
            Some(key) if !same_object(key, value) => {
                let key_data = self.to_data_with_strategy(key, &NoPartitioningStrategy)?;
                Ok(key_data.partition_hash())
            }
            _ => Ok(0),
        }
    }
}

fn portable_factories(
    factories: &[Arc<dyn PortableFactory>],
) -> Result<HashMap<i32, Arc<dyn PortableFactory>>> {
    let mut by_id: HashMap<i32, Arc<dyn PortableFactory>> = HashMap::new();
    for factory in factories {
        match by_id.entry(factory.factory_id()) {
            Entry::Occupied(existing) => {
                let same = std::ptr::eq(
                    Arc::as_ptr(existing.get()) as *const (),
                    Arc::as_ptr(factory) as *const (),
                );
                if !same {
                    return Err(HazelcastError::Registration(format!(
                        "a different portable factory is already registered for factory id {}",
                        factory.factory_id()
                    )));
                }
                warn!(factory_id = factory.factory_id(), "portable factory registered twice, ignoring");
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(factory));
            }
        }
    }
    Ok(by_id)
}

/// Fails if a configured definition has a nested portable field whose class
/// is not configured as well.
fn check_class_definitions(definitions: &[ClassDefinition]) -> Result<()> {
    for cd in definitions {
        let nested = cd
            .fields()
            .iter()
            .filter(|f| f.field_type().is_portable());
        for field in nested {
            let known = definitions
                .iter()
                .any(|d| d.factory_id() == field.factory_id() && d.class_id() == field.class_id());
            if !known {
                return Err(HazelcastError::Serialization(format!(
                    "could not find registered class definition for factory id {}, class id {} (field '{}' of {})",
                    field.factory_id(),
                    field.class_id(),
                    field.name(),
                    cd
                )));
            }
        }
    }
    Ok(())
}
