//! Configuration for the serialization service.
//!
//! Scalar options can also come from environment variables
//! ([`SerializationConfigBuilder::from_env`]) and, with the `config-file`
//! feature, from TOML files.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use crate::error::HazelcastError;
use crate::partition::{DefaultPartitioningStrategy, PartitioningStrategy};
use crate::serialization::{
    ByteOrder, ClassDefinition, CompactFactory, DataSerializableFactory, PortableFactory,
    SchemaFetcher, Serializer,
};

/// Default initial capacity of pooled output buffers.
pub const DEFAULT_BUFFER_INITIAL_CAPACITY: usize = 4 * 1024;

/// Default number of idle output buffers kept for reuse.
pub const DEFAULT_MAX_POOLED_BUFFERS: usize = 3;

/// Environment variable overriding the default portable version.
pub const ENV_PORTABLE_VERSION: &str = "HZ_SERIALIZATION_PORTABLE_VERSION";

/// Environment variable overriding the byte order
/// (`big-endian`, `little-endian` or `native`).
pub const ENV_BYTE_ORDER: &str = "HZ_SERIALIZATION_BYTE_ORDER";

/// Error returned when configuration validation fails.
#[derive(Debug, Clone)]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for HazelcastError {
    fn from(err: ConfigError) -> Self {
        HazelcastError::Configuration(err.message)
    }
}

/// Parses a byte order name as used in configuration files and the
/// environment.
pub fn parse_byte_order(value: &str) -> Result<ByteOrder, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "big-endian" | "big_endian" | "be" => Ok(ByteOrder::BigEndian),
        "little-endian" | "little_endian" | "le" => Ok(ByteOrder::LittleEndian),
        "native" => Ok(ByteOrder::native()),
        other => Err(ConfigError::new(format!("unknown byte order '{}'", other))),
    }
}

/// Serializer used for values no other codec handles.
#[derive(Clone)]
pub struct GlobalSerializerConfig {
    serializer: Arc<dyn Serializer>,
    override_legacy: bool,
}

impl GlobalSerializerConfig {
    /// Returns the serializer.
    pub fn serializer(&self) -> &Arc<dyn Serializer> {
        &self.serializer
    }

    /// Returns true if the global serializer takes precedence over the
    /// legacy fallback.
    pub fn override_legacy(&self) -> bool {
        self.override_legacy
    }
}

/// Validated configuration of a
/// [`SerializationService`](crate::serialization::SerializationService).
#[derive(Clone)]
pub struct SerializationConfig {
    byte_order: ByteOrder,
    portable_version: i32,
    check_class_def_errors: bool,
    legacy_fallback: bool,
    legacy_serializer: Option<Arc<dyn Serializer>>,
    global_serializer: Option<GlobalSerializerConfig>,
    data_serializable_factories: Vec<(i32, Arc<dyn DataSerializableFactory>)>,
    portable_factories: Vec<Arc<dyn PortableFactory>>,
    class_definitions: Vec<ClassDefinition>,
    custom_serializers: Vec<(TypeId, Arc<dyn Serializer>)>,
    compact_factories: Vec<Arc<dyn CompactFactory>>,
    partitioning_strategy: Arc<dyn PartitioningStrategy>,
    schema_fetcher: Option<Arc<dyn SchemaFetcher>>,
    buffer_initial_capacity: usize,
    max_pooled_buffers: usize,
}

impl SerializationConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> SerializationConfigBuilder {
        SerializationConfigBuilder::new()
    }

    /// Returns the byte order of payloads.
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Returns the default version of portable classes.
    pub fn portable_version(&self) -> i32 {
        self.portable_version
    }

    /// Returns true if configured class definitions are checked for
    /// unregistered nested definitions.
    pub fn check_class_def_errors(&self) -> bool {
        self.check_class_def_errors
    }

    /// Returns true if the legacy whole-object fallback is enabled.
    pub fn legacy_fallback(&self) -> bool {
        self.legacy_fallback
    }

    /// Returns the legacy fallback serializer.
    pub fn legacy_serializer(&self) -> Option<&Arc<dyn Serializer>> {
        self.legacy_serializer.as_ref()
    }

    /// Returns the global serializer.
    pub fn global_serializer(&self) -> Option<&GlobalSerializerConfig> {
        self.global_serializer.as_ref()
    }

    /// Returns the identified data factories by factory id.
    pub fn data_serializable_factories(&self) -> &[(i32, Arc<dyn DataSerializableFactory>)] {
        &self.data_serializable_factories
    }

    /// Returns the portable factories.
    pub fn portable_factories(&self) -> &[Arc<dyn PortableFactory>] {
        &self.portable_factories
    }

    /// Returns the explicitly configured class definitions.
    pub fn class_definitions(&self) -> &[ClassDefinition] {
        &self.class_definitions
    }

    /// Returns the custom serializers with the type they are bound to.
    pub fn custom_serializers(&self) -> &[(TypeId, Arc<dyn Serializer>)] {
        &self.custom_serializers
    }

    /// Returns the compact factories.
    pub fn compact_factories(&self) -> &[Arc<dyn CompactFactory>] {
        &self.compact_factories
    }

    /// Returns the partitioning strategy.
    pub fn partitioning_strategy(&self) -> &Arc<dyn PartitioningStrategy> {
        &self.partitioning_strategy
    }

    /// Returns the schema fetcher.
    pub fn schema_fetcher(&self) -> Option<&Arc<dyn SchemaFetcher>> {
        self.schema_fetcher.as_ref()
    }

    /// Returns the initial capacity of pooled buffers.
    pub fn buffer_initial_capacity(&self) -> usize {
        self.buffer_initial_capacity
    }

    /// Returns the number of idle buffers kept for reuse.
    pub fn max_pooled_buffers(&self) -> usize {
        self.max_pooled_buffers
    }
}

impl Default for SerializationConfig {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::BigEndian,
            portable_version: 0,
            check_class_def_errors: true,
            legacy_fallback: false,
            legacy_serializer: None,
            global_serializer: None,
            data_serializable_factories: Vec::new(),
            portable_factories: Vec::new(),
            class_definitions: Vec::new(),
            custom_serializers: Vec::new(),
            compact_factories: Vec::new(),
            partitioning_strategy: Arc::new(DefaultPartitioningStrategy),
            schema_fetcher: None,
            buffer_initial_capacity: DEFAULT_BUFFER_INITIAL_CAPACITY,
            max_pooled_buffers: DEFAULT_MAX_POOLED_BUFFERS,
        }
    }
}

impl fmt::Debug for SerializationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let factory_ids: Vec<i32> = self
            .data_serializable_factories
            .iter()
            .map(|(id, _)| *id)
            .collect();
        let portable_ids: Vec<i32> = self
            .portable_factories
            .iter()
            .map(|f| f.factory_id())
            .collect();
        f.debug_struct("SerializationConfig")
            .field("byte_order", &self.byte_order)
            .field("portable_version", &self.portable_version)
            .field("check_class_def_errors", &self.check_class_def_errors)
            .field("legacy_fallback", &self.legacy_fallback)
            .field("global_serializer", &self.global_serializer.is_some())
            .field("data_serializable_factories", &factory_ids)
            .field("portable_factories", &portable_ids)
            .field("class_definitions", &self.class_definitions.len())
            .field("custom_serializers", &self.custom_serializers.len())
            .field("compact_factories", &self.compact_factories.len())
            .field("schema_fetcher", &self.schema_fetcher.is_some())
            .field("buffer_initial_capacity", &self.buffer_initial_capacity)
            .field("max_pooled_buffers", &self.max_pooled_buffers)
            .finish()
    }
}

/// Builder for [`SerializationConfig`].
#[derive(Default)]
pub struct SerializationConfigBuilder {
    config: SerializationConfig,
}

impl SerializationConfigBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the byte order of payloads. Blob headers are always big-endian.
    pub fn byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.config.byte_order = byte_order;
        self
    }

    /// Uses the byte order of the running platform.
    pub fn use_native_byte_order(self) -> Self {
        self.byte_order(ByteOrder::native())
    }

    /// Sets the default version of portable classes.
    pub fn portable_version(mut self, version: i32) -> Self {
        self.config.portable_version = version;
        self
    }

    /// Enables or disables the nested definition check of configured class
    /// definitions.
    pub fn check_class_def_errors(mut self, check: bool) -> Self {
        self.config.check_class_def_errors = check;
        self
    }

    /// Enables or disables the legacy whole-object fallback.
    pub fn enable_legacy_fallback(mut self, enabled: bool) -> Self {
        self.config.legacy_fallback = enabled;
        self
    }

    /// Sets the serializer used by the legacy fallback.
    pub fn legacy_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.config.legacy_serializer = Some(serializer);
        self
    }

    /// Sets the serializer for values no other codec handles.
    ///
    /// With `override_legacy`, it is also tried before the legacy fallback.
    pub fn global_serializer(mut self, serializer: Arc<dyn Serializer>, override_legacy: bool) -> Self {
        self.config.global_serializer = Some(GlobalSerializerConfig {
            serializer,
            override_legacy,
        });
        self
    }

    /// Adds an identified data factory.
    pub fn add_data_serializable_factory(
        mut self,
        factory_id: i32,
        factory: Arc<dyn DataSerializableFactory>,
    ) -> Self {
        self.config
            .data_serializable_factories
            .push((factory_id, factory));
        self
    }

    /// Adds a portable factory.
    pub fn add_portable_factory(mut self, factory: Arc<dyn PortableFactory>) -> Self {
        self.config.portable_factories.push(factory);
        self
    }

    /// Adds a class definition, for portable classes whose values may be
    /// null or empty when they are first written.
    pub fn add_class_definition(mut self, definition: ClassDefinition) -> Self {
        self.config.class_definitions.push(definition);
        self
    }

    /// Adds a serializer for `T`, which may be a concrete type, a trait
    /// object type or a marker type named in
    /// [`HazelcastObject::interfaces`](crate::serialization::HazelcastObject::interfaces)
    /// or [`HazelcastObject::base_types`](crate::serialization::HazelcastObject::base_types).
    pub fn add_custom_serializer<T: ?Sized + 'static>(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.config
            .custom_serializers
            .push((TypeId::of::<T>(), serializer));
        self
    }

    /// Adds a compact factory.
    pub fn add_compact_factory(mut self, factory: Arc<dyn CompactFactory>) -> Self {
        self.config.compact_factories.push(factory);
        self
    }

    /// Sets the partitioning strategy.
    pub fn partitioning_strategy(mut self, strategy: Arc<dyn PartitioningStrategy>) -> Self {
        self.config.partitioning_strategy = strategy;
        self
    }

    /// Sets the source of schemas unknown to this process.
    pub fn schema_fetcher(mut self, fetcher: Arc<dyn SchemaFetcher>) -> Self {
        self.config.schema_fetcher = Some(fetcher);
        self
    }

    /// Sets the initial capacity of pooled buffers.
    pub fn buffer_initial_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_initial_capacity = capacity;
        self
    }

    /// Sets the number of idle buffers kept for reuse.
    pub fn max_pooled_buffers(mut self, max: usize) -> Self {
        self.config.max_pooled_buffers = max;
        self
    }

    /// Creates a builder with overrides from the process environment.
    ///
    /// | Variable | Maps to |
    /// |----------|---------|
    /// | `HZ_SERIALIZATION_PORTABLE_VERSION` | `portable_version` |
    /// | `HZ_SERIALIZATION_BYTE_ORDER` | `byte_order` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`, keyed by environment variable name.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_PORTABLE_VERSION) {
            let version = value.trim().parse::<i32>().map_err(|e| {
                ConfigError::new(format!("invalid {}: {}", ENV_PORTABLE_VERSION, e))
            })?;
            self = self.portable_version(version);
        }
        if let Some(value) = lookup(ENV_BYTE_ORDER) {
            self = self.byte_order(parse_byte_order(&value)?);
        }
        Ok(self)
    }

    /// Builds the configuration, returning an error if validation fails.
    pub fn build(self) -> Result<SerializationConfig, ConfigError> {
        let config = self.config;
        if config.portable_version < 0 {
            return Err(ConfigError::new(format!(
                "portable_version must not be negative, got {}",
                config.portable_version
            )));
        }
        if config.buffer_initial_capacity == 0 {
            return Err(ConfigError::new("buffer_initial_capacity must be positive"));
        }
        if config.legacy_fallback && config.legacy_serializer.is_none() {
            return Err(ConfigError::new(
                "the legacy fallback is enabled but no legacy serializer is set",
            ));
        }
        for (id, _) in &config.data_serializable_factories {
            if *id <= 0 {
                return Err(ConfigError::new(format!(
                    "data serializable factory id must be positive, got {}",
                    id
                )));
            }
        }
        for (_, serializer) in &config.custom_serializers {
            if serializer.wire_type_id() <= 0 {
                return Err(ConfigError::new(format!(
                    "custom serializer type id must be positive, got {}",
                    serializer.wire_type_id()
                )));
            }
        }
        Ok(config)
    }
}
