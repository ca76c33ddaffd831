//! Runtime value model used by the serialization service.
//!
//! Rust has no runtime reflection, so every value handed to the service
//! implements [`HazelcastObject`]. The trait's capability views stand in for
//! interface checks, and [`HazelcastObject::interfaces`] /
//! [`HazelcastObject::base_types`] describe the supertypes a custom
//! serializer may be registered against.

use std::any::{Any, TypeId};

use rust_decimal::Decimal;
use uuid::Uuid;

use super::compact::Compact;
use super::identified::IdentifiedDataSerializable;
use super::json::HazelcastJsonValue;
use super::portable::Portable;
use crate::partition::PartitionAware;

/// Type-erasure helpers, implemented for every `Any + Send + Sync` type.
///
/// On a `Box<dyn HazelcastObject>` call these through a deref
/// (`(*boxed).as_any()`), otherwise the box itself is erased.
pub trait AsAny: Any + Send + Sync {
    /// Returns `self` as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Converts a boxed value into a boxed `Any`.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;

    /// Returns the concrete type name, for diagnostics.
    fn concrete_type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }

    fn concrete_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A value the serialization service can encode.
///
/// All methods have defaults; a plain type only needs an empty impl and a
/// custom serializer registered for it. Types speaking one of the built-in
/// object formats return themselves from the matching view.
///
/// ```ignore
/// impl HazelcastObject for Person {
///     fn as_portable(&self) -> Option<&dyn Portable> {
///         Some(self)
///     }
/// }
/// ```
pub trait HazelcastObject: AsAny {
    /// Returns this value as an identified data serializable, if it is one.
    fn as_identified(&self) -> Option<&dyn IdentifiedDataSerializable> {
        None
    }

    /// Returns this value as a portable, if it is one.
    fn as_portable(&self) -> Option<&dyn Portable> {
        None
    }

    /// Returns this value as a compact-serializable value, if it is one.
    fn as_compact(&self) -> Option<&dyn Compact> {
        None
    }

    /// Returns this value as partition aware, if it routes by another key.
    fn as_partition_aware(&self) -> Option<&dyn PartitionAware> {
        None
    }

    /// Interface-like types this value can be serialized as, most specific
    /// first. Searched before [`HazelcastObject::base_types`].
    fn interfaces(&self) -> Vec<TypeId> {
        Vec::new()
    }

    /// Base types of this value, nearest first.
    fn base_types(&self) -> Vec<TypeId> {
        Vec::new()
    }
}

/// Returns the concrete `TypeId` behind a value.
pub(crate) fn concrete_type_id(value: &dyn HazelcastObject) -> TypeId {
    value.as_any().type_id()
}

macro_rules! plain_objects {
    ($($ty:ty),* $(,)?) => {
        $(impl HazelcastObject for $ty {})*
    };
}

plain_objects!(
    i8,
    bool,
    char,
    i16,
    i32,
    i64,
    f32,
    f64,
    String,
    Vec<u8>,
    Vec<bool>,
    Vec<char>,
    Vec<i16>,
    Vec<i32>,
    Vec<i64>,
    Vec<f32>,
    Vec<f64>,
    Vec<String>,
    Uuid,
    Decimal,
    HazelcastJsonValue,
);
