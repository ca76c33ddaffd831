//! Stream serializers and the built-in constant codecs.
//!
//! Built-in types own the non-positive type ids; user serializers must use
//! strictly positive ids.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use super::{
    DataInput, DataOutput, Deserializable, HazelcastJsonValue, HazelcastObject, Serializable,
    JSON_TYPE_ID,
};
use crate::error::{HazelcastError, Result};

/// Type id of a null value.
pub const NULL_TYPE_ID: i32 = 0;
/// Type id of `i8`.
pub const BYTE_TYPE_ID: i32 = -3;
/// Type id of `bool`.
pub const BOOL_TYPE_ID: i32 = -4;
/// Type id of `char`.
pub const CHAR_TYPE_ID: i32 = -5;
/// Type id of `i16`.
pub const SHORT_TYPE_ID: i32 = -6;
/// Type id of `i32`.
pub const INT_TYPE_ID: i32 = -7;
/// Type id of `i64`.
pub const LONG_TYPE_ID: i32 = -8;
/// Type id of `f32`.
pub const FLOAT_TYPE_ID: i32 = -9;
/// Type id of `f64`.
pub const DOUBLE_TYPE_ID: i32 = -10;
/// Type id of `String`.
pub const STRING_TYPE_ID: i32 = -11;
/// Type id of `Vec<u8>`.
pub const BYTE_ARRAY_TYPE_ID: i32 = -12;
/// Type id of `Vec<bool>`.
pub const BOOL_ARRAY_TYPE_ID: i32 = -13;
/// Type id of `Vec<char>`.
pub const CHAR_ARRAY_TYPE_ID: i32 = -14;
/// Type id of `Vec<i16>`.
pub const SHORT_ARRAY_TYPE_ID: i32 = -15;
/// Type id of `Vec<i32>`.
pub const INT_ARRAY_TYPE_ID: i32 = -16;
/// Type id of `Vec<i64>`.
pub const LONG_ARRAY_TYPE_ID: i32 = -17;
/// Type id of `Vec<f32>`.
pub const FLOAT_ARRAY_TYPE_ID: i32 = -18;
/// Type id of `Vec<f64>`.
pub const DOUBLE_ARRAY_TYPE_ID: i32 = -19;
/// Type id of `Vec<String>`.
pub const STRING_ARRAY_TYPE_ID: i32 = -20;
/// Type id of `Uuid`.
pub const UUID_TYPE_ID: i32 = -21;
/// Type id of `Decimal`.
pub const DECIMAL_TYPE_ID: i32 = -27;
/// Type id reserved for the legacy whole-object fallback.
pub const LEGACY_TYPE_ID: i32 = -110;

/// A stream serializer bound to one type id.
///
/// Used for the built-in constants, for user serializers registered against a
/// concrete type or a supertype, and for the global and legacy fallbacks.
pub trait Serializer: Send + Sync {
    /// Returns the type id written in front of every value.
    fn wire_type_id(&self) -> i32;

    /// Writes the payload of `value`.
    fn write(&self, output: &mut dyn DataOutput, value: &dyn HazelcastObject) -> Result<()>;

    /// Reads a payload written by [`Serializer::write`].
    fn read(&self, input: &mut dyn DataInput) -> Result<Box<dyn Any + Send + Sync>>;
}

/// Serializer for a built-in value type, delegating to its
/// [`Serializable`] / [`Deserializable`] impls.
pub struct ConstantSerializer<T> {
    type_id: i32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ConstantSerializer<T> {
    /// Binds `T` to `type_id`.
    pub fn new(type_id: i32) -> Self {
        Self {
            type_id,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ConstantSerializer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstantSerializer")
            .field("type", &std::any::type_name::<T>())
            .field("type_id", &self.type_id)
            .finish()
    }
}

impl<T> Serializer for ConstantSerializer<T>
where
    T: Serializable + Deserializable + Any + Send + Sync,
{
    fn wire_type_id(&self) -> i32 {
        self.type_id
    }

    fn write(&self, output: &mut dyn DataOutput, value: &dyn HazelcastObject) -> Result<()> {
        let value = value.as_any().downcast_ref::<T>().ok_or_else(|| {
            HazelcastError::Serialization(format!(
                "serializer for {} (type id {}) cannot write a {}",
                std::any::type_name::<T>(),
                self.type_id,
                value.concrete_type_name()
            ))
        })?;
        value.serialize(output)
    }

    fn read(&self, input: &mut dyn DataInput) -> Result<Box<dyn Any + Send + Sync>> {
        Ok(Box::new(T::deserialize(input)?))
    }
}

fn constant<T>(type_id: i32) -> (TypeId, Arc<dyn Serializer>)
where
    T: Serializable + Deserializable + Any + Send + Sync,
{
    (TypeId::of::<T>(), Arc::new(ConstantSerializer::<T>::new(type_id)))
}

/// Returns the codec of every built-in value type.
pub(crate) fn constant_serializers() -> Vec<(TypeId, Arc<dyn Serializer>)> {
    vec![
        constant::<i8>(BYTE_TYPE_ID),
        constant::<bool>(BOOL_TYPE_ID),
        constant::<char>(CHAR_TYPE_ID),
        constant::<i16>(SHORT_TYPE_ID),
        constant::<i32>(INT_TYPE_ID),
        constant::<i64>(LONG_TYPE_ID),
        constant::<f32>(FLOAT_TYPE_ID),
        constant::<f64>(DOUBLE_TYPE_ID),
        constant::<String>(STRING_TYPE_ID),
        constant::<Vec<u8>>(BYTE_ARRAY_TYPE_ID),
        constant::<Vec<bool>>(BOOL_ARRAY_TYPE_ID),
        constant::<Vec<char>>(CHAR_ARRAY_TYPE_ID),
        constant::<Vec<i16>>(SHORT_ARRAY_TYPE_ID),
        constant::<Vec<i32>>(INT_ARRAY_TYPE_ID),
        constant::<Vec<i64>>(LONG_ARRAY_TYPE_ID),
        constant::<Vec<f32>>(FLOAT_ARRAY_TYPE_ID),
        constant::<Vec<f64>>(DOUBLE_ARRAY_TYPE_ID),
        constant::<Vec<String>>(STRING_ARRAY_TYPE_ID),
        constant::<Uuid>(UUID_TYPE_ID),
        constant::<Decimal>(DECIMAL_TYPE_ID),
        constant::<HazelcastJsonValue>(JSON_TYPE_ID),
    ]
}
