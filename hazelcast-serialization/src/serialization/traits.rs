//! Serialization traits and implementations for the built-in value types.
//!
//! These impls define the payload of each constant type id; the framing
//! (type id, partition hash) is added by the service.

use rust_decimal::Decimal;
use uuid::Uuid;

use super::{DataInput, DataOutput};
use crate::error::{HazelcastError, Result};

/// Trait for types that can be serialized to Hazelcast's binary format.
pub trait Serializable {
    /// Serializes this value to the given output.
    fn serialize<W: DataOutput + ?Sized>(&self, output: &mut W) -> Result<()>;

    /// Convenience method: serializes this value to a big-endian byte vector.
    fn to_bytes(&self) -> Result<Vec<u8>>
    where
        Self: Sized,
    {
        let mut output = super::ObjectDataOutput::new();
        self.serialize(&mut output)?;
        Ok(output.into_bytes())
    }
}

/// Trait for types that can be deserialized from Hazelcast's binary format.
pub trait Deserializable: Sized {
    /// Deserializes a value from the given input.
    fn deserialize<R: DataInput + ?Sized>(input: &mut R) -> Result<Self>;

    /// Convenience method: deserializes a value from a big-endian byte slice.
    fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut input = super::ObjectDataInput::new(data);
        Self::deserialize(&mut input)
    }
}

macro_rules! primitive_impls {
    ($($ty:ty => $write:ident, $read:ident;)*) => {
        $(
            impl Serializable for $ty {
                fn serialize<W: DataOutput + ?Sized>(&self, output: &mut W) -> Result<()> {
                    output.$write(*self)
                }
            }

            impl Deserializable for $ty {
                fn deserialize<R: DataInput + ?Sized>(input: &mut R) -> Result<Self> {
                    input.$read()
                }
            }
        )*
    };
}

primitive_impls! {
    i8 => write_byte, read_byte;
    bool => write_bool, read_bool;
    char => write_char, read_char;
    i16 => write_short, read_short;
    i32 => write_int, read_int;
    i64 => write_long, read_long;
    f32 => write_float, read_float;
    f64 => write_double, read_double;
}

impl Serializable for String {
    fn serialize<W: DataOutput + ?Sized>(&self, output: &mut W) -> Result<()> {
        output.write_string(Some(self.as_str()))
    }
}

impl Serializable for str {
    fn serialize<W: DataOutput + ?Sized>(&self, output: &mut W) -> Result<()> {
        output.write_string(Some(self))
    }
}

// A top-level null never reaches these impls (it is framed as the null type
// id), so a null marker inside a payload decodes as the empty value.
impl Deserializable for String {
    fn deserialize<R: DataInput + ?Sized>(input: &mut R) -> Result<Self> {
        Ok(input.read_string()?.unwrap_or_default())
    }
}

macro_rules! array_impls {
    ($($ty:ty => $write:ident, $read:ident;)*) => {
        $(
            impl Serializable for Vec<$ty> {
                fn serialize<W: DataOutput + ?Sized>(&self, output: &mut W) -> Result<()> {
                    output.$write(Some(self.as_slice()))
                }
            }

            impl Deserializable for Vec<$ty> {
                fn deserialize<R: DataInput + ?Sized>(input: &mut R) -> Result<Self> {
                    Ok(input.$read()?.unwrap_or_default())
                }
            }
        )*
    };
}

array_impls! {
    u8 => write_byte_array, read_byte_array;
    bool => write_bool_array, read_bool_array;
    char => write_char_array, read_char_array;
    i16 => write_short_array, read_short_array;
    i32 => write_int_array, read_int_array;
    i64 => write_long_array, read_long_array;
    f32 => write_float_array, read_float_array;
    f64 => write_double_array, read_double_array;
    String => write_string_array, read_string_array;
    Option<String> => write_nullable_string_array, read_nullable_string_array;
}

impl Serializable for [u8] {
    fn serialize<W: DataOutput + ?Sized>(&self, output: &mut W) -> Result<()> {
        output.write_byte_array(Some(self))
    }
}

// UUIDs travel as the most significant 64 bits followed by the least
// significant 64 bits.
impl Serializable for Uuid {
    fn serialize<W: DataOutput + ?Sized>(&self, output: &mut W) -> Result<()> {
        let (most, least) = self.as_u64_pair();
        output.write_long(most as i64)?;
        output.write_long(least as i64)
    }
}

impl Deserializable for Uuid {
    fn deserialize<R: DataInput + ?Sized>(input: &mut R) -> Result<Self> {
        let most = input.read_long()? as u64;
        let least = input.read_long()? as u64;
        Ok(Uuid::from_u64_pair(most, least))
    }
}

/// Encodes `v` as the shortest big-endian two's-complement byte string.
fn unscaled_to_bytes(v: i128) -> Vec<u8> {
    let bytes = v.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

fn unscaled_from_bytes(bytes: &[u8]) -> Result<i128> {
    if bytes.is_empty() || bytes.len() > 16 {
        return Err(HazelcastError::Serialization(format!(
            "decimal unscaled value of {} bytes is out of range",
            bytes.len()
        )));
    }
    let fill = if bytes[0] & 0x80 != 0 { 0xFF } else { 0x00 };
    let mut buf = [fill; 16];
    buf[16 - bytes.len()..].copy_from_slice(bytes);
    Ok(i128::from_be_bytes(buf))
}

// Decimals travel as the unscaled value (two's-complement byte array)
// followed by an i32 scale. Equality of decoded values is numeric, so
// `1.0` and `1.00` compare equal while keeping their own scale.
impl Serializable for Decimal {
    fn serialize<W: DataOutput + ?Sized>(&self, output: &mut W) -> Result<()> {
        let unscaled = unscaled_to_bytes(self.mantissa());
        output.write_byte_array(Some(&unscaled))?;
        output.write_int(self.scale() as i32)
    }
}

impl Deserializable for Decimal {
    fn deserialize<R: DataInput + ?Sized>(input: &mut R) -> Result<Self> {
        let bytes = input.read_byte_array()?.ok_or_else(|| {
            HazelcastError::Serialization("decimal without unscaled value".to_string())
        })?;
        let mut unscaled = unscaled_from_bytes(&bytes)?;
        let mut scale = input.read_int()?;
        if scale < 0 {
            // Negative scales multiply the unscaled value out.
            let factor = 10i128.checked_pow(scale.unsigned_abs()).ok_or_else(|| {
                HazelcastError::Serialization(format!("decimal scale {} is out of range", scale))
            })?;
            unscaled = unscaled.checked_mul(factor).ok_or_else(|| {
                HazelcastError::Serialization(format!("decimal scale {} is out of range", scale))
            })?;
            scale = 0;
        }
        Decimal::try_from_i128_with_scale(unscaled, scale as u32).map_err(|e| {
            HazelcastError::Serialization(format!("decimal out of range: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::{ObjectDataInput, ObjectDataOutput};
    use std::str::FromStr;

    fn round_trip<T: Serializable + Deserializable + PartialEq + std::fmt::Debug>(value: T) {
        let bytes = value.to_bytes().unwrap();
        let result = T::from_bytes(&bytes).unwrap();
        assert_eq!(value, result);
    }

    #[test]
    fn test_primitive_round_trips() {
        round_trip(-128i8);
        round_trip(true);
        round_trip('Z');
        round_trip(i16::MIN);
        round_trip(i32::MAX);
        round_trip(i64::MIN);
        round_trip(-273.15f32);
        round_trip(std::f64::consts::PI);
    }

    #[test]
    fn test_string_round_trip() {
        round_trip(String::new());
        round_trip(String::from("Hello, World!"));
        round_trip(String::from("こんにちは"));
        round_trip("a".repeat(10000));
    }

    #[test]
    fn test_str_serializable() {
        let mut output = ObjectDataOutput::new();
        "test".serialize(&mut output).unwrap();
        let mut input = ObjectDataInput::new(output.as_bytes());
        assert_eq!(String::deserialize(&mut input).unwrap(), "test");
    }

    #[test]
    fn test_array_round_trips() {
        round_trip(Vec::<u8>::new());
        round_trip((0u8..=255).collect::<Vec<_>>());
        round_trip(vec![true, false]);
        round_trip(vec!['a', 'ß']);
        round_trip(vec![1i16, -1]);
        round_trip(vec![i32::MIN, 0, i32::MAX]);
        round_trip(vec![1i64 << 40]);
        round_trip(vec![0.5f32]);
        round_trip(vec![0.25f64, -0.25]);
        round_trip(vec![String::from("a"), String::new()]);
        round_trip(vec![None, Some(String::new()), Some(String::from("b"))]);
    }

    #[test]
    fn test_null_array_decodes_empty() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF];
        assert!(Vec::<i32>::from_bytes(&data).unwrap().is_empty());
    }

    #[test]
    fn test_big_endian_i32() {
        assert_eq!(0x01020304i32.to_bytes().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_uuid_layout() {
        let uuid = Uuid::from_u64_pair(1, 2);
        let bytes = uuid.to_bytes().unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 2]);
        round_trip(uuid);
        round_trip(Uuid::nil());
    }

    #[test]
    fn test_unscaled_bytes_are_minimal() {
        assert_eq!(unscaled_to_bytes(0), vec![0]);
        assert_eq!(unscaled_to_bytes(127), vec![0x7F]);
        assert_eq!(unscaled_to_bytes(128), vec![0x00, 0x80]);
        assert_eq!(unscaled_to_bytes(-1), vec![0xFF]);
        assert_eq!(unscaled_to_bytes(-129), vec![0xFF, 0x7F]);
    }

    #[test]
    fn test_unscaled_sign_extension() {
        assert_eq!(unscaled_from_bytes(&[0xFF, 0x7F]).unwrap(), -129);
        assert_eq!(unscaled_from_bytes(&[0x00, 0x80]).unwrap(), 128);
        assert!(unscaled_from_bytes(&[]).is_err());
        assert!(unscaled_from_bytes(&[0u8; 17]).is_err());
    }

    #[test]
    fn test_decimal_round_trip() {
        round_trip(Decimal::from_str("12345.6789").unwrap());
        round_trip(Decimal::from_str("-0.001").unwrap());
        round_trip(Decimal::MAX);
        round_trip(Decimal::MIN);
    }

    #[test]
    fn test_decimal_keeps_scale_and_compares_numerically() {
        let value = Decimal::from_str("1.00").unwrap();
        let decoded = Decimal::from_bytes(&value.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.scale(), 2);
        assert_eq!(decoded, Decimal::from_str("1.0").unwrap());
        assert_eq!(decoded.normalize().to_string(), "1");
    }

    #[test]
    fn test_decimal_negative_scale() {
        let mut output = ObjectDataOutput::new();
        output.write_byte_array(Some(&[0x05])).unwrap();
        output.write_int(-2).unwrap();
        let decoded = Decimal::from_bytes(output.as_bytes()).unwrap();
        assert_eq!(decoded, Decimal::from(500));
    }

    #[test]
    fn test_decimal_scale_out_of_range() {
        let mut output = ObjectDataOutput::new();
        output.write_byte_array(Some(&[0x01])).unwrap();
        output.write_int(40).unwrap();
        assert!(Decimal::from_bytes(output.as_bytes()).is_err());
    }
}
