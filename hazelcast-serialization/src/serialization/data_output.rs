//! Data output traits and implementations for Hazelcast serialization.

use std::fmt;
use std::mem;

use bytes::{BufMut, BytesMut};

use super::pool::BufferPool;
use super::{ByteOrder, HazelcastObject, SerializationService};
use crate::error::{HazelcastError, Result};

/// Length written in place of an array or string length to encode `None`.
pub const NULL_ARRAY_LENGTH: i32 = -1;

const DEFAULT_CAPACITY: usize = 256;

pub(crate) fn length_prefix(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| {
        HazelcastError::Serialization(format!("length {} exceeds the maximum encodable size", len))
    })
}

pub(crate) fn char_to_u16(v: char) -> Result<u16> {
    u16::try_from(u32::from(v)).map_err(|_| {
        HazelcastError::Serialization(format!(
            "char {:?} (U+{:04X}) is outside the basic multilingual plane",
            v,
            u32::from(v)
        ))
    })
}

/// Trait for writing primitive values in Hazelcast's binary format.
///
/// Multi-byte values use [`DataOutput::byte_order`] unless a `*_with_order`
/// variant is called.
pub trait DataOutput {
    /// Returns the byte order used by the unqualified write methods.
    fn byte_order(&self) -> ByteOrder;

    /// Writes raw bytes without length prefix.
    fn write_bytes(&mut self, v: &[u8]) -> Result<()>;

    /// Writes a single byte (i8).
    fn write_byte(&mut self, v: i8) -> Result<()> {
        self.write_bytes(&[v as u8])
    }

    /// Writes a boolean as a single byte (0 for false, 1 for true).
    fn write_bool(&mut self, v: bool) -> Result<()> {
        self.write_byte(i8::from(v))
    }

    /// Writes a 16-bit signed integer using the given byte order.
    fn write_short_with_order(&mut self, v: i16, order: ByteOrder) -> Result<()> {
        self.write_bytes(&order.i16_bytes(v))
    }

    /// Writes a 32-bit signed integer using the given byte order.
    fn write_int_with_order(&mut self, v: i32, order: ByteOrder) -> Result<()> {
        self.write_bytes(&order.i32_bytes(v))
    }

    /// Writes a 64-bit signed integer using the given byte order.
    fn write_long_with_order(&mut self, v: i64, order: ByteOrder) -> Result<()> {
        self.write_bytes(&order.i64_bytes(v))
    }

    /// Writes a 16-bit signed integer.
    fn write_short(&mut self, v: i16) -> Result<()> {
        self.write_short_with_order(v, self.byte_order())
    }

    /// Writes a 16-bit unsigned integer.
    fn write_unsigned_short(&mut self, v: u16) -> Result<()> {
        self.write_short(v as i16)
    }

    /// Writes a UTF-16 code unit. Characters outside the BMP are rejected.
    fn write_char(&mut self, v: char) -> Result<()> {
        let unit = char_to_u16(v)?;
        self.write_unsigned_short(unit)
    }

    /// Writes a 32-bit signed integer.
    fn write_int(&mut self, v: i32) -> Result<()> {
        self.write_int_with_order(v, self.byte_order())
    }

    /// Writes a 64-bit signed integer.
    fn write_long(&mut self, v: i64) -> Result<()> {
        self.write_long_with_order(v, self.byte_order())
    }

    /// Writes a 32-bit float as its raw IEEE-754 bits.
    fn write_float(&mut self, v: f32) -> Result<()> {
        self.write_int(v.to_bits() as i32)
    }

    /// Writes a 64-bit float as its raw IEEE-754 bits.
    fn write_double(&mut self, v: f64) -> Result<()> {
        self.write_long(v.to_bits() as i64)
    }

    /// Writes a UTF-8 string with its byte-length prefix; `None` is length -1.
    fn write_string(&mut self, v: Option<&str>) -> Result<()> {
        match v {
            Some(s) => {
                self.write_int(length_prefix(s.len())?)?;
                self.write_bytes(s.as_bytes())
            }
            None => self.write_int(NULL_ARRAY_LENGTH),
        }
    }

    /// Writes a length-prefixed byte array.
    fn write_byte_array(&mut self, v: Option<&[u8]>) -> Result<()> {
        match v {
            Some(arr) => {
                self.write_int(length_prefix(arr.len())?)?;
                self.write_bytes(arr)
            }
            None => self.write_int(NULL_ARRAY_LENGTH),
        }
    }

    /// Writes a length-prefixed boolean array.
    fn write_bool_array(&mut self, v: Option<&[bool]>) -> Result<()> {
        write_array(self, v, |out, &x| out.write_bool(x))
    }

    /// Writes a length-prefixed char array.
    fn write_char_array(&mut self, v: Option<&[char]>) -> Result<()> {
        write_array(self, v, |out, &x| out.write_char(x))
    }

    /// Writes a length-prefixed short array.
    fn write_short_array(&mut self, v: Option<&[i16]>) -> Result<()> {
        write_array(self, v, |out, &x| out.write_short(x))
    }

    /// Writes a length-prefixed int array.
    fn write_int_array(&mut self, v: Option<&[i32]>) -> Result<()> {
        write_array(self, v, |out, &x| out.write_int(x))
    }

    /// Writes a length-prefixed long array.
    fn write_long_array(&mut self, v: Option<&[i64]>) -> Result<()> {
        write_array(self, v, |out, &x| out.write_long(x))
    }

    /// Writes a length-prefixed float array.
    fn write_float_array(&mut self, v: Option<&[f32]>) -> Result<()> {
        write_array(self, v, |out, &x| out.write_float(x))
    }

    /// Writes a length-prefixed double array.
    fn write_double_array(&mut self, v: Option<&[f64]>) -> Result<()> {
        write_array(self, v, |out, &x| out.write_double(x))
    }

    /// Writes a length-prefixed string array.
    fn write_string_array(&mut self, v: Option<&[String]>) -> Result<()> {
        write_array(self, v, |out, x| out.write_string(Some(x.as_str())))
    }

    /// Writes a length-prefixed string array whose elements may be null.
    fn write_nullable_string_array(&mut self, v: Option<&[Option<String>]>) -> Result<()> {
        write_array(self, v, |out, x| out.write_string(x.as_deref()))
    }

    /// Writes a nested object, prefixed by its type id.
    ///
    /// Only outputs attached to a [`SerializationService`] support this.
    fn write_object(&mut self, value: Option<&dyn HazelcastObject>) -> Result<()> {
        let _ = value;
        Err(HazelcastError::Serialization(
            "writing nested objects requires an output attached to a serialization service"
                .to_string(),
        ))
    }
}

fn write_array<O, T, F>(out: &mut O, v: Option<&[T]>, mut write: F) -> Result<()>
where
    O: DataOutput + ?Sized,
    F: FnMut(&mut O, &T) -> Result<()>,
{
    match v {
        Some(arr) => {
            out.write_int(length_prefix(arr.len())?)?;
            for item in arr {
                write(out, item)?;
            }
            Ok(())
        }
        None => out.write_int(NULL_ARRAY_LENGTH),
    }
}

/// A slot reserved in an [`ObjectDataOutput`] whose value is only known later.
///
/// The slot is zero-filled until [`ObjectDataOutput::patch_int`] consumes it.
#[must_use = "a reserved slot must be patched"]
#[derive(Debug, PartialEq, Eq)]
pub struct Reserved {
    position: usize,
}

impl Reserved {
    /// Returns the absolute position of the reserved slot.
    pub fn position(&self) -> usize {
        self.position
    }
}

/// A buffer-based implementation of `DataOutput`.
///
/// Outputs handed out by a [`SerializationService`] return their buffer to
/// the service's pool when dropped.
pub struct ObjectDataOutput<'a> {
    buffer: BytesMut,
    byte_order: ByteOrder,
    service: Option<&'a SerializationService>,
    pool: Option<&'a BufferPool>,
}

impl fmt::Debug for ObjectDataOutput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectDataOutput")
            .field("len", &self.buffer.len())
            .field("capacity", &self.buffer.capacity())
            .field("byte_order", &self.byte_order)
            .field("attached", &self.service.is_some())
            .finish()
    }
}

impl ObjectDataOutput<'static> {
    /// Creates a new big-endian `ObjectDataOutput` with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a new big-endian `ObjectDataOutput` with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_byte_order(capacity, ByteOrder::BigEndian)
    }

    /// Creates a detached output with the given capacity and byte order.
    pub fn with_byte_order(capacity: usize, byte_order: ByteOrder) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            byte_order,
            service: None,
            pool: None,
        }
    }
}

impl<'a> ObjectDataOutput<'a> {
    pub(crate) fn attached(
        buffer: BytesMut,
        byte_order: ByteOrder,
        service: &'a SerializationService,
        pool: &'a BufferPool,
    ) -> Self {
        Self {
            buffer,
            byte_order,
            service: Some(service),
            pool: Some(pool),
        }
    }

    pub(crate) fn service(&self) -> Option<&'a SerializationService> {
        self.service
    }

    /// Returns the written bytes as a slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the output and returns a copy of the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    /// Returns the number of bytes written, which is also the write position.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the current write position.
    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the current buffer capacity.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Clears the buffer, removing all written data.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Makes room for `n` more bytes: capacity doubles, or grows to exactly
    /// the required size when doubling is not enough.
    fn ensure_available(&mut self, n: usize) {
        let required = self.buffer.len() + n;
        if required > self.buffer.capacity() {
            let target = (self.buffer.capacity() * 2).max(required);
            self.buffer.reserve(target - self.buffer.len());
        }
    }

    /// Appends `n` zero bytes.
    pub fn write_zero_bytes(&mut self, n: usize) {
        self.ensure_available(n);
        self.buffer.put_bytes(0, n);
    }

    /// Appends a zero-filled 4-byte slot to be patched later.
    pub fn reserve_int(&mut self) -> Reserved {
        let position = self.position();
        self.write_zero_bytes(4);
        Reserved { position }
    }

    /// Fills a previously reserved slot.
    pub fn patch_int(&mut self, slot: Reserved, v: i32) -> Result<()> {
        self.write_int_at(slot.position, v)
    }

    /// Writes an int at an absolute position without moving the write position.
    pub fn write_int_at(&mut self, pos: usize, v: i32) -> Result<()> {
        let order = self.byte_order;
        self.write_int_at_with_order(pos, v, order)
    }

    /// Positional int write using an explicit byte order.
    pub fn write_int_at_with_order(&mut self, pos: usize, v: i32, order: ByteOrder) -> Result<()> {
        self.patch(pos, &order.i32_bytes(v))
    }

    /// Writes a long at an absolute position without moving the write position.
    pub fn write_long_at(&mut self, pos: usize, v: i64) -> Result<()> {
        let bytes = self.byte_order.i64_bytes(v);
        self.patch(pos, &bytes)
    }

    fn patch(&mut self, pos: usize, bytes: &[u8]) -> Result<()> {
        let end = pos.checked_add(bytes.len()).filter(|&end| end <= self.buffer.len());
        match end {
            Some(end) => {
                self.buffer[pos..end].copy_from_slice(bytes);
                Ok(())
            }
            None => Err(HazelcastError::Bounds(format!(
                "cannot write {} bytes at position {}, buffer length is {}",
                bytes.len(),
                pos,
                self.buffer.len()
            ))),
        }
    }
}

impl Default for ObjectDataOutput<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ObjectDataOutput<'_> {
    fn drop(&mut self) {
        if let Some(pool) = self.pool {
            pool.give_back(mem::take(&mut self.buffer));
        }
    }
}

impl DataOutput for ObjectDataOutput<'_> {
    fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    fn write_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.ensure_available(v.len());
        self.buffer.put_slice(v);
        Ok(())
    }

    fn write_byte(&mut self, v: i8) -> Result<()> {
        self.ensure_available(1);
        self.buffer.put_i8(v);
        Ok(())
    }

    fn write_bool(&mut self, v: bool) -> Result<()> {
        self.ensure_available(1);
        self.buffer.put_u8(if v { 1 } else { 0 });
        Ok(())
    }

    fn write_short_with_order(&mut self, v: i16, order: ByteOrder) -> Result<()> {
        self.ensure_available(2);
        match order {
            ByteOrder::BigEndian => self.buffer.put_i16(v),
            ByteOrder::LittleEndian => self.buffer.put_i16_le(v),
        }
        Ok(())
    }

    fn write_int_with_order(&mut self, v: i32, order: ByteOrder) -> Result<()> {
        self.ensure_available(4);
        match order {
            ByteOrder::BigEndian => self.buffer.put_i32(v),
            ByteOrder::LittleEndian => self.buffer.put_i32_le(v),
        }
        Ok(())
    }

    fn write_long_with_order(&mut self, v: i64, order: ByteOrder) -> Result<()> {
        self.ensure_available(8);
        match order {
            ByteOrder::BigEndian => self.buffer.put_i64(v),
            ByteOrder::LittleEndian => self.buffer.put_i64_le(v),
        }
        Ok(())
    }

    fn write_object(&mut self, value: Option<&dyn HazelcastObject>) -> Result<()> {
        match self.service {
            Some(service) => service.write_object(self, value),
            None => Err(HazelcastError::Serialization(
                "writing nested objects requires an output attached to a serialization service"
                    .to_string(),
            )),
        }
    }
}

/// An output that discards everything written to it.
///
/// Handed out as the raw-data section while a class definition is being
/// derived from a value's write logic.
#[derive(Debug, Default)]
pub struct NullDataOutput {
    byte_order: ByteOrder,
}

impl DataOutput for NullDataOutput {
    fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    fn write_bytes(&mut self, _v: &[u8]) -> Result<()> {
        Ok(())
    }

    fn write_object(&mut self, _value: Option<&dyn HazelcastObject>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_output_is_empty() {
        let output = ObjectDataOutput::new();
        assert!(output.is_empty());
        assert_eq!(output.len(), 0);
    }

    #[test]
    fn test_write_byte_negative() {
        let mut output = ObjectDataOutput::new();
        output.write_byte(-1).unwrap();
        assert_eq!(output.as_bytes(), &[0xFF]);
    }

    #[test]
    fn test_write_bool() {
        let mut output = ObjectDataOutput::new();
        output.write_bool(true).unwrap();
        output.write_bool(false).unwrap();
        assert_eq!(output.as_bytes(), &[1, 0]);
    }

    #[test]
    fn test_write_int_big_endian() {
        let mut output = ObjectDataOutput::new();
        output.write_int(0x01020304).unwrap();
        assert_eq!(output.as_bytes(), &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_write_int_little_endian() {
        let mut output = ObjectDataOutput::with_byte_order(16, ByteOrder::LittleEndian);
        output.write_int(0x01020304).unwrap();
        assert_eq!(output.as_bytes(), &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_write_int_with_order_overrides_default() {
        let mut output = ObjectDataOutput::with_byte_order(16, ByteOrder::LittleEndian);
        output.write_int_with_order(1, ByteOrder::BigEndian).unwrap();
        assert_eq!(output.as_bytes(), &[0, 0, 0, 1]);
    }

    #[test]
    fn test_write_long_big_endian() {
        let mut output = ObjectDataOutput::new();
        output.write_long(0x0102030405060708).unwrap();
        assert_eq!(
            output.as_bytes(),
            &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]
        );
    }

    #[test]
    fn test_write_float_uses_raw_bits() {
        let mut output = ObjectDataOutput::new();
        output.write_float(1.0).unwrap();
        assert_eq!(output.as_bytes(), &[0x3F, 0x80, 0x00, 0x00]);
    }

    #[test]
    fn test_write_char() {
        let mut output = ObjectDataOutput::new();
        output.write_char('A').unwrap();
        assert_eq!(output.as_bytes(), &[0x00, 0x41]);
    }

    #[test]
    fn test_write_char_outside_bmp_fails() {
        let mut output = ObjectDataOutput::new();
        assert!(output.write_char('\u{1F680}').is_err());
    }

    #[test]
    fn test_write_string() {
        let mut output = ObjectDataOutput::new();
        output.write_string(Some("test")).unwrap();
        assert_eq!(output.as_bytes(), &[0, 0, 0, 4, b't', b'e', b's', b't']);
    }

    #[test]
    fn test_write_null_string() {
        let mut output = ObjectDataOutput::new();
        output.write_string(None).unwrap();
        assert_eq!(output.as_bytes(), &[0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_null_and_empty_arrays_differ() {
        let mut null_out = ObjectDataOutput::new();
        null_out.write_int_array(None).unwrap();
        let mut empty_out = ObjectDataOutput::new();
        empty_out.write_int_array(Some(&[])).unwrap();
        assert_eq!(null_out.as_bytes(), &[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(empty_out.as_bytes(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_null_string_element_differs_from_empty() {
        let mut output = ObjectDataOutput::new();
        output
            .write_nullable_string_array(Some(&[None, Some(String::new())]))
            .unwrap();
        assert_eq!(
            output.as_bytes(),
            &[0, 0, 0, 2, 0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_write_int_at_does_not_move_position() {
        let mut output = ObjectDataOutput::new();
        output.write_int(0).unwrap();
        output.write_int(7).unwrap();
        output.write_int_at(0, 42).unwrap();
        assert_eq!(output.position(), 8);
        assert_eq!(output.as_bytes(), &[0, 0, 0, 42, 0, 0, 0, 7]);
    }

    #[test]
    fn test_write_int_at_out_of_bounds() {
        let mut output = ObjectDataOutput::new();
        output.write_short(1).unwrap();
        let err = output.write_int_at(0, 1).unwrap_err();
        assert!(matches!(err, HazelcastError::Bounds(_)));
    }

    #[test]
    fn test_reserve_and_patch() {
        let mut output = ObjectDataOutput::new();
        let slot = output.reserve_int();
        output.write_byte(9).unwrap();
        let end = output.position() as i32;
        output.patch_int(slot, end).unwrap();
        assert_eq!(output.as_bytes(), &[0, 0, 0, 5, 9]);
    }

    #[test]
    fn test_write_long_at() {
        let mut output = ObjectDataOutput::new();
        output.write_long(0).unwrap();
        output.write_byte(1).unwrap();
        output.write_long_at(0, 0x0102).unwrap();
        assert_eq!(output.as_bytes(), &[0, 0, 0, 0, 0, 0, 1, 2, 1]);
        assert!(output.write_long_at(2, 1).is_err());
    }

    #[test]
    fn test_growth_doubles_capacity() {
        let mut output = ObjectDataOutput::with_capacity(8);
        output.write_bytes(&[0u8; 8]).unwrap();
        output.write_byte(1).unwrap();
        assert!(output.capacity() >= 16);
    }

    #[test]
    fn test_growth_to_required_size() {
        let mut output = ObjectDataOutput::with_capacity(4);
        output.write_bytes(&[0u8; 100]).unwrap();
        assert!(output.capacity() >= 100);
        assert_eq!(output.len(), 100);
    }

    #[test]
    fn test_detached_output_rejects_nested_objects() {
        let mut output = ObjectDataOutput::new();
        assert!(output.write_object(None).is_err());
    }

    #[test]
    fn test_null_output_discards() {
        let mut output = NullDataOutput::default();
        output.write_long(5).unwrap();
        output.write_string(Some("ignored")).unwrap();
    }

    #[test]
    fn test_into_bytes() {
        let mut output = ObjectDataOutput::new();
        output.write_int(42).unwrap();
        assert_eq!(output.into_bytes(), vec![0, 0, 0, 42]);
    }
}
