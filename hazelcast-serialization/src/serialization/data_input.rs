//! Data input traits and implementations for Hazelcast serialization.

use std::any::Any;
use std::fmt;
use std::io::Cursor;

use bytes::Buf;

use super::data_output::NULL_ARRAY_LENGTH;
use super::{ByteOrder, SerializationService};
use crate::error::{HazelcastError, Result};

/// Converts a position read from the wire into a buffer index.
pub(crate) fn checked_position(pos: i32) -> Result<usize> {
    usize::try_from(pos)
        .map_err(|_| HazelcastError::Bounds(format!("negative buffer position: {}", pos)))
}

/// Trait for reading primitive values from Hazelcast's binary format.
///
/// Multi-byte values use [`DataInput::byte_order`] unless a `*_with_order`
/// variant is called.
pub trait DataInput {
    /// Returns the byte order used by the unqualified read methods.
    fn byte_order(&self) -> ByteOrder;

    /// Returns the number of bytes remaining to be read.
    fn remaining(&self) -> usize;

    /// Reads a single byte (i8).
    fn read_byte(&mut self) -> Result<i8>;

    /// Reads a boolean from a single byte.
    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_byte()? != 0)
    }

    /// Reads the specified number of raw bytes.
    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>>;

    /// Reads a 16-bit signed integer using the given byte order.
    fn read_short_with_order(&mut self, order: ByteOrder) -> Result<i16>;

    /// Reads a 32-bit signed integer using the given byte order.
    fn read_int_with_order(&mut self, order: ByteOrder) -> Result<i32>;

    /// Reads a 64-bit signed integer using the given byte order.
    fn read_long_with_order(&mut self, order: ByteOrder) -> Result<i64>;

    /// Reads a 16-bit signed integer.
    fn read_short(&mut self) -> Result<i16> {
        self.read_short_with_order(self.byte_order())
    }

    /// Reads a 16-bit unsigned integer.
    fn read_unsigned_short(&mut self) -> Result<u16> {
        Ok(self.read_short()? as u16)
    }

    /// Reads a UTF-16 code unit as a `char`. Lone surrogates are rejected.
    fn read_char(&mut self) -> Result<char> {
        let unit = self.read_unsigned_short()?;
        char::from_u32(u32::from(unit)).ok_or_else(|| {
            HazelcastError::Serialization(format!("invalid char code unit: {:#06x}", unit))
        })
    }

    /// Reads a 32-bit signed integer.
    fn read_int(&mut self) -> Result<i32> {
        self.read_int_with_order(self.byte_order())
    }

    /// Reads a 64-bit signed integer.
    fn read_long(&mut self) -> Result<i64> {
        self.read_long_with_order(self.byte_order())
    }

    /// Reads a 32-bit float from its raw IEEE-754 bits.
    fn read_float(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_int()? as u32))
    }

    /// Reads a 64-bit float from its raw IEEE-754 bits.
    fn read_double(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_long()? as u64))
    }

    /// Reads an array length prefix, returning `None` for the null marker.
    ///
    /// `min_element_size` guards against lengths the remaining input cannot
    /// possibly hold.
    fn read_array_length(&mut self, min_element_size: usize) -> Result<Option<usize>> {
        let len = self.read_int()?;
        if len == NULL_ARRAY_LENGTH {
            return Ok(None);
        }
        let len = usize::try_from(len).map_err(|_| {
            HazelcastError::Serialization(format!("invalid array length: {}", len))
        })?;
        if len.saturating_mul(min_element_size) > self.remaining() {
            return Err(HazelcastError::Bounds(format!(
                "array of {} elements exceeds the {} remaining bytes",
                len,
                self.remaining()
            )));
        }
        Ok(Some(len))
    }

    /// Reads a length-prefixed UTF-8 string; length -1 yields `None`.
    fn read_string(&mut self) -> Result<Option<String>> {
        match self.read_array_length(1)? {
            Some(len) => {
                let bytes = self.read_bytes(len)?;
                String::from_utf8(bytes).map(Some).map_err(|e| {
                    HazelcastError::Serialization(format!("invalid UTF-8 string: {}", e))
                })
            }
            None => Ok(None),
        }
    }

    /// Reads a length-prefixed byte array.
    fn read_byte_array(&mut self) -> Result<Option<Vec<u8>>> {
        match self.read_array_length(1)? {
            Some(len) => self.read_bytes(len).map(Some),
            None => Ok(None),
        }
    }

    /// Reads a length-prefixed boolean array.
    fn read_bool_array(&mut self) -> Result<Option<Vec<bool>>> {
        read_array(self, 1, |input| input.read_bool())
    }

    /// Reads a length-prefixed char array.
    fn read_char_array(&mut self) -> Result<Option<Vec<char>>> {
        read_array(self, 2, |input| input.read_char())
    }

    /// Reads a length-prefixed short array.
    fn read_short_array(&mut self) -> Result<Option<Vec<i16>>> {
        read_array(self, 2, |input| input.read_short())
    }

    /// Reads a length-prefixed int array.
    fn read_int_array(&mut self) -> Result<Option<Vec<i32>>> {
        read_array(self, 4, |input| input.read_int())
    }

    /// Reads a length-prefixed long array.
    fn read_long_array(&mut self) -> Result<Option<Vec<i64>>> {
        read_array(self, 8, |input| input.read_long())
    }

    /// Reads a length-prefixed float array.
    fn read_float_array(&mut self) -> Result<Option<Vec<f32>>> {
        read_array(self, 4, |input| input.read_float())
    }

    /// Reads a length-prefixed double array.
    fn read_double_array(&mut self) -> Result<Option<Vec<f64>>> {
        read_array(self, 8, |input| input.read_double())
    }

    /// Reads a length-prefixed string array. Null elements become empty
    /// strings; use [`read_nullable_string_array`] to tell them apart.
    ///
    /// [`read_nullable_string_array`]: DataInput::read_nullable_string_array
    fn read_string_array(&mut self) -> Result<Option<Vec<String>>> {
        read_array(self, 4, |input| Ok(input.read_string()?.unwrap_or_default()))
    }

    /// Reads a length-prefixed string array, keeping null elements.
    fn read_nullable_string_array(&mut self) -> Result<Option<Vec<Option<String>>>> {
        read_array(self, 4, |input| input.read_string())
    }

    /// Reads a nested object written by [`DataOutput::write_object`].
    ///
    /// [`DataOutput::write_object`]: super::DataOutput::write_object
    fn read_object(&mut self) -> Result<Option<Box<dyn Any + Send + Sync>>> {
        Err(HazelcastError::Serialization(
            "reading nested objects requires an input attached to a serialization service"
                .to_string(),
        ))
    }
}

fn read_array<I, T, F>(input: &mut I, element_size: usize, mut read: F) -> Result<Option<Vec<T>>>
where
    I: DataInput + ?Sized,
    F: FnMut(&mut I) -> Result<T>,
{
    match input.read_array_length(element_size)? {
        Some(len) => {
            let mut values = Vec::with_capacity(len);
            for _ in 0..len {
                values.push(read(input)?);
            }
            Ok(Some(values))
        }
        None => Ok(None),
    }
}

/// A buffer-based implementation of `DataInput`.
///
/// Sequential reads advance the cursor; the `*_at` variants read at an
/// absolute position and leave the cursor untouched.
pub struct ObjectDataInput<'a> {
    cursor: Cursor<&'a [u8]>,
    byte_order: ByteOrder,
    service: Option<&'a SerializationService>,
}

impl fmt::Debug for ObjectDataInput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectDataInput")
            .field("position", &self.cursor.position())
            .field("len", &self.cursor.get_ref().len())
            .field("byte_order", &self.byte_order)
            .field("attached", &self.service.is_some())
            .finish()
    }
}

impl<'a> ObjectDataInput<'a> {
    /// Creates a new big-endian `ObjectDataInput` from the given byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_byte_order(data, ByteOrder::BigEndian)
    }

    /// Creates a detached input with an explicit byte order.
    pub fn with_byte_order(data: &'a [u8], byte_order: ByteOrder) -> Self {
        Self {
            cursor: Cursor::new(data),
            byte_order,
            service: None,
        }
    }

    pub(crate) fn attached(
        data: &'a [u8],
        position: usize,
        byte_order: ByteOrder,
        service: &'a SerializationService,
    ) -> Self {
        let mut cursor = Cursor::new(data);
        cursor.set_position(position as u64);
        Self {
            cursor,
            byte_order,
            service: Some(service),
        }
    }

    /// Returns the current position in the buffer.
    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    /// Moves the cursor to an absolute position.
    pub fn set_position(&mut self, pos: usize) -> Result<()> {
        if pos > self.len() {
            return Err(HazelcastError::Bounds(format!(
                "position {} is beyond the buffer length {}",
                pos,
                self.len()
            )));
        }
        self.cursor.set_position(pos as u64);
        Ok(())
    }

    /// Returns the logical length of the underlying buffer.
    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    /// Returns true if the underlying buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    fn ensure_remaining(&self, n: usize) -> Result<()> {
        if self.cursor.remaining() < n {
            Err(HazelcastError::Bounds(format!(
                "insufficient data: need {} bytes, have {}",
                n,
                self.cursor.remaining()
            )))
        } else {
            Ok(())
        }
    }

    fn slice_at<const N: usize>(&self, pos: usize) -> Result<[u8; N]> {
        let data = *self.cursor.get_ref();
        pos.checked_add(N)
            .and_then(|end| data.get(pos..end))
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| {
                HazelcastError::Bounds(format!(
                    "cannot read {} bytes at position {}, buffer length is {}",
                    N,
                    pos,
                    data.len()
                ))
            })
    }

    /// Borrows `len` bytes at an absolute position.
    pub(crate) fn bytes_at(&self, pos: usize, len: usize) -> Result<&'a [u8]> {
        let data: &'a [u8] = *self.cursor.get_ref();
        pos.checked_add(len)
            .and_then(|end| data.get(pos..end))
            .ok_or_else(|| {
                HazelcastError::Bounds(format!(
                    "cannot read {} bytes at position {}, buffer length is {}",
                    len,
                    pos,
                    data.len()
                ))
            })
    }

    /// Reads a byte at an absolute position.
    pub fn read_byte_at(&self, pos: usize) -> Result<i8> {
        Ok(self.slice_at::<1>(pos)?[0] as i8)
    }

    /// Reads a boolean at an absolute position.
    pub fn read_bool_at(&self, pos: usize) -> Result<bool> {
        Ok(self.read_byte_at(pos)? != 0)
    }

    /// Reads a short at an absolute position.
    pub fn read_short_at(&self, pos: usize) -> Result<i16> {
        Ok(self.byte_order.i16_from(self.slice_at(pos)?))
    }

    /// Reads a UTF-16 code unit at an absolute position.
    pub fn read_char_at(&self, pos: usize) -> Result<char> {
        let unit = self.read_short_at(pos)? as u16;
        char::from_u32(u32::from(unit)).ok_or_else(|| {
            HazelcastError::Serialization(format!("invalid char code unit: {:#06x}", unit))
        })
    }

    /// Reads an int at an absolute position.
    pub fn read_int_at(&self, pos: usize) -> Result<i32> {
        Ok(self.byte_order.i32_from(self.slice_at(pos)?))
    }

    /// Reads an int at an absolute position using an explicit byte order.
    pub fn read_int_at_with_order(&self, pos: usize, order: ByteOrder) -> Result<i32> {
        Ok(order.i32_from(self.slice_at(pos)?))
    }

    /// Reads a long at an absolute position.
    pub fn read_long_at(&self, pos: usize) -> Result<i64> {
        Ok(self.byte_order.i64_from(self.slice_at(pos)?))
    }

    /// Reads a float at an absolute position.
    pub fn read_float_at(&self, pos: usize) -> Result<f32> {
        Ok(f32::from_bits(self.read_int_at(pos)? as u32))
    }

    /// Reads a double at an absolute position.
    pub fn read_double_at(&self, pos: usize) -> Result<f64> {
        Ok(f64::from_bits(self.read_long_at(pos)? as u64))
    }

    /// Runs `f` and restores the cursor afterwards, whatever the outcome.
    pub(crate) fn preserving_position<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let saved = self.cursor.position();
        let result = f(self);
        self.cursor.set_position(saved);
        result
    }
}

impl DataInput for ObjectDataInput<'_> {
    fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    fn read_byte(&mut self) -> Result<i8> {
        self.ensure_remaining(1)?;
        Ok(self.cursor.get_i8())
    }

    fn read_bool(&mut self) -> Result<bool> {
        self.ensure_remaining(1)?;
        Ok(self.cursor.get_u8() != 0)
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        self.ensure_remaining(len)?;
        let mut buf = vec![0u8; len];
        self.cursor.copy_to_slice(&mut buf);
        Ok(buf)
    }

    fn read_short_with_order(&mut self, order: ByteOrder) -> Result<i16> {
        self.ensure_remaining(2)?;
        Ok(match order {
            ByteOrder::BigEndian => self.cursor.get_i16(),
            ByteOrder::LittleEndian => self.cursor.get_i16_le(),
        })
    }

    fn read_int_with_order(&mut self, order: ByteOrder) -> Result<i32> {
        self.ensure_remaining(4)?;
        Ok(match order {
            ByteOrder::BigEndian => self.cursor.get_i32(),
            ByteOrder::LittleEndian => self.cursor.get_i32_le(),
        })
    }

    fn read_long_with_order(&mut self, order: ByteOrder) -> Result<i64> {
        self.ensure_remaining(8)?;
        Ok(match order {
            ByteOrder::BigEndian => self.cursor.get_i64(),
            ByteOrder::LittleEndian => self.cursor.get_i64_le(),
        })
    }

    fn read_object(&mut self) -> Result<Option<Box<dyn Any + Send + Sync>>> {
        match self.service {
            Some(service) => service.read_object(self),
            None => Err(HazelcastError::Serialization(
                "reading nested objects requires an input attached to a serialization service"
                    .to_string(),
            )),
        }
    }
}
