//! Byte order selection for multi-byte primitives.

/// Byte order used when encoding multi-byte primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// Most significant byte first. This is the wire default.
    #[default]
    BigEndian,
    /// Least significant byte first.
    LittleEndian,
}

impl ByteOrder {
    /// Returns the byte order of the running platform.
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            Self::LittleEndian
        } else {
            Self::BigEndian
        }
    }

    pub(crate) fn i16_bytes(self, v: i16) -> [u8; 2] {
        match self {
            Self::BigEndian => v.to_be_bytes(),
            Self::LittleEndian => v.to_le_bytes(),
        }
    }

    pub(crate) fn i32_bytes(self, v: i32) -> [u8; 4] {
        match self {
            Self::BigEndian => v.to_be_bytes(),
            Self::LittleEndian => v.to_le_bytes(),
        }
    }

    pub(crate) fn i64_bytes(self, v: i64) -> [u8; 8] {
        match self {
            Self::BigEndian => v.to_be_bytes(),
            Self::LittleEndian => v.to_le_bytes(),
        }
    }

    pub(crate) fn i16_from(self, b: [u8; 2]) -> i16 {
        match self {
            Self::BigEndian => i16::from_be_bytes(b),
            Self::LittleEndian => i16::from_le_bytes(b),
        }
    }

    pub(crate) fn i32_from(self, b: [u8; 4]) -> i32 {
        match self {
            Self::BigEndian => i32::from_be_bytes(b),
            Self::LittleEndian => i32::from_le_bytes(b),
        }
    }

    pub(crate) fn i64_from(self, b: [u8; 8]) -> i64 {
        match self {
            Self::BigEndian => i64::from_be_bytes(b),
            Self::LittleEndian => i64::from_le_bytes(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_big_endian() {
        assert_eq!(ByteOrder::default(), ByteOrder::BigEndian);
    }

    #[test]
    fn test_i32_bytes() {
        assert_eq!(ByteOrder::BigEndian.i32_bytes(0x01020304), [1, 2, 3, 4]);
        assert_eq!(ByteOrder::LittleEndian.i32_bytes(0x01020304), [4, 3, 2, 1]);
    }

    #[test]
    fn test_i64_from_little_endian() {
        let bytes = [8, 7, 6, 5, 4, 3, 2, 1];
        assert_eq!(ByteOrder::LittleEndian.i64_from(bytes), 0x0102030405060708);
    }
}
