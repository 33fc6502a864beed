//! Byte-level primitives of the binary format.
//!
//! Unsigned integers are LEB128 varints (7 value bits per byte, high bit
//! marks continuation), so small counts and indices stay single bytes.

use crate::reflect::error::DeserializeError;

/// Appends `value` as a LEB128 varint.
pub fn write_uint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

// -----------------------------------------------------------------------------
// ByteReader

/// Bounds-checked cursor over a byte slice.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Takes the next `len` bytes.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], DeserializeError> {
        if self.remaining() < len {
            return Err(DeserializeError::UnexpectedEnd);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, DeserializeError> {
        let slice = self.take(1)?;
        Ok(slice[0])
    }

    /// Reads a fixed-width little-endian chunk.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DeserializeError> {
        let slice = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    /// Reads a LEB128 varint. Fails on truncation or an encoding longer
    /// than 64 bits.
    pub fn read_uint(&mut self) -> Result<u64, DeserializeError> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            if shift >= 64 || (shift == 63 && byte > 1) {
                return Err(DeserializeError::Corrupted {
                    reason: "varint overflows 64 bits",
                });
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    /// Reads a varint and narrows it to `usize`, for counts and lengths.
    pub fn read_len(&mut self) -> Result<usize, DeserializeError> {
        let value = self.read_uint()?;
        usize::try_from(value).map_err(|_| DeserializeError::Corrupted {
            reason: "length does not fit in usize",
        })
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_round_trip() {
        let samples = [0u64, 1, 127, 128, 300, 16_383, 16_384, u32::MAX as u64, u64::MAX];
        for &v in &samples {
            let mut buf = Vec::new();
            write_uint(&mut buf, v);
            let mut reader = ByteReader::new(&buf);
            assert_eq!(reader.read_uint().unwrap(), v);
            assert!(reader.is_empty());
        }
    }

    #[test]
    fn varint_is_compact_for_small_values() {
        let mut buf = Vec::new();
        write_uint(&mut buf, 42);
        assert_eq!(buf, vec![42]);

        buf.clear();
        write_uint(&mut buf, 300);
        assert_eq!(buf, vec![0xac, 0x02]);
    }

    #[test]
    fn truncated_varint_fails() {
        let mut reader = ByteReader::new(&[0x80]);
        assert!(matches!(
            reader.read_uint(),
            Err(DeserializeError::UnexpectedEnd)
        ));
    }

    #[test]
    fn overlong_varint_fails() {
        let buf = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        let mut reader = ByteReader::new(&buf);
        assert!(matches!(
            reader.read_uint(),
            Err(DeserializeError::Corrupted { .. })
        ));
    }

    #[test]
    fn take_respects_bounds() {
        let mut reader = ByteReader::new(&[1, 2, 3]);
        assert_eq!(reader.take(2).unwrap(), &[1, 2]);
        assert!(reader.take(2).is_err());
        assert_eq!(reader.remaining(), 1);
    }
}
