//! Bit-level field packing and unpacking.
//!
//! All CCSDS headers handled by this crate are laid out as sequences of unsigned integer fields
//! of arbitrary bit width, numbered most-significant-bit first starting at bit 0 of the first
//! octet. The helpers in this module write and read such fields directly into and from byte
//! buffers, including fields crossing octet boundaries.
//!
//! ## Example
//!
//! ```rust
//! use spacelink::bits::{read_field, write_field};
//!
//! // 11-bit APID of a space packet header starting at bit 5.
//! let mut buf = [0u8; 2];
//! write_field(&mut buf, 5, 11, 0x245).unwrap();
//! assert_eq!(buf, [0x02, 0x45]);
//! assert_eq!(read_field(&buf, 5, 11).unwrap(), 0x245);
//! ```
use core::cmp::min;

/// Maximum width of a single field in bits.
pub const MAX_FIELD_WIDTH: usize = u64::BITS as usize;

/// Errors of the bit packing primitives.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitFieldError {
    /// The bit range `[offset, offset + width)` does not lie within the buffer, or the width
    /// exceeds [MAX_FIELD_WIDTH].
    #[error("bit range at offset {offset} with width {width} exceeds buffer of {available} bits")]
    OutOfRange {
        /// Bit offset of the field.
        offset: usize,
        /// Width of the field in bits.
        width: usize,
        /// Number of bits available in the buffer.
        available: usize,
    },
    /// The value does not fit into the field width.
    #[error("value {value:#x} does not fit into {width} bits")]
    ValueTooWide {
        /// Value which should have been written.
        value: u64,
        /// Width of the field in bits.
        width: usize,
    },
}

/// Entry of a layout table: position and width of a field in bits.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BitField {
    /// Bit offset from the start of the structure, MSB first.
    pub offset: usize,
    /// Width in bits.
    pub width: usize,
}

impl BitField {
    /// Constructor.
    pub const fn new(offset: usize, width: usize) -> Self {
        Self { offset, width }
    }

    /// First bit after this field.
    #[inline]
    pub const fn end(&self) -> usize {
        self.offset + self.width
    }

    /// Largest value which can be stored in the field.
    #[inline]
    pub const fn max_value(&self) -> u64 {
        max_value_for_width(self.width)
    }

    /// Write `value` into the field inside `buf`.
    #[inline]
    pub fn write(&self, buf: &mut [u8], value: u64) -> Result<(), BitFieldError> {
        write_field(buf, self.offset, self.width, value)
    }

    /// Read the field from `buf`.
    #[inline]
    pub fn read(&self, buf: &[u8]) -> Result<u64, BitFieldError> {
        read_field(buf, self.offset, self.width)
    }
}

/// Largest unsigned value representable with `width` bits.
#[inline]
pub const fn max_value_for_width(width: usize) -> u64 {
    if width >= MAX_FIELD_WIDTH {
        u64::MAX
    } else {
        (1 << width) - 1
    }
}

fn check_range(buf_len: usize, bit_offset: usize, bit_width: usize) -> Result<(), BitFieldError> {
    let available = buf_len.saturating_mul(8);
    let out_of_range = || BitFieldError::OutOfRange {
        offset: bit_offset,
        width: bit_width,
        available,
    };
    if bit_width > MAX_FIELD_WIDTH {
        return Err(out_of_range());
    }
    match bit_offset.checked_add(bit_width) {
        Some(end) if end <= available => Ok(()),
        _ => Err(out_of_range()),
    }
}

/// Write the low `bit_width` bits of `value` into `buf` starting at `bit_offset`.
///
/// The field is written MSB first. Bits outside of `[bit_offset, bit_offset + bit_width)` are
/// left untouched. A width of zero is valid and writes nothing. Values which do not fit into the
/// field are rejected instead of being truncated.
pub fn write_field(
    buf: &mut [u8],
    bit_offset: usize,
    bit_width: usize,
    value: u64,
) -> Result<(), BitFieldError> {
    check_range(buf.len(), bit_offset, bit_width)?;
    if value > max_value_for_width(bit_width) {
        return Err(BitFieldError::ValueTooWide {
            value,
            width: bit_width,
        });
    }
    let mut remaining = bit_width;
    let mut pos = bit_offset;
    while remaining > 0 {
        let bit_in_byte = pos % 8;
        let chunk = min(8 - bit_in_byte, remaining);
        let shift = 8 - bit_in_byte - chunk;
        let chunk_mask = max_value_for_width(chunk) as u8;
        let bits = ((value >> (remaining - chunk)) as u8) & chunk_mask;
        let byte = &mut buf[pos / 8];
        *byte = (*byte & !(chunk_mask << shift)) | (bits << shift);
        remaining -= chunk;
        pos += chunk;
    }
    Ok(())
}

/// Read a `bit_width` wide unsigned field from `buf` starting at `bit_offset`.
///
/// This is the exact inverse of [write_field].
pub fn read_field(buf: &[u8], bit_offset: usize, bit_width: usize) -> Result<u64, BitFieldError> {
    check_range(buf.len(), bit_offset, bit_width)?;
    let mut value = 0u64;
    let mut remaining = bit_width;
    let mut pos = bit_offset;
    while remaining > 0 {
        let bit_in_byte = pos % 8;
        let chunk = min(8 - bit_in_byte, remaining);
        let shift = 8 - bit_in_byte - chunk;
        let bits = (buf[pos / 8] >> shift) & (max_value_for_width(chunk) as u8);
        value = (value << chunk) | bits as u64;
        remaining -= chunk;
        pos += chunk;
    }
    Ok(value)
}

/// Sequential writer over a byte buffer which advances a bit offset with every field.
#[derive(Debug)]
pub struct BitCursor<'buf> {
    buf: &'buf mut [u8],
    bit_pos: usize,
}

impl<'buf> BitCursor<'buf> {
    /// Create a cursor positioned at the first bit of `buf`.
    pub fn new(buf: &'buf mut [u8]) -> Self {
        Self { buf, bit_pos: 0 }
    }

    /// Write the next field and advance the cursor past it.
    pub fn put(&mut self, bit_width: usize, value: u64) -> Result<(), BitFieldError> {
        write_field(self.buf, self.bit_pos, bit_width, value)?;
        self.bit_pos += bit_width;
        Ok(())
    }

    /// Write a flag as a single bit.
    #[inline]
    pub fn put_bool(&mut self, flag: bool) -> Result<(), BitFieldError> {
        self.put(1, flag as u64)
    }

    /// Current bit position.
    #[inline]
    pub fn bit_pos(&self) -> usize {
        self.bit_pos
    }

    /// Number of octets touched so far, rounded up.
    #[inline]
    pub fn octets_written(&self) -> usize {
        (self.bit_pos + 7) / 8
    }
}

/// Sequential reader counterpart of [BitCursor].
#[derive(Debug, Clone)]
pub struct BitReader<'buf> {
    buf: &'buf [u8],
    bit_pos: usize,
}

impl<'buf> BitReader<'buf> {
    /// Create a reader positioned at the first bit of `buf`.
    pub fn new(buf: &'buf [u8]) -> Self {
        Self { buf, bit_pos: 0 }
    }

    /// Read the next field and advance past it.
    pub fn take(&mut self, bit_width: usize) -> Result<u64, BitFieldError> {
        let value = read_field(self.buf, self.bit_pos, bit_width)?;
        self.bit_pos += bit_width;
        Ok(value)
    }

    /// Read a single bit flag.
    #[inline]
    pub fn take_bool(&mut self) -> Result<bool, BitFieldError> {
        Ok(self.take(1)? != 0)
    }

    /// Current bit position.
    #[inline]
    pub fn bit_pos(&self) -> usize {
        self.bit_pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_fields() {
        let mut buf = [0u8; 4];
        write_field(&mut buf, 0, 8, 0xAB).unwrap();
        write_field(&mut buf, 8, 16, 0x1234).unwrap();
        assert_eq!(buf, [0xAB, 0x12, 0x34, 0x00]);
        assert_eq!(read_field(&buf, 0, 8).unwrap(), 0xAB);
        assert_eq!(read_field(&buf, 8, 16).unwrap(), 0x1234);
    }

    #[test]
    fn test_field_crossing_byte_boundary() {
        let mut buf = [0u8; 3];
        // 16 bit field starting at bit 4, like the USLP spacecraft ID.
        write_field(&mut buf, 4, 16, 0xA5C3).unwrap();
        assert_eq!(buf, [0x0A, 0x5C, 0x30]);
        assert_eq!(read_field(&buf, 4, 16).unwrap(), 0xA5C3);
    }

    #[test]
    fn test_surrounding_bits_untouched() {
        let mut buf = [0xFF; 2];
        write_field(&mut buf, 3, 6, 0).unwrap();
        assert_eq!(buf, [0b1110_0000, 0b0111_1111]);
        write_field(&mut buf, 3, 6, 0b101101).unwrap();
        assert_eq!(buf, [0b1111_0110, 0b1111_1111]);
    }

    #[test]
    fn test_zero_width() {
        let mut buf = [0x5A; 1];
        write_field(&mut buf, 8, 0, 0).unwrap();
        assert_eq!(buf, [0x5A]);
        assert_eq!(read_field(&buf, 8, 0).unwrap(), 0);
        // A zero width field can only hold zero.
        assert_eq!(
            write_field(&mut buf, 0, 0, 1).unwrap_err(),
            BitFieldError::ValueTooWide { value: 1, width: 0 }
        );
    }

    #[test]
    fn test_full_width() {
        let mut buf = [0u8; 9];
        write_field(&mut buf, 4, 64, u64::MAX - 1).unwrap();
        assert_eq!(read_field(&buf, 4, 64).unwrap(), u64::MAX - 1);
        assert_eq!(buf[0], 0x0F);
        assert_eq!(buf[8], 0xE0);
    }

    #[test]
    fn test_value_too_wide() {
        let mut buf = [0u8; 2];
        assert_eq!(
            write_field(&mut buf, 2, 6, 64).unwrap_err(),
            BitFieldError::ValueTooWide {
                value: 64,
                width: 6
            }
        );
        assert_eq!(buf, [0, 0]);
        write_field(&mut buf, 2, 6, 63).unwrap();
    }

    #[test]
    fn test_out_of_range() {
        let mut buf = [0u8; 2];
        assert_eq!(
            write_field(&mut buf, 10, 7, 0).unwrap_err(),
            BitFieldError::OutOfRange {
                offset: 10,
                width: 7,
                available: 16
            }
        );
        assert_eq!(
            read_field(&buf, 0, 65).unwrap_err(),
            BitFieldError::OutOfRange {
                offset: 0,
                width: 65,
                available: 16
            }
        );
        assert!(read_field(&buf, usize::MAX, 2).is_err());
    }

    #[test]
    fn test_cursor_and_reader() {
        let mut buf = [0u8; 2];
        let mut cursor = BitCursor::new(&mut buf);
        cursor.put(3, 0b101).unwrap();
        cursor.put_bool(true).unwrap();
        cursor.put(11, 0x7FF).unwrap();
        assert_eq!(cursor.bit_pos(), 15);
        assert_eq!(cursor.octets_written(), 2);
        assert_eq!(buf, [0b1011_1111, 0b1111_1110]);

        let mut reader = BitReader::new(&buf);
        assert_eq!(reader.take(3).unwrap(), 0b101);
        assert!(reader.take_bool().unwrap());
        assert_eq!(reader.take(11).unwrap(), 0x7FF);
        assert!(!reader.take_bool().unwrap());
        assert!(reader.take(1).is_err());
    }

    #[test]
    fn test_bit_field_entry() {
        let field = BitField::new(21, 6);
        assert_eq!(field.end(), 27);
        assert_eq!(field.max_value(), 63);
        let mut buf = [0u8; 4];
        field.write(&mut buf, 0b110101).unwrap();
        assert_eq!(field.read(&buf).unwrap(), 0b110101);
    }
}
