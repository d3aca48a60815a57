//! MSB-first bit field extraction.
//!
//! CCSDS headers pack fields at arbitrary bit offsets with the most significant bit of each
//! octet transmitted first. [unpack] reads a fixed list of field widths from the front of a
//! buffer, crossing octet boundaries as needed.
use crate::{Error, Result};

/// Sequential reader over the bits of a byte slice.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Number of bits not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() * 8 - self.pos
    }

    /// Read the next `width` bits as an unsigned value.
    ///
    /// # Errors
    /// [Error::BufferTooShort] if fewer than `width` bits remain.
    pub fn read(&mut self, width: u8, field: &'static str) -> Result<u64> {
        debug_assert!(width <= 64, "field wider than 64 bits");
        let width = usize::from(width);
        if self.remaining() < width {
            return Err(Error::BufferTooShort {
                field,
                required_bits: self.pos + width,
                available_bits: self.buf.len() * 8,
            });
        }
        let mut value = 0u64;
        for _ in 0..width {
            let byte = self.buf[self.pos / 8];
            let bit = (byte >> (7 - self.pos % 8)) & 0x1;
            value = (value << 1) | u64::from(bit);
            self.pos += 1;
        }
        Ok(value)
    }

    /// Read a single bit as a flag.
    ///
    /// # Errors
    /// [Error::BufferTooShort] if no bits remain.
    pub fn read_flag(&mut self, field: &'static str) -> Result<bool> {
        Ok(self.read(1, field)? == 1)
    }
}

/// Unpack `widths.len()` consecutive fields from the start of `buf`.
///
/// Width-1 fields come back as `0` or `1`; callers treat them as flags. The buffer is checked
/// up front so nothing is decoded from a short buffer.
///
/// # Errors
/// [Error::BufferTooShort] if `buf` holds fewer bits than `widths` sum to.
pub fn unpack<const N: usize>(buf: &[u8], widths: [u8; N], field: &'static str) -> Result<[u64; N]> {
    let required: usize = widths.iter().map(|w| usize::from(*w)).sum();
    let available = buf.len() * 8;
    if available < required {
        return Err(Error::BufferTooShort {
            field,
            required_bits: required,
            available_bits: available,
        });
    }

    let mut reader = BitReader::new(buf);
    let mut values = [0u64; N];
    for (value, width) in values.iter_mut().zip(widths) {
        *value = reader.read(width, field)?;
    }
    Ok(values)
}
