//! TLV (Type‑Length‑Value) encoding and decoding utilities.
//!
//! The codec never allocates: an [`Encoder`] writes into a caller-owned
//! slice and a [`Decoder`] walks a borrowed slice with a bounds-checked
//! cursor. Sizes are probed with [`var_number_size`] and friends before
//! writing, so a correctly sized buffer is never overrun.

use crate::error::Error;
use bytes::{Buf, BufMut};

/* ---------------------------------------------------------------- *
 * TLV type constants
 * ---------------------------------------------------------------- */

pub const TLV_INTEREST: u32 = 0x05;
pub const TLV_DATA: u32 = 0x06;
pub const TLV_NAME: u32 = 0x07;
pub const TLV_COMPONENT: u32 = 0x08;
pub const TLV_NONCE: u32 = 0x0A;
pub const TLV_INTEREST_LIFETIME: u32 = 0x0C;
pub const TLV_MUST_BE_FRESH: u32 = 0x12;
pub const TLV_META_INFO: u32 = 0x14;
pub const TLV_CONTENT: u32 = 0x15;
pub const TLV_SIGNATURE_INFO: u32 = 0x16;
pub const TLV_SIGNATURE_VALUE: u32 = 0x17;
pub const TLV_CONTENT_TYPE: u32 = 0x18;
pub const TLV_FRESHNESS_PERIOD: u32 = 0x19;
pub const TLV_SIGNATURE_TYPE: u32 = 0x1B;
pub const TLV_FORWARDING_HINT: u32 = 0x1E;
pub const TLV_CAN_BE_PREFIX: u32 = 0x21;
pub const TLV_HOP_LIMIT: u32 = 0x22;
pub const TLV_APPLICATION_PARAMETERS: u32 = 0x24;

/// Whether an unrecognised element of this type must fail decoding.
///
/// Types below 32 and odd types are critical; the rest may be skipped.
pub fn is_critical(tlv_type: u32) -> bool {
    tlv_type < 32 || tlv_type & 1 == 1
}

/* ---------------------------------------------------------------- *
 * Size probes
 * ---------------------------------------------------------------- */

/// Number of bytes required to encode `value` as a VAR-NUMBER.
///
/// * `< 253`  → 1 byte
/// * `≤ 65 535`  → marker 253 + 2‑byte value
/// * `≤ u32::MAX` → marker 254 + 4‑byte value
/// * otherwise → marker 255 + 8‑byte value
pub fn var_number_size(value: u64) -> usize {
    if value < 253 {
        1
    } else if value <= u16::MAX as u64 {
        3
    } else if value <= u32::MAX as u64 {
        5
    } else {
        9
    }
}

/// Number of bytes required to encode `value` as a NonNegativeInteger.
pub fn non_negative_integer_size(value: u64) -> usize {
    if value <= u8::MAX as u64 {
        1
    } else if value <= u16::MAX as u64 {
        2
    } else if value <= u32::MAX as u64 {
        4
    } else {
        8
    }
}

/// Total encoded size of a block with the given type and value length.
pub fn block_size(tlv_type: u32, value_len: usize) -> usize {
    var_number_size(tlv_type as u64) + var_number_size(value_len as u64) + value_len
}

/* ---------------------------------------------------------------- *
 * Encoder
 * ---------------------------------------------------------------- */

/// Append-only writer over a caller-owned buffer.
#[derive(Debug)]
pub struct Encoder<'a> {
    buf: &'a mut [u8],
    offset: usize,
}

impl<'a> Encoder<'a> {
    /// Create an encoder writing from the start of `buf`.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    /// Number of bytes written so far.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Free space left in the buffer.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    /// The bytes written so far.
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.offset]
    }

    fn reserve(&mut self, needed: usize) -> Result<&mut [u8], Error> {
        if self.remaining() < needed {
            return Err(Error::BufferTooSmall {
                needed,
                available: self.remaining(),
            });
        }
        let start = self.offset;
        self.offset += needed;
        Ok(&mut self.buf[start..start + needed])
    }

    /// Encode a VAR-NUMBER.
    pub fn append_var_number(&mut self, value: u64) -> Result<(), Error> {
        let mut out = self.reserve(var_number_size(value))?;
        if value < 253 {
            out.put_u8(value as u8);
        } else if value <= u16::MAX as u64 {
            out.put_u8(253);
            out.put_u16(value as u16);
        } else if value <= u32::MAX as u64 {
            out.put_u8(254);
            out.put_u32(value as u32);
        } else {
            out.put_u8(255);
            out.put_u64(value);
        }
        Ok(())
    }

    /// Encode the TLV *type* field.
    pub fn append_type(&mut self, tlv_type: u32) -> Result<(), Error> {
        self.append_var_number(tlv_type as u64)
    }

    /// Encode the TLV *length* field.
    pub fn append_length(&mut self, length: usize) -> Result<(), Error> {
        self.append_var_number(length as u64)
    }

    /// Copy raw bytes verbatim.
    pub fn append_raw_buffer(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.reserve(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Encode a single fixed-width byte.
    pub fn append_u8(&mut self, value: u8) -> Result<(), Error> {
        self.reserve(1)?.put_u8(value);
        Ok(())
    }

    /// Encode a fixed-width big-endian `u16`.
    pub fn append_u16(&mut self, value: u16) -> Result<(), Error> {
        self.reserve(2)?.put_u16(value);
        Ok(())
    }

    /// Encode a fixed-width big-endian `u32`.
    pub fn append_u32(&mut self, value: u32) -> Result<(), Error> {
        self.reserve(4)?.put_u32(value);
        Ok(())
    }

    /// Encode a fixed-width big-endian `u64`.
    pub fn append_u64(&mut self, value: u64) -> Result<(), Error> {
        self.reserve(8)?.put_u64(value);
        Ok(())
    }

    /// Encode `value` using the narrowest NonNegativeInteger width.
    pub fn append_non_negative_integer(&mut self, value: u64) -> Result<(), Error> {
        match non_negative_integer_size(value) {
            1 => self.append_u8(value as u8),
            2 => self.append_u16(value as u16),
            4 => self.append_u32(value as u32),
            _ => self.append_u64(value),
        }
    }

    /// Encode a complete block whose value is `value`.
    pub fn append_block(&mut self, tlv_type: u32, value: &[u8]) -> Result<(), Error> {
        self.append_type(tlv_type)?;
        self.append_length(value.len())?;
        self.append_raw_buffer(value)
    }

    /// Encode a complete block holding a NonNegativeInteger.
    pub fn append_non_negative_integer_block(
        &mut self,
        tlv_type: u32,
        value: u64,
    ) -> Result<(), Error> {
        self.append_type(tlv_type)?;
        self.append_length(non_negative_integer_size(value))?;
        self.append_non_negative_integer(value)
    }
}

/* ---------------------------------------------------------------- *
 * Decoder
 * ---------------------------------------------------------------- */

/// Cursor over an immutable input buffer.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Decoder<'a> {
    /// Create a decoder positioned at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    /// Current cursor position.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    /// Whether any input is left.
    pub fn has_remaining(&self) -> bool {
        self.offset < self.buf.len()
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], Error> {
        if self.remaining() < needed {
            return Err(Error::TlvOversize {
                needed,
                remaining: self.remaining(),
            });
        }
        let start = self.offset;
        self.offset += needed;
        Ok(&self.buf[start..start + needed])
    }

    /// Decode a VAR-NUMBER.
    pub fn get_var_number(&mut self) -> Result<u64, Error> {
        let first = self.take(1)?[0];
        match first {
            0..=252 => Ok(first as u64),
            253 => Ok(self.take(2)?.get_u16() as u64),
            254 => Ok(self.take(4)?.get_u32() as u64),
            255 => Ok(self.take(8)?.get_u64()),
        }
    }

    /// Decode the TLV *type* field.
    pub fn get_type(&mut self) -> Result<u32, Error> {
        let value = self.get_var_number()?;
        u32::try_from(value).map_err(|_| Error::TlvWrongType {
            expected: 0,
            found: u32::MAX,
        })
    }

    /// Decode the TLV *length* field, checking it against the remaining input.
    pub fn get_length(&mut self) -> Result<usize, Error> {
        let length = self.get_var_number()?;
        if length > self.remaining() as u64 {
            return Err(Error::TlvOversize {
                needed: usize::try_from(length).unwrap_or(usize::MAX),
                remaining: self.remaining(),
            });
        }
        Ok(length as usize)
    }

    /// Borrow the next `length` bytes verbatim.
    pub fn get_raw_buffer(&mut self, length: usize) -> Result<&'a [u8], Error> {
        self.take(length)
    }

    /// Decode a single byte.
    pub fn get_u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    /// Decode a fixed-width big-endian `u16`.
    pub fn get_u16(&mut self) -> Result<u16, Error> {
        Ok(self.take(2)?.get_u16())
    }

    /// Decode a fixed-width big-endian `u32`.
    pub fn get_u32(&mut self) -> Result<u32, Error> {
        Ok(self.take(4)?.get_u32())
    }

    /// Decode a fixed-width big-endian `u64`.
    pub fn get_u64(&mut self) -> Result<u64, Error> {
        Ok(self.take(8)?.get_u64())
    }

    /// Decode a NonNegativeInteger whose declared length is `length`.
    pub fn get_non_negative_integer(&mut self, length: usize) -> Result<u64, Error> {
        match length {
            1 => self.get_u8().map(u64::from),
            2 => self.get_u16().map(u64::from),
            4 => self.get_u32().map(u64::from),
            8 => self.get_u64(),
            other => Err(Error::TlvWrongLength(other)),
        }
    }

    /// Look at the next type without consuming it.
    pub fn peek_type(&self) -> Result<u32, Error> {
        self.clone().get_type()
    }

    /// Decode one complete block, returning its type and value.
    pub fn get_block(&mut self) -> Result<(u32, &'a [u8]), Error> {
        let tlv_type = self.get_type()?;
        let length = self.get_length()?;
        Ok((tlv_type, self.take(length)?))
    }

    /// Decode one block that must carry `expected` as its type.
    pub fn expect_block(&mut self, expected: u32) -> Result<&'a [u8], Error> {
        let (found, value) = self.get_block()?;
        if found != expected {
            return Err(Error::TlvWrongType { expected, found });
        }
        Ok(value)
    }

    /// Decode a block holding a NonNegativeInteger, returning its value.
    pub fn expect_non_negative_integer_block(&mut self, expected: u32) -> Result<u64, Error> {
        let value = self.expect_block(expected)?;
        Decoder::new(value).get_non_negative_integer(value.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critical_types() {
        assert!(is_critical(TLV_FORWARDING_HINT));
        assert!(is_critical(0x1F));
        assert!(is_critical(0x25));
        assert!(!is_critical(0x26));
        assert!(!is_critical(0x2C));
    }

    #[test]
    fn test_var_number_widths() {
        let mut buf = [0u8; 16];

        let mut enc = Encoder::new(&mut buf);
        enc.append_var_number(100).unwrap();
        assert_eq!(enc.written(), &[100]);

        let mut enc = Encoder::new(&mut buf);
        enc.append_var_number(1000).unwrap();
        assert_eq!(enc.written(), &[253, 0x03, 0xE8]);

        let mut enc = Encoder::new(&mut buf);
        enc.append_var_number(100_000).unwrap();
        assert_eq!(enc.written(), &[254, 0x00, 0x01, 0x86, 0xA0]);

        let mut dec = Decoder::new(&[254, 0x00, 0x01, 0x86, 0xA0]);
        assert_eq!(dec.get_var_number().unwrap(), 100_000);
        assert!(!dec.has_remaining());
    }

    #[test]
    fn test_boundary_values() {
        assert_eq!(var_number_size(252), 1);
        assert_eq!(var_number_size(253), 3);
        assert_eq!(var_number_size(65_535), 3);
        assert_eq!(var_number_size(65_536), 5);
        assert_eq!(non_negative_integer_size(255), 1);
        assert_eq!(non_negative_integer_size(256), 2);
        assert_eq!(block_size(TLV_NAME, 300), 1 + 3 + 300);
    }

    #[test]
    fn test_block_encoding() {
        let mut buf = [0u8; 8];
        let mut enc = Encoder::new(&mut buf);
        enc.append_block(1, b"abc").unwrap();
        assert_eq!(enc.offset(), 5);
        assert_eq!(enc.written(), &[1, 3, b'a', b'b', b'c']);

        let mut dec = Decoder::new(&buf[..5]);
        let (t, v) = dec.get_block().unwrap();
        assert_eq!(t, 1);
        assert_eq!(v, b"abc");
    }

    #[test]
    fn test_encoder_never_overruns() {
        let mut buf = [0u8; 2];
        let mut enc = Encoder::new(&mut buf);
        let err = enc.append_block(1, b"abc").unwrap_err();
        assert!(matches!(err, Error::BufferTooSmall { .. }));
    }

    #[test]
    fn test_oversize_length_rejected() {
        // Declares 10 bytes of value but carries only 2.
        let mut dec = Decoder::new(&[0x08, 10, b'a', b'b']);
        assert_eq!(dec.get_type().unwrap(), 0x08);
        let err = dec.get_length().unwrap_err();
        assert!(matches!(err, Error::TlvOversize { needed: 10, remaining: 2 }));
    }

    #[test]
    fn test_truncated_var_number() {
        let mut dec = Decoder::new(&[253, 0x01]);
        assert!(matches!(
            dec.get_var_number(),
            Err(Error::TlvOversize { .. })
        ));
    }

    #[test]
    fn test_non_negative_integer_widths() {
        let mut buf = [0u8; 16];
        let mut enc = Encoder::new(&mut buf);
        enc.append_non_negative_integer_block(TLV_INTEREST_LIFETIME, 4000)
            .unwrap();
        assert_eq!(enc.written(), &[0x0C, 2, 0x0F, 0xA0]);

        let mut dec = Decoder::new(&buf[..4]);
        assert_eq!(
            dec.expect_non_negative_integer_block(TLV_INTEREST_LIFETIME)
                .unwrap(),
            4000
        );

        let mut dec = Decoder::new(&[1, 2, 3]);
        assert!(matches!(
            dec.get_non_negative_integer(3),
            Err(Error::TlvWrongLength(3))
        ));
    }

    #[test]
    fn test_wrong_type() {
        let mut dec = Decoder::new(&[0x06, 0]);
        assert!(matches!(
            dec.expect_block(TLV_INTEREST),
            Err(Error::TlvWrongType { expected: 0x05, found: 0x06 })
        ));
    }

    #[test]
    fn test_peek_does_not_advance() {
        let dec = Decoder::new(&[0x07, 0]);
        assert_eq!(dec.peek_type().unwrap(), TLV_NAME);
        assert_eq!(dec.offset(), 0);
    }
}
