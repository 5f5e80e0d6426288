//! Binary-format reader for the WebAssembly module stream.
//!
//! `ByteReader` wraps any `io::Read` (in practice a zstd decoder) as a
//! pull-based byte cursor and decodes the primitive shapes the binary
//! format is built from: fixed-width little-endian values, LEB128
//! integers, length-prefixed names, result-type vectors and limits.
//! Every decode inconsistency is fatal; the input is trusted output of a
//! cooperating compiler and there is no recovery path.

use crate::types::ValueType;
use anyhow::{bail, Context, Result};
use std::io::Read;

/// Resolved `(min, max)` limits pair. A missing maximum is represented by
/// the `u32::MAX` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub min: u32,
    pub max: u32,
}

/// Pull-based byte cursor over a decompressed module stream.
///
/// Holds at most one byte of lookahead, which `skip_to_section` uses to
/// stop in front of a section it does not want to consume.
pub struct ByteReader<R: Read> {
    input: R,
    peeked: Option<u8>,
}

impl<R: Read> ByteReader<R> {
    pub fn new(input: R) -> Self {
        ByteReader {
            input,
            peeked: None,
        }
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        if let Some(b) = self.peeked.take() {
            return Ok(Some(b));
        }
        let mut buf = [0u8; 1];
        loop {
            match self.input.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context("reading input stream"),
            }
        }
    }

    /// Read one byte; the universal primitive everything else builds on.
    pub fn read_byte(&mut self) -> Result<u8> {
        match self.next_byte()? {
            Some(b) => Ok(b),
            None => bail!("unexpected end of input stream"),
        }
    }

    /// Look at the next byte without consuming it. `None` at end of stream.
    pub fn peek_byte(&mut self) -> Result<Option<u8>> {
        if self.peeked.is_none() {
            self.peeked = self.next_byte()?;
        }
        Ok(self.peeked)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(len);
        for _ in 0..len {
            buf.push(self.read_byte()?);
        }
        Ok(buf)
    }

    pub fn skip_bytes(&mut self, len: u64) -> Result<()> {
        for _ in 0..len {
            self.read_byte()?;
        }
        Ok(())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let mut value = 0u32;
        for shift in [0, 8, 16, 24] {
            value |= u32::from(self.read_byte()?) << shift;
        }
        Ok(value)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for shift in [0, 8, 16, 24, 32, 40, 48, 56] {
            value |= u64::from(self.read_byte()?) << shift;
        }
        Ok(value)
    }

    /// Floats are the bit pattern of the integer decode; there is no
    /// float-specific decoding path.
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    pub fn read_leb_u32(&mut self) -> Result<u32> {
        let mut value = 0u32;
        let mut shift = 0u32;
        loop {
            let byte = self.read_byte()?;
            if shift >= 32 {
                bail!("LEB128 value overflows u32");
            }
            // Only 4 payload bits of the fifth byte fit in the width.
            if shift == 28 && byte & 0x70 != 0 {
                bail!("LEB128 value overflows u32");
            }
            value |= u32::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    pub fn read_leb_u64(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_byte()?;
            if shift >= 64 {
                bail!("LEB128 value overflows u64");
            }
            // Only 1 payload bit of the tenth byte fits in the width.
            if shift == 63 && byte & 0x7e != 0 {
                bail!("LEB128 value overflows u64");
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    pub fn read_leb_i32(&mut self) -> Result<i32> {
        let mut value = 0i32;
        let mut shift = 0u32;
        loop {
            let byte = self.read_byte()?;
            if shift >= 32 {
                bail!("LEB128 value overflows i32");
            }
            // Payload bits past the width must replicate the sign bit.
            if shift == 28 {
                let spill = byte & 0x70;
                let valid = if byte & 0x08 != 0 { 0x70 } else { 0 };
                if spill != valid {
                    bail!("LEB128 value overflows i32");
                }
            }
            value |= i32::from(byte & 0x7f).wrapping_shl(shift);
            shift += 7;
            if byte & 0x80 == 0 {
                // Sign-extend from the final payload's sign bit when the
                // encoded value does not fill the full width.
                if shift < 32 && byte & 0x40 != 0 {
                    value |= -1i32 << shift;
                }
                return Ok(value);
            }
        }
    }

    pub fn read_leb_i64(&mut self) -> Result<i64> {
        let mut value = 0i64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_byte()?;
            if shift >= 64 {
                bail!("LEB128 value overflows i64");
            }
            if shift == 63 {
                let spill = byte & 0x7e;
                let valid = if byte & 0x01 != 0 { 0x7e } else { 0 };
                if spill != valid {
                    bail!("LEB128 value overflows i64");
                }
            }
            value |= i64::from(byte & 0x7f).wrapping_shl(shift);
            shift += 7;
            if byte & 0x80 == 0 {
                if shift < 64 && byte & 0x40 != 0 {
                    value |= -1i64 << shift;
                }
                return Ok(value);
            }
        }
    }

    /// Length-prefixed UTF-8 name, copied out as an owned string.
    pub fn read_name(&mut self) -> Result<String> {
        let len = self.read_leb_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes).context("name is not valid UTF-8")
    }

    /// Scan forward to the section with the given id, skipping custom (0),
    /// start (8), data-count (12) and earlier-numbered sections. Returns
    /// the section's payload length, or `None` if the module has no such
    /// section (the scan leaves the next section header unconsumed).
    pub fn skip_to_section(&mut self, expected: u8) -> Result<Option<u32>> {
        loop {
            let id = match self.peek_byte()? {
                Some(id) => id,
                None => return Ok(None),
            };
            if id == expected {
                self.read_byte()?;
                return Ok(Some(self.read_leb_u32()?));
            }
            if id == 0 || id == 8 || id == 12 || id < expected {
                self.read_byte()?;
                let len = self.read_leb_u32()?;
                self.skip_bytes(u64::from(len))
                    .with_context(|| format!("skipping section id {id}"))?;
            } else {
                return Ok(None);
            }
        }
    }

    /// LEB128 count followed by that many value-type tags.
    pub fn read_result_type(&mut self) -> Result<Vec<ValueType>> {
        let count = self.read_leb_u32()?;
        let mut types = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let tag = self.read_leb_i64()?;
            types.push(ValueType::from_tag(tag)?);
        }
        Ok(types)
    }

    /// Flag byte then one or two u32s; `max` defaults to the `u32::MAX`
    /// sentinel when absent.
    pub fn read_limits(&mut self) -> Result<Limits> {
        let flag = self.read_byte()?;
        let min = self.read_leb_u32()?;
        let max = match flag {
            0 => u32::MAX,
            1 => self.read_leb_u32()?,
            _ => bail!("bad limits flag 0x{flag:02x}"),
        };
        Ok(Limits { min, max })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(bytes: &[u8]) -> ByteReader<&[u8]> {
        ByteReader::new(bytes)
    }

    #[test]
    fn read_byte_reports_eof() {
        let mut r = reader(&[0x01]);
        assert_eq!(r.read_byte().unwrap(), 1);
        let err = r.read_byte().unwrap_err();
        assert!(err.to_string().contains("unexpected end of input stream"));
    }

    #[test]
    fn peek_does_not_consume() {
        let mut r = reader(&[0xAA, 0xBB]);
        assert_eq!(r.peek_byte().unwrap(), Some(0xAA));
        assert_eq!(r.peek_byte().unwrap(), Some(0xAA));
        assert_eq!(r.read_byte().unwrap(), 0xAA);
        assert_eq!(r.read_byte().unwrap(), 0xBB);
        assert_eq!(r.peek_byte().unwrap(), None);
    }

    #[test]
    fn little_endian_fixed_width() {
        let mut r = reader(&[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(r.read_u32().unwrap(), 0x12345678);

        let mut r = reader(&[0, 0, 0x80, 0x3f]);
        assert_eq!(r.read_f32().unwrap(), 1.0);

        let mut r = reader(&[0, 0, 0, 0, 0, 0, 0xf0, 0x3f]);
        assert_eq!(r.read_f64().unwrap(), 1.0);
    }

    #[test]
    fn leb_unsigned() {
        assert_eq!(reader(&[0x00]).read_leb_u32().unwrap(), 0);
        assert_eq!(reader(&[0x7f]).read_leb_u32().unwrap(), 127);
        assert_eq!(reader(&[0x80, 0x01]).read_leb_u32().unwrap(), 128);
        assert_eq!(reader(&[0xE5, 0x8E, 0x26]).read_leb_u32().unwrap(), 624485);
        assert_eq!(
            reader(&[0xff, 0xff, 0xff, 0xff, 0x0f])
                .read_leb_u32()
                .unwrap(),
            u32::MAX
        );
    }

    #[test]
    fn leb_signed_sign_extension() {
        assert_eq!(reader(&[0x7f]).read_leb_i32().unwrap(), -1);
        assert_eq!(reader(&[0x41]).read_leb_i32().unwrap(), -63);
        assert_eq!(reader(&[0x40]).read_leb_i32().unwrap(), -64);
        assert_eq!(reader(&[0x3f]).read_leb_i32().unwrap(), 63);
        assert_eq!(reader(&[0x80, 0x7f]).read_leb_i32().unwrap(), -128);
        assert_eq!(
            reader(&[0x80, 0x80, 0x80, 0x80, 0x78])
                .read_leb_i32()
                .unwrap(),
            i32::MIN
        );
        assert_eq!(reader(&[0x7f]).read_leb_i64().unwrap(), -1);
        assert_eq!(
            reader(&[0x80, 0x80, 0x80, 0x80, 0x78])
                .read_leb_i64()
                .unwrap(),
            -2147483648
        );
    }

    #[test]
    fn leb_overflow_is_fatal() {
        let err = reader(&[0xff, 0xff, 0xff, 0xff, 0xff, 0x01])
            .read_leb_u32()
            .unwrap_err();
        assert!(err.to_string().contains("overflows u32"));
    }

    #[test]
    fn leb_spilled_payload_bits_are_fatal() {
        // Fifth byte carries payload bits 32..34; anything set there is
        // out of range for u32.
        let err = reader(&[0xff, 0xff, 0xff, 0xff, 0x1f])
            .read_leb_u32()
            .unwrap_err();
        assert!(err.to_string().contains("overflows u32"));

        // Signed: the spilled bits must replicate the sign bit. 0x0f has
        // the sign bit set with zero spill, which no i32 encodes.
        let err = reader(&[0xff, 0xff, 0xff, 0xff, 0x0f])
            .read_leb_i32()
            .unwrap_err();
        assert!(err.to_string().contains("overflows i32"));

        // Tenth byte of a u64 holds exactly one payload bit.
        let mut bytes = vec![0x80u8; 9];
        bytes.push(0x02);
        let err = reader(&bytes).read_leb_u64().unwrap_err();
        assert!(err.to_string().contains("overflows u64"));
        let mut bytes = vec![0xffu8; 9];
        bytes.push(0x01);
        assert_eq!(reader(&bytes).read_leb_u64().unwrap(), u64::MAX);

        let mut bytes = vec![0x80u8; 9];
        bytes.push(0x7e);
        let err = reader(&bytes).read_leb_i64().unwrap_err();
        assert!(err.to_string().contains("overflows i64"));
        let mut bytes = vec![0x80u8; 9];
        bytes.push(0x7f);
        assert_eq!(reader(&bytes).read_leb_i64().unwrap(), i64::MIN);
    }

    #[test]
    fn name_round_trip() {
        let mut bytes = vec![0x05];
        bytes.extend_from_slice(b"hello");
        assert_eq!(reader(&bytes).read_name().unwrap(), "hello");
    }

    #[test]
    fn limits_with_and_without_max() {
        let mut r = reader(&[0x00, 0x02]);
        assert_eq!(
            r.read_limits().unwrap(),
            Limits {
                min: 2,
                max: u32::MAX
            }
        );
        let mut r = reader(&[0x01, 0x02, 0x0a]);
        assert_eq!(r.read_limits().unwrap(), Limits { min: 2, max: 10 });
    }

    #[test]
    fn skip_to_section_scans_forward() {
        // custom section (id 0, len 2), then type section (id 1, len 3)
        let bytes = [0x00, 0x02, 0xaa, 0xbb, 0x01, 0x03, 0x01, 0x02, 0x03];
        let mut r = reader(&bytes);
        assert_eq!(r.skip_to_section(1).unwrap(), Some(3));
        assert_eq!(r.read_byte().unwrap(), 0x01);
    }

    #[test]
    fn skip_to_section_reports_missing() {
        // memory section (id 5) present, table section (id 4) absent
        let bytes = [0x05, 0x03, 0x00, 0x01, 0x02];
        let mut r = reader(&bytes);
        assert_eq!(r.skip_to_section(4).unwrap(), None);
        // header left unconsumed for the next scan
        assert_eq!(r.skip_to_section(5).unwrap(), Some(3));
    }

    #[test]
    fn result_type_rejects_v128() {
        // count 1, tag 0x7b (v128)
        let err = reader(&[0x01, 0x7b]).read_result_type().unwrap_err();
        assert!(err.to_string().contains("v128"));
    }
}
