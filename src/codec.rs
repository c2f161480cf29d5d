//! Fixed little-endian binary codec shared by every on-disk store.
//!
//! All multi-byte integers and floats are little-endian; strings are a
//! `u32` byte length followed by UTF-8 bytes. Higher-level records
//! (literals, logical functions, axioms) build on these primitives in
//! their own modules.
//!
//! Encoding never fails; decoding returns [`CodecError`] on truncated or
//! malformed input and never panics.

use crate::error::{CodecError, CodecResult};

// ---------------------------------------------------------------------------
// Encoders
// ---------------------------------------------------------------------------

pub fn put_u8(buf: &mut Vec<u8>, v: u8) {
    buf.push(v);
}

pub fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn put_f32(buf: &mut Vec<u8>, v: f32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// Length-prefixed UTF-8 string: `u32` byte count, then the bytes.
pub fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_u32(buf, s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

// ---------------------------------------------------------------------------
// Decoder cursor
// ---------------------------------------------------------------------------

/// Bounds-checked forward cursor over an encoded byte slice.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current offset from the start of the slice.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(CodecError::Truncated {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn u8(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> CodecResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes(b.try_into().expect("2 bytes")))
    }

    pub fn u32(&mut self) -> CodecResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes(b.try_into().expect("4 bytes")))
    }

    pub fn u64(&mut self) -> CodecResult<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes(b.try_into().expect("8 bytes")))
    }

    pub fn f32(&mut self) -> CodecResult<f32> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes(b.try_into().expect("4 bytes")))
    }

    /// Length-prefixed UTF-8 string.
    pub fn string(&mut self) -> CodecResult<String> {
        let len = self.u32()? as usize;
        let offset = self.pos;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|source| CodecError::Utf8 { offset, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_round_trips() {
        let mut buf = Vec::new();
        put_u8(&mut buf, 0xab);
        put_u16(&mut buf, 517);
        put_u32(&mut buf, 70_000);
        put_u64(&mut buf, u64::MAX - 1);
        put_f32(&mut buf, 2.5);
        put_str(&mut buf, "p/2");

        let mut r = ByteReader::new(&buf);
        assert_eq!(r.u8().unwrap(), 0xab);
        assert_eq!(r.u16().unwrap(), 517);
        assert_eq!(r.u32().unwrap(), 70_000);
        assert_eq!(r.u64().unwrap(), u64::MAX - 1);
        assert_eq!(r.f32().unwrap(), 2.5);
        assert_eq!(r.string().unwrap(), "p/2");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn encoded_length_is_deterministic() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        put_str(&mut a, "predicate/3");
        put_str(&mut b, "predicate/3");
        assert_eq!(a, b);
        assert_eq!(a.len(), 4 + "predicate/3".len());
    }

    #[test]
    fn unicode_string_round_trip() {
        let mut buf = Vec::new();
        put_str(&mut buf, "犬/1");
        let mut r = ByteReader::new(&buf);
        assert_eq!(r.string().unwrap(), "犬/1");
    }

    #[test]
    fn truncated_read_reports_offset() {
        let mut buf = Vec::new();
        put_u32(&mut buf, 9);
        let mut r = ByteReader::new(&buf[..2]);
        let err = r.u32().unwrap_err();
        match err {
            CodecError::Truncated {
                offset,
                needed,
                available,
            } => {
                assert_eq!(offset, 0);
                assert_eq!(needed, 4);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn truncated_string_payload() {
        let mut buf = Vec::new();
        put_str(&mut buf, "hello");
        buf.truncate(6); // length header promises 5 bytes, only 2 remain
        let mut r = ByteReader::new(&buf);
        assert!(matches!(r.string(), Err(CodecError::Truncated { .. })));
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        let mut buf = Vec::new();
        put_u32(&mut buf, 2);
        buf.extend_from_slice(&[0xff, 0xfe]);
        let mut r = ByteReader::new(&buf);
        assert!(matches!(r.string(), Err(CodecError::Utf8 { .. })));
    }
}
