//! Growable tagged binary writer.

use crate::head::{Head, Kind};
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::HashMap;

/// Serializes tagged values into an in-memory buffer.
///
/// Writes cannot fail: the buffer grows as needed. Integers are always
/// written in the narrowest encoding that holds the value.
#[derive(Debug, Clone, Default)]
pub struct TarsWriter {
    buf: BytesMut,
}

impl TarsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Discards everything written so far, keeping the allocation.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.buf.to_vec()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn write_head(&mut self, kind: Kind, tag: u8) {
        Head::new(kind, tag).encode(&mut self.buf);
    }

    pub fn write_i8(&mut self, value: i8, tag: u8) {
        if value == 0 {
            self.write_head(Kind::ZeroTag, tag);
        } else {
            self.write_head(Kind::Int8, tag);
            self.buf.put_i8(value);
        }
    }

    pub fn write_i16(&mut self, value: i16, tag: u8) {
        if let Ok(narrow) = i8::try_from(value) {
            self.write_i8(narrow, tag);
        } else {
            self.write_head(Kind::Int16, tag);
            self.buf.put_i16(value);
        }
    }

    pub fn write_i32(&mut self, value: i32, tag: u8) {
        if let Ok(narrow) = i16::try_from(value) {
            self.write_i16(narrow, tag);
        } else {
            self.write_head(Kind::Int32, tag);
            self.buf.put_i32(value);
        }
    }

    pub fn write_i64(&mut self, value: i64, tag: u8) {
        if let Ok(narrow) = i32::try_from(value) {
            self.write_i32(narrow, tag);
        } else {
            self.write_head(Kind::Int64, tag);
            self.buf.put_i64(value);
        }
    }

    pub fn write_bool(&mut self, value: bool, tag: u8) {
        self.write_i8(i8::from(value), tag);
    }

    pub fn write_f32(&mut self, value: f32, tag: u8) {
        if value == 0.0 {
            self.write_head(Kind::ZeroTag, tag);
        } else {
            self.write_head(Kind::Float, tag);
            self.buf.put_f32(value);
        }
    }

    pub fn write_f64(&mut self, value: f64, tag: u8) {
        if value == 0.0 {
            self.write_head(Kind::ZeroTag, tag);
        } else {
            self.write_head(Kind::Double, tag);
            self.buf.put_f64(value);
        }
    }

    pub fn write_string(&mut self, value: &str, tag: u8) {
        let bytes = value.as_bytes();
        match u8::try_from(bytes.len()) {
            Ok(len) => {
                self.write_head(Kind::String1, tag);
                self.buf.put_u8(len);
            }
            Err(_) => {
                self.write_head(Kind::String4, tag);
                self.buf.put_u32(bytes.len() as u32);
            }
        }
        self.buf.put_slice(bytes);
    }

    /// Writes a complete byte list: list head, element head, length, bytes.
    pub fn write_bytes(&mut self, value: &[u8], tag: u8) {
        self.write_head(Kind::SimpleList, tag);
        self.write_head(Kind::Int8, 0);
        self.write_i32(value.len() as i32, 0);
        self.buf.put_slice(value);
    }

    /// Appends bytes with no framing at all.
    pub fn write_raw(&mut self, value: &[u8]) {
        self.buf.put_slice(value);
    }

    /// Writes a container length at tag 0, as maps and lists expect.
    pub fn write_len(&mut self, len: usize) {
        self.write_i32(len as i32, 0);
    }

    pub fn write_string_map(&mut self, value: &HashMap<String, String>, tag: u8) {
        self.write_head(Kind::Map, tag);
        self.write_len(value.len());
        for (k, v) in value {
            self.write_string(k, 0);
            self.write_string(v, 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_uses_zero_tag() {
        let mut w = TarsWriter::new();
        w.write_i32(0, 3);
        assert_eq!(w.as_bytes(), &[0x3C]);
    }

    #[test]
    fn test_narrowest_integer() {
        let mut w = TarsWriter::new();
        w.write_i64(5, 0);
        assert_eq!(w.as_bytes(), &[0x00, 0x05]);

        w.reset();
        w.write_i32(300, 1);
        assert_eq!(w.as_bytes(), &[0x11, 0x01, 0x2C]);

        w.reset();
        w.write_i32(-70_000, 0);
        assert_eq!(w.as_bytes(), &[0x02, 0xFF, 0xFE, 0xEE, 0x90]);

        w.reset();
        w.write_i64(1 << 40, 0);
        assert_eq!(w.as_bytes()[0], 0x03);
        assert_eq!(w.len(), 9);
    }

    #[test]
    fn test_short_and_long_strings() {
        let mut w = TarsWriter::new();
        w.write_string("abc", 5);
        assert_eq!(w.as_bytes(), &[0x56, 3, b'a', b'b', b'c']);

        w.reset();
        let long = "x".repeat(300);
        w.write_string(&long, 0);
        assert_eq!(&w.as_bytes()[..5], &[0x07, 0x00, 0x00, 0x01, 0x2C]);
        assert_eq!(w.len(), 5 + 300);
    }

    #[test]
    fn test_byte_list_framing() {
        let mut w = TarsWriter::new();
        w.write_bytes(&[0xAA, 0xBB], 7);
        assert_eq!(w.as_bytes(), &[0x7D, 0x00, 0x00, 0x02, 0xAA, 0xBB]);
    }

    #[test]
    fn test_empty_byte_list() {
        let mut w = TarsWriter::new();
        w.write_bytes(&[], 0);
        assert_eq!(w.as_bytes(), &[0x0D, 0x00, 0x0C]);
    }

    #[test]
    fn test_string_map() {
        let mut map = HashMap::new();
        map.insert("k".to_string(), "v".to_string());
        let mut w = TarsWriter::new();
        w.write_string_map(&map, 9);
        assert_eq!(
            w.as_bytes(),
            &[0x98, 0x00, 0x01, 0x06, 1, b'k', 0x16, 1, b'v']
        );
    }

    #[test]
    fn test_reset_keeps_writer_usable() {
        let mut w = TarsWriter::with_capacity(16);
        w.write_bool(true, 0);
        assert!(!w.is_empty());
        w.reset();
        assert!(w.is_empty());
        w.write_f64(0.0, 2);
        assert_eq!(w.to_vec(), vec![0x2C]);
    }
}
