//! Versioned buffer of named field payloads.
//!
//! Version 3 layout (one blob per name):
//!
//! ```text
//! MAP(tag 0) count
//!   name: STRING(tag 0)
//!   SIMPLE_LIST(tag 1) INT8(tag 0) len+2 STRUCT_BEGIN <blob> STRUCT_END
//! ```
//!
//! Version 2 layout (one blob per name and type discriminator):
//!
//! ```text
//! MAP(tag 0) count
//!   name: STRING(tag 0)
//!   MAP(tag 1) count
//!     discriminator: STRING(tag 0)
//!     SIMPLE_LIST(tag 1) INT8(tag 0) len+2 STRUCT_BEGIN <blob> STRUCT_END
//! ```
//!
//! The return value slot uses the reserved empty name and carries a bare
//! integer inside the byte list, without struct markers.

use crate::error::TupError;
use crate::value::Marshal;
use crate::{RETURN_VALUE_NAME, RETURN_VALUE_TYPE, VERSION_FLAT, VERSION_LEGACY};
use bytes::Bytes;
use std::collections::BTreeMap;
use tup_codec::{CodecError, Kind, TarsReader, TarsWriter};

/// Struct begin plus struct end markers framing every blob.
const WRAP_OVERHEAD: usize = 2;

/// Field layout version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Version {
    /// Version 2: name -> type discriminator -> blob.
    #[default]
    Legacy,
    /// Version 3: name -> blob.
    Flat,
}

impl Version {
    pub fn as_i16(self) -> i16 {
        match self {
            Version::Legacy => VERSION_LEGACY,
            Version::Flat => VERSION_FLAT,
        }
    }
}

impl TryFrom<i16> for Version {
    type Error = TupError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            VERSION_LEGACY => Ok(Version::Legacy),
            VERSION_FLAT => Ok(Version::Flat),
            other => Err(TupError::UnsupportedVersion(other)),
        }
    }
}

/// Borrowed view of whichever store the buffer's version selects.
#[derive(Debug, Clone, Copy)]
pub enum RawFields<'a> {
    Legacy(&'a BTreeMap<String, BTreeMap<String, Bytes>>),
    Flat(&'a BTreeMap<String, Bytes>),
}

/// Named field payloads plus the function return value.
///
/// Only the store matching [`FieldBuffer::version`] is ever read or written.
#[derive(Debug, Clone, Default)]
pub struct FieldBuffer {
    version: Version,
    legacy: BTreeMap<String, BTreeMap<String, Bytes>>,
    flat: BTreeMap<String, Bytes>,
    return_value: Option<i32>,
    scratch: TarsWriter,
}

impl FieldBuffer {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn set_version(&mut self, version: Version) {
        if version != self.version {
            tracing::trace!(from = ?self.version, to = ?version, "switching field layout");
        }
        self.version = version;
    }

    /// Return value decoded from a response, or set for an outgoing one.
    pub fn return_value(&self) -> Option<i32> {
        self.return_value
    }

    pub fn set_return_value(&mut self, value: i32) {
        self.return_value = Some(value);
    }

    /// Number of named fields in the active store.
    pub fn len(&self) -> usize {
        match self.version {
            Version::Legacy => self.legacy.len(),
            Version::Flat => self.flat.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        match self.version {
            Version::Legacy => self.legacy.contains_key(name),
            Version::Flat => self.flat.contains_key(name),
        }
    }

    pub fn raw_data(&self) -> RawFields<'_> {
        match self.version {
            Version::Legacy => RawFields::Legacy(&self.legacy),
            Version::Flat => RawFields::Flat(&self.flat),
        }
    }

    /// Serializes `value` and stores it under `name`, replacing any previous
    /// value with the same name (and, for version 2, the same discriminator).
    pub fn put<T: Marshal + ?Sized>(&mut self, name: &str, value: &T) -> Result<(), TupError> {
        if name == RETURN_VALUE_NAME {
            return Err(TupError::ReservedFieldName);
        }

        self.scratch.reset();
        value.write_to(&mut self.scratch)?;
        let blob = Bytes::copy_from_slice(self.scratch.as_bytes());

        match self.version {
            Version::Legacy => {
                self.legacy
                    .entry(name.to_string())
                    .or_default()
                    .insert(value.type_name().into_owned(), blob);
            }
            Version::Flat => {
                self.flat.insert(name.to_string(), blob);
            }
        }
        Ok(())
    }

    /// Deserializes the field stored under `name` into `value`.
    ///
    /// Returns `Ok(false)` and leaves `value` untouched when the field is
    /// absent. The empty name never matches a field: the return value is
    /// only available through [`FieldBuffer::return_value`].
    pub fn get<T: Marshal + ?Sized>(&self, name: &str, value: &mut T) -> Result<bool, TupError> {
        if name == RETURN_VALUE_NAME {
            return Ok(false);
        }

        let blob = match self.version {
            Version::Legacy => self
                .legacy
                .get(name)
                .and_then(|by_type| by_type.get(value.type_name().as_ref())),
            Version::Flat => self.flat.get(name),
        };

        match blob {
            Some(blob) => {
                value.read_from(&mut TarsReader::new(blob))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Writes the buffer into `writer`, discarding whatever it held before.
    pub fn encode(&self, writer: &mut TarsWriter) -> Result<(), TupError> {
        writer.reset();

        let slots = self.len() + usize::from(self.return_value.is_some());
        writer.write_head(Kind::Map, 0);
        writer.write_len(slots);

        if let Some(ret) = self.return_value {
            writer.write_string(RETURN_VALUE_NAME, 0);
            if self.version == Version::Legacy {
                writer.write_head(Kind::Map, 1);
                writer.write_len(1);
                writer.write_string(RETURN_VALUE_TYPE, 0);
            }
            write_return_value(writer, ret);
        }

        match self.version {
            Version::Legacy => {
                for (name, by_type) in &self.legacy {
                    writer.write_string(name, 0);
                    writer.write_head(Kind::Map, 1);
                    writer.write_len(by_type.len());
                    for (type_name, blob) in by_type {
                        writer.write_string(type_name, 0);
                        write_wrapped(writer, blob);
                    }
                }
            }
            Version::Flat => {
                for (name, blob) in &self.flat {
                    writer.write_string(name, 0);
                    write_wrapped(writer, blob);
                }
            }
        }
        Ok(())
    }

    /// Populates the buffer from `reader` using the layout of `version`.
    ///
    /// Decoding is not transactional: fields read before an error stay in
    /// the buffer.
    pub fn decode(&mut self, reader: &mut TarsReader<'_>, version: Version) -> Result<(), TupError> {
        self.set_version(version);

        reader.skip_to(Kind::Map, 0)?;
        let count = reader.read_len()?;

        for _ in 0..count {
            let name = reader.read_string(0)?;
            let is_return = name == RETURN_VALUE_NAME;

            match version {
                Version::Legacy => {
                    reader.skip_to(Kind::Map, 1)?;
                    let types = reader.read_len()?;
                    for _ in 0..types {
                        let type_name = reader.read_string(0)?;
                        if is_return {
                            self.return_value = Some(read_return_value(reader)?);
                        } else {
                            let blob = read_wrapped(reader)?;
                            self.legacy
                                .entry(name.clone())
                                .or_default()
                                .insert(type_name, blob);
                        }
                    }
                }
                Version::Flat => {
                    if is_return {
                        self.return_value = Some(read_return_value(reader)?);
                    } else {
                        let blob = read_wrapped(reader)?;
                        self.flat.insert(name, blob);
                    }
                }
            }
        }

        tracing::trace!(fields = self.len(), version = ?version, "decoded field buffer");
        Ok(())
    }
}

/// Writes a blob as a byte list whose contents are framed by struct markers.
fn write_wrapped(writer: &mut TarsWriter, blob: &[u8]) {
    writer.write_head(Kind::SimpleList, 1);
    writer.write_head(Kind::Int8, 0);
    writer.write_len(blob.len() + WRAP_OVERHEAD);
    writer.write_head(Kind::StructBegin, 0);
    writer.write_raw(blob);
    writer.write_head(Kind::StructEnd, 0);
}

/// Reads a blob written by [`write_wrapped`]. The declared length covers
/// both struct markers; the returned blob excludes them.
fn read_wrapped(reader: &mut TarsReader<'_>) -> Result<Bytes, CodecError> {
    reader.skip_to(Kind::SimpleList, 1)?;
    reader.skip_to(Kind::Int8, 0)?;
    let declared = reader.read_len()?;

    let start = reader.position();
    reader.skip_to(Kind::StructBegin, 0)?;
    let opened = reader.position() - start;

    let body = declared
        .checked_sub(opened + 1)
        .ok_or(CodecError::LengthMismatch {
            declared,
            actual: opened + 1,
        })?;
    let blob = Bytes::copy_from_slice(reader.read_raw(body)?);

    let end = reader.read_head()?;
    if end.kind != Kind::StructEnd {
        return Err(CodecError::KindMismatch {
            tag: end.tag,
            expected: Kind::StructEnd,
            actual: end.kind,
        });
    }
    Ok(blob)
}

/// Writes the return value as a bare integer inside a byte list.
fn write_return_value(writer: &mut TarsWriter, value: i32) {
    let mut body = TarsWriter::with_capacity(5);
    body.write_i32(value, 0);
    writer.write_bytes(body.as_bytes(), 1);
}

/// Reads the return value slot. Peers commonly declare a length of 4 while
/// writing the narrowest integer, so only an integer running past the
/// declared length is rejected.
fn read_return_value(reader: &mut TarsReader<'_>) -> Result<i32, CodecError> {
    reader.skip_to(Kind::SimpleList, 1)?;
    reader.skip_to(Kind::Int8, 0)?;
    let declared = reader.read_len()?;

    let start = reader.position();
    let value = reader.read_i32(0)?;
    let consumed = reader.position() - start;
    if consumed > declared {
        return Err(CodecError::LengthMismatch {
            declared,
            actual: consumed,
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[derive(Debug, Default, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    impl Marshal for Point {
        fn type_name(&self) -> Cow<'static, str> {
            Cow::Borrowed("Geo.Point")
        }

        fn write_to(&self, writer: &mut TarsWriter) -> Result<(), TupError> {
            writer.write_i32(self.x, 0);
            writer.write_i32(self.y, 1);
            Ok(())
        }

        fn read_from(&mut self, reader: &mut TarsReader<'_>) -> Result<(), TupError> {
            self.x = reader.read_i32(0)?;
            self.y = reader.read_i32(1)?;
            Ok(())
        }
    }

    struct Opaque;

    impl Marshal for Opaque {
        fn type_name(&self) -> Cow<'static, str> {
            Cow::Borrowed("Opaque")
        }
    }

    fn reencode(buffer: &FieldBuffer) -> FieldBuffer {
        let mut w = TarsWriter::new();
        buffer.encode(&mut w).unwrap();
        let bytes = w.to_vec();
        let mut out = FieldBuffer::default();
        out.decode(&mut TarsReader::new(&bytes), buffer.version())
            .unwrap();
        out
    }

    #[test]
    fn test_version_conversion() {
        assert_eq!(Version::try_from(2).unwrap(), Version::Legacy);
        assert_eq!(Version::try_from(3).unwrap(), Version::Flat);
        assert!(matches!(
            Version::try_from(1),
            Err(TupError::UnsupportedVersion(1))
        ));
        assert_eq!(Version::Flat.as_i16(), 3);
        assert_eq!(Version::default(), Version::Legacy);
    }

    #[test]
    fn test_flat_roundtrip() {
        let mut buffer = FieldBuffer::new(Version::Flat);
        buffer.put("a", &2i32).unwrap();
        buffer.put("b", &3i32).unwrap();
        buffer.put("p", &Point { x: 1, y: -1 }).unwrap();

        let decoded = reencode(&buffer);
        let (mut a, mut b, mut p) = (0i32, 0i32, Point::default());
        assert!(decoded.get("a", &mut a).unwrap());
        assert!(decoded.get("b", &mut b).unwrap());
        assert!(decoded.get("p", &mut p).unwrap());
        assert_eq!((a, b), (2, 3));
        assert_eq!(p, Point { x: 1, y: -1 });
    }

    #[test]
    fn test_legacy_discriminators_do_not_collide() {
        let mut buffer = FieldBuffer::new(Version::Legacy);
        buffer.put("arg", &7i32).unwrap();
        buffer.put("arg", &"seven".to_string()).unwrap();
        assert_eq!(buffer.len(), 1);

        let decoded = reencode(&buffer);
        let mut n = 0i32;
        let mut s = String::new();
        assert!(decoded.get("arg", &mut n).unwrap());
        assert!(decoded.get("arg", &mut s).unwrap());
        assert_eq!(n, 7);
        assert_eq!(s, "seven");

        let mut other = 0i64;
        assert!(!decoded.get("arg", &mut other).unwrap());
        assert_eq!(other, 0);
    }

    #[test]
    fn test_put_overwrites() {
        let mut buffer = FieldBuffer::new(Version::Flat);
        buffer.put("a", &1i32).unwrap();
        buffer.put("a", &9i32).unwrap();
        let mut a = 0i32;
        buffer.get("a", &mut a).unwrap();
        assert_eq!(a, 9);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_absent_field_is_not_an_error() {
        let buffer = FieldBuffer::new(Version::Flat);
        let mut c = 42i32;
        assert!(!buffer.get("c", &mut c).unwrap());
        assert_eq!(c, 42);
    }

    #[test]
    fn test_versions_are_isolated() {
        let mut buffer = FieldBuffer::new(Version::Flat);
        buffer.put("x", &1i32).unwrap();
        assert!(matches!(buffer.raw_data(), RawFields::Flat(m) if m.len() == 1));

        buffer.set_version(Version::Legacy);
        assert!(buffer.is_empty());
        assert!(!buffer.contains("x"));
        assert!(matches!(buffer.raw_data(), RawFields::Legacy(m) if m.is_empty()));

        buffer.put("y", &2i32).unwrap();
        buffer.set_version(Version::Flat);
        assert!(buffer.contains("x"));
        assert!(!buffer.contains("y"));
    }

    #[test]
    fn test_missing_capabilities() {
        let mut buffer = FieldBuffer::new(Version::Flat);
        assert!(matches!(
            buffer.put("o", &Opaque),
            Err(TupError::MissingWriteCapability(name)) if name == "Opaque"
        ));
        assert!(buffer.is_empty());

        buffer.put("o", &5i32).unwrap();
        assert!(matches!(
            buffer.get("o", &mut Opaque),
            Err(TupError::MissingReadCapability(_))
        ));
    }

    #[test]
    fn test_reserved_name() {
        let mut buffer = FieldBuffer::new(Version::Flat);
        assert!(matches!(
            buffer.put("", &1i32),
            Err(TupError::ReservedFieldName)
        ));
    }

    #[test]
    fn test_flat_wire_layout() {
        let mut buffer = FieldBuffer::new(Version::Flat);
        buffer.put("a", &2i32).unwrap();

        let mut w = TarsWriter::new();
        buffer.encode(&mut w).unwrap();
        assert_eq!(
            w.as_bytes(),
            &[
                0x08, 0x00, 0x01, // map, one entry
                0x06, 0x01, b'a', // name
                0x1D, 0x00, 0x00, 0x04, // byte list, declared length 2 + 2
                0x0A, 0x00, 0x02, 0x0B, // struct begin, int 2, struct end
            ]
        );
    }

    #[test]
    fn test_legacy_wire_layout() {
        let mut buffer = FieldBuffer::new(Version::Legacy);
        buffer.put("a", &2i32).unwrap();

        let mut w = TarsWriter::new();
        buffer.encode(&mut w).unwrap();
        let mut expected = vec![0x08, 0x00, 0x01, 0x06, 0x01, b'a', 0x18, 0x00, 0x01];
        expected.extend_from_slice(&[0x06, 5]);
        expected.extend_from_slice(b"int32");
        expected.extend_from_slice(&[0x1D, 0x00, 0x00, 0x04, 0x0A, 0x00, 0x02, 0x0B]);
        assert_eq!(w.as_bytes(), expected.as_slice());
    }

    #[test]
    fn test_return_value_roundtrip() {
        for version in [Version::Legacy, Version::Flat] {
            let mut buffer = FieldBuffer::new(version);
            buffer.set_return_value(-70_000);
            buffer.put("out", &"done".to_string()).unwrap();

            let decoded = reencode(&buffer);
            assert_eq!(decoded.return_value(), Some(-70_000));
            assert_eq!(decoded.len(), 1);

            let mut ret = 5i32;
            assert!(!decoded.get("", &mut ret).unwrap());
            assert_eq!(ret, 5);
        }
    }

    #[test]
    fn test_flat_return_slot_layout() {
        let mut buffer = FieldBuffer::new(Version::Flat);
        buffer.set_return_value(0);

        let mut w = TarsWriter::new();
        buffer.encode(&mut w).unwrap();
        assert_eq!(
            w.as_bytes(),
            &[0x08, 0x00, 0x01, 0x06, 0x00, 0x1D, 0x00, 0x00, 0x01, 0x0C]
        );
    }

    #[test]
    fn test_legacy_return_slot_layout() {
        let mut buffer = FieldBuffer::new(Version::Legacy);
        buffer.set_return_value(0);

        let mut w = TarsWriter::new();
        buffer.encode(&mut w).unwrap();
        let mut expected = vec![0x08, 0x00, 0x01, 0x06, 0x00, 0x18, 0x00, 0x01];
        expected.extend_from_slice(&[0x06, 5]);
        expected.extend_from_slice(b"int32");
        expected.extend_from_slice(&[0x1D, 0x00, 0x00, 0x01, 0x0C]);
        assert_eq!(w.as_bytes(), expected.as_slice());
    }

    #[test]
    fn test_return_slot_declared_longer_than_int() {
        let mut w = TarsWriter::new();
        w.write_head(Kind::Map, 0);
        w.write_len(1);
        w.write_string("", 0);
        w.write_head(Kind::SimpleList, 1);
        w.write_head(Kind::Int8, 0);
        w.write_len(4);
        w.write_raw(&[0x00, 0x07]);
        let bytes = w.to_vec();

        let mut buffer = FieldBuffer::default();
        buffer.decode(&mut TarsReader::new(&bytes), Version::Flat).unwrap();
        assert_eq!(buffer.return_value(), Some(7));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_return_slot_int_past_declared_length() {
        let mut w = TarsWriter::new();
        w.write_head(Kind::Map, 0);
        w.write_len(1);
        w.write_string("", 0);
        w.write_head(Kind::SimpleList, 1);
        w.write_head(Kind::Int8, 0);
        w.write_len(1);
        w.write_i32(300, 0);
        let bytes = w.to_vec();

        let mut buffer = FieldBuffer::default();
        let err = buffer
            .decode(&mut TarsReader::new(&bytes), Version::Flat)
            .unwrap_err();
        assert!(matches!(
            err,
            TupError::MalformedWireData(CodecError::LengthMismatch {
                declared: 1,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_decode_hand_built_legacy_return_slot() {
        let mut w = TarsWriter::new();
        w.write_head(Kind::Map, 0);
        w.write_len(2);
        w.write_string("", 0);
        w.write_head(Kind::Map, 1);
        w.write_len(2);
        for ret in [5i32, -9] {
            w.write_string("int32", 0);
            w.write_head(Kind::SimpleList, 1);
            w.write_head(Kind::Int8, 0);
            w.write_len(2);
            w.write_i32(ret, 0);
        }
        w.write_string("a", 0);
        w.write_head(Kind::Map, 1);
        w.write_len(1);
        w.write_string("int32", 0);
        w.write_head(Kind::SimpleList, 1);
        w.write_head(Kind::Int8, 0);
        w.write_len(4);
        w.write_head(Kind::StructBegin, 0);
        w.write_i32(8, 0);
        w.write_head(Kind::StructEnd, 0);
        let bytes = w.to_vec();

        let mut buffer = FieldBuffer::default();
        buffer
            .decode(&mut TarsReader::new(&bytes), Version::Legacy)
            .unwrap();
        assert_eq!(buffer.return_value(), Some(-9));
        assert_eq!(buffer.len(), 1);
        let mut a = 0i32;
        assert!(buffer.get("a", &mut a).unwrap());
        assert_eq!(a, 8);
    }

    #[test]
    fn test_decode_hand_built_flat_buffer() {
        let mut w = TarsWriter::new();
        w.write_head(Kind::Map, 0);
        w.write_len(1);
        w.write_string("a", 0);
        w.write_head(Kind::SimpleList, 1);
        w.write_head(Kind::Int8, 0);
        w.write_len(4);
        w.write_head(Kind::StructBegin, 0);
        w.write_i32(8, 0);
        w.write_head(Kind::StructEnd, 0);
        let bytes = w.to_vec();

        let mut buffer = FieldBuffer::default();
        buffer.decode(&mut TarsReader::new(&bytes), Version::Flat).unwrap();
        let mut a = 0i32;
        buffer.get("a", &mut a).unwrap();
        assert_eq!(a, 8);
    }

    #[test]
    fn test_decode_truncated_keeps_partial_state() {
        let mut buffer = FieldBuffer::new(Version::Flat);
        buffer.put("a", &1i32).unwrap();
        buffer.put("b", &2i32).unwrap();
        let mut w = TarsWriter::new();
        buffer.encode(&mut w).unwrap();
        let bytes = w.to_vec();

        let mut partial = FieldBuffer::default();
        let err = partial
            .decode(&mut TarsReader::new(&bytes[..bytes.len() - 3]), Version::Flat)
            .unwrap_err();
        assert!(err.is_malformed());
        assert!(partial.contains("a"));
        assert!(!partial.contains("b"));
    }

    #[test]
    fn test_decode_rejects_short_declared_length() {
        let mut w = TarsWriter::new();
        w.write_head(Kind::Map, 0);
        w.write_len(1);
        w.write_string("a", 0);
        w.write_head(Kind::SimpleList, 1);
        w.write_head(Kind::Int8, 0);
        w.write_len(1);
        w.write_head(Kind::StructBegin, 0);
        w.write_head(Kind::StructEnd, 0);
        let bytes = w.to_vec();

        let mut buffer = FieldBuffer::default();
        let err = buffer
            .decode(&mut TarsReader::new(&bytes), Version::Flat)
            .unwrap_err();
        assert!(matches!(
            err,
            TupError::MalformedWireData(CodecError::LengthMismatch { declared: 1, .. })
        ));
    }

    #[test]
    fn test_decode_requires_struct_end() {
        let mut w = TarsWriter::new();
        w.write_head(Kind::Map, 0);
        w.write_len(1);
        w.write_string("a", 0);
        w.write_head(Kind::SimpleList, 1);
        w.write_head(Kind::Int8, 0);
        w.write_len(3);
        w.write_head(Kind::StructBegin, 0);
        w.write_raw(&[0x0C, 0x0C]);
        let bytes = w.to_vec();

        let mut buffer = FieldBuffer::default();
        let err = buffer
            .decode(&mut TarsReader::new(&bytes), Version::Flat)
            .unwrap_err();
        assert!(matches!(
            err,
            TupError::MalformedWireData(CodecError::KindMismatch {
                expected: Kind::StructEnd,
                ..
            })
        ));
    }
}
