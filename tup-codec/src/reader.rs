//! Tag-addressed reader over a borrowed byte slice.

use crate::error::CodecError;
use crate::head::{Head, Kind};
use crate::MAX_SKIP_DEPTH;
use std::collections::HashMap;

/// Cursor that reads tagged values in ascending tag order.
///
/// Looking up a tag skips every lower-tagged field in between, so fields
/// unknown to the reader are tolerated. Looking up a tag that is absent
/// stops at the first higher tag (or struct end) without consuming it.
#[derive(Debug, Clone)]
pub struct TarsReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> TarsReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Parses the next head without consuming it.
    pub fn peek_head(&self) -> Result<(Head, usize), CodecError> {
        Head::decode(&self.buf[self.pos..])
    }

    pub fn read_head(&mut self) -> Result<Head, CodecError> {
        let (head, len) = self.peek_head()?;
        self.pos += len;
        Ok(head)
    }

    /// Consumes exactly `len` bytes.
    pub fn read_raw(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < len {
            return Err(CodecError::UnexpectedEof {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_raw(N)?);
        Ok(out)
    }

    /// Advances to the field carrying `tag`, returning `None` when the field
    /// is absent. The head of the field is consumed when found.
    pub fn find_tag(&mut self, tag: u8) -> Result<Option<Kind>, CodecError> {
        loop {
            if self.is_empty() {
                return Ok(None);
            }
            let (head, len) = self.peek_head()?;
            if head.kind == Kind::StructEnd || head.tag > tag {
                return Ok(None);
            }
            self.pos += len;
            if head.tag == tag {
                return Ok(Some(head.kind));
            }
            self.skip_field(head.kind)?;
        }
    }

    /// Advances to the required field carrying `tag` and returns its kind.
    pub fn skip_to_tag(&mut self, tag: u8) -> Result<Kind, CodecError> {
        self.find_tag(tag)?.ok_or(CodecError::TagNotFound(tag))
    }

    /// Advances to the required field carrying `tag`, which must be of `kind`.
    pub fn skip_to(&mut self, kind: Kind, tag: u8) -> Result<(), CodecError> {
        let actual = self.skip_to_tag(tag)?;
        if actual != kind {
            return Err(CodecError::KindMismatch {
                tag,
                expected: kind,
                actual,
            });
        }
        Ok(())
    }

    /// Skips the body of a field whose head has already been consumed.
    pub fn skip_field(&mut self, kind: Kind) -> Result<(), CodecError> {
        self.skip_field_at(kind, 0)
    }

    fn skip_field_at(&mut self, kind: Kind, depth: usize) -> Result<(), CodecError> {
        if depth > MAX_SKIP_DEPTH {
            return Err(CodecError::TooDeep(MAX_SKIP_DEPTH));
        }
        match kind {
            Kind::ZeroTag | Kind::StructEnd => {}
            Kind::Int8 => {
                self.read_raw(1)?;
            }
            Kind::Int16 => {
                self.read_raw(2)?;
            }
            Kind::Int32 | Kind::Float => {
                self.read_raw(4)?;
            }
            Kind::Int64 | Kind::Double => {
                self.read_raw(8)?;
            }
            Kind::String1 => {
                let [len] = self.read_array::<1>()?;
                self.read_raw(len as usize)?;
            }
            Kind::String4 => {
                let len = u32::from_be_bytes(self.read_array::<4>()?);
                self.read_raw(len as usize)?;
            }
            Kind::Map => {
                let len = self.read_len()?;
                for _ in 0..len * 2 {
                    let head = self.read_head()?;
                    self.skip_field_at(head.kind, depth + 1)?;
                }
            }
            Kind::List => {
                let len = self.read_len()?;
                for _ in 0..len {
                    let head = self.read_head()?;
                    self.skip_field_at(head.kind, depth + 1)?;
                }
            }
            Kind::SimpleList => {
                self.read_head()?;
                let len = self.read_len()?;
                self.read_raw(len)?;
            }
            Kind::StructBegin => loop {
                let head = self.read_head()?;
                if head.kind == Kind::StructEnd {
                    break;
                }
                self.skip_field_at(head.kind, depth + 1)?;
            },
        }
        Ok(())
    }

    /// Reads a non-negative container length stored at tag 0.
    pub fn read_len(&mut self) -> Result<usize, CodecError> {
        let len = self.read_i32(0)?;
        usize::try_from(len).map_err(|_| CodecError::NegativeLength(len))
    }

    fn mismatch(tag: u8, expected: Kind, actual: Kind) -> CodecError {
        CodecError::KindMismatch {
            tag,
            expected,
            actual,
        }
    }

    pub fn read_i8(&mut self, tag: u8) -> Result<i8, CodecError> {
        match self.skip_to_tag(tag)? {
            Kind::ZeroTag => Ok(0),
            Kind::Int8 => Ok(i8::from_be_bytes(self.read_array()?)),
            other => Err(Self::mismatch(tag, Kind::Int8, other)),
        }
    }

    pub fn read_i16(&mut self, tag: u8) -> Result<i16, CodecError> {
        match self.skip_to_tag(tag)? {
            Kind::ZeroTag => Ok(0),
            Kind::Int8 => Ok(i8::from_be_bytes(self.read_array()?).into()),
            Kind::Int16 => Ok(i16::from_be_bytes(self.read_array()?)),
            other => Err(Self::mismatch(tag, Kind::Int16, other)),
        }
    }

    pub fn read_i32(&mut self, tag: u8) -> Result<i32, CodecError> {
        match self.skip_to_tag(tag)? {
            Kind::ZeroTag => Ok(0),
            Kind::Int8 => Ok(i8::from_be_bytes(self.read_array()?).into()),
            Kind::Int16 => Ok(i16::from_be_bytes(self.read_array()?).into()),
            Kind::Int32 => Ok(i32::from_be_bytes(self.read_array()?)),
            other => Err(Self::mismatch(tag, Kind::Int32, other)),
        }
    }

    pub fn read_i64(&mut self, tag: u8) -> Result<i64, CodecError> {
        match self.skip_to_tag(tag)? {
            Kind::ZeroTag => Ok(0),
            Kind::Int8 => Ok(i8::from_be_bytes(self.read_array()?).into()),
            Kind::Int16 => Ok(i16::from_be_bytes(self.read_array()?).into()),
            Kind::Int32 => Ok(i32::from_be_bytes(self.read_array()?).into()),
            Kind::Int64 => Ok(i64::from_be_bytes(self.read_array()?)),
            other => Err(Self::mismatch(tag, Kind::Int64, other)),
        }
    }

    pub fn read_bool(&mut self, tag: u8) -> Result<bool, CodecError> {
        Ok(self.read_i8(tag)? != 0)
    }

    pub fn read_f32(&mut self, tag: u8) -> Result<f32, CodecError> {
        match self.skip_to_tag(tag)? {
            Kind::ZeroTag => Ok(0.0),
            Kind::Float => Ok(f32::from_be_bytes(self.read_array()?)),
            other => Err(Self::mismatch(tag, Kind::Float, other)),
        }
    }

    pub fn read_f64(&mut self, tag: u8) -> Result<f64, CodecError> {
        match self.skip_to_tag(tag)? {
            Kind::ZeroTag => Ok(0.0),
            Kind::Float => Ok(f32::from_be_bytes(self.read_array()?).into()),
            Kind::Double => Ok(f64::from_be_bytes(self.read_array()?)),
            other => Err(Self::mismatch(tag, Kind::Double, other)),
        }
    }

    pub fn read_string(&mut self, tag: u8) -> Result<String, CodecError> {
        let len = match self.skip_to_tag(tag)? {
            Kind::String1 => u8::from_be_bytes(self.read_array()?) as usize,
            Kind::String4 => u32::from_be_bytes(self.read_array()?) as usize,
            other => return Err(Self::mismatch(tag, Kind::String1, other)),
        };
        let raw = self.read_raw(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8(tag))
    }

    /// Reads a complete byte list. Generic lists of single bytes are accepted
    /// as well, since older encoders emit them for byte vectors.
    pub fn read_bytes(&mut self, tag: u8) -> Result<Vec<u8>, CodecError> {
        match self.skip_to_tag(tag)? {
            Kind::SimpleList => {
                self.skip_to(Kind::Int8, 0)?;
                let len = self.read_len()?;
                Ok(self.read_raw(len)?.to_vec())
            }
            Kind::List => {
                let len = self.read_len()?;
                let mut out = Vec::with_capacity(len.min(self.remaining()));
                for _ in 0..len {
                    out.push(self.read_i8(0)? as u8);
                }
                Ok(out)
            }
            other => Err(Self::mismatch(tag, Kind::SimpleList, other)),
        }
    }

    pub fn read_string_map(&mut self, tag: u8) -> Result<HashMap<String, String>, CodecError> {
        self.skip_to(Kind::Map, tag)?;
        let len = self.read_len()?;
        let mut out = HashMap::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            let k = self.read_string(0)?;
            let v = self.read_string(1)?;
            out.insert(k, v);
        }
        Ok(out)
    }
}
