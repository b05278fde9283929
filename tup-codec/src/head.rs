//! Field heads.
//!
//! A head is one byte when the tag fits in four bits, two bytes otherwise:
//!
//! ```text
//! tag < 15:   +-------+-------+
//!             |  tag  | kind  |
//!             | 4 bits| 4 bits|
//!             +-------+-------+
//!
//! tag >= 15:  +-------+-------+---------+
//!             |  0xF  | kind  |   tag   |
//!             | 4 bits| 4 bits| 1 byte  |
//!             +-------+-------+---------+
//! ```

use crate::error::CodecError;
use bytes::BufMut;
use std::fmt;

/// Marker in the tag nibble announcing a trailing tag byte.
const EXTENDED_TAG: u8 = 0x0F;

/// Kind of the value that follows a head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    Int8 = 0,
    Int16 = 1,
    Int32 = 2,
    Int64 = 3,
    Float = 4,
    Double = 5,
    String1 = 6,
    String4 = 7,
    Map = 8,
    List = 9,
    StructBegin = 10,
    StructEnd = 11,
    ZeroTag = 12,
    SimpleList = 13,
}

impl TryFrom<u8> for Kind {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Kind::Int8),
            1 => Ok(Kind::Int16),
            2 => Ok(Kind::Int32),
            3 => Ok(Kind::Int64),
            4 => Ok(Kind::Float),
            5 => Ok(Kind::Double),
            6 => Ok(Kind::String1),
            7 => Ok(Kind::String4),
            8 => Ok(Kind::Map),
            9 => Ok(Kind::List),
            10 => Ok(Kind::StructBegin),
            11 => Ok(Kind::StructEnd),
            12 => Ok(Kind::ZeroTag),
            13 => Ok(Kind::SimpleList),
            _ => Err(CodecError::InvalidKind(value)),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Int8 => "INT8",
            Kind::Int16 => "INT16",
            Kind::Int32 => "INT32",
            Kind::Int64 => "INT64",
            Kind::Float => "FLOAT",
            Kind::Double => "DOUBLE",
            Kind::String1 => "STRING1",
            Kind::String4 => "STRING4",
            Kind::Map => "MAP",
            Kind::List => "LIST",
            Kind::StructBegin => "STRUCT_BEGIN",
            Kind::StructEnd => "STRUCT_END",
            Kind::ZeroTag => "ZERO_TAG",
            Kind::SimpleList => "SIMPLE_LIST",
        };
        f.write_str(name)
    }
}

/// A decoded head: the kind of the following value and its field tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Head {
    pub kind: Kind,
    pub tag: u8,
}

impl Head {
    pub fn new(kind: Kind, tag: u8) -> Self {
        Self { kind, tag }
    }

    /// Number of bytes this head occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        if self.tag < EXTENDED_TAG {
            1
        } else {
            2
        }
    }

    /// Appends the head to `buf`.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        let kind = self.kind as u8;
        if self.tag < EXTENDED_TAG {
            buf.put_u8((self.tag << 4) | kind);
        } else {
            buf.put_u8((EXTENDED_TAG << 4) | kind);
            buf.put_u8(self.tag);
        }
    }

    /// Parses a head from the front of `buf` without consuming it.
    ///
    /// Returns the head and the number of bytes it occupies.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), CodecError> {
        let first = *buf.first().ok_or(CodecError::UnexpectedEof {
            needed: 1,
            remaining: 0,
        })?;
        let kind = Kind::try_from(first & 0x0F)?;
        let tag = first >> 4;
        if tag < EXTENDED_TAG {
            return Ok((Self { kind, tag }, 1));
        }
        let tag = *buf.get(1).ok_or(CodecError::UnexpectedEof {
            needed: 2,
            remaining: buf.len(),
        })?;
        Ok((Self { kind, tag }, 2))
    }
}
