//! Values that can be stored in a field buffer.
//!
//! [`Marshal`] is the capability contract the field buffer relies on: a value
//! names its own type discriminator and knows how to write itself to, and read
//! itself from, the tagged codec. Structs implement it by hand; scalars,
//! strings, byte blobs, lists and maps get it through [`Field`].

use crate::error::TupError;
use bytes::Bytes;
use std::borrow::Cow;
use std::collections::HashMap;
use std::hash::Hash;
use tup_codec::{CodecError, Kind, TarsReader, TarsWriter};

/// A value that can be put into and read out of a field buffer.
///
/// Both directions are optional. A type that is only ever sent keeps the
/// default `read_from`, which fails with [`TupError::MissingReadCapability`];
/// the same holds for `write_to` and [`TupError::MissingWriteCapability`].
pub trait Marshal {
    /// Stable discriminator used by the legacy layout to tell apart values
    /// stored under the same name.
    fn type_name(&self) -> Cow<'static, str>;

    /// Writes the value's fields, starting at tag 0.
    fn write_to(&self, _writer: &mut TarsWriter) -> Result<(), TupError> {
        Err(TupError::MissingWriteCapability(
            self.type_name().into_owned(),
        ))
    }

    /// Replaces the value with the fields read from `reader`.
    fn read_from(&mut self, _reader: &mut TarsReader<'_>) -> Result<(), TupError> {
        Err(TupError::MissingReadCapability(self.type_name().into_owned()))
    }
}

/// A value with a fixed single-field encoding at a caller-chosen tag.
pub trait Field: Sized {
    fn field_type() -> Cow<'static, str>;

    fn write_field(&self, writer: &mut TarsWriter, tag: u8);

    fn read_field(reader: &mut TarsReader<'_>, tag: u8) -> Result<Self, CodecError>;
}

impl<T: Field> Marshal for T {
    fn type_name(&self) -> Cow<'static, str> {
        T::field_type()
    }

    fn write_to(&self, writer: &mut TarsWriter) -> Result<(), TupError> {
        self.write_field(writer, 0);
        Ok(())
    }

    fn read_from(&mut self, reader: &mut TarsReader<'_>) -> Result<(), TupError> {
        *self = T::read_field(reader, 0)?;
        Ok(())
    }
}

macro_rules! scalar_field {
    ($($ty:ty => $name:literal, $write:ident, $read:ident;)*) => {
        $(
            impl Field for $ty {
                fn field_type() -> Cow<'static, str> {
                    Cow::Borrowed($name)
                }

                fn write_field(&self, writer: &mut TarsWriter, tag: u8) {
                    writer.$write(*self, tag);
                }

                fn read_field(reader: &mut TarsReader<'_>, tag: u8) -> Result<Self, CodecError> {
                    reader.$read(tag)
                }
            }
        )*
    };
}

scalar_field! {
    bool => "bool", write_bool, read_bool;
    i8 => "char", write_i8, read_i8;
    i16 => "short", write_i16, read_i16;
    i32 => "int32", write_i32, read_i32;
    i64 => "int64", write_i64, read_i64;
    f32 => "float", write_f32, read_f32;
    f64 => "double", write_f64, read_f64;
}

/// Unsigned integers travel in the next wider signed encoding.
macro_rules! unsigned_field {
    ($($ty:ty => $name:literal, $wide:ty, $write:ident, $read:ident;)*) => {
        $(
            impl Field for $ty {
                fn field_type() -> Cow<'static, str> {
                    Cow::Borrowed($name)
                }

                fn write_field(&self, writer: &mut TarsWriter, tag: u8) {
                    writer.$write(<$wide>::from(*self), tag);
                }

                fn read_field(reader: &mut TarsReader<'_>, tag: u8) -> Result<Self, CodecError> {
                    let wide = reader.$read(tag)?;
                    <$ty>::try_from(wide).map_err(|_| CodecError::OutOfRange {
                        tag,
                        value: wide.into(),
                        target: stringify!($ty),
                    })
                }
            }
        )*
    };
}

unsigned_field! {
    u8 => "short", i16, write_i16, read_i16;
    u16 => "int32", i32, write_i32, read_i32;
    u32 => "int64", i64, write_i64, read_i64;
}

impl Field for String {
    fn field_type() -> Cow<'static, str> {
        Cow::Borrowed("string")
    }

    fn write_field(&self, writer: &mut TarsWriter, tag: u8) {
        writer.write_string(self, tag);
    }

    fn read_field(reader: &mut TarsReader<'_>, tag: u8) -> Result<Self, CodecError> {
        reader.read_string(tag)
    }
}

/// Opaque byte blobs travel as a byte list (`list<char>`).
///
/// Use `Bytes`, not `Vec<u8>`, for byte blobs: `Vec<u8>` goes through the
/// generic list impl and is written element by element as `list<short>`,
/// which peers do not read as a byte vector.
impl Field for Bytes {
    fn field_type() -> Cow<'static, str> {
        Cow::Borrowed("list<char>")
    }

    fn write_field(&self, writer: &mut TarsWriter, tag: u8) {
        writer.write_bytes(self, tag);
    }

    fn read_field(reader: &mut TarsReader<'_>, tag: u8) -> Result<Self, CodecError> {
        reader.read_bytes(tag).map(Bytes::from)
    }
}

impl<T: Field> Field for Vec<T> {
    fn field_type() -> Cow<'static, str> {
        Cow::Owned(format!("list<{}>", T::field_type()))
    }

    fn write_field(&self, writer: &mut TarsWriter, tag: u8) {
        writer.write_head(Kind::List, tag);
        writer.write_len(self.len());
        for item in self {
            item.write_field(writer, 0);
        }
    }

    fn read_field(reader: &mut TarsReader<'_>, tag: u8) -> Result<Self, CodecError> {
        reader.skip_to(Kind::List, tag)?;
        let len = reader.read_len()?;
        let mut out = Vec::with_capacity(len.min(reader.remaining()));
        for _ in 0..len {
            out.push(T::read_field(reader, 0)?);
        }
        Ok(out)
    }
}

impl<K, V> Field for HashMap<K, V>
where
    K: Field + Eq + Hash,
    V: Field,
{
    fn field_type() -> Cow<'static, str> {
        Cow::Owned(format!("map<{},{}>", K::field_type(), V::field_type()))
    }

    fn write_field(&self, writer: &mut TarsWriter, tag: u8) {
        writer.write_head(Kind::Map, tag);
        writer.write_len(self.len());
        for (k, v) in self {
            k.write_field(writer, 0);
            v.write_field(writer, 1);
        }
    }

    fn read_field(reader: &mut TarsReader<'_>, tag: u8) -> Result<Self, CodecError> {
        reader.skip_to(Kind::Map, tag)?;
        let len = reader.read_len()?;
        let mut out = HashMap::with_capacity(len.min(reader.remaining()));
        for _ in 0..len {
            let k = K::read_field(reader, 0)?;
            let v = V::read_field(reader, 1)?;
            out.insert(k, v);
        }
        Ok(out)
    }
}
