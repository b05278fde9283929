//! # tup-protocol
//!
//! Versioned request/response envelope for the TUP packet format.
//!
//! A [`UniPacket`] carries routing metadata (servant, function, request id,
//! context, status) and one [`FieldBuffer`] of named, independently
//! serialized parameters. Two historical field layouts exist:
//!
//! - version 2 ([`Version::Legacy`]): every name maps to one blob per
//!   type discriminator
//! - version 3 ([`Version::Flat`]): every name maps to exactly one blob
//!
//! The encoded packet is a 4-byte big-endian total length followed by a
//! [`RequestPacket`] written with the tagged codec from `tup-codec`.

pub mod buffer;
pub mod error;
pub mod packet;
pub mod request;
pub mod value;

pub use buffer::{FieldBuffer, RawFields, Version};
pub use error::TupError;
pub use packet::{frame_len, UniPacket};
pub use request::RequestPacket;
pub use value::{Field, Marshal};

pub use tup_codec::{CodecError, Kind, TarsReader, TarsWriter};

/// Legacy layout with per-type discriminators.
pub const VERSION_LEGACY: i16 = 2;

/// Flat layout, one value per name.
pub const VERSION_FLAT: i16 = 3;

/// Size of the big-endian length prefix in front of every packet.
pub const HEADER_LEN: usize = 4;

/// Field name reserved for the function return value in responses.
pub const RETURN_VALUE_NAME: &str = "";

/// Discriminator of the return value slot under the legacy layout.
pub const RETURN_VALUE_TYPE: &str = "int32";
