//! # tup-codec
//!
//! Tagged binary codec underneath the TUP packet format.
//!
//! Every value on the wire is preceded by a head carrying a numeric tag and a
//! [`Kind`]. Readers address fields by tag and skip forward across unknown
//! lower-tagged fields, which keeps older decoders working against newer
//! encoders.
//!
//! This crate provides:
//! - Head encoding/decoding ([`Head`], [`Kind`])
//! - A growable writer ([`TarsWriter`])
//! - A tag-addressed cursor ([`TarsReader`])

pub mod error;
pub mod head;
pub mod reader;
pub mod writer;

pub use error::CodecError;
pub use head::{Head, Kind};
pub use reader::TarsReader;
pub use writer::TarsWriter;

/// Maximum struct nesting the reader follows while skipping unknown fields.
pub const MAX_SKIP_DEPTH: usize = 64;
