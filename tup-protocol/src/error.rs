//! Packet error types.

use thiserror::Error;
use tup_codec::CodecError;

/// Errors returned by field buffer and envelope operations.
#[derive(Debug, Error)]
pub enum TupError {
    #[error("unsupported TUP version: {0} (expected 2 or 3)")]
    UnsupportedVersion(i16),

    #[error("type {0} cannot write itself")]
    MissingWriteCapability(String),

    #[error("type {0} cannot read itself")]
    MissingReadCapability(String),

    #[error("servant name and function name are required")]
    EmptyServantOrFunction,

    #[error("the empty field name is reserved for the return value")]
    ReservedFieldName,

    #[error("malformed wire data: {0}")]
    MalformedWireData(#[from] CodecError),
}

impl TupError {
    /// Returns whether the error was caused by undecodable input.
    pub fn is_malformed(&self) -> bool {
        matches!(self, TupError::MalformedWireData(_))
    }
}
