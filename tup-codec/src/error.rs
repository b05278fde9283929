//! Codec error types.

use crate::head::Kind;
use thiserror::Error;

/// Errors raised while reading or writing tagged binary data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("unexpected end of input: need {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("invalid head kind: {0}")]
    InvalidKind(u8),

    #[error("tag {0} not found")]
    TagNotFound(u8),

    #[error("kind mismatch at tag {tag}: expected {expected}, got {actual}")]
    KindMismatch {
        tag: u8,
        expected: Kind,
        actual: Kind,
    },

    #[error("negative length: {0}")]
    NegativeLength(i32),

    #[error("invalid UTF-8 in string at tag {0}")]
    InvalidUtf8(u8),

    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),

    #[error("declared length {declared} does not match framed length {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("value {value} at tag {tag} out of range for {target}")]
    OutOfRange {
        tag: u8,
        value: i64,
        target: &'static str,
    },
}
