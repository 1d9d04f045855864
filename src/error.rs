use serde_json;
use std::str::Utf8Error;

#[derive(Clone, PartialEq, Debug, Fail)]
pub enum Error {
    #[fail(display = "index or length is outside of the bounds of the sequence")]
    OutOfBounds,
    #[fail(display = "transaction is already committed")]
    TransactionCommitted,
    #[fail(display = "this operation requires an explicit transaction")]
    TransactionRequired,
    #[fail(display = "only preliminary nodes can be inserted")]
    NotPrelim,
    #[fail(display = "preliminary node doesn't support this operation")]
    InvalidPrelimOp,
    #[fail(display = "node was discarded by a rolled back transaction")]
    Detached,
    #[fail(display = "snapshot reads require a document with gc disabled")]
    GcEnabled,
    #[fail(display = "update was encoded with version {}, expected {}", found, expected)]
    VersionMismatch { expected: u8, found: u8 },
    #[fail(display = "unexpected end of buffer")]
    UnexpectedEof,
    #[fail(display = "variable-length integer has no terminating byte")]
    VLQNoTerminatingByte,
    #[fail(display = "string is not valid UTF-8")]
    InvalidUtf8,
    #[fail(display = "unknown content tag {}", _0)]
    InvalidContent(u8),
    #[fail(display = "malformed value payload")]
    InvalidValue,
    #[fail(display = "given object cannot be used as formatting attributes")]
    InvalidFormat,
}

impl From<serde_json::Error> for Error {
    fn from(_: serde_json::Error) -> Error {
        Error::InvalidValue
    }
}

impl From<Utf8Error> for Error {
    fn from(_: Utf8Error) -> Error {
        Error::InvalidUtf8
    }
}
