use thiserror::Error;

use crate::reflect::context::ContextError;

// -----------------------------------------------------------------------------
// SerializeError

/// Errors raised while writing an object out, in either format.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SerializeError {
    #[error("cannot serialize abstract type `{name}`")]
    AbstractType { name: String },

    #[error("failed to serialize member `{member}` of `{class}`")]
    Member {
        class: String,
        member: &'static str,
        #[source]
        source: Box<SerializeError>,
    },

    #[error("failed to serialize element {index}")]
    Element {
        index: usize,
        #[source]
        source: Box<SerializeError>,
    },

    #[error(transparent)]
    Context(#[from] ContextError),
}

// -----------------------------------------------------------------------------
// DeserializeError

/// Errors raised while reading an object back, in either format.
///
/// Unknown members are not an error (they are logged and skipped); these are
/// structural failures that abort the operation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeserializeError {
    #[error("cannot deserialize abstract type `{name}`")]
    AbstractType { name: String },

    #[error("expected an object value, found {found}")]
    NotAnObject { found: &'static str },

    #[error("type marker must be a string")]
    MarkerNotString,

    #[error("type marker names `{found}`, expected `{expected}`")]
    TypeMarkerMismatch { expected: String, found: String },

    #[error("failed to deserialize member `{member}`")]
    Member {
        member: String,
        #[source]
        source: Box<DeserializeError>,
    },

    #[error("failed to deserialize element {index}")]
    Element {
        index: usize,
        #[source]
        source: Box<DeserializeError>,
    },

    #[error("value type mismatch: expected {expected}, found {found}")]
    ValueTypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("integer value {value} does not fit in `{target}`")]
    IntOutOfRange { value: i64, target: &'static str },

    #[error("unknown enum variant `{name}`")]
    UnknownEnumVariant { name: String },

    #[error("array element count mismatch: expected {expected}, found {found}")]
    ArrayCountMismatch { expected: usize, found: usize },

    #[error("unknown type `{name}` in persisted data")]
    UnknownType { name: String },

    #[error("persisted type `{name}` is not constructible")]
    NotConstructible { name: String },

    #[error("pointer type mismatch: expected `{expected}`, stored object is `{found}`")]
    PointerTypeMismatch { expected: String, found: String },

    #[error("invalid magic value")]
    BadMagic,

    #[error("unsupported format version {version}")]
    UnsupportedVersion { version: u32 },

    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("corrupted data: {reason}")]
    Corrupted { reason: &'static str },

    #[error(transparent)]
    Context(#[from] ContextError),
}
