use std::{error::Error, fmt};

use crate::tensor::ScalarKind;

/// The crate's result type.
pub type Result<T> = std::result::Result<T, LoaderErr>;

/// Loader failures.
#[derive(Debug)]
pub enum LoaderErr {
    /// The store connection could not be established.
    Connection(StoreError),
    /// A find or aggregate failed, or the cursor reported an error.
    Store(StoreError),
    /// A document could not be turned into a record.
    Decode(DecodeError),
    /// Per-record slot maps disagree in length, slot identity or row shape.
    NonUniformMappings(String),
    /// Default mapping found a slot of this kind but no scalars to fill it.
    NoMatchingScalars(ScalarKind),
    ShapeMismatch {
        slot: String,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    KindMismatch {
        slot: String,
        got: ScalarKind,
        expected: ScalarKind,
    },
    UnknownSlot(String),
    DuplicateSlot(String),
    Config(String),
}

impl fmt::Display for LoaderErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderErr::Connection(e) => write!(f, "connection error: {e}"),
            LoaderErr::Store(e) => write!(f, "store error: {e}"),
            LoaderErr::Decode(e) => write!(f, "decode error: {e}"),
            LoaderErr::NonUniformMappings(detail) => {
                write!(f, "non-uniform slot mappings: {detail}")
            }
            LoaderErr::NoMatchingScalars(kind) => {
                write!(f, "no {kind} scalars found for the {kind} slot")
            }
            LoaderErr::ShapeMismatch {
                slot,
                got,
                expected,
            } => write!(
                f,
                "shape mismatch for slot '{slot}': got {got:?}, expected {expected:?}"
            ),
            LoaderErr::KindMismatch {
                slot,
                got,
                expected,
            } => write!(
                f,
                "kind mismatch for slot '{slot}': got {got}, expected {expected}"
            ),
            LoaderErr::UnknownSlot(name) => write!(f, "unknown slot '{name}'"),
            LoaderErr::DuplicateSlot(name) => write!(f, "slot '{name}' declared twice"),
            LoaderErr::Config(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl Error for LoaderErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LoaderErr::Connection(e) | LoaderErr::Store(e) => Some(e),
            LoaderErr::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DecodeError> for LoaderErr {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

impl From<serde_json::Error> for LoaderErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value.to_string())
    }
}

/// Failures reported by the document store.
#[derive(Debug, Clone)]
pub enum StoreError {
    Driver(mongodb::error::Error),
    Query(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Driver(e) => write!(f, "{e}"),
            StoreError::Query(msg) => write!(f, "{msg}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreError::Driver(e) => Some(e),
            StoreError::Query(_) => None,
        }
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(value: mongodb::error::Error) -> Self {
        Self::Driver(value)
    }
}

/// A document did not have the shape the record expects.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    Missing {
        field: String,
    },
    Incompatible {
        field: String,
        expected: &'static str,
        found: String,
    },
    /// Raised by serde-based decoding.
    Serde(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Missing { field } => write!(f, "missing field '{field}'"),
            DecodeError::Incompatible {
                field,
                expected,
                found,
            } => write!(f, "field '{field}' expected {expected}, found {found}"),
            DecodeError::Serde(msg) => write!(f, "{msg}"),
        }
    }
}

impl Error for DecodeError {}

impl From<bson::de::Error> for DecodeError {
    fn from(value: bson::de::Error) -> Self {
        Self::Serde(value.to_string())
    }
}
