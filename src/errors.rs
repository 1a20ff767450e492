use thiserror::Error;

/// Failures reported by the collection capability.
///
/// These are passed through the query/update core untouched and are never
/// retried or folded into validation errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StorageFailure {
    #[error("duplicate key in {collection}: {key}")]
    DuplicateKey { collection: String, key: String },

    #[error("write concern not satisfied: {0}")]
    WriteConcern(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("operation exceeded time limit: {0}")]
    Timeout(String),

    #[error("unsupported by storage engine: {0}")]
    Unsupported(String),

    #[error("storage error: {0}")]
    Other(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OdmError {
    #[error("invalid field path '{path}' on {type_name}: {reason}")]
    InvalidFieldPath { type_name: String, path: String, reason: String },

    #[error("unrecognized operator: {0}")]
    UnrecognizedOperator(String),

    #[error("operator {operator} expects {expected}")]
    OperatorValueMismatch { operator: String, expected: &'static str },

    #[error("operator {0} is not supported for geo queries")]
    UnsupportedGeoOperator(String),

    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    #[error("{0} requires at least one criteria")]
    EmptyCriteriaGroup(&'static str),

    #[error("update path '{path}' appears under both {first} and {second}")]
    ConflictingUpdate { path: String, first: String, second: String },

    #[error("mapping error: {0}")]
    Mapping(String),

    #[error("BSON: {0}")]
    Bson(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageFailure),
}

impl OdmError {
    /// True for errors raised by the storage engine rather than by the
    /// query/update compiler.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<bson::error::Error> for OdmError {
    fn from(e: bson::error::Error) -> Self {
        Self::Bson(e.to_string())
    }
}

impl From<std::io::Error> for OdmError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<toml::de::Error> for OdmError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}
