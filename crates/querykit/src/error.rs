//! Error types for querykit

use thiserror::Error;

/// Result type alias for querykit operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Errors recorded while a query is being built.
///
/// Builders keep the first one they hit and return it from every later
/// render or execute call, so this type has to be cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// `join_on` / `join_on_or` called before any `join`.
    #[error("query has no joins")]
    NoJoins,

    /// The bound table does not declare the requested relation.
    #[error("{table} does not have relation={relation:?}")]
    RelationNotFound { table: String, relation: String },

    /// A relation path is nested deeper than the resolver allows.
    #[error("relation {path:?} exceeds the maximum join depth of {max}")]
    RelationDepthExceeded { path: String, max: usize },

    /// The operation needs a bound model (`model::<M>()` / `table_model`).
    #[error("{0} requires a model")]
    ModelRequired(&'static str),

    /// `where_pk` on a table without primary key fields.
    #[error("{0} does not have primary keys")]
    NoPrimaryKey(String),

    /// Soft delete filters on a table without a soft delete field.
    #[error("{0} does not support soft deletes")]
    SoftDeleteUnsupported(String),

    /// A dynamic row source without any non-empty row.
    #[error("empty input: dynamic row source has no rows")]
    EmptyInput,

    /// A dynamic row whose key set differs from the first row's.
    #[error("dynamic row {row} has keys {found:?}, expected {expected:?}")]
    MismatchedKeys {
        row: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// Error types for building, rendering and executing queries
#[derive(Debug, Error)]
pub enum OrmError {
    /// Sticky builder error
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// A `?Name` reference nobody could expand
    #[error("Unknown placeholder ?{0}")]
    UnknownPlaceholder(String),

    /// A `?` / `?N` without a matching argument
    #[error("Missing argument #{index} for template {template:?}")]
    MissingArgument { template: String, index: usize },

    /// The dialect lacks a capability the query needs
    #[error("{dialect} does not support {feature}")]
    Unsupported {
        dialect: &'static str,
        feature: String,
    },

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create an unsupported-capability error
    pub fn unsupported(dialect: &'static str, feature: impl Into<String>) -> Self {
        Self::Unsupported {
            dialect,
            feature: feature.into(),
        }
    }

    /// The builder error, if this is one
    pub fn as_build_error(&self) -> Option<&BuildError> {
        match self {
            Self::Build(err) => Some(err),
            _ => None,
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_not_found_message() {
        let err = BuildError::RelationNotFound {
            table: "books".into(),
            relation: "Publisher".into(),
        };
        assert_eq!(err.to_string(), "books does not have relation=\"Publisher\"");
    }

    #[test]
    fn test_build_error_wraps_into_orm_error() {
        let err: OrmError = BuildError::EmptyInput.into();
        assert_eq!(err.as_build_error(), Some(&BuildError::EmptyInput));
        assert!(err.to_string().contains("empty input"));
    }
}
