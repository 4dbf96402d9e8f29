//! Errors for translation.

use query_engine_metadata::metadata::{self, database};
use query_engine_sql::sql;

/// A type for translation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    DataModel(#[from] metadata::data_model::Error),
    #[error("Attribute '{attribute}' not found on resource type '{resource_type}'.")]
    AttributeNotFound {
        resource_type: String,
        attribute: String,
    },
    #[error(
        "Field '{field}' of resource type '{resource_type}' is not available for sorting or filtering."
    )]
    FieldUnavailable {
        resource_type: String,
        field: String,
    },
    #[error("Relationship '{relationship}' of resource type '{resource_type}' must be a to-one relationship here.")]
    ExpectedToOneRelationship {
        resource_type: String,
        relationship: String,
    },
    #[error("Relationship '{relationship}' of resource type '{resource_type}' must be a to-many relationship here.")]
    ExpectedToManyRelationship {
        resource_type: String,
        relationship: String,
    },
    #[error("Empty path in {0}.")]
    EmptyPath(&'static str),
    #[error("Value '{0}' does not match type '{1}'.")]
    TypeMismatch(serde_json::Value, database::ScalarType),
    #[error("'{member}' is not a member of enum type '{enum_type}'.")]
    UnknownEnumMember { enum_type: String, member: String },
    #[error("Enum type '{0}' not found.")]
    EnumTypeNotFound(String),
    #[error("Page number must be 1 or greater, got {0}.")]
    InvalidPageNumber(u32),
    #[error("Page size must be between 1 and {maximum}, got {requested}.")]
    InvalidPageSize { requested: u32, maximum: u32 },
    #[error("Queries containing {0} are not supported.")]
    NotSupported(String),
    #[error("Relationship '{relationship}' of resource type '{resource_type}' is required and cannot be cleared.")]
    RequiredRelationshipCleared {
        resource_type: String,
        relationship: String,
    },
    #[error("Resource of type '{0}' has no identifier.")]
    MissingResourceId(String),
    #[error("Internal error: {0}")]
    Internal(#[from] sql::error::Error),
}

impl Error {
    /// Internal errors are defects in the compiler, not problems with the request.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Internal(_))
    }
}
