use thiserror::Error;

use crate::tree::TreeError;

/// The source does not have the shape the run was configured for. Raised before any
/// external call is made.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("column `{column}` not found (available: {available})")]
    MissingColumn { column: String, available: String },
    #[error("field `{field}` not found in source document")]
    MissingField { field: String },
    #[error("`{field}` must be a JSON {expected}")]
    WrongType { field: String, expected: &'static str },
    #[error("source document root must be a JSON object")]
    NotAnObject,
    #[error("label paths cannot be rebuilt: {0}")]
    Paths(#[from] TreeError),
}
