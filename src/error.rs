use thiserror::Error;

/// Everything that can go wrong while parsing relations and queries or
/// evaluating a query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid relation format: {0}")]
    Format(String),

    #[error("Invalid query: {0}")]
    QuerySyntax(String),

    #[error("Unknown relation {0:?}")]
    UnknownRelation(String),

    #[error("Unknown attribute {0:?}")]
    UnknownAttribute(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Attributes mismatch for {operation} operation: {left:?} vs {right:?}")]
    AttributeMismatch {
        operation: &'static str,
        left: Vec<String>,
        right: Vec<String>,
    },

    #[error("Invalid predicate: {0}")]
    PredicateSyntax(String),

    #[error("Division by zero")]
    DivisionByZero,
}

pub type Result<T> = std::result::Result<T, Error>;
