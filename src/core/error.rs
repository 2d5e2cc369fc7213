use thiserror::Error;

/// Errors returned by every manipulator operation.
///
/// Backend-native failures never reach callers directly: they are translated
/// into one of these kinds, keeping the (redacted) backend message as detail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManipError {
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Cannot execute query: {0}")]
    CannotExecuteQuery(String),

    #[error("Cannot commit: {0}")]
    CannotCommit(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Cannot build query: {0}")]
    CannotBuildQuery(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ManipError {
    /// Short machine-friendly name of the error kind, used as a span tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ObjectNotFound(_) => "object_not_found",
            Self::CannotExecuteQuery(_) => "cannot_execute_query",
            Self::CannotCommit(_) => "cannot_commit",
            Self::ConstraintViolation(_) => "constraint_violation",
            Self::TransactionNotFound(_) => "transaction_not_found",
            Self::CannotBuildQuery(_) => "cannot_build_query",
            Self::NotImplemented(_) => "not_implemented",
            Self::Configuration(_) => "configuration",
            Self::Serialization(_) => "serialization",
        }
    }
}

pub type Result<T> = std::result::Result<T, ManipError>;

impl From<serde_json::Error> for ManipError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
