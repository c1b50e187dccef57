use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum Error {
    /// Statement violates syntax rules and cannot be compiled
    #[error("Malformed statement - {0}")]
    MalformedStatement(String),

    #[error("Invalid expression - {0}")]
    InvalidExpression(String),

    /// A name or path segment could not be found
    #[error("Unresolved symbol - {0}")]
    UnresolvedSymbol(String),

    /// Binding through, indexing into, or deleting the wrong kind of value
    #[error("Invalid target - {0}")]
    InvalidTarget(String),

    #[error("Unexpected arguments - {0}")]
    UnexpectedArguments(String),

    #[error("Evaluation failure - {0}")]
    EvaluationFailure(String),

    #[error("Module not found - {0}")]
    ModuleNotFound(String),

    #[error("IO error - {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value.to_string())
    }
}
