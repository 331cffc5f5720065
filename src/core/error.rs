use thiserror::Error;
use tokio_postgres::error::SqlState;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Constraint violation on '{constraint}': {message}")]
    ConstraintViolation { constraint: String, message: String },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    pub fn constraint(constraint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            constraint: constraint.into(),
            message: message.into(),
        }
    }

    /// Whether the caller may recover from this error without restarting.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }
}

impl From<tokio_postgres::Error> for DbError {
    fn from(err: tokio_postgres::Error) -> Self {
        if err.is_closed() {
            return Self::Connectivity(err.to_string());
        }

        let Some(db_err) = err.as_db_error() else {
            let on_wire = std::error::Error::source(&err)
                .is_some_and(|source| source.is::<std::io::Error>());
            return if on_wire {
                Self::Connectivity(err.to_string())
            } else {
                Self::ExecutionError(err.to_string())
            };
        };

        let code = db_err.code();
        if code == &SqlState::UNIQUE_VIOLATION
            || code == &SqlState::FOREIGN_KEY_VIOLATION
            || code == &SqlState::CHECK_VIOLATION
            || code == &SqlState::NOT_NULL_VIOLATION
        {
            return Self::ConstraintViolation {
                constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                message: db_err.message().to_string(),
            };
        }

        Self::ExecutionError(format!("{} ({})", db_err.message(), code.code()))
    }
}
