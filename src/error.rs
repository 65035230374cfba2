use thiserror::Error;

/// SQLSTATE codes the gateway treats as retryable.
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
/// SQLSTATE class for integrity constraint violations.
const INTEGRITY_CONSTRAINT_CLASS: &str = "23";

/// Failures reported by the Datastore Gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("serialization conflict: {0}")]
    SerializationConflict(String),

    #[error("no rows found")]
    NoRowsFound,

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("connection pool exhausted")]
    PoolExhausted,

    #[error("store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::SerializationConflict(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NoRowsFound,
            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                    StoreError::SerializationConflict(db_err.message().to_string())
                }
                Some(code) if code.starts_with(INTEGRITY_CONSTRAINT_CLASS) => {
                    StoreError::ConstraintViolation(db_err.message().to_string())
                }
                _ => StoreError::Backend(err.to_string()),
            },
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// Errors surfaced by fleet operations to their callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FleetError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(StoreError),
}

impl FleetError {
    /// True when the executor should replay the unit of work.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FleetError::Store(e) if e.is_retryable())
    }
}

impl From<StoreError> for FleetError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NoRowsFound => FleetError::NotFound("no matching row".to_string()),
            StoreError::ConstraintViolation(msg) => FleetError::ConstraintViolation(msg),
            other => FleetError::Store(other),
        }
    }
}

pub type FleetResult<T> = Result<T, FleetError>;
