use crate::model::DetectedIssue;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Compile error: {0}")]
    Compile(String),

    #[error("Record '{0}' not found")]
    NotFound(Uuid),

    #[error("Concurrency conflict on record '{record_key}': expected version sequence {expected}, current is {current}")]
    Concurrency {
        record_key: Uuid,
        expected: u64,
        current: u64,
    },

    #[error("Governance rejected the operation with {} issue(s)", .0.len())]
    DetectedIssue(Vec<DetectedIssue>),

    #[error("Transient store error: {0}")]
    Transient(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Execution error: {0}")]
    Execution(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Error-severity issues collected during a write, if this is a
    /// governance rejection.
    pub fn issues(&self) -> Option<&[DetectedIssue]> {
        match self {
            Self::DetectedIssue(issues) => Some(issues),
            _ => None,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for EngineError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Transient(err.to_string())
    }
}
