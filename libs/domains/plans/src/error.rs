use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Plan not found: {0}")]
    NotFound(String),

    #[error("No plan assigned to tenant {0}")]
    MissingAssignment(Uuid),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type PlanResult<T> = Result<T, PlanError>;
