use thiserror::Error;
use uuid::Uuid;

/// Failures of the quota subsystem itself.
///
/// Rate-limit denials and capacity rejections are NOT errors; they are
/// returned as [`crate::models::Admission`] / [`crate::models::CapacityDecision`]
/// values so the HTTP layer can map them deterministically. Everything in
/// this enum means the request must fail: the subsystem never admits on
/// uncertainty.
#[derive(Debug, Error)]
pub enum QuotaError {
    /// The tenant has no plan assignment, so no limits can be resolved.
    /// Should be unreachable in normal operation (every account gets a
    /// plan at signup); surfaces when a tenant is deleted mid-request.
    #[error("No plan assigned to tenant {0}")]
    MissingPlan(Uuid),

    /// The project has no usage row; reservations cannot be tracked.
    #[error("No usage row for project {0}")]
    UsageMissing(Uuid),

    /// The durable store could not complete the transaction (timeout,
    /// connection loss, lock failure). Retryable infrastructure fault;
    /// never interpreted as "admitted".
    #[error("Store unavailable: {0}")]
    Store(#[from] sea_orm::DbErr),
}

pub type QuotaResult<T> = Result<T, QuotaError>;
