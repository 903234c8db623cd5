use chrono::{DateTime, Utc};
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// The operation class a token bucket governs.
///
/// Deletes are deliberately absent: the plan model has no delete QPS, so
/// delete operations are never rate limited.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "bucket_kind")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BucketKind {
    #[sea_orm(string_value = "query")]
    Query,
    #[sea_orm(string_value = "ingest")]
    Ingest,
}

/// Outcome of a rate-limit admission check.
///
/// Denial is a value, not an error: the HTTP layer maps it to 429 with a
/// Retry-After header.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Admission {
    Admitted {
        /// Tokens left in the bucket after the debit
        remaining: f64,
    },
    Denied {
        /// Seconds until one full token will have accrued
        retry_after_seconds: f64,
    },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }

    pub fn retry_after_seconds(&self) -> Option<f64> {
        match self {
            Admission::Admitted { .. } => None,
            Admission::Denied {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
        }
    }
}

/// Outcome of a capacity reservation.
///
/// Rejection is a value, not an error: the HTTP layer maps it to a 402-style
/// upsell response carrying the limit and the current count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CapacityDecision {
    Reserved {
        /// The project's vector count after the reservation
        vector_count: i64,
    },
    Rejected {
        /// The plan's per-project vector cap
        limit: i64,
        /// The project's vector count at rejection time
        current: i64,
    },
}

impl CapacityDecision {
    pub fn is_reserved(&self) -> bool {
        matches!(self, CapacityDecision::Reserved { .. })
    }
}

/// The per-tenant limits the quota subsystem enforces, extracted from a
/// catalog plan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanLimits {
    /// Query admissions per second; <= 0 means unmetered
    pub query_qps: f64,
    /// Ingest admissions per second; <= 0 means unmetered
    pub ingest_qps: f64,
    /// Maximum live vectors per project; None = unlimited
    pub vector_limit_per_project: Option<i64>,
}

impl PlanLimits {
    /// Tokens/second for the given bucket kind.
    pub fn qps_for(&self, kind: BucketKind) -> f64 {
        match kind {
            BucketKind::Query => self.query_qps,
            BucketKind::Ingest => self.ingest_qps,
        }
    }
}

impl From<&domain_plans::Plan> for PlanLimits {
    fn from(plan: &domain_plans::Plan) -> Self {
        Self {
            query_qps: plan.query_qps_limit,
            ingest_qps: plan.ingest_qps_limit,
            vector_limit_per_project: plan.vector_limit_per_project,
        }
    }
}

/// Per-project usage: the authoritative vector count plus reporting-only
/// counters. The counters never feed admission decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectUsage {
    pub project_id: Uuid,
    pub tenant_id: Uuid,
    /// Live vectors in the project; admission-relevant, never negative
    pub vector_count: i64,
    /// Queries accepted, regardless of downstream success
    pub total_queries: i64,
    /// Ingest requests accepted, regardless of downstream success
    pub total_ingest_requests: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of the composed ingest admission flow: rate limit first, then
/// capacity. A token spent on a capacity-rejected request stays spent; the
/// request still represented load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    Admitted { vector_count: i64 },
    RateLimited { retry_after_seconds: f64 },
    CapacityExceeded { limit: i64, current: i64 },
}

impl IngestOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, IngestOutcome::Admitted { .. })
    }
}
