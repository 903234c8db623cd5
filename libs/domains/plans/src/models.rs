use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A pricing tier and the limits it grants.
///
/// Plans are seeded at bootstrap and read-only afterwards; a tenant's
/// effective limits change by re-pointing their assignment to a different
/// plan row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Unique identifier
    pub id: Uuid,
    /// Stable key (e.g. "tinkering", "building", "scale")
    pub slug: String,
    /// Display name
    pub name: String,
    /// Monthly price in cents
    pub price_cents: i32,
    /// Query admissions per second (tokens/second); <= 0 means unmetered
    pub query_qps_limit: f64,
    /// Ingest admissions per second (tokens/second); <= 0 means unmetered
    pub ingest_qps_limit: f64,
    /// Maximum projects per tenant; None = unlimited
    pub project_limit: Option<i32>,
    /// Maximum live vectors per project; None = unlimited
    pub vector_limit_per_project: Option<i64>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    /// Whether a tenant with `current` projects may create one more.
    pub fn allows_another_project(&self, current: u64) -> bool {
        match self.project_limit {
            Some(limit) => current < limit.max(0) as u64,
            None => true,
        }
    }
}

/// DTO for inserting a plan (seeding and admin migration only)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatePlan {
    pub slug: String,
    pub name: String,
    pub price_cents: i32,
    pub query_qps_limit: f64,
    pub ingest_qps_limit: f64,
    pub project_limit: Option<i32>,
    pub vector_limit_per_project: Option<i64>,
}

impl Plan {
    /// Create a new plan from a CreatePlan DTO
    pub fn new(input: CreatePlan) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            slug: input.slug,
            name: input.name,
            price_cents: input.price_cents,
            query_qps_limit: input.query_qps_limit,
            ingest_qps_limit: input.ingest_qps_limit,
            project_limit: input.project_limit,
            vector_limit_per_project: input.vector_limit_per_project,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the seedable attributes differ from `input`.
    pub fn differs_from(&self, input: &CreatePlan) -> bool {
        self.name != input.name
            || self.price_cents != input.price_cents
            || self.query_qps_limit != input.query_qps_limit
            || self.ingest_qps_limit != input.ingest_qps_limit
            || self.project_limit != input.project_limit
            || self.vector_limit_per_project != input.vector_limit_per_project
    }

    /// Apply seedable attributes from `input`, bumping `updated_at`.
    pub fn apply_definition(&mut self, input: &CreatePlan) {
        self.name = input.name.clone();
        self.price_cents = input.price_cents;
        self.query_qps_limit = input.query_qps_limit;
        self.ingest_qps_limit = input.ingest_qps_limit;
        self.project_limit = input.project_limit;
        self.vector_limit_per_project = input.vector_limit_per_project;
        self.updated_at = Utc::now();
    }
}
