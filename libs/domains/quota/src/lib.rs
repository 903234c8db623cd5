//! Quota Domain
//!
//! Usage metering and quota enforcement for the retrieval platform: every
//! tenant-scoped operation (document ingest, hybrid query, vector deletion)
//! is admitted or rejected here before it touches the search engine.
//!
//! Two mechanisms compose:
//!
//! - a per-tenant, per-operation-kind **token bucket** persisted in the
//!   relational store, enforcing the plan's requests-per-second ceiling;
//! - a per-project **capacity guard**, enforcing the plan's vector cap with
//!   an atomic check-and-increment.
//!
//! The service may run as many replicas, so no in-process state is ever
//! authoritative: all coordination goes through row-locked transactions on
//! the bucket and usage rows. Missing state self-heals on first use from
//! the tenant's current plan.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  QuotaService   │  ← façade: admit / reserve / plan changes
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │ QuotaRepository │  ← atomic operations (trait + implementations)
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │ bucket/capacity │  ← pure state transitions
//! └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_quota::{BucketKind, InMemoryQuotaRepository, QuotaService};
//! # async fn example(tenant_id: uuid::Uuid) {
//! let repository = InMemoryQuotaRepository::new();
//! let quota = QuotaService::new(repository);
//!
//! match quota.admit(tenant_id, BucketKind::Query).await {
//!     Ok(admission) if admission.is_admitted() => { /* proceed */ }
//!     Ok(denied) => { /* 429 with denied.retry_after_seconds() */ }
//!     Err(_) => { /* 5xx, never admit on store failure */ }
//! }
//! # }
//! ```

pub mod bucket;
pub mod capacity;
pub mod entity;
pub mod error;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod service;

// Re-export commonly used types
pub use bucket::BucketState;
pub use error::{QuotaError, QuotaResult};
pub use models::{
    Admission, BucketKind, CapacityDecision, IngestOutcome, PlanLimits, ProjectUsage,
};
pub use postgres::PgQuotaRepository;
pub use repository::{InMemoryQuotaRepository, QuotaRepository};
pub use service::QuotaService;
