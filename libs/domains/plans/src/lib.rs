//! Plans Domain
//!
//! Plan catalog for the retrieval platform: the seeded pricing tiers, their
//! per-tenant limits, and the tenant→plan assignment used by quota
//! enforcement.
//!
//! Plans are immutable at request time. They are seeded once at service
//! bootstrap ([`seed::seed_plans`]) and a tenant's plan change re-points the
//! assignment row; it never mutates a plan. Limit changes therefore
//! propagate to admission checks without any cache invalidation: every
//! admission resolves the plan fresh through the assignment row.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   Service   │  ← catalog lookups, plan changes
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← data access (trait + implementations)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← Plan, CreatePlan
//! └─────────────┘
//! ```

pub mod entity;
pub mod error;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod seed;
pub mod service;

// Re-export commonly used types
pub use error::{PlanError, PlanResult};
pub use models::{CreatePlan, Plan};
pub use postgres::PgPlanRepository;
pub use repository::{InMemoryPlanRepository, PlanRepository};
pub use seed::{seed_plans, DEFAULT_PLANS};
pub use service::PlanService;
