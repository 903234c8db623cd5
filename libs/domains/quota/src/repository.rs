use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::bucket::BucketState;
use crate::capacity;
use crate::error::{QuotaError, QuotaResult};
use crate::models::{Admission, BucketKind, CapacityDecision, PlanLimits, ProjectUsage};

/// Repository trait for quota state
///
/// Every method is one atomic admission-control unit: implementations must
/// guarantee that the read, the decision, and the write-back of a bucket or
/// usage row cannot interleave with another caller's, across threads and
/// across service replicas. The Postgres implementation uses row locks in a
/// transaction; the in-memory one serializes through a single mutex.
///
/// Nothing here exposes a bare read-then-write pair; a caller can only ask
/// for complete decisions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuotaRepository: Send + Sync {
    /// Refill the tenant's bucket for `kind` and debit one token if
    /// available. Creates the bucket from the tenant's current plan if it
    /// does not exist yet (lazy self-heal).
    async fn consume_token(&self, tenant_id: Uuid, kind: BucketKind) -> QuotaResult<Admission>;

    /// Atomically check the project's vector cap and apply `delta`
    /// (positive: ingest reservation, negative: delete / compensating
    /// release, floored at zero).
    async fn reserve_capacity(
        &self,
        project_id: Uuid,
        delta: i64,
    ) -> QuotaResult<CapacityDecision>;

    /// Create any missing buckets for the tenant from their current plan,
    /// full. Idempotent: existing buckets are left untouched.
    async fn ensure_buckets(&self, tenant_id: Uuid) -> QuotaResult<()>;

    /// Rewrite both bucket capacities to `limits`, clamping stored tokens
    /// to the new ceilings. Buckets that do not exist yet are created full
    /// at the new capacity.
    async fn apply_plan_limits(&self, tenant_id: Uuid, limits: &PlanLimits) -> QuotaResult<()>;

    /// Bump the project's reporting counter for an admitted operation.
    async fn record_operation(&self, project_id: Uuid, kind: BucketKind) -> QuotaResult<()>;

    /// Create a zeroed usage row for a new project. Idempotent.
    async fn create_usage(&self, project_id: Uuid, tenant_id: Uuid) -> QuotaResult<()>;

    /// Drop the usage row when the project is deleted.
    async fn delete_usage(&self, project_id: Uuid) -> QuotaResult<bool>;

    /// Read the project's usage for reporting.
    async fn usage(&self, project_id: Uuid) -> QuotaResult<Option<ProjectUsage>>;

    /// Overwrite the vector count with a figure recomputed from the
    /// authoritative document store (reconciliation against leaked
    /// reservations).
    async fn reconcile_vector_count(&self, project_id: Uuid, actual: i64) -> QuotaResult<()>;
}

#[derive(Debug, Default)]
struct InMemoryState {
    limits: HashMap<Uuid, PlanLimits>,
    buckets: HashMap<(Uuid, BucketKind), BucketState>,
    usage: HashMap<Uuid, ProjectUsage>,
}

/// In-memory implementation of QuotaRepository (for development/testing)
///
/// A single mutex stands in for the database's row locks, so the atomicity
/// contract holds trivially, at the cost of the per-tenant lock
/// granularity the Postgres implementation provides.
#[derive(Debug, Default, Clone)]
pub struct InMemoryQuotaRepository {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryQuotaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stand-in for the billing collaborator: set the limits used for
    /// self-healing and capacity checks.
    pub async fn assign_limits(&self, tenant_id: Uuid, limits: PlanLimits) {
        let mut state = self.state.lock().await;
        state.limits.insert(tenant_id, limits);
    }

    /// Inspect a bucket's stored state (test helper).
    pub async fn bucket_state(&self, tenant_id: Uuid, kind: BucketKind) -> Option<BucketState> {
        let state = self.state.lock().await;
        state.buckets.get(&(tenant_id, kind)).copied()
    }
}

#[async_trait]
impl QuotaRepository for InMemoryQuotaRepository {
    async fn consume_token(&self, tenant_id: Uuid, kind: BucketKind) -> QuotaResult<Admission> {
        use std::collections::hash_map::Entry;

        let now = chrono::Utc::now();
        let mut state = self.state.lock().await;

        let limits = state.limits.get(&tenant_id).copied();
        let bucket = match state.buckets.entry((tenant_id, kind)) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let limits = limits.ok_or(QuotaError::MissingPlan(tenant_id))?;
                tracing::debug!(tenant_id = %tenant_id, %kind, "Self-healing missing bucket");
                entry.insert(BucketState::fresh(limits.qps_for(kind), now))
            }
        };

        Ok(bucket.try_debit(now))
    }

    async fn reserve_capacity(
        &self,
        project_id: Uuid,
        delta: i64,
    ) -> QuotaResult<CapacityDecision> {
        let mut state = self.state.lock().await;

        let tenant_id = state
            .usage
            .get(&project_id)
            .map(|u| u.tenant_id)
            .ok_or(QuotaError::UsageMissing(project_id))?;
        let limit = state
            .limits
            .get(&tenant_id)
            .ok_or(QuotaError::MissingPlan(tenant_id))?
            .vector_limit_per_project;

        let usage = state
            .usage
            .get_mut(&project_id)
            .ok_or(QuotaError::UsageMissing(project_id))?;

        let decision = capacity::apply_delta(usage.vector_count, delta, limit);
        if let CapacityDecision::Reserved { vector_count } = decision {
            usage.vector_count = vector_count;
            usage.updated_at = chrono::Utc::now();
        }

        Ok(decision)
    }

    async fn ensure_buckets(&self, tenant_id: Uuid) -> QuotaResult<()> {
        let now = chrono::Utc::now();
        let mut state = self.state.lock().await;

        let limits = state
            .limits
            .get(&tenant_id)
            .copied()
            .ok_or(QuotaError::MissingPlan(tenant_id))?;

        for kind in [BucketKind::Query, BucketKind::Ingest] {
            state
                .buckets
                .entry((tenant_id, kind))
                .or_insert_with(|| BucketState::fresh(limits.qps_for(kind), now));
        }

        Ok(())
    }

    async fn apply_plan_limits(&self, tenant_id: Uuid, limits: &PlanLimits) -> QuotaResult<()> {
        let now = chrono::Utc::now();
        let mut state = self.state.lock().await;

        state.limits.insert(tenant_id, *limits);

        for kind in [BucketKind::Query, BucketKind::Ingest] {
            let qps = limits.qps_for(kind);
            state
                .buckets
                .entry((tenant_id, kind))
                .and_modify(|bucket| bucket.apply_capacity(qps, now))
                .or_insert_with(|| BucketState::fresh(qps, now));
        }

        tracing::info!(tenant_id = %tenant_id, "Applied plan limits to buckets");
        Ok(())
    }

    async fn record_operation(&self, project_id: Uuid, kind: BucketKind) -> QuotaResult<()> {
        let mut state = self.state.lock().await;

        let usage = state
            .usage
            .get_mut(&project_id)
            .ok_or(QuotaError::UsageMissing(project_id))?;

        match kind {
            BucketKind::Query => usage.total_queries += 1,
            BucketKind::Ingest => usage.total_ingest_requests += 1,
        }
        usage.updated_at = chrono::Utc::now();

        Ok(())
    }

    async fn create_usage(&self, project_id: Uuid, tenant_id: Uuid) -> QuotaResult<()> {
        let now = chrono::Utc::now();
        let mut state = self.state.lock().await;

        state.usage.entry(project_id).or_insert_with(|| ProjectUsage {
            project_id,
            tenant_id,
            vector_count: 0,
            total_queries: 0,
            total_ingest_requests: 0,
            created_at: now,
            updated_at: now,
        });

        Ok(())
    }

    async fn delete_usage(&self, project_id: Uuid) -> QuotaResult<bool> {
        let mut state = self.state.lock().await;
        Ok(state.usage.remove(&project_id).is_some())
    }

    async fn usage(&self, project_id: Uuid) -> QuotaResult<Option<ProjectUsage>> {
        let state = self.state.lock().await;
        Ok(state.usage.get(&project_id).cloned())
    }

    async fn reconcile_vector_count(&self, project_id: Uuid, actual: i64) -> QuotaResult<()> {
        let mut state = self.state.lock().await;

        let usage = state
            .usage
            .get_mut(&project_id)
            .ok_or(QuotaError::UsageMissing(project_id))?;

        let corrected = actual.max(0);
        if usage.vector_count != corrected {
            tracing::warn!(
                project_id = %project_id,
                stored = usage.vector_count,
                actual = corrected,
                "Reconciling drifted vector count"
            );
        }
        usage.vector_count = corrected;
        usage.updated_at = chrono::Utc::now();

        Ok(())
    }
}
