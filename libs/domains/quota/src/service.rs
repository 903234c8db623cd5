use std::sync::Arc;
use uuid::Uuid;

use crate::error::QuotaResult;
use crate::models::{
    Admission, BucketKind, CapacityDecision, IngestOutcome, PlanLimits, ProjectUsage,
};
use crate::repository::QuotaRepository;

/// The single entry point the rest of the service calls for admission
/// control.
///
/// Composes the rate limiter and the capacity guard per operation:
///
/// - queries are rate limited only;
/// - ingests are rate limited first, then capacity-checked; a token spent
///   on a capacity-rejected request stays spent, since the request still
///   put load on the system;
/// - deletes are never rate limited (the plan model has no delete QPS) and
///   always release capacity.
///
/// Repository errors pass through untouched: an unavailable store fails
/// the request, it never admits it.
#[derive(Clone)]
pub struct QuotaService<R: QuotaRepository> {
    repository: Arc<R>,
}

impl<R: QuotaRepository> QuotaService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    /// Rate-limit admission check for a tenant-scoped operation.
    pub async fn admit(&self, tenant_id: Uuid, kind: BucketKind) -> QuotaResult<Admission> {
        self.repository.consume_token(tenant_id, kind).await
    }

    /// Atomic capacity check-and-apply against a project's vector cap.
    pub async fn reserve_capacity(
        &self,
        project_id: Uuid,
        delta: i64,
    ) -> QuotaResult<CapacityDecision> {
        self.repository.reserve_capacity(project_id, delta).await
    }

    /// Idempotent bootstrap of a tenant's buckets from their current plan.
    /// Invoked eagerly on plan activation; `admit` also self-heals lazily.
    pub async fn ensure_buckets_exist(&self, tenant_id: Uuid) -> QuotaResult<()> {
        self.repository.ensure_buckets(tenant_id).await
    }

    /// Rewrite bucket capacities after a plan change, clamping stored
    /// tokens to the new ceilings. Invoked by the billing workflow.
    pub async fn apply_plan_limits(
        &self,
        tenant_id: Uuid,
        plan: &domain_plans::Plan,
    ) -> QuotaResult<()> {
        let limits = PlanLimits::from(plan);
        self.repository.apply_plan_limits(tenant_id, &limits).await
    }

    /// Admission flow for a hybrid query: rate limit, then count.
    pub async fn admit_query(&self, tenant_id: Uuid, project_id: Uuid) -> QuotaResult<Admission> {
        let admission = self
            .repository
            .consume_token(tenant_id, BucketKind::Query)
            .await?;

        if admission.is_admitted() {
            self.repository
                .record_operation(project_id, BucketKind::Query)
                .await?;
        }

        Ok(admission)
    }

    /// Admission flow for a document ingest: rate limit, count, then
    /// reserve one vector of capacity.
    ///
    /// If the downstream engine write fails after this returns
    /// [`IngestOutcome::Admitted`], the caller MUST compensate with
    /// [`Self::release_capacity`]; the guard cannot see downstream
    /// failures.
    pub async fn admit_ingest(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
    ) -> QuotaResult<IngestOutcome> {
        let admission = self
            .repository
            .consume_token(tenant_id, BucketKind::Ingest)
            .await?;

        let Admission::Admitted { .. } = admission else {
            return Ok(IngestOutcome::RateLimited {
                retry_after_seconds: admission.retry_after_seconds().unwrap_or(0.0),
            });
        };

        // Counted as accepted load even if capacity rejects below
        self.repository
            .record_operation(project_id, BucketKind::Ingest)
            .await?;

        match self.repository.reserve_capacity(project_id, 1).await? {
            CapacityDecision::Reserved { vector_count } => {
                Ok(IngestOutcome::Admitted { vector_count })
            }
            CapacityDecision::Rejected { limit, current } => {
                Ok(IngestOutcome::CapacityExceeded { limit, current })
            }
        }
    }

    /// Admission flow for a vector deletion: release one vector of
    /// capacity, floored at zero. Always permitted.
    pub async fn admit_delete(&self, project_id: Uuid) -> QuotaResult<CapacityDecision> {
        self.repository.reserve_capacity(project_id, -1).await
    }

    /// Compensating release after a downstream failure that followed a
    /// successful reservation. Calling this is the ingest workflow's
    /// obligation; leaked reservations are repaired only by
    /// [`Self::reconcile_project`].
    pub async fn release_capacity(&self, project_id: Uuid) -> QuotaResult<CapacityDecision> {
        self.repository.reserve_capacity(project_id, -1).await
    }

    /// Create the zeroed usage row for a new project.
    pub async fn register_project(&self, project_id: Uuid, tenant_id: Uuid) -> QuotaResult<()> {
        self.repository.create_usage(project_id, tenant_id).await
    }

    /// Drop a deleted project's usage row.
    pub async fn unregister_project(&self, project_id: Uuid) -> QuotaResult<bool> {
        self.repository.delete_usage(project_id).await
    }

    /// Usage snapshot for dashboards; never consulted for admission.
    pub async fn project_usage(&self, project_id: Uuid) -> QuotaResult<Option<ProjectUsage>> {
        self.repository.usage(project_id).await
    }

    /// Overwrite the vector count with the figure recomputed from the
    /// authoritative document store.
    pub async fn reconcile_project(&self, project_id: Uuid, actual: i64) -> QuotaResult<()> {
        self.repository
            .reconcile_vector_count(project_id, actual)
            .await
    }
}
