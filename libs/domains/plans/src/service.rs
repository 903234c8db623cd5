use std::sync::Arc;
use uuid::Uuid;

use crate::error::{PlanError, PlanResult};
use crate::models::Plan;
use crate::repository::PlanRepository;

/// Service layer for plan catalog lookups and plan changes
#[derive(Clone)]
pub struct PlanService<R: PlanRepository> {
    repository: Arc<R>,
}

impl<R: PlanRepository> PlanService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    /// Get a plan by slug
    pub async fn get_plan(&self, slug: &str) -> PlanResult<Plan> {
        self.repository
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| PlanError::NotFound(slug.to_string()))
    }

    /// List the catalog, cheapest first
    pub async fn list_plans(&self) -> PlanResult<Vec<Plan>> {
        self.repository.list().await
    }

    /// Resolve a tenant's current plan
    ///
    /// Fetched fresh per call so limit changes propagate without cache
    /// invalidation.
    pub async fn plan_for_tenant(&self, tenant_id: Uuid) -> PlanResult<Plan> {
        self.repository
            .plan_for_tenant(tenant_id)
            .await?
            .ok_or(PlanError::MissingAssignment(tenant_id))
    }

    /// Point a tenant at the plan with `slug`, returning the new plan.
    ///
    /// Invoked by the billing workflow on activation or plan change. The
    /// caller is expected to follow up with
    /// `QuotaService::apply_plan_limits` so existing buckets pick up the
    /// new capacities.
    pub async fn change_plan(&self, tenant_id: Uuid, slug: &str) -> PlanResult<Plan> {
        let plan = self.get_plan(slug).await?;
        self.repository.assign_plan(tenant_id, plan.id).await?;

        tracing::info!(tenant_id = %tenant_id, plan = %plan.slug, "Plan changed");
        Ok(plan)
    }

    /// Whether the tenant may create another project under their plan,
    /// given their current project count.
    pub async fn can_create_project(&self, tenant_id: Uuid, current: u64) -> PlanResult<bool> {
        let plan = self.plan_for_tenant(tenant_id).await?;
        Ok(plan.allows_another_project(current))
    }
}
