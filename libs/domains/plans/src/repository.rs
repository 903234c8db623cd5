use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::PlanResult;
use crate::models::{CreatePlan, Plan};

/// Repository trait for plan catalog persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Insert a new plan
    async fn create(&self, input: CreatePlan) -> PlanResult<Plan>;

    /// Rewrite an existing plan row (seeding/admin migration only)
    async fn update(&self, plan: Plan) -> PlanResult<Plan>;

    /// Get a plan by slug
    async fn get_by_slug(&self, slug: &str) -> PlanResult<Option<Plan>>;

    /// Get a plan by ID
    async fn get_by_id(&self, id: Uuid) -> PlanResult<Option<Plan>>;

    /// List all plans, cheapest first
    async fn list(&self) -> PlanResult<Vec<Plan>>;

    /// Resolve the plan currently assigned to a tenant
    async fn plan_for_tenant(&self, tenant_id: Uuid) -> PlanResult<Option<Plan>>;

    /// Point a tenant's assignment at `plan_id`, creating it if absent
    async fn assign_plan(&self, tenant_id: Uuid, plan_id: Uuid) -> PlanResult<()>;
}

/// In-memory implementation of PlanRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryPlanRepository {
    plans: Arc<RwLock<HashMap<Uuid, Plan>>>,
    assignments: Arc<RwLock<HashMap<Uuid, Uuid>>>,
}

impl InMemoryPlanRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlanRepository for InMemoryPlanRepository {
    async fn create(&self, input: CreatePlan) -> PlanResult<Plan> {
        let plan = Plan::new(input);
        let mut plans = self.plans.write().await;
        plans.insert(plan.id, plan.clone());

        tracing::info!(plan = %plan.slug, "Created plan");
        Ok(plan)
    }

    async fn update(&self, plan: Plan) -> PlanResult<Plan> {
        let mut plans = self.plans.write().await;
        plans.insert(plan.id, plan.clone());
        Ok(plan)
    }

    async fn get_by_slug(&self, slug: &str) -> PlanResult<Option<Plan>> {
        let plans = self.plans.read().await;
        Ok(plans.values().find(|p| p.slug == slug).cloned())
    }

    async fn get_by_id(&self, id: Uuid) -> PlanResult<Option<Plan>> {
        let plans = self.plans.read().await;
        Ok(plans.get(&id).cloned())
    }

    async fn list(&self) -> PlanResult<Vec<Plan>> {
        let plans = self.plans.read().await;
        let mut result: Vec<Plan> = plans.values().cloned().collect();
        result.sort_by_key(|p| p.price_cents);
        Ok(result)
    }

    async fn plan_for_tenant(&self, tenant_id: Uuid) -> PlanResult<Option<Plan>> {
        let assignments = self.assignments.read().await;
        let Some(plan_id) = assignments.get(&tenant_id) else {
            return Ok(None);
        };
        let plans = self.plans.read().await;
        Ok(plans.get(plan_id).cloned())
    }

    async fn assign_plan(&self, tenant_id: Uuid, plan_id: Uuid) -> PlanResult<()> {
        let mut assignments = self.assignments.write().await;
        assignments.insert(tenant_id, plan_id);

        tracing::info!(tenant_id = %tenant_id, plan_id = %plan_id, "Assigned plan");
        Ok(())
    }
}
