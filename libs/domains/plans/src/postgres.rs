use async_trait::async_trait;
use database::BaseRepository;
use sea_orm::sea_query::OnConflict;
use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::{
    entity,
    error::{PlanError, PlanResult},
    models::{CreatePlan, Plan},
    repository::PlanRepository,
};

pub struct PgPlanRepository {
    base: BaseRepository<entity::plan::Entity>,
}

impl PgPlanRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    fn internal<E: std::fmt::Display>(e: E) -> PlanError {
        PlanError::Internal(format!("Database error: {}", e))
    }
}

#[async_trait]
impl PlanRepository for PgPlanRepository {
    async fn create(&self, input: CreatePlan) -> PlanResult<Plan> {
        let active_model: entity::plan::ActiveModel = input.into();

        let model = self
            .base
            .insert(active_model)
            .await
            .map_err(Self::internal)?;

        tracing::info!(plan = %model.slug, "Created plan");
        Ok(model.into())
    }

    async fn update(&self, plan: Plan) -> PlanResult<Plan> {
        let active_model: entity::plan::ActiveModel = plan.into();

        let model = self
            .base
            .update(active_model)
            .await
            .map_err(Self::internal)?;

        Ok(model.into())
    }

    async fn get_by_slug(&self, slug: &str) -> PlanResult<Option<Plan>> {
        let model = entity::plan::Entity::find()
            .filter(entity::plan::Column::Slug.eq(slug))
            .one(self.base.db())
            .await
            .map_err(Self::internal)?;

        Ok(model.map(|m| m.into()))
    }

    async fn get_by_id(&self, id: Uuid) -> PlanResult<Option<Plan>> {
        let model = self.base.find_by_id(id).await.map_err(Self::internal)?;

        Ok(model.map(|m| m.into()))
    }

    async fn list(&self) -> PlanResult<Vec<Plan>> {
        let models = entity::plan::Entity::find()
            .order_by_asc(entity::plan::Column::PriceCents)
            .all(self.base.db())
            .await
            .map_err(Self::internal)?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }

    async fn plan_for_tenant(&self, tenant_id: Uuid) -> PlanResult<Option<Plan>> {
        let result = entity::tenant_plan::Entity::find()
            .filter(entity::tenant_plan::Column::TenantId.eq(tenant_id))
            .find_also_related(entity::plan::Entity)
            .one(self.base.db())
            .await
            .map_err(Self::internal)?;

        Ok(result.and_then(|(_, plan)| plan).map(|m| m.into()))
    }

    async fn assign_plan(&self, tenant_id: Uuid, plan_id: Uuid) -> PlanResult<()> {
        let now = chrono::Utc::now();
        let active_model = entity::tenant_plan::ActiveModel {
            id: Set(Uuid::now_v7()),
            tenant_id: Set(tenant_id),
            plan_id: Set(plan_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        // One assignment row per tenant; a plan change re-points it
        entity::tenant_plan::Entity::insert(active_model)
            .on_conflict(
                OnConflict::column(entity::tenant_plan::Column::TenantId)
                    .update_columns([
                        entity::tenant_plan::Column::PlanId,
                        entity::tenant_plan::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.base.db())
            .await
            .map_err(Self::internal)?;

        tracing::info!(tenant_id = %tenant_id, plan_id = %plan_id, "Assigned plan");
        Ok(())
    }
}
