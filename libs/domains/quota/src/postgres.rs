use async_trait::async_trait;
use chrono::{DateTime, Utc};
use database::BaseRepository;
use sea_orm::sea_query::{Expr, ExprTrait, OnConflict};
use sea_orm::ActiveValue::Set;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    IntoActiveModel, QueryFilter, QuerySelect, TransactionTrait,
};
use uuid::Uuid;

use crate::bucket::BucketState;
use crate::capacity;
use crate::entity;
use crate::error::{QuotaError, QuotaResult};
use crate::models::{Admission, BucketKind, CapacityDecision, PlanLimits, ProjectUsage};
use crate::repository::QuotaRepository;

/// Postgres-backed quota repository.
///
/// The bucket and usage rows are the single source of truth across service
/// replicas; there is no cache tier and no in-process state. Every
/// admission decision is a `SELECT ... FOR UPDATE` / write-back inside one
/// transaction, so two concurrent checks against the same tenant+kind (or
/// the same project) serialize on the row lock and can never double-spend
/// a token or jointly overshoot a cap. Unrelated tenants and projects lock
/// different rows and never contend.
pub struct PgQuotaRepository {
    base: BaseRepository<entity::usage::Entity>,
}

impl PgQuotaRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    fn db(&self) -> &DatabaseConnection {
        self.base.db()
    }

    /// Resolve the tenant's current limits through the assignment row,
    /// inside the caller's transaction. No plan assignment means the
    /// tenant cannot be metered: fail closed.
    async fn plan_limits(
        &self,
        txn: &DatabaseTransaction,
        tenant_id: Uuid,
    ) -> QuotaResult<PlanLimits> {
        use domain_plans::entity::{plan, tenant_plan};

        let assignment = tenant_plan::Entity::find()
            .filter(tenant_plan::Column::TenantId.eq(tenant_id))
            .find_also_related(plan::Entity)
            .one(txn)
            .await?;

        let plan_model = assignment
            .and_then(|(_, plan)| plan)
            .ok_or(QuotaError::MissingPlan(tenant_id))?;
        let plan: domain_plans::Plan = plan_model.into();

        Ok(PlanLimits::from(&plan))
    }

    /// Lock the tenant's bucket row for `kind`, creating it from the
    /// current plan if absent. The unique (tenant, kind) constraint absorbs
    /// the create race: both racers insert-or-nothing, then re-select the
    /// surviving row under lock.
    async fn lock_or_create_bucket(
        &self,
        txn: &DatabaseTransaction,
        tenant_id: Uuid,
        kind: BucketKind,
        now: DateTime<Utc>,
    ) -> QuotaResult<entity::bucket::Model> {
        if let Some(model) = Self::lock_bucket(txn, tenant_id, kind).await? {
            return Ok(model);
        }

        let limits = self.plan_limits(txn, tenant_id).await?;
        let state = BucketState::fresh(limits.qps_for(kind), now);
        tracing::debug!(tenant_id = %tenant_id, %kind, "Self-healing missing bucket");

        Self::insert_bucket_if_absent(txn, tenant_id, kind, &state, now).await?;

        Self::lock_bucket(txn, tenant_id, kind)
            .await?
            .ok_or_else(|| {
                QuotaError::Store(sea_orm::DbErr::RecordNotFound(format!(
                    "bucket {}/{} vanished after upsert",
                    tenant_id, kind
                )))
            })
    }

    async fn lock_bucket(
        txn: &DatabaseTransaction,
        tenant_id: Uuid,
        kind: BucketKind,
    ) -> QuotaResult<Option<entity::bucket::Model>> {
        Ok(entity::bucket::Entity::find()
            .filter(entity::bucket::Column::TenantId.eq(tenant_id))
            .filter(entity::bucket::Column::Kind.eq(kind))
            .lock_exclusive()
            .one(txn)
            .await?)
    }

    async fn insert_bucket_if_absent(
        txn: &DatabaseTransaction,
        tenant_id: Uuid,
        kind: BucketKind,
        state: &BucketState,
        now: DateTime<Utc>,
    ) -> QuotaResult<()> {
        let active_model = entity::bucket::ActiveModel {
            id: Set(Uuid::now_v7()),
            tenant_id: Set(tenant_id),
            kind: Set(kind),
            capacity: Set(state.capacity),
            tokens: Set(state.tokens),
            last_refill_at: Set(state.last_refill_at.into()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        entity::bucket::Entity::insert(active_model)
            .on_conflict(
                OnConflict::columns([
                    entity::bucket::Column::TenantId,
                    entity::bucket::Column::Kind,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(txn)
            .await?;

        Ok(())
    }

    /// Write refreshed bucket state back onto its locked row.
    async fn write_bucket_state(
        txn: &DatabaseTransaction,
        model: entity::bucket::Model,
        state: &BucketState,
        now: DateTime<Utc>,
    ) -> QuotaResult<()> {
        let mut active_model = model.into_active_model();
        active_model.capacity = Set(state.capacity);
        active_model.tokens = Set(state.tokens);
        active_model.last_refill_at = Set(state.last_refill_at.into());
        active_model.updated_at = Set(now.into());
        active_model.update(txn).await?;
        Ok(())
    }
}

#[async_trait]
impl QuotaRepository for PgQuotaRepository {
    async fn consume_token(&self, tenant_id: Uuid, kind: BucketKind) -> QuotaResult<Admission> {
        let now = Utc::now();
        let txn = self.db().begin().await?;

        let model = self.lock_or_create_bucket(&txn, tenant_id, kind, now).await?;

        let mut state = BucketState::from(&model);
        let admission = state.try_debit(now);

        // Denials also write back: the refreshed tokens and baseline keep
        // future refills accruing from the right point in time.
        Self::write_bucket_state(&txn, model, &state, now).await?;
        txn.commit().await?;

        if let Admission::Denied {
            retry_after_seconds,
        } = admission
        {
            tracing::debug!(
                tenant_id = %tenant_id,
                %kind,
                retry_after_seconds,
                "Rate limit denied"
            );
        }

        Ok(admission)
    }

    async fn reserve_capacity(
        &self,
        project_id: Uuid,
        delta: i64,
    ) -> QuotaResult<CapacityDecision> {
        let now = Utc::now();
        let txn = self.db().begin().await?;

        let model = entity::usage::Entity::find_by_id(project_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(QuotaError::UsageMissing(project_id))?;

        let limits = self.plan_limits(&txn, model.tenant_id).await?;

        let decision =
            capacity::apply_delta(model.vector_count, delta, limits.vector_limit_per_project);

        match decision {
            CapacityDecision::Reserved { vector_count } => {
                let mut active_model = model.into_active_model();
                active_model.vector_count = Set(vector_count);
                active_model.updated_at = Set(now.into());
                active_model.update(&txn).await?;
                txn.commit().await?;
            }
            CapacityDecision::Rejected { limit, current } => {
                // Nothing to write; release the lock
                txn.commit().await?;
                tracing::debug!(
                    project_id = %project_id,
                    limit,
                    current,
                    "Capacity reservation rejected"
                );
            }
        }

        Ok(decision)
    }

    async fn ensure_buckets(&self, tenant_id: Uuid) -> QuotaResult<()> {
        let now = Utc::now();
        let txn = self.db().begin().await?;

        let limits = self.plan_limits(&txn, tenant_id).await?;

        for kind in [BucketKind::Query, BucketKind::Ingest] {
            let state = BucketState::fresh(limits.qps_for(kind), now);
            Self::insert_bucket_if_absent(&txn, tenant_id, kind, &state, now).await?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn apply_plan_limits(&self, tenant_id: Uuid, limits: &PlanLimits) -> QuotaResult<()> {
        let now = Utc::now();
        let txn = self.db().begin().await?;

        for kind in [BucketKind::Query, BucketKind::Ingest] {
            let qps = limits.qps_for(kind);

            match Self::lock_bucket(&txn, tenant_id, kind).await? {
                Some(model) => {
                    let mut state = BucketState::from(&model);
                    state.apply_capacity(qps, now);
                    Self::write_bucket_state(&txn, model, &state, now).await?;
                }
                None => {
                    let state = BucketState::fresh(qps, now);
                    Self::insert_bucket_if_absent(&txn, tenant_id, kind, &state, now).await?;
                }
            }
        }

        txn.commit().await?;

        tracing::info!(tenant_id = %tenant_id, "Applied plan limits to buckets");
        Ok(())
    }

    async fn record_operation(&self, project_id: Uuid, kind: BucketKind) -> QuotaResult<()> {
        let counter = match kind {
            BucketKind::Query => entity::usage::Column::TotalQueries,
            BucketKind::Ingest => entity::usage::Column::TotalIngestRequests,
        };

        // Single-statement increment; counters are reporting-only so no
        // surrounding transaction is needed
        let result = entity::usage::Entity::update_many()
            .col_expr(counter, Expr::col(counter).add(1))
            .col_expr(
                entity::usage::Column::UpdatedAt,
                Expr::value(DateTimeWithTimeZone::from(Utc::now())),
            )
            .filter(entity::usage::Column::ProjectId.eq(project_id))
            .exec(self.db())
            .await?;

        if result.rows_affected == 0 {
            return Err(QuotaError::UsageMissing(project_id));
        }

        Ok(())
    }

    async fn create_usage(&self, project_id: Uuid, tenant_id: Uuid) -> QuotaResult<()> {
        let now = Utc::now();
        let active_model = entity::usage::ActiveModel {
            project_id: Set(project_id),
            tenant_id: Set(tenant_id),
            vector_count: Set(0),
            total_queries: Set(0),
            total_ingest_requests: Set(0),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        entity::usage::Entity::insert(active_model)
            .on_conflict(
                OnConflict::column(entity::usage::Column::ProjectId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.db())
            .await?;

        tracing::info!(project_id = %project_id, tenant_id = %tenant_id, "Created project usage");
        Ok(())
    }

    async fn delete_usage(&self, project_id: Uuid) -> QuotaResult<bool> {
        let rows_affected = self
            .base
            .delete_by_id(project_id)
            .await
            .map_err(|e| match e {
                database::DatabaseError::Postgres(db_err) => QuotaError::Store(db_err),
                other => QuotaError::Store(sea_orm::DbErr::Custom(other.to_string())),
            })?;

        if rows_affected > 0 {
            tracing::info!(project_id = %project_id, "Deleted project usage");
        }
        Ok(rows_affected > 0)
    }

    async fn usage(&self, project_id: Uuid) -> QuotaResult<Option<ProjectUsage>> {
        let model = entity::usage::Entity::find_by_id(project_id)
            .one(self.db())
            .await?;

        Ok(model.map(|m| m.into()))
    }

    async fn reconcile_vector_count(&self, project_id: Uuid, actual: i64) -> QuotaResult<()> {
        let now = Utc::now();
        let txn = self.db().begin().await?;

        let model = entity::usage::Entity::find_by_id(project_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(QuotaError::UsageMissing(project_id))?;

        let corrected = Ord::max(actual, 0);
        if model.vector_count != corrected {
            tracing::warn!(
                project_id = %project_id,
                stored = model.vector_count,
                actual = corrected,
                "Reconciling drifted vector count"
            );
        }

        let mut active_model = model.into_active_model();
        active_model.vector_count = Set(corrected);
        active_model.updated_at = Set(now.into());
        active_model.update(&txn).await?;
        txn.commit().await?;

        Ok(())
    }
}
