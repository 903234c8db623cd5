//! Sea-ORM entities for the plan catalog

/// Sea-ORM entity for the plans table
pub mod plan {
    use sea_orm::entity::prelude::*;
    use sea_orm::ActiveValue::Set;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "plans")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        #[sea_orm(unique)]
        pub slug: String,
        pub name: String,
        pub price_cents: i32,
        pub query_qps_limit: f64,
        pub ingest_qps_limit: f64,
        pub project_limit: Option<i32>,
        pub vector_limit_per_project: Option<i64>,
        pub created_at: DateTimeWithTimeZone,
        pub updated_at: DateTimeWithTimeZone,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::tenant_plan::Entity")]
        TenantPlan,
    }

    impl Related<super::tenant_plan::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::TenantPlan.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}

    impl From<Model> for crate::models::Plan {
        fn from(model: Model) -> Self {
            Self {
                id: model.id,
                slug: model.slug,
                name: model.name,
                price_cents: model.price_cents,
                query_qps_limit: model.query_qps_limit,
                ingest_qps_limit: model.ingest_qps_limit,
                project_limit: model.project_limit,
                vector_limit_per_project: model.vector_limit_per_project,
                created_at: model.created_at.into(),
                updated_at: model.updated_at.into(),
            }
        }
    }

    impl From<crate::models::Plan> for ActiveModel {
        fn from(plan: crate::models::Plan) -> Self {
            ActiveModel {
                id: Set(plan.id),
                slug: Set(plan.slug),
                name: Set(plan.name),
                price_cents: Set(plan.price_cents),
                query_qps_limit: Set(plan.query_qps_limit),
                ingest_qps_limit: Set(plan.ingest_qps_limit),
                project_limit: Set(plan.project_limit),
                vector_limit_per_project: Set(plan.vector_limit_per_project),
                created_at: Set(plan.created_at.into()),
                updated_at: Set(plan.updated_at.into()),
            }
        }
    }

    impl From<crate::models::CreatePlan> for ActiveModel {
        fn from(input: crate::models::CreatePlan) -> Self {
            crate::models::Plan::new(input).into()
        }
    }
}

/// Sea-ORM entity for the tenant_plans assignment table
///
/// One row per tenant; plan changes re-point `plan_id`.
pub mod tenant_plan {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "tenant_plans")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        #[sea_orm(unique)]
        pub tenant_id: Uuid,
        pub plan_id: Uuid,
        pub created_at: DateTimeWithTimeZone,
        pub updated_at: DateTimeWithTimeZone,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::plan::Entity",
            from = "Column::PlanId",
            to = "super::plan::Column::Id"
        )]
        Plan,
    }

    impl Related<super::plan::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Plan.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}
