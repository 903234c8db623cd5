//! Sea-ORM entities for quota state
//!
//! These rows are the only shared mutable state in the subsystem. They are
//! only ever read under a row lock inside the transaction that writes them
//! back.

/// Sea-ORM entity for the rate_limit_buckets table
///
/// One row per (tenant, kind), enforced by a unique constraint that also
/// guards the lazy self-heal insert against concurrent bootstraps.
pub mod bucket {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    use crate::models::BucketKind;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "rate_limit_buckets")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub tenant_id: Uuid,
        pub kind: BucketKind,
        pub capacity: f64,
        pub tokens: f64,
        pub last_refill_at: DateTimeWithTimeZone,
        pub created_at: DateTimeWithTimeZone,
        pub updated_at: DateTimeWithTimeZone,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    impl From<&Model> for crate::bucket::BucketState {
        fn from(model: &Model) -> Self {
            Self {
                capacity: model.capacity,
                tokens: model.tokens,
                last_refill_at: model.last_refill_at.into(),
            }
        }
    }
}

/// Sea-ORM entity for the project_usage table
pub mod usage {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "project_usage")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub project_id: Uuid,
        pub tenant_id: Uuid,
        pub vector_count: i64,
        pub total_queries: i64,
        pub total_ingest_requests: i64,
        pub created_at: DateTimeWithTimeZone,
        pub updated_at: DateTimeWithTimeZone,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    impl From<Model> for crate::models::ProjectUsage {
        fn from(model: Model) -> Self {
            Self {
                project_id: model.project_id,
                tenant_id: model.tenant_id,
                vector_count: model.vector_count,
                total_queries: model.total_queries,
                total_ingest_requests: model.total_ingest_requests,
                created_at: model.created_at.into(),
                updated_at: model.updated_at.into(),
            }
        }
    }
}
