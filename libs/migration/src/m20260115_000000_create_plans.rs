use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create plans table
        manager
            .create_table(
                Table::create()
                    .table(Plans::Table)
                    .if_not_exists()
                    .col(pk_uuid(Plans::Id))
                    .col(string_uniq(Plans::Slug))
                    .col(string(Plans::Name))
                    .col(integer(Plans::PriceCents).default(0))
                    .col(double(Plans::QueryQpsLimit))
                    .col(double(Plans::IngestQpsLimit))
                    .col(integer_null(Plans::ProjectLimit))
                    .col(big_integer_null(Plans::VectorLimitPerProject))
                    .col(
                        timestamp_with_time_zone(Plans::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Plans::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Create tenant_plans assignment table (plan changes re-point PlanId,
        // the plan rows themselves stay immutable)
        manager
            .create_table(
                Table::create()
                    .table(TenantPlans::Table)
                    .if_not_exists()
                    .col(pk_uuid(TenantPlans::Id))
                    .col(uuid_uniq(TenantPlans::TenantId))
                    .col(uuid(TenantPlans::PlanId))
                    .col(
                        timestamp_with_time_zone(TenantPlans::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(TenantPlans::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tenant_plans_plan_id")
                            .from(TenantPlans::Table, TenantPlans::PlanId)
                            .to(Plans::Table, Plans::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tenant_plans_plan_id")
                    .table(TenantPlans::Table)
                    .col(TenantPlans::PlanId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TenantPlans::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Plans::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Plans {
    Table,
    Id,
    Slug,
    Name,
    PriceCents,
    QueryQpsLimit,
    IngestQpsLimit,
    ProjectLimit,
    VectorLimitPerProject,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TenantPlans {
    Table,
    Id,
    TenantId,
    PlanId,
    CreatedAt,
    UpdatedAt,
}
