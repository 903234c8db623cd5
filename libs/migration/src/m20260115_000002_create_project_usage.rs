use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProjectUsage::Table)
                    .if_not_exists()
                    .col(pk_uuid(ProjectUsage::ProjectId))
                    .col(uuid(ProjectUsage::TenantId))
                    .col(big_integer(ProjectUsage::VectorCount).default(0))
                    .col(big_integer(ProjectUsage::TotalQueries).default(0))
                    .col(big_integer(ProjectUsage::TotalIngestRequests).default(0))
                    .col(
                        timestamp_with_time_zone(ProjectUsage::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(ProjectUsage::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_project_usage_tenant_id")
                    .table(ProjectUsage::Table)
                    .col(ProjectUsage::TenantId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProjectUsage::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum ProjectUsage {
    Table,
    ProjectId,
    TenantId,
    VectorCount,
    TotalQueries,
    TotalIngestRequests,
    CreatedAt,
    UpdatedAt,
}
