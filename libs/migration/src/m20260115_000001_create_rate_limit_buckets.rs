use sea_orm_migration::sea_query::extension::postgres::Type;
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create bucket_kind enum
        manager
            .create_type(
                Type::create()
                    .as_enum(BucketKind::Enum)
                    .values([BucketKind::Query, BucketKind::Ingest])
                    .to_owned(),
            )
            .await?;

        // Create rate_limit_buckets table
        manager
            .create_table(
                Table::create()
                    .table(RateLimitBuckets::Table)
                    .if_not_exists()
                    .col(pk_uuid(RateLimitBuckets::Id))
                    .col(uuid(RateLimitBuckets::TenantId))
                    .col(
                        ColumnDef::new(RateLimitBuckets::Kind)
                            .enumeration(BucketKind::Enum, [BucketKind::Query, BucketKind::Ingest])
                            .not_null(),
                    )
                    .col(double(RateLimitBuckets::Capacity))
                    .col(double(RateLimitBuckets::Tokens))
                    .col(timestamp_with_time_zone(RateLimitBuckets::LastRefillAt))
                    .col(
                        timestamp_with_time_zone(RateLimitBuckets::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(RateLimitBuckets::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique constraint backing the insert-if-absent self-heal: two
        // concurrent bootstraps race on the insert, not on a pre-check.
        manager
            .create_index(
                Index::create()
                    .name("uq_rate_limit_buckets_tenant_kind")
                    .table(RateLimitBuckets::Table)
                    .col(RateLimitBuckets::TenantId)
                    .col(RateLimitBuckets::Kind)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RateLimitBuckets::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(BucketKind::Enum).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum RateLimitBuckets {
    Table,
    Id,
    TenantId,
    Kind,
    Capacity,
    Tokens,
    LastRefillAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum BucketKind {
    #[sea_orm(iden = "bucket_kind")]
    Enum,
    #[sea_orm(iden = "query")]
    Query,
    #[sea_orm(iden = "ingest")]
    Ingest,
}
