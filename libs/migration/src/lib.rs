pub use sea_orm_migration::prelude::*;

mod m20260115_000000_create_plans;
mod m20260115_000001_create_rate_limit_buckets;
mod m20260115_000002_create_project_usage;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260115_000000_create_plans::Migration),
            Box::new(m20260115_000001_create_rate_limit_buckets::Migration),
            Box::new(m20260115_000002_create_project_usage::Migration),
        ]
    }
}
