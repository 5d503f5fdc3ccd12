//! Database migrations

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_synced_records::Migration),
            Box::new(m20240102_000001_create_access_tokens::Migration),
            Box::new(m20240103_000001_create_job_statuses::Migration),
        ]
    }
}

mod m20240101_000001_create_synced_records;
mod m20240102_000001_create_access_tokens;
mod m20240103_000001_create_job_statuses;
