//! Create the job_statuses table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(JobStatuses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(JobStatuses::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(JobStatuses::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(JobStatuses::Status).string())
                    .col(ColumnDef::new(JobStatuses::Memo).text())
                    .col(ColumnDef::new(JobStatuses::LastSync).timestamp().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(JobStatuses::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum JobStatuses {
    Table,
    Id,
    Name,
    Status,
    Memo,
    LastSync,
}
