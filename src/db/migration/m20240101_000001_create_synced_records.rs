//! Create the synced_records mapping table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncedRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncedRecords::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyncedRecords::Kind).integer().not_null())
                    .col(ColumnDef::new(SyncedRecords::ClabType).string().not_null())
                    .col(ColumnDef::new(SyncedRecords::ClabId).big_integer())
                    .col(
                        ColumnDef::new(SyncedRecords::ClabLastUpdate)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SyncedRecords::ExtChannel).string().not_null())
                    .col(ColumnDef::new(SyncedRecords::ExtType).string().not_null())
                    .col(ColumnDef::new(SyncedRecords::ExtId).string().not_null())
                    .col(
                        ColumnDef::new(SyncedRecords::ExtLastUpdate)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SyncedRecords::SyncDirection)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncedRecords::ErrCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(SyncedRecords::LastSync).timestamp().not_null())
                    .col(ColumnDef::new(SyncedRecords::LastErr).timestamp())
                    .col(ColumnDef::new(SyncedRecords::ErrMsg).text())
                    .col(
                        ColumnDef::new(SyncedRecords::IsIgnored)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(SyncedRecords::IsLocked)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(SyncedRecords::LockedAt).timestamp())
                    .to_owned(),
            )
            .await?;

        // The identity tuple is the correctness anchor: one mapping row per
        // external identity per direction, enforced by the database.
        manager
            .create_index(
                Index::create()
                    .name("idx_synced_records_identity")
                    .table(SyncedRecords::Table)
                    .col(SyncedRecords::Kind)
                    .col(SyncedRecords::ExtChannel)
                    .col(SyncedRecords::ExtType)
                    .col(SyncedRecords::ExtId)
                    .col(SyncedRecords::SyncDirection)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_synced_records_clab_id")
                    .table(SyncedRecords::Table)
                    .col(SyncedRecords::ClabId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncedRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SyncedRecords {
    Table,
    Id,
    Kind,
    ClabType,
    ClabId,
    ClabLastUpdate,
    ExtChannel,
    ExtType,
    ExtId,
    ExtLastUpdate,
    SyncDirection,
    ErrCount,
    LastSync,
    LastErr,
    ErrMsg,
    IsIgnored,
    IsLocked,
    LockedAt,
}
