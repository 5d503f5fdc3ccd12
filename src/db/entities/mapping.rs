//! Mapping record entity
//!
//! One row links an external record, identified by
//! `(kind, ext_channel, ext_type, ext_id, sync_direction)`, to at most one
//! cloud record, plus the bookkeeping the reconciliation engine needs to
//! decide whether the cloud copy is current.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::time;

/// Which domain entity a mapping row represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum MappingKind {
    #[sea_orm(num_value = 0)]
    ChannelAccount,
    #[sea_orm(num_value = 1)]
    Customer,
    #[sea_orm(num_value = 2)]
    CustomerEvent,
    #[sea_orm(num_value = 3)]
    Deal,
}

impl MappingKind {
    /// The cloud record type this kind maps onto.
    pub fn clab_type(self) -> &'static str {
        match self {
            MappingKind::ChannelAccount => "channelaccount",
            MappingKind::Customer => "customer",
            MappingKind::CustomerEvent => "customerevent",
            MappingKind::Deal => "deal",
        }
    }
}

/// Direction records are reconciled in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum SyncDirection {
    /// External data is pushed to the cloud service.
    #[sea_orm(num_value = 0)]
    Push,
    /// Cloud data would be fetched back; lookup-trigger only.
    #[sea_orm(num_value = 1)]
    Pull,
    /// Bidirectional. Declared but not implemented.
    #[sea_orm(num_value = 2)]
    Both,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "synced_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub kind: MappingKind,

    // Cloud identity
    pub clab_type: String,
    pub clab_id: Option<i64>, // None means never created in the cloud
    pub clab_last_update: DateTimeUtc,

    // External identity
    pub ext_channel: String,
    pub ext_type: String,
    pub ext_id: String,
    pub ext_last_update: DateTimeUtc,

    // Sync bookkeeping
    pub sync_direction: SyncDirection,
    pub err_count: i32,
    pub last_sync: DateTimeUtc,
    pub last_err: Option<DateTimeUtc>,
    pub err_msg: Option<String>,
    pub is_ignored: bool,
    pub is_locked: bool,
    pub locked_at: Option<DateTimeUtc>,
}

impl Model {
    /// Short form of the external identity, for log lines.
    pub fn ext_ref(&self) -> String {
        format!("ext({}, {}, {})", self.ext_channel, self.ext_type, self.ext_id)
    }

    /// Short form of the cloud identity, for log lines.
    pub fn clab_ref(&self) -> String {
        match self.clab_id {
            Some(id) => format!("clab({}, {})", self.clab_type, id),
            None => format!("clab({}, new)", self.clab_type),
        }
    }

    pub fn never_synced(&self) -> bool {
        time::is_sentinel(self.last_sync)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
