//! Durable lookup-or-create and update of mapping records.

use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait,
    ActiveValue::{Set, Unchanged},
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
};
use tracing::debug;

use crate::db::entities::mapping;
use crate::error::{Result, SyncError};
use crate::time;

/// Identifies one external record, and optionally the cloud record the
/// caller already knows it corresponds to.
#[derive(Debug, Clone)]
pub struct IdentityFilter {
    pub kind: mapping::MappingKind,
    pub ext_channel: String,
    pub ext_type: String,
    pub ext_id: String,
    pub sync_direction: mapping::SyncDirection,
    /// Cloud id the caller wants this mapping linked to, if known.
    pub clab_id: Option<i64>,
}

impl IdentityFilter {
    pub fn new(
        kind: mapping::MappingKind,
        ext_channel: impl Into<String>,
        ext_type: impl Into<String>,
        ext_id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            ext_channel: ext_channel.into(),
            ext_type: ext_type.into(),
            ext_id: ext_id.into(),
            sync_direction: mapping::SyncDirection::Push,
            clab_id: None,
        }
    }

    pub fn with_direction(mut self, direction: mapping::SyncDirection) -> Self {
        self.sync_direction = direction;
        self
    }

    pub fn with_clab_id(mut self, clab_id: i64) -> Self {
        self.clab_id = Some(clab_id);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.ext_channel.is_empty() || self.ext_type.is_empty() || self.ext_id.is_empty() {
            return Err(SyncError::Validation(
                "ext_channel, ext_type and ext_id are required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Looks up the mapping row for `filter`, creating it if absent.
///
/// Creation is an insert-on-conflict-do-nothing on the unique identity
/// index followed by a select, so concurrent callers racing on the same
/// identity converge on a single row.
pub async fn find_or_create(
    conn: &DatabaseConnection,
    filter: &IdentityFilter,
) -> Result<mapping::Model> {
    filter.validate()?;

    let fresh = mapping::ActiveModel {
        kind: Set(filter.kind),
        clab_type: Set(filter.kind.clab_type().to_string()),
        clab_id: Set(None),
        clab_last_update: Set(time::sentinel()),
        ext_channel: Set(filter.ext_channel.clone()),
        ext_type: Set(filter.ext_type.clone()),
        ext_id: Set(filter.ext_id.clone()),
        ext_last_update: Set(time::sentinel()),
        sync_direction: Set(filter.sync_direction),
        err_count: Set(0),
        last_sync: Set(time::sentinel()),
        last_err: Set(None),
        err_msg: Set(None),
        is_ignored: Set(false),
        is_locked: Set(false),
        locked_at: Set(None),
        ..Default::default()
    };

    mapping::Entity::insert(fresh)
        .on_conflict(
            OnConflict::columns([
                mapping::Column::Kind,
                mapping::Column::ExtChannel,
                mapping::Column::ExtType,
                mapping::Column::ExtId,
                mapping::Column::SyncDirection,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    let record = mapping::Entity::find()
        .filter(mapping::Column::Kind.eq(filter.kind))
        .filter(mapping::Column::ExtChannel.eq(filter.ext_channel.as_str()))
        .filter(mapping::Column::ExtType.eq(filter.ext_type.as_str()))
        .filter(mapping::Column::ExtId.eq(filter.ext_id.as_str()))
        .filter(mapping::Column::SyncDirection.eq(filter.sync_direction))
        .one(conn)
        .await?
        .ok_or_else(|| {
            SyncError::Database(DbErr::RecordNotFound(format!(
                "mapping row vanished after upsert: {:?}",
                filter
            )))
        })?;

    debug!("{} <-> {}", record.ext_ref(), record.clab_ref());
    Ok(record)
}

/// Persists a mutated mapping record.
///
/// Validates the external identity fields and keeps `clab_type` in step
/// with `kind`. All mutation of mapping rows goes through here (or through
/// the lock guard's conditional update).
pub async fn save(conn: &DatabaseConnection, record: mapping::Model) -> Result<mapping::Model> {
    if record.ext_channel.is_empty() || record.ext_type.is_empty() || record.ext_id.is_empty() {
        return Err(SyncError::Validation(
            "ext_channel, ext_type and ext_id are required".to_string(),
        ));
    }

    let active = mapping::ActiveModel {
        id: Unchanged(record.id),
        kind: Set(record.kind),
        clab_type: Set(record.kind.clab_type().to_string()),
        clab_id: Set(record.clab_id),
        clab_last_update: Set(record.clab_last_update),
        ext_channel: Set(record.ext_channel),
        ext_type: Set(record.ext_type),
        ext_id: Set(record.ext_id),
        ext_last_update: Set(record.ext_last_update),
        sync_direction: Set(record.sync_direction),
        err_count: Set(record.err_count),
        last_sync: Set(record.last_sync),
        last_err: Set(record.last_err),
        err_msg: Set(record.err_msg),
        is_ignored: Set(record.is_ignored),
        is_locked: Set(record.is_locked),
        locked_at: Set(record.locked_at),
    };
    Ok(active.update(conn).await?)
}

/// Fetches the current state of a mapping row by primary key.
pub async fn reload(conn: &DatabaseConnection, id: i32) -> Result<mapping::Model> {
    mapping::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| SyncError::Database(DbErr::RecordNotFound(format!("mapping {id}"))))
}

/// Clears a record's sync status and error count so it can sync again.
///
/// This is the only way out of suppression once the error threshold is
/// reached.
pub async fn reset(conn: &DatabaseConnection, record: mapping::Model) -> Result<mapping::Model> {
    let mut record = record;
    record.last_sync = time::sentinel();
    record.err_count = 0;
    record.err_msg = None;
    save(conn, record).await
}
