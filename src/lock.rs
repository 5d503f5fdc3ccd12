//! Advisory per-record locking.
//!
//! Lets cooperating workers avoid processing the same mapping record at
//! the same time. The lock is advisory: `unlock` does not check
//! ownership, and nothing stops a caller that ignores the lock entirely.
//! A lock older than the staleness threshold is presumed abandoned by a
//! crashed worker and may be taken over.

use chrono::{Duration, Utc};
use sea_orm::sea_query::Condition;
use sea_orm::{ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::debug;

use crate::db::entities::mapping;
use crate::error::Result;
use crate::time::STALE_LOCK_TIMEOUT_SECS;

/// Tries to take the advisory lock on a mapping record.
///
/// Succeeds when the record is unlocked, or locked but stale (locked
/// longer ago than `staleness`). The check and the lock write are one
/// conditional UPDATE, so two workers racing for the same record cannot
/// both succeed. On success the caller's model is stamped with the lock
/// state the UPDATE wrote.
pub async fn try_lock_with_staleness(
    conn: &DatabaseConnection,
    record: &mut mapping::Model,
    staleness: Duration,
) -> Result<bool> {
    let now = Utc::now();
    let stale_before = now - staleness;

    let updated = mapping::Entity::update_many()
        .set(mapping::ActiveModel {
            is_locked: Set(true),
            locked_at: Set(Some(now)),
            ..Default::default()
        })
        .filter(mapping::Column::Id.eq(record.id))
        .filter(
            Condition::any()
                .add(mapping::Column::IsLocked.eq(false))
                .add(mapping::Column::LockedAt.lt(stale_before))
                .add(mapping::Column::LockedAt.is_null()),
        )
        .exec(conn)
        .await?;

    let acquired = updated.rows_affected == 1;
    if acquired {
        record.is_locked = true;
        record.locked_at = Some(now);
    }
    debug!(
        "{} lock {}",
        record.ext_ref(),
        if acquired { "acquired" } else { "busy" }
    );
    Ok(acquired)
}

/// [`try_lock_with_staleness`] with the default one hour threshold.
pub async fn try_lock(conn: &DatabaseConnection, record: &mut mapping::Model) -> Result<bool> {
    try_lock_with_staleness(conn, record, Duration::seconds(STALE_LOCK_TIMEOUT_SECS)).await
}

/// Releases the advisory lock. Always succeeds, held or not.
pub async fn unlock(conn: &DatabaseConnection, record: &mut mapping::Model) -> Result<()> {
    mapping::Entity::update_many()
        .set(mapping::ActiveModel {
            is_locked: Set(false),
            locked_at: Set(None),
            ..Default::default()
        })
        .filter(mapping::Column::Id.eq(record.id))
        .exec(conn)
        .await?;
    record.is_locked = false;
    record.locked_at = None;
    Ok(())
}
