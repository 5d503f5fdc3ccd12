//! Reconciliation engine.
//!
//! Decides, for one external record, whether its cloud copy is current,
//! and pushes a create or update through a [`RemoteRecordClient`] when it
//! is not. Outcomes are written back to the mapping row: a success stamps
//! `last_sync`, a failed push stamps `last_err`/`err_msg` and bumps
//! `err_count`. Once `err_count` reaches [`MAX_SYNC_ERR`] the record stops
//! syncing until explicitly reset — a batch driver should surface such
//! records to an operator.

use sea_orm::DatabaseConnection;
use sea_orm::prelude::DateTimeUtc;
use tracing::{debug, info, warn};

use crate::db::entities::mapping::{self, SyncDirection};
use crate::error::{Result, SyncError};
use crate::remote::{self, RemoteRecord, RemoteRecordClient};
use crate::store::{self, IdentityFilter};
use crate::time::{self, MAX_SYNC_ERR};

/// Reconciles one external record against the remote service.
///
/// Resolves (or creates) the mapping row for `filter`, refreshes its
/// external-side freshness from `data`, and pushes when [`need_sync`]
/// says the cloud copy is behind. A failed push is recorded on the row
/// and does not propagate, so batch callers can keep going; validation,
/// database and credential errors do propagate.
///
/// Returns the mapping row as it stands after the attempt.
pub async fn sync(
    conn: &DatabaseConnection,
    client: &dyn RemoteRecordClient,
    data: &RemoteRecord,
    filter: IdentityFilter,
) -> Result<mapping::Model> {
    let mut record = store::find_or_create(conn, &filter).await?;

    if let Some(new_id) = filter.clab_id {
        link_clab(&mut record, new_id);
    }

    record.ext_last_update = time::parse_remote_timestamp(
        data.get("last_update").and_then(|v| v.as_str()),
    );
    record = store::save(conn, record).await?;

    if !need_sync(&record)? {
        debug!("{} is up to date with {}", record.ext_ref(), record.clab_ref());
        return Ok(record);
    }

    match push(client, &mut record, data).await {
        Ok(()) => mark_success(conn, record, chrono::Utc::now()).await,
        Err(SyncError::RemoteApi { code, message }) => {
            let message = format!("{code} - {message}");
            mark_failure(conn, record, chrono::Utc::now(), message).await
        }
        Err(other) => Err(other),
    }
}

/// Returns true if the record's cloud copy needs to be brought up to date.
///
/// False for ignored records and records at or over the error threshold;
/// true for records that have never synced; otherwise a freshness
/// comparison in the record's sync direction.
pub fn need_sync(record: &mapping::Model) -> Result<bool> {
    if record.is_ignored || record.err_count >= MAX_SYNC_ERR {
        return Ok(false);
    }
    if record.never_synced() {
        return Ok(true);
    }
    match record.sync_direction {
        // No clab_id means no sync ever took effect (the cloud record may
        // have been deleted since we linked it), so push regardless of
        // last_sync.
        SyncDirection::Push => {
            Ok(record.clab_id.is_none() || record.ext_last_update > record.last_sync)
        }
        SyncDirection::Pull => {
            Ok(record.clab_id.is_none() || record.clab_last_update > record.last_sync)
        }
        SyncDirection::Both => Err(SyncError::UnsupportedMode(SyncDirection::Both)),
    }
}

/// Marks the record as successfully synced at `timestamp` and persists it.
pub async fn mark_success(
    conn: &DatabaseConnection,
    mut record: mapping::Model,
    timestamp: DateTimeUtc,
) -> Result<mapping::Model> {
    debug!("{} sync success", record.ext_ref());
    record.last_sync = timestamp;
    store::save(conn, record).await
}

/// Records a failed sync attempt at `timestamp` and persists it.
pub async fn mark_failure(
    conn: &DatabaseConnection,
    mut record: mapping::Model,
    timestamp: DateTimeUtc,
    message: impl Into<String>,
) -> Result<mapping::Model> {
    let message = message.into();
    warn!("{} sync failed with error {message}", record.ext_ref());
    record.last_err = Some(timestamp);
    record.err_msg = Some(message);
    record.err_count += 1;
    store::save(conn, record).await
}

/// Points the record at a (possibly different) cloud record.
///
/// Changing the link invalidates any prior sync state, so `last_sync`
/// drops back to the sentinel. Replacing an existing link is logged as an
/// overwrite.
fn link_clab(record: &mut mapping::Model, new_clab_id: i64) {
    let old = record.clab_id;
    if old != Some(new_clab_id) {
        record.clab_id = Some(new_clab_id);
        record.last_sync = time::sentinel();
        if let Some(old_id) = old {
            warn!("{} overwriting {old_id} with {}", record.ext_ref(), record.clab_ref());
        }
    }
}

/// Executes the outbound create-or-update and applies the response to the
/// record. Any error raised here is a recordable push failure.
async fn push(
    client: &dyn RemoteRecordClient,
    record: &mut mapping::Model,
    data: &RemoteRecord,
) -> Result<()> {
    let response = match record.clab_id {
        Some(id) => {
            info!("{} updating {}", record.ext_ref(), record.clab_ref());
            client.put(id, data).await?
        }
        None => {
            info!("{} creating new cloud record", record.ext_ref());
            let response = client.post(data).await?;
            let id = remote::record_id(&response).ok_or_else(|| SyncError::RemoteApi {
                code: 0,
                message: "create response carried no record id".to_string(),
            })?;
            record.clab_id = Some(id);
            info!("{} created {}", record.ext_ref(), record.clab_ref());
            response
        }
    };

    record.clab_last_update = time::parse_remote_timestamp(
        response.get("lastUpdated").and_then(|v| v.as_str()),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::mapping::MappingKind;
    use chrono::Duration;

    fn record() -> mapping::Model {
        mapping::Model {
            id: 1,
            kind: MappingKind::Customer,
            clab_type: "customer".to_string(),
            clab_id: None,
            clab_last_update: time::sentinel(),
            ext_channel: "STORE".to_string(),
            ext_type: "customer".to_string(),
            ext_id: "C1".to_string(),
            ext_last_update: time::sentinel(),
            sync_direction: SyncDirection::Push,
            err_count: 0,
            last_sync: time::sentinel(),
            last_err: None,
            err_msg: None,
            is_ignored: false,
            is_locked: false,
            locked_at: None,
        }
    }

    #[test]
    fn never_synced_needs_sync() {
        assert!(need_sync(&record()).unwrap());
    }

    #[test]
    fn ignored_never_needs_sync() {
        let mut r = record();
        r.is_ignored = true;
        assert!(!need_sync(&r).unwrap());

        // ignored wins even for never-synced records
        r.clab_id = None;
        r.last_sync = time::sentinel();
        assert!(!need_sync(&r).unwrap());
    }

    #[test]
    fn error_threshold_suppresses_sync() {
        let mut r = record();
        r.err_count = MAX_SYNC_ERR;
        assert!(!need_sync(&r).unwrap());
        r.err_count = MAX_SYNC_ERR + 5;
        assert!(!need_sync(&r).unwrap());
        r.err_count = MAX_SYNC_ERR - 1;
        assert!(need_sync(&r).unwrap());
    }

    #[test]
    fn push_direction_compares_external_freshness() {
        let now = chrono::Utc::now();
        let mut r = record();
        r.clab_id = Some(1000);
        r.last_sync = now;
        r.ext_last_update = now - Duration::hours(1);
        assert!(!need_sync(&r).unwrap());

        r.ext_last_update = now + Duration::hours(1);
        assert!(need_sync(&r).unwrap());
    }

    #[test]
    fn push_without_cloud_link_always_syncs() {
        let now = chrono::Utc::now();
        let mut r = record();
        r.clab_id = None;
        r.last_sync = now;
        r.ext_last_update = now - Duration::hours(1);
        assert!(need_sync(&r).unwrap());
    }

    #[test]
    fn pull_direction_compares_cloud_freshness() {
        let now = chrono::Utc::now();
        let mut r = record();
        r.sync_direction = SyncDirection::Pull;
        r.clab_id = Some(1000);
        r.last_sync = now;
        r.clab_last_update = now - Duration::hours(1);
        assert!(!need_sync(&r).unwrap());

        r.clab_last_update = now + Duration::hours(1);
        assert!(need_sync(&r).unwrap());
    }

    #[test]
    fn both_direction_is_unsupported() {
        let now = chrono::Utc::now();
        let mut r = record();
        r.sync_direction = SyncDirection::Both;
        r.last_sync = now;
        assert!(matches!(
            need_sync(&r),
            Err(SyncError::UnsupportedMode(SyncDirection::Both))
        ));
    }

    #[test]
    fn relink_resets_sync_state() {
        let now = chrono::Utc::now();
        let mut r = record();
        r.clab_id = Some(1000);
        r.last_sync = now;

        link_clab(&mut r, 2000);
        assert_eq!(r.clab_id, Some(2000));
        assert!(r.never_synced());

        // linking to the same id is a no-op
        r.last_sync = now;
        link_clab(&mut r, 2000);
        assert_eq!(r.last_sync, now);
    }
}
