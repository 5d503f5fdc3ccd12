//! Per-job sync bookkeeping.
//!
//! Batch drivers record the last successful run of a named job so the
//! next run can pick up where the previous one left off.

use sea_orm::sea_query::OnConflict;
use sea_orm::prelude::DateTimeUtc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter,
};

use crate::db::entities::job_status;
use crate::error::{Result, SyncError};
use crate::time;

/// Returns the status row for `name`, creating it if this is the first
/// time the job runs. A fresh row reports [`job_status::Model::is_new`].
pub async fn job_status(conn: &DatabaseConnection, name: &str) -> Result<job_status::Model> {
    job_status::Entity::insert(job_status::ActiveModel {
        name: Set(name.to_string()),
        status: Set(None),
        memo: Set(None),
        last_sync: Set(time::sentinel()),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::column(job_status::Column::Name)
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(conn)
    .await?;

    job_status::Entity::find()
        .filter(job_status::Column::Name.eq(name))
        .one(conn)
        .await?
        .ok_or_else(|| SyncError::Database(DbErr::RecordNotFound(format!("job status {name}"))))
}

/// Records a successful run of the job at `timestamp`.
pub async fn touch(
    conn: &DatabaseConnection,
    job: job_status::Model,
    timestamp: DateTimeUtc,
) -> Result<job_status::Model> {
    let mut active = job.into_active_model();
    active.last_sync = Set(timestamp);
    Ok(active.update(conn).await?)
}
