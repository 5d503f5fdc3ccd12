//! Job status entity
//!
//! Coarse bookkeeping for named batch jobs: when did this job last
//! complete successfully.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::time;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "job_statuses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub status: Option<String>,
    pub memo: Option<String>,
    pub last_sync: DateTimeUtc,
}

impl Model {
    /// True if the job has never recorded a successful run.
    pub fn is_new(&self) -> bool {
        time::is_sentinel(self.last_sync)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
