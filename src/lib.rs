//! CloudLink SDK
//!
//! Links records owned by an external application to records in a remote
//! cloud service. A durable local mapping table remembers which external
//! record corresponds to which cloud record, and the reconciliation engine
//! decides per record whether to create, update, or skip the cloud copy.
//!
//! The pieces, bottom up:
//!
//! - [`db`] — SQLite persistence (SeaORM entities and migrations) for
//!   mapping rows, the shared access token, and job bookkeeping.
//! - [`credentials`] — bearer token lifecycle, optionally shared across
//!   worker processes through the database.
//! - [`remote`] — the [`remote::RemoteRecordClient`] trait the engine
//!   pushes through, plus a bundled reqwest implementation of the cloud
//!   REST API.
//! - [`store`] — lookup-or-create and validated saves of mapping rows.
//! - [`engine`] — the sync decision and execution logic.
//! - [`lock`] — advisory per-record locking with a staleness window.
//!
//! ```no_run
//! # use cloudlink::{db::Database, engine, store::IdentityFilter};
//! # use cloudlink::db::entities::mapping::MappingKind;
//! # async fn example(client: &dyn cloudlink::remote::RemoteRecordClient) -> cloudlink::Result<()> {
//! let database = Database::create(std::path::Path::new("sync.db")).await?;
//! database.migrate().await?;
//!
//! let mut data = serde_json::Map::new();
//! data.insert("name".into(), "guru".into());
//!
//! let filter = IdentityFilter::new(MappingKind::Customer, "MY_SUPER_STORE", "customer", "XYZ1234");
//! engine::sync(database.conn(), client, &data, filter).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod credentials;
pub mod db;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod lock;
pub mod remote;
pub mod store;
pub mod time;

pub use config::ClientConfig;
pub use error::{Result, SyncError};
