//! Database entities

pub mod credential;
pub mod job_status;
pub mod mapping;
