//! Domain models.

pub mod job;
pub mod link;
pub mod task;
pub mod user;
