#![forbid(unsafe_code)]

//! Reminder scanning, notification delivery, and Telegram account linking.

pub mod clock;
pub mod config;
pub mod errors;
pub mod http;
pub mod linking;
pub mod models;
pub mod persistence;
pub mod queue;
pub mod scheduler;
pub mod telegram;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::GlobalConfig;
pub use errors::{AppError, Result};
