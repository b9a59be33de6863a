//! Periodic reminder scanning.

pub mod scanner;

pub use scanner::{spawn_scanner_task, ReminderScanner, ScanReport};
