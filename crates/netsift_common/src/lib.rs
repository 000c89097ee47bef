//! Shared types for the netsift triage service.
//!
//! Everything here is pure data plus configuration: the value records that
//! flow through a triage run, the command allow-list, the error taxonomy,
//! and report assembly/rendering. No I/O beyond config file loading.

pub mod allowlist;
pub mod config;
pub mod error;
pub mod models;
pub mod report;

pub use allowlist::*;
pub use config::*;
pub use error::*;
pub use models::*;
pub use report::*;
