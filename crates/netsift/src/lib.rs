//! Netsift service library - exposes modules for testing.

pub mod coordinator;
pub mod diagnostics;
pub mod engine;
pub mod executor;
pub mod inventory;
pub mod oracle;
pub mod parsers;
pub mod prompts;
pub mod session;
