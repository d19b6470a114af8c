//! Core library surface for the switchboard extension directory.
//!
//! The store is reached only through [`RecordRepository`]; the terminal UI,
//! the binary and the integration tests all go through the same contract.
pub mod config;
pub mod db;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod masks;
pub mod models;
pub mod notices;
pub mod transfer;
pub mod ui;

/// Persistence entry points used by `main.rs` and the tests.
pub use db::{ensure_schema, ImportSummary, RecordRepository, Session, SqliteDirectory};

/// Domain types other layers manipulate.
pub use models::{Record, RecordField, ValidationError};

pub use duplicates::{DuplicateGroup, DuplicateResolver, RemovalReport};
pub use error::{DirectoryError, DirectoryResult};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
