//! Persistence module split across logical submodules.

mod connection;
mod records;
mod session;

pub use connection::{data_dir, default_db_path, ensure_schema};
pub use records::{ImportSummary, RecordRepository, SqliteDirectory};
pub use session::Session;
