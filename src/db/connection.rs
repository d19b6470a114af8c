use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use log::info;

use crate::error::{DirectoryError, DirectoryResult};

use super::session::Session;

/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".switchboard-directory";
/// SQLite file name stored inside the application data directory.
const DB_FILE_NAME: &str = "directory.sqlite";

/// Make sure the database file at `path` exists and carries the `contacts`
/// table. Parent directories are created on demand.
pub fn ensure_schema(path: &Path) -> DirectoryResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| DirectoryError::file(parent, err))?;
    }

    let mut session = Session::open(path)?;
    session.execute(
        "CREATE TABLE IF NOT EXISTS contacts (
            id INTEGER PRIMARY KEY,
            secretary_office TEXT,
            landline TEXT,
            sector TEXT,
            responsible TEXT,
            extension TEXT,
            cell TEXT,
            email TEXT
        )",
        [],
    )?;
    session.commit()?;
    session.close()?;

    info!(
        "event=schema_ready module=db status=ok path={}",
        path.display()
    );
    Ok(())
}

/// Resolve the application data directory inside the user's home.
pub fn data_dir() -> DirectoryResult<PathBuf> {
    let base_dirs = BaseDirs::new()
        .ok_or_else(|| DirectoryError::Config("could not locate home directory".into()))?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME))
}

/// Database location used when no path has been configured.
pub fn default_db_path(data_dir: &Path) -> PathBuf {
    data_dir.join(DB_FILE_NAME)
}
