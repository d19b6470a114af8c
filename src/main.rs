//! Binary entry point: load settings, start file logging, make sure the
//! database carries its schema, then drive the Ratatui event loop.
use anyhow::Context;
use log::info;

use switchboard_directory::config::{settings_path, Settings};
use switchboard_directory::db::data_dir;
use switchboard_directory::logging::{init_logging, log_dir};
use switchboard_directory::{ensure_schema, run_app, App, SqliteDirectory};

fn main() -> anyhow::Result<()> {
    let data_dir = data_dir()?;
    let settings = Settings::load(&settings_path(&data_dir))?;
    init_logging(&settings.log_level, &log_dir(&data_dir))?;

    let db_path = settings.current_database_path(&data_dir);
    ensure_schema(&db_path)
        .with_context(|| format!("failed to prepare database at {}", db_path.display()))?;
    info!(
        "event=app_ready module=main status=ok database={}",
        db_path.display()
    );

    let mut app = App::new(SqliteDirectory::new(db_path), settings)?;
    run_app(&mut app)
}
