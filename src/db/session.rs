use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, error, warn};
use rusqlite::types::FromSql;
use rusqlite::{Connection, Params, Row};

use crate::error::{DirectoryError, DirectoryResult};

/// Scoped handle to the directory database. Each repository operation opens
/// exactly one session, runs its statements inside a deferred transaction, and
/// drops the session afterwards. Anything not committed is rolled back when the
/// session is closed or dropped.
pub struct Session {
    conn: Option<Connection>,
    path: PathBuf,
}

impl Session {
    /// Open a connection to the database file at `path` and start a deferred
    /// transaction. A missing parent directory or unwritable location fails
    /// here instead of surfacing later as a silent no-op.
    pub fn open(path: impl AsRef<Path>) -> DirectoryResult<Self> {
        let path = path.as_ref().to_path_buf();
        let started_at = Instant::now();

        let conn = match Connection::open(&path) {
            Ok(conn) => conn,
            Err(err) => {
                error!(
                    "event=session_open module=db status=error path={} duration_ms={} error={}",
                    path.display(),
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err.into());
            }
        };

        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("BEGIN DEFERRED")?;

        debug!(
            "event=session_open module=db status=ok path={} duration_ms={}",
            path.display(),
            started_at.elapsed().as_millis()
        );

        Ok(Self {
            conn: Some(conn),
            path,
        })
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> DirectoryResult<&Connection> {
        self.conn.as_ref().ok_or(DirectoryError::SessionClosed)
    }

    /// Run one parameterized statement, returning the number of rows changed.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> DirectoryResult<usize> {
        let affected = self.conn()?.execute(sql, params)?;
        Ok(affected)
    }

    /// Run the same statement once per parameter row. Returns the total number
    /// of rows changed across all executions.
    pub fn execute_many<P, I>(&self, sql: &str, rows: I) -> DirectoryResult<usize>
    where
        P: Params,
        I: IntoIterator<Item = P>,
    {
        let mut stmt = self.conn()?.prepare(sql)?;
        let mut affected = 0;
        for params in rows {
            affected += stmt.execute(params)?;
        }
        Ok(affected)
    }

    /// Run a query and map every row. Mappers read columns by name
    /// (`row.get("landline")`), never by position.
    pub fn query<T, P, F>(&self, sql: &str, params: P, map: F) -> DirectoryResult<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.conn()?.prepare(sql)?;
        let rows = stmt
            .query_map(params, map)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Run a query that yields exactly one value.
    pub fn query_scalar<T: FromSql, P: Params>(&self, sql: &str, params: P) -> DirectoryResult<T> {
        let value = self.conn()?.query_row(sql, params, |row| row.get(0))?;
        Ok(value)
    }

    /// Persist pending writes and keep the session usable for further work.
    pub fn commit(&mut self) -> DirectoryResult<()> {
        self.conn()?.execute_batch("COMMIT; BEGIN DEFERRED")?;
        Ok(())
    }

    /// Release the connection. Uncommitted work is rolled back. Calling close
    /// on an already closed session does nothing.
    pub fn close(&mut self) -> DirectoryResult<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK")?;
        }
        conn.close().map_err(|(_, err)| DirectoryError::from(err))?;

        debug!(
            "event=session_close module=db status=ok path={}",
            self.path.display()
        );
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(
                "event=session_close module=db status=error path={} error={}",
                self.path.display(),
                err
            );
        }
    }
}
