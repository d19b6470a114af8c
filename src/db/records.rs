use std::path::{Path, PathBuf};

use log::{error, info, warn};
use rusqlite::{params, params_from_iter, Row};

use crate::error::{DirectoryError, DirectoryResult};
use crate::models::{Record, RecordField};
use crate::transfer;

use super::session::Session;

const RECORD_COLUMNS: &str =
    "id, secretary_office, landline, sector, responsible, extension, cell, email";

/// Conditional insert used by the CSV import. The existence check and the
/// write are a single statement so concurrent importers cannot both insert.
const INSERT_IF_ABSENT_SQL: &str = "INSERT INTO contacts
        (secretary_office, landline, sector, responsible, extension, cell, email)
    SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7
    WHERE NOT EXISTS (
        SELECT 1 FROM contacts
        WHERE secretary_office IS ?1
          AND landline IS ?2
          AND sector IS ?3
          AND responsible IS ?4
          AND extension IS ?5
          AND cell IS ?6
          AND email IS ?7
    )";

/// Outcome of a CSV import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    /// Well-formed rows matching an existing record on all seven fields.
    pub already_present: usize,
    /// Rows skipped for having a column count other than seven.
    pub malformed: usize,
    /// Seven-column rows skipped because the record would not validate.
    pub invalid: usize,
}

/// CRUD, search, transfer and duplicate queries over directory records. The
/// UI only talks to the store through this contract.
pub trait RecordRepository {
    /// Every record, ordered by secretary office.
    fn list_all(&self) -> DirectoryResult<Vec<Record>>;
    /// Records whose `field` contains `keyword` (case-sensitive). `field` is a
    /// column name, attribute name or label of one of the seven fields.
    fn search(&self, field: &str, keyword: &str) -> DirectoryResult<Vec<Record>>;
    fn insert(&self, record: &Record) -> DirectoryResult<()>;
    /// Replace all seven fields of `id`. Returns the number of rows touched,
    /// which is zero when `id` does not exist.
    fn update(&self, id: i64, record: &Record) -> DirectoryResult<usize>;
    fn delete(&self, id: i64) -> DirectoryResult<()>;
    fn count_all(&self) -> DirectoryResult<usize>;
    /// Remove every record, returning how many were deleted.
    fn reset(&self) -> DirectoryResult<usize>;
    fn import_csv(&self, path: &Path) -> DirectoryResult<ImportSummary>;
    /// Write every record (without id) to `path`. Returns the row count.
    fn export_csv(&self, path: &Path, delimiter: u8) -> DirectoryResult<usize>;
    /// Members of every group of two or more records sharing secretary
    /// office, landline, sector and extension.
    fn find_duplicate_groups(&self) -> DirectoryResult<Vec<Record>>;
}

/// Repository backed by the SQLite file at `path`. Cheap to clone; every
/// operation opens its own [`Session`].
#[derive(Debug, Clone)]
pub struct SqliteDirectory {
    path: PathBuf,
}

impl SqliteDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn session(&self) -> DirectoryResult<Session> {
        Session::open(&self.path)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: Some(row.get("id")?),
        secretary_office: text_column(row, "secretary_office")?,
        landline: text_column(row, "landline")?,
        sector: text_column(row, "sector")?,
        responsible: text_column(row, "responsible")?,
        extension: text_column(row, "extension")?,
        cell: text_column(row, "cell")?,
        email: text_column(row, "email")?,
    })
}

/// Columns are nullable in the schema; rows written by older tools may
/// carry NULLs, which read back as empty text.
fn text_column(row: &Row<'_>, name: &str) -> rusqlite::Result<String> {
    Ok(row.get::<_, Option<String>>(name)?.unwrap_or_default())
}

/// Log a store-level failure at the repository boundary and pass it on.
fn logged<T>(operation: &str, result: DirectoryResult<T>) -> DirectoryResult<T> {
    if let Err(err) = &result {
        match err {
            DirectoryError::Validation(_)
            | DirectoryError::InvalidFilter(_)
            | DirectoryError::NotFound(_) => {}
            _ => error!(
                "event={} module=repository status=error error={}",
                operation, err
            ),
        }
    }
    result
}

impl RecordRepository for SqliteDirectory {
    fn list_all(&self) -> DirectoryResult<Vec<Record>> {
        logged(
            "list_all",
            self.session().and_then(|session| {
                session.query(
                    &format!(
                        "SELECT {RECORD_COLUMNS} FROM contacts ORDER BY secretary_office ASC"
                    ),
                    [],
                    record_from_row,
                )
            }),
        )
    }

    fn search(&self, field: &str, keyword: &str) -> DirectoryResult<Vec<Record>> {
        let field: RecordField = field.parse()?;
        // The column name comes from the enum, never from the caller.
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM contacts
             WHERE instr({column}, ?1) > 0
             ORDER BY secretary_office ASC",
            column = field.column()
        );

        logged(
            "search",
            self.session()
                .and_then(|session| session.query(&sql, [keyword], record_from_row)),
        )
    }

    fn insert(&self, record: &Record) -> DirectoryResult<()> {
        record.validate()?;

        logged(
            "insert",
            self.session().and_then(|mut session| {
                session.execute(
                    "INSERT INTO contacts
                        (secretary_office, landline, sector, responsible, extension, cell, email)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    record.fields(),
                )?;
                session.commit()
            }),
        )?;

        info!(
            "event=record_insert module=repository status=ok office={}",
            record.secretary_office
        );
        Ok(())
    }

    fn update(&self, id: i64, record: &Record) -> DirectoryResult<usize> {
        record.validate()?;

        let updated = logged(
            "update",
            self.session().and_then(|mut session| {
                let updated = session.execute(
                    "UPDATE contacts
                     SET secretary_office = ?1, landline = ?2, sector = ?3, responsible = ?4,
                         extension = ?5, cell = ?6, email = ?7
                     WHERE id = ?8",
                    params![
                        record.secretary_office,
                        record.landline,
                        record.sector,
                        record.responsible,
                        record.extension,
                        record.cell,
                        record.email,
                        id
                    ],
                )?;
                session.commit()?;
                Ok(updated)
            }),
        )?;

        info!(
            "event=record_update module=repository status=ok id={} rows={}",
            id, updated
        );
        Ok(updated)
    }

    fn delete(&self, id: i64) -> DirectoryResult<()> {
        let deleted = logged(
            "delete",
            self.session().and_then(|mut session| {
                let deleted = session.execute("DELETE FROM contacts WHERE id = ?1", [id])?;
                session.commit()?;
                Ok(deleted)
            }),
        )?;

        if deleted == 0 {
            return Err(DirectoryError::NotFound(id));
        }

        info!(
            "event=record_delete module=repository status=ok id={}",
            id
        );
        Ok(())
    }

    fn count_all(&self) -> DirectoryResult<usize> {
        let count: i64 = logged(
            "count_all",
            self.session()
                .and_then(|session| session.query_scalar("SELECT COUNT(*) FROM contacts", [])),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn reset(&self) -> DirectoryResult<usize> {
        let deleted = logged(
            "reset",
            self.session().and_then(|mut session| {
                let deleted = session.execute("DELETE FROM contacts", [])?;
                session.commit()?;
                Ok(deleted)
            }),
        )?;

        info!(
            "event=records_reset module=repository status=ok rows={}",
            deleted
        );
        Ok(deleted)
    }

    fn import_csv(&self, path: &Path) -> DirectoryResult<ImportSummary> {
        let parsed = logged("import_csv", transfer::read_rows(path))?;

        let mut invalid = 0;
        let rows: Vec<&[String; 7]> = parsed
            .rows
            .iter()
            .filter(|row| match Record::from_fields((*row).clone()).validate() {
                Ok(()) => true,
                Err(err) => {
                    warn!(
                        "event=csv_row_rejected module=repository status=skipped path={} reason=\"{}\"",
                        path.display(),
                        err
                    );
                    invalid += 1;
                    false
                }
            })
            .collect();

        let inserted = logged(
            "import_csv",
            self.session().and_then(|mut session| {
                let inserted = session.execute_many(
                    INSERT_IF_ABSENT_SQL,
                    rows.iter().map(|row| params_from_iter(row.iter())),
                )?;
                session.commit()?;
                Ok(inserted)
            }),
        )?;

        let summary = ImportSummary {
            inserted,
            already_present: rows.len() - inserted,
            malformed: parsed.malformed,
            invalid,
        };

        info!(
            "event=csv_import module=repository status=ok path={} inserted={} already_present={} malformed={} invalid={}",
            path.display(),
            summary.inserted,
            summary.already_present,
            summary.malformed,
            summary.invalid
        );
        Ok(summary)
    }

    fn export_csv(&self, path: &Path, delimiter: u8) -> DirectoryResult<usize> {
        let records = logged(
            "export_csv",
            self.session().and_then(|session| {
                session.query(
                    &format!("SELECT {RECORD_COLUMNS} FROM contacts ORDER BY id ASC"),
                    [],
                    record_from_row,
                )
            }),
        )?;

        let written = logged(
            "export_csv",
            transfer::write_rows(path, delimiter, records.iter().map(Record::fields)),
        )?;

        info!(
            "event=csv_export module=repository status=ok path={} rows={}",
            path.display(),
            written
        );
        Ok(written)
    }

    fn find_duplicate_groups(&self) -> DirectoryResult<Vec<Record>> {
        logged(
            "find_duplicate_groups",
            self.session().and_then(|session| {
                session.query(
                    &format!(
                        "SELECT {RECORD_COLUMNS} FROM contacts c
                         WHERE EXISTS (
                             SELECT 1 FROM contacts d
                             WHERE d.id <> c.id
                               AND d.secretary_office IS c.secretary_office
                               AND d.landline IS c.landline
                               AND d.sector IS c.sector
                               AND d.extension IS c.extension
                         )
                         ORDER BY secretary_office, landline, sector, extension, id"
                    ),
                    [],
                    record_from_row,
                )
            }),
        )
    }
}
