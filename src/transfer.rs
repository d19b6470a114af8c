//! Delimited-file plumbing for the directory: delimiter sniffing, the generic
//! header-less seven-column format shared by import and export, and the
//! Portuguese "save search results" report. SQL never happens here; the
//! repository hands rows in and out.

use std::fs::{self, File};
use std::path::Path;

use csv::{ReaderBuilder, Terminator, WriterBuilder};
use log::warn;

use crate::error::{DirectoryError, DirectoryResult};
use crate::models::Record;

/// Delimiter used by the generic export when the caller has no preference.
pub const DEFAULT_DELIMITER: u8 = b',';
/// Delimiter of the search-results report.
pub const SEARCH_RESULTS_DELIMITER: u8 = b';';

/// Delimiters the sniffer considers, in tie-break order.
const CANDIDATE_DELIMITERS: [u8; 5] = [b',', b';', b'\t', b'|', b':'];

const SEARCH_RESULTS_HEADER: [&str; 7] = [
    "Secretaria",
    "Telefone fixo",
    "Setor",
    "Responsável",
    "Ramal",
    "Telefone celular",
    "E-mail",
];

/// Rows read from a delimited file.
#[derive(Debug, Default)]
pub struct CsvRows {
    pub delimiter: u8,
    /// Rows with exactly seven columns, in file order.
    pub rows: Vec<[String; 7]>,
    /// Rows skipped because their column count was not seven. Blank lines
    /// count here too.
    pub malformed: usize,
}

/// Pick the delimiter of a file from its first line: the candidate occurring
/// most often outside double quotes. Falls back to `,` when none occurs.
pub fn sniff_delimiter(first_line: &str) -> u8 {
    let mut counts = [0usize; CANDIDATE_DELIMITERS.len()];
    let mut quoted = false;

    for byte in first_line.bytes() {
        if byte == b'"' {
            quoted = !quoted;
            continue;
        }
        if quoted {
            continue;
        }
        if let Some(idx) = CANDIDATE_DELIMITERS.iter().position(|d| *d == byte) {
            counts[idx] += 1;
        }
    }

    let mut best = (DEFAULT_DELIMITER, 0);
    for (delimiter, count) in CANDIDATE_DELIMITERS.iter().zip(counts) {
        if count > best.1 {
            best = (*delimiter, count);
        }
    }
    best.0
}

/// Read a UTF-8 delimited file, auto-detecting its delimiter. Rows whose
/// column count differs from seven are logged and counted, not returned.
pub fn read_rows(path: &Path) -> DirectoryResult<CsvRows> {
    let contents = fs::read_to_string(path).map_err(|err| DirectoryError::file(path, err))?;
    let contents = contents.strip_prefix('\u{feff}').unwrap_or(&contents);

    let delimiter = sniff_delimiter(contents.lines().next().unwrap_or(""));
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(contents.as_bytes());

    let mut parsed = CsvRows {
        delimiter,
        malformed: blank_lines(contents),
        ..CsvRows::default()
    };
    if parsed.malformed > 0 {
        warn!(
            "event=csv_blank_lines module=transfer status=skipped count={} path={}",
            parsed.malformed,
            path.display()
        );
    }

    for result in reader.records() {
        let row = result?;
        if row.len() == 7 {
            parsed
                .rows
                .push(std::array::from_fn(|idx| row[idx].to_string()));
        } else {
            let line = row.position().map_or(0, |pos| pos.line());
            warn!(
                "event=csv_row_skipped module=transfer status=skipped line={} columns={} path={}",
                line,
                row.len(),
                path.display()
            );
            parsed.malformed += 1;
        }
    }

    Ok(parsed)
}

/// Blank lines outside quoted fields. The reader drops them without yielding
/// a record, so they are counted separately.
fn blank_lines(contents: &str) -> usize {
    let mut in_quotes = false;
    let mut blanks = 0;
    for line in contents.lines() {
        if !in_quotes && line.is_empty() {
            blanks += 1;
        }
        if line.matches('"').count() % 2 == 1 {
            in_quotes = !in_quotes;
        }
    }
    blanks
}

/// Write header-less seven-column rows, overwriting `path`. Returns the number
/// of rows written.
pub fn write_rows<'a, I>(path: &Path, delimiter: u8, rows: I) -> DirectoryResult<usize>
where
    I: IntoIterator<Item = [&'a str; 7]>,
{
    let file = File::create(path).map_err(|err| DirectoryError::file(path, err))?;
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .terminator(Terminator::CRLF)
        .from_writer(file);

    let mut written = 0;
    for row in rows {
        writer.write_record(row)?;
        written += 1;
    }
    writer.flush().map_err(|err| DirectoryError::file(path, err))?;
    Ok(written)
}

/// Save the records currently shown by a search as a `;`-delimited Latin-1
/// report with a Portuguese header row. Independent from the generic export.
pub fn save_search_results(path: &Path, records: &[Record]) -> DirectoryResult<usize> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .delimiter(SEARCH_RESULTS_DELIMITER)
        .terminator(Terminator::CRLF)
        .from_writer(Vec::new());

    writer.write_record(SEARCH_RESULTS_HEADER)?;
    for record in records {
        writer.write_record(record.fields())?;
    }

    let buffer = writer
        .into_inner()
        .map_err(|err| DirectoryError::file(path, err.into_error()))?;
    let text = String::from_utf8_lossy(&buffer);

    fs::write(path, encode_latin1(&text)).map_err(|err| DirectoryError::file(path, err))?;
    Ok(records.len())
}

/// Encode text as ISO-8859-1. Characters outside the range become `?`.
pub fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| u8::try_from(u32::from(ch)).unwrap_or(b'?'))
        .collect()
}
