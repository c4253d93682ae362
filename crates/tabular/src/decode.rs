//! Byte-level decoding of CSV and Excel workbooks into a uniform [`Table`].
//!
//! All cell typing is flattened to `Option<String>` here, at the read
//! boundary, so nothing downstream ever re-interprets cell types:
//!
//! - empty cell, error cell          → `None`
//! - string                          → as-is (empty string → `None`)
//! - integer, integral float         → integer rendering ("42")
//! - other float                     → decimal rendering ("42.5")
//! - bool                            → `"true"` / `"false"`
//! - date-time                       → ISO-8601 rendering
//!
//! The first decoded row supplies the headers; a missing header cell reads
//! as the empty string. CSV input is decoded lossily, so files with stray
//! non-UTF-8 bytes still parse.

use crate::error::{ReadError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use std::path::Path;

/// Supported on-disk formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Excel,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();
        Self::from_extension(&ext)
    }

    pub fn from_file_name(name: &str) -> Result<Self> {
        Self::from_path(Path::new(name))
    }

    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext {
            "csv" => Ok(Self::Csv),
            "xlsx" | "xls" => Ok(Self::Excel),
            other => Err(ReadError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Decoded tabular content: one header row plus zero or more data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    #[must_use]
    pub fn first_row(&self) -> Option<&[Option<String>]> {
        self.rows.first().map(Vec::as_slice)
    }

    /// True when the table has headers but no data rows.
    #[must_use]
    pub fn has_no_rows(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Decode an in-memory file. Shared by the path-based read and the upload
/// endpoints, so both parse identically.
pub fn decode_bytes(format: TableFormat, bytes: &[u8]) -> Result<Table> {
    match format {
        TableFormat::Csv => decode_csv(bytes),
        TableFormat::Excel => decode_workbook(bytes),
    }
}

fn decode_csv(bytes: &[u8]) -> Result<Table> {
    let text = String::from_utf8_lossy(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(ReadError::EmptySheet);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        None
                    } else {
                        Some(cell.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(Table { headers, rows })
}

fn decode_workbook(bytes: &[u8]) -> Result<Table> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ReadError::EmptySheet)??;

    let mut row_iter = range.rows();
    let Some(first) = row_iter.next() else {
        return Err(ReadError::EmptySheet);
    };

    let headers = first
        .iter()
        .map(|cell| coerce_cell(cell).unwrap_or_default())
        .collect();
    let rows = row_iter
        .map(|row| row.iter().map(coerce_cell).collect())
        .collect();
    Ok(Table { headers, rows })
}

fn coerce_cell(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => {
            if s.is_empty() {
                None
            } else {
                Some(s.clone())
            }
        }
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(render_number(*f)),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(match dt.as_datetime() {
            Some(naive) => naive.format("%Y-%m-%dT%H:%M:%S").to_string(),
            None => render_number(dt.as_f64()),
        }),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}

fn render_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
