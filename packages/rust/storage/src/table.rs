//! In-memory table model and its CSV encoding.
//!
//! A [`Table`] is an ordered list of [`Row`]s plus the source header order.
//! Rows keep their own `(column, value)` pairs so processed rows can carry
//! columns the unprocessed remainder does not have yet.

use std::io::Read;
use std::path::Path;

use joblens_shared::{JobLensError, Result};

/// Join key column; a table without it cannot be analyzed.
pub const LINK_COLUMN: &str = "Link";

/// Posting title column.
pub const TITLE_COLUMN: &str = "Title";

/// Excel and some exporters prepend a UTF-8 BOM to the first header.
const UTF8_BOM: char = '\u{feff}';

// ---------------------------------------------------------------------------
// Row
// ---------------------------------------------------------------------------

/// One record, cells in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    cells: Vec<(String, String)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from `(column, value)` pairs. Later duplicates overwrite earlier ones.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut row = Self::new();
        for (k, v) in pairs {
            row.set(k, v);
        }
        row
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    /// Overwrite `column` in place, or append it if the row lacks it.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(c, _)| *c == column) {
            Some((_, existing)) => *existing = value,
            None => self.cells.push((column, value)),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(c, _)| c.as_str())
    }

    pub fn title(&self) -> &str {
        self.get(TITLE_COLUMN).map(str::trim).unwrap_or("")
    }

    pub fn link(&self) -> &str {
        self.get(LINK_COLUMN).map(str::trim).unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// A complete table snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Header order of the source table.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Source columns first, then any column a row introduced, in first-seen order.
    pub fn header(&self) -> Vec<String> {
        let mut header = self.columns.clone();
        for row in &self.rows {
            for column in row.columns() {
                if !header.iter().any(|h| h == column) {
                    header.push(column.to_string());
                }
            }
        }
        header
    }

    /// Parse CSV content. `path` is only used in error messages.
    ///
    /// Every record becomes a row, including ones whose cells are all empty.
    /// Cells past the header land in generated `Column N` columns. Duplicate
    /// header names are rejected since cells are addressed by column name.
    pub fn from_csv<R: Read>(reader: R, path: &Path) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| JobLensError::parse(format!("{}: {e}", path.display())))?
            .clone();

        let mut columns: Vec<String> = Vec::with_capacity(headers.len());
        for (position, h) in headers.iter().enumerate() {
            let h = h.trim_start_matches(UTF8_BOM).trim();
            let name = if h.is_empty() {
                generated_column(&columns, position)
            } else {
                h.to_string()
            };
            if columns.contains(&name) {
                return Err(JobLensError::validation(format!(
                    "{}: duplicate column '{name}'",
                    path.display()
                )));
            }
            columns.push(name);
        }

        if !columns.iter().any(|c| c == LINK_COLUMN) {
            return Err(JobLensError::MissingColumn {
                column: LINK_COLUMN.into(),
                path: path.to_path_buf(),
            });
        }

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record =
                record.map_err(|e| JobLensError::parse(format!("{}: {e}", path.display())))?;

            while columns.len() < record.len() {
                let name = generated_column(&columns, columns.len());
                columns.push(name);
            }

            let row = Row::from_pairs(
                columns
                    .iter()
                    .zip(record.iter())
                    .map(|(c, v)| (c.clone(), v.to_string())),
            );
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    /// Encode the whole table as CSV; cells a row lacks are written empty.
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let header = self.header();
        let mut writer = csv::Writer::from_writer(Vec::new());

        writer
            .write_record(&header)
            .map_err(|e| JobLensError::parse(format!("encode header: {e}")))?;

        for row in &self.rows {
            let record = header.iter().map(|column| row.get(column).unwrap_or(""));
            writer
                .write_record(record)
                .map_err(|e| JobLensError::parse(format!("encode row: {e}")))?;
        }

        writer
            .into_inner()
            .map_err(|e| JobLensError::parse(format!("flush table: {e}")))
    }
}

/// `Column N` for the 0-based `position`, suffixed until it is unused.
fn generated_column(columns: &[String], position: usize) -> String {
    let base = format!("Column {}", position + 1);
    let mut name = base.clone();
    let mut n = 2;
    while columns.contains(&name) {
        name = format!("{base} ({n})");
        n += 1;
    }
    name
}
