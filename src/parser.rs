// Spreadsheet Parser
// First sheet of a workbook (or a CSV file) → ordered row mappings

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::dates::DateNormalizer;
use crate::error::ParseError;

/// Fields that hold spreadsheet date serials
pub const DEFAULT_DATE_FIELDS: &[&str] = &["dob"];

// ============================================================================
// CORE TYPES
// ============================================================================

/// SourceFormat - how the uploaded bytes are decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Anything calamine sniffs: xlsx, xlsm, xlsb, xls, ods
    Workbook,
    /// Comma separated text, first line is the header
    Csv,
}

impl SourceFormat {
    pub fn name(&self) -> &str {
        match self {
            SourceFormat::Workbook => "workbook",
            SourceFormat::Csv => "csv",
        }
    }
}

/// RawRow - one data row of the first sheet
///
/// Every header column is present in `fields`; absent cells are `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRow {
    /// 1-based line in the spreadsheet (the header is the first line)
    pub line_number: usize,
    pub fields: Map<String, Value>,
}

impl RawRow {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Row content as a JSON object, for logs and error reports
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// SheetGrid - raw cells of one sheet, header row included
#[derive(Debug, Clone, Default)]
pub struct SheetGrid {
    /// 1-based line of the first row in `rows`
    pub first_line: usize,
    pub rows: Vec<Vec<Value>>,
}

// ============================================================================
// SHEET READERS
// ============================================================================

/// SheetReader - decode bytes into the cells of the first sheet
pub trait SheetReader: Send + Sync {
    fn read(&self, bytes: Vec<u8>) -> Result<SheetGrid, ParseError>;

    fn format(&self) -> SourceFormat;
}

/// Workbook reader backed by calamine; the format is sniffed from content
pub struct WorkbookReader;

impl SheetReader for WorkbookReader {
    fn read(&self, bytes: Vec<u8>) -> Result<SheetGrid, ParseError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or(ParseError::NoSheets)?;

        let range = workbook.worksheet_range(&sheet_name)?;

        let first_line = range.start().map(|(row, _)| row as usize + 1).unwrap_or(1);
        let rows = range
            .rows()
            .map(|row| row.iter().map(cell_to_value).collect())
            .collect();

        Ok(SheetGrid { first_line, rows })
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Workbook
    }
}

/// CSV reader; every non-empty cell is text
pub struct CsvReader;

impl SheetReader for CsvReader {
    fn read(&self, bytes: Vec<u8>) -> Result<SheetGrid, ParseError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes.as_slice());

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(
                record
                    .iter()
                    .map(|cell| {
                        if cell.is_empty() {
                            Value::Null
                        } else {
                            Value::String(cell.to_string())
                        }
                    })
                    .collect(),
            );
        }

        Ok(SheetGrid { first_line: 1, rows })
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Csv
    }
}

/// Map one calamine cell to a JSON value
///
/// Date-formatted cells keep their numeric serial; the date fields are
/// normalized later, the same way as plain numbers.
fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        Data::Int(i) => Value::from(*i),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => Number::from_f64(dt.as_f64())
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        _ => Value::Null,
    }
}

// ============================================================================
// FACTORY FUNCTIONS
// ============================================================================

/// Detect the source format from a file name
///
/// `.csv` → Csv, everything else → Workbook (the content decides which kind).
pub fn detect_format(file_name: &Path) -> SourceFormat {
    let is_csv = file_name
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    if is_csv {
        SourceFormat::Csv
    } else {
        SourceFormat::Workbook
    }
}

pub fn get_reader(format: SourceFormat) -> Box<dyn SheetReader> {
    match format {
        SourceFormat::Workbook => Box::new(WorkbookReader),
        SourceFormat::Csv => Box::new(CsvReader),
    }
}

// ============================================================================
// SPREADSHEET PARSER
// ============================================================================

#[derive(Debug, Clone)]
pub struct SpreadsheetParser {
    date_fields: Vec<String>,
    normalizer: DateNormalizer,
}

impl Default for SpreadsheetParser {
    fn default() -> Self {
        SpreadsheetParser {
            date_fields: DEFAULT_DATE_FIELDS.iter().map(|f| f.to_string()).collect(),
            normalizer: DateNormalizer::new(),
        }
    }
}

impl SpreadsheetParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: replace the list of date-bearing fields
    pub fn with_date_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.date_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Parse a spreadsheet file; the format is detected from its extension
    pub fn parse_path(&self, path: &Path) -> Result<Vec<RawRow>, ParseError> {
        tracing::info!(path = %path.display(), "Parsing spreadsheet file");
        let bytes = std::fs::read(path)?;
        self.parse_bytes(bytes, detect_format(path))
    }

    /// Parse an in-memory spreadsheet
    pub fn parse_bytes(&self, bytes: Vec<u8>, format: SourceFormat) -> Result<Vec<RawRow>, ParseError> {
        let grid = get_reader(format).read(bytes)?;
        let rows = self.build_rows(grid, format);

        tracing::info!(format = format.name(), rows = rows.len(), "Spreadsheet parsed");
        Ok(rows)
    }

    /// Turn the grid into header-keyed rows, normalizing date fields
    fn build_rows(&self, grid: SheetGrid, format: SourceFormat) -> Vec<RawRow> {
        let mut lines = grid.rows.into_iter();
        let headers = match lines.next() {
            Some(header_row) => header_names(&header_row),
            None => return Vec::new(),
        };

        let mut rows = Vec::new();
        for (offset, cells) in lines.enumerate() {
            if cells.iter().all(is_blank) {
                continue;
            }

            let mut fields = Map::new();
            for (column, header) in headers.iter().enumerate() {
                let Some(name) = header else { continue };
                let raw = cells.get(column).cloned().unwrap_or(Value::Null);
                let value = if self.is_date_field(name) {
                    self.normalize_date(raw, format)
                } else {
                    raw
                };
                fields.insert(name.clone(), value);
            }

            rows.push(RawRow {
                line_number: grid.first_line + offset + 1,
                fields,
            });
        }

        rows
    }

    fn is_date_field(&self, name: &str) -> bool {
        self.date_fields.iter().any(|f| f == name)
    }

    fn normalize_date(&self, value: Value, format: SourceFormat) -> Value {
        // CSV has no numeric cells: treat a bare number in a date column as a serial
        let value = match (format, value) {
            (SourceFormat::Csv, Value::String(text)) => match text.trim().parse::<f64>() {
                Ok(serial) => Number::from_f64(serial)
                    .map(Value::Number)
                    .unwrap_or(Value::String(text)),
                Err(_) => Value::String(text),
            },
            (_, other) => other,
        };

        self.normalizer.normalize(value)
    }
}

/// Header names per column; `None` for columns without a usable name
///
/// Repeated names get `_1`, `_2`, ... so no column shadows another.
fn header_names(header_row: &[Value]) -> Vec<Option<String>> {
    let mut seen: Vec<String> = Vec::new();

    header_row
        .iter()
        .map(|cell| {
            let base = match cell {
                Value::Null => return None,
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            };
            if base.is_empty() {
                return None;
            }

            let mut name = base.clone();
            let mut suffix = 1;
            while seen.contains(&name) {
                name = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            seen.push(name.clone());
            Some(name)
        })
        .collect()
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

// ============================================================================
// TESTS
// ============================================================================
