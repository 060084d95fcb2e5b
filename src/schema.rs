// Row Validation
// Every row must carry all seven student fields before anything is stored.

use serde_json::Value;

use crate::db::StudentRecord;
use crate::parser::RawRow;

/// Spreadsheet columns that every row must fill
pub const REQUIRED_FIELDS: [&str; 7] = ["rollno", "name", "class", "branch", "gender", "dob", "prn"];

// ============================================================================
// VALIDATION ERROR
// ============================================================================

/// The first row that failed validation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid row at line {line_number}: missing {} in {row}", .missing_fields.join(", "))]
pub struct ValidationError {
    pub line_number: usize,
    pub missing_fields: Vec<String>,
    /// Full content of the offending row
    pub row: Value,
}

// ============================================================================
// ROW VALIDATOR
// ============================================================================

/// RowValidator - all-or-nothing check of a parsed batch
///
/// Either every row becomes a [`StudentRecord`] or the whole batch is
/// rejected with the first failing row. Valid rows are never passed on
/// when another row in the same batch fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowValidator;

impl RowValidator {
    pub fn new() -> Self {
        RowValidator
    }

    /// Names of the required fields this row leaves null or empty
    pub fn missing_fields(&self, row: &RawRow) -> Vec<String> {
        REQUIRED_FIELDS
            .iter()
            .filter(|field| field_text(row.get(field)).is_none())
            .map(|field| field.to_string())
            .collect()
    }

    pub fn validate_row(&self, row: &RawRow) -> Result<StudentRecord, ValidationError> {
        let missing = self.missing_fields(row);
        if !missing.is_empty() {
            return Err(ValidationError {
                line_number: row.line_number,
                missing_fields: missing,
                row: row.to_json(),
            });
        }

        let text = |field: &str| field_text(row.get(field)).unwrap_or_default();
        Ok(StudentRecord {
            roll_number: text("rollno"),
            name: text("name"),
            class_name: text("class"),
            branch: text("branch"),
            gender: text("gender"),
            date_of_birth: text("dob"),
            prn: text("prn"),
        })
    }

    /// Validate the whole batch, stopping at the first invalid row
    pub fn validate_batch(&self, rows: &[RawRow]) -> Result<Vec<StudentRecord>, ValidationError> {
        tracing::debug!(rows = rows.len(), "Validating spreadsheet rows");

        let records = rows
            .iter()
            .map(|row| {
                self.validate_row(row).map_err(|err| {
                    tracing::warn!(
                        line = err.line_number,
                        missing = ?err.missing_fields,
                        row = %err.row,
                        "Invalid row"
                    );
                    err
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(rows = records.len(), "Spreadsheet rows valid");
        Ok(records)
    }
}

/// Text content of a cell, `None` when null or blank
///
/// Integral numbers lose their fractional part so roll number 7 reads "7".
fn field_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
