// Fixtures shared by the unit tests

use rust_xlsxwriter::Workbook;

use crate::db::StudentRecord;
use crate::schema::REQUIRED_FIELDS;

pub enum Cell {
    Text(&'static str),
    Number(f64),
    Empty,
}

/// Build an xlsx file in memory; the first sheet holds `rows`
pub fn write_xlsx(rows: &[Vec<Cell>]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            match cell {
                Cell::Text(text) => {
                    worksheet.write_string(r as u32, c as u16, *text).unwrap();
                }
                Cell::Number(number) => {
                    worksheet.write_number(r as u32, c as u16, *number).unwrap();
                }
                Cell::Empty => {}
            }
        }
    }

    workbook.save_to_buffer().unwrap()
}

/// Student sheet with the standard header
///
/// Columns follow `REQUIRED_FIELDS`. A numeric dob is written as a number
/// cell, an empty string leaves the cell blank.
pub fn student_sheet(rows: &[[&'static str; 7]]) -> Vec<u8> {
    let mut grid = vec![REQUIRED_FIELDS.iter().map(|h| Cell::Text(*h)).collect::<Vec<_>>()];

    for row in rows {
        grid.push(
            row.iter()
                .enumerate()
                .map(|(column, &value)| {
                    if value.is_empty() {
                        Cell::Empty
                    } else if REQUIRED_FIELDS[column] == "dob" {
                        value
                            .parse::<f64>()
                            .map(Cell::Number)
                            .unwrap_or(Cell::Text(value))
                    } else {
                        Cell::Text(value)
                    }
                })
                .collect(),
        );
    }

    write_xlsx(&grid)
}

pub fn student(prn: &str, name: &str, dob: &str) -> StudentRecord {
    StudentRecord {
        roll_number: "1".to_string(),
        name: name.to_string(),
        class_name: "SE".to_string(),
        branch: "CS".to_string(),
        gender: "F".to_string(),
        date_of_birth: dob.to_string(),
        prn: prn.to_string(),
    }
}
