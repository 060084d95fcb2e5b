// Student Store
// SQLite table of students keyed by PRN, plus the queries the engine and API use

use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// StudentRecord - one student, identified by PRN
///
/// Serialized with the spreadsheet column names so uploads, API responses
/// and the table all speak the same vocabulary.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct StudentRecord {
    #[serde(rename = "rollno")]
    pub roll_number: String,

    pub name: String,

    #[serde(rename = "class")]
    pub class_name: String,

    pub branch: String,

    pub gender: String,

    /// ISO `YYYY-MM-DD` when the sheet held a date serial
    #[serde(rename = "dob")]
    pub date_of_birth: String,

    /// Natural key - unique in the store
    pub prn: String,
}

/// StudentStore - explicitly constructed handle to the student table
///
/// Opened by the hosting process, passed to whoever needs the store, closed
/// with [`StudentStore::close`]. There is no process-wide connection.
pub struct StudentStore {
    conn: Connection,
}

impl StudentStore {
    /// Open (or create) a database file and make sure the schema exists
    pub fn open(path: &Path, busy_timeout: Duration) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;

        // WAL for crash recovery
        conn.pragma_update(None, "journal_mode", "WAL")?;

        setup_database(&conn)?;
        tracing::info!(path = %path.display(), "Student store opened");

        Ok(StudentStore { conn })
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(StudentStore { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Mutable access, needed to start transactions
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Tear down the connection, surfacing any error SQLite reports on close
    pub fn close(self) -> rusqlite::Result<()> {
        self.conn.close().map_err(|(_, err)| err)?;
        tracing::info!("Student store closed");
        Ok(())
    }
}

pub fn setup_database(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS studentsdata (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            rollno TEXT NOT NULL,
            name TEXT NOT NULL,
            class TEXT NOT NULL,
            branch TEXT NOT NULL,
            gender TEXT NOT NULL,
            dob TEXT NOT NULL,
            prn TEXT UNIQUE NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_studentsdata_prn ON studentsdata(prn)",
        [],
    )?;

    Ok(())
}

/// Existence check by natural key
pub fn find_prn(conn: &Connection, prn: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT prn FROM studentsdata WHERE prn = ?1",
        params![prn],
        |row| row.get(0),
    )
    .optional()
}

pub fn insert_student(conn: &Connection, student: &StudentRecord) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO studentsdata (rollno, name, class, branch, gender, dob, prn)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            student.roll_number,
            student.name,
            student.class_name,
            student.branch,
            student.gender,
            student.date_of_birth,
            student.prn,
        ],
    )?;

    Ok(())
}

/// Overwrite every mutable column of the row identified by `student.prn`
///
/// Returns the number of rows touched (0 or 1).
pub fn update_student(conn: &Connection, student: &StudentRecord) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE studentsdata
         SET rollno = ?1, name = ?2, class = ?3, branch = ?4, gender = ?5, dob = ?6,
             updated_at = CURRENT_TIMESTAMP
         WHERE prn = ?7",
        params![
            student.roll_number,
            student.name,
            student.class_name,
            student.branch,
            student.gender,
            student.date_of_birth,
            student.prn,
        ],
    )
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<StudentRecord> {
    Ok(StudentRecord {
        roll_number: row.get(0)?,
        name: row.get(1)?,
        class_name: row.get(2)?,
        branch: row.get(3)?,
        gender: row.get(4)?,
        date_of_birth: row.get(5)?,
        prn: row.get(6)?,
    })
}

pub fn get_all_students(conn: &Connection) -> rusqlite::Result<Vec<StudentRecord>> {
    let mut stmt = conn.prepare(
        "SELECT rollno, name, class, branch, gender, dob, prn
         FROM studentsdata
         ORDER BY prn",
    )?;

    let students = stmt
        .query_map([], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(students)
}

pub fn get_student_by_prn(conn: &Connection, prn: &str) -> rusqlite::Result<Option<StudentRecord>> {
    conn.query_row(
        "SELECT rollno, name, class, branch, gender, dob, prn
         FROM studentsdata
         WHERE prn = ?1",
        params![prn],
        student_from_row,
    )
    .optional()
}

pub fn verify_count(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM studentsdata", [], |row| row.get(0))
}
