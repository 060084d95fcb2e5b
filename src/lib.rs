// Student Import - Core Library
// Spreadsheet parsing, row validation and PRN-keyed reconciliation, shared by
// the CLI, the upload server and the tests

pub mod config;
pub mod dates;
pub mod db;
pub mod error;
pub mod ingest;
pub mod parser;
pub mod reconciliation;
pub mod schema;

#[cfg(feature = "server")]
pub mod server;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{AppConfig, ConfigError};
pub use dates::DateNormalizer;
pub use db::{
    StudentRecord, StudentStore,
    setup_database, find_prn, insert_student, update_student,
    get_all_students, get_student_by_prn, verify_count,
};
pub use error::{IngestError, IngestResult, ParseError};
pub use ingest::{ImportPipeline, TempUpload};
pub use parser::{
    RawRow, SourceFormat, SpreadsheetParser,
    detect_format,
};
pub use reconciliation::{
    CommitPolicy, ReconciliationEngine, ReconciliationReport, UnknownCommitPolicy,
    RecordOutcome, UpsertAction,
};
pub use schema::{RowValidator, ValidationError, REQUIRED_FIELDS};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
