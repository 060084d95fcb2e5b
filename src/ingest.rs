// Import Pipeline
// SpreadsheetParser → RowValidator → ReconciliationEngine

use std::path::{Path, PathBuf};

use crate::db::{StudentRecord, StudentStore};
use crate::error::{IngestError, IngestResult};
use crate::parser::{SourceFormat, SpreadsheetParser};
use crate::reconciliation::{ReconciliationEngine, ReconciliationReport};
use crate::schema::RowValidator;

// ============================================================================
// IMPORT PIPELINE
// ============================================================================

/// ImportPipeline - one uploaded spreadsheet, one batch
///
/// `prepare_*` never touches the store, so callers can parse and validate
/// before acquiring it. A batch that fails validation is never reconciled.
#[derive(Debug, Clone, Default)]
pub struct ImportPipeline {
    parser: SpreadsheetParser,
    validator: RowValidator,
    engine: ReconciliationEngine,
}

impl ImportPipeline {
    pub fn new(parser: SpreadsheetParser, engine: ReconciliationEngine) -> Self {
        ImportPipeline {
            parser,
            validator: RowValidator::new(),
            engine,
        }
    }

    pub fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }

    /// Parse and validate a spreadsheet file
    pub fn prepare_path(&self, path: &Path) -> IngestResult<Vec<StudentRecord>> {
        let rows = self.parser.parse_path(path)?;
        Ok(self.validator.validate_batch(&rows)?)
    }

    /// Parse and validate an in-memory spreadsheet
    pub fn prepare_bytes(&self, bytes: Vec<u8>, format: SourceFormat) -> IngestResult<Vec<StudentRecord>> {
        let rows = self.parser.parse_bytes(bytes, format)?;
        Ok(self.validator.validate_batch(&rows)?)
    }

    pub fn reconcile(
        &self,
        store: &mut StudentStore,
        records: &[StudentRecord],
    ) -> IngestResult<ReconciliationReport> {
        self.engine.reconcile(store, records)
    }

    /// Parse, validate and reconcile one file
    pub fn run_path(&self, store: &mut StudentStore, path: &Path) -> IngestResult<ReconciliationReport> {
        let records = self.prepare_path(path)?;
        self.reconcile(store, &records)
    }

    pub fn run_bytes(
        &self,
        store: &mut StudentStore,
        bytes: Vec<u8>,
        format: SourceFormat,
    ) -> IngestResult<ReconciliationReport> {
        let records = self.prepare_bytes(bytes, format)?;
        self.reconcile(store, &records)
    }
}

// ============================================================================
// TEMPORARY UPLOAD FILE
// ============================================================================

/// TempUpload - an uploaded file that is deleted when dropped
///
/// Removal failures are logged and otherwise ignored.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    /// Take ownership of a file that already exists on disk
    pub fn new(path: PathBuf) -> Self {
        TempUpload { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now, reporting failure
    pub fn remove(&self) -> IngestResult<()> {
        std::fs::remove_file(&self.path).map_err(|source| IngestError::FileSystem {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        match self.remove() {
            Ok(()) => tracing::info!(path = %self.path.display(), "Temporary file deleted"),
            Err(err) => tracing::error!(error = %err, "Error deleting temporary file"),
        }
    }
}
