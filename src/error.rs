// Error kinds for the import pipeline
// Every failure keeps its detail for the logs; callers only ever see the
// status code and a generic message.

use std::path::PathBuf;

use crate::schema::ValidationError;

/// Message returned when the upload carries no file field
pub const NO_FILE_MESSAGE: &str = "No file uploaded. Please upload an Excel file.";

/// Message returned when a row fails validation
pub const INVALID_DATA_MESSAGE: &str = "Invalid data format in Excel file.";

/// Message returned when parsing or persistence fails
pub const PROCESSING_FAILED_MESSAGE: &str = "An error occurred while processing the file.";

/// Message returned when the request body exceeds the upload limit
pub const UPLOAD_TOO_LARGE_MESSAGE: &str = "Uploaded file is too large.";

/// Message returned after a successful import
pub const IMPORT_SUCCESS_MESSAGE: &str = "Excel data inserted/updated successfully.";

/// The workbook could not be turned into rows
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read spreadsheet file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to open workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("failed to read CSV data: {0}")]
    Csv(#[from] csv::Error),

    #[error("workbook contains no sheets")]
    NoSheets,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("file system error on {}: {source}", .path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The multipart body could not be read to the end
    #[cfg(feature = "server")]
    #[error("failed to read upload: {0}")]
    Upload(#[from] axum::extract::multipart::MultipartError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type IngestResult<T> = Result<T, IngestError>;

impl IngestError {
    /// HTTP status code for this error (400, 413 or 500)
    pub fn status_code(&self) -> u16 {
        match self {
            IngestError::Validation(_) => 400,
            _ if self.is_too_large() => 413,
            _ => 500,
        }
    }

    /// Generic text shown to the uploader; never carries field-level detail
    pub fn public_message(&self) -> &'static str {
        match self {
            IngestError::Validation(_) => INVALID_DATA_MESSAGE,
            _ if self.is_too_large() => UPLOAD_TOO_LARGE_MESSAGE,
            _ => PROCESSING_FAILED_MESSAGE,
        }
    }

    /// The upload hit the request body limit
    pub fn is_too_large(&self) -> bool {
        match self {
            #[cfg(feature = "server")]
            IngestError::Upload(err) => err.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE,
            _ => false,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, IngestError::Validation(_))
    }
}
