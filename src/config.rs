// Configuration
// Runtime settings read from environment variables

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::reconciliation::CommitPolicy;

#[derive(Debug, thiserror::Error)]
#[error("invalid value for {var}: {message}")]
pub struct ConfigError {
    pub var: &'static str,
    pub message: String,
}

/// Runtime configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// SQLite database file (default: `students.db`).
    pub database_path: PathBuf,
    /// Where uploaded spreadsheets are staged (default: `uploads`).
    pub upload_dir: PathBuf,
    /// Largest accepted request body in bytes (default: 10 MiB).
    pub max_upload_bytes: usize,
    /// Transaction grouping for reconciliation (default: `autocommit`).
    pub commit_policy: CommitPolicy,
    /// How long SQLite waits on a locked database (default: 5000 ms).
    pub busy_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_path: PathBuf::from("students.db"),
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 10 * 1024 * 1024,
            commit_policy: CommitPolicy::Autocommit,
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var              | Default       |
    /// |----------------------|---------------|
    /// | `HOST`               | `0.0.0.0`     |
    /// | `PORT`               | `3000`        |
    /// | `DATABASE_PATH`      | `students.db` |
    /// | `UPLOAD_DIR`         | `uploads`     |
    /// | `MAX_UPLOAD_BYTES`   | `10485760`    |
    /// | `COMMIT_POLICY`      | `autocommit`  |
    /// | `DB_BUSY_TIMEOUT_MS` | `5000`        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`AppConfig::from_env`] with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();

        let host = lookup("HOST").unwrap_or(defaults.host);
        let port = parse_var(&lookup, "PORT")?.unwrap_or(defaults.port);
        let database_path = lookup("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);
        let upload_dir = lookup("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.upload_dir);
        let max_upload_bytes =
            parse_var(&lookup, "MAX_UPLOAD_BYTES")?.unwrap_or(defaults.max_upload_bytes);
        let commit_policy = parse_var(&lookup, "COMMIT_POLICY")?.unwrap_or(defaults.commit_policy);
        let busy_timeout = parse_var::<u64, _>(&lookup, "DB_BUSY_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.busy_timeout);

        Ok(AppConfig {
            host,
            port,
            database_path,
            upload_dir,
            max_upload_bytes,
            commit_policy,
            busy_timeout,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|err| ConfigError {
            var,
            message: err.to_string(),
        }),
    }
}
