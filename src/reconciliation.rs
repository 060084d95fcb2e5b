// Reconciliation Engine - upsert student records by PRN
//
// For every record, in order:
//   SELECT prn WHERE prn = ?  →  found: UPDATE six columns
//                             →  absent: INSERT all seven
//
// Records are processed one at a time on a single connection. The first
// failing statement aborts the rest of the batch.

use std::str::FromStr;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::{find_prn, insert_student, update_student, StudentRecord, StudentStore};
use crate::error::IngestResult;

// ============================================================================
// COMMIT POLICY
// ============================================================================

/// How writes are grouped into transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitPolicy {
    /// No explicit transaction; rows written before a failure stay written
    #[default]
    Autocommit,
    /// Each existence check + write pair commits on its own
    PerRecord,
    /// One transaction for the batch; any failure rolls everything back
    PerBatch,
}

impl CommitPolicy {
    pub fn name(&self) -> &str {
        match self {
            CommitPolicy::Autocommit => "autocommit",
            CommitPolicy::PerRecord => "per-record",
            CommitPolicy::PerBatch => "per-batch",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown commit policy '{0}' (expected autocommit, per-record or per-batch)")]
pub struct UnknownCommitPolicy(pub String);

impl FromStr for CommitPolicy {
    type Err = UnknownCommitPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "autocommit" => Ok(CommitPolicy::Autocommit),
            "per-record" | "per_record" => Ok(CommitPolicy::PerRecord),
            "per-batch" | "per_batch" => Ok(CommitPolicy::PerBatch),
            other => Err(UnknownCommitPolicy(other.to_string())),
        }
    }
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpsertAction {
    Inserted,
    Updated,
    /// Record had no PRN
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub prn: String,
    pub action: UpsertAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    /// One entry per input record, in input order
    pub outcomes: Vec<RecordOutcome>,
}

impl ReconciliationReport {
    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    fn record(&mut self, prn: &str, action: UpsertAction) {
        match action {
            UpsertAction::Inserted => self.inserted += 1,
            UpsertAction::Updated => self.updated += 1,
            UpsertAction::Skipped => self.skipped += 1,
        }
        self.outcomes.push(RecordOutcome {
            prn: prn.to_string(),
            action,
        });
    }

    pub fn summary(&self) -> String {
        format!(
            "{} records: {} inserted, {} updated, {} skipped",
            self.processed(),
            self.inserted,
            self.updated,
            self.skipped
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconciliationEngine {
    pub commit_policy: CommitPolicy,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: choose the transaction grouping
    pub fn with_commit_policy(mut self, commit_policy: CommitPolicy) -> Self {
        self.commit_policy = commit_policy;
        self
    }

    /// Upsert every record into the store, in order
    pub fn reconcile(
        &self,
        store: &mut StudentStore,
        records: &[StudentRecord],
    ) -> IngestResult<ReconciliationReport> {
        tracing::info!(
            records = records.len(),
            policy = self.commit_policy.name(),
            "Inserting/updating student records"
        );

        let report = match self.commit_policy {
            CommitPolicy::Autocommit => {
                let mut report = ReconciliationReport::default();
                for student in records {
                    let action = self.upsert(store.connection(), student)?;
                    report.record(&student.prn, action);
                }
                report
            }
            CommitPolicy::PerRecord => {
                let conn = store.connection_mut();
                let mut report = ReconciliationReport::default();
                for student in records {
                    let tx = conn.transaction()?;
                    let action = self.upsert(&tx, student)?;
                    tx.commit()?;
                    report.record(&student.prn, action);
                }
                report
            }
            CommitPolicy::PerBatch => {
                // Dropping `tx` on the error path rolls the batch back
                let tx = store.connection_mut().transaction()?;
                let mut report = ReconciliationReport::default();
                for student in records {
                    let action = self.upsert(&tx, student)?;
                    report.record(&student.prn, action);
                }
                tx.commit()?;
                report
            }
        };

        tracing::info!(
            inserted = report.inserted,
            updated = report.updated,
            skipped = report.skipped,
            "Database insert/update completed"
        );
        Ok(report)
    }

    /// Existence check, then update or insert one record
    pub fn upsert(&self, conn: &Connection, student: &StudentRecord) -> IngestResult<UpsertAction> {
        let prn = student.prn.as_str();
        if prn.trim().is_empty() {
            tracing::warn!(student = ?student, "Skipping record without PRN");
            return Ok(UpsertAction::Skipped);
        }

        let action = match find_prn(conn, prn)? {
            Some(_) => {
                tracing::debug!(prn, "Updating record");
                update_student(conn, student)?;
                UpsertAction::Updated
            }
            None => {
                tracing::debug!(prn, "Inserting new record");
                insert_student(conn, student)?;
                UpsertAction::Inserted
            }
        };

        Ok(action)
    }
}
