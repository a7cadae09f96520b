//! Audit Recorder
//!
//! One durable record per access decision, written synchronously into the
//! append-only `audit_logs` table. Schema-level triggers reject UPDATE and
//! DELETE, so the recorder exposes no mutation API at all.

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::database::{Database, DatabaseError};

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Failed to serialize audit metadata: {0}")]
    Meta(#[from] serde_json::Error),
}

/// Actions the gateway audits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    ViewPatients,
    DownloadPatients,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::ViewPatients => "VIEW_PATIENTS",
            AuditAction::DownloadPatients => "DOWNLOAD_PATIENTS",
        }
    }
}

/// Outcome of an access decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Denied,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Success => "SUCCESS",
            AuditOutcome::Denied => "DENIED",
        }
    }
}

/// A single audit record, built before the response is finalized.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub actor_id: String,
    pub actor_role: String,
    pub action: AuditAction,
    pub outcome: AuditOutcome,
    /// Primary disclosed subject. Populated only when the resolved view
    /// exposes real identity; de-identified views keep identifiers in `meta`.
    pub patient_id: Option<i64>,
    pub meta: Option<Value>,
}

impl AuditRecord {
    pub fn new(
        actor_id: &str,
        actor_role: &str,
        action: AuditAction,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            actor_id: actor_id.to_string(),
            actor_role: actor_role.to_string(),
            action,
            outcome,
            patient_id: None,
            meta: None,
        }
    }

    pub fn with_patient_id(mut self, patient_id: i64) -> Self {
        self.patient_id = Some(patient_id);
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// A persisted record, as read back by internal tooling.
#[derive(Debug, Clone, Serialize)]
pub struct StoredAuditRecord {
    pub id: i64,
    pub timestamp: String,
    pub actor_id: String,
    pub actor_role: String,
    pub action: String,
    pub outcome: String,
    pub patient_id: Option<i64>,
    pub meta: Option<Value>,
}

#[derive(Clone)]
pub struct AuditRecorder {
    db: Database,
}

impl AuditRecorder {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Durably persist one record. Returns the record's rowid. Callers treat
    /// a failure here as authoritative: no data leaves the gateway without a
    /// matching trail entry.
    pub fn record(&self, record: &AuditRecord) -> Result<i64, AuditError> {
        let meta = record
            .meta
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.db.get_connection()?;
        conn.execute(
            "INSERT INTO audit_logs
             (timestamp, actor_id, actor_role, action, outcome, patient_id, meta)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.timestamp.to_rfc3339(),
                record.actor_id,
                record.actor_role,
                record.action.as_str(),
                record.outcome.as_str(),
                record.patient_id,
                meta,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Latest `n` records, oldest first. Internal tooling only; the audit
    /// log has no HTTP surface.
    pub fn tail(&self, n: usize) -> Result<Vec<StoredAuditRecord>, AuditError> {
        let conn = self.db.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, actor_id, actor_role, action, outcome, patient_id, meta
             FROM audit_logs ORDER BY id DESC LIMIT ?1",
        )?;
        let mut records = stmt
            .query_map([n as i64], |row| {
                let meta: Option<String> = row.get(7)?;
                Ok(StoredAuditRecord {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    actor_id: row.get(2)?,
                    actor_role: row.get(3)?,
                    action: row.get(4)?,
                    outcome: row.get(5)?,
                    patient_id: row.get(6)?,
                    meta: meta.and_then(|m| serde_json::from_str(&m).ok()),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        records.reverse();
        Ok(records)
    }

    pub fn count(&self) -> Result<i64, AuditError> {
        let conn = self.db.get_connection()?;
        let count = conn.query_row("SELECT COUNT(*) FROM audit_logs", [], |row| row.get(0))?;
        Ok(count)
    }
}
