//! Access Gateway
//!
//! Orchestrates a data request: resolve the role to its view, authorize,
//! fetch, audit, respond. The audit write happens before any data leaves the
//! gateway; if it fails the request fails with it.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

use super::audit::{AuditAction, AuditError, AuditOutcome, AuditRecord, AuditRecorder};
use super::database::{Database, DatabaseError, DbConnection};
use super::export;
use super::policy::Role;
use super::token::Claims;

pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 100;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Forbidden")]
    Forbidden { role: String },
    #[error("{0}")]
    InvalidPage(String),
    #[error("Data source error: {0}")]
    DataSource(#[from] DatabaseError),
    #[error("Data source error: {0}")]
    Query(#[from] rusqlite::Error),
    #[error("Audit write failed: {0}")]
    Audit(#[from] AuditError),
}

/// Requested result window.
#[derive(Debug, Clone, Copy)]
pub struct PageParams {
    pub limit: i64,
    pub offset: i64,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl PageParams {
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.limit < 1 || self.limit > MAX_PAGE_LIMIT {
            return Err(GatewayError::InvalidPage(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_LIMIT
            )));
        }
        if self.offset < 0 {
            return Err(GatewayError::InvalidPage(
                "offset must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
    pub total: i64,
    pub has_next: bool,
}

/// One page of a role's view, as returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct PatientPage {
    pub role: Role,
    pub data: Vec<Map<String, Value>>,
    pub pagination: Pagination,
}

/// A complete view rendered for download.
#[derive(Debug, Clone)]
pub struct CsvExport {
    pub filename: &'static str,
    pub content: String,
    pub row_count: usize,
}

#[derive(Clone)]
pub struct AccessGateway {
    db: Database,
    audit: AuditRecorder,
}

impl AccessGateway {
    pub fn new(db: Database) -> Self {
        let audit = AuditRecorder::new(db.clone());
        Self { db, audit }
    }

    pub fn audit(&self) -> &AuditRecorder {
        &self.audit
    }

    /// Authorize the claims for data access. A role with no view binding is
    /// recorded as DENIED before the error is returned.
    fn authorize(&self, claims: &Claims, action: AuditAction) -> Result<Role, GatewayError> {
        match Role::from_str(&claims.role) {
            Ok(role) => Ok(role),
            Err(_) => {
                warn!(role = %claims.role, action = action.as_str(), "access denied");
                self.audit.record(&AuditRecord::new(
                    &claims.sub,
                    &claims.role,
                    action,
                    AuditOutcome::Denied,
                ))?;
                Err(GatewayError::Forbidden {
                    role: claims.role.clone(),
                })
            }
        }
    }

    /// Return one page of the caller's view with pagination metadata.
    pub fn list_patients(
        &self,
        claims: &Claims,
        page: PageParams,
    ) -> Result<PatientPage, GatewayError> {
        page.validate()?;
        let role = self.authorize(claims, AuditAction::ViewPatients)?;
        let binding = role.view();

        let conn = self.db.get_connection()?;

        // Total is recomputed per request. It may drift from the page fetch
        // under concurrent writers; no consistency guarantee is made.
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", binding.view),
            [],
            |row| row.get(0),
        )?;

        let (columns, rows) = fetch_rows(
            &conn,
            &format!(
                "SELECT * FROM {} LIMIT {} OFFSET {}",
                binding.view, page.limit, page.offset
            ),
        )?;

        let returned_ids: Vec<Value> = rows.iter().filter_map(|r| r.first().cloned()).collect();
        let first_subject = if binding.identifying {
            returned_ids.first().and_then(Value::as_i64)
        } else {
            None
        };

        let mut record = AuditRecord::new(
            &claims.sub,
            role.as_str(),
            AuditAction::ViewPatients,
            AuditOutcome::Success,
        )
        .with_meta(json!({
            "returned_ids": returned_ids,
            "limit": page.limit,
            "offset": page.offset,
            "total": total,
        }));
        if let Some(id) = first_subject {
            record = record.with_patient_id(id);
        }
        self.audit.record(&record)?;

        debug!(
            role = role.as_str(),
            view = binding.view,
            rows = rows.len(),
            total,
            "served patient page"
        );

        let data = rows
            .into_iter()
            .map(|row| columns.iter().cloned().zip(row).collect())
            .collect();

        Ok(PatientPage {
            role,
            data,
            pagination: Pagination {
                limit: page.limit,
                offset: page.offset,
                total,
                has_next: page.offset + page.limit < total,
            },
        })
    }

    /// Render the caller's entire view as a CSV attachment. No row limit.
    pub fn export_patients(&self, claims: &Claims) -> Result<CsvExport, GatewayError> {
        let role = self.authorize(claims, AuditAction::DownloadPatients)?;
        let binding = role.view();

        let conn = self.db.get_connection()?;
        let (columns, rows) = fetch_rows(&conn, &format!("SELECT * FROM {}", binding.view))?;

        let first_subject = if binding.identifying {
            rows.first()
                .and_then(|r| r.first())
                .and_then(Value::as_i64)
        } else {
            None
        };

        let mut record = AuditRecord::new(
            &claims.sub,
            role.as_str(),
            AuditAction::DownloadPatients,
            AuditOutcome::Success,
        )
        .with_meta(json!({ "row_count": rows.len() }));
        if let Some(id) = first_subject {
            record = record.with_patient_id(id);
        }
        self.audit.record(&record)?;

        debug!(role = role.as_str(), view = binding.view, rows = rows.len(), "exported view");

        Ok(CsvExport {
            filename: "patients.csv",
            row_count: rows.len(),
            content: export::to_csv(&columns, &rows),
        })
    }
}

/// Run a SELECT and collect column names plus rows of JSON cells.
fn fetch_rows(
    conn: &DbConnection,
    sql: &str,
) -> Result<(Vec<String>, Vec<Vec<Value>>), rusqlite::Error> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let width = columns.len();

    let rows = stmt
        .query_map([], |row| {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                let value = match row.get_ref(i)? {
                    rusqlite::types::ValueRef::Null => Value::Null,
                    rusqlite::types::ValueRef::Integer(n) => json!(n),
                    rusqlite::types::ValueRef::Real(f) => json!(f),
                    rusqlite::types::ValueRef::Text(t) => {
                        json!(String::from_utf8_lossy(t).to_string())
                    }
                    rusqlite::types::ValueRef::Blob(b) => {
                        json!(base64::Engine::encode(
                            &base64::engine::general_purpose::STANDARD,
                            b
                        ))
                    }
                };
                cells.push(value);
            }
            Ok(cells)
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok((columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::seed;

    const SALT: &str = "test-salt";

    fn gateway_with_rows(rows: usize) -> AccessGateway {
        let db = Database::in_memory().unwrap();
        seed::seed(&db, rows, SALT).unwrap();
        AccessGateway::new(db)
    }

    fn claims(role: &str) -> Claims {
        Claims {
            sub: "subject-1".to_string(),
            role: role.to_string(),
            iat: 0,
            exp: i64::MAX,
        }
    }

    #[test]
    fn test_clinician_page_and_audit() {
        let gateway = gateway_with_rows(25);
        let page = gateway
            .list_patients(&claims("clinician"), PageParams::default())
            .unwrap();

        assert_eq!(page.data.len(), 10);
        assert_eq!(page.pagination.total, 25);
        assert!(page.pagination.has_next);
        assert_eq!(page.role, Role::Clinician);
        // Raw view exposes identity.
        assert!(page.data[0].contains_key("name"));
        assert!(page.data[0].contains_key("phone"));

        let records = gateway.audit().tail(10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, "SUCCESS");
        assert_eq!(records[0].action, "VIEW_PATIENTS");
        assert_eq!(records[0].actor_id, "subject-1");
        assert_eq!(records[0].patient_id, Some(1));
        let meta = records[0].meta.as_ref().unwrap();
        assert_eq!(meta["total"], 25);
        assert_eq!(meta["returned_ids"].as_array().unwrap().len(), 10);
    }

    #[test]
    fn test_last_page_has_no_next() {
        let gateway = gateway_with_rows(25);
        let page = gateway
            .list_patients(
                &claims("clinician"),
                PageParams {
                    limit: 10,
                    offset: 20,
                },
            )
            .unwrap();
        assert_eq!(page.data.len(), 5);
        assert!(!page.pagination.has_next);
    }

    #[test]
    fn test_researcher_view_is_deidentified() {
        let gateway = gateway_with_rows(5);
        let page = gateway
            .list_patients(&claims("researcher"), PageParams::default())
            .unwrap();

        assert!(page.data[0].contains_key("pseudonym"));
        assert!(!page.data[0].contains_key("name"));
        assert!(!page.data[0].contains_key("phone"));

        // Pseudonymized ids stay out of the primary disclosed-subject field.
        let records = gateway.audit().tail(1).unwrap();
        assert!(records[0].patient_id.is_none());
        let ids = records[0].meta.as_ref().unwrap()["returned_ids"]
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(ids.len(), 5);
        assert!(ids.iter().all(|v| v.is_string()));
    }

    #[test]
    fn test_unmapped_role_denied_and_audited() {
        let gateway = gateway_with_rows(5);
        let err = gateway
            .list_patients(&claims("auditor"), PageParams::default())
            .unwrap_err();
        assert!(matches!(err, GatewayError::Forbidden { .. }));

        let records = gateway.audit().tail(1).unwrap();
        assert_eq!(records[0].outcome, "DENIED");
        assert_eq!(records[0].actor_role, "auditor");
        assert!(records[0].patient_id.is_none());
    }

    #[test]
    fn test_invalid_page_rejected_before_audit() {
        let gateway = gateway_with_rows(5);
        for (limit, offset) in [(0, 0), (101, 0), (10, -1)] {
            let err = gateway
                .list_patients(&claims("clinician"), PageParams { limit, offset })
                .unwrap_err();
            assert!(matches!(err, GatewayError::InvalidPage(_)));
        }
        assert_eq!(gateway.audit().count().unwrap(), 0);
    }

    #[test]
    fn test_export_full_view() {
        let gateway = gateway_with_rows(25);
        let export = gateway.export_patients(&claims("developer")).unwrap();

        assert_eq!(export.filename, "patients.csv");
        assert_eq!(export.row_count, 25);
        let lines: Vec<&str> = export.content.trim_end().split("\r\n").collect();
        assert_eq!(lines.len(), 26);
        assert!(lines[0].starts_with("id,name,phone"));

        let records = gateway.audit().tail(1).unwrap();
        assert_eq!(records[0].action, "DOWNLOAD_PATIENTS");
        assert_eq!(records[0].meta.as_ref().unwrap()["row_count"], 25);
        assert!(records[0].patient_id.is_some());
    }

    #[test]
    fn test_audit_completeness_across_requests() {
        let gateway = gateway_with_rows(5);
        gateway
            .list_patients(&claims("clinician"), PageParams::default())
            .unwrap();
        gateway
            .list_patients(&claims("auditor"), PageParams::default())
            .unwrap_err();
        gateway.export_patients(&claims("researcher")).unwrap();

        assert_eq!(gateway.audit().count().unwrap(), 3);
    }
}
