//! End-to-end engine flow: token issuance through audited data access,
//! against a file-backed database.

use privacy_gateway_lib::engine::{
    database::Database,
    gateway::{AccessGateway, GatewayError, PageParams},
    seed,
    token::{TokenError, TokenService},
};

const SECRET: &str = "integration-test-secret";

fn setup(rows: usize) -> (AccessGateway, TokenService, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(&dir.path().join("gateway.db")).unwrap();
    seed::seed(&db, rows, "flow-salt").unwrap();
    (AccessGateway::new(db), TokenService::new(SECRET, 60), dir)
}

#[test]
fn test_clinician_listing_scenario() {
    let (gateway, tokens, _dir) = setup(25);

    let token = tokens.issue("clinician").unwrap();
    let claims = tokens.validate(&token).unwrap();
    let page = gateway
        .list_patients(&claims, PageParams { limit: 10, offset: 0 })
        .unwrap();

    assert_eq!(page.data.len(), 10);
    assert_eq!(page.pagination.total, 25);
    assert!(page.pagination.has_next);

    let records = gateway.audit().tail(1).unwrap();
    assert_eq!(records[0].outcome, "SUCCESS");
    assert_eq!(records[0].actor_role, "clinician");
    assert_eq!(records[0].actor_id, claims.sub);
}

#[test]
fn test_same_token_correlates_audit_records() {
    let (gateway, tokens, _dir) = setup(5);

    let token = tokens.issue("developer").unwrap();
    let claims = tokens.validate(&token).unwrap();

    gateway.list_patients(&claims, PageParams::default()).unwrap();
    gateway.export_patients(&claims).unwrap();

    let records = gateway.audit().tail(10).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].actor_id, records[1].actor_id);
}

#[test]
fn test_expired_token_never_reaches_gateway() {
    let (gateway, _tokens, _dir) = setup(5);

    let stale = TokenService::new(SECRET, -5);
    let token = stale.issue("clinician").unwrap();

    let fresh = TokenService::new(SECRET, 60);
    assert!(matches!(fresh.validate(&token), Err(TokenError::Expired)));

    // Authentication faults leave no trail.
    assert_eq!(gateway.audit().count().unwrap(), 0);
}

#[test]
fn test_pagination_walks_whole_view() {
    let (gateway, tokens, _dir) = setup(25);
    let token = tokens.issue("researcher").unwrap();
    let claims = tokens.validate(&token).unwrap();

    let mut seen = 0;
    let mut offset = 0;
    loop {
        let page = gateway
            .list_patients(&claims, PageParams { limit: 10, offset })
            .unwrap();
        assert!(page.data.len() <= 10);
        seen += page.data.len();
        if !page.pagination.has_next {
            break;
        }
        offset += 10;
    }
    assert_eq!(seen, 25);
}

#[test]
fn test_denied_role_then_export() {
    let (gateway, tokens, _dir) = setup(5);

    // A token for an unmapped role has to be crafted directly; issue() will
    // not sign one.
    let claims = privacy_gateway_lib::engine::token::Claims {
        sub: "crafted".to_string(),
        role: "auditor".to_string(),
        iat: 0,
        exp: i64::MAX,
    };
    let err = gateway.export_patients(&claims).unwrap_err();
    assert!(matches!(err, GatewayError::Forbidden { .. }));

    let records = gateway.audit().tail(1).unwrap();
    assert_eq!(records[0].outcome, "DENIED");
    assert_eq!(records[0].action, "DOWNLOAD_PATIENTS");

    let token = tokens.issue("developer").unwrap();
    let claims = tokens.validate(&token).unwrap();
    let export = gateway.export_patients(&claims).unwrap();
    assert_eq!(export.row_count, 5);
    assert!(export.content.lines().next().unwrap().starts_with("id,"));
}

#[test]
fn test_trail_survives_tampering_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(&dir.path().join("gateway.db")).unwrap();
    seed::seed(&db, 5, "flow-salt").unwrap();
    let gateway = AccessGateway::new(db.clone());
    let tokens = TokenService::new(SECRET, 60);

    let token = tokens.issue("clinician").unwrap();
    let claims = tokens.validate(&token).unwrap();
    gateway.list_patients(&claims, PageParams::default()).unwrap();

    // The schema itself refuses mutation, whoever holds the connection.
    let conn = db.get_connection().unwrap();
    assert!(conn.execute("UPDATE audit_logs SET outcome = 'SUCCESS'", []).is_err());
    assert!(conn.execute("DELETE FROM audit_logs", []).is_err());
    assert_eq!(gateway.audit().count().unwrap(), 1);
}
