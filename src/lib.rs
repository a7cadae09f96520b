//! Privacy Gateway - role-aware access to hospital patient data
//!
//! Exposes patient records through three role-specific views (clinician:
//! raw, researcher: pseudonymized, developer: synthetic), gated by signed
//! bearer tokens, with every access decision recorded to an append-only
//! audit trail.

pub mod engine;

pub use engine::{AccessGateway, Config, Database, Role, TokenService};
