//! Role-to-View Policy
//!
//! The entire authorization model: three recognized roles, each bound to a
//! fixed data view. Anything that fails to parse into `Role` is denied.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// View the clinician role reads (raw identified records).
pub const VIEW_CLINICIAN: &str = "patients";
/// View the researcher role reads (pseudonymized projection).
pub const VIEW_RESEARCHER: &str = "v_patients_researcher";
/// View the developer role reads (synthetic records).
pub const VIEW_DEVELOPER: &str = "v_patients_developer";

/// The authorization identity carried by a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Clinician,
    Researcher,
    Developer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Clinician, Role::Researcher, Role::Developer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Clinician => "clinician",
            Role::Researcher => "researcher",
            Role::Developer => "developer",
        }
    }

    /// Resolve the view this role is permitted to read. Total over the enum;
    /// the view names are compile-time constants so no caller-supplied string
    /// can ever reach SQL text.
    pub fn view(&self) -> ViewBinding {
        match self {
            Role::Clinician => ViewBinding {
                view: VIEW_CLINICIAN,
                identifying: true,
            },
            Role::Researcher => ViewBinding {
                view: VIEW_RESEARCHER,
                identifying: false,
            },
            Role::Developer => ViewBinding {
                view: VIEW_DEVELOPER,
                identifying: true,
            },
        }
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clinician" => Ok(Role::Clinician),
            "researcher" => Ok(Role::Researcher),
            "developer" => Ok(Role::Developer),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role string outside the recognized set. Denied for all data operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role: {}", self.0)
    }
}

impl std::error::Error for UnknownRole {}

/// A role's resolved data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewBinding {
    /// SQL identifier of the bound view or table.
    pub view: &'static str,
    /// Whether the view exposes real subject identity. Controls how much of
    /// the disclosed identifiers end up in the primary audit field.
    pub identifying: bool,
}
