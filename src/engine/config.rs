//! Gateway Configuration Module
//! Handles loading and validating gateway.config.json

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable that overrides the configured token secret.
pub const SECRET_ENV_VAR: &str = "GATEWAY_JWT_SECRET";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Invalid config format: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("No token secret configured (set auth.secret or {SECRET_ENV_VAR})")]
    MissingSecret,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub project: ProjectConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(rename = "type")]
    pub db_type: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared HS256 secret. `GATEWAY_JWT_SECRET` takes precedence when set.
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_ttl_minutes")]
    pub token_ttl_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default = "default_seed_rows")]
    pub rows: usize,
    /// Salt mixed into researcher pseudonyms. Changing it rotates every pseudonym.
    #[serde(default = "default_pseudonym_salt")]
    pub pseudonym_salt: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            rows: default_seed_rows(),
            pseudonym_salt: default_pseudonym_salt(),
        }
    }
}

fn default_port() -> u16 {
    8000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_ttl_minutes() -> i64 {
    60
}

fn default_seed_rows() -> usize {
    1000
}

fn default_pseudonym_salt() -> String {
    "privacy-gateway".to_string()
}

impl Config {
    pub fn load(project_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = project_dir.join("gateway.config.json");
        if !config_path.exists() {
            return Err(ConfigError::NotFound(config_path));
        }
        let content = std::fs::read_to_string(&config_path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, project_dir: &Path) -> Result<(), ConfigError> {
        let config_path = project_dir.join("gateway.config.json");
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn default_for_project(name: &str) -> Self {
        Self {
            version: "1.0.0".to_string(),
            project: ProjectConfig {
                name: name.to_string(),
                id: format!("gateway-{}", name),
            },
            database: DatabaseConfig {
                db_type: "sqlite".to_string(),
                path: PathBuf::from("./data/gateway.db"),
            },
            api: ApiConfig {
                port: default_port(),
                host: default_host(),
            },
            auth: AuthConfig {
                secret: None,
                token_ttl_minutes: default_ttl_minutes(),
            },
            seed: SeedConfig::default(),
        }
    }

    /// Resolve the token secret. The environment wins over the file so that
    /// deployments never have to write secrets to disk.
    pub fn token_secret(&self) -> Result<String, ConfigError> {
        if let Ok(secret) = std::env::var(SECRET_ENV_VAR) {
            if !secret.is_empty() {
                return Ok(secret);
            }
        }
        self.auth
            .secret
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingSecret)
    }
}
