//! Gateway CLI Module
//! Command-line interface for gateway operations

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pgw")]
#[command(author = "Privacy Gateway Team")]
#[command(version)]
#[command(about = "Role-aware privacy gateway for hospital data", long_about = None)]
pub struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Output format (json for scripting)
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new gateway project
    Init {
        /// Project name
        #[arg(short, long)]
        name: String,
    },

    /// Seed the patient data sources
    Seed {
        /// Number of rows per source (defaults to the configured value)
        #[arg(short, long)]
        rows: Option<usize>,
    },

    /// Start the gateway API server
    Serve {
        /// Port to listen on (defaults to the configured value)
        #[arg(short = 'P', long)]
        port: Option<u16>,

        /// Host to bind to (defaults to the configured value)
        #[arg(long)]
        host: Option<String>,
    },

    /// Issue a bearer token for a role (dev/test only)
    Token {
        /// Role to embed: clinician, researcher, or developer
        role: String,
    },

    /// Show project status
    Status,

    /// Audit trail tooling
    Audit {
        #[command(subcommand)]
        action: AuditCliAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum AuditCliAction {
    /// Print the latest audit records
    Tail {
        /// Number of records
        #[arg(short, long, default_value = "20")]
        count: usize,
    },
}

impl Cli {
    pub fn get_project_dir(&self) -> PathBuf {
        self.project
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}
