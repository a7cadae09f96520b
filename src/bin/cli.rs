//! Privacy Gateway CLI - Main entry point
//!
//! This binary provides the `pgw` tool for managing a gateway project.

use anyhow::{bail, Context};
use clap::Parser;
use privacy_gateway_lib::engine::{
    api::{create_router, ApiState},
    audit::AuditRecorder,
    cli::{AuditCliAction, Cli, Commands, OutputFormat},
    config::Config,
    database::Database,
    gateway::AccessGateway,
    seed,
    token::TokenService,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run_cli(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let project_dir = cli.get_project_dir();
    let json_output = cli.format == OutputFormat::Json;

    match cli.command {
        Commands::Init { name } => {
            cmd_init(&project_dir, &name, json_output)?;
        }
        Commands::Seed { rows } => {
            cmd_seed(&project_dir, rows, json_output)?;
        }
        Commands::Serve { port, host } => {
            cmd_serve(&project_dir, host, port)?;
        }
        Commands::Token { role } => {
            cmd_token(&project_dir, &role, json_output)?;
        }
        Commands::Status => {
            cmd_status(&project_dir, json_output)?;
        }
        Commands::Audit { action } => match action {
            AuditCliAction::Tail { count } => cmd_audit_tail(&project_dir, count, json_output)?,
        },
    }

    Ok(())
}

fn load_config(project_dir: &Path) -> anyhow::Result<Config> {
    Config::load(project_dir)
        .with_context(|| format!("no gateway project at {}", project_dir.display()))
}

fn open_database(project_dir: &Path, config: &Config) -> anyhow::Result<Database> {
    let db_path = project_dir.join(&config.database.path);
    Ok(Database::new(&db_path)?)
}

fn cmd_init(project_dir: &PathBuf, name: &str, json: bool) -> anyhow::Result<()> {
    let config_path = project_dir.join("gateway.config.json");
    if config_path.exists() {
        bail!("project already initialized: {}", config_path.display());
    }

    std::fs::create_dir_all(project_dir)?;
    std::fs::create_dir_all(project_dir.join("data"))?;

    let mut config = Config::default_for_project(name);
    // Dev secret so serve/token work immediately; override via env in prod.
    config.auth.secret = Some(uuid::Uuid::new_v4().simple().to_string());
    config.save(project_dir)?;

    // Create the database and its schema up front so status/seed just work.
    open_database(project_dir, &config)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "project": name,
                "path": project_dir.display().to_string(),
            })
        );
    } else {
        println!("🚀 Initialized gateway project '{}'", name);
        println!("   Config: {}", config_path.display());
        println!("   Next: pgw seed && pgw serve");
    }
    Ok(())
}

fn cmd_seed(project_dir: &PathBuf, rows: Option<usize>, json: bool) -> anyhow::Result<()> {
    let config = load_config(project_dir)?;
    let db = open_database(project_dir, &config)?;

    let rows = rows.unwrap_or(config.seed.rows);
    let summary = seed::seed(&db, rows, &config.seed.pseudonym_salt)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "patients": summary.patients,
                "pseudonymized": summary.pseudonymized,
                "synthetic": summary.synthetic,
            })
        );
    } else {
        println!("🌱 Seeded data sources");
        println!("   patients: {} rows", summary.patients);
        println!("   pseudonymized: {} rows", summary.pseudonymized);
        println!("   synthetic: {} rows", summary.synthetic);
    }
    Ok(())
}

#[tokio::main]
async fn cmd_serve(
    project_dir: &PathBuf,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = load_config(project_dir)?;
    let secret = config.token_secret()?;
    let db = open_database(project_dir, &config)?;

    let state = ApiState {
        gateway: Arc::new(AccessGateway::new(db)),
        tokens: Arc::new(TokenService::new(secret, config.auth.token_ttl_minutes)),
    };
    let app = create_router(state);

    let host = host.unwrap_or(config.api.host);
    let port = port.unwrap_or(config.api.port);
    let addr = format!("{}:{}", host, port);
    println!("🚀 Privacy Gateway API Server");
    println!("   Project: {}", config.project.name);
    println!("   Listening: http://{}", addr);
    println!("   Press Ctrl+C to stop");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn cmd_token(project_dir: &PathBuf, role: &str, json: bool) -> anyhow::Result<()> {
    let config = load_config(project_dir)?;
    let tokens = TokenService::new(config.token_secret()?, config.auth.token_ttl_minutes);
    let token = tokens.issue(role)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "access_token": token,
                "token_type": "Bearer",
            })
        );
    } else {
        println!("🔑 Bearer token for role '{}'", role);
        println!("{}", token);
    }
    Ok(())
}

fn cmd_status(project_dir: &PathBuf, json: bool) -> anyhow::Result<()> {
    let config = load_config(project_dir)?;
    let db = open_database(project_dir, &config)?;

    let conn = db.get_connection()?;
    let view_count = |view: &str| -> anyhow::Result<i64> {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", view), [], |r| r.get(0))?)
    };
    let patients = view_count("patients")?;
    let researcher = view_count("v_patients_researcher")?;
    let developer = view_count("v_patients_developer")?;
    let audit_records = AuditRecorder::new(db.clone()).count()?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "project": config.project.name,
                "database": config.database.db_type,
                "api_port": config.api.port,
                "patients": patients,
                "researcher_view": researcher,
                "developer_view": developer,
                "audit_records": audit_records,
            })
        );
    } else {
        println!("📊 Gateway Project Status");
        println!("   Project: {}", config.project.name);
        println!(
            "   Database: {} ({})",
            config.database.db_type,
            config.database.path.display()
        );
        println!("   API Port: {}", config.api.port);
        println!("\n   patients: {} rows", patients);
        println!("   v_patients_researcher: {} rows", researcher);
        println!("   v_patients_developer: {} rows", developer);
        println!("   audit_logs: {} records", audit_records);
    }
    Ok(())
}

fn cmd_audit_tail(project_dir: &PathBuf, count: usize, json: bool) -> anyhow::Result<()> {
    let config = load_config(project_dir)?;
    let db = open_database(project_dir, &config)?;
    let records = AuditRecorder::new(db).tail(count)?;

    if json {
        for record in &records {
            println!("{}", serde_json::to_string(record)?);
        }
    } else if records.is_empty() {
        println!("(no audit records)");
    } else {
        for record in &records {
            println!(
                "{} [{}] {} role={} actor={} patient_id={}",
                record.timestamp,
                record.outcome,
                record.action,
                record.actor_role,
                record.actor_id,
                record
                    .patient_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
    }
    Ok(())
}
