//! Command-line definition and dispatch

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde_json::Value;
use tracing::info;

use assignment_core::{AssignmentConfig, AssignmentDatabase, AssignmentOrchestrator};

use crate::commands::{assignment, catalog};
use crate::logging::{setup_logging, LoggingConfig};

#[derive(Parser, Debug)]
#[command(name = "civroute", version, about = "Authority assignment engine for civic reports")]
pub struct Cli {
    /// TOML configuration file; `CIVROUTE_*` variables override it
    #[arg(short, long, env = "CIVROUTE_CONFIG")]
    config: Option<PathBuf>,

    /// Database URL, overriding the configuration
    #[arg(long)]
    database_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "CIVROUTE_LOG_LEVEL")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the schema if it does not exist yet
    Init,

    /// Register a city
    AddCity { name: String },

    /// Register an issue category
    AddCategory { name: String },

    /// Register an authority in a city
    AddAuthority {
        #[arg(long)]
        name: String,
        #[arg(long)]
        city: i64,
        #[arg(long)]
        region: Option<String>,
        /// Register the authority disabled
        #[arg(long)]
        inactive: bool,
    },

    /// Make an authority eligible for an issue category
    Map { authority: i64, category: i64 },

    /// Remove an authority's eligibility for an issue category
    Unmap { authority: i64, category: i64 },

    /// Enable or disable an authority
    SetActive {
        authority: i64,
        #[arg(action = ArgAction::Set)]
        active: bool,
    },

    /// List the authorities of a city, oldest first
    Authorities { city: i64 },

    /// List the authorities eligible for an issue category
    Mappings { category: i64 },

    /// Submit a report and run automatic assignment
    Report {
        #[arg(long)]
        category: i64,
        #[arg(long)]
        city: Option<i64>,
        #[arg(long)]
        region: Option<String>,
        #[arg(long, default_value = "open")]
        status: String,
    },

    /// Admin override: assign a report to an authority, or unassign it
    Reassign {
        report: i64,
        /// Target authority; omit to unassign
        #[arg(long)]
        authority: Option<i64>,
        #[arg(long, env = "CIVROUTE_ACTOR")]
        actor: String,
    },

    /// Re-run automatic matching for a report
    Retry {
        report: i64,
        #[arg(long, env = "CIVROUTE_ACTOR", default_value = "")]
        actor: String,
    },

    /// Show the decoded assignment history of a report
    History { report: i64 },

    /// Check that a report's ledger reconstructs its current authority
    Verify { report: i64 },
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        setup_logging(&LoggingConfig::new(&self.log_level, self.json_logs)?);

        let config = self.load_config()?;
        let db = AssignmentDatabase::connect(&config)
            .await
            .with_context(|| format!("opening database {}", config.database_url))?;
        let orchestrator = AssignmentOrchestrator::new(db.clone(), &config);

        let output = dispatch(self.command, &db, &orchestrator).await;
        db.close().await;

        let output = output?;
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    fn load_config(&self) -> Result<AssignmentConfig> {
        let mut config = match &self.config {
            Some(path) => AssignmentConfig::from_file(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => AssignmentConfig::from_env().context("loading configuration")?,
        };

        if let Some(url) = &self.database_url {
            config.database_url = url.clone();
        }

        info!("🔧 Using database {}", config.database_url);
        Ok(config)
    }
}

async fn dispatch(command: Command, db: &AssignmentDatabase, orchestrator: &AssignmentOrchestrator) -> Result<Value> {
    match command {
        Command::Init => catalog::init(db).await,
        Command::AddCity { name } => catalog::add_city(db, &name).await,
        Command::AddCategory { name } => catalog::add_category(db, &name).await,
        Command::AddAuthority {
            name,
            city,
            region,
            inactive,
        } => catalog::add_authority(db, name, city, region, !inactive).await,
        Command::Map { authority, category } => catalog::map(db, authority, category).await,
        Command::Unmap { authority, category } => catalog::unmap(db, authority, category).await,
        Command::SetActive { authority, active } => catalog::set_active(db, authority, active).await,
        Command::Authorities { city } => catalog::list_authorities(db, city).await,
        Command::Mappings { category } => catalog::list_mappings(db, category).await,
        Command::Report {
            category,
            city,
            region,
            status,
        } => assignment::submit_report(orchestrator, category, city, region, status).await,
        Command::Reassign {
            report,
            authority,
            actor,
        } => assignment::reassign(orchestrator, report, authority, &actor).await,
        Command::Retry { report, actor } => assignment::retry(orchestrator, report, &actor).await,
        Command::History { report } => assignment::history(orchestrator, report).await,
        Command::Verify { report } => assignment::verify(orchestrator, report).await,
    }
}
