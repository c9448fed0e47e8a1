use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::model::{BatchId, EnvironmentId, EnvironmentStatus, ProjectId, UrgencyLevel};

pub mod commands;

#[derive(Parser)]
#[command(name = "fluxo")]
#[command(about = "Batch workflow tracking for furniture installation projects")]
#[command(long_about = "Fluxo moves groups of rooms (batches) through the ordered stage catalog, \
                       splits rooms off into independent batches and keeps an audit trail of every \
                       change. Start with 'fluxo init' to seed the store.")]
pub struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Seed the workflow definition and the admin user (safe to rerun)
    Init,
    /// List the stage catalog in workflow order
    Stages,
    /// Change the SLA of one stage
    Sla {
        /// Stage code, e.g. 4.4B
        code: String,
        /// New SLA in days
        days: u32,
    },
    /// Create and inspect projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Show every batch with its stage and SLA status
    Board {
        /// Only batches of this project
        #[arg(long)]
        project: Option<ProjectId>,
    },
    /// Move a batch one stage forward
    Advance {
        batch: BatchId,
    },
    /// Break rooms off a batch into a new batch at the re-entry stage
    Split {
        batch: BatchId,
        /// Environment to move (repeatable)
        #[arg(long = "env", required = true)]
        environments: Vec<EnvironmentId>,
    },
    /// Show a project's notes, newest first
    Notes {
        project: ProjectId,
    },
    /// Add a manual note to a project
    Note {
        project: ProjectId,
        content: String,
    },
    /// Update client data of a project
    Client {
        project: ProjectId,
        #[command(flatten)]
        fields: ClientFields,
    },
    /// Update an environment's editable fields
    Environment {
        environment: EnvironmentId,
        #[command(flatten)]
        fields: EnvironmentFields,
    },
    /// Request a replacement part from the factory
    FactoryPart {
        project: ProjectId,
        environment: EnvironmentId,
        description: String,
    },
    /// Reconstruct stage transitions of a project
    History {
        project: ProjectId,
    },
    /// Show the effective configuration
    Config {
        /// Write it as TOML to this path
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Register a client with its rooms; all rooms start in one batch
    Create {
        /// Client name
        #[arg(long)]
        client: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        address: String,
        /// Lead origin, e.g. Instagram
        #[arg(long)]
        origin: Option<String>,
        /// Seller responsible for the project
        #[arg(long)]
        seller: String,
        /// Room as name:area[:urgency[:value]] (repeatable)
        #[arg(long = "env", required = true)]
        environments: Vec<String>,
    },
    /// Show a project with its rooms and batches
    Show {
        project: ProjectId,
    },
    /// List all projects
    List,
}

#[derive(clap::Args, Debug, Default)]
pub struct ClientFields {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub cpf: Option<String>,
    #[arg(long)]
    pub origin: Option<String>,
    #[arg(long)]
    pub store_unit: Option<String>,
    #[arg(long)]
    pub salesperson: Option<String>,
    #[arg(long)]
    pub property_type: Option<String>,
    #[arg(long)]
    pub move_in_date: Option<String>,
    #[arg(long)]
    pub budget: Option<f64>,
}

#[derive(clap::Args, Debug, Default)]
pub struct EnvironmentFields {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub area: Option<f64>,
    #[arg(long, value_parser = parse_urgency)]
    pub urgency: Option<UrgencyLevel>,
    #[arg(long)]
    pub value: Option<f64>,
    #[arg(long)]
    pub observations: Option<String>,
    #[arg(long, value_parser = parse_environment_status)]
    pub status: Option<EnvironmentStatus>,
}

fn parse_urgency(raw: &str) -> Result<UrgencyLevel, String> {
    UrgencyLevel::parse(raw).ok_or_else(|| format!("unknown urgency level: {raw}"))
}

fn parse_environment_status(raw: &str) -> Result<EnvironmentStatus, String> {
    EnvironmentStatus::parse(raw).ok_or_else(|| format!("unknown environment status: {raw}"))
}
