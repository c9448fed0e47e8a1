use anyhow::Result;
use clap::Parser;
use tracing::Instrument;

use fluxo_erp::cli::commands::{
    AdvanceCommand, BoardCommand, ClientCommand, ConfigCommand, CreateProjectCommand,
    EnvironmentCommand, FactoryPartCommand, HistoryCommand, InitCommand, ListProjectsCommand,
    NoteCommand, NotesCommand, ShowProjectCommand, SlaCommand, SplitCommand, StagesCommand,
};
use fluxo_erp::cli::{Cli, Commands, ProjectCommands};
use fluxo_erp::model::NewClient;
use fluxo_erp::{config, create_operation_span, generate_correlation_id, init_telemetry, FluxoConfig};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config()?;
    init_telemetry(&config.observability)?;

    let json = cli.json;
    let operation = operation_name(&cli.command);
    let span = create_operation_span(operation, &config.identity.actor_id, &generate_correlation_id());

    tokio::runtime::Runtime::new()?.block_on(run(cli.command, config, json).instrument(span))
}

fn operation_name(command: &Commands) -> &'static str {
    match command {
        Commands::Init => "init",
        Commands::Stages => "stages",
        Commands::Sla { .. } => "sla",
        Commands::Project { .. } => "project",
        Commands::Board { .. } => "board",
        Commands::Advance { .. } => "advance",
        Commands::Split { .. } => "split",
        Commands::Notes { .. } => "notes",
        Commands::Note { .. } => "note",
        Commands::Client { .. } => "client",
        Commands::Environment { .. } => "environment",
        Commands::FactoryPart { .. } => "factory_part",
        Commands::History { .. } => "history",
        Commands::Config { .. } => "config",
    }
}

async fn run(command: Commands, config: &FluxoConfig, json: bool) -> Result<()> {
    match command {
        Commands::Init => InitCommand::new().with_json(json).execute(config).await,
        Commands::Stages => StagesCommand::new(json).execute(config).await,
        Commands::Sla { code, days } => SlaCommand::new(code, days, json).execute(config).await,
        Commands::Project { command } => match command {
            ProjectCommands::Create {
                client,
                phone,
                email,
                address,
                origin,
                seller,
                environments,
            } => {
                let client = NewClient {
                    name: client,
                    phone,
                    email,
                    address,
                    origin,
                    salesperson: Some(seller.clone()),
                    ..Default::default()
                };
                CreateProjectCommand::new(client, seller, environments, json)
                    .execute(config)
                    .await
            }
            ProjectCommands::Show { project } => {
                ShowProjectCommand::new(project, json).execute(config).await
            }
            ProjectCommands::List => ListProjectsCommand::new(json).execute(config).await,
        },
        Commands::Board { project } => BoardCommand::new(project, json).execute(config).await,
        Commands::Advance { batch } => AdvanceCommand::new(batch, json).execute(config).await,
        Commands::Split {
            batch,
            environments,
        } => SplitCommand::new(batch, environments, json).execute(config).await,
        Commands::Notes { project } => NotesCommand::new(project, json).execute(config).await,
        Commands::Note { project, content } => {
            NoteCommand::new(project, content, json).execute(config).await
        }
        Commands::Client { project, fields } => {
            ClientCommand::new(project, &fields, json).execute(config).await
        }
        Commands::Environment {
            environment,
            fields,
        } => {
            EnvironmentCommand::new(environment, &fields, json)
                .execute(config)
                .await
        }
        Commands::FactoryPart {
            project,
            environment,
            description,
        } => {
            FactoryPartCommand::new(project, environment, description, json)
                .execute(config)
                .await
        }
        Commands::History { project } => HistoryCommand::new(project, json).execute(config).await,
        Commands::Config { write } => ConfigCommand::new(write, json).execute(config),
    }
}
