use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use std::sync::Arc;

use crate::board::Board;
use crate::cli::{Cli, Commands};
use crate::clock::SystemClock;
use crate::config::MissionControlConfig;
use crate::model::{Actor, Agent, Workspace};

pub mod agent;
pub mod digest;
pub mod message;
pub mod notifications;
pub mod poll;
pub mod run;
pub mod task;
pub mod workspace;

/// Shared state for one CLI invocation
pub struct CliContext {
    pub board: Board,
    pub config: MissionControlConfig,
    pub json: bool,
    workspace_slug: Option<String>,
}

impl CliContext {
    pub async fn open(cli: &Cli, mut config: MissionControlConfig) -> Result<Self> {
        if let Some(url) = &cli.database {
            config.database.url = url.clone();
        }
        let board = open_board(&config).await?;
        Ok(Self {
            board,
            config,
            json: cli.json,
            workspace_slug: cli.workspace.clone(),
        })
    }

    /// The workspace named by `--workspace` or `WORKSPACE_SLUG`
    pub async fn workspace(&self) -> Result<Workspace> {
        let slug = self
            .workspace_slug
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("No workspace selected: pass --workspace <slug> or set WORKSPACE_SLUG"))?;
        Ok(self.board.workspaces().by_slug(slug).await?)
    }

    /// Agent by id or case-insensitive name
    pub async fn agent(&self, workspace: &Workspace, reference: &str) -> Result<Agent> {
        self.board
            .agents()
            .resolve(workspace.id, reference)
            .await?
            .ok_or_else(|| anyhow!("Agent not found: {reference}"))
    }

    /// `--as <agent>` when given, otherwise the operator running the CLI
    pub async fn actor(&self, workspace: &Workspace, as_agent: Option<&str>) -> Result<Actor> {
        match as_agent {
            Some(reference) => Ok(Actor::agent(self.agent(workspace, reference).await?.id)),
            None => Ok(Actor::human(operator_name())),
        }
    }

    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

fn operator_name() -> String {
    std::env::var("USER")
        .ok()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| "Operator".to_string())
}

#[cfg(feature = "database")]
async fn open_board(config: &MissionControlConfig) -> Result<Board> {
    use crate::store::SqliteStore;

    let url = sqlite_url(&config.database.url);
    let store = SqliteStore::connect(&url, config.database.max_connections, config.database.auto_migrate)
        .await
        .with_context(|| format!("Failed to open database {url}"))?;
    Ok(Board::new(Arc::new(store), Arc::new(SystemClock)))
}

#[cfg(not(feature = "database"))]
async fn open_board(_config: &MissionControlConfig) -> Result<Board> {
    use crate::store::MemoryStore;

    tracing::warn!("Built without the database feature; using an in-memory board");
    Ok(Board::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock)))
}

/// Plain paths become `sqlite://` URLs that create the file on first use
pub fn sqlite_url(raw: &str) -> String {
    if raw.starts_with("sqlite:") {
        raw.to_string()
    } else {
        format!("sqlite://{raw}?mode=rwc")
    }
}

pub async fn execute(cli: Cli, config: MissionControlConfig) -> Result<()> {
    let Some(command) = &cli.command else {
        show_how_to_get_started();
        return Ok(());
    };
    let ctx = CliContext::open(&cli, config).await?;

    match command {
        Commands::Workspace { action } => workspace::WorkspaceCommand::new(action).execute(&ctx).await,
        Commands::Agent { action } => agent::AgentCommand::new(action).execute(&ctx).await,
        Commands::Tasks { action } => task::TasksCommand::new(action).execute(&ctx).await,
        Commands::Task { action } => task::TaskCommand::new(action).execute(&ctx).await,
        Commands::Message { action } => message::MessageCommand::new(action).execute(&ctx).await,
        Commands::Notifications { action } => {
            notifications::NotificationsCommand::new(action).execute(&ctx).await
        }
        Commands::Run { action } => run::RunCommand::new(action).execute(&ctx).await,
        Commands::Standup { hours } => digest::StandupCommand { hours: *hours }.execute(&ctx).await,
        Commands::Feed { limit } => digest::FeedCommand { limit: *limit }.execute(&ctx).await,
        Commands::Poll { once } => poll::PollCommand { once: *once }.execute(&ctx).await,
    }
}

pub fn show_how_to_get_started() {
    println!("🛰️  Mission Control - task orchestration for AI agents");
    println!();
    println!("To get started:");
    println!("  🏗️  missionctl workspace create \"Default\"");
    println!("  🤖 missionctl --workspace default agent upsert --name Jarvis --role Coordinator --level COORD");
    println!("  📋 missionctl --workspace default task create \"First task\"");
    println!("  🔁 missionctl poll");
    println!();
    println!("💡 Set WORKSPACE_SLUG to skip --workspace on every command");
}

/// Fail with a readable message when `value` does not parse
pub fn parse_arg<T>(value: &str, what: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value.parse::<T>() {
        Ok(parsed) => Ok(parsed),
        Err(e) => bail!("Invalid {what} '{value}': {e}"),
    }
}
