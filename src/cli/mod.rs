use clap::{Args, Parser, Subcommand};

pub mod commands;

#[derive(Parser)]
#[command(name = "missionctl")]
#[command(about = "Multi-tenant task board and orchestration engine for AI agents")]
#[command(long_about = "Mission Control keeps a shared task board per workspace, routes work to agents, \
                       and drains queued run requests through agent executors and coordinators. \
                       Start with 'missionctl workspace create' and 'missionctl agent upsert'.")]
pub struct Cli {
    /// Workspace slug for workspace-scoped commands
    #[arg(long, global = true, env = "WORKSPACE_SLUG")]
    pub workspace: Option<String>,

    /// Database URL or file path, overriding configuration
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create and list workspaces
    Workspace {
        #[command(subcommand)]
        action: WorkspaceAction,
    },
    /// Register agents and change their status
    Agent {
        #[command(subcommand)]
        action: AgentAction,
    },
    /// Board-wide task queries and maintenance
    Tasks {
        #[command(subcommand)]
        action: TasksAction,
    },
    /// Work with a single task
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Post to a task thread
    Message {
        #[command(subcommand)]
        action: MessageAction,
    },
    /// Mention notifications for agents
    Notifications {
        #[command(subcommand)]
        action: NotificationAction,
    },
    /// Queue and inspect agent run requests
    Run {
        #[command(subcommand)]
        action: RunAction,
    },
    /// Per-agent digest of recent activity
    Standup {
        /// Hours to look back (1-168)
        #[arg(long)]
        hours: Option<i64>,
    },
    /// Latest activity in the workspace
    Feed {
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Drain pending run requests until interrupted
    Poll {
        /// Process one batch and exit
        #[arg(long)]
        once: bool,
    },
}

#[derive(Subcommand)]
pub enum WorkspaceAction {
    Create {
        name: String,
        #[arg(long)]
        slug: Option<String>,
    },
    List,
}

#[derive(Subcommand)]
pub enum AgentAction {
    /// Create or update an agent
    Upsert(AgentUpsertArgs),
    /// Set an agent's status (idle, active, blocked)
    Status { agent: String, status: String },
    List,
}

#[derive(Args)]
pub struct AgentUpsertArgs {
    /// Existing agent id to update
    #[arg(long)]
    pub id: Option<String>,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub role: String,
    /// COORD, LEAD, SPC or INT
    #[arg(long, default_value = "SPC")]
    pub level: String,
    #[arg(long)]
    pub status: Option<String>,
    /// Standing instructions included in every prompt
    #[arg(long)]
    pub prompt: Option<String>,
    /// Comma-separated routing tags
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,
}

#[derive(Subcommand)]
pub enum TasksAction {
    List {
        #[arg(long)]
        status: Option<String>,
        /// Agent name or id
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Move inbox tasks that already have assignees to assigned
    Normalize,
}

#[derive(Subcommand)]
pub enum TaskAction {
    Create {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    Get {
        id: String,
    },
    Messages {
        id: String,
    },
    Status {
        id: String,
        status: String,
        /// Act as this agent instead of the operator
        #[arg(long = "as")]
        as_agent: Option<String>,
    },
    Assign {
        id: String,
        agent: String,
    },
    Unassign {
        id: String,
        agent: String,
    },
    /// Give an agent the best unassigned inbox task
    Claim {
        agent: String,
    },
    /// Delete a task and its thread
    Purge {
        id: String,
    },
}

#[derive(Subcommand)]
pub enum MessageAction {
    Post {
        task: String,
        content: String,
        /// Post as this agent instead of the operator
        #[arg(long = "as")]
        as_agent: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum NotificationAction {
    List {
        agent: String,
        /// Include delivered notifications
        #[arg(long)]
        all: bool,
        #[arg(long)]
        limit: Option<usize>,
    },
    Deliver {
        id: String,
    },
}

#[derive(Subcommand)]
pub enum RunAction {
    Enqueue {
        agent: String,
    },
    Pending {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Mark every pending request of the workspace done
    Clear,
}
