// Board data model: workspaces, agents, tasks, messages, notifications,
// activities and run requests. Every record carries its workspace id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::BoardError;
use crate::priority::Priority;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $entity:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = BoardError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| BoardError::not_found($entity, s.trim()))
            }
        }
    };
}

define_id!(
    /// Tenant identifier
    WorkspaceId,
    "workspace"
);
define_id!(AgentId, "agent");
define_id!(TaskId, "task");
define_id!(MessageId, "message");
define_id!(NotificationId, "notification");
define_id!(ActivityId, "activity");
define_id!(RunRequestId, "run request");

/// Isolation boundary. Everything else belongs to exactly one workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle position of a task on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Inbox,
    Assigned,
    InProgress,
    Review,
    Done,
    Blocked,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Inbox,
        TaskStatus::Assigned,
        TaskStatus::InProgress,
        TaskStatus::Review,
        TaskStatus::Done,
        TaskStatus::Blocked,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Inbox => "inbox",
            TaskStatus::Assigned => "assigned",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
        }
    }

    /// Statuses an agent can still be working in
    pub fn is_active(self) -> bool {
        matches!(
            self,
            TaskStatus::Assigned | TaskStatus::InProgress | TaskStatus::Review
        )
    }

    /// Board-level transition rule. `done` is terminal; every other status
    /// may move anywhere, which covers the forward chain, `blocked` from any
    /// non-terminal state and recovery from `blocked`.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        self != TaskStatus::Done || next == TaskStatus::Done
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| BoardError::Validation(format!("invalid task status '{}'", s.trim())))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub workspace_id: WorkspaceId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub tags: Vec<String>,
    pub priority: Option<Priority>,
    pub assignee_ids: BTreeSet<AgentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Agent privilege level. `Coord` agents run the action interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentLevel {
    #[serde(rename = "COORD")]
    Coord,
    #[serde(rename = "LEAD")]
    Lead,
    #[serde(rename = "SPC")]
    Spc,
    #[serde(rename = "INT")]
    Int,
}

impl AgentLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentLevel::Coord => "COORD",
            AgentLevel::Lead => "LEAD",
            AgentLevel::Spc => "SPC",
            AgentLevel::Int => "INT",
        }
    }
}

impl fmt::Display for AgentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AgentLevel {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COORD" => Ok(AgentLevel::Coord),
            "LEAD" => Ok(AgentLevel::Lead),
            "SPC" => Ok(AgentLevel::Spc),
            "INT" => Ok(AgentLevel::Int),
            other => Err(BoardError::Validation(format!(
                "invalid agent level '{other}' (expected COORD|LEAD|SPC|INT)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Active,
    Blocked,
}

impl AgentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Active => "active",
            AgentStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AgentStatus {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "idle" => Ok(AgentStatus::Idle),
            "active" => Ok(AgentStatus::Active),
            "blocked" => Ok(AgentStatus::Blocked),
            other => Err(BoardError::Validation(format!(
                "invalid agent status '{other}' (expected idle|active|blocked)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub role: String,
    pub level: AgentLevel,
    pub status: AgentStatus,
    pub prompt: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn is_coordinator(&self) -> bool {
        self.level == AgentLevel::Coord
    }
}

/// Who performed a mutation or authored a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    Agent { id: AgentId },
    Human { name: String },
    System,
}

impl Actor {
    pub fn agent(id: AgentId) -> Self {
        Actor::Agent { id }
    }

    pub fn human(name: impl Into<String>) -> Self {
        Actor::Human { name: name.into() }
    }

    pub fn agent_id(&self) -> Option<AgentId> {
        match self {
            Actor::Agent { id } => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub workspace_id: WorkspaceId,
    pub task_id: TaskId,
    pub author: Actor,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub workspace_id: WorkspaceId,
    pub agent_id: AgentId,
    pub content: String,
    pub delivered: bool,
    pub created_at: DateTime<Utc>,
}

/// Event log type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityKind {
    TaskCreated,
    TaskStatus,
    TaskAssignees,
    Comment,
    Heartbeat,
    Coordination,
    Migration,
    Other(String),
}

impl ActivityKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActivityKind::TaskCreated => "task_created",
            ActivityKind::TaskStatus => "task_status",
            ActivityKind::TaskAssignees => "task_assignees",
            ActivityKind::Comment => "comment",
            ActivityKind::Heartbeat => "heartbeat",
            ActivityKind::Coordination => "coordination",
            ActivityKind::Migration => "migration",
            ActivityKind::Other(other) => other,
        }
    }
}

impl From<String> for ActivityKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "task_created" => ActivityKind::TaskCreated,
            "task_status" => ActivityKind::TaskStatus,
            "task_assignees" => ActivityKind::TaskAssignees,
            "comment" => ActivityKind::Comment,
            "heartbeat" => ActivityKind::Heartbeat,
            "coordination" => ActivityKind::Coordination,
            "migration" => ActivityKind::Migration,
            _ => ActivityKind::Other(value),
        }
    }
}

impl From<ActivityKind> for String {
    fn from(kind: ActivityKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub workspace_id: WorkspaceId,
    pub kind: ActivityKind,
    pub message: String,
    pub agent_id: Option<AgentId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Done,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Done => "done",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        self != RunStatus::Pending
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(RunStatus::Pending),
            "done" => Ok(RunStatus::Done),
            "failed" => Ok(RunStatus::Failed),
            other => Err(BoardError::Validation(format!(
                "invalid run request status '{other}'"
            ))),
        }
    }
}

/// A queued instruction to tick one agent once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub id: RunRequestId,
    pub workspace_id: WorkspaceId,
    pub agent_id: AgentId,
    pub status: RunStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_parsing_normalizes_separators() {
        assert_eq!("in-progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("In Progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("REVIEW".parse::<TaskStatus>().unwrap(), TaskStatus::Review);
        assert!("shipped".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_done_is_terminal() {
        for status in TaskStatus::ALL {
            assert_eq!(
                TaskStatus::Done.can_transition_to(status),
                status == TaskStatus::Done
            );
        }
        assert!(TaskStatus::Blocked.can_transition_to(TaskStatus::InProgress));
        assert!(TaskStatus::Review.can_transition_to(TaskStatus::Blocked));
    }

    #[test]
    fn test_activity_kind_round_trips_through_strings() {
        let kind: ActivityKind = "task_status".to_string().into();
        assert_eq!(kind, ActivityKind::TaskStatus);
        let custom: ActivityKind = "deploy".to_string().into();
        assert_eq!(custom.as_str(), "deploy");

        let json = serde_json::to_string(&ActivityKind::Heartbeat).unwrap();
        assert_eq!(json, "\"heartbeat\"");
    }

    #[test]
    fn test_agent_level_serializes_uppercase() {
        let json = serde_json::to_string(&AgentLevel::Coord).unwrap();
        assert_eq!(json, "\"COORD\"");
        assert_eq!("lead".parse::<AgentLevel>().unwrap(), AgentLevel::Lead);
    }

    #[test]
    fn test_ids_reject_garbage() {
        let err = "not-a-uuid".parse::<TaskId>().unwrap_err();
        assert!(err.is_not_found());
        let id = TaskId::new();
        assert_eq!(id.to_string().parse::<TaskId>().unwrap(), id);
    }
}
