//! Persistence seam for the board.
//!
//! Every operation is a single-document read or write; the engine sequences
//! writes to keep multi-document updates consistent. Tenant checks happen in
//! the engine, not here.

pub mod memory;
#[cfg(feature = "database")]
pub mod sqlite;

use async_trait::async_trait;

use crate::error::BoardResult;
use crate::model::*;

pub use memory::MemoryStore;
#[cfg(feature = "database")]
pub use sqlite::SqliteStore;

#[async_trait]
pub trait Store: Send + Sync {
    // Workspaces
    async fn insert_workspace(&self, workspace: &Workspace) -> BoardResult<()>;
    async fn get_workspace(&self, id: WorkspaceId) -> BoardResult<Option<Workspace>>;
    async fn workspace_by_slug(&self, slug: &str) -> BoardResult<Option<Workspace>>;
    /// Most recently updated first
    async fn list_workspaces(&self) -> BoardResult<Vec<Workspace>>;

    // Agents
    async fn upsert_agent(&self, agent: &Agent) -> BoardResult<()>;
    async fn get_agent(&self, id: AgentId) -> BoardResult<Option<Agent>>;
    /// Ordered by name
    async fn list_agents(&self, workspace: WorkspaceId) -> BoardResult<Vec<Agent>>;

    // Tasks
    async fn insert_task(&self, task: &Task) -> BoardResult<()>;
    /// Full replace, last write wins
    async fn update_task(&self, task: &Task) -> BoardResult<()>;
    async fn get_task(&self, id: TaskId) -> BoardResult<Option<Task>>;
    /// Most recently updated first
    async fn list_tasks(&self, workspace: WorkspaceId) -> BoardResult<Vec<Task>>;
    /// Removes the task and its messages. Returns false if it did not exist.
    async fn delete_task(&self, id: TaskId) -> BoardResult<bool>;

    // Messages
    async fn insert_message(&self, message: &Message) -> BoardResult<()>;
    /// Oldest first
    async fn list_messages(&self, task: TaskId) -> BoardResult<Vec<Message>>;

    // Notifications
    async fn insert_notification(&self, notification: &Notification) -> BoardResult<()>;
    async fn get_notification(&self, id: NotificationId) -> BoardResult<Option<Notification>>;
    async fn mark_notification_delivered(&self, id: NotificationId) -> BoardResult<()>;
    /// Newest first
    async fn list_notifications(
        &self,
        workspace: WorkspaceId,
        agent: Option<AgentId>,
    ) -> BoardResult<Vec<Notification>>;

    // Activities
    async fn insert_activity(&self, activity: &Activity) -> BoardResult<()>;
    /// Newest first, at most `limit` entries
    async fn recent_activities(
        &self,
        workspace: WorkspaceId,
        limit: usize,
    ) -> BoardResult<Vec<Activity>>;

    // Run requests
    async fn insert_run_request(&self, request: &RunRequest) -> BoardResult<()>;
    async fn update_run_request(&self, request: &RunRequest) -> BoardResult<()>;
    async fn get_run_request(&self, id: RunRequestId) -> BoardResult<Option<RunRequest>>;
    /// Pending requests, oldest first (insertion order breaks ties)
    async fn pending_run_requests(
        &self,
        workspace: Option<WorkspaceId>,
        limit: usize,
    ) -> BoardResult<Vec<RunRequest>>;
    /// Newest first
    async fn run_requests_for_agent(
        &self,
        workspace: WorkspaceId,
        agent: AgentId,
        limit: usize,
    ) -> BoardResult<Vec<RunRequest>>;
}
