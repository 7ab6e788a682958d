use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::Store;
use crate::error::BoardResult;
use crate::model::*;

#[derive(Debug, Default)]
struct Tables {
    workspaces: Vec<Workspace>,
    agents: Vec<Agent>,
    tasks: Vec<Task>,
    messages: Vec<Message>,
    notifications: Vec<Notification>,
    activities: Vec<Activity>,
    run_requests: Vec<RunRequest>,
}

/// In-process store. Rows live in insertion-ordered vectors so that ties on
/// timestamps resolve the same way the SQLite store resolves them by rowid.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn replace<T: Clone>(rows: &mut [T], row: &T, same: impl Fn(&T) -> bool) {
    if let Some(existing) = rows.iter_mut().find(|r| same(r)) {
        *existing = row.clone();
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_workspace(&self, workspace: &Workspace) -> BoardResult<()> {
        self.tables.write().await.workspaces.push(workspace.clone());
        Ok(())
    }

    async fn get_workspace(&self, id: WorkspaceId) -> BoardResult<Option<Workspace>> {
        let tables = self.tables.read().await;
        Ok(tables.workspaces.iter().find(|w| w.id == id).cloned())
    }

    async fn workspace_by_slug(&self, slug: &str) -> BoardResult<Option<Workspace>> {
        let tables = self.tables.read().await;
        Ok(tables.workspaces.iter().find(|w| w.slug == slug).cloned())
    }

    async fn list_workspaces(&self) -> BoardResult<Vec<Workspace>> {
        let mut rows = self.tables.read().await.workspaces.clone();
        rows.reverse();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows)
    }

    async fn upsert_agent(&self, agent: &Agent) -> BoardResult<()> {
        let mut tables = self.tables.write().await;
        if tables.agents.iter().any(|a| a.id == agent.id) {
            replace(&mut tables.agents, agent, |a| a.id == agent.id);
        } else {
            tables.agents.push(agent.clone());
        }
        Ok(())
    }

    async fn get_agent(&self, id: AgentId) -> BoardResult<Option<Agent>> {
        let tables = self.tables.read().await;
        Ok(tables.agents.iter().find(|a| a.id == id).cloned())
    }

    async fn list_agents(&self, workspace: WorkspaceId) -> BoardResult<Vec<Agent>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Agent> = tables
            .agents
            .iter()
            .filter(|a| a.workspace_id == workspace)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn insert_task(&self, task: &Task) -> BoardResult<()> {
        self.tables.write().await.tasks.push(task.clone());
        Ok(())
    }

    async fn update_task(&self, task: &Task) -> BoardResult<()> {
        let mut tables = self.tables.write().await;
        replace(&mut tables.tasks, task, |t| t.id == task.id);
        Ok(())
    }

    async fn get_task(&self, id: TaskId) -> BoardResult<Option<Task>> {
        let tables = self.tables.read().await;
        Ok(tables.tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn list_tasks(&self, workspace: WorkspaceId) -> BoardResult<Vec<Task>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Task> = tables
            .tasks
            .iter()
            .rev()
            .filter(|t| t.workspace_id == workspace)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows)
    }

    async fn delete_task(&self, id: TaskId) -> BoardResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.tasks.len();
        tables.tasks.retain(|t| t.id != id);
        let removed = tables.tasks.len() != before;
        if removed {
            tables.messages.retain(|m| m.task_id != id);
        }
        Ok(removed)
    }

    async fn insert_message(&self, message: &Message) -> BoardResult<()> {
        self.tables.write().await.messages.push(message.clone());
        Ok(())
    }

    async fn list_messages(&self, task: TaskId) -> BoardResult<Vec<Message>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| m.task_id == task)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    async fn insert_notification(&self, notification: &Notification) -> BoardResult<()> {
        self.tables
            .write()
            .await
            .notifications
            .push(notification.clone());
        Ok(())
    }

    async fn get_notification(&self, id: NotificationId) -> BoardResult<Option<Notification>> {
        let tables = self.tables.read().await;
        Ok(tables.notifications.iter().find(|n| n.id == id).cloned())
    }

    async fn mark_notification_delivered(&self, id: NotificationId) -> BoardResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(n) = tables.notifications.iter_mut().find(|n| n.id == id) {
            n.delivered = true;
        }
        Ok(())
    }

    async fn list_notifications(
        &self,
        workspace: WorkspaceId,
        agent: Option<AgentId>,
    ) -> BoardResult<Vec<Notification>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Notification> = tables
            .notifications
            .iter()
            .rev()
            .filter(|n| n.workspace_id == workspace)
            .filter(|n| agent.map_or(true, |a| n.agent_id == a))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert_activity(&self, activity: &Activity) -> BoardResult<()> {
        self.tables.write().await.activities.push(activity.clone());
        Ok(())
    }

    async fn recent_activities(
        &self,
        workspace: WorkspaceId,
        limit: usize,
    ) -> BoardResult<Vec<Activity>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Activity> = tables
            .activities
            .iter()
            .rev()
            .filter(|a| a.workspace_id == workspace)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn insert_run_request(&self, request: &RunRequest) -> BoardResult<()> {
        self.tables.write().await.run_requests.push(request.clone());
        Ok(())
    }

    async fn update_run_request(&self, request: &RunRequest) -> BoardResult<()> {
        let mut tables = self.tables.write().await;
        replace(&mut tables.run_requests, request, |r| r.id == request.id);
        Ok(())
    }

    async fn get_run_request(&self, id: RunRequestId) -> BoardResult<Option<RunRequest>> {
        let tables = self.tables.read().await;
        Ok(tables.run_requests.iter().find(|r| r.id == id).cloned())
    }

    async fn pending_run_requests(
        &self,
        workspace: Option<WorkspaceId>,
        limit: usize,
    ) -> BoardResult<Vec<RunRequest>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<RunRequest> = tables
            .run_requests
            .iter()
            .filter(|r| r.status == RunStatus::Pending)
            .filter(|r| workspace.map_or(true, |w| r.workspace_id == w))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn run_requests_for_agent(
        &self,
        workspace: WorkspaceId,
        agent: AgentId,
        limit: usize,
    ) -> BoardResult<Vec<RunRequest>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<RunRequest> = tables
            .run_requests
            .iter()
            .rev()
            .filter(|r| r.workspace_id == workspace && r.agent_id == agent)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        Ok(rows)
    }
}
