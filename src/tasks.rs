//! Task store and state machine.
//!
//! Every mutation loads the task, checks the workspace, writes the whole
//! record back with a strictly later `updated_at`, then appends its activity
//! entries. Writes are sequenced, not transactional: a crash between the task
//! write and the activity insert leaves the task updated without its log line.

use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::board::Board;
use crate::clock::{bump, stamp};
use crate::error::{BoardError, BoardResult};
use crate::model::{
    ActivityKind, Actor, Agent, AgentId, AgentLevel, AgentStatus, Task, TaskId, TaskStatus,
    WorkspaceId,
};
use crate::priority::Priority;

pub const DEFAULT_LIST_LIMIT: usize = 200;
pub const MAX_LIST_LIMIT: usize = 500;

#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub priority: Option<Priority>,
    /// Defaults to `inbox`
    pub status: Option<TaskStatus>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub assignee: Option<AgentId>,
    pub limit: Option<usize>,
}

pub struct TaskBoard<'a> {
    board: &'a Board,
}

impl Board {
    pub fn tasks(&self) -> TaskBoard<'_> {
        TaskBoard { board: self }
    }
}

fn clean_tags(tags: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Active LEAD first, otherwise the first active agent
fn pick_auto_assignee(agents: &[Agent]) -> Option<&Agent> {
    let active = || agents.iter().filter(|a| a.status == AgentStatus::Active);
    active()
        .find(|a| a.level == AgentLevel::Lead)
        .or_else(|| active().next())
}

impl TaskBoard<'_> {
    pub async fn create(&self, workspace: WorkspaceId, new: NewTask, actor: &Actor) -> BoardResult<Task> {
        self.board.workspaces().get(workspace).await?;

        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(BoardError::Validation("task title cannot be empty".to_string()));
        }

        let now = stamp(self.board.clock());
        let task = Task {
            id: TaskId::new(),
            workspace_id: workspace,
            title,
            description: new
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            status: new.status.unwrap_or(TaskStatus::Inbox),
            tags: clean_tags(&new.tags),
            priority: new.priority,
            assignee_ids: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        };
        self.board.store().insert_task(&task).await?;

        self.board
            .activity()
            .record(
                workspace,
                ActivityKind::TaskCreated,
                format!("Task created: {}", task.title),
                actor.agent_id(),
            )
            .await?;

        info!(task_id = %task.id, status = %task.status, "Task created");
        Ok(task)
    }

    /// Fetch a task, enforcing that it belongs to `workspace`
    pub async fn get(&self, workspace: WorkspaceId, id: TaskId) -> BoardResult<Task> {
        let task = self
            .board
            .store()
            .get_task(id)
            .await?
            .ok_or_else(|| BoardError::not_found("task", id))?;
        if task.workspace_id != workspace {
            return Err(BoardError::wrong_tenant("task", id));
        }
        Ok(task)
    }

    /// Most recently updated first
    pub async fn list(&self, workspace: WorkspaceId, filter: &TaskFilter) -> BoardResult<Vec<Task>> {
        let limit = filter
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);
        Ok(self
            .board
            .store()
            .list_tasks(workspace)
            .await?
            .into_iter()
            .filter(|t| filter.status.map_or(true, |s| t.status == s))
            .filter(|t| filter.assignee.map_or(true, |a| t.assignee_ids.contains(&a)))
            .take(limit)
            .collect())
    }

    /// Move a task to `status`. Leaving `done` is refused. Moving an
    /// unassigned task to `assigned` picks an assignee automatically.
    pub async fn transition(
        &self,
        workspace: WorkspaceId,
        id: TaskId,
        status: TaskStatus,
        actor: &Actor,
    ) -> BoardResult<Task> {
        let mut task = self.get(workspace, id).await?;
        if !task.status.can_transition_to(status) {
            return Err(BoardError::PolicyViolation(format!(
                "task {id} is {} and cannot move to {status}",
                task.status
            )));
        }

        let from = task.status;
        task.status = status;
        task.updated_at = bump(self.board.clock(), task.updated_at);
        self.board.store().update_task(&task).await?;

        let actor_name = self.board.agents().display_name(actor).await?;
        self.board
            .activity()
            .record(
                workspace,
                ActivityKind::TaskStatus,
                format!("{actor_name} moved “{}” to {status}", task.title),
                actor.agent_id(),
            )
            .await?;
        info!(task_id = %id, from = %from, to = %status, actor = %actor_name, "Task transitioned");

        if status == TaskStatus::Assigned && task.assignee_ids.is_empty() {
            let agents = self.board.agents().list(workspace).await?;
            match pick_auto_assignee(&agents) {
                Some(agent) => {
                    debug!(task_id = %id, agent = %agent.name, "Auto-assigning task");
                    return self.set_assignees(workspace, id, [agent.id], actor).await;
                }
                None => debug!(task_id = %id, "No active agent to auto-assign"),
            }
        }

        Ok(task)
    }

    /// Replace the assignee set. An `inbox` task that gains assignees moves to
    /// `assigned` in the same write.
    pub async fn set_assignees(
        &self,
        workspace: WorkspaceId,
        id: TaskId,
        assignees: impl IntoIterator<Item = AgentId>,
        actor: &Actor,
    ) -> BoardResult<Task> {
        let mut task = self.get(workspace, id).await?;

        let assignee_ids: BTreeSet<AgentId> = assignees.into_iter().collect();
        let mut names = Vec::with_capacity(assignee_ids.len());
        for agent_id in &assignee_ids {
            names.push(self.board.agents().get(workspace, *agent_id).await?.name);
        }
        names.sort();

        let promoted = task.status == TaskStatus::Inbox && !assignee_ids.is_empty();
        task.assignee_ids = assignee_ids;
        if promoted {
            task.status = TaskStatus::Assigned;
        }
        task.updated_at = bump(self.board.clock(), task.updated_at);
        self.board.store().update_task(&task).await?;

        let actor_name = self.board.agents().display_name(actor).await?;
        let message = if names.is_empty() {
            format!("{actor_name} cleared assignees on “{}”", task.title)
        } else {
            format!("{actor_name} assigned “{}” to {}", task.title, names.join(", "))
        };
        let log = self.board.activity();
        log.record(workspace, ActivityKind::TaskAssignees, message, actor.agent_id())
            .await?;
        if promoted {
            log.record(
                workspace,
                ActivityKind::TaskStatus,
                format!("{actor_name} moved “{}” to {}", task.title, TaskStatus::Assigned),
                actor.agent_id(),
            )
            .await?;
        }

        info!(task_id = %id, assignees = ?names, promoted, "Task assignees set");
        Ok(task)
    }

    /// Add one assignee. Already present is a no-op with no write.
    pub async fn assign(
        &self,
        workspace: WorkspaceId,
        id: TaskId,
        agent: AgentId,
        actor: &Actor,
    ) -> BoardResult<Task> {
        let task = self.get(workspace, id).await?;
        if task.assignee_ids.contains(&agent) {
            return Ok(task);
        }
        let mut next = task.assignee_ids.clone();
        next.insert(agent);
        self.set_assignees(workspace, id, next, actor).await
    }

    /// Remove one assignee. Already absent is a no-op with no write.
    pub async fn unassign(
        &self,
        workspace: WorkspaceId,
        id: TaskId,
        agent: AgentId,
        actor: &Actor,
    ) -> BoardResult<Task> {
        let task = self.get(workspace, id).await?;
        if !task.assignee_ids.contains(&agent) {
            return Ok(task);
        }
        let mut next = task.assignee_ids.clone();
        next.remove(&agent);
        self.set_assignees(workspace, id, next, actor).await
    }

    /// Give `agent` the highest-priority, oldest unassigned inbox task. When
    /// the agent has routing tags only tasks sharing one of them qualify.
    pub async fn claim_unassigned(
        &self,
        workspace: WorkspaceId,
        agent: AgentId,
    ) -> BoardResult<Option<Task>> {
        let agent = self.board.agents().get(workspace, agent).await?;
        let agent_tags: BTreeSet<String> = agent.tags.iter().map(|t| t.to_lowercase()).collect();

        let candidate = self
            .board
            .store()
            .list_tasks(workspace)
            .await?
            .into_iter()
            .filter(|t| t.status == TaskStatus::Inbox && t.assignee_ids.is_empty())
            .filter(|t| {
                agent_tags.is_empty()
                    || t.tags.iter().any(|tag| agent_tags.contains(&tag.to_lowercase()))
            })
            .min_by(|a, b| {
                Priority::weight(b.priority)
                    .cmp(&Priority::weight(a.priority))
                    .then(a.created_at.cmp(&b.created_at))
            });

        match candidate {
            Some(task) => {
                let claimed = self
                    .set_assignees(workspace, task.id, [agent.id], &Actor::agent(agent.id))
                    .await?;
                info!(task_id = %claimed.id, agent = %agent.name, "Task claimed");
                Ok(Some(claimed))
            }
            None => Ok(None),
        }
    }

    /// Repair pass: `inbox` tasks that already have assignees move to
    /// `assigned`. Returns how many were changed.
    pub async fn normalize_assigned(&self, workspace: WorkspaceId) -> BoardResult<usize> {
        let stale: Vec<Task> = self
            .board
            .store()
            .list_tasks(workspace)
            .await?
            .into_iter()
            .filter(|t| t.status == TaskStatus::Inbox && !t.assignee_ids.is_empty())
            .collect();

        for mut task in stale.iter().cloned() {
            task.status = TaskStatus::Assigned;
            task.updated_at = bump(self.board.clock(), task.updated_at);
            self.board.store().update_task(&task).await?;
        }

        if !stale.is_empty() {
            self.board
                .activity()
                .record(
                    workspace,
                    ActivityKind::Migration,
                    format!("Normalized {} assigned inbox task(s)", stale.len()),
                    None,
                )
                .await?;
        }
        Ok(stale.len())
    }

    /// Administrative hard delete of a task and its messages
    pub async fn purge(&self, workspace: WorkspaceId, id: TaskId) -> BoardResult<Task> {
        let task = self.get(workspace, id).await?;
        self.board.store().delete_task(id).await?;
        self.board
            .activity()
            .record(
                workspace,
                ActivityKind::Other("task_purged".to_string()),
                format!("Task purged: {}", task.title),
                None,
            )
            .await?;
        info!(task_id = %id, "Task purged");
        Ok(task)
    }
}
