use chrono::Duration;
use std::collections::HashMap;
use std::fmt::Write as _;

use super::CoordinatorPolicy;
use crate::board::Board;
use crate::clock::minutes_between;
use crate::error::BoardResult;
use crate::model::{Activity, Agent, AgentId, Task, TaskStatus, Workspace, WorkspaceId};

const TASK_SCAN: usize = 500;

#[derive(Debug, Clone)]
pub struct AgentLoad {
    pub agent: Agent,
    /// Non-done tasks the agent is assigned to
    pub load: usize,
}

#[derive(Debug, Clone)]
pub struct TaskView {
    pub task: Task,
    pub assignees: Vec<String>,
    pub age_minutes: i64,
    pub idle_minutes: i64,
}

/// What a coordinator sees of its workspace
#[derive(Debug, Clone)]
pub struct BoardSnapshot {
    pub workspace: Workspace,
    pub agents: Vec<AgentLoad>,
    pub tasks: Vec<TaskView>,
    pub activity: Vec<Activity>,
}

impl BoardSnapshot {
    /// Open tasks plus tasks finished within the done window, newest first
    pub async fn capture(
        board: &Board,
        workspace: WorkspaceId,
        policy: &CoordinatorPolicy,
    ) -> BoardResult<Self> {
        let ws = board.workspaces().get(workspace).await?;
        let now = board.clock().now();
        let done_cutoff = now - Duration::hours(policy.done_window_hours);

        let agents = board.agents().list(workspace).await?;
        let names: HashMap<AgentId, String> =
            agents.iter().map(|a| (a.id, a.name.clone())).collect();

        let tasks: Vec<Task> = board
            .store()
            .list_tasks(workspace)
            .await?
            .into_iter()
            .take(TASK_SCAN)
            .filter(|t| t.status != TaskStatus::Done || t.updated_at > done_cutoff)
            .collect();

        let mut load: HashMap<AgentId, usize> = HashMap::new();
        for task in tasks.iter().filter(|t| t.status != TaskStatus::Done) {
            for id in &task.assignee_ids {
                *load.entry(*id).or_default() += 1;
            }
        }

        let activity = board
            .activity()
            .recent(workspace, policy.activity_window)
            .await?;

        Ok(Self {
            workspace: ws,
            agents: agents
                .into_iter()
                .map(|agent| AgentLoad {
                    load: load.get(&agent.id).copied().unwrap_or(0),
                    agent,
                })
                .collect(),
            tasks: tasks
                .into_iter()
                .map(|task| {
                    let mut assignees: Vec<String> = task
                        .assignee_ids
                        .iter()
                        .map(|id| names.get(id).cloned().unwrap_or_else(|| id.to_string()))
                        .collect();
                    assignees.sort();
                    TaskView {
                        age_minutes: minutes_between(task.created_at, now),
                        idle_minutes: minutes_between(task.updated_at, now),
                        assignees,
                        task,
                    }
                })
                .collect(),
            activity,
        })
    }

    pub fn render_prompt(&self, coordinator: &Agent, policy: &CoordinatorPolicy) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "You are {}, the coordinator ({}) of workspace \"{}\".",
            coordinator.name, coordinator.role, self.workspace.name
        );
        if let Some(notes) = coordinator.prompt.as_deref().filter(|p| !p.trim().is_empty()) {
            let _ = writeln!(out, "\nNotes:\n{}", notes.trim());
        }

        let _ = writeln!(out, "\n## Agents");
        for AgentLoad { agent, load } in &self.agents {
            let tags = if agent.tags.is_empty() {
                String::new()
            } else {
                format!(" tags={}", agent.tags.join(","))
            };
            let _ = writeln!(
                out,
                "- {} id={} level={} status={} role=\"{}\" open_tasks={}{}",
                agent.name, agent.id, agent.level, agent.status, agent.role, load, tags
            );
        }

        let _ = writeln!(out, "\n## Tasks");
        if self.tasks.is_empty() {
            let _ = writeln!(out, "(none)");
        }
        for view in &self.tasks {
            let task = &view.task;
            let assignees = if view.assignees.is_empty() {
                "unassigned".to_string()
            } else {
                view.assignees.join(", ")
            };
            let priority = task.priority.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "- [{}] \"{}\" id={} priority={} assignees={} age={}m idle={}m",
                task.status, task.title, task.id, priority, assignees, view.age_minutes, view.idle_minutes
            );
        }

        let _ = writeln!(out, "\n## Recent activity");
        for activity in &self.activity {
            let _ = writeln!(
                out,
                "- {} [{}] {}",
                activity.created_at.format("%Y-%m-%d %H:%M"),
                activity.kind,
                activity.message
            );
        }

        let _ = write!(
            out,
            "\n## Instructions\n\
             Decide what should happen next. Emit one line per action:\n\
             ACTION: ASSIGN | taskId=<id> | agentName=<name>\n\
             ACTION: CREATE | title=<title> | description=<text> | tags=<a,b> | priority=<low|medium|high>\n\
             ACTION: REASSIGN | taskId=<id> | fromAgent=<name> | toAgent=<name>\n\
             ACTION: TRIGGER | agentName=<name>\n\
             ACTION: STATUS | taskId=<id> | status=<inbox|assigned|in_progress|review|done|blocked>\n\
             At most {} actions and {} CREATE actions are applied; extra lines are skipped.\n",
            policy.max_actions, policy.max_creates
        );
        out
    }
}
