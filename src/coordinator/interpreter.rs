use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use super::actions::{parse_actions, Action};
use super::snapshot::BoardSnapshot;
use super::CoordinatorPolicy;
use crate::board::Board;
use crate::error::{BoardError, BoardResult};
use crate::generate::Generator;
use crate::model::{ActivityKind, Actor, Agent, AgentId, TaskId, TaskStatus, WorkspaceId};
use crate::priority::Priority;
use crate::tasks::NewTask;

pub const LIMIT_REACHED: &str = "limit reached";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "detail", rename_all = "snake_case")]
pub enum ActionOutcome {
    Applied(String),
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    pub action: String,
    pub outcome: ActionOutcome,
    /// Task the action refers to, or the task it created
    pub task_id: Option<TaskId>,
    /// Whether the task was changed, even if a later step failed
    pub touched: bool,
}

impl ActionResult {
    fn new(action: &Action, outcome: ActionOutcome) -> Self {
        Self {
            action: action.to_string(),
            outcome,
            task_id: action.task_ref().and_then(|t| t.parse().ok()),
            touched: false,
        }
    }

    fn skipped(action: &Action, reason: impl Into<String>) -> Self {
        Self::new(action, ActionOutcome::Skipped(reason.into()))
    }
}

impl fmt::Display for ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            ActionOutcome::Applied(detail) => write!(f, "{}: {detail}", self.action),
            ActionOutcome::Skipped(reason) => write!(f, "{}: skipped: {reason}", self.action),
            ActionOutcome::Failed(error) => write!(f, "{}: error: {error}", self.action),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CoordinationReport {
    pub coordinator: AgentId,
    pub results: Vec<ActionResult>,
}

impl CoordinationReport {
    fn count(&self, pick: fn(&ActionOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pick(&r.outcome)).count()
    }

    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, ActionOutcome::Applied(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ActionOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ActionOutcome::Failed(_)))
    }
}

pub struct Coordinator<'a> {
    board: &'a Board,
    generator: &'a dyn Generator,
    policy: &'a CoordinatorPolicy,
}

impl<'a> Coordinator<'a> {
    pub fn new(board: &'a Board, generator: &'a dyn Generator, policy: &'a CoordinatorPolicy) -> Self {
        Self {
            board,
            generator,
            policy,
        }
    }

    /// Snapshot, generate, apply, then report back on the board
    pub async fn run(&self, workspace: WorkspaceId, agent_id: AgentId) -> BoardResult<CoordinationReport> {
        let coordinator = self.board.agents().get(workspace, agent_id).await?;
        let snapshot = BoardSnapshot::capture(self.board, workspace, self.policy).await?;
        let prompt = snapshot.render_prompt(&coordinator, self.policy);

        let reply = self.generator.generate(&prompt).await?;
        if reply.trim().is_empty() {
            return Err(BoardError::ExternalFailure(
                "generator returned an empty response".to_string(),
            ));
        }

        let actions = parse_actions(&reply);
        debug!(coordinator = %coordinator.name, actions = actions.len(), "Parsed coordinator plan");
        let results = self.apply(workspace, &coordinator, actions).await;
        let report = CoordinationReport {
            coordinator: agent_id,
            results,
        };

        self.publish(workspace, &coordinator, &report).await?;
        info!(
            coordinator = %coordinator.name,
            applied = report.applied(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Coordination finished"
        );
        Ok(report)
    }

    /// Apply actions in order under the per-run caps. Each action fails alone.
    pub async fn apply(&self, workspace: WorkspaceId, coordinator: &Agent, actions: Vec<Action>) -> Vec<ActionResult> {
        let actor = Actor::agent(coordinator.id);
        let mut results = Vec::with_capacity(actions.len());
        let mut attempted = 0usize;
        let mut creates = 0usize;

        for action in actions {
            if attempted >= self.policy.max_actions
                || (action.is_create() && creates >= self.policy.max_creates)
            {
                results.push(ActionResult::skipped(&action, LIMIT_REACHED));
                continue;
            }
            attempted += 1;
            if action.is_create() {
                creates += 1;
            }

            let result = match &action {
                Action::Incomplete { missing, .. } => {
                    ActionResult::skipped(&action, format!("missing {missing}"))
                }
                Action::Unknown { .. } => {
                    ActionResult::new(&action, ActionOutcome::Failed("unknown action".to_string()))
                }
                _ => {
                    let mut touched = None;
                    let outcome = match self.apply_one(workspace, &actor, &action, &mut touched).await {
                        Ok(detail) => ActionOutcome::Applied(detail),
                        Err(BoardError::PolicyViolation(reason)) => ActionOutcome::Skipped(reason),
                        Err(e) => ActionOutcome::Failed(e.to_string()),
                    };
                    let mut result = ActionResult::new(&action, outcome);
                    if let Some(task_id) = touched {
                        result.task_id = Some(task_id);
                        result.touched = true;
                    }
                    result
                }
            };
            debug!(result = %result, "Coordinator action");
            results.push(result);
        }
        results
    }

    async fn apply_one(
        &self,
        workspace: WorkspaceId,
        actor: &Actor,
        action: &Action,
        touched: &mut Option<TaskId>,
    ) -> BoardResult<String> {
        let tasks = self.board.tasks();
        match action {
            Action::Assign { task, agent } => {
                let task_id: TaskId = task.parse()?;
                let agent = self.agent(workspace, agent).await?;
                let task = tasks.assign(workspace, task_id, agent.id, actor).await?;
                *touched = Some(task_id);
                self.board.runs().enqueue(workspace, agent.id).await?;
                Ok(format!("assigned “{}” to {} and queued a run", task.title, agent.name))
            }
            Action::Create {
                title,
                description,
                tags,
                priority,
            } => {
                let priority = priority
                    .as_deref()
                    .map(str::parse::<Priority>)
                    .transpose()?;
                let task = tasks
                    .create(
                        workspace,
                        NewTask {
                            title: title.clone(),
                            description: description.clone(),
                            tags: tags.clone(),
                            priority,
                            status: None,
                        },
                        actor,
                    )
                    .await?;
                *touched = Some(task.id);
                Ok(format!("created “{}” ({})", task.title, task.id))
            }
            Action::Reassign { task, from, to } => {
                let task_id: TaskId = task.parse()?;
                let to = self.agent(workspace, to).await?;
                let mut detail = String::new();
                if let Some(from) = from {
                    let from = self.agent(workspace, from).await?;
                    tasks.unassign(workspace, task_id, from.id, actor).await?;
                    *touched = Some(task_id);
                    detail.push_str(&format!("removed {}, ", from.name));
                }
                let task = tasks.assign(workspace, task_id, to.id, actor).await?;
                *touched = Some(task_id);
                self.board.runs().enqueue(workspace, to.id).await?;
                detail.push_str(&format!(
                    "assigned “{}” to {} and queued a run",
                    task.title, to.name
                ));
                Ok(detail)
            }
            Action::Trigger { agent } => {
                let agent = self.agent(workspace, agent).await?;
                self.board.runs().enqueue(workspace, agent.id).await?;
                Ok(format!("queued a run for {}", agent.name))
            }
            Action::SetStatus { task, status } => {
                let Ok(status) = status.parse::<TaskStatus>() else {
                    return Err(BoardError::PolicyViolation(format!("invalid status '{status}'")));
                };
                let task_id: TaskId = task.parse()?;
                let task = tasks.transition(workspace, task_id, status, actor).await?;
                *touched = Some(task_id);
                Ok(format!("moved “{}” to {}", task.title, task.status))
            }
            Action::Incomplete { .. } | Action::Unknown { .. } => Err(BoardError::Validation(
                format!("{} cannot be applied", action.verb()),
            )),
        }
    }

    async fn agent(&self, workspace: WorkspaceId, reference: &str) -> BoardResult<Agent> {
        self.board
            .agents()
            .resolve(workspace, reference)
            .await?
            .ok_or_else(|| BoardError::not_found("agent", reference))
    }

    /// One `coordination` activity for the whole batch, then one message per
    /// changed task quoting every result line that refers to it.
    pub async fn publish(&self, workspace: WorkspaceId, coordinator: &Agent, report: &CoordinationReport) -> BoardResult<()> {
        let summary = if report.results.is_empty() {
            format!("{} coordination: no actions", coordinator.name)
        } else {
            let lines: Vec<String> = report.results.iter().map(ToString::to_string).collect();
            format!(
                "{} coordination: {} applied, {} skipped, {} failed. {}",
                coordinator.name,
                report.applied(),
                report.skipped(),
                report.failed(),
                lines.join("; ")
            )
        };
        self.board
            .activity()
            .record(workspace, ActivityKind::Coordination, summary, Some(coordinator.id))
            .await?;

        let mut touched: Vec<TaskId> = Vec::new();
        for task_id in report.results.iter().filter(|r| r.touched).filter_map(|r| r.task_id) {
            if !touched.contains(&task_id) {
                touched.push(task_id);
            }
        }

        for task_id in touched {
            let lines: Vec<String> = report
                .results
                .iter()
                .filter(|r| r.task_id == Some(task_id))
                .map(ToString::to_string)
                .collect();
            let body = format!("Coordinator update:\n- {}", lines.join("\n- "));
            match self
                .board
                .messages()
                .post(workspace, task_id, Actor::agent(coordinator.id), &body)
                .await
            {
                Ok(_) => {}
                Err(e) if e.is_not_found() => debug!(task_id = %task_id, "Task gone, skipping update"),
                Err(e) => warn!(task_id = %task_id, error = %e, "Failed to post coordinator update"),
            }
        }
        Ok(())
    }
}
