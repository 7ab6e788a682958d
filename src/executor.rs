//! One tick of a regular (non-coordinator) agent.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::board::Board;
use crate::clock::minutes_between;
use crate::error::{BoardError, BoardResult};
use crate::generate::Generator;
use crate::model::{
    ActivityKind, Actor, Agent, AgentId, Message, MessageId, Notification, Task, TaskId,
    TaskStatus, Workspace, WorkspaceId,
};
use crate::notify::truncate;
use crate::tasks::TaskFilter;

static STATUS_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bstatus:[ \t*`"']*([a-z]+(?:[ _-][a-z]+)?)"#).expect("valid status pattern")
});

/// Statuses an agent may declare in its reply
pub const DECLARABLE: [TaskStatus; 4] = [
    TaskStatus::InProgress,
    TaskStatus::Review,
    TaskStatus::Done,
    TaskStatus::Blocked,
];

/// Dwell, debounce and context limits for agent ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorPolicy {
    /// Minutes a task sits in `assigned` before the agent acts on it
    pub dwell_assigned_minutes: i64,
    /// Minutes a task sits in `in_progress` or `review` before the agent acts again
    pub dwell_active_minutes: i64,
    /// Minimum minutes between two messages from the agent on one task
    pub debounce_minutes: i64,
    pub notification_limit: usize,
    pub task_limit: usize,
    /// Thread messages quoted in the prompt
    pub context_messages: usize,
    /// Move `assigned` to `in_progress` before generating
    pub auto_start: bool,
}

impl Default for ExecutorPolicy {
    fn default() -> Self {
        Self {
            dwell_assigned_minutes: 2,
            dwell_active_minutes: 5,
            debounce_minutes: 3,
            notification_limit: 20,
            task_limit: 20,
            context_messages: 6,
            auto_start: true,
        }
    }
}

impl ExecutorPolicy {
    fn dwell_for(&self, status: TaskStatus) -> i64 {
        match status {
            TaskStatus::Assigned => self.dwell_assigned_minutes,
            _ => self.dwell_active_minutes,
        }
    }
}

/// Transitions an agent reply is allowed to cause
pub fn reply_may_move(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;
    matches!(
        (from, to),
        (Assigned, InProgress | Review | Blocked)
            | (InProgress, Review | Done | Blocked)
            | (Review, InProgress | Done | Blocked)
    )
}

/// Value of the last `STATUS:` marker in `text`, if it names a declarable status
pub fn parse_status_marker(text: &str) -> Option<TaskStatus> {
    let token = STATUS_MARKER
        .captures_iter(text)
        .last()
        .and_then(|c| c.get(1))?
        .as_str();
    // "in progress" is two words; "review then" is one word and trailing prose
    let status: TaskStatus = token
        .parse()
        .or_else(|_| token.split([' ', '_', '-']).next().unwrap_or(token).parse())
        .ok()?;
    DECLARABLE.contains(&status).then_some(status)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// No assigned work
    Idle,
    /// Focus task found but dwell or debounce not satisfied
    Waiting { task_id: TaskId, reason: String },
    Acted {
        task_id: TaskId,
        message_id: MessageId,
        declared: Option<TaskStatus>,
        final_status: TaskStatus,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub agent_id: AgentId,
    pub heartbeat: String,
    pub outcome: TickOutcome,
}

pub struct AgentExecutor<'a> {
    board: &'a Board,
    generator: &'a dyn Generator,
    policy: &'a ExecutorPolicy,
}

impl<'a> AgentExecutor<'a> {
    pub fn new(board: &'a Board, generator: &'a dyn Generator, policy: &'a ExecutorPolicy) -> Self {
        Self {
            board,
            generator,
            policy,
        }
    }

    /// Run one tick. `forced` skips the dwell and debounce checks.
    pub async fn tick(&self, workspace: WorkspaceId, agent_id: AgentId, forced: bool) -> BoardResult<TickReport> {
        let ws = self.board.workspaces().get(workspace).await?;
        let agent = self.board.agents().get(workspace, agent_id).await?;

        let notifications = self
            .board
            .notifications()
            .for_agent(workspace, agent_id, Some(self.policy.notification_limit), true)
            .await?;
        let tasks = self
            .board
            .tasks()
            .list(
                workspace,
                &TaskFilter {
                    assignee: Some(agent_id),
                    limit: Some(self.policy.task_limit),
                    ..TaskFilter::default()
                },
            )
            .await?;

        let heartbeat = heartbeat_line(&agent, &tasks, notifications.len());
        self.board
            .activity()
            .record(workspace, ActivityKind::Heartbeat, heartbeat.clone(), Some(agent_id))
            .await?;

        let report = |outcome| TickReport {
            agent_id,
            heartbeat: heartbeat.clone(),
            outcome,
        };

        let Some(focus) = tasks.iter().find(|t| t.status.is_active()).cloned() else {
            debug!(agent = %agent.name, "No active task, idling");
            return Ok(report(TickOutcome::Idle));
        };

        let thread = self.board.messages().list(workspace, focus.id).await?;
        let now = self.board.clock().now();
        let since_update = minutes_between(focus.updated_at, now);
        let since_spoke = thread
            .iter()
            .rev()
            .find(|m| m.author.agent_id() == Some(agent_id))
            .map(|m| minutes_between(m.created_at, now));

        if !forced {
            let dwell = self.policy.dwell_for(focus.status);
            if since_update < dwell {
                return Ok(report(TickOutcome::Waiting {
                    task_id: focus.id,
                    reason: format!("{} for {since_update}m, dwell is {dwell}m", focus.status),
                }));
            }
            if let Some(spoke) = since_spoke.filter(|m| *m < self.policy.debounce_minutes) {
                return Ok(report(TickOutcome::Waiting {
                    task_id: focus.id,
                    reason: format!("spoke {spoke}m ago, debounce is {}m", self.policy.debounce_minutes),
                }));
            }
        }

        let actor = Actor::agent(agent_id);
        let started_from = focus.status;
        let focus = if self.policy.auto_start && focus.status == TaskStatus::Assigned {
            self.board
                .tasks()
                .transition(workspace, focus.id, TaskStatus::InProgress, &actor)
                .await?
        } else {
            focus
        };

        let prompt = self
            .build_prompt(&ws, &agent, &focus, &thread, &notifications)
            .await?;
        let reply = self.generator.generate(&prompt).await?;
        if reply.trim().is_empty() {
            return Err(BoardError::ExternalFailure(
                "generator returned an empty response".to_string(),
            ));
        }

        let message = self
            .board
            .messages()
            .post(workspace, focus.id, actor.clone(), &reply)
            .await?;

        let declared = parse_status_marker(&reply);
        let current = self.board.tasks().get(workspace, focus.id).await?;
        if let Some(to) = declared.filter(|to| *to != current.status && !reply_may_move(current.status, *to)) {
            self.record_rejected(workspace, &agent, &current, to).await?;
        }
        let final_task = match declared {
            Some(to) if reply_may_move(current.status, to) => {
                self.board
                    .tasks()
                    .transition(workspace, focus.id, to, &actor)
                    .await?
            }
            _ if started_from == TaskStatus::Assigned && current.status == TaskStatus::Assigned => {
                self.board
                    .tasks()
                    .transition(workspace, focus.id, TaskStatus::InProgress, &actor)
                    .await?
            }
            _ => current,
        };

        for notification in &notifications {
            self.board
                .notifications()
                .mark_delivered(workspace, notification.id)
                .await?;
        }

        info!(
            agent = %agent.name,
            task_id = %focus.id,
            declared = ?declared,
            status = %final_task.status,
            "Agent acted"
        );
        Ok(report(TickOutcome::Acted {
            task_id: focus.id,
            message_id: message.id,
            declared,
            final_status: final_task.status,
        }))
    }

    /// A declared status outside the reply whitelist leaves the task where it is
    async fn record_rejected(
        &self,
        workspace: WorkspaceId,
        agent: &Agent,
        task: &Task,
        declared: TaskStatus,
    ) -> BoardResult<()> {
        warn!(
            agent = %agent.name,
            task_id = %task.id,
            from = %task.status,
            declared = %declared,
            "Ignoring declared status"
        );
        self.board
            .activity()
            .record(
                workspace,
                ActivityKind::TaskStatus,
                format!(
                    "{} declared {declared} on “{}”, skipped: {} cannot move to {declared} from a reply",
                    agent.name, task.title, task.status
                ),
                Some(agent.id),
            )
            .await?;
        Ok(())
    }

    async fn build_prompt(
        &self,
        ws: &Workspace,
        agent: &Agent,
        task: &Task,
        thread: &[Message],
        notifications: &[Notification],
    ) -> BoardResult<String> {
        let mut prompt = format!(
            "You are {}, {} ({}) in workspace \"{}\".\n",
            agent.name, agent.role, agent.level, ws.name
        );
        if let Some(notes) = agent.prompt.as_deref().filter(|p| !p.trim().is_empty()) {
            prompt.push_str(&format!("\nAgent notes:\n{}\n", notes.trim()));
        }

        prompt.push_str(&format!("\nTask: {}\nStatus: {}\n", task.title, task.status));
        if let Some(priority) = task.priority {
            prompt.push_str(&format!("Priority: {priority}\n"));
        }
        if !task.tags.is_empty() {
            prompt.push_str(&format!("Tags: {}\n", task.tags.join(", ")));
        }
        if let Some(description) = &task.description {
            prompt.push_str(&format!("Description:\n{description}\n"));
        }

        let skip = thread.len().saturating_sub(self.policy.context_messages);
        if thread.len() > skip {
            prompt.push_str("\nRecent messages:\n");
            for message in &thread[skip..] {
                let author = self.board.agents().display_name(&message.author).await?;
                prompt.push_str(&format!("- {author}: {}\n", truncate(&message.content, 500)));
            }
        }

        if !notifications.is_empty() {
            prompt.push_str("\nNotifications for you:\n");
            for notification in notifications {
                prompt.push_str(&format!("- {}\n", notification.content));
            }
        }

        prompt.push_str(
            "\nWrite your update for this task. If its status should change, end with a line \
             `STATUS: <in_progress|review|done|blocked>`.\n",
        );
        Ok(prompt)
    }
}

fn heartbeat_line(agent: &Agent, tasks: &[Task], notifications: usize) -> String {
    if tasks.is_empty() && notifications == 0 {
        return format!("{} heartbeat: idle", agent.name);
    }
    let mut line = format!(
        "{} heartbeat: {} tasks / {} notifications",
        agent.name,
        tasks.len(),
        notifications
    );
    if let Some(top) = tasks.first() {
        line.push_str(&format!(" • top: “{}” ({})", top.title, top.status));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentDraft;
    use crate::clock::ManualClock;
    use crate::generate::MockGenerator;
    use crate::model::AgentLevel;
    use crate::store::MemoryStore;
    use crate::tasks::NewTask;
    use std::sync::Arc;

    #[test]
    fn test_status_marker_takes_last_and_normalizes() {
        assert_eq!(parse_status_marker("done!\nSTATUS: review"), Some(TaskStatus::Review));
        assert_eq!(
            parse_status_marker("status: blocked\n...\nStatus: In-Progress"),
            Some(TaskStatus::InProgress)
        );
        assert_eq!(parse_status_marker("**STATUS:** `done`."), Some(TaskStatus::Done));
        assert_eq!(parse_status_marker("STATUS: inbox"), None);
        assert_eq!(parse_status_marker("STATUS: in progress"), Some(TaskStatus::InProgress));
        assert_eq!(parse_status_marker("STATUS: shipped"), None);
        assert_eq!(parse_status_marker("no marker"), None);
    }

    #[test]
    fn test_status_marker_ignores_trailing_text() {
        assert_eq!(
            parse_status_marker("STATUS: review - ready for QA"),
            Some(TaskStatus::Review)
        );
        assert_eq!(
            parse_status_marker("STATUS: done (all tests pass)"),
            Some(TaskStatus::Done)
        );
        assert_eq!(
            parse_status_marker("STATUS: review. Next I will add docs."),
            Some(TaskStatus::Review)
        );
        assert_eq!(
            parse_status_marker("Status: blocked waiting on credentials"),
            Some(TaskStatus::Blocked)
        );
        assert_eq!(parse_status_marker("STATUS: shipped today"), None);
    }

    #[test]
    fn test_reply_whitelist() {
        use TaskStatus::*;
        assert!(reply_may_move(Assigned, Review));
        assert!(!reply_may_move(Assigned, Done));
        assert!(reply_may_move(InProgress, Done));
        assert!(!reply_may_move(InProgress, InProgress));
        assert!(reply_may_move(Review, InProgress));
        assert!(!reply_may_move(Blocked, InProgress));
        assert!(!reply_may_move(Done, Review));
    }

    struct Fixture {
        board: Board,
        clock: Arc<ManualClock>,
        ws: WorkspaceId,
        agent: AgentId,
    }

    async fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::default());
        let board = Board::new(Arc::new(MemoryStore::new()), clock.clone());
        let ws = board.workspaces().create("Default", None).await.unwrap().id;
        let agent = board
            .agents()
            .upsert(ws, AgentDraft::new("Alice", "Backend", AgentLevel::Spc))
            .await
            .unwrap()
            .id;
        Fixture {
            board,
            clock,
            ws,
            agent,
        }
    }

    async fn assigned_task(fx: &Fixture) -> Task {
        let task = fx
            .board
            .tasks()
            .create(fx.ws, NewTask::titled("Build API"), &Actor::System)
            .await
            .unwrap();
        fx.board
            .tasks()
            .assign(fx.ws, task.id, fx.agent, &Actor::System)
            .await
            .unwrap()
    }

    fn replying(text: &'static str) -> MockGenerator {
        let mut mock = MockGenerator::new();
        mock.expect_generate()
            .returning(move |_| Ok(text.to_string()));
        mock
    }

    #[tokio::test]
    async fn test_idle_agent_records_heartbeat() {
        let fx = fixture().await;
        let mut mock = MockGenerator::new();
        mock.expect_generate().never();
        let policy = ExecutorPolicy::default();
        let report = AgentExecutor::new(&fx.board, &mock, &policy)
            .tick(fx.ws, fx.agent, false)
            .await
            .unwrap();
        assert_eq!(report.outcome, TickOutcome::Idle);
        assert_eq!(report.heartbeat, "Alice heartbeat: idle");
        let feed = fx.board.activity().feed(fx.ws).await.unwrap();
        assert_eq!(feed[0].kind, ActivityKind::Heartbeat);
    }

    #[tokio::test]
    async fn test_waits_for_dwell_then_acts() {
        let fx = fixture().await;
        let task = assigned_task(&fx).await;
        let mock = replying("Scaffolded the endpoints.\nSTATUS: review");
        let policy = ExecutorPolicy::default();
        let executor = AgentExecutor::new(&fx.board, &mock, &policy);

        let report = executor.tick(fx.ws, fx.agent, false).await.unwrap();
        assert!(matches!(report.outcome, TickOutcome::Waiting { .. }));

        fx.clock.advance_minutes(3);
        let report = executor.tick(fx.ws, fx.agent, false).await.unwrap();
        match report.outcome {
            TickOutcome::Acted {
                declared,
                final_status,
                ..
            } => {
                assert_eq!(declared, Some(TaskStatus::Review));
                assert_eq!(final_status, TaskStatus::Review);
            }
            other => panic!("expected Acted, got {other:?}"),
        }

        let thread = fx.board.messages().list(fx.ws, task.id).await.unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].author, Actor::agent(fx.agent));
    }

    #[tokio::test]
    async fn test_in_progress_without_marker_stays_put() {
        let fx = fixture().await;
        let task = assigned_task(&fx).await;
        fx.board
            .tasks()
            .transition(fx.ws, task.id, TaskStatus::InProgress, &Actor::System)
            .await
            .unwrap();
        let mock = replying("Still working on it.");
        let policy = ExecutorPolicy::default();
        let report = AgentExecutor::new(&fx.board, &mock, &policy)
            .tick(fx.ws, fx.agent, true)
            .await
            .unwrap();
        assert!(matches!(
            report.outcome,
            TickOutcome::Acted {
                declared: None,
                final_status: TaskStatus::InProgress,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_assigned_fallback_without_auto_start() {
        let fx = fixture().await;
        let task = assigned_task(&fx).await;
        let mock = replying("Looking into it. STATUS: done");
        let policy = ExecutorPolicy {
            auto_start: false,
            ..ExecutorPolicy::default()
        };
        AgentExecutor::new(&fx.board, &mock, &policy)
            .tick(fx.ws, fx.agent, true)
            .await
            .unwrap();
        let task = fx.board.tasks().get(fx.ws, task.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);

        let feed = fx.board.activity().feed(fx.ws).await.unwrap();
        assert!(feed.iter().any(|a| a.kind == ActivityKind::TaskStatus
            && a.message == "Alice declared done on “Build API”, skipped: assigned cannot move to done from a reply"));
    }

    #[tokio::test]
    async fn test_debounce_blocks_repeat_messages() {
        let fx = fixture().await;
        let task = assigned_task(&fx).await;
        fx.board
            .tasks()
            .transition(fx.ws, task.id, TaskStatus::InProgress, &Actor::System)
            .await
            .unwrap();
        fx.clock.advance_minutes(6);
        fx.board
            .messages()
            .post(fx.ws, task.id, Actor::agent(fx.agent), "just now")
            .await
            .unwrap();

        let mut mock = MockGenerator::new();
        mock.expect_generate().never();
        let policy = ExecutorPolicy::default();
        let report = AgentExecutor::new(&fx.board, &mock, &policy)
            .tick(fx.ws, fx.agent, false)
            .await
            .unwrap();
        match report.outcome {
            TickOutcome::Waiting { reason, .. } => assert!(reason.contains("debounce")),
            other => panic!("expected Waiting, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_notifications_delivered_only_after_acting() {
        let fx = fixture().await;
        let task = assigned_task(&fx).await;
        fx.board
            .messages()
            .post(fx.ws, task.id, Actor::human("ops"), "@alice please look")
            .await
            .unwrap();

        let mut failing = MockGenerator::new();
        failing
            .expect_generate()
            .returning(|_| Err(BoardError::ExternalFailure("model offline".into())));
        let policy = ExecutorPolicy::default();
        let err = AgentExecutor::new(&fx.board, &failing, &policy)
            .tick(fx.ws, fx.agent, true)
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::ExternalFailure(_)));
        assert_eq!(fx.board.notifications().total_undelivered(fx.ws).await.unwrap(), 1);

        let mut mock = MockGenerator::new();
        mock.expect_generate()
            .withf(|prompt| prompt.contains("please look"))
            .returning(|_| Ok("On it".to_string()));
        AgentExecutor::new(&fx.board, &mock, &policy)
            .tick(fx.ws, fx.agent, true)
            .await
            .unwrap();
        assert_eq!(fx.board.notifications().total_undelivered(fx.ws).await.unwrap(), 0);
    }
}
