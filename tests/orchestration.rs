mod common;

use std::sync::Arc;

use common::{Fixture, ScriptedGenerator};
use mission_control::config::DispatcherConfig;
use mission_control::{
    Actor, AgentExecutor, AgentLevel, Coordinator, CoordinatorPolicy, Dispatcher, ExecutorPolicy,
    NewTask, RunStatus, TaskStatus, TickOutcome,
};

#[tokio::test]
async fn assigned_task_reply_moves_to_review() {
    let fx = Fixture::new().await;
    let alice = fx.agent("Alice", AgentLevel::Spc).await;
    let task = fx
        .board
        .tasks()
        .create(fx.ws, NewTask::titled("Write the parser"), &Actor::System)
        .await
        .unwrap();
    fx.board
        .tasks()
        .assign(fx.ws, task.id, alice.id, &Actor::System)
        .await
        .unwrap();
    fx.clock.advance_minutes(3);

    let generator = ScriptedGenerator::new(["Parser done, tests green.\nSTATUS: review"]);
    let policy = ExecutorPolicy::default();
    let report = AgentExecutor::new(&fx.board, &generator, &policy)
        .tick(fx.ws, alice.id, false)
        .await
        .unwrap();

    assert!(matches!(
        report.outcome,
        TickOutcome::Acted { final_status: TaskStatus::Review, .. }
    ));
    let task = fx.board.tasks().get(fx.ws, task.id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Review);
    let thread = fx.board.messages().list(fx.ws, task.id).await.unwrap();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].author, Actor::agent(alice.id));
    assert!(generator.prompts()[0].contains("Write the parser"));
}

#[tokio::test]
async fn in_progress_reply_without_marker_stays_put() {
    let fx = Fixture::new().await;
    let alice = fx.agent("Alice", AgentLevel::Spc).await;
    let task = fx
        .board
        .tasks()
        .create(fx.ws, NewTask::titled("Refactor"), &Actor::System)
        .await
        .unwrap();
    fx.board
        .tasks()
        .assign(fx.ws, task.id, alice.id, &Actor::System)
        .await
        .unwrap();
    fx.board
        .tasks()
        .transition(fx.ws, task.id, TaskStatus::InProgress, &Actor::System)
        .await
        .unwrap();
    fx.clock.advance_minutes(10);

    let generator = ScriptedGenerator::new(["Still chipping away at it."]);
    let policy = ExecutorPolicy::default();
    AgentExecutor::new(&fx.board, &generator, &policy)
        .tick(fx.ws, alice.id, false)
        .await
        .unwrap();

    let task = fx.board.tasks().get(fx.ws, task.id).await.unwrap();
    assert_eq!(task.status, TaskStatus::InProgress);
}

#[tokio::test]
async fn coordinator_creates_are_capped() {
    let fx = Fixture::new().await;
    let jarvis = fx.agent("Jarvis", AgentLevel::Coord).await;
    let plan: String = (1..=10)
        .map(|i| format!("ACTION: CREATE | title=Follow-up {i} | priority=low\n"))
        .collect();
    let generator = ScriptedGenerator::new([plan]);

    let policy = CoordinatorPolicy {
        max_creates: 3,
        ..CoordinatorPolicy::default()
    };
    let report = Coordinator::new(&fx.board, &generator, &policy)
        .run(fx.ws, jarvis.id)
        .await
        .unwrap();

    assert_eq!(report.applied(), 3);
    assert_eq!(report.skipped(), 7);
    let tasks = fx.board.tasks().list(fx.ws, &Default::default()).await.unwrap();
    assert_eq!(tasks.len(), 3);
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Inbox));
}

#[tokio::test]
async fn dispatcher_defers_second_request_for_busy_agent() {
    let fx = Fixture::new().await;
    let jarvis = fx.agent("Jarvis", AgentLevel::Coord).await;
    let first = fx.board.runs().enqueue(fx.ws, jarvis.id).await.unwrap();
    let second = fx.board.runs().enqueue(fx.ws, jarvis.id).await.unwrap();

    let generator = Arc::new(ScriptedGenerator::new(["All quiet.", "Still quiet."]));
    let dispatcher = Dispatcher::new(
        fx.board.clone(),
        generator.clone(),
        DispatcherConfig::default(),
        ExecutorPolicy::default(),
        CoordinatorPolicy::default(),
    );

    let summary = dispatcher.tick().await.unwrap();
    assert_eq!((summary.succeeded, summary.skipped), (1, 1));
    assert_eq!(generator.calls(), 1);

    let store = fx.board.store();
    let first = store.get_run_request(first.id).await.unwrap().unwrap();
    let second_now = store.get_run_request(second.id).await.unwrap().unwrap();
    assert_eq!(first.status, RunStatus::Done);
    assert_eq!(second_now.status, RunStatus::Pending);

    let summary = dispatcher.tick().await.unwrap();
    assert_eq!(summary.succeeded, 1);
    let second_now = store.get_run_request(second.id).await.unwrap().unwrap();
    assert_eq!(second_now.status, RunStatus::Done);
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn failed_generation_settles_request_as_failed_once() {
    let fx = Fixture::new().await;
    let jarvis = fx.agent("Jarvis", AgentLevel::Coord).await;
    let request = fx.board.runs().enqueue(fx.ws, jarvis.id).await.unwrap();

    let dispatcher = Dispatcher::new(
        fx.board.clone(),
        Arc::new(ScriptedGenerator::default()),
        DispatcherConfig::default(),
        ExecutorPolicy::default(),
        CoordinatorPolicy::default(),
    );
    let summary = dispatcher.tick().await.unwrap();
    assert_eq!(summary.failed, 1);

    let settled = fx.board.store().get_run_request(request.id).await.unwrap().unwrap();
    assert_eq!(settled.status, RunStatus::Failed);
    assert!(settled.note.unwrap().contains("script exhausted"));

    let err = fx
        .board
        .runs()
        .mark_done(Some(fx.ws), request.id, RunStatus::Done, None)
        .await
        .unwrap_err();
    assert!(matches!(err, mission_control::BoardError::PolicyViolation(_)));
    assert_eq!(dispatcher.tick().await.unwrap().fetched, 0);
}
