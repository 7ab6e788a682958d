mod common;

use common::Fixture;
use mission_control::{ActivityKind, Actor, AgentLevel, BoardError, NewTask, TaskStatus};
use proptest::prelude::*;

#[tokio::test]
async fn assigning_inbox_task_promotes_and_is_repeatable() {
    let fx = Fixture::new().await;
    let alice = fx.agent("Alice", AgentLevel::Spc).await;
    let bob = fx.agent("Bob", AgentLevel::Spc).await;
    let tasks = fx.board.tasks();
    let task = tasks
        .create(fx.ws, NewTask::titled("Ship it"), &Actor::System)
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Inbox);

    let first = tasks
        .set_assignees(fx.ws, task.id, [alice.id, bob.id], &Actor::System)
        .await
        .unwrap();
    let second = tasks
        .set_assignees(fx.ws, task.id, [bob.id, alice.id], &Actor::System)
        .await
        .unwrap();

    assert_eq!(first.status, TaskStatus::Assigned);
    assert_eq!(second.status, first.status);
    assert_eq!(second.assignee_ids, first.assignee_ids);
}

#[tokio::test]
async fn every_transition_bumps_updated_at_and_logs_once() {
    let fx = Fixture::new().await;
    let tasks = fx.board.tasks();
    let mut task = tasks
        .create(fx.ws, NewTask::titled("Frozen clock"), &Actor::System)
        .await
        .unwrap();

    for status in [
        TaskStatus::InProgress,
        TaskStatus::Review,
        TaskStatus::Review,
        TaskStatus::Blocked,
        TaskStatus::Done,
    ] {
        let before = fx.count_activities(ActivityKind::TaskStatus).await;
        let next = tasks
            .transition(fx.ws, task.id, status, &Actor::human("Dana"))
            .await
            .unwrap();
        assert!(next.updated_at > task.updated_at);
        assert_eq!(fx.count_activities(ActivityKind::TaskStatus).await, before + 1);
        task = next;
    }

    let err = tasks
        .transition(fx.ws, task.id, TaskStatus::Review, &Actor::System)
        .await
        .unwrap_err();
    assert!(matches!(err, BoardError::PolicyViolation(_)));
}

#[tokio::test]
async fn mention_fan_out_counts() {
    let fx = Fixture::new().await;
    let a = fx.agent("Alice", AgentLevel::Spc).await;
    let b = fx.agent("Bob", AgentLevel::Spc).await;
    let c = fx.agent("Carol", AgentLevel::Lead).await;
    let task = fx
        .board
        .tasks()
        .create(fx.ws, NewTask::titled("Triage"), &Actor::System)
        .await
        .unwrap();

    fx.board
        .messages()
        .post(fx.ws, task.id, Actor::human("Dana"), "ping @all please")
        .await
        .unwrap();
    for agent in [&a, &b, &c] {
        let inbox = fx
            .board
            .notifications()
            .for_agent(fx.ws, agent.id, None, true)
            .await
            .unwrap();
        assert_eq!(inbox.len(), 1, "{} should be notified once", agent.name);
    }

    fx.board
        .messages()
        .post(fx.ws, task.id, Actor::human("Dana"), "@Alice and @alice check this")
        .await
        .unwrap();
    let alice = fx
        .board
        .notifications()
        .for_agent(fx.ws, a.id, None, true)
        .await
        .unwrap();
    assert_eq!(alice.len(), 2);
    assert_eq!(fx.board.notifications().total_undelivered(fx.ws).await.unwrap(), 4);
}

#[tokio::test]
async fn other_workspace_records_are_invisible() {
    let fx = Fixture::new().await;
    let other = fx.board.workspaces().create("Globex", None).await.unwrap();
    let task = fx
        .board
        .tasks()
        .create(fx.ws, NewTask::titled("Private"), &Actor::System)
        .await
        .unwrap();

    let err = fx.board.tasks().get(other.id, task.id).await.unwrap_err();
    assert!(matches!(err, BoardError::WrongTenant { .. }));
    let err = fx
        .board
        .messages()
        .post(other.id, task.id, Actor::System, "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, BoardError::WrongTenant { .. }));
}

fn status() -> impl Strategy<Value = TaskStatus> {
    prop::sample::select(TaskStatus::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn transitions_never_leave_done(path in prop::collection::vec(status(), 1..12)) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let fx = Fixture::new().await;
            let tasks = fx.board.tasks();
            let task = tasks
                .create(fx.ws, NewTask::titled("Walk"), &Actor::System)
                .await
                .unwrap();
            let mut last = task.updated_at;
            let mut done = false;

            for to in path {
                match tasks.transition(fx.ws, task.id, to, &Actor::System).await {
                    Ok(next) => {
                        assert!(!done || to == TaskStatus::Done);
                        assert!(next.updated_at > last);
                        last = next.updated_at;
                        done = next.status == TaskStatus::Done;
                    }
                    Err(BoardError::PolicyViolation(_)) => assert!(done),
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
        });
    }
}
