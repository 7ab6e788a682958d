//! Durable "run this agent now" queue.
//!
//! Delivery is at-least-once: a request stays `pending` until the dispatcher
//! reconciles it, and whatever it triggers must tolerate repeats.

use tracing::{info, warn};

use crate::board::Board;
use crate::clock::{bump, stamp};
use crate::error::{BoardError, BoardResult};
use crate::model::{AgentId, RunRequest, RunRequestId, RunStatus, WorkspaceId};

pub const DEFAULT_PENDING_LIMIT: usize = 50;
pub const DEFAULT_AGENT_LIMIT: usize = 5;
pub const CLEARED_NOTE: &str = "cleared";

pub struct RunQueue<'a> {
    board: &'a Board,
}

impl Board {
    pub fn runs(&self) -> RunQueue<'_> {
        RunQueue { board: self }
    }
}

impl RunQueue<'_> {
    pub async fn enqueue(&self, workspace: WorkspaceId, agent: AgentId) -> BoardResult<RunRequest> {
        self.board.agents().get(workspace, agent).await?;
        let now = stamp(self.board.clock());
        let request = RunRequest {
            id: RunRequestId::new(),
            workspace_id: workspace,
            agent_id: agent,
            status: RunStatus::Pending,
            note: None,
            created_at: now,
            updated_at: now,
        };
        self.board.store().insert_run_request(&request).await?;
        info!(request_id = %request.id, agent_id = %agent, "Run request enqueued");
        Ok(request)
    }

    /// Oldest first, optionally limited to one workspace
    pub async fn list_pending(
        &self,
        workspace: Option<WorkspaceId>,
        limit: Option<usize>,
    ) -> BoardResult<Vec<RunRequest>> {
        let limit = limit.unwrap_or(DEFAULT_PENDING_LIMIT).max(1);
        self.board.store().pending_run_requests(workspace, limit).await
    }

    /// Newest first
    pub async fn list_for_agent(
        &self,
        workspace: WorkspaceId,
        agent: AgentId,
        limit: Option<usize>,
    ) -> BoardResult<Vec<RunRequest>> {
        let limit = limit.unwrap_or(DEFAULT_AGENT_LIMIT).max(1);
        self.board
            .store()
            .run_requests_for_agent(workspace, agent, limit)
            .await
    }

    /// Settle a request as `done` or `failed`. Repeating the same outcome is
    /// harmless; changing a settled outcome is refused.
    pub async fn mark_done(
        &self,
        workspace: Option<WorkspaceId>,
        id: RunRequestId,
        status: RunStatus,
        note: Option<String>,
    ) -> BoardResult<RunRequest> {
        if !status.is_terminal() {
            return Err(BoardError::Validation(format!(
                "run request can only be marked done or failed, not {status}"
            )));
        }

        let mut request = self
            .board
            .store()
            .get_run_request(id)
            .await?
            .ok_or_else(|| BoardError::not_found("run request", id))?;
        if workspace.is_some_and(|ws| ws != request.workspace_id) {
            return Err(BoardError::wrong_tenant("run request", id));
        }

        if request.status.is_terminal() {
            if request.status == status {
                return Ok(request);
            }
            return Err(BoardError::PolicyViolation(format!(
                "run request {id} is already {}",
                request.status
            )));
        }

        request.status = status;
        request.note = note;
        request.updated_at = bump(self.board.clock(), request.updated_at);
        self.board.store().update_run_request(&request).await?;

        match status {
            RunStatus::Failed => warn!(
                request_id = %id,
                note = request.note.as_deref().unwrap_or(""),
                "Run request failed"
            ),
            _ => info!(request_id = %id, "Run request done"),
        }
        Ok(request)
    }

    /// Mark every pending request of a workspace `done` with note `cleared`
    pub async fn clear_pending(&self, workspace: WorkspaceId) -> BoardResult<usize> {
        let pending = self
            .board
            .store()
            .pending_run_requests(Some(workspace), usize::MAX)
            .await?;
        for mut request in pending.iter().cloned() {
            request.status = RunStatus::Done;
            request.note = Some(CLEARED_NOTE.to_string());
            request.updated_at = bump(self.board.clock(), request.updated_at);
            self.board.store().update_run_request(&request).await?;
        }
        info!(workspace_id = %workspace, cleared = pending.len(), "Pending run requests cleared");
        Ok(pending.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentDraft;
    use crate::clock::ManualClock;
    use crate::model::AgentLevel;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    async fn setup() -> (Board, WorkspaceId, AgentId) {
        let board = Board::new(
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::default()),
        );
        let ws = board.workspaces().create("Default", None).await.unwrap().id;
        let agent = board
            .agents()
            .upsert(ws, AgentDraft::new("Alice", "Backend", AgentLevel::Spc))
            .await
            .unwrap()
            .id;
        (board, ws, agent)
    }

    #[tokio::test]
    async fn test_pending_is_fifo_with_insertion_tiebreak() {
        let (board, ws, agent) = setup().await;
        let first = board.runs().enqueue(ws, agent).await.unwrap();
        let second = board.runs().enqueue(ws, agent).await.unwrap();
        assert_eq!(first.created_at, second.created_at);

        let pending = board.runs().list_pending(Some(ws), None).await.unwrap();
        let ids: Vec<_> = pending.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_mark_done_is_one_way() {
        let (board, ws, agent) = setup().await;
        let runs = board.runs();
        let request = runs.enqueue(ws, agent).await.unwrap();

        let err = runs
            .mark_done(Some(ws), request.id, RunStatus::Pending, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::Validation(_)));

        let done = runs
            .mark_done(Some(ws), request.id, RunStatus::Done, Some("ok".into()))
            .await
            .unwrap();
        assert_eq!(done.status, RunStatus::Done);

        let again = runs
            .mark_done(None, request.id, RunStatus::Done, Some("dup".into()))
            .await
            .unwrap();
        assert_eq!(again.note.as_deref(), Some("ok"));

        let err = runs
            .mark_done(None, request.id, RunStatus::Failed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::PolicyViolation(_)));
        assert!(runs.list_pending(None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_requires_agent_in_workspace() {
        let (board, _ws, agent) = setup().await;
        let other = board.workspaces().create("Other", None).await.unwrap().id;
        let err = board.runs().enqueue(other, agent).await.unwrap_err();
        assert!(matches!(err, BoardError::WrongTenant { .. }));
    }

    #[tokio::test]
    async fn test_clear_pending_and_agent_history() {
        let (board, ws, agent) = setup().await;
        let runs = board.runs();
        for _ in 0..7 {
            runs.enqueue(ws, agent).await.unwrap();
        }
        assert_eq!(runs.clear_pending(ws).await.unwrap(), 7);
        assert!(runs.list_pending(Some(ws), None).await.unwrap().is_empty());

        let history = runs.list_for_agent(ws, agent, None).await.unwrap();
        assert_eq!(history.len(), DEFAULT_AGENT_LIMIT);
        assert!(history
            .iter()
            .all(|r| r.status == RunStatus::Done && r.note.as_deref() == Some(CLEARED_NOTE)));
    }
}
