#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use mission_control::{
    ActivityKind, Agent, AgentDraft, AgentLevel, Board, BoardError, BoardResult, Generator,
    ManualClock, MemoryStore, WorkspaceId,
};

/// In-memory board on a manual clock with one workspace
pub struct Fixture {
    pub board: Board,
    pub clock: Arc<ManualClock>,
    pub ws: WorkspaceId,
}

impl Fixture {
    pub async fn new() -> Self {
        let clock = Arc::new(ManualClock::default());
        let board = Board::new(Arc::new(MemoryStore::new()), clock.clone());
        let ws = board.workspaces().create("Acme", None).await.unwrap().id;
        Self { board, clock, ws }
    }

    pub async fn agent(&self, name: &str, level: AgentLevel) -> Agent {
        self.board
            .agents()
            .upsert(self.ws, AgentDraft::new(name, "Engineer", level))
            .await
            .unwrap()
    }

    pub async fn count_activities(&self, kind: ActivityKind) -> usize {
        self.board
            .activity()
            .recent(self.ws, 2000)
            .await
            .unwrap()
            .iter()
            .filter(|a| a.kind == kind)
            .count()
    }
}

/// Replies from a fixed script, recording every prompt it was given
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> BoardResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BoardError::ExternalFailure("script exhausted".to_string()))
    }
}
