use tracing::info;

use crate::board::Board;
use crate::clock::stamp;
use crate::error::{BoardError, BoardResult};
use crate::model::{ActivityKind, Actor, Message, MessageId, TaskId, WorkspaceId};
use crate::notify::truncate;

const COMMENT_PREVIEW: usize = 120;

pub struct MessageBoard<'a> {
    board: &'a Board,
}

impl Board {
    pub fn messages(&self) -> MessageBoard<'_> {
        MessageBoard { board: self }
    }
}

impl MessageBoard<'_> {
    /// Append a message to a task thread, log a `comment` activity and notify
    /// mentioned agents. The message is written first and stays even if a
    /// later step fails.
    pub async fn post(
        &self,
        workspace: WorkspaceId,
        task_id: TaskId,
        author: Actor,
        content: &str,
    ) -> BoardResult<Message> {
        let content = content.trim();
        if content.is_empty() {
            return Err(BoardError::Validation(
                "message content cannot be empty".to_string(),
            ));
        }

        let task = self.board.tasks().get(workspace, task_id).await?;
        if let Some(agent_id) = author.agent_id() {
            self.board.agents().get(workspace, agent_id).await?;
        }

        let message = Message {
            id: MessageId::new(),
            workspace_id: workspace,
            task_id,
            author,
            content: content.to_string(),
            created_at: stamp(self.board.clock()),
        };
        self.board.store().insert_message(&message).await?;

        let actor = self.board.agents().display_name(&message.author).await?;
        self.board
            .activity()
            .record(
                workspace,
                ActivityKind::Comment,
                format!(
                    "{actor} commented on “{}”: {}",
                    task.title,
                    truncate(content, COMMENT_PREVIEW)
                ),
                message.author.agent_id(),
            )
            .await?;

        self.board
            .notifications()
            .fan_out(workspace, &task, &message.author, content)
            .await?;

        info!(task_id = %task_id, message_id = %message.id, actor = %actor, "Message posted");
        Ok(message)
    }

    /// Oldest first
    pub async fn list(&self, workspace: WorkspaceId, task_id: TaskId) -> BoardResult<Vec<Message>> {
        self.board.tasks().get(workspace, task_id).await?;
        self.board.store().list_messages(task_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentDraft;
    use crate::model::AgentLevel;
    use crate::tasks::NewTask;

    #[tokio::test]
    async fn test_post_fans_out_to_mentioned_agents() {
        let board = Board::in_memory();
        let ws = board.workspaces().create("Default", None).await.unwrap().id;
        for name in ["Alice", "Bob", "Carol"] {
            board
                .agents()
                .upsert(ws, AgentDraft::new(name, "Engineer", AgentLevel::Spc))
                .await
                .unwrap();
        }
        let task = board
            .tasks()
            .create(ws, NewTask::titled("Launch"), &Actor::System)
            .await
            .unwrap();

        board
            .messages()
            .post(ws, task.id, Actor::human("ops"), "  ping @all please  ")
            .await
            .unwrap();
        assert_eq!(board.notifications().total_undelivered(ws).await.unwrap(), 3);

        board
            .messages()
            .post(ws, task.id, Actor::human("ops"), "@Alice and @alice check this, @nobody")
            .await
            .unwrap();
        assert_eq!(board.notifications().total_undelivered(ws).await.unwrap(), 4);

        let thread = board.messages().list(ws, task.id).await.unwrap();
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].content, "ping @all please");

        let feed = board.activity().feed(ws).await.unwrap();
        assert!(feed[0].message.starts_with("ops commented on “Launch”"));
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected() {
        let board = Board::in_memory();
        let ws = board.workspaces().create("Default", None).await.unwrap().id;
        let task = board
            .tasks()
            .create(ws, NewTask::titled("Launch"), &Actor::System)
            .await
            .unwrap();
        let err = board
            .messages()
            .post(ws, task.id, Actor::System, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::Validation(_)));
    }
}
