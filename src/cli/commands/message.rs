use anyhow::Result;

use super::{parse_arg, CliContext};
use crate::cli::MessageAction;

pub struct MessageCommand<'a> {
    action: &'a MessageAction,
}

impl<'a> MessageCommand<'a> {
    pub fn new(action: &'a MessageAction) -> Self {
        Self { action }
    }

    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let workspace = ctx.workspace().await?;
        match self.action {
            MessageAction::Post {
                task,
                content,
                as_agent,
            } => {
                let author = ctx.actor(&workspace, as_agent.as_deref()).await?;
                let message = ctx
                    .board
                    .messages()
                    .post(workspace.id, parse_arg(task, "task id")?, author, content)
                    .await?;
                if ctx.json {
                    return ctx.print_json(&message);
                }
                println!("💬 Posted message {}", message.id);
            }
        }
        Ok(())
    }
}
