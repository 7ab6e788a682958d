use anyhow::Result;

use super::CliContext;
use crate::cli::RunAction;

pub struct RunCommand<'a> {
    action: &'a RunAction,
}

impl<'a> RunCommand<'a> {
    pub fn new(action: &'a RunAction) -> Self {
        Self { action }
    }

    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let workspace = ctx.workspace().await?;
        let runs = ctx.board.runs();
        match self.action {
            RunAction::Enqueue { agent } => {
                let agent = ctx.agent(&workspace, agent).await?;
                let request = runs.enqueue(workspace.id, agent.id).await?;
                if ctx.json {
                    return ctx.print_json(&request);
                }
                println!("🚀 Queued run {} for {}", request.id, agent.name);
            }
            RunAction::Pending { limit } => {
                let pending = runs.list_pending(Some(workspace.id), *limit).await?;
                if ctx.json {
                    return ctx.print_json(&pending);
                }
                if pending.is_empty() {
                    println!("📭 No pending run requests");
                }
                for request in pending {
                    println!(
                        "{}\t{}\t{}",
                        request.id,
                        request.agent_id,
                        request.created_at.to_rfc3339()
                    );
                }
            }
            RunAction::Clear => {
                let cleared = runs.clear_pending(workspace.id).await?;
                println!("🧹 Cleared {cleared} pending run requests");
            }
        }
        Ok(())
    }
}
