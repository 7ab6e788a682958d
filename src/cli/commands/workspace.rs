use anyhow::Result;

use super::CliContext;
use crate::cli::WorkspaceAction;

pub struct WorkspaceCommand<'a> {
    action: &'a WorkspaceAction,
}

impl<'a> WorkspaceCommand<'a> {
    pub fn new(action: &'a WorkspaceAction) -> Self {
        Self { action }
    }

    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let workspaces = ctx.board.workspaces();
        match self.action {
            WorkspaceAction::Create { name, slug } => {
                let workspace = workspaces.create(name, slug.as_deref()).await?;
                if ctx.json {
                    return ctx.print_json(&workspace);
                }
                println!("✅ Created workspace {} ({})", workspace.name, workspace.slug);
                println!("   💡 export WORKSPACE_SLUG={}", workspace.slug);
            }
            WorkspaceAction::List => {
                let all = workspaces.list().await?;
                if ctx.json {
                    return ctx.print_json(&all);
                }
                if all.is_empty() {
                    println!("📭 No workspaces yet");
                }
                for workspace in all {
                    println!("{}\t{}\t{}", workspace.slug, workspace.name, workspace.id);
                }
            }
        }
        Ok(())
    }
}
