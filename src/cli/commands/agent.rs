use anyhow::Result;

use super::{parse_arg, CliContext};
use crate::agents::AgentDraft;
use crate::cli::{AgentAction, AgentUpsertArgs};
use crate::model::{AgentLevel, AgentStatus, Workspace};

pub struct AgentCommand<'a> {
    action: &'a AgentAction,
}

impl<'a> AgentCommand<'a> {
    pub fn new(action: &'a AgentAction) -> Self {
        Self { action }
    }

    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let workspace = ctx.workspace().await?;
        match self.action {
            AgentAction::Upsert(args) => self.upsert(ctx, &workspace, args).await,
            AgentAction::Status { agent, status } => {
                let status: AgentStatus = parse_arg(status, "agent status")?;
                let agent = ctx.agent(&workspace, agent).await?;
                let agent = ctx.board.agents().set_status(workspace.id, agent.id, status).await?;
                if ctx.json {
                    return ctx.print_json(&agent);
                }
                println!("✅ {} is now {}", agent.name, agent.status);
                Ok(())
            }
            AgentAction::List => {
                let agents = ctx.board.agents().list(workspace.id).await?;
                if ctx.json {
                    return ctx.print_json(&agents);
                }
                if agents.is_empty() {
                    println!("📭 No agents in {}", workspace.slug);
                }
                for agent in agents {
                    println!(
                        "{}\t{}\t{}\t{}\t{}",
                        agent.id, agent.name, agent.level, agent.status, agent.role
                    );
                }
                Ok(())
            }
        }
    }

    async fn upsert(&self, ctx: &CliContext, workspace: &Workspace, args: &AgentUpsertArgs) -> Result<()> {
        let level: AgentLevel = parse_arg(&args.level, "agent level")?;
        let mut draft = AgentDraft::new(&args.name, &args.role, level).tags(args.tags.iter().cloned());
        if let Some(prompt) = &args.prompt {
            draft = draft.prompt(prompt);
        }

        if let Some(id) = &args.id {
            let existing = ctx.board.agents().get(workspace.id, parse_arg(id, "agent id")?).await?;
            draft.id = Some(existing.id);
            draft = draft.status(existing.status);
            if args.prompt.is_none() {
                draft.prompt = existing.prompt;
            }
        }
        if let Some(status) = &args.status {
            draft = draft.status(parse_arg(status, "agent status")?);
        }

        let updating = draft.id.is_some();
        let agent = ctx.board.agents().upsert(workspace.id, draft).await?;
        if ctx.json {
            return ctx.print_json(&agent);
        }
        let verb = if updating { "Updated" } else { "Registered" };
        println!("✅ {verb} agent {} ({})", agent.name, agent.id);
        Ok(())
    }
}
