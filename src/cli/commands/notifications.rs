use anyhow::Result;

use super::{parse_arg, CliContext};
use crate::cli::NotificationAction;

pub struct NotificationsCommand<'a> {
    action: &'a NotificationAction,
}

impl<'a> NotificationsCommand<'a> {
    pub fn new(action: &'a NotificationAction) -> Self {
        Self { action }
    }

    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let workspace = ctx.workspace().await?;
        let notifications = ctx.board.notifications();
        match self.action {
            NotificationAction::List { agent, all, limit } => {
                let agent = ctx.agent(&workspace, agent).await?;
                let list = notifications
                    .for_agent(workspace.id, agent.id, *limit, !all)
                    .await?;
                if ctx.json {
                    return ctx.print_json(&list);
                }
                if list.is_empty() {
                    println!("📭 No notifications for {}", agent.name);
                }
                for n in list {
                    let marker = if n.delivered { "✓" } else { "•" };
                    println!("{marker} {}\t{}\t{}", n.id, n.created_at.to_rfc3339(), n.content);
                }
            }
            NotificationAction::Deliver { id } => {
                notifications
                    .mark_delivered(workspace.id, parse_arg(id, "notification id")?)
                    .await?;
                println!("✅ Marked {id} delivered");
            }
        }
        Ok(())
    }
}
