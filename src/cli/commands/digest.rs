use anyhow::Result;

use super::CliContext;

pub struct StandupCommand {
    pub hours: Option<i64>,
}

impl StandupCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let workspace = ctx.workspace().await?;
        let standup = ctx.board.activity().standup(workspace.id, self.hours).await?;
        if ctx.json {
            return ctx.print_json(&standup);
        }

        println!("📣 STANDUP: {} (last {}h)", workspace.name, standup.hours);
        println!("==========================");
        if standup.by_agent.is_empty() {
            println!("📭 No activity since {}", standup.since.format("%Y-%m-%d %H:%M"));
            return Ok(());
        }
        for bucket in &standup.by_agent {
            println!();
            println!("🤖 {} ({} events)", bucket.agent_name, bucket.total);
            let types: Vec<String> = bucket.by_type.iter().map(|(k, v)| format!("{k}={v}")).collect();
            println!("   types: {}", types.join(", "));
            if !bucket.by_status.is_empty() {
                let statuses: Vec<String> = bucket.by_status.iter().map(|(k, v)| format!("{k}={v}")).collect();
                println!("   moved to: {}", statuses.join(", "));
            }
            for entry in &bucket.recent {
                println!("   - {} {}", entry.created_at.format("%H:%M"), entry.message);
            }
        }
        Ok(())
    }
}

pub struct FeedCommand {
    pub limit: usize,
}

impl FeedCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let workspace = ctx.workspace().await?;
        let feed = ctx.board.activity().recent(workspace.id, self.limit).await?;
        if ctx.json {
            return ctx.print_json(&feed);
        }
        if feed.is_empty() {
            println!("📭 No activity yet");
        }
        for activity in feed {
            println!(
                "{} [{}] {}",
                activity.created_at.format("%Y-%m-%d %H:%M:%S"),
                activity.kind,
                activity.message
            );
        }
        Ok(())
    }
}
