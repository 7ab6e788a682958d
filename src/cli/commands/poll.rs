use anyhow::Result;
use std::sync::Arc;

use super::CliContext;
use crate::dispatcher::Dispatcher;
use crate::shutdown::ShutdownSignal;

pub struct PollCommand {
    pub once: bool,
}

impl PollCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let config = &ctx.config;
        let dispatcher = Dispatcher::new(
            ctx.board.clone(),
            Arc::new(config.generator.build()),
            config.dispatcher.clone(),
            config.executor.clone(),
            config.coordinator.clone(),
        );

        if self.once {
            let summary = dispatcher.tick().await?;
            if ctx.json {
                return ctx.print_json(&summary);
            }
            println!(
                "🔁 fetched={} succeeded={} failed={} skipped={}",
                summary.fetched, summary.succeeded, summary.failed, summary.skipped
            );
            return Ok(());
        }

        let shutdown = ShutdownSignal::new();
        shutdown.install_ctrl_c();
        dispatcher.run(shutdown.subscribe()).await;
        Ok(())
    }
}
