use anyhow::Result;
use std::collections::HashMap;

use super::{parse_arg, CliContext};
use crate::cli::{TaskAction, TasksAction};
use crate::model::{AgentId, Task, TaskId, Workspace};
use crate::tasks::{NewTask, TaskFilter};

/// `id status "title" [assignees]`
async fn print_task_line(ctx: &CliContext, workspace: &Workspace, task: &Task) -> Result<()> {
    let names = agent_names(ctx, workspace).await?;
    println!("{}", task_line(task, &names));
    Ok(())
}

async fn agent_names(ctx: &CliContext, workspace: &Workspace) -> Result<HashMap<AgentId, String>> {
    Ok(ctx
        .board
        .agents()
        .list(workspace.id)
        .await?
        .into_iter()
        .map(|a| (a.id, a.name))
        .collect())
}

fn task_line(task: &Task, names: &HashMap<AgentId, String>) -> String {
    let mut assignees: Vec<&str> = task
        .assignee_ids
        .iter()
        .map(|id| names.get(id).map(String::as_str).unwrap_or("?"))
        .collect();
    assignees.sort_unstable();
    let priority = task.priority.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
    format!(
        "{}\t{}\t{}\t\"{}\"\t[{}]",
        task.id,
        task.status,
        priority,
        task.title,
        assignees.join(", ")
    )
}

pub struct TasksCommand<'a> {
    action: &'a TasksAction,
}

impl<'a> TasksCommand<'a> {
    pub fn new(action: &'a TasksAction) -> Self {
        Self { action }
    }

    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let workspace = ctx.workspace().await?;
        match self.action {
            TasksAction::List {
                status,
                assignee,
                limit,
            } => {
                let filter = TaskFilter {
                    status: status.as_deref().map(|s| parse_arg(s, "status")).transpose()?,
                    assignee: match assignee {
                        Some(reference) => Some(ctx.agent(&workspace, reference).await?.id),
                        None => None,
                    },
                    limit: *limit,
                };
                let tasks = ctx.board.tasks().list(workspace.id, &filter).await?;
                if ctx.json {
                    return ctx.print_json(&tasks);
                }
                if tasks.is_empty() {
                    println!("📭 No matching tasks");
                }
                let names = agent_names(ctx, &workspace).await?;
                for task in &tasks {
                    println!("{}", task_line(task, &names));
                }
            }
            TasksAction::Normalize => {
                let moved = ctx.board.tasks().normalize_assigned(workspace.id).await?;
                println!("🔧 Moved {moved} task(s) from inbox to assigned");
            }
        }
        Ok(())
    }
}

pub struct TaskCommand<'a> {
    action: &'a TaskAction,
}

impl<'a> TaskCommand<'a> {
    pub fn new(action: &'a TaskAction) -> Self {
        Self { action }
    }

    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let workspace = ctx.workspace().await?;
        let tasks = ctx.board.tasks();
        let operator = ctx.actor(&workspace, None).await?;

        let task = match self.action {
            TaskAction::Create {
                title,
                description,
                tags,
                priority,
                status,
            } => {
                let new = NewTask {
                    title: title.clone(),
                    description: description.clone(),
                    tags: tags.clone(),
                    priority: priority.as_deref().map(|p| parse_arg(p, "priority")).transpose()?,
                    status: status.as_deref().map(|s| parse_arg(s, "status")).transpose()?,
                };
                tasks.create(workspace.id, new, &operator).await?
            }
            TaskAction::Get { id } => {
                let task = tasks.get(workspace.id, task_id(id)?).await?;
                if ctx.json {
                    return ctx.print_json(&task);
                }
                print_task_line(ctx, &workspace, &task).await?;
                if let Some(description) = task.description.as_deref() {
                    println!("   📄 {description}");
                }
                if !task.tags.is_empty() {
                    println!("   🏷️  {}", task.tags.join(", "));
                }
                println!(
                    "   🕒 created {} · updated {}",
                    task.created_at.to_rfc3339(),
                    task.updated_at.to_rfc3339()
                );
                return Ok(());
            }
            TaskAction::Messages { id } => {
                let thread = ctx.board.messages().list(workspace.id, task_id(id)?).await?;
                if ctx.json {
                    return ctx.print_json(&thread);
                }
                if thread.is_empty() {
                    println!("📭 No messages yet");
                }
                for message in thread {
                    let author = ctx.board.agents().display_name(&message.author).await?;
                    println!("[{}] {}: {}", message.created_at.format("%Y-%m-%d %H:%M"), author, message.content);
                }
                return Ok(());
            }
            TaskAction::Status { id, status, as_agent } => {
                let actor = ctx.actor(&workspace, as_agent.as_deref()).await?;
                tasks
                    .transition(workspace.id, task_id(id)?, parse_arg(status, "status")?, &actor)
                    .await?
            }
            TaskAction::Assign { id, agent } => {
                let agent = ctx.agent(&workspace, agent).await?;
                tasks.assign(workspace.id, task_id(id)?, agent.id, &operator).await?
            }
            TaskAction::Unassign { id, agent } => {
                let agent = ctx.agent(&workspace, agent).await?;
                tasks.unassign(workspace.id, task_id(id)?, agent.id, &operator).await?
            }
            TaskAction::Claim { agent } => {
                let agent = ctx.agent(&workspace, agent).await?;
                match tasks.claim_unassigned(workspace.id, agent.id).await? {
                    Some(task) => task,
                    None => {
                        if ctx.json {
                            return ctx.print_json(&serde_json::Value::Null);
                        }
                        println!("📭 Nothing for {} to claim", agent.name);
                        return Ok(());
                    }
                }
            }
            TaskAction::Purge { id } => {
                let task = tasks.purge(workspace.id, task_id(id)?).await?;
                if ctx.json {
                    return ctx.print_json(&task);
                }
                println!("🗑️  Purged \"{}\"", task.title);
                return Ok(());
            }
        };

        if ctx.json {
            return ctx.print_json(&task);
        }
        print_task_line(ctx, &workspace, &task).await
    }
}

fn task_id(raw: &str) -> Result<TaskId> {
    parse_arg(raw, "task id")
}
