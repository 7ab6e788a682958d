use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{migrate::MigrateDatabase, Row, Sqlite};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use super::Store;
use crate::error::{BoardError, BoardResult};
use crate::model::*;

/// SQLite-backed store for durable boards
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database and optionally run migrations
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        auto_migrate: bool,
    ) -> BoardResult<Self> {
        let in_memory = database_url.contains(":memory:");

        if !in_memory {
            if let Some(parent) = file_path(database_url).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        BoardError::ExternalFailure(format!(
                            "cannot create database directory {}: {e}",
                            parent.display()
                        ))
                    })?;
                }
            }
            if !Sqlite::database_exists(database_url).await? {
                info!("Creating database at {}", database_url);
                Sqlite::create_database(database_url).await?;
            }
        }

        // Each in-memory connection is its own database
        let max_connections = if in_memory { 1 } else { max_connections.max(1) };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        if auto_migrate {
            info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Database migrations completed");
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }
}

fn file_path(database_url: &str) -> &Path {
    let trimmed = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    Path::new(trimmed.split('?').next().unwrap_or(trimmed))
}

fn corrupt(what: &str, detail: impl std::fmt::Display) -> BoardError {
    BoardError::ExternalFailure(format!("corrupt {what} row: {detail}"))
}

fn millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn timestamp(row: &SqliteRow, column: &str) -> BoardResult<DateTime<Utc>> {
    let value: i64 = row.try_get(column)?;
    DateTime::from_timestamp_millis(value).ok_or_else(|| corrupt(column, value))
}

fn uuid(row: &SqliteRow, column: &str) -> BoardResult<Uuid> {
    let value: String = row.try_get(column)?;
    Uuid::parse_str(&value).map_err(|e| corrupt(column, e))
}

fn json<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> BoardResult<T> {
    let value: String = row.try_get(column)?;
    serde_json::from_str(&value).map_err(|e| corrupt(column, e))
}

fn to_json<T: serde::Serialize>(value: &T) -> BoardResult<String> {
    serde_json::to_string(value)
        .map_err(|e| BoardError::ExternalFailure(format!("serialization error: {e}")))
}

fn workspace_from_row(row: &SqliteRow) -> BoardResult<Workspace> {
    Ok(Workspace {
        id: WorkspaceId(uuid(row, "id")?),
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

fn agent_from_row(row: &SqliteRow) -> BoardResult<Agent> {
    let level: String = row.try_get("level")?;
    let status: String = row.try_get("status")?;
    Ok(Agent {
        id: AgentId(uuid(row, "id")?),
        workspace_id: WorkspaceId(uuid(row, "workspace_id")?),
        name: row.try_get("name")?,
        role: row.try_get("role")?,
        level: level.parse().map_err(|e| corrupt("agent", e))?,
        status: status.parse().map_err(|e| corrupt("agent", e))?,
        prompt: row.try_get("prompt")?,
        tags: json(row, "tags")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

fn task_from_row(row: &SqliteRow) -> BoardResult<Task> {
    let status: String = row.try_get("status")?;
    let priority: Option<String> = row.try_get("priority")?;
    Ok(Task {
        id: TaskId(uuid(row, "id")?),
        workspace_id: WorkspaceId(uuid(row, "workspace_id")?),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: status.parse().map_err(|e| corrupt("task", e))?,
        tags: json(row, "tags")?,
        priority: priority
            .map(|p| p.parse())
            .transpose()
            .map_err(|e| corrupt("task", e))?,
        assignee_ids: json(row, "assignee_ids")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

fn message_from_row(row: &SqliteRow) -> BoardResult<Message> {
    Ok(Message {
        id: MessageId(uuid(row, "id")?),
        workspace_id: WorkspaceId(uuid(row, "workspace_id")?),
        task_id: TaskId(uuid(row, "task_id")?),
        author: json(row, "author")?,
        content: row.try_get("content")?,
        created_at: timestamp(row, "created_at")?,
    })
}

fn notification_from_row(row: &SqliteRow) -> BoardResult<Notification> {
    Ok(Notification {
        id: NotificationId(uuid(row, "id")?),
        workspace_id: WorkspaceId(uuid(row, "workspace_id")?),
        agent_id: AgentId(uuid(row, "agent_id")?),
        content: row.try_get("content")?,
        delivered: row.try_get("delivered")?,
        created_at: timestamp(row, "created_at")?,
    })
}

fn activity_from_row(row: &SqliteRow) -> BoardResult<Activity> {
    let kind: String = row.try_get("kind")?;
    let agent_id: Option<String> = row.try_get("agent_id")?;
    Ok(Activity {
        id: ActivityId(uuid(row, "id")?),
        workspace_id: WorkspaceId(uuid(row, "workspace_id")?),
        kind: kind.into(),
        message: row.try_get("message")?,
        agent_id: agent_id
            .map(|id| Uuid::parse_str(&id).map(AgentId))
            .transpose()
            .map_err(|e| corrupt("activity", e))?,
        created_at: timestamp(row, "created_at")?,
    })
}

fn run_request_from_row(row: &SqliteRow) -> BoardResult<RunRequest> {
    let status: String = row.try_get("status")?;
    Ok(RunRequest {
        id: RunRequestId(uuid(row, "id")?),
        workspace_id: WorkspaceId(uuid(row, "workspace_id")?),
        agent_id: AgentId(uuid(row, "agent_id")?),
        status: status.parse().map_err(|e| corrupt("run request", e))?,
        note: row.try_get("note")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

fn collect<T>(rows: Vec<SqliteRow>, map: fn(&SqliteRow) -> BoardResult<T>) -> BoardResult<Vec<T>> {
    rows.iter().map(map).collect()
}

fn limit(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_workspace(&self, workspace: &Workspace) -> BoardResult<()> {
        sqlx::query(
            r#"
            INSERT INTO workspaces (id, name, slug, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(workspace.id.to_string())
        .bind(&workspace.name)
        .bind(&workspace.slug)
        .bind(millis(workspace.created_at))
        .bind(millis(workspace.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_workspace(&self, id: WorkspaceId) -> BoardResult<Option<Workspace>> {
        let row = sqlx::query("SELECT * FROM workspaces WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(workspace_from_row).transpose()
    }

    async fn workspace_by_slug(&self, slug: &str) -> BoardResult<Option<Workspace>> {
        let row = sqlx::query("SELECT * FROM workspaces WHERE slug = ?1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(workspace_from_row).transpose()
    }

    async fn list_workspaces(&self) -> BoardResult<Vec<Workspace>> {
        let rows = sqlx::query("SELECT * FROM workspaces ORDER BY updated_at DESC, rowid DESC")
            .fetch_all(&self.pool)
            .await?;
        collect(rows, workspace_from_row)
    }

    async fn upsert_agent(&self, agent: &Agent) -> BoardResult<()> {
        sqlx::query(
            r#"
            INSERT INTO agents (id, workspace_id, name, role, level, status, prompt, tags, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                role = excluded.role,
                level = excluded.level,
                status = excluded.status,
                prompt = excluded.prompt,
                tags = excluded.tags,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(agent.id.to_string())
        .bind(agent.workspace_id.to_string())
        .bind(&agent.name)
        .bind(&agent.role)
        .bind(agent.level.as_str())
        .bind(agent.status.as_str())
        .bind(&agent.prompt)
        .bind(to_json(&agent.tags)?)
        .bind(millis(agent.created_at))
        .bind(millis(agent.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_agent(&self, id: AgentId) -> BoardResult<Option<Agent>> {
        let row = sqlx::query("SELECT * FROM agents WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(agent_from_row).transpose()
    }

    async fn list_agents(&self, workspace: WorkspaceId) -> BoardResult<Vec<Agent>> {
        let rows = sqlx::query("SELECT * FROM agents WHERE workspace_id = ?1 ORDER BY name ASC")
            .bind(workspace.to_string())
            .fetch_all(&self.pool)
            .await?;
        collect(rows, agent_from_row)
    }

    async fn insert_task(&self, task: &Task) -> BoardResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (id, workspace_id, title, description, status, tags, priority, assignee_ids, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(task.id.to_string())
        .bind(task.workspace_id.to_string())
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(to_json(&task.tags)?)
        .bind(task.priority.map(|p| p.as_str()))
        .bind(to_json(&task.assignee_ids)?)
        .bind(millis(task.created_at))
        .bind(millis(task.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_task(&self, task: &Task) -> BoardResult<()> {
        sqlx::query(
            r#"
            UPDATE tasks SET
                title = ?2,
                description = ?3,
                status = ?4,
                tags = ?5,
                priority = ?6,
                assignee_ids = ?7,
                updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(task.id.to_string())
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(to_json(&task.tags)?)
        .bind(task.priority.map(|p| p.as_str()))
        .bind(to_json(&task.assignee_ids)?)
        .bind(millis(task.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_task(&self, id: TaskId) -> BoardResult<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn list_tasks(&self, workspace: WorkspaceId) -> BoardResult<Vec<Task>> {
        let rows = sqlx::query(
            "SELECT * FROM tasks WHERE workspace_id = ?1 ORDER BY updated_at DESC, rowid DESC",
        )
        .bind(workspace.to_string())
        .fetch_all(&self.pool)
        .await?;
        collect(rows, task_from_row)
    }

    async fn delete_task(&self, id: TaskId) -> BoardResult<bool> {
        sqlx::query("DELETE FROM messages WHERE task_id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_message(&self, message: &Message) -> BoardResult<()> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, workspace_id, task_id, author, content, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(message.id.to_string())
        .bind(message.workspace_id.to_string())
        .bind(message.task_id.to_string())
        .bind(to_json(&message.author)?)
        .bind(&message.content)
        .bind(millis(message.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_messages(&self, task: TaskId) -> BoardResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE task_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )
        .bind(task.to_string())
        .fetch_all(&self.pool)
        .await?;
        collect(rows, message_from_row)
    }

    async fn insert_notification(&self, notification: &Notification) -> BoardResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, workspace_id, agent_id, content, delivered, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(notification.id.to_string())
        .bind(notification.workspace_id.to_string())
        .bind(notification.agent_id.to_string())
        .bind(&notification.content)
        .bind(notification.delivered)
        .bind(millis(notification.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_notification(&self, id: NotificationId) -> BoardResult<Option<Notification>> {
        let row = sqlx::query("SELECT * FROM notifications WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(notification_from_row).transpose()
    }

    async fn mark_notification_delivered(&self, id: NotificationId) -> BoardResult<()> {
        sqlx::query("UPDATE notifications SET delivered = 1 WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_notifications(
        &self,
        workspace: WorkspaceId,
        agent: Option<AgentId>,
    ) -> BoardResult<Vec<Notification>> {
        let rows = match agent {
            Some(agent) => {
                sqlx::query(
                    r#"
                    SELECT * FROM notifications
                    WHERE workspace_id = ?1 AND agent_id = ?2
                    ORDER BY created_at DESC, rowid DESC
                    "#,
                )
                .bind(workspace.to_string())
                .bind(agent.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT * FROM notifications
                    WHERE workspace_id = ?1
                    ORDER BY created_at DESC, rowid DESC
                    "#,
                )
                .bind(workspace.to_string())
                .fetch_all(&self.pool)
                .await?
            }
        };
        collect(rows, notification_from_row)
    }

    async fn insert_activity(&self, activity: &Activity) -> BoardResult<()> {
        sqlx::query(
            r#"
            INSERT INTO activities (id, workspace_id, kind, message, agent_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(activity.id.to_string())
        .bind(activity.workspace_id.to_string())
        .bind(activity.kind.as_str())
        .bind(&activity.message)
        .bind(activity.agent_id.map(|id| id.to_string()))
        .bind(millis(activity.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_activities(
        &self,
        workspace: WorkspaceId,
        limit_to: usize,
    ) -> BoardResult<Vec<Activity>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM activities
            WHERE workspace_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(workspace.to_string())
        .bind(limit(limit_to))
        .fetch_all(&self.pool)
        .await?;
        collect(rows, activity_from_row)
    }

    async fn insert_run_request(&self, request: &RunRequest) -> BoardResult<()> {
        sqlx::query(
            r#"
            INSERT INTO run_requests (id, workspace_id, agent_id, status, note, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(request.id.to_string())
        .bind(request.workspace_id.to_string())
        .bind(request.agent_id.to_string())
        .bind(request.status.as_str())
        .bind(&request.note)
        .bind(millis(request.created_at))
        .bind(millis(request.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_run_request(&self, request: &RunRequest) -> BoardResult<()> {
        sqlx::query("UPDATE run_requests SET status = ?2, note = ?3, updated_at = ?4 WHERE id = ?1")
            .bind(request.id.to_string())
            .bind(request.status.as_str())
            .bind(&request.note)
            .bind(millis(request.updated_at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_run_request(&self, id: RunRequestId) -> BoardResult<Option<RunRequest>> {
        let row = sqlx::query("SELECT * FROM run_requests WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(run_request_from_row).transpose()
    }

    async fn pending_run_requests(
        &self,
        workspace: Option<WorkspaceId>,
        limit_to: usize,
    ) -> BoardResult<Vec<RunRequest>> {
        let rows = match workspace {
            Some(workspace) => {
                sqlx::query(
                    r#"
                    SELECT * FROM run_requests
                    WHERE status = 'pending' AND workspace_id = ?1
                    ORDER BY created_at ASC, rowid ASC
                    LIMIT ?2
                    "#,
                )
                .bind(workspace.to_string())
                .bind(limit(limit_to))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT * FROM run_requests
                    WHERE status = 'pending'
                    ORDER BY created_at ASC, rowid ASC
                    LIMIT ?1
                    "#,
                )
                .bind(limit(limit_to))
                .fetch_all(&self.pool)
                .await?
            }
        };
        collect(rows, run_request_from_row)
    }

    async fn run_requests_for_agent(
        &self,
        workspace: WorkspaceId,
        agent: AgentId,
        limit_to: usize,
    ) -> BoardResult<Vec<RunRequest>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM run_requests
            WHERE workspace_id = ?1 AND agent_id = ?2
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?3
            "#,
        )
        .bind(workspace.to_string())
        .bind(agent.to_string())
        .bind(limit(limit_to))
        .fetch_all(&self.pool)
        .await?;
        collect(rows, run_request_from_row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::BTreeSet;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:", 1, true)
            .await
            .expect("in-memory database")
    }

    fn workspace() -> Workspace {
        let now = Utc::now();
        Workspace {
            id: WorkspaceId::new(),
            name: "Default".to_string(),
            slug: "default".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_task_round_trip_preserves_assignees_and_tags() {
        let store = store().await;
        let ws = workspace();
        store.insert_workspace(&ws).await.unwrap();

        let now = Utc::now();
        let agent = AgentId::new();
        let task = Task {
            id: TaskId::new(),
            workspace_id: ws.id,
            title: "Ship it".to_string(),
            description: Some("all of it".to_string()),
            status: TaskStatus::Assigned,
            tags: vec!["backend".to_string(), "urgent".to_string()],
            priority: Some(crate::priority::Priority::High),
            assignee_ids: BTreeSet::from([agent]),
            created_at: now,
            updated_at: now,
        };
        store.insert_task(&task).await.unwrap();

        let loaded = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Ship it");
        assert_eq!(loaded.status, TaskStatus::Assigned);
        assert_eq!(loaded.tags, task.tags);
        assert!(loaded.assignee_ids.contains(&agent));
        assert_eq!(loaded.updated_at.timestamp_millis(), now.timestamp_millis());

        assert!(store.delete_task(task.id).await.unwrap());
        assert!(store.get_task(task.id).await.unwrap().is_none());
        assert!(!store.delete_task(task.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_pending_requests_are_oldest_first() {
        let store = store().await;
        let ws = workspace();
        let agent = AgentId::new();
        let base = Utc::now();

        let mut ids = Vec::new();
        for offset in [2, 0, 1] {
            let at = base + Duration::seconds(offset);
            let request = RunRequest {
                id: RunRequestId::new(),
                workspace_id: ws.id,
                agent_id: agent,
                status: RunStatus::Pending,
                note: None,
                created_at: at,
                updated_at: at,
            };
            store.insert_run_request(&request).await.unwrap();
            ids.push((offset, request.id));
        }

        let pending = store.pending_run_requests(Some(ws.id), 10).await.unwrap();
        let offsets: Vec<i64> = pending
            .iter()
            .map(|r| (r.created_at - base).num_seconds())
            .collect();
        assert_eq!(offsets, vec![0, 1, 2]);

        let newest = store.run_requests_for_agent(ws.id, agent, 1).await.unwrap();
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0].id, ids[0].1);
    }
}
