//! Agent directory: who can be assigned, mentioned and dispatched.

use tracing::info;

use crate::board::Board;
use crate::clock::{bump, stamp};
use crate::error::{BoardError, BoardResult};
use crate::model::{Actor, Agent, AgentId, AgentLevel, AgentStatus, WorkspaceId};

/// Fields accepted by [`AgentDirectory::upsert`]. `id: None` creates.
#[derive(Debug, Clone)]
pub struct AgentDraft {
    pub id: Option<AgentId>,
    pub name: String,
    pub role: String,
    pub level: AgentLevel,
    pub status: AgentStatus,
    pub prompt: Option<String>,
    pub tags: Vec<String>,
}

impl AgentDraft {
    pub fn new(name: impl Into<String>, role: impl Into<String>, level: AgentLevel) -> Self {
        Self {
            id: None,
            name: name.into(),
            role: role.into(),
            level,
            status: AgentStatus::Active,
            prompt: None,
            tags: Vec::new(),
        }
    }

    pub fn status(mut self, status: AgentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

pub struct AgentDirectory<'a> {
    board: &'a Board,
}

impl Board {
    pub fn agents(&self) -> AgentDirectory<'_> {
        AgentDirectory { board: self }
    }
}

impl AgentDirectory<'_> {
    /// Create or update an agent. Names are unique per workspace, ignoring case.
    pub async fn upsert(&self, workspace: WorkspaceId, draft: AgentDraft) -> BoardResult<Agent> {
        self.board.workspaces().get(workspace).await?;

        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(BoardError::Validation("agent name cannot be empty".to_string()));
        }
        let tags: Vec<String> = draft
            .tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let existing = match draft.id {
            Some(id) => Some(self.get(workspace, id).await?),
            None => None,
        };

        let clash = self
            .board
            .store()
            .list_agents(workspace)
            .await?
            .into_iter()
            .find(|a| same_name(&a.name, &name) && Some(a.id) != draft.id);
        if let Some(clash) = clash {
            return Err(BoardError::Validation(format!(
                "agent name already in use: {} ({})",
                clash.name, clash.id
            )));
        }

        let agent = match existing {
            Some(existing) => Agent {
                name,
                role: draft.role,
                level: draft.level,
                status: draft.status,
                prompt: draft.prompt,
                tags,
                updated_at: bump(self.board.clock(), existing.updated_at),
                ..existing
            },
            None => {
                let now = stamp(self.board.clock());
                Agent {
                    id: AgentId::new(),
                    workspace_id: workspace,
                    name,
                    role: draft.role,
                    level: draft.level,
                    status: draft.status,
                    prompt: draft.prompt,
                    tags,
                    created_at: now,
                    updated_at: now,
                }
            }
        };

        self.board.store().upsert_agent(&agent).await?;
        info!(agent_id = %agent.id, name = %agent.name, level = %agent.level, "Agent upserted");
        Ok(agent)
    }

    /// Fetch an agent, enforcing that it belongs to `workspace`
    pub async fn get(&self, workspace: WorkspaceId, id: AgentId) -> BoardResult<Agent> {
        let agent = self
            .board
            .store()
            .get_agent(id)
            .await?
            .ok_or_else(|| BoardError::not_found("agent", id))?;
        if agent.workspace_id != workspace {
            return Err(BoardError::wrong_tenant("agent", id));
        }
        Ok(agent)
    }

    /// Ordered by name
    pub async fn list(&self, workspace: WorkspaceId) -> BoardResult<Vec<Agent>> {
        self.board.store().list_agents(workspace).await
    }

    /// Look an agent up by id or by case-insensitive name. Surrounding quotes
    /// are ignored. An id owned by another workspace is an error; an unknown
    /// name or id is `None`.
    pub async fn resolve(&self, workspace: WorkspaceId, name_or_id: &str) -> BoardResult<Option<Agent>> {
        let needle = name_or_id.trim().trim_matches('"').trim();
        if needle.is_empty() {
            return Ok(None);
        }

        if let Ok(id) = needle.parse::<AgentId>() {
            return match self.get(workspace, id).await {
                Ok(agent) => Ok(Some(agent)),
                Err(e) if e.is_not_found() => Ok(None),
                Err(e) => Err(e),
            };
        }

        Ok(self
            .list(workspace)
            .await?
            .into_iter()
            .find(|a| same_name(&a.name, needle)))
    }

    pub async fn set_status(
        &self,
        workspace: WorkspaceId,
        id: AgentId,
        status: AgentStatus,
    ) -> BoardResult<Agent> {
        let mut agent = self.get(workspace, id).await?;
        if agent.status == status {
            return Ok(agent);
        }
        agent.status = status;
        agent.updated_at = bump(self.board.clock(), agent.updated_at);
        self.board.store().upsert_agent(&agent).await?;
        info!(agent_id = %agent.id, status = %status, "Agent status changed");
        Ok(agent)
    }

    /// Name used for an actor in activity and notification text
    pub async fn display_name(&self, actor: &Actor) -> BoardResult<String> {
        Ok(match actor {
            Actor::Agent { id } => self
                .board
                .store()
                .get_agent(*id)
                .await?
                .map(|a| a.name)
                .unwrap_or_else(|| "Agent".to_string()),
            Actor::Human { name } if !name.trim().is_empty() => name.trim().to_string(),
            Actor::Human { .. } => "Human".to_string(),
            Actor::System => "System".to_string(),
        })
    }
}

/// Names compare the way mentions are matched: Unicode lowercase
fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
