use tracing::info;

use crate::board::Board;
use crate::clock::stamp;
use crate::error::{BoardError, BoardResult};
use crate::model::{Workspace, WorkspaceId};

/// Lowercase, collapse every run of non-alphanumerics into one `-`, trim dashes
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.trim().chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

pub struct Workspaces<'a> {
    board: &'a Board,
}

impl Board {
    pub fn workspaces(&self) -> Workspaces<'_> {
        Workspaces { board: self }
    }
}

impl Workspaces<'_> {
    /// Create a tenant. The slug defaults to the slugified name and must be unique.
    pub async fn create(&self, name: &str, slug: Option<&str>) -> BoardResult<Workspace> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BoardError::Validation(
                "workspace name cannot be empty".to_string(),
            ));
        }

        let now = stamp(self.board.clock());
        let base = slug
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| slugify(name));
        let slug = if base.is_empty() {
            format!("workspace-{}", now.timestamp_millis())
        } else {
            base
        };

        if self.board.store().workspace_by_slug(&slug).await?.is_some() {
            return Err(BoardError::Validation(format!(
                "workspace slug already exists: {slug}"
            )));
        }

        let workspace = Workspace {
            id: WorkspaceId::new(),
            name: name.to_string(),
            slug,
            created_at: now,
            updated_at: now,
        };
        self.board.store().insert_workspace(&workspace).await?;
        info!(workspace_id = %workspace.id, slug = %workspace.slug, "Workspace created");
        Ok(workspace)
    }

    pub async fn get(&self, id: WorkspaceId) -> BoardResult<Workspace> {
        self.board
            .store()
            .get_workspace(id)
            .await?
            .ok_or_else(|| BoardError::not_found("workspace", id))
    }

    pub async fn by_slug(&self, slug: &str) -> BoardResult<Workspace> {
        self.board
            .store()
            .workspace_by_slug(slug.trim())
            .await?
            .ok_or_else(|| BoardError::not_found("workspace", slug.trim()))
    }

    /// Most recently updated first
    pub async fn list(&self) -> BoardResult<Vec<Workspace>> {
        self.board.store().list_workspaces().await
    }
}
