//! Mention parsing and per-recipient notification records.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::board::Board;
use crate::clock::stamp;
use crate::error::{BoardError, BoardResult};
use crate::model::{Actor, AgentId, Notification, NotificationId, Task, WorkspaceId};

pub const NOTIFICATION_BUDGET: usize = 200;
pub const DEFAULT_LIST_LIMIT: usize = 50;
pub const MAX_LIST_LIMIT: usize = 200;

static ALL_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|\W)@all\b").expect("valid @all pattern"));

static NAME_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|\W)@([a-z0-9_-]+)").expect("valid mention pattern"));

/// Who a message body addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mentions {
    All,
    /// Lowercased, deduplicated handles
    Names(BTreeSet<String>),
}

impl Mentions {
    pub fn is_empty(&self) -> bool {
        matches!(self, Mentions::Names(names) if names.is_empty())
    }
}

pub fn extract_mentions(body: &str) -> Mentions {
    if ALL_MENTION.is_match(body) {
        return Mentions::All;
    }
    Mentions::Names(
        NAME_MENTION
            .captures_iter(body)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_lowercase())
            .collect(),
    )
}

/// Trim, then cut to at most `max_chars` characters, ending with `…` when cut
pub fn truncate(s: &str, max_chars: usize) -> String {
    let trimmed = s.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub struct Notifications<'a> {
    board: &'a Board,
}

impl Board {
    pub fn notifications(&self) -> Notifications<'_> {
        Notifications { board: self }
    }
}

impl Notifications<'_> {
    /// Write one undelivered notification per agent mentioned in `content`.
    /// Unknown handles are ignored. Not idempotent: call once per message.
    pub async fn fan_out(
        &self,
        workspace: WorkspaceId,
        task: &Task,
        author: &Actor,
        content: &str,
    ) -> BoardResult<Vec<Notification>> {
        let mentions = extract_mentions(content);
        if mentions.is_empty() {
            return Ok(Vec::new());
        }

        let agents = self.board.agents().list(workspace).await?;
        let recipients: BTreeSet<AgentId> = match &mentions {
            Mentions::All => agents.iter().map(|a| a.id).collect(),
            Mentions::Names(names) => agents
                .iter()
                .filter(|a| names.contains(&a.name.to_lowercase()))
                .map(|a| a.id)
                .collect(),
        };
        if recipients.is_empty() {
            debug!(task_id = %task.id, "Mentions matched no agents");
            return Ok(Vec::new());
        }

        let actor = self.board.agents().display_name(author).await?;
        let body = format!(
            "{actor} mentioned you on “{}”: {}",
            task.title,
            truncate(content, NOTIFICATION_BUDGET)
        );

        let mut created = Vec::with_capacity(recipients.len());
        for agent_id in recipients {
            let notification = Notification {
                id: NotificationId::new(),
                workspace_id: workspace,
                agent_id,
                content: body.clone(),
                delivered: false,
                created_at: stamp(self.board.clock()),
            };
            self.board.store().insert_notification(&notification).await?;
            created.push(notification);
        }
        info!(task_id = %task.id, recipients = created.len(), "Mention notifications created");
        Ok(created)
    }

    /// Newest first. `limit` defaults to 50 and is clamped to 1..=200.
    pub async fn for_agent(
        &self,
        workspace: WorkspaceId,
        agent: AgentId,
        limit: Option<usize>,
        undelivered_only: bool,
    ) -> BoardResult<Vec<Notification>> {
        self.board.agents().get(workspace, agent).await?;
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        Ok(self
            .board
            .store()
            .list_notifications(workspace, Some(agent))
            .await?
            .into_iter()
            .filter(|n| !undelivered_only || !n.delivered)
            .take(limit)
            .collect())
    }

    /// Flip `delivered` to true. Already-delivered is a no-op.
    pub async fn mark_delivered(&self, workspace: WorkspaceId, id: NotificationId) -> BoardResult<()> {
        let notification = self
            .board
            .store()
            .get_notification(id)
            .await?
            .ok_or_else(|| BoardError::not_found("notification", id))?;
        if notification.workspace_id != workspace {
            return Err(BoardError::wrong_tenant("notification", id));
        }
        if !notification.delivered {
            self.board.store().mark_notification_delivered(id).await?;
        }
        Ok(())
    }

    pub async fn total_undelivered(&self, workspace: WorkspaceId) -> BoardResult<usize> {
        Ok(self
            .board
            .store()
            .list_notifications(workspace, None)
            .await?
            .iter()
            .filter(|n| !n.delivered)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(list: &[&str]) -> Mentions {
        Mentions::Names(list.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_all_wins_over_names() {
        assert_eq!(extract_mentions("ping @all please"), Mentions::All);
        assert_eq!(extract_mentions("@ALL hands"), Mentions::All);
        assert_eq!(extract_mentions("@alice and @ALL"), Mentions::All);
    }

    #[test]
    fn test_names_are_lowercased_and_deduplicated() {
        assert_eq!(
            extract_mentions("@Alice and @alice check this"),
            names(&["alice"])
        );
        assert_eq!(
            extract_mentions("(@bob-2) cc @carol_x."),
            names(&["bob-2", "carol_x"])
        );
    }

    #[test]
    fn test_email_addresses_and_allowance_are_not_mentions() {
        assert!(extract_mentions("mail ops@all.example").is_empty());
        assert_eq!(extract_mentions("@allowance review"), names(&["allowance"]));
        assert!(extract_mentions("no mentions here").is_empty());
    }

    #[test]
    fn test_truncate_appends_ellipsis_only_when_cut() {
        assert_eq!(truncate("  short  ", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
        assert_eq!(truncate("héllo wörld", 6), "héllo…");
    }

    proptest! {
        #[test]
        fn prop_truncate_respects_budget(s in "\\PC{0,300}", n in 1usize..250) {
            let trimmed = s.trim();
            let out = truncate(&s, n);
            if trimmed.chars().count() <= n {
                prop_assert_eq!(out.as_str(), trimmed);
            } else {
                prop_assert_eq!(out.chars().count(), n);
                prop_assert!(out.ends_with('…'));
                let kept: String = out.chars().take(n - 1).collect();
                prop_assert!(trimmed.starts_with(&kept));
            }
        }

        #[test]
        fn prop_mentions_never_contain_uppercase(s in "[ @a-zA-Z0-9_-]{0,80}") {
            if let Mentions::Names(found) = extract_mentions(&s) {
                for name in found {
                    prop_assert_eq!(name.clone(), name.to_lowercase());
                    prop_assert!(!name.is_empty());
                }
            }
        }
    }
}
