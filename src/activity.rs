//! Append-only event log plus the two read models built on it: the live feed
//! and the standup digest.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::board::Board;
use crate::clock::stamp;
use crate::error::BoardResult;
use crate::model::{Activity, ActivityId, ActivityKind, AgentId, WorkspaceId};

pub const FEED_LIMIT: usize = 50;
pub const MAX_READ: usize = 2000;
pub const STANDUP_DEFAULT_HOURS: i64 = 24;
pub const STANDUP_MAX_HOURS: i64 = 168;
const STANDUP_SCAN: usize = 500;
const STANDUP_RECENT_PER_AGENT: usize = 5;

pub struct ActivityLog<'a> {
    board: &'a Board,
}

impl Board {
    pub fn activity(&self) -> ActivityLog<'_> {
        ActivityLog { board: self }
    }
}

impl ActivityLog<'_> {
    pub async fn record(
        &self,
        workspace: WorkspaceId,
        kind: ActivityKind,
        message: impl Into<String>,
        agent_id: Option<AgentId>,
    ) -> BoardResult<Activity> {
        let activity = Activity {
            id: ActivityId::new(),
            workspace_id: workspace,
            kind,
            message: message.into(),
            agent_id,
            created_at: stamp(self.board.clock()),
        };
        debug!(kind = %activity.kind, message = %activity.message, "Activity recorded");
        self.board.store().insert_activity(&activity).await?;
        Ok(activity)
    }

    /// Newest first, limit clamped to 1..=2000
    pub async fn recent(&self, workspace: WorkspaceId, limit: usize) -> BoardResult<Vec<Activity>> {
        self.board
            .store()
            .recent_activities(workspace, limit.clamp(1, MAX_READ))
            .await
    }

    /// The latest 50 entries
    pub async fn feed(&self, workspace: WorkspaceId) -> BoardResult<Vec<Activity>> {
        self.recent(workspace, FEED_LIMIT).await
    }

    /// Activities of the last `hours` (1..=168, default 24) grouped per agent
    pub async fn standup(&self, workspace: WorkspaceId, hours: Option<i64>) -> BoardResult<Standup> {
        let hours = hours
            .unwrap_or(STANDUP_DEFAULT_HOURS)
            .clamp(1, STANDUP_MAX_HOURS);
        let since = self.board.clock().now() - Duration::hours(hours);

        let names: HashMap<AgentId, String> = self
            .board
            .agents()
            .list(workspace)
            .await?
            .into_iter()
            .map(|a| (a.id, a.name))
            .collect();

        let windowed: Vec<Activity> = self
            .recent(workspace, STANDUP_SCAN)
            .await?
            .into_iter()
            .filter(|a| a.created_at >= since)
            .collect();

        let mut order: Vec<Option<AgentId>> = Vec::new();
        let mut buckets: HashMap<Option<AgentId>, StandupBucket> = HashMap::new();
        for activity in &windowed {
            let key = activity.agent_id;
            let bucket = buckets.entry(key).or_insert_with(|| {
                order.push(key);
                StandupBucket {
                    agent_id: key,
                    agent_name: match key {
                        Some(id) => names.get(&id).cloned().unwrap_or_else(|| "Agent".to_string()),
                        None => "System/Human".to_string(),
                    },
                    total: 0,
                    by_type: BTreeMap::new(),
                    by_status: BTreeMap::new(),
                    recent: Vec::new(),
                }
            });

            bucket.total += 1;
            *bucket
                .by_type
                .entry(activity.kind.as_str().to_string())
                .or_default() += 1;
            if activity.kind == ActivityKind::TaskStatus {
                if let Some(status) = target_status(&activity.message) {
                    *bucket.by_status.entry(status.to_string()).or_default() += 1;
                }
            }
            if bucket.recent.len() < STANDUP_RECENT_PER_AGENT {
                bucket.recent.push(StandupEntry {
                    created_at: activity.created_at,
                    kind: activity.kind.to_string(),
                    message: activity.message.clone(),
                });
            }
        }

        let mut by_agent: Vec<StandupBucket> = order
            .into_iter()
            .filter_map(|key| buckets.remove(&key))
            .collect();
        by_agent.sort_by(|a, b| b.total.cmp(&a.total));

        Ok(Standup {
            workspace_id: workspace,
            hours,
            since,
            total_activities: windowed.len(),
            by_agent,
        })
    }
}

/// Status named after the last " to " of a `task_status` message
fn target_status(message: &str) -> Option<&str> {
    let idx = message.rfind(" to ")?;
    let status = message[idx + 4..].trim();
    (!status.is_empty()).then_some(status)
}

#[derive(Debug, Clone, Serialize)]
pub struct Standup {
    pub workspace_id: WorkspaceId,
    pub hours: i64,
    pub since: DateTime<Utc>,
    pub total_activities: usize,
    pub by_agent: Vec<StandupBucket>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StandupBucket {
    pub agent_id: Option<AgentId>,
    pub agent_name: String,
    pub total: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_status: BTreeMap<String, usize>,
    pub recent: Vec<StandupEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StandupEntry {
    pub created_at: DateTime<Utc>,
    pub kind: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentDraft;
    use crate::clock::ManualClock;
    use crate::model::AgentLevel;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    #[test]
    fn test_target_status_uses_last_separator() {
        assert_eq!(target_status("Alice moved “Go to market” to review"), Some("review"));
        assert_eq!(target_status("no separator"), None);
        assert_eq!(target_status("moved to "), None);
    }

    #[tokio::test]
    async fn test_standup_groups_by_agent_and_respects_window() {
        let clock = Arc::new(ManualClock::default());
        let board = Board::new(Arc::new(MemoryStore::new()), clock.clone());
        let ws = board.workspaces().create("Default", None).await.unwrap().id;
        let alice = board
            .agents()
            .upsert(ws, AgentDraft::new("Alice", "Backend", AgentLevel::Spc))
            .await
            .unwrap();

        let log = board.activity();
        log.record(ws, ActivityKind::Heartbeat, "stale", Some(alice.id))
            .await
            .unwrap();
        clock.advance(Duration::hours(3));

        log.record(ws, ActivityKind::TaskStatus, "Alice moved “A” to review", Some(alice.id))
            .await
            .unwrap();
        log.record(ws, ActivityKind::TaskStatus, "Alice moved “B” to review", Some(alice.id))
            .await
            .unwrap();
        log.record(ws, ActivityKind::TaskCreated, "Task created: C", None)
            .await
            .unwrap();

        let standup = log.standup(ws, Some(2)).await.unwrap();
        assert_eq!(standup.hours, 2);
        assert_eq!(standup.total_activities, 3);
        assert_eq!(standup.by_agent.len(), 2);

        let first = &standup.by_agent[0];
        assert_eq!(first.agent_name, "Alice");
        assert_eq!(first.total, 2);
        assert_eq!(first.by_status.get("review"), Some(&2));
        assert_eq!(standup.by_agent[1].agent_name, "System/Human");

        let clamped = log.standup(ws, Some(10_000)).await.unwrap();
        assert_eq!(clamped.hours, STANDUP_MAX_HOURS);
        assert_eq!(clamped.total_activities, 4);
    }
}
