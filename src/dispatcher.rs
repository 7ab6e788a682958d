//! Queue poller: drains pending run requests into agent executors and
//! coordinators on a bounded worker pool.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, Instrument};

use crate::board::Board;
use crate::clock::stamp;
use crate::config::DispatcherConfig;
use crate::coordinator::{Coordinator, CoordinatorPolicy};
use crate::error::{BoardError, BoardResult};
use crate::executor::{AgentExecutor, ExecutorPolicy};
use crate::generate::Generator;
use crate::model::{Agent, AgentId, RunRequest, RunStatus, WorkspaceId};
use crate::observability::{DispatchMetrics, OperationTimer};
use crate::shutdown;
use crate::telemetry::{create_dispatch_span, generate_correlation_id};

pub const WORKSPACE_NOT_FOUND: &str = "Workspace not found";
pub const AGENT_NOT_FOUND: &str = "Agent not found";

type Key = (WorkspaceId, AgentId);

/// (workspace, agent) pairs with an invocation running
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<Mutex<HashSet<Key>>>);

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, HashSet<Key>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// None when the key is already held
    pub fn try_acquire(&self, workspace: WorkspaceId, agent: AgentId) -> Option<InFlightGuard> {
        let key = (workspace, agent);
        if !self.lock().insert(key) {
            return None;
        }
        Some(InFlightGuard {
            set: self.clone(),
            key,
        })
    }

    pub fn contains(&self, workspace: WorkspaceId, agent: AgentId) -> bool {
        self.lock().contains(&(workspace, agent))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases its key on drop, whichever way the invocation ended
#[derive(Debug)]
pub struct InFlightGuard {
    set: InFlight,
    key: Key,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.key);
    }
}

/// What one poll did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    pub fetched: usize,
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

enum Settled {
    Done,
    Failed,
}

/// Everything a worker needs, shared by all workers
struct Shared {
    board: Board,
    generator: Arc<dyn Generator>,
    executor: ExecutorPolicy,
    coordinator: CoordinatorPolicy,
    metrics: Arc<DispatchMetrics>,
    timeout: Duration,
    forced: bool,
    host: String,
}

pub struct Dispatcher {
    shared: Arc<Shared>,
    config: DispatcherConfig,
    in_flight: InFlight,
    workers: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(
        board: Board,
        generator: Arc<dyn Generator>,
        config: DispatcherConfig,
        executor: ExecutorPolicy,
        coordinator: CoordinatorPolicy,
    ) -> Self {
        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown-host".to_string());
        let workers = Arc::new(Semaphore::new(config.max_workers.max(1)));
        Self {
            shared: Arc::new(Shared {
                board,
                generator,
                executor,
                coordinator,
                metrics: Arc::new(DispatchMetrics::new()),
                timeout: config.invocation_timeout(),
                forced: config.force_on_request,
                host,
            }),
            config,
            in_flight: InFlight::default(),
            workers,
        }
    }

    pub fn metrics(&self) -> Arc<DispatchMetrics> {
        Arc::clone(&self.shared.metrics)
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Fetch one batch of pending requests and run them to completion.
    /// Requests whose (workspace, agent) is already running stay pending.
    pub async fn tick(&self) -> BoardResult<TickSummary> {
        let timer = OperationTimer::new("dispatch_tick");
        self.shared.metrics.record_tick();

        let pending = self
            .shared
            .board
            .runs()
            .list_pending(None, Some(self.config.batch_size.max(1)))
            .await?;
        let mut summary = TickSummary {
            fetched: pending.len(),
            ..TickSummary::default()
        };

        let mut jobs = JoinSet::new();
        for request in pending {
            let Some(guard) = self
                .in_flight
                .try_acquire(request.workspace_id, request.agent_id)
            else {
                debug!(request_id = %request.id, agent_id = %request.agent_id, "Agent already running, leaving request pending");
                self.shared.metrics.record_skip();
                summary.skipped += 1;
                continue;
            };

            let permit = Arc::clone(&self.workers)
                .acquire_owned()
                .await
                .map_err(|_| BoardError::ExternalFailure("worker pool closed".to_string()))?;

            self.shared.metrics.record_dispatch();
            summary.dispatched += 1;
            let shared = Arc::clone(&self.shared);
            jobs.spawn(async move {
                let _permit = permit;
                let _guard = guard;
                shared.process(request).await
            });
        }

        while let Some(joined) = jobs.join_next().await {
            match joined {
                Ok(Settled::Done) => summary.succeeded += 1,
                Ok(Settled::Failed) => summary.failed += 1,
                Err(e) => {
                    error!("Dispatch worker panicked: {}", e);
                    self.shared.metrics.record_failure();
                    summary.failed += 1;
                }
            }
        }

        if summary.fetched > 0 {
            timer.finish();
        }
        Ok(summary)
    }

    /// Poll until `shutdown` fires. A tick in progress is finished first.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_seconds = self.config.poll_interval().as_secs(),
            max_workers = self.config.max_workers,
            "Dispatcher started"
        );
        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown::wait_for(&mut shutdown) => break,
                _ = interval.tick() => match self.tick().await {
                    Ok(summary) if summary.fetched > 0 => info!(
                        fetched = summary.fetched,
                        succeeded = summary.succeeded,
                        failed = summary.failed,
                        skipped = summary.skipped,
                        "Dispatcher tick"
                    ),
                    Ok(_) => debug!("No pending run requests"),
                    Err(e) => error!("Dispatcher tick failed: {}", e),
                },
            }
        }

        info!("Dispatcher stopped");
        self.shared.metrics.log_stats();
    }
}

impl Shared {
    async fn process(&self, request: RunRequest) -> Settled {
        let span = create_dispatch_span(
            &request.workspace_id.to_string(),
            &request.agent_id.to_string(),
            &request.id.to_string(),
            &generate_correlation_id(),
        );
        async move {
            let (status, note) = match self.invoke(&request).await {
                Ok(()) => (
                    RunStatus::Done,
                    format!(
                        "ran at {} on {}",
                        stamp(self.board.clock()).to_rfc3339(),
                        self.host
                    ),
                ),
                Err(note) => (RunStatus::Failed, note),
            };

            match status {
                RunStatus::Done => self.metrics.record_success(),
                _ => self.metrics.record_failure(),
            }

            if let Err(e) = self
                .board
                .runs()
                .mark_done(Some(request.workspace_id), request.id, status, Some(note))
                .await
            {
                error!("Failed to settle run request: {}", e);
            }

            match status {
                RunStatus::Done => Settled::Done,
                _ => Settled::Failed,
            }
        }
        .instrument(span)
        .await
    }

    /// Err carries the note recorded on the request
    async fn invoke(&self, request: &RunRequest) -> Result<(), String> {
        let workspace = request.workspace_id;
        match self.board.workspaces().get(workspace).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Err(WORKSPACE_NOT_FOUND.to_string()),
            Err(e) => return Err(e.to_string()),
        }
        let agent = match self.board.agents().get(workspace, request.agent_id).await {
            Ok(agent) => agent,
            Err(BoardError::NotFound { .. } | BoardError::WrongTenant { .. }) => {
                return Err(AGENT_NOT_FOUND.to_string())
            }
            Err(e) => return Err(e.to_string()),
        };

        match tokio::time::timeout(self.timeout, self.run_agent(workspace, &agent)).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => {
                self.metrics.record_timeout();
                Err(format!("timed out after {}s", self.timeout.as_secs()))
            }
        }
    }

    async fn run_agent(&self, workspace: WorkspaceId, agent: &Agent) -> BoardResult<()> {
        if agent.is_coordinator() {
            let report = Coordinator::new(&self.board, self.generator.as_ref(), &self.coordinator)
                .run(workspace, agent.id)
                .await?;
            debug!(applied = report.applied(), "Coordinator run finished");
        } else {
            let report = AgentExecutor::new(&self.board, self.generator.as_ref(), &self.executor)
                .tick(workspace, agent.id, self.forced)
                .await?;
            debug!(outcome = ?report.outcome, "Agent tick finished");
        }
        Ok(())
    }
}
