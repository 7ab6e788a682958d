// Mission Control library: multi-tenant task board plus the agent
// orchestration engine that works it.

pub mod activity;
pub mod agents;
pub mod board;
pub mod cli;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod generate;
pub mod messages;
pub mod model;
pub mod notify;
pub mod observability;
pub mod priority;
pub mod run_queue;
pub mod shutdown;
pub mod store;
pub mod tasks;
pub mod telemetry;
pub mod workspaces;

// Re-export key types for easy access
pub use activity::{Standup, StandupBucket, StandupEntry};
pub use agents::AgentDraft;
pub use board::Board;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MissionControlConfig;
pub use coordinator::{Action, ActionOutcome, CoordinationReport, Coordinator, CoordinatorPolicy};
pub use dispatcher::{Dispatcher, TickSummary};
pub use error::{BoardError, BoardResult};
pub use executor::{AgentExecutor, ExecutorPolicy, TickOutcome, TickReport};
pub use generate::{CommandGenerator, Generator};
pub use model::*;
pub use observability::{DispatchMetrics, DispatchStats};
pub use priority::Priority;
pub use shutdown::ShutdownSignal;
pub use store::{MemoryStore, Store};
#[cfg(feature = "database")]
pub use store::SqliteStore;
pub use tasks::{NewTask, TaskFilter};
pub use telemetry::{init_telemetry, shutdown_telemetry};
