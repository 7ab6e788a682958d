//! Coordinator agents: snapshot the board, ask for a plan, apply the
//! ACTION lines of the reply under per-run caps.

pub mod actions;
pub mod interpreter;
pub mod snapshot;

use serde::{Deserialize, Serialize};

pub use actions::{parse_actions, Action};
pub use interpreter::{ActionOutcome, ActionResult, CoordinationReport, Coordinator};
pub use snapshot::BoardSnapshot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorPolicy {
    /// Actions applied per run
    pub max_actions: usize,
    /// CREATE actions applied per run
    pub max_creates: usize,
    /// Recent activities shown in the snapshot
    pub activity_window: usize,
    /// Done tasks younger than this stay in the snapshot
    pub done_window_hours: i64,
}

impl Default for CoordinatorPolicy {
    fn default() -> Self {
        Self {
            max_actions: 10,
            max_creates: 3,
            activity_window: 30,
            done_window_hours: 24,
        }
    }
}
