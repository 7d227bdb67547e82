//! Manager configuration.

use crate::executor::CompletionExecutor;
use std::fmt;
use std::sync::Arc;

/// Configuration for a [`crate::ManagerHandle`].
///
/// The default configuration has no completion executor: requests still
/// resolve normally, but completion callbacks are dropped with a warning.
pub struct ManagerConfig {
    /// Executor for completion callbacks.
    pub executor: Option<Arc<dyn CompletionExecutor>>,

    /// Explicit seed for the correlation-id generator. `None` seeds from
    /// process identity and a random draw; fixing it makes id sequences
    /// reproducible, which is occasionally useful in tests.
    pub id_seed: Option<u64>,

    /// Name of the dedicated worker thread.
    pub worker_thread_name: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            executor: None,
            id_seed: None,
            worker_thread_name: "switchyard-mux-worker".to_string(),
        }
    }
}

impl ManagerConfig {
    /// Configuration with a completion executor installed.
    pub fn with_executor(executor: Arc<dyn CompletionExecutor>) -> Self {
        Self {
            executor: Some(executor),
            ..Self::default()
        }
    }
}

impl fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("has_executor", &self.executor.is_some())
            .field("id_seed", &self.id_seed)
            .field("worker_thread_name", &self.worker_thread_name)
            .finish()
    }
}
