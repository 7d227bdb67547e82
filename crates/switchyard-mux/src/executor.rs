//! Completion-executor seam.
//!
//! Completion callbacks never run on the worker thread, where a slow callback
//! would stall reply handling for every connection. The manager hands
//! callbacks to whatever implements [`CompletionExecutor`]; if none is
//! configured, callbacks are dropped with a warning and request resolution
//! proceeds regardless.

use crate::error::MuxError;
use crate::pending::CompletionCallback;

/// Runs completion callbacks off the manager worker thread.
pub trait CompletionExecutor: Send + Sync {
    /// Execute `task` asynchronously. Must not block the caller.
    fn execute(&self, task: CompletionCallback);
}

/// Stock executor backed by a rayon thread pool.
pub struct RayonExecutor {
    pool: rayon::ThreadPool,
}

impl RayonExecutor {
    /// Build an executor with `threads` worker threads.
    pub fn new(threads: usize) -> Result<Self, MuxError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("switchyard-completion-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: rayon::ThreadPool) -> Self {
        Self { pool }
    }
}

impl CompletionExecutor for RayonExecutor {
    fn execute(&self, task: CompletionCallback) {
        self.pool.spawn(task);
    }
}
