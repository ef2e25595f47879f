// src/queue/mod.rs
// =============================================================================
// The bounded-concurrency task queue and the helpers task bodies use with it.
//
// Submodules:
// - pool:  the worker pool + FIFO backlog (TaskQueue, TaskHandle)
// - guard: cancellation and timeout wrapping for a single I/O call
//
// The guard is deliberately separate from the pool: the pool only decides
// *when* a task runs, the task body decides how long it is willing to wait.
// =============================================================================

mod guard;
mod pool;

pub use guard::guarded;
pub use pool::{QueueStats, TaskHandle, TaskQueue};
