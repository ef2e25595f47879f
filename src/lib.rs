// src/lib.rs
// =============================================================================
// scan-guardian as a library.
//
// Modules (leaves first):
// - error:    error types shared by everything below
// - config:   scan / crawl settings and the failure policy
// - queue:    the bounded-concurrency task queue (TaskQueue)
// - provider: backends to traverse (filesystem, website)
// - traverse: recursive, deduplicating traversal driven by the queue
//
// The binary (src/main.rs) is a thin CLI on top of these.
// =============================================================================

pub mod config;
pub mod error;
pub mod provider;
pub mod queue;
pub mod traverse;
