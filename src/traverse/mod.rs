// src/traverse/mod.rs
// =============================================================================
// Recursive traversal over a provider's node graph, driven by the task queue.
//
// Submodules:
// - orchestrator: visit / expand / fan-in (Traversal, traverse)
// - visited:      dedup by canonical key
// - sink:         hits + absorbed errors, and the final Report
// - events:       started / visited / found / error / finished subscribers
// - predicate:    what makes a leaf a hit
// =============================================================================

mod events;
mod orchestrator;
mod predicate;
mod sink;
mod visited;

pub use events::{Event, EventKind};
pub use orchestrator::{traverse, Traversal};
pub use predicate::{ContainsKeyword, Predicate};
pub use sink::{ErrorRecord, RenderedReport, Report, RunStats};
