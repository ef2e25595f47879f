// src/traverse/sink.rs
// =============================================================================
// Collects hits and absorbed errors for one traversal run, and the Report
// handed back to the caller when the run settles.
//
// Entries are appended in the order tasks finish, not in tree order. Tasks
// may finish on different threads, so the two lists sit behind a Mutex that
// is only held for the push itself.
// =============================================================================

use crate::error::ErrorKind;
use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// One absorbed failure
#[derive(Debug, Clone)]
pub struct ErrorRecord<N> {
    pub node: N,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug)]
struct Records<N> {
    hits: Vec<N>,
    errors: Vec<ErrorRecord<N>>,
}

/// Append-only accumulator shared by every task of a run
#[derive(Debug)]
pub struct ResultSink<N> {
    records: Mutex<Records<N>>,
}

impl<N> Default for ResultSink<N> {
    fn default() -> Self {
        Self {
            records: Mutex::new(Records {
                hits: Vec::new(),
                errors: Vec::new(),
            }),
        }
    }
}

impl<N> ResultSink<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self, node: N) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .hits
            .push(node);
    }

    pub fn record_error(&self, node: N, kind: ErrorKind, message: String) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .errors
            .push(ErrorRecord {
                node,
                kind,
                message,
            });
    }

    /// Takes everything recorded so far, leaving the sink empty
    pub fn drain(&self) -> (Vec<N>, Vec<ErrorRecord<N>>) {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        (
            std::mem::take(&mut records.hits),
            std::mem::take(&mut records.errors),
        )
    }
}

/// Numbers about how a run went
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RunStats {
    /// Tasks submitted to the queue (one per visited node)
    pub tasks: u64,
    /// Most tasks that were ever running at once
    pub peak_concurrency: usize,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

fn as_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Outcome of a traversal that did not hit a fatal error
#[derive(Debug, Clone)]
pub struct Report<N> {
    pub hits: Vec<N>,
    pub errors: Vec<ErrorRecord<N>>,
    /// Canonical keys of every node that was scheduled, sorted
    pub visited: Vec<String>,
    pub stats: RunStats,
}

/// A Report with nodes rendered as strings, ready for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct RenderedReport {
    pub hits: Vec<String>,
    pub errors: Vec<RenderedError>,
    pub visited: usize,
    pub stats: RunStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedError {
    pub node: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl<N: fmt::Display> Report<N> {
    pub fn render(&self) -> RenderedReport {
        RenderedReport {
            hits: self.hits.iter().map(|n| n.to_string()).collect(),
            errors: self
                .errors
                .iter()
                .map(|e| RenderedError {
                    node: e.node.to_string(),
                    kind: e.kind,
                    message: e.message.clone(),
                })
                .collect(),
            visited: self.visited.len(),
            stats: self.stats,
        }
    }
}
