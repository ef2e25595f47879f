// src/error.rs
// =============================================================================
// Error types shared by the task queue, the providers and the traversal.
//
// Layers:
// - QueueError:     problems with the queue itself (bad configuration)
// - TaskError<E>:   how a single submitted task settled when it did not succeed
// - ProviderError:  what the filesystem / website backends report
// - ErrorKind:      the classification the traversal records in its report
// - TraversalError: the fatal outcomes that abort a whole traversal
//
// main.rs uses anyhow on top of these, the same way it did before.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the task queue at construction time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// A queue needs at least one worker
    #[error("task queue concurrency must be at least 1 (got {0})")]
    InvalidConcurrency(usize),
}

/// How a submitted task settled when it did not produce a value.
#[derive(Debug, Error)]
pub enum TaskError<E> {
    /// The task body returned its own error
    #[error("task failed: {0}")]
    Failed(E),

    /// The task body panicked; the worker survived
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The queue shut down before the task could run
    #[error("task queue closed before the task ran")]
    Closed,
}

/// Errors reported by a capability provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The node vanished between discovery and use
    #[error("not found: {0}")]
    NotFound(String),

    /// The node exists but we are not allowed to read it
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Network or I/O failure while talking to the backend
    #[error("transport failure: {0}")]
    Transport(String),

    /// The call exceeded the configured per-task timeout
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    /// The traversal was cancelled while the call was in flight
    #[error("cancelled")]
    Cancelled,
}

/// Classification recorded next to every absorbed error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TransientAbsence,
    AccessDenied,
    TransportFailure,
    TimedOut,
    Cancelled,
}

impl ErrorKind {
    /// Maps a provider failure onto the report taxonomy
    pub fn classify(error: &ProviderError) -> Self {
        match error {
            ProviderError::NotFound(_) => ErrorKind::TransientAbsence,
            ProviderError::AccessDenied(_) => ErrorKind::AccessDenied,
            ProviderError::Transport(_) => ErrorKind::TransportFailure,
            ProviderError::TimedOut(_) => ErrorKind::TimedOut,
            ProviderError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::TransientAbsence => "not found",
            ErrorKind::AccessDenied => "access denied",
            ErrorKind::TransportFailure => "transport failure",
            ErrorKind::TimedOut => "timed out",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Fatal outcomes of a traversal run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TraversalError {
    /// The run configuration was rejected before anything was scheduled
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The queue could not be built
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// A node failed and the failure policy says that aborts the run
    #[error("{kind} at {node}: {message}")]
    Aborted {
        node: String,
        kind: ErrorKind,
        message: String,
    },

    /// A task body panicked
    #[error("task for {node} panicked: {message}")]
    TaskPanicked { node: String, message: String },

    /// The queue closed underneath the traversal
    #[error("task queue closed while visiting {0}")]
    QueueClosed(String),

    /// The caller cancelled the run
    #[error("traversal cancelled")]
    Cancelled,
}

/// Rejected configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("task timeout must be greater than zero")]
    ZeroTimeout,

    #[error("max depth must be at least 1")]
    ZeroDepth,

    #[error("keyword must not be empty")]
    EmptyKeyword,

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("could not build HTTP client: {0}")]
    HttpClient(String),
}
