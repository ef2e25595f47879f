// src/config.rs
// =============================================================================
// Runtime configuration for a scan.
//
// The CLI (src/cli.rs) parses flags, then main.rs turns them into these
// structs. Keeping them separate from clap means the traversal can be driven
// from tests without going through argument parsing.
//
// - ScanConfig:    settings every traversal needs (concurrency, failures, timeouts)
// - FailurePolicy: which error kinds abort the run instead of being recorded
// - CrawlConfig:   settings only the website provider cares about
// =============================================================================

use crate::error::{ConfigError, ErrorKind};
use std::time::Duration;

/// Default number of workers when the user does not pass --concurrency
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Decides whether a classified error is absorbed or aborts the traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePolicy {
    /// Treat access / transport / timeout failures as fatal
    pub fail_fast: bool,
    /// Any failure on the root node is fatal (an unreachable root is not a scan)
    pub root_fatal: bool,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            fail_fast: false,
            root_fatal: true,
        }
    }
}

impl FailurePolicy {
    /// Returns true when `kind` on a node at the given position must abort the run
    pub fn is_fatal(&self, kind: ErrorKind, is_root: bool) -> bool {
        match kind {
            // Cancellation always stops the run
            ErrorKind::Cancelled => true,
            _ if is_root && self.root_fatal => true,
            // Missing nodes are expected while the tree changes under us
            ErrorKind::TransientAbsence => false,
            ErrorKind::AccessDenied | ErrorKind::TransportFailure | ErrorKind::TimedOut => {
                self.fail_fast
            }
        }
    }
}

/// Settings shared by every traversal
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Number of workers in the task queue
    pub concurrency: usize,
    /// What to do with failures
    pub policy: FailurePolicy,
    /// Optional limit on every single provider call
    pub task_timeout: Option<Duration>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            policy: FailurePolicy::default(),
            task_timeout: None,
        }
    }
}

impl ScanConfig {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            ..Default::default()
        }
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.policy.fail_fast = fail_fast;
        self
    }

    pub fn with_root_fatal(mut self, root_fatal: bool) -> Self {
        self.policy.root_fatal = root_fatal;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Rejects values that would make the traversal meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.task_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Settings for the website provider
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Depth 1 = just the starting page, 2 = plus the pages it links to, ...
    pub max_depth: usize,
    /// Timeout handed to the reqwest client
    pub request_timeout: Duration,
    /// Pause after every fetch so we don't hammer the server
    pub polite_delay: Duration,
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            request_timeout: Duration::from_secs(10),
            polite_delay: Duration::from_millis(100),
            user_agent: concat!("scan-guardian/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl CrawlConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_polite_delay(mut self, delay: Duration) -> Self {
        self.polite_delay = delay;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}
