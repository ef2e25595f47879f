// src/traverse/orchestrator.rs
// =============================================================================
// Walks a (possibly cyclic) node graph on top of the task queue.
//
// How it works:
// 1. visit(node) checks the visited set and, for a new node, submits one
//    task to the queue
// 2. The task asks the provider what the node is:
//    - a leaf: read it, run the predicate, record a hit on match
//    - a container: list it and call visit() on every child
// 3. The task returns the children's futures instead of awaiting them, so a
//    parent never sits on a worker slot while its children wait for one
// 4. visit()'s own future awaits the task and then all child futures, which
//    makes the root future settle exactly when the whole reachable graph has
//
// Completion is decided by that future composition alone. Nothing here
// watches the queue for "empty".
//
// Failures are classified (see FailurePolicy): absorbed ones are recorded
// and the subtree carries on, fatal ones cancel the run.
// =============================================================================

use super::events::{Event, EventKind, Observers};
use super::predicate::Predicate;
use super::sink::{Report, ResultSink, RunStats};
use super::visited::VisitedSet;
use crate::config::{FailurePolicy, ScanConfig};
use crate::error::{ErrorKind, ProviderError, TaskError, TraversalError};
use crate::provider::Provider;
use crate::queue::{guarded, TaskQueue};
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

// The settled-ness of one node and everything below it
type VisitFuture = BoxFuture<'static, Result<(), TraversalError>>;

/// Configured traversal, ready to run from a root node
pub struct Traversal<P: Provider> {
    provider: P,
    predicate: Arc<dyn Predicate>,
    config: ScanConfig,
    observers: Observers<P::Node>,
    cancel: CancellationToken,
}

impl<P: Provider> Traversal<P> {
    pub fn new(provider: P, predicate: impl Predicate, config: ScanConfig) -> Self {
        Self {
            provider,
            predicate: Arc::new(predicate),
            config,
            observers: Observers::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Subscribes `handler` to events of `kind`
    pub fn on<F>(mut self, kind: EventKind, handler: F) -> Self
    where
        F: Fn(&Event<'_, P::Node>) + Send + Sync + 'static,
    {
        self.observers.on(kind, handler);
        self
    }

    /// Lets the caller stop the run; cancelling makes it fail with `Cancelled`
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub async fn run(self, root: P::Node) -> Result<Report<P::Node>, TraversalError> {
        self.config.validate()?;
        let queue = TaskQueue::new(self.config.concurrency)?;
        let started = Instant::now();

        info!(
            root = %root,
            concurrency = self.config.concurrency,
            "traversal started"
        );

        let run = Arc::new(Run {
            provider: self.provider,
            predicate: self.predicate,
            queue,
            visited: VisitedSet::new(),
            sink: ResultSink::new(),
            observers: self.observers,
            policy: self.config.policy,
            task_timeout: self.config.task_timeout,
            // A fatal error cancels this child without touching the caller's token
            cancel: self.cancel.child_token(),
            first_fatal: Mutex::new(None),
        });

        // If the caller drops this future early (a timeout around run(), say),
        // whatever is still queued or running stops with it
        let _cancel_on_drop = run.cancel.clone().drop_guard();
        let _close_on_drop = CloseOnDrop(&run.queue);

        run.observers.emit(&Event::Started { root: &root });
        let outcome = visit(&run, root, true).await;

        // Nothing useful can still be queued; release the workers
        run.queue.close();

        // The first fatal error wins over whatever error reached the root first
        if let Some(error) = run.take_first_fatal() {
            warn!(error = %error, "traversal aborted");
            return Err(error);
        }
        outcome?;

        let (hits, errors) = run.sink.drain();
        let queue_stats = run.queue.stats();
        let report = Report {
            hits,
            errors,
            visited: run.visited.sorted_keys(),
            stats: RunStats {
                tasks: queue_stats.submitted,
                peak_concurrency: queue_stats.peak_running,
                elapsed: started.elapsed(),
            },
        };

        info!(
            hits = report.hits.len(),
            errors = report.errors.len(),
            visited = report.visited.len(),
            "traversal finished"
        );
        run.observers.emit(&Event::Finished {
            hits: report.hits.len(),
            errors: report.errors.len(),
        });

        Ok(report)
    }
}

/// Walks everything reachable from `root` and collects the hits
pub async fn traverse<P: Provider>(
    provider: P,
    root: P::Node,
    predicate: impl Predicate,
    config: ScanConfig,
) -> Result<Report<P::Node>, TraversalError> {
    Traversal::new(provider, predicate, config).run(root).await
}

// State shared by every task of one run
struct Run<P: Provider> {
    provider: P,
    predicate: Arc<dyn Predicate>,
    queue: TaskQueue,
    visited: VisitedSet,
    sink: ResultSink<P::Node>,
    observers: Observers<P::Node>,
    policy: FailurePolicy,
    task_timeout: Option<Duration>,
    cancel: CancellationToken,
    first_fatal: Mutex<Option<TraversalError>>,
}

impl<P: Provider> Run<P> {
    // Remembers the first fatal error and stops everything still running
    fn abort(&self, error: TraversalError) -> TraversalError {
        {
            let mut first = self.first_fatal.lock().unwrap_or_else(PoisonError::into_inner);
            if first.is_none() {
                *first = Some(error.clone());
            }
        }
        self.cancel.cancel();
        error
    }

    fn take_first_fatal(&self) -> Option<TraversalError> {
        self.first_fatal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    // Either records the failure and lets the subtree settle, or aborts
    fn settle_failure(
        &self,
        node: P::Node,
        error: ProviderError,
        is_root: bool,
    ) -> Result<(), TraversalError> {
        let kind = ErrorKind::classify(&error);
        if kind == ErrorKind::Cancelled {
            return Err(self.abort(TraversalError::Cancelled));
        }

        let message = error.to_string();
        self.observers.emit(&Event::Error {
            node: &node,
            kind,
            message: &message,
        });

        if self.policy.is_fatal(kind, is_root) {
            return Err(self.abort(TraversalError::Aborted {
                node: node.to_string(),
                kind,
                message,
            }));
        }

        debug!(node = %node, kind = %kind, error = %message, "recorded error");
        self.sink.record_error(node, kind, message);
        Ok(())
    }
}

// Jobs hold the Run (and so the queue) alive, so dropping run() alone
// wouldn't release the workers
struct CloseOnDrop<'a>(&'a TaskQueue);

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

enum Inspection<N> {
    Container(Vec<N>),
    Leaf(String),
}

fn visit<P: Provider>(run: &Arc<Run<P>>, node: P::Node, is_root: bool) -> VisitFuture {
    // Check and mark in one step, before anything is submitted
    let key = run.provider.canonical_key(&node);
    if !run.visited.admit(key, run.provider.distance(&node)) {
        trace!(node = %node, "already visited");
        return future::ready(Ok(())).boxed();
    }

    run.observers.emit(&Event::Visited { node: &node });

    let label = node.to_string();
    let handle = run.queue.submit(expand(Arc::clone(run), node, is_root));
    let run = Arc::clone(run);

    async move {
        let children = match handle.await {
            Ok(children) => children,
            Err(TaskError::Failed(error)) => return Err(error),
            Err(TaskError::Panicked(message)) => {
                return Err(run.abort(TraversalError::TaskPanicked {
                    node: label,
                    message,
                }))
            }
            Err(TaskError::Closed) => return Err(run.abort(TraversalError::QueueClosed(label))),
        };

        // Fan-in: this node is settled once every child is
        future::try_join_all(children).await.map(|_| ())
    }
    .boxed()
}

// The task body for one node; returns the futures of its children
async fn expand<P: Provider>(
    run: Arc<Run<P>>,
    node: P::Node,
    is_root: bool,
) -> Result<Vec<VisitFuture>, TraversalError> {
    match inspect(&run, &node).await {
        Ok(Inspection::Container(children)) => {
            debug!(node = %node, children = children.len(), "expanding container");
            Ok(children
                .into_iter()
                .map(|child| visit(&run, child, false))
                .collect())
        }
        Ok(Inspection::Leaf(content)) => {
            if run.predicate.is_match(&content) {
                debug!(node = %node, "match");
                run.observers.emit(&Event::Found { node: &node });
                run.sink.record_hit(node);
            }
            Ok(Vec::new())
        }
        Err(error) => run
            .settle_failure(node, error, is_root)
            .map(|()| Vec::new()),
    }
}

// Every provider call goes through the guard, so cancellation and the
// per-call timeout are honored at each suspension point
async fn inspect<P: Provider>(
    run: &Run<P>,
    node: &P::Node,
) -> Result<Inspection<P::Node>, ProviderError> {
    let provider = &run.provider;
    let container = guarded(&run.cancel, run.task_timeout, provider.is_container(node)).await?;

    if container {
        let children = guarded(&run.cancel, run.task_timeout, provider.list(node)).await?;
        Ok(Inspection::Container(children))
    } else {
        let content = guarded(&run.cancel, run.task_timeout, provider.read(node)).await?;
        Ok(Inspection::Leaf(content))
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why does expand() return futures instead of awaiting them?
//    - With 1 worker, a parent awaiting its children inside the worker
//      would wait forever: the children need that same worker to run
//    - Returning them lets the *caller* of visit() do the waiting, outside
//      the pool
//
// 2. What is a BoxFuture?
//    - Pin<Box<dyn Future + Send>>: a future whose concrete type is hidden
//    - visit() is recursive (through expand), and recursive async code needs
//      a fixed-size return type, which the Box provides
//
// 3. What does try_join_all do?
//    - Waits for all child futures, but stops at the first error
//    - That's what makes a fatal error bubble up to the root
//
// 4. Why a child_token()?
//    - Cancelling a child token doesn't cancel its parent
//    - A fatal error stops this run without cancelling the caller's token
//
// 5. What does drop_guard() do?
//    - It returns a value that cancels the token when it goes out of scope
//    - Dropping run() half way (say, under tokio::time::timeout) drops the
//      guard too, so the tasks it started don't keep going on their own
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::memory::MemoryProvider;
    use crate::provider::FsProvider;
    use crate::traverse::ContainsKeyword;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn contains(keyword: &str) -> ContainsKeyword {
        ContainsKeyword::new(keyword).unwrap()
    }

    fn sorted(mut items: Vec<String>) -> Vec<String> {
        items.sort();
        items
    }

    #[tokio::test]
    async fn test_keyword_search_over_directory_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "some foo here").unwrap();
        std::fs::write(dir.path().join("b.txt"), "nothing").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.txt"), "foo again").unwrap();

        let (provider, root) = FsProvider::open(dir.path()).await.unwrap();
        let report = traverse(provider, root, contains("foo"), ScanConfig::new(5))
            .await
            .unwrap();

        let names: Vec<String> = sorted(
            report
                .hits
                .iter()
                .map(|n| n.path().file_name().unwrap().to_string_lossy().into_owned())
                .collect(),
        );
        assert_eq!(names, vec!["a.txt", "c.txt"]);
        assert!(report.errors.is_empty());
        // root, a.txt, b.txt, nested, nested/c.txt
        assert_eq!(report.visited.len(), 5);
    }

    #[tokio::test]
    async fn test_single_hit_in_flat_tree() {
        let provider = MemoryProvider::new()
            .dir("root", &["a.txt", "b.txt"])
            .file("a.txt", "foo")
            .file("b.txt", "bar");

        let report = traverse(provider, "root".to_string(), contains("foo"), ScanConfig::new(5))
            .await
            .unwrap();
        assert_eq!(report.hits, vec!["a.txt"]);
    }

    #[tokio::test]
    async fn test_missing_child_recorded_and_siblings_kept() {
        // child/missing.txt is listed but disappears before it is read
        let provider = MemoryProvider::new()
            .dir("root", &["child", "top.txt"])
            .dir("child", &["child/missing.txt", "child/ok.txt", "child/also.txt"])
            .file("top.txt", "foo")
            .file("child/ok.txt", "foo")
            .file("child/also.txt", "foo");

        let report = traverse(provider, "root".to_string(), contains("foo"), ScanConfig::new(3))
            .await
            .unwrap();

        assert_eq!(
            sorted(report.hits.clone()),
            vec!["child/also.txt", "child/ok.txt", "top.txt"]
        );
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].node, "child/missing.txt");
        assert_eq!(report.errors[0].kind, ErrorKind::TransientAbsence);
    }

    #[tokio::test]
    async fn test_cycle_visits_each_node_once() {
        let provider = Arc::new(
            MemoryProvider::new()
                .dir("A", &["B", "A.txt"])
                .dir("B", &["A", "B.txt", "B/"])
                .file("A.txt", "foo")
                .file("B.txt", "foo"),
        );

        let report = traverse(
            Arc::clone(&provider),
            "A".to_string(),
            contains("foo"),
            ScanConfig::new(2),
        )
        .await
        .unwrap();

        assert_eq!(report.visited, vec!["A", "A.txt", "B", "B.txt"]);
        assert_eq!(sorted(report.hits), vec!["A.txt", "B.txt"]);
        assert_eq!(provider.touched("A"), 1);
        assert_eq!(provider.touched("B"), 1);
        assert_eq!(report.stats.tasks, 4);
    }

    #[tokio::test]
    async fn test_single_worker_does_not_deadlock_on_deep_tree() {
        let mut provider = MemoryProvider::new();
        for depth in 0..20 {
            let dir = format!("d{}", depth);
            let next = format!("d{}", depth + 1);
            let file = format!("f{}", depth);
            provider = provider
                .dir(&dir, &[next.as_str(), file.as_str()])
                .file(&file, "foo");
        }
        provider = provider.dir("d20", &[]);

        let report = traverse(provider, "d0".to_string(), contains("foo"), ScanConfig::new(1))
            .await
            .unwrap();
        assert_eq!(report.hits.len(), 20);
        assert_eq!(report.stats.peak_concurrency, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_bound_holds_during_traversal() {
        let children: Vec<String> = (0..30).map(|i| format!("f{}", i)).collect();
        let child_refs: Vec<&str> = children.iter().map(String::as_str).collect();
        let mut provider = MemoryProvider::new().dir("root", &child_refs);
        for child in &children {
            provider = provider
                .file(child, "foo")
                .slow(child, Duration::from_millis(5));
        }

        let report = traverse(provider, "root".to_string(), contains("foo"), ScanConfig::new(4))
            .await
            .unwrap();
        assert_eq!(report.hits.len(), 30);
        assert!(report.stats.peak_concurrency <= 4);
    }

    #[tokio::test]
    async fn test_repeated_runs_find_the_same_hits() {
        let build = || {
            MemoryProvider::new()
                .dir("root", &["x", "y", "z.txt"])
                .dir("x", &["x/1.txt", "y"])
                .dir("y", &["y/2.txt", "root"])
                .file("x/1.txt", "foo")
                .file("y/2.txt", "foo")
                .file("z.txt", "no")
        };

        let first = traverse(build(), "root".to_string(), contains("foo"), ScanConfig::new(3))
            .await
            .unwrap();
        let second = traverse(build(), "root".to_string(), contains("foo"), ScanConfig::new(1))
            .await
            .unwrap();

        let a: HashSet<_> = first.hits.into_iter().collect();
        let b: HashSet<_> = second.hits.into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[tokio::test]
    async fn test_access_denied_absorbed_by_default() {
        let provider = MemoryProvider::new()
            .dir("root", &["secret", "open.txt"])
            .broken("secret", ProviderError::AccessDenied("secret".into()))
            .file("open.txt", "foo");

        let report = traverse(provider, "root".to_string(), contains("foo"), ScanConfig::new(2))
            .await
            .unwrap();
        assert_eq!(report.hits, vec!["open.txt"]);
        assert_eq!(report.errors[0].kind, ErrorKind::AccessDenied);
    }

    #[tokio::test]
    async fn test_fail_fast_aborts_the_run() {
        let provider = MemoryProvider::new()
            .dir("root", &["secret", "slow.txt"])
            .broken("secret", ProviderError::AccessDenied("secret".into()))
            .file("slow.txt", "foo")
            .slow("slow.txt", Duration::from_secs(30));

        let config = ScanConfig::new(2).with_fail_fast(true);
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            traverse(provider, "root".to_string(), contains("foo"), config),
        )
        .await
        .expect("fail-fast must not wait for the slow sibling");

        match result {
            Err(TraversalError::Aborted { node, kind, .. }) => {
                assert_eq!(node, "secret");
                assert_eq!(kind, ErrorKind::AccessDenied);
            }
            other => panic!("expected an abort, got {:?}", other.map(|r| r.hits)),
        }
    }

    #[tokio::test]
    async fn test_missing_root_is_fatal() {
        let provider = MemoryProvider::new();
        let result = traverse(provider, "nowhere".to_string(), contains("foo"), ScanConfig::new(1)).await;
        assert!(matches!(
            result,
            Err(TraversalError::Aborted {
                kind: ErrorKind::TransientAbsence,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_missing_root_recorded_when_not_fatal() {
        let provider = MemoryProvider::new();
        let config = ScanConfig::new(1).with_root_fatal(false);
        let report = traverse(provider, "nowhere".to_string(), contains("foo"), config)
            .await
            .unwrap();
        assert!(report.hits.is_empty());
        assert_eq!(report.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_concurrency_rejected() {
        let provider = MemoryProvider::new().file("a", "foo");
        let result = traverse(provider, "a".to_string(), contains("foo"), ScanConfig::new(0)).await;
        assert!(matches!(result, Err(TraversalError::Config(_))));
    }

    #[tokio::test]
    async fn test_cancellation_stops_the_run() {
        let provider = MemoryProvider::new()
            .dir("root", &["slow.txt"])
            .file("slow.txt", "foo")
            .slow("slow.txt", Duration::from_secs(30));

        let token = CancellationToken::new();
        let trigger = token.clone();
        let traversal = Traversal::new(provider, contains("foo"), ScanConfig::new(2))
            .with_cancellation(token)
            .on(EventKind::Visited, move |event| {
                if let Event::Visited { node } = event {
                    if node.as_str() == "slow.txt" {
                        trigger.cancel();
                    }
                }
            });

        let result = tokio::time::timeout(Duration::from_secs(5), traversal.run("root".to_string()))
            .await
            .expect("cancellation must be honored promptly");
        assert!(matches!(result, Err(TraversalError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_node_times_out() {
        let provider = MemoryProvider::new()
            .dir("root", &["slow.txt", "fast.txt"])
            .file("slow.txt", "foo")
            .file("fast.txt", "foo")
            .slow("slow.txt", Duration::from_secs(30));

        let config = ScanConfig::new(2).with_task_timeout(Some(Duration::from_secs(1)));
        let report = traverse(provider, "root".to_string(), contains("foo"), config)
            .await
            .unwrap();

        assert_eq!(report.hits, vec!["fast.txt"]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].node, "slow.txt");
        assert_eq!(report.errors[0].kind, ErrorKind::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_the_run_stops_its_tasks() {
        let children: Vec<String> = (0..10).map(|i| format!("f{}", i)).collect();
        let child_refs: Vec<&str> = children.iter().map(String::as_str).collect();
        let mut provider = MemoryProvider::new().dir("root", &child_refs);
        for child in &children {
            provider = provider
                .file(child, "foo")
                .slow(child, Duration::from_millis(50));
        }
        let provider = Arc::new(provider);
        let touched = |provider: &MemoryProvider| -> usize {
            children.iter().map(|c| provider.touched(c)).sum()
        };

        let result = tokio::time::timeout(
            Duration::from_millis(80),
            traverse(
                Arc::clone(&provider),
                "root".to_string(),
                contains("foo"),
                ScanConfig::new(1),
            ),
        )
        .await;
        assert!(result.is_err());

        let at_drop = touched(&*provider);
        assert!(at_drop >= 1 && at_drop < children.len());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(touched(&*provider), at_drop);
    }

    #[tokio::test]
    async fn test_events_reach_subscribers() {
        let provider = MemoryProvider::new()
            .dir("root", &["a.txt", "b.txt", "gone.txt"])
            .file("a.txt", "foo")
            .file("b.txt", "bar");

        let visited = Arc::new(AtomicUsize::new(0));
        let found = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));

        let traversal = {
            let (v, f, e, d) = (
                Arc::clone(&visited),
                Arc::clone(&found),
                Arc::clone(&errors),
                Arc::clone(&finished),
            );
            Traversal::new(provider, contains("foo"), ScanConfig::new(2))
                .on(EventKind::Visited, move |_| {
                    v.fetch_add(1, Ordering::SeqCst);
                })
                .on(EventKind::Found, move |_| {
                    f.fetch_add(1, Ordering::SeqCst);
                })
                .on(EventKind::Error, move |_| {
                    e.fetch_add(1, Ordering::SeqCst);
                })
                .on(EventKind::Finished, move |event| {
                    if let Event::Finished { hits, errors } = event {
                        assert_eq!((*hits, *errors), (1, 1));
                    }
                    d.fetch_add(1, Ordering::SeqCst);
                })
        };

        traversal.run("root".to_string()).await.unwrap();

        assert_eq!(visited.load(Ordering::SeqCst), 4);
        assert_eq!(found.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
