// src/queue/pool.rs
// =============================================================================
// A fixed-size worker pool with a FIFO backlog.
//
// How it works:
// 1. new(n) spawns exactly n long-lived worker tasks on the tokio runtime
// 2. Each worker loops: take the oldest backlog job, or park itself in the
//    idle registry and wait to be handed one
// 3. submit() hands the job straight to a parked worker if there is one,
//    otherwise it appends it to the backlog
// 4. Every job reports its outcome through its own oneshot channel, which is
//    what the TaskHandle returned by submit() waits on
//
// Only the backlog is FIFO. A job submitted while a worker is idle starts
// immediately even if older jobs are still running elsewhere.
//
// Rust concepts:
// - Arc<Mutex<..>>: state shared between submit() and every worker
// - oneshot channels: one-time handoff of a job or a result
// - catch_unwind: a panicking job must not take its worker down with it
// =============================================================================

use crate::error::{QueueError, TaskError};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

// A job is the task body wrapped so that it always reports to its handle
type Job = BoxFuture<'static, ()>;

// Everything submit() and the workers have to agree on
struct Dispatch {
    backlog: VecDeque<Job>,
    idle: VecDeque<oneshot::Sender<Job>>,
    closed: bool,
}

struct Shared {
    dispatch: Mutex<Dispatch>,
    stats: Counters,
    shutdown: CancellationToken,
}

impl Shared {
    // The lock is never held across an await and nothing inside it panics,
    // so a poisoned mutex still holds consistent data
    fn lock(&self) -> MutexGuard<'_, Dispatch> {
        self.dispatch.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    running: AtomicUsize,
    peak_running: AtomicUsize,
}

impl Counters {
    fn begin(&self) {
        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_running.fetch_max(now_running, Ordering::SeqCst);
    }

    fn finish(&self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Point-in-time view of the queue counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub submitted: u64,
    pub completed: u64,
    /// Jobs started and not yet settled right now
    pub running: usize,
    /// Highest value `running` ever reached
    pub peak_running: usize,
    /// Jobs waiting for a worker
    pub backlog: usize,
}

/// Bounded-concurrency task queue
///
/// Must be created from inside a tokio runtime because the workers are
/// spawned immediately.
pub struct TaskQueue {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl TaskQueue {
    /// Spawns `concurrency` idle workers
    pub fn new(concurrency: usize) -> Result<Self, QueueError> {
        if concurrency < 1 {
            return Err(QueueError::InvalidConcurrency(concurrency));
        }

        let shared = Arc::new(Shared {
            dispatch: Mutex::new(Dispatch {
                backlog: VecDeque::new(),
                idle: VecDeque::with_capacity(concurrency),
                closed: false,
            }),
            stats: Counters::default(),
            shutdown: CancellationToken::new(),
        });

        let workers = (0..concurrency)
            .map(|id| tokio::spawn(worker_loop(id, Arc::clone(&shared))))
            .collect();

        debug!(concurrency, "task queue started");

        Ok(Self { shared, workers })
    }

    /// Queues `task` and returns a handle that settles with its outcome
    ///
    /// The handle always settles: with the task's value, with its error,
    /// with `Panicked` if the body panicked, or with `Closed` if the queue
    /// shut down before a worker picked the task up.
    pub fn submit<F, T, E>(&self, task: F) -> TaskHandle<T, E>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let shared = Arc::clone(&self.shared);

        let job: Job = Box::pin(async move {
            shared.stats.begin();
            let outcome = match AssertUnwindSafe(task).catch_unwind().await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(error)) => Err(TaskError::Failed(error)),
                Err(panic) => Err(TaskError::Panicked(panic_message(panic.as_ref()))),
            };
            // Counted before the handle settles so stats() never lags behind it
            shared.stats.finish();
            // Nobody may be listening any more; that is fine
            let _ = result_tx.send(outcome);
        });

        self.shared.stats.submitted.fetch_add(1, Ordering::Relaxed);
        self.dispatch(job);

        TaskHandle { rx: result_rx }
    }

    // Direct handoff to an idle worker, else the back of the backlog
    fn dispatch(&self, mut job: Job) {
        let mut state = self.shared.lock();

        if state.closed {
            drop(state);
            // Dropping the job drops its result sender, so the handle sees Closed
            drop(job);
            return;
        }

        while let Some(worker) = state.idle.pop_front() {
            match worker.send(job) {
                Ok(()) => {
                    trace!("job handed to idle worker");
                    return;
                }
                // That worker went away; try the next one
                Err(returned) => job = returned,
            }
        }

        state.backlog.push_back(job);
        trace!(backlog = state.backlog.len(), "job queued");
    }

    pub fn stats(&self) -> QueueStats {
        let backlog = self.shared.lock().backlog.len();
        let counters = &self.shared.stats;
        QueueStats {
            submitted: counters.submitted.load(Ordering::Relaxed),
            completed: counters.completed.load(Ordering::Relaxed),
            running: counters.running.load(Ordering::Relaxed),
            peak_running: counters.peak_running.load(Ordering::Relaxed),
            backlog,
        }
    }

    /// Stops accepting work and releases idle workers
    ///
    /// Jobs still in the backlog settle with `TaskError::Closed`. Jobs that
    /// are already running finish normally.
    pub fn close(&self) {
        let (backlog, idle) = {
            let mut state = self.shared.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            (
                std::mem::take(&mut state.backlog),
                std::mem::take(&mut state.idle),
            )
        };
        self.shared.shutdown.cancel();

        debug!(dropped = backlog.len(), "task queue closed");
        // Dropped outside the lock: job destructors may touch the queue
        drop(backlog);
        drop(idle);
    }

    /// Closes the queue and waits for every worker to exit
    pub async fn shutdown(mut self) {
        self.close();
        for worker in std::mem::take(&mut self.workers) {
            // A worker only ends by returning; a JoinError here means the
            // runtime itself is going away
            let _ = worker.await;
        }
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.close();
    }
}

enum Next {
    Run(Job),
    Wait(oneshot::Receiver<Job>),
}

async fn worker_loop(id: usize, shared: Arc<Shared>) {
    loop {
        let next = {
            let mut state = shared.lock();
            if state.closed {
                break;
            }
            match state.backlog.pop_front() {
                Some(job) => Next::Run(job),
                None => {
                    let (tx, rx) = oneshot::channel();
                    state.idle.push_back(tx);
                    Next::Wait(rx)
                }
            }
        };

        let job = match next {
            Next::Run(job) => job,
            Next::Wait(rx) => {
                tokio::select! {
                    received = rx => match received {
                        Ok(job) => job,
                        // Sender dropped: the queue closed while we were idle
                        Err(_) => break,
                    },
                    _ = shared.shutdown.cancelled() => break,
                }
            }
        };

        job.await;
    }

    trace!(worker = id, "worker exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Future returned by [`TaskQueue::submit`]
pub struct TaskHandle<T, E> {
    rx: oneshot::Receiver<Result<T, TaskError<E>>>,
}

impl<T, E> Future for TaskHandle<T, E> {
    type Output = Result<T, TaskError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(TaskError::Closed)))
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why hand jobs to workers through oneshot channels?
//    - A parked worker needs something to .await on
//    - The oneshot receiver is exactly that: it wakes up once, with one job
//    - If the worker is gone, send() gives the job back so we can retry
//
// 2. Why is the Mutex a std::sync::Mutex and not tokio's?
//    - We never hold it across an .await
//    - Short synchronous critical sections are what std's Mutex is for
//
// 3. What does AssertUnwindSafe do?
//    - catch_unwind() only accepts futures that promise to be "unwind safe"
//    - We promise it by hand because the task's state is thrown away
//      after a panic anyway
//
// 4. Why does TaskHandle implement Future itself?
//    - So callers can write `queue.submit(job).await` directly
//    - It also turns "the sender was dropped" into a clear Closed error
// -----------------------------------------------------------------------------
