use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use sync_extra::{MutexExtra, RwLockExtra};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::{SealEngine, SealError};
use crate::work::{SealResult, Work};

/// Outcome delivered on the result sink. `None` marks an attempt that
/// yielded nothing, whether it was cancelled, exhausted or failed.
pub type SealOutcome<E> =
    Option<SealResult<<E as SealEngine>::Block, <E as SealEngine>::Sealed>>;

/// Sender half of the result sink.
pub type ResultSink<E> = mpsc::Sender<SealOutcome<E>>;

const STOPPED: u8 = 0;
const RUNNING: u8 = 1;

/// The mining dispatch agent.
///
/// An agent accepts work over a depth-1 mailbox and hands each item to its
/// [`SealEngine`], keeping at most one attempt active: dispatching new work
/// closes the cancellation token of the attempt currently in flight before
/// the new attempt is spawned. Outcomes are forwarded to the configured
/// result sink.
///
/// A single supervisor task serializes work arrival and shutdown. Starting
/// and stopping are idempotent and may race freely with each other and with
/// submissions; at most one supervisor is ever live.
///
/// Cancellation is cooperative. A superseded attempt whose engine is slow to
/// observe its token may still deliver an outcome after its replacement has
/// started, so consumers must correlate delivered results against the work
/// they currently expect and discard stale ones. The agent does not filter
/// these itself.
pub struct Agent<E: SealEngine> {
    inner: Arc<Inner<E>>,
}

impl<E: SealEngine> Clone for Agent<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<E: SealEngine> {
    chain: E::Chain,
    engine: E,

    work_tx: mpsc::Sender<Work<E::Block>>,
    work_rx: tokio::sync::Mutex<mpsc::Receiver<Work<E::Block>>>,
    result_tx: RwLock<Option<ResultSink<E>>>,

    /// Token of the seal attempt currently in flight. Closed when the
    /// attempt is superseded by a new dispatch or when the loop shuts down.
    current_op: Mutex<Option<CancellationToken>>,
    /// Shutdown token and join handle of the running dispatch loop.
    supervisor: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
    state: AtomicU8,
}

impl<E: SealEngine> Agent<E> {
    /// Create an agent bound to a chain handle and a seal engine.
    ///
    /// The agent starts out stopped.
    pub fn new(chain: E::Chain, engine: E) -> Self {
        let (work_tx, work_rx) = mpsc::channel(1);

        Self {
            inner: Arc::new(Inner {
                chain,
                engine,
                work_tx,
                work_rx: tokio::sync::Mutex::new(work_rx),
                result_tx: RwLock::new(None),
                current_op: Mutex::new(None),
                supervisor: Mutex::new(None),
                state: AtomicU8::new(STOPPED),
            }),
        }
    }

    /// Configure where seal outcomes are delivered.
    ///
    /// Set this before [`Agent::start`]. Outcomes completing while no sink
    /// is configured are discarded.
    pub fn set_result_sink(&self, sink: ResultSink<E>) {
        *self.inner.result_tx.write_unwrap() = Some(sink);
    }

    /// The work channel. Sending on it is equivalent to [`Agent::submit`].
    pub fn work_channel(&self) -> mpsc::Sender<Work<E::Block>> {
        self.inner.work_tx.clone()
    }

    /// Submit work for sealing. The payload is not validated.
    ///
    /// The mailbox holds a single undelivered item; a second submission
    /// suspends until the dispatch loop consumes the first.
    pub async fn submit(&self, work: Work<E::Block>) {
        self.inner
            .work_tx
            .send(work)
            .await
            .expect("agent owns the receiver; the work channel never closes; qed")
    }

    /// Start the dispatch loop. Idempotent: a no-op when already running.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(&self) {
        let mut supervisor = self.inner.supervisor.lock_unwrap();
        if self
            .inner
            .state
            .compare_exchange(STOPPED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return; // agent already started
        }

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(Inner::run(self.inner.clone(), shutdown.clone()));
        *supervisor = Some((shutdown, handle));
    }

    /// Stop the dispatch loop. Idempotent: a no-op when already stopped.
    ///
    /// Closes the token of the seal attempt in flight, if any, and returns
    /// once the loop has terminated with the mailbox drained.
    pub async fn stop(&self) {
        let stopped = {
            let mut supervisor = self.inner.supervisor.lock_unwrap();
            if self
                .inner
                .state
                .compare_exchange(RUNNING, STOPPED, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return; // agent already stopped
            }
            supervisor.take()
        };

        // The loop's shutdown arm closes and clears the current token, so
        // both have happened by the time the join completes.
        if let Some((shutdown, handle)) = stopped {
            shutdown.cancel();
            let _ = handle.await;
        }
    }

    /// The hash rate reported by the engine, in hashes per second.
    ///
    /// `0.0` when the engine does not expose the hash-rate capability.
    /// Never blocks, and remains callable while the agent is stopped.
    pub fn hashrate(&self) -> f64 {
        self.inner
            .engine
            .hashrate_meter()
            .map_or(0.0, |meter| meter.hashrate())
    }
}

impl<E: SealEngine> Inner<E> {
    /// Dispatch loop. Serializes work arrival and shutdown, spawning one
    /// seal task per work item and superseding the previous one.
    async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut work_rx = self.work_rx.lock().await;

        loop {
            tokio::select! {
                // Shutdown is checked first so queued work is never
                // dispatched once stop has been signalled.
                biased;

                _ = shutdown.cancelled() => {
                    if let Some(op) = self.current_op.lock_unwrap().take() {
                        op.cancel();
                    }
                    break;
                }
                work = work_rx.recv() => {
                    let Some(work) = work else { break };
                    let mut current_op = self.current_op.lock_unwrap();
                    if let Some(op) = current_op.take() {
                        op.cancel();
                    }
                    let op = CancellationToken::new();
                    *current_op = Some(op.clone());
                    tokio::spawn(self.clone().seal(work, op));
                }
            }
        }

        // Leave the mailbox empty for the next incarnation.
        while work_rx.try_recv().is_ok() {}
    }

    /// One seal attempt: invoke the engine, then deliver the outcome.
    async fn seal(self: Arc<Self>, work: Work<E::Block>, cancel: CancellationToken) {
        let block = work.block().clone();
        let outcome = match self.engine.seal(&self.chain, block, cancel).await {
            Ok(Some(sealed)) => {
                info!("successfully sealed new block");
                Some(SealResult::new(work, sealed))
            }
            Ok(None) | Err(SealError::Cancelled) => None,
            Err(SealError::Engine(err)) => {
                warn!(err = %err, "block sealing failed");
                None
            }
        };

        let Some(sink) = self.result_tx.read_unwrap().clone() else {
            return;
        };
        let _ = sink.send(outcome).await;
    }
}
