//! Update polling loop.
//!
//! Updates are handled in arrival order. In sequential mode each update is
//! handled to completion before the next one. In parallel mode every chat gets
//! a single worker task fed through an unbounded channel, which keeps one
//! chat's operations ordered while different chats overlap.
//!
//! A worker that stays idle for the idle window closes its channel, finishes
//! what is already queued, and exits. The next update for that chat starts a
//! fresh worker, which waits for its predecessor before handling anything.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use conch_types::transport::{ChatId, InboundUpdate};

use super::handler::UpdateHandler;

/// Pause after a failed poll before trying again.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// How long a per-chat worker waits for work before exiting.
pub const DEFAULT_WORKER_IDLE: Duration = Duration::from_secs(300);

/// Counters reported when the dispatcher stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Updates handed to the handler.
    pub dispatched: usize,
    /// Per-chat workers started (parallel mode).
    pub workers_spawned: usize,
    /// Workers that exited while the dispatcher was still polling.
    pub workers_retired: usize,
}

/// Sending half of a live per-chat worker.
struct ChatWorker {
    tx: mpsc::UnboundedSender<InboundUpdate>,
    /// Cancelled when the worker task has exited.
    finished: CancellationToken,
}

pub struct Dispatcher {
    handler: Arc<UpdateHandler>,
    parallel: bool,
    retry_delay: Duration,
    worker_idle: Duration,
}

impl Dispatcher {
    pub fn new(handler: Arc<UpdateHandler>, parallel: bool) -> Self {
        Self {
            handler,
            parallel,
            retry_delay: DEFAULT_RETRY_DELAY,
            worker_idle: DEFAULT_WORKER_IDLE,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_worker_idle(mut self, idle: Duration) -> Self {
        self.worker_idle = idle;
        self
    }

    /// Poll and dispatch until `cancel` fires.
    ///
    /// On cancellation no new poll is started; queued per-chat work is drained
    /// before returning.
    pub async fn run(&self, cancel: CancellationToken) -> DispatchSummary {
        let transport = self.handler.responder().transport().clone();
        let mut offset: Option<i64> = None;
        let mut summary = DispatchSummary::default();
        let mut workers: HashMap<ChatId, ChatWorker> = HashMap::new();
        let mut tasks = JoinSet::new();

        info!(
            transport = transport.name(),
            parallel = self.parallel,
            "Dispatcher started"
        );

        loop {
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                polled = transport.poll_updates(offset) => polled,
            };

            let batch = match polled {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(error = %e, "Polling updates failed");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.retry_delay) => continue,
                    }
                }
            };

            // Covers updates the transport saw but did not surface.
            if let Some(next) = batch.next_offset() {
                offset = Some(next);
            }

            for update in batch.updates {
                summary.dispatched += 1;
                if self.parallel {
                    self.enqueue(&mut workers, &mut tasks, &mut summary, update);
                } else {
                    self.handler.handle(update).await;
                }
            }

            if self.parallel {
                workers.retain(|_, worker| !worker.finished.is_cancelled());
                while let Some(joined) = tasks.try_join_next() {
                    log_join(joined);
                    summary.workers_retired += 1;
                }
            }
        }

        // Closing the senders lets each worker finish its queue and exit.
        drop(workers);
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }

        info!(
            dispatched = summary.dispatched,
            workers_spawned = summary.workers_spawned,
            workers_retired = summary.workers_retired,
            "Dispatcher stopped"
        );
        summary
    }

    fn enqueue(
        &self,
        workers: &mut HashMap<ChatId, ChatWorker>,
        tasks: &mut JoinSet<()>,
        summary: &mut DispatchSummary,
        update: InboundUpdate,
    ) {
        let chat_id = update.chat_id;
        let update = match workers.get(&chat_id) {
            Some(worker) => match worker.tx.send(update) {
                Ok(()) => return,
                // The worker went idle and closed its channel.
                Err(mpsc::error::SendError(update)) => update,
            },
            None => update,
        };

        let previous = workers.remove(&chat_id).map(|worker| worker.finished);
        let worker = self.spawn_worker(tasks, chat_id, previous);
        summary.workers_spawned += 1;
        if worker.tx.send(update).is_err() {
            warn!(chat_id, "Chat worker gone; update dropped");
            return;
        }
        workers.insert(chat_id, worker);
    }

    fn spawn_worker(
        &self,
        tasks: &mut JoinSet<()>,
        chat_id: ChatId,
        previous: Option<CancellationToken>,
    ) -> ChatWorker {
        let (tx, mut rx) = mpsc::unbounded_channel::<InboundUpdate>();
        let finished = CancellationToken::new();
        let done = finished.clone().drop_guard();
        let handler = self.handler.clone();
        let idle = self.worker_idle;

        tasks.spawn(async move {
            let _done = done;
            if let Some(previous) = previous {
                previous.cancelled().await;
            }
            loop {
                match tokio::time::timeout(idle, rx.recv()).await {
                    Ok(Some(update)) => {
                        handler.handle(update).await;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        rx.close();
                        while let Some(update) = rx.recv().await {
                            handler.handle(update).await;
                        }
                        debug!(chat_id, "Chat worker idle; exiting");
                        break;
                    }
                }
            }
            debug!(chat_id, "Chat worker finished");
        });
        debug!(chat_id, "Chat worker spawned");

        ChatWorker { tx, finished }
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Chat worker panicked");
    }
}
