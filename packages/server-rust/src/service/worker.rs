//! Generic background worker for periodic and queued maintenance tasks.
//!
//! A `BackgroundWorker<T>` pairs a bounded task queue with a tick timer: it
//! drains `Task`s pushed onto its mpsc channel as they arrive, and calls
//! `on_tick` on a fixed interval in between (e.g. LWW/OR-Map tombstone GC,
//! partition map refresh). `shutdown_receiver` lets the worker stop cleanly
//! alongside the rest of the server.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Trait for tasks executed by `BackgroundWorker`.
#[async_trait]
pub trait BackgroundRunnable: Send + 'static {
    type Task: Send + 'static;

    /// Handles one task pulled from the queue.
    async fn run(&mut self, task: Self::Task);

    /// Called once per tick interval when the queue is idle.
    async fn on_tick(&mut self) {}

    /// Called once after the shutdown signal fires, before the loop exits.
    async fn shutdown(&mut self) {}
}

/// Generic background worker that processes tasks via an mpsc channel,
/// interleaved with periodic ticks.
pub struct BackgroundWorker<T> {
    tx: mpsc::Sender<T>,
}

impl<T: Send + 'static> BackgroundWorker<T> {
    /// Spawns a worker backed by `runnable`, polling its queue (capacity
    /// `queue_capacity`) and firing `on_tick` every `tick_interval`.
    ///
    /// The returned `JoinHandle` resolves once `shutdown_rx` observes `true`
    /// and the runnable's queue has drained.
    pub fn spawn<R>(
        mut runnable: R,
        queue_capacity: usize,
        tick_interval: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>)
    where
        R: BackgroundRunnable<Task = T>,
    {
        let (tx, mut rx) = mpsc::channel(queue_capacity);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    task = rx.recv() => {
                        match task {
                            Some(task) => runnable.run(task).await,
                            None => break,
                        }
                    }
                    _ = ticker.tick() => {
                        runnable.on_tick().await;
                    }
                }
            }

            debug!("background worker shutting down");
            runnable.shutdown().await;
        });

        (Self { tx }, handle)
    }

    /// Enqueues a task, waiting if the queue is full.
    ///
    /// # Errors
    ///
    /// Returns the task back if the worker has already stopped.
    pub async fn submit(&self, task: T) -> Result<(), T> {
        self.tx.send(task).await.map_err(|e| e.0)
    }

    /// Enqueues a task without blocking.
    ///
    /// Returns `false` if the queue is full or the worker has stopped.
    pub fn try_submit(&self, task: T) -> bool {
        match self.tx.try_send(task) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("background worker queue full, dropping task");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}
