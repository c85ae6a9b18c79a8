//! Background execution of provisioning runs.
//!
//! Triggers hand subject ids to a [`ProvisioningLauncher`] and return at once;
//! a fixed pool of workers drains a bounded queue and runs the workflow.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use common::SubjectId;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::DispatcherConfig;
use crate::error::Result;
use crate::orchestrator::RunOutcome;

/// Something that runs the workflow for one subject.
#[async_trait]
pub trait RunExecutor: Send + Sync {
    async fn execute(&self, subject_id: SubjectId) -> Result<RunOutcome>;
}

/// Fire-and-forget entry point used by triggers.
pub trait ProvisioningLauncher: Send + Sync {
    /// Queues a run for the subject without waiting for it.
    fn launch_provisioning(&self, subject_id: SubjectId) -> std::result::Result<(), LaunchError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchError {
    #[error("Provisioning queue is full; subject {0} was not queued")]
    QueueFull(SubjectId),

    #[error("Dispatcher is shutting down")]
    ShuttingDown,
}

/// A bounded queue drained by a fixed set of workers.
///
/// Each run executes in its own task, so a panicking run is logged and the
/// worker moves on.
pub struct ProvisioningDispatcher {
    sender: Mutex<Option<mpsc::Sender<SubjectId>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
    queue_capacity: usize,
    in_flight: Arc<AtomicUsize>,
}

impl ProvisioningDispatcher {
    /// Spawns the workers. Must be called inside a tokio runtime.
    pub fn start(executor: Arc<dyn RunExecutor>, config: DispatcherConfig) -> Self {
        let worker_count = config.workers.max(1);
        let queue_capacity = config.queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel::<SubjectId>(queue_capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let in_flight = Arc::new(AtomicUsize::new(0));

        let workers = (0..worker_count)
            .map(|worker| {
                let executor = executor.clone();
                let receiver = receiver.clone();
                let in_flight = in_flight.clone();
                tokio::spawn(async move {
                    worker_loop(worker, executor, receiver, in_flight).await;
                })
            })
            .collect();

        tracing::info!(worker_count, queue_capacity, "provisioning dispatcher started");

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            worker_count,
            queue_capacity,
            in_flight,
        }
    }

    /// Subjects queued but not yet picked up by a worker.
    pub fn queue_depth(&self) -> usize {
        match self.sender.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(sender) => sender.max_capacity() - sender.capacity(),
            None => 0,
        }
    }

    /// Runs currently executing.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Stops accepting launches, lets the workers drain the queue and waits
    /// for them to finish.
    pub async fn shutdown(&self) {
        drop(self.sender.lock().unwrap_or_else(PoisonError::into_inner).take());
        let workers: Vec<JoinHandle<()>> = {
            let mut guard = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "provisioning worker ended abnormally");
            }
        }
        tracing::info!("provisioning dispatcher stopped");
    }
}

impl ProvisioningLauncher for ProvisioningDispatcher {
    fn launch_provisioning(&self, subject_id: SubjectId) -> std::result::Result<(), LaunchError> {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            return Err(LaunchError::ShuttingDown);
        };
        match sender.try_send(subject_id) {
            Ok(()) => {
                tracing::debug!(%subject_id, "provisioning run queued");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                metrics::counter!("provisioning_dispatch_rejected").increment(1);
                tracing::warn!(%subject_id, "provisioning queue full, launch rejected");
                Err(LaunchError::QueueFull(subject_id))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(LaunchError::ShuttingDown),
        }
    }
}

async fn worker_loop(
    worker: usize,
    executor: Arc<dyn RunExecutor>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<SubjectId>>>,
    in_flight: Arc<AtomicUsize>,
) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(subject_id) = next else { break };

        in_flight.fetch_add(1, Ordering::SeqCst);
        let executor = executor.clone();
        let run = tokio::spawn(async move { executor.execute(subject_id).await });
        match run.await {
            Ok(Ok(outcome)) => {
                tracing::debug!(worker, %subject_id, ?outcome, "provisioning run finished");
            }
            Ok(Err(e)) => {
                tracing::error!(worker, %subject_id, error = %e, "provisioning run aborted");
            }
            Err(e) => {
                tracing::error!(worker, %subject_id, error = %e, "provisioning run panicked");
            }
        }
        in_flight.fetch_sub(1, Ordering::SeqCst);
    }
    tracing::debug!(worker, "provisioning worker exiting");
}
