//! Periodic recovery of lost launches.
//!
//! A subject marked `pending_provisioning` whose launch was dropped (process
//! crash, full queue) would wait forever. The sweeper finds such subjects and
//! launches them again; the claim makes a duplicate launch harmless.

use std::sync::Arc;
use std::time::Duration;

use domain::{SubjectStatus, SubjectStore};
use event_log::EventLog;
use orchestrator::events::PROVISIONING_STARTED;
use orchestrator::{LaunchError, ProvisioningError, ProvisioningLauncher};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

const DEFAULT_BATCH_SIZE: usize = 100;

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub launched: usize,
    /// Pending subjects that a run has already claimed.
    pub claimed: usize,
    /// Launches refused because the queue was full.
    pub rejected: usize,
}

pub struct PendingSweeper<L, S>
where
    L: EventLog,
    S: SubjectStore,
{
    log: L,
    subjects: S,
    launcher: Arc<dyn ProvisioningLauncher>,
    batch_size: usize,
}

impl<L, S> PendingSweeper<L, S>
where
    L: EventLog,
    S: SubjectStore,
{
    pub fn new(log: L, subjects: S, launcher: Arc<dyn ProvisioningLauncher>) -> Self {
        Self {
            log,
            subjects,
            launcher,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Caps how many pending subjects one sweep looks at.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Launches every unclaimed pending subject, oldest first.
    ///
    /// Pages through the pending subjects `batch_size` at a time so claimed
    /// ones never hide newer lost launches. Stops early when the queue is
    /// full; the rest wait for the next sweep.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_once(&self) -> Result<SweepReport, ProvisioningError> {
        let mut report = SweepReport::default();
        let mut cursor = None;

        'pages: loop {
            let page = self
                .subjects
                .list_by_status(SubjectStatus::PendingProvisioning, cursor, self.batch_size)
                .await?;
            let exhausted = page.len() < self.batch_size;
            cursor = page.last().map(|subject| subject.id);

            for subject in page {
                if self.log.has_occurred(subject.id, PROVISIONING_STARTED).await? {
                    tracing::debug!(subject_id = %subject.id, "pending subject already claimed");
                    report.claimed += 1;
                    continue;
                }

                match self.launcher.launch_provisioning(subject.id) {
                    Ok(()) => report.launched += 1,
                    Err(LaunchError::QueueFull(_)) => {
                        report.rejected += 1;
                        break 'pages;
                    }
                    Err(LaunchError::ShuttingDown) => break 'pages,
                }
            }

            if exhausted || cursor.is_none() {
                break;
            }
        }

        metrics::counter!("provisioning_sweep_launched").increment(report.launched as u64);
        Ok(report)
    }

    /// Sweeps every `interval` until `shutdown` fires.
    pub async fn run(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval_secs = interval.as_secs(), "pending sweeper started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => match self.sweep_once().await {
                    Ok(report) if report.launched > 0 || report.rejected > 0 => {
                        tracing::info!(
                            launched = report.launched,
                            rejected = report.rejected,
                            claimed = report.claimed,
                            "pending subjects relaunched"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "pending sweep failed"),
                },
            }
        }

        tracing::info!("pending sweeper stopped");
    }
}
