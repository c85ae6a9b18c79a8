//! The provisioning workflow.

use std::future::Future;
use std::time::Instant;

use async_trait::async_trait;
use common::RunId;
use domain::{
    AccountDirectory, NewSubject, OperationType, ProvisioningSubject, SubjectError, SubjectId,
    SubjectStatus, SubjectStore,
};
use event_log::{EventLog, NewEvent};
use providers::{
    DomainRegistrar, HostingAccountProvisioner, NewHostingAccount, ProviderError, RegistrarOrder,
};

use crate::config::OrchestratorConfig;
use crate::credentials::{generate_password, hosting_username};
use crate::dispatcher::RunExecutor;
use crate::error::{ProvisioningError, Result};
use crate::events::{
    AccountCreatedPayload, CompletedPayload, DNS_SETUP_SKIPPED, FailedPayload,
    HOSTING_ACCOUNT_CREATED, PROVISIONING_COMPLETED, PROVISIONING_FAILED, PROVISIONING_REQUEUED,
    PROVISIONING_STARTED, REGISTRAR_STEP_SKIPPED, RegistrarInitiatedPayload,
    RegistrarSkippedPayload, RequeuedPayload, STEP_FINALIZE, STEP_HOSTING_ACCOUNT, STEP_REGISTRAR,
    StartedPayload, registrar_initiated,
};
use crate::state::{RunState, RunSummary};

/// How a call to [`Orchestrator::run`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step succeeded and the subject is active.
    Completed,
    /// A step failed; the subject is marked failed and the failure recorded.
    Failed {
        step: String,
        message: String,
        retryable: bool,
    },
    /// Another run already claimed this subject. No side effects were performed.
    IdempotencyConflict,
    /// The subject is not awaiting provisioning. Nothing was claimed.
    NotReady(SubjectStatus),
}

/// A step that could not finish.
struct StepFailure {
    step: &'static str,
    error: ProvisioningError,
    /// Domain order that stands despite the failure.
    provider_order_id: Option<String>,
}

/// Drives a subject through the registrar and hosting steps.
///
/// Each run claims its subject by appending `provisioning.started` through
/// [`EventLog::append_unique`]; the loser of a concurrent claim exits before
/// any provider call.
pub struct Orchestrator<L, S, D, R, H>
where
    L: EventLog,
    S: SubjectStore,
    D: AccountDirectory,
    R: DomainRegistrar,
    H: HostingAccountProvisioner,
{
    log: L,
    subjects: S,
    directory: D,
    registrar: R,
    hosting: H,
    config: OrchestratorConfig,
}

impl<L, S, D, R, H> Orchestrator<L, S, D, R, H>
where
    L: EventLog,
    S: SubjectStore,
    D: AccountDirectory,
    R: DomainRegistrar,
    H: HostingAccountProvisioner,
{
    /// Creates a new orchestrator.
    pub fn new(
        log: L,
        subjects: S,
        directory: D,
        registrar: R,
        hosting: H,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            log,
            subjects,
            directory,
            registrar,
            hosting,
            config,
        }
    }

    /// Runs the workflow for a subject.
    ///
    /// Safe to call any number of times, concurrently or not: side effects
    /// happen at most once per subject. Provider and directory failures end
    /// in [`RunOutcome::Failed`]; an `Err` means storage failed and nothing
    /// more could be recorded.
    #[tracing::instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run(&self, subject_id: SubjectId) -> Result<RunOutcome> {
        metrics::counter!("provisioning_runs_total").increment(1);
        let run_start = Instant::now();

        // 1. Idempotency gate
        if self.log.has_occurred(subject_id, PROVISIONING_STARTED).await? {
            metrics::counter!("provisioning_idempotency_conflicts").increment(1);
            tracing::info!("provisioning already started, skipping");
            return Ok(RunOutcome::IdempotencyConflict);
        }

        let subject = self.load_subject(subject_id).await?;
        if subject.status != SubjectStatus::PendingProvisioning {
            tracing::info!(status = %subject.status, "subject not awaiting provisioning");
            return Ok(RunOutcome::NotReady(subject.status));
        }

        // 2. Claim
        let run_id = RunId::new();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));

        let started = NewEvent::new(
            subject_id,
            PROVISIONING_STARTED,
            format!(
                "Provisioning started for {} ({})",
                subject.name, subject.operation_type
            ),
        )
        .payload(&StartedPayload {
            run_id,
            operation: subject.operation_type.to_string(),
            retry_of: subject.retry_of,
        })?;

        match self.log.append_unique(started).await {
            Ok(_) => {}
            Err(e) if e.is_duplicate() => {
                metrics::counter!("provisioning_idempotency_conflicts").increment(1);
                tracing::info!("lost the provisioning claim to a concurrent run");
                return Ok(RunOutcome::IdempotencyConflict);
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(
            name = %subject.name,
            operation = %subject.operation_type,
            "provisioning started"
        );

        // 3-4. Steps, then 5. finalize
        let outcome = match self.execute_steps(&subject).await {
            Ok(()) => self.finalize_completed(&subject, run_id).await,
            Err(failure) if failure.error.is_storage() => {
                tracing::error!(
                    step = failure.step,
                    provider_order_id = ?failure.provider_order_id,
                    error = %failure.error,
                    "storage failure, aborting run without recording it"
                );
                Err(failure.error)
            }
            Err(failure) => self.finalize_failed(&subject, run_id, failure).await,
        };

        metrics::histogram!("provisioning_run_duration_seconds")
            .record(run_start.elapsed().as_secs_f64());
        outcome
    }

    /// Replays a subject's events into a summary.
    pub async fn summary(&self, subject_id: SubjectId) -> Result<RunSummary> {
        let events = self.log.events_for_subject(subject_id).await?;
        Ok(RunSummary::from_events(subject_id, &events))
    }

    /// Creates a retry of a failed subject.
    ///
    /// The gate never lets a claimed subject run again, so a retry is a new
    /// subject (`pending_provisioning`, `retry_of` = lineage root). The failed
    /// subject gets a `provisioning.requeued` event. Each failed subject can
    /// be requeued once. The caller launches the returned subject.
    #[tracing::instrument(skip(self))]
    pub async fn requeue_failed(&self, subject_id: SubjectId) -> Result<ProvisioningSubject> {
        let failed = self.load_subject(subject_id).await?;
        if failed.status != SubjectStatus::Failed {
            return Err(ProvisioningError::NotRequeueable {
                subject_id,
                status: failed.status,
            });
        }
        if self.log.has_occurred(subject_id, PROVISIONING_REQUEUED).await? {
            return Err(ProvisioningError::AlreadyRequeued(subject_id));
        }

        let lineage_root = failed.lineage_root();
        let mut retry = NewSubject::new(
            failed.client_id,
            failed.service_id,
            failed.name.clone(),
            failed.operation_type,
        )
        .status(SubjectStatus::PendingProvisioning)
        .retry_of(lineage_root);
        if let Some(auth_code) = &failed.auth_code {
            retry = retry.auth_code(auth_code.clone());
        }
        let created = self.subjects.create(retry).await?;

        let requeued = NewEvent::new(
            subject_id,
            PROVISIONING_REQUEUED,
            format!("Requeued by operator as subject {}", created.id),
        )
        .payload(&RequeuedPayload {
            new_subject_id: created.id,
            lineage_root,
        })?;

        match self.log.append_unique(requeued).await {
            Ok(_) => {}
            Err(e) if e.is_duplicate() => {
                // A concurrent requeue won; retire our copy before anything runs it.
                self.subjects
                    .update_status(created.id, SubjectStatus::Cancelled)
                    .await?;
                return Err(ProvisioningError::AlreadyRequeued(subject_id));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(new_subject_id = %created.id, %lineage_root, "failed subject requeued");
        Ok(created)
    }

    /// Closes a run that a storage failure aborted, then requeues the subject.
    ///
    /// Such a run leaves its subject claimed but `pending_provisioning` with
    /// no outcome event, so neither a new trigger nor the sweeper can move
    /// it. The aborted run is recorded as failed at the step it had reached,
    /// flagged for manual reconciliation since provider calls of that step
    /// may have gone through, and a retry is created as by
    /// [`requeue_failed`](Self::requeue_failed).
    ///
    /// Only call this once the aborted run is no longer executing.
    #[tracing::instrument(skip(self))]
    pub async fn recover_aborted(&self, subject_id: SubjectId) -> Result<ProvisioningSubject> {
        let subject = self.load_subject(subject_id).await?;
        if subject.status != SubjectStatus::PendingProvisioning {
            return Err(ProvisioningError::NotAborted(subject_id));
        }
        let summary = self.summary(subject_id).await?;
        if !summary.state.has_started() || summary.state.is_terminal() {
            return Err(ProvisioningError::NotAborted(subject_id));
        }

        // The store records the order before its event, so either may hold it.
        let provider_order_id = subject
            .provider_order_id
            .clone()
            .or(summary.provider_order_id);
        let step = match summary.state {
            RunState::HostingStepDone => STEP_FINALIZE,
            _ if provider_order_id.is_some()
                || !subject.operation_type.requires_registrar() =>
            {
                STEP_HOSTING_ACCOUNT
            }
            _ => STEP_REGISTRAR,
        };
        let message = format!(
            "run aborted by a storage failure during {step}; \
             provider side effects of that step are unconfirmed and need manual reconciliation"
        );

        let failed = NewEvent::new(
            subject_id,
            PROVISIONING_FAILED,
            format!("Provisioning failed at {step}: {message}"),
        )
        .payload(&FailedPayload {
            run_id: summary.run_id.unwrap_or_else(RunId::new),
            step: step.to_string(),
            error_kind: "storage".to_string(),
            error: message,
            provider_message: None,
            retryable: true,
            requires_manual_reconciliation: true,
            provider_order_id,
        })?;
        self.log.append(failed).await?;
        self.subjects
            .update_status(subject_id, SubjectStatus::Failed)
            .await?;

        metrics::counter!("provisioning_runs_recovered").increment(1);
        tracing::warn!(step, "aborted run recorded as failed");
        self.requeue_failed(subject_id).await
    }

    async fn load_subject(&self, subject_id: SubjectId) -> Result<ProvisioningSubject> {
        self.subjects.get(subject_id).await.map_err(|e| match e {
            SubjectError::NotFound(id) => ProvisioningError::SubjectNotFound(id),
            other => other.into(),
        })
    }

    async fn execute_steps(
        &self,
        subject: &ProvisioningSubject,
    ) -> std::result::Result<(), StepFailure> {
        tracing::info!(step = STEP_REGISTRAR, "provisioning step started");
        let provider_order_id = self
            .registrar_step(subject)
            .await
            .map_err(|error| StepFailure {
                step: STEP_REGISTRAR,
                error,
                provider_order_id: None,
            })?;

        tracing::info!(step = STEP_HOSTING_ACCOUNT, "provisioning step started");
        self.hosting_step(subject)
            .await
            .map_err(|error| StepFailure {
                step: STEP_HOSTING_ACCOUNT,
                error,
                provider_order_id,
            })
    }

    /// Registers or transfers the domain. Returns the order that stands for
    /// this subject, if any.
    async fn registrar_step(&self, subject: &ProvisioningSubject) -> Result<Option<String>> {
        let operation = subject.operation_type;
        let provider = self.registrar.provider_name().to_string();
        let order: RegistrarOrder = match operation {
            OperationType::UseExisting => {
                self.log
                    .append(NewEvent::new(
                        subject.id,
                        DNS_SETUP_SKIPPED,
                        format!(
                            "{} is already owned by the client; registrar step skipped",
                            subject.name
                        ),
                    ))
                    .await?;
                return Ok(None);
            }
            OperationType::Transfer => {
                if let Some(order_id) = self.reuse_prior_registration(subject).await? {
                    return Ok(Some(order_id));
                }
                let Some(auth_code) = subject.auth_code.as_deref() else {
                    return Err(ProviderError::rejected(
                        provider,
                        "transfer requires an auth code and none was provided",
                    )
                    .into());
                };
                self.call_provider(
                    &provider,
                    "transfer",
                    self.registrar.transfer(&subject.name, auth_code),
                )
                .await?
            }
            OperationType::Register => {
                if let Some(order_id) = self.reuse_prior_registration(subject).await? {
                    return Ok(Some(order_id));
                }
                let registrant = self.directory.registrant(subject.client_id).await?;
                self.call_provider(
                    &provider,
                    "register",
                    self.registrar.register(&subject.name, &registrant),
                )
                .await?
            }
        };

        if let Err(e) = self
            .subjects
            .set_provider_order(subject.id, &provider, &order.order_id)
            .await
        {
            tracing::error!(
                order_id = %order.order_id,
                error = %e,
                "registrar order placed but not recorded"
            );
            return Err(e.into());
        }

        let initiated = NewEvent::new(
            subject.id,
            registrar_initiated(&provider, operation.as_str()),
            format!(
                "{provider} {operation} of {} accepted, order {}",
                subject.name, order.order_id
            ),
        )
        .payload(&RegistrarInitiatedPayload {
            provider: provider.clone(),
            operation: operation.to_string(),
            order_id: order.order_id.clone(),
        })?;
        self.log.append(initiated).await?;

        tracing::info!(%provider, order_id = %order.order_id, "registrar step done");
        Ok(Some(order.order_id))
    }

    /// Records `registrar.step.skipped` and returns the order when an earlier
    /// subject of the lineage already registered the domain.
    async fn reuse_prior_registration(
        &self,
        subject: &ProvisioningSubject,
    ) -> Result<Option<String>> {
        let Some(prior) = self.prior_registration(subject).await? else {
            return Ok(None);
        };
        let (provider, order_id) = prior
            .provider_name
            .clone()
            .zip(prior.provider_order_id.clone())
            .unwrap_or_default();
        let skipped = NewEvent::new(
            subject.id,
            REGISTRAR_STEP_SKIPPED,
            format!(
                "{} was already registered by subject {} (order {order_id})",
                subject.name, prior.id
            ),
        )
        .payload(&RegistrarSkippedPayload {
            provider,
            order_id: order_id.clone(),
            registered_by: prior.id,
        })?;
        self.log.append(skipped).await?;
        tracing::info!(registered_by = %prior.id, %order_id, "registrar step skipped");
        Ok(Some(order_id))
    }

    /// Finds an earlier subject of the same lineage whose run registered the domain.
    async fn prior_registration(
        &self,
        subject: &ProvisioningSubject,
    ) -> Result<Option<ProvisioningSubject>> {
        let Some(root) = subject.retry_of else {
            return Ok(None);
        };
        let lineage = self.subjects.lineage(root).await?;
        Ok(lineage
            .into_iter()
            .find(|member| member.id != subject.id && member.has_provider_order()))
    }

    async fn hosting_step(&self, subject: &ProvisioningSubject) -> Result<()> {
        let plan = self.directory.plan_name(subject.service_id).await?;
        let contact = self.directory.registrant(subject.client_id).await?;

        let request = NewHostingAccount {
            username: hosting_username(&self.config.username_prefix, subject.lineage_root()),
            domain: subject.name.clone(),
            plan,
            password: generate_password(self.config.password_length),
            contact_email: contact.email,
        };

        let provider = self.hosting.provider_name().to_string();
        let account = self
            .call_provider(&provider, "create_account", self.hosting.create_account(&request))
            .await?;

        let created = NewEvent::new(
            subject.id,
            HOSTING_ACCOUNT_CREATED,
            format!(
                "Hosting account {} created for {} on plan {}",
                request.username, subject.name, request.plan
            ),
        )
        .payload(&AccountCreatedPayload {
            provider,
            username: request.username.clone(),
            plan: request.plan.clone(),
            handle: account.handle,
        })?;
        self.log.append(created).await?;

        tracing::info!(username = %request.username, "hosting account created");
        Ok(())
    }

    /// Bounds a provider call by the configured timeout; a timeout is `Unavailable`.
    async fn call_provider<T>(
        &self,
        provider: &str,
        operation: &'static str,
        call: impl Future<Output = std::result::Result<T, ProviderError>>,
    ) -> std::result::Result<T, ProviderError> {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.config.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::timed_out(provider, self.config.call_timeout)),
        };
        metrics::histogram!(
            "provider_call_duration_seconds",
            "provider" => provider.to_string(),
            "operation" => operation
        )
        .record(started.elapsed().as_secs_f64());
        result
    }

    async fn finalize_completed(
        &self,
        subject: &ProvisioningSubject,
        run_id: RunId,
    ) -> Result<RunOutcome> {
        // Event before status: an active subject always has its completion event.
        let completed = NewEvent::new(
            subject.id,
            PROVISIONING_COMPLETED,
            format!("Provisioning of {} completed", subject.name),
        )
        .payload(&CompletedPayload { run_id })?;
        self.log.append(completed).await?;
        self.subjects
            .update_status(subject.id, SubjectStatus::Active)
            .await?;

        metrics::counter!("provisioning_runs_completed").increment(1);
        tracing::info!("provisioning completed");
        Ok(RunOutcome::Completed)
    }

    async fn finalize_failed(
        &self,
        subject: &ProvisioningSubject,
        run_id: RunId,
        failure: StepFailure,
    ) -> Result<RunOutcome> {
        let StepFailure {
            step,
            error,
            provider_order_id,
        } = failure;

        let requires_manual_reconciliation =
            step == STEP_HOSTING_ACCOUNT && provider_order_id.is_some();
        let message = match (&provider_order_id, requires_manual_reconciliation) {
            (Some(order_id), true) => format!(
                "{error}; domain order {order_id} for {} stands and needs manual reconciliation",
                subject.name
            ),
            _ => error.to_string(),
        };
        let retryable = error.is_retryable();

        let failed = NewEvent::new(
            subject.id,
            PROVISIONING_FAILED,
            format!("Provisioning failed at {step}: {message}"),
        )
        .payload(&FailedPayload {
            run_id,
            step: step.to_string(),
            error_kind: error.kind().to_string(),
            error: message.clone(),
            provider_message: error.provider_message().map(str::to_string),
            retryable,
            requires_manual_reconciliation,
            provider_order_id,
        })?;
        self.log.append(failed).await?;
        self.subjects
            .update_status(subject.id, SubjectStatus::Failed)
            .await?;

        metrics::counter!("provisioning_runs_failed", "step" => step).increment(1);
        tracing::warn!(
            step,
            retryable,
            requires_manual_reconciliation,
            error = %message,
            "provisioning failed"
        );
        Ok(RunOutcome::Failed {
            step: step.to_string(),
            message,
            retryable,
        })
    }
}

#[async_trait]
impl<L, S, D, R, H> RunExecutor for Orchestrator<L, S, D, R, H>
where
    L: EventLog + 'static,
    S: SubjectStore + 'static,
    D: AccountDirectory + 'static,
    R: DomainRegistrar + 'static,
    H: HostingAccountProvisioner + 'static,
{
    async fn execute(&self, subject_id: SubjectId) -> Result<RunOutcome> {
        self.run(subject_id).await
    }
}
