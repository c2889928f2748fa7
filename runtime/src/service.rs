//! Ticket service: the imperative shell around [`TicketReducer`].
//!
//! Every mutation runs under the ticket's lock as load, reduce, commit. The
//! commit is version-checked; when another writer got there first the whole
//! command is re-evaluated against the fresh snapshot, bounded by the
//! configured [`RetryPolicy`]. Delivery effects are spawned only after the
//! commit succeeded, so a failed or retried attempt never notifies anyone.

use crate::directory::{StaticDirectory, StaticSlaTable};
use crate::locks::TicketLocks;
use crate::mailer::MeteredMailer;
use crate::retry::{RetryPolicy, retry_when};
use crate::telemetry::{COMMIT_CONFLICTS, MUTATIONS_COMMITTED, MUTATIONS_REJECTED};
use futures::future::{BoxFuture, join_all};
use helpdesk_core::effect::Effect;
use helpdesk_core::reducer::Reducer;
use helpdesk_core::SmallVec;
use helpdesk_engine::history::visible_history;
use helpdesk_engine::query::{list_tickets, visible_comments};
use helpdesk_engine::{
    Actor, ChangeSet, Comment, CommitBatch, EngineError, EngineResult, HistoryEntry, IdentityProvider,
    Mailer, NewTicket, OverdueScanner, RepositoryError, SlaProvider, Ticket, TicketAction, TicketEngine,
    TicketEnvironment, TicketId, TicketPage, TicketQuery, TicketReducer, TicketRepository, TicketState, UserId,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

type Effects = SmallVec<[Effect<TicketAction>; 4]>;

// ============================================================================
// Errors and outcomes
// ============================================================================

/// Errors returned by [`TicketService`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The engine rejected the command.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Storage failed, or the ticket is unknown.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The identity provider does not know this user.
    #[error("Unknown user: {0}")]
    UnknownActor(UserId),
}

impl ServiceError {
    /// Commit lost a race; retrying against fresh state may succeed.
    #[must_use]
    pub const fn is_version_conflict(&self) -> bool {
        matches!(self, Self::Repository(RepositoryError::VersionConflict { .. }))
    }

    /// The ticket id is unknown.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Engine(EngineError::NotFound(_)) | Self::Repository(RepositoryError::NotFound(_))
        )
    }
}

/// Spawned notification deliveries of one committed mutation.
#[derive(Debug, Default)]
pub struct DeliveryHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl DeliveryHandle {
    /// Handle with nothing to wait for.
    #[must_use]
    pub fn completed() -> Self {
        Self::default()
    }

    /// Number of deliveries spawned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when nothing was spawned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait until every delivery finished, successfully or not.
    pub async fn wait(self) {
        for joined in join_all(self.tasks).await {
            if let Err(error) = joined {
                tracing::warn!(%error, "delivery task did not complete");
            }
        }
    }

    /// [`DeliveryHandle::wait`] bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// [`tokio::time::error::Elapsed`] when deliveries are still running at
    /// the deadline. They keep running in the background.
    pub async fn wait_with_timeout(self, timeout: Duration) -> Result<(), tokio::time::error::Elapsed> {
        tokio::time::timeout(timeout, self.wait()).await
    }
}

/// A committed mutation and its in-flight deliveries.
#[derive(Debug)]
pub struct ServiceOutcome {
    /// What the engine produced; `result.ticket` carries the stored version
    pub result: EngineResult,
    /// Notifications being delivered
    pub deliveries: DeliveryHandle,
}

struct Reduced {
    result: EngineResult,
    effects: Effects,
}

// ============================================================================
// Service
// ============================================================================

/// Runs engine commands against a repository with per-ticket locking and
/// version-checked commits.
pub struct TicketService {
    repository: Arc<dyn TicketRepository>,
    identities: Arc<dyn IdentityProvider>,
    sla: Arc<dyn SlaProvider>,
    locks: TicketLocks,
    reducer: TicketReducer,
    environment: TicketEnvironment,
    retry_policy: RetryPolicy,
}

impl std::fmt::Debug for TicketService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketService")
            .field("engine", &self.environment.engine)
            .field("retry_policy", &self.retry_policy)
            .field("active_locks", &self.active_locks())
            .finish_non_exhaustive()
    }
}

impl TicketService {
    /// Service over `repository`, notifying through `mailer`.
    ///
    /// Starts with an empty identity directory, no SLA rules and the default
    /// retry policy.
    #[must_use]
    pub fn new(engine: TicketEngine, repository: Arc<dyn TicketRepository>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            repository,
            identities: Arc::new(StaticDirectory::new()),
            sla: Arc::new(StaticSlaTable::default()),
            locks: TicketLocks::new(),
            reducer: TicketReducer::new(),
            environment: TicketEnvironment::new(engine, Arc::new(MeteredMailer::new(mailer))),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Resolve actors through `identities`.
    #[must_use]
    pub fn with_identities(mut self, identities: Arc<dyn IdentityProvider>) -> Self {
        self.identities = identities;
        self
    }

    /// Read SLA rules from `sla`.
    #[must_use]
    pub fn with_sla(mut self, sla: Arc<dyn SlaProvider>) -> Self {
        self.sla = sla;
        self
    }

    /// Bound conflict re-evaluation by `policy`.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// The engine commands are evaluated with.
    #[must_use]
    pub const fn engine(&self) -> &TicketEngine {
        &self.environment.engine
    }

    /// Tickets currently being mutated or waited on.
    #[must_use]
    pub fn active_locks(&self) -> usize {
        self.locks.active()
    }

    /// Look up a user's capabilities.
    ///
    /// # Errors
    ///
    /// [`ServiceError::UnknownActor`] when the directory has no such user.
    pub async fn resolve_actor(&self, id: &UserId) -> Result<Actor, ServiceError> {
        self.identities
            .resolve(id)
            .await
            .ok_or_else(|| ServiceError::UnknownActor(id.clone()))
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Open a ticket owned by `actor`.
    ///
    /// # Errors
    ///
    /// Engine validation errors, or a repository failure on insert.
    #[tracing::instrument(skip(self, actor, input), fields(actor = %actor.id))]
    pub async fn create(&self, actor: &Actor, input: NewTicket) -> Result<ServiceOutcome, ServiceError> {
        // A fresh id is unknown to every other caller, so nothing to lock.
        let id = TicketId::new();
        let mut state = TicketState::new(id);
        let action = TicketAction::Create {
            actor: actor.clone(),
            input,
        };
        let command = action.name();
        let effects = self.reducer.reduce(&mut state, action, &self.environment);
        let Reduced { mut result, effects } = Self::take_result(state, effects, command)?;

        result.ticket = self.repository.insert(result.ticket).await?;
        metrics::counter!(MUTATIONS_COMMITTED, "command" => command).increment(1);
        tracing::info!(ticket_id = %id, "ticket created");

        Ok(ServiceOutcome {
            result,
            deliveries: Self::spawn_effects(effects),
        })
    }

    /// Staff update of any combination of fields.
    ///
    /// # Errors
    ///
    /// Engine errors, `NotFound`, or a version conflict that outlived the
    /// retry policy.
    #[tracing::instrument(skip(self, id, actor, changes), fields(ticket_id = %id, actor = %actor.id))]
    pub async fn apply_update(
        &self,
        id: TicketId,
        actor: &Actor,
        changes: ChangeSet,
    ) -> Result<ServiceOutcome, ServiceError> {
        self.mutate(
            id,
            TicketAction::ApplyUpdate {
                actor: actor.clone(),
                changes,
            },
        )
        .await
    }

    /// Append a comment.
    ///
    /// # Errors
    ///
    /// See [`TicketService::apply_update`].
    #[tracing::instrument(skip(self, id, actor, content), fields(ticket_id = %id, actor = %actor.id))]
    pub async fn add_comment(
        &self,
        id: TicketId,
        actor: &Actor,
        content: impl Into<String>,
        is_internal: bool,
    ) -> Result<ServiceOutcome, ServiceError> {
        self.mutate(
            id,
            TicketAction::AddComment {
                actor: actor.clone(),
                content: content.into(),
                is_internal,
            },
        )
        .await
    }

    /// Resolve the ticket, optionally with a public note.
    ///
    /// # Errors
    ///
    /// See [`TicketService::apply_update`].
    #[tracing::instrument(skip(self, id, actor, note), fields(ticket_id = %id, actor = %actor.id))]
    pub async fn resolve(
        &self,
        id: TicketId,
        actor: &Actor,
        note: Option<String>,
    ) -> Result<ServiceOutcome, ServiceError> {
        self.mutate(
            id,
            TicketAction::Resolve {
                actor: actor.clone(),
                note,
            },
        )
        .await
    }

    /// Close a resolved ticket.
    ///
    /// # Errors
    ///
    /// See [`TicketService::apply_update`].
    #[tracing::instrument(skip(self, id, actor), fields(ticket_id = %id, actor = %actor.id))]
    pub async fn close(&self, id: TicketId, actor: &Actor) -> Result<ServiceOutcome, ServiceError> {
        self.mutate(id, TicketAction::Close { actor: actor.clone() }).await
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Load a ticket the actor may view.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `Forbidden` when the actor is neither staff nor the
    /// requester.
    pub async fn ticket(&self, id: TicketId, actor: &Actor) -> Result<Ticket, ServiceError> {
        let ticket = self.repository.load(id).await?;
        if !actor.can_view(&ticket) {
            return Err(EngineError::Forbidden {
                action: "view this ticket",
            }
            .into());
        }
        Ok(ticket)
    }

    /// Comments the actor may see, newest first.
    ///
    /// # Errors
    ///
    /// See [`TicketService::ticket`].
    pub async fn comments(&self, id: TicketId, actor: &Actor) -> Result<Vec<Comment>, ServiceError> {
        self.ticket(id, actor).await?;
        let comments = self.repository.comments(id).await?;
        Ok(visible_comments(&comments, actor).into_iter().rev().cloned().collect())
    }

    /// History the actor may see, newest first.
    ///
    /// # Errors
    ///
    /// See [`TicketService::ticket`].
    pub async fn history(&self, id: TicketId, actor: &Actor) -> Result<Vec<HistoryEntry>, ServiceError> {
        self.ticket(id, actor).await?;
        let history = self.repository.history(id).await?;
        Ok(visible_history(&history, actor).iter().rev().cloned().collect())
    }

    /// One page of the tickets the actor may view.
    ///
    /// # Errors
    ///
    /// Repository failures.
    pub async fn list(&self, actor: &Actor, query: &TicketQuery) -> Result<TicketPage, ServiceError> {
        let tickets = self.repository.all().await?;
        Ok(list_tickets(&tickets, actor, query))
    }

    /// Whether the ticket is past its effective deadline right now.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown ids.
    pub async fn is_overdue(&self, id: TicketId) -> Result<bool, ServiceError> {
        let ticket = self.repository.load(id).await?;
        let rule = self.sla.rule_for(ticket.priority, Some(ticket.category)).await;
        let scanner = OverdueScanner::new(rule.into_iter().collect(), self.engine().config().unscheduled_overdue);
        Ok(scanner.is_overdue(&ticket, self.engine().now()))
    }

    /// Overdue tickets the actor may view, highest priority first.
    ///
    /// # Errors
    ///
    /// Repository failures.
    pub async fn overdue(&self, actor: &Actor) -> Result<Vec<Ticket>, ServiceError> {
        let tickets: Vec<Ticket> = self
            .repository
            .all()
            .await?
            .into_iter()
            .filter(|ticket| actor.can_view(ticket))
            .collect();
        let scanner = OverdueScanner::new(self.sla.rules().await, self.engine().config().unscheduled_overdue);
        Ok(scanner
            .overdue_tickets(&tickets, self.engine().now())
            .into_iter()
            .cloned()
            .collect())
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    async fn mutate(&self, id: TicketId, action: TicketAction) -> Result<ServiceOutcome, ServiceError> {
        let _guard = self.locks.acquire(id).await;

        let Reduced { result, effects } = retry_when(
            &self.retry_policy,
            || self.reduce_and_commit(id, action.clone()),
            ServiceError::is_version_conflict,
        )
        .await?;

        Ok(ServiceOutcome {
            result,
            deliveries: Self::spawn_effects(effects),
        })
    }

    async fn reduce_and_commit(&self, id: TicketId, action: TicketAction) -> Result<Reduced, ServiceError> {
        let command = action.name();
        let loaded = self.repository.load(id).await?;
        let expected_version = loaded.version;

        let mut state = TicketState::loaded(loaded);
        let effects = self.reducer.reduce(&mut state, action, &self.environment);
        let Reduced { mut result, effects } = Self::take_result(state, effects, command)?;

        if result.is_noop() {
            tracing::debug!(ticket_id = %id, command, "nothing to commit");
            return Ok(Reduced { result, effects });
        }

        let batch = CommitBatch {
            ticket: result.ticket.clone(),
            expected_version,
            history: result.history.entries().to_vec(),
            comment: result.comment.clone(),
        };
        match self.repository.commit(batch).await {
            Ok(stored) => {
                result.ticket = stored;
                metrics::counter!(MUTATIONS_COMMITTED, "command" => command).increment(1);
                tracing::debug!(ticket_id = %id, version = result.ticket.version, command, "mutation committed");
                Ok(Reduced { result, effects })
            },
            Err(error @ RepositoryError::VersionConflict { .. }) => {
                metrics::counter!(COMMIT_CONFLICTS, "command" => command).increment(1);
                Err(error.into())
            },
            Err(error) => Err(error.into()),
        }
    }

    /// Pull the engine result out of a reduced state, or its error.
    fn take_result(state: TicketState, effects: Effects, command: &'static str) -> Result<Reduced, ServiceError> {
        match state.into_result() {
            Ok(result) => Ok(Reduced { result, effects }),
            Err(error) => {
                metrics::counter!(MUTATIONS_REJECTED, "command" => command).increment(1);
                Err(error.into())
            },
        }
    }

    fn spawn_effects(effects: Effects) -> DeliveryHandle {
        let tasks = effects
            .into_iter()
            .filter(|effect| !effect.is_none())
            .map(|effect| tokio::spawn(run_effect(effect)))
            .collect();
        DeliveryHandle { tasks }
    }
}

/// Drive one effect tree to completion. Feedback actions are not expected
/// from delivery effects and are dropped.
fn run_effect(effect: Effect<TicketAction>) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        match effect {
            Effect::None => {},
            Effect::Future(fut) => {
                if let Some(action) = fut.await {
                    tracing::debug!(command = action.name(), "ignoring effect feedback");
                }
            },
            Effect::Sequential(effects) => {
                for effect in effects {
                    run_effect(effect).await;
                }
            },
        }
    })
}
