//! Ticket reducer: engine operations as commands over a ticket snapshot.
//!
//! The reducer is the functional core the runtime drives. Each command runs
//! the matching [`TicketEngine`] operation. Success replaces the snapshot and
//! stages history and comments for the shell to commit; every notification
//! becomes a delivery effect the shell runs after that commit.

use crate::engine::{EngineResult, NewTicket, TicketEngine};
use crate::error::EngineError;
use crate::history::HistoryLog;
use crate::notification::{NotificationEvent, Recipient};
use crate::ports::Mailer;
use crate::transition::ChangeSet;
use crate::types::{Actor, Comment, Ticket, TicketId};
use helpdesk_core::effect::Effect;
use helpdesk_core::reducer::Reducer;
use helpdesk_core::{SmallVec, smallvec};
use std::sync::Arc;

/// Commands accepted by [`TicketReducer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketAction {
    /// Open the ticket identified by the state
    Create {
        /// Requester
        actor: Actor,
        /// Ticket fields
        input: NewTicket,
    },
    /// General staff update
    ApplyUpdate {
        /// Who is updating
        actor: Actor,
        /// Proposed changes
        changes: ChangeSet,
    },
    /// Append a comment
    AddComment {
        /// Author
        actor: Actor,
        /// Body
        content: String,
        /// Requested visibility
        is_internal: bool,
    },
    /// Resolve the ticket
    Resolve {
        /// Who resolves
        actor: Actor,
        /// Optional public note
        note: Option<String>,
    },
    /// Close a resolved ticket
    Close {
        /// Who closes
        actor: Actor,
    },
}

impl TicketAction {
    /// Command name for logs and metrics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::ApplyUpdate { .. } => "apply_update",
            Self::AddComment { .. } => "add_comment",
            Self::Resolve { .. } => "resolve",
            Self::Close { .. } => "close",
        }
    }
}

/// Writes produced since the snapshot was loaded, waiting to be committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedChanges {
    /// Audit entries in the order they were recorded
    pub history: HistoryLog,
    /// New comments
    pub comments: Vec<Comment>,
    /// Notifications whose delivery effects were emitted
    pub notifications: Vec<NotificationEvent>,
}

impl StagedChanges {
    /// Nothing to write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty() && self.comments.is_empty()
    }

    fn stage(&mut self, result: &EngineResult) {
        self.history.extend(result.history.clone());
        self.comments.extend(result.comment.clone());
        self.notifications.extend(result.notifications.iter().cloned());
    }
}

/// State of one ticket while commands are reduced against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketState {
    /// Identity of the ticket this state tracks
    pub id: TicketId,
    /// Latest snapshot; `None` until created or loaded
    pub ticket: Option<Ticket>,
    /// Uncommitted writes
    pub staged: StagedChanges,
    /// Error of the last rejected command
    pub last_error: Option<EngineError>,
}

impl TicketState {
    /// State for a ticket that does not exist yet.
    #[must_use]
    pub fn new(id: TicketId) -> Self {
        Self {
            id,
            ticket: None,
            staged: StagedChanges::default(),
            last_error: None,
        }
    }

    /// State seeded from a committed snapshot.
    #[must_use]
    pub fn loaded(ticket: Ticket) -> Self {
        Self {
            id: ticket.id,
            ticket: Some(ticket),
            staged: StagedChanges::default(),
            last_error: None,
        }
    }
}

impl TicketState {
    /// Everything reduced since the snapshot was loaded, as one result.
    ///
    /// The comment is the most recent staged one.
    ///
    /// # Errors
    ///
    /// The last rejection, or `NotFound` when no ticket was ever created or
    /// loaded.
    pub fn into_result(self) -> Result<EngineResult, EngineError> {
        if let Some(error) = self.last_error {
            return Err(error);
        }
        let ticket = self.ticket.ok_or(EngineError::NotFound(self.id))?;

        Ok(EngineResult {
            ticket,
            history: self.staged.history,
            comment: self.staged.comments.into_iter().next_back(),
            notifications: self.staged.notifications,
        })
    }
}

/// Dependencies of [`TicketReducer`].
#[derive(Clone)]
pub struct TicketEnvironment {
    /// Lifecycle rules
    pub engine: TicketEngine,
    /// Notification transport used by delivery effects
    pub mailer: Arc<dyn Mailer>,
}

impl TicketEnvironment {
    /// Creates a new ticket environment
    #[must_use]
    pub fn new(engine: TicketEngine, mailer: Arc<dyn Mailer>) -> Self {
        Self { engine, mailer }
    }
}

/// Reducer over [`TicketState`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TicketReducer;

impl TicketReducer {
    /// Creates a new ticket reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn run(env: &TicketEnvironment, state: &TicketState, action: TicketAction) -> Result<EngineResult, EngineError> {
        let engine = &env.engine;
        let Some(current) = state.ticket.as_ref() else {
            return match action {
                TicketAction::Create { actor, input } => engine.create(state.id, &actor, &input),
                _ => Err(EngineError::NotFound(state.id)),
            };
        };

        match action {
            TicketAction::Create { .. } => Err(EngineError::Conflict(format!("ticket {} already exists", state.id))),
            TicketAction::ApplyUpdate { actor, changes } => engine.apply_update(current, &actor, &changes),
            TicketAction::AddComment {
                actor,
                content,
                is_internal,
            } => engine.add_comment(current, &actor, &content, is_internal),
            TicketAction::Resolve { actor, note } => engine.resolve(current, &actor, note.as_deref()),
            TicketAction::Close { actor } => engine.close(current, &actor),
        }
    }

    /// One effect per recipient. A recipient with several events gets them
    /// chained in dispatch order; distinct recipients run concurrently.
    fn delivery_effects(
        mailer: &Arc<dyn Mailer>,
        events: Vec<NotificationEvent>,
    ) -> SmallVec<[Effect<TicketAction>; 4]> {
        let mut by_recipient: Vec<(Recipient, Vec<Effect<TicketAction>>)> = Vec::new();
        for event in events {
            let recipient = event.recipient.clone();
            let effect = Self::delivery_effect(Arc::clone(mailer), event);
            match by_recipient.iter_mut().find(|(r, _)| *r == recipient) {
                Some((_, queue)) => queue.push(effect),
                None => by_recipient.push((recipient, vec![effect])),
            }
        }

        by_recipient
            .into_iter()
            .map(|(_, mut queue)| {
                if queue.len() == 1 {
                    queue.remove(0)
                } else {
                    Effect::chain(queue)
                }
            })
            .collect()
    }

    /// One fire-and-forget delivery. Failures are logged and swallowed.
    fn delivery_effect(mailer: Arc<dyn Mailer>, event: NotificationEvent) -> Effect<TicketAction> {
        Effect::Future(Box::pin(async move {
            match mailer.deliver(&event).await {
                Ok(()) => {
                    tracing::debug!(kind = ?event.kind, recipient = %event.recipient, "notification delivered");
                },
                Err(error) => {
                    tracing::warn!(kind = ?event.kind, %error, "notification delivery failed");
                },
            }
            None
        }))
    }
}

impl Reducer for TicketReducer {
    type State = TicketState;
    type Action = TicketAction;
    type Environment = TicketEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let command = action.name();
        match Self::run(env, state, action) {
            Ok(result) => {
                state.last_error = None;
                state.staged.stage(&result);
                let effects = Self::delivery_effects(&env.mailer, result.notifications);
                state.ticket = Some(result.ticket);

                if effects.is_empty() {
                    smallvec![Effect::None]
                } else {
                    effects
                }
            },
            Err(error) => {
                tracing::debug!(ticket_id = %state.id, command, %error, "command rejected");
                state.last_error = Some(error);
                smallvec![Effect::None]
            },
        }
    }
}
