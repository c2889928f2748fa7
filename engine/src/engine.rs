//! The ticket engine: explicit lifecycle operations.
//!
//! Every operation samples the clock once, authorizes the actor, runs the
//! transition evaluator, records history and dispatches notifications. The
//! result is a single [`EngineResult`]; nothing is persisted or sent here.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::history::{self, HistoryLog};
use crate::notification::{self, NotificationEvent};
use crate::transition::{self, ChangeSet, CommentDraft};
use crate::types::{Actor, Comment, Ticket, TicketCategory, TicketId, TicketPriority, TicketStatus};
use chrono::{DateTime, Utc};
use helpdesk_core::environment::Clock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Input for [`TicketEngine::create`].
///
/// Priority and category arrive as names and are parsed strictly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicket {
    /// Short summary
    pub title: String,
    /// Problem description
    pub description: String,
    /// Priority name
    pub priority: String,
    /// Category name
    pub category: String,
}

impl NewTicket {
    /// Convenience constructor.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        priority: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            priority: priority.into(),
            category: category.into(),
        }
    }
}

/// Everything one engine operation produced.
///
/// The caller commits `ticket`, `history` and `comment` as one unit and only
/// then forwards `notifications` to the mailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineResult {
    /// The next ticket snapshot
    pub ticket: Ticket,
    /// Audit entries to append
    pub history: HistoryLog,
    /// Comment to append, if the operation wrote one
    pub comment: Option<Comment>,
    /// Events to deliver after the commit
    pub notifications: Vec<NotificationEvent>,
}

impl EngineResult {
    /// True when the operation changed nothing and wrote no comment.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.history.is_empty() && self.comment.is_none()
    }
}

/// Stateless orchestrator over the transition, history and notification
/// modules. Safe to share between threads.
#[derive(Clone)]
pub struct TicketEngine {
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl std::fmt::Debug for TicketEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TicketEngine {
    /// Create an engine with the given clock and policies.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self { clock, config }
    }

    /// The active policy configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current time according to the injected clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Open a new ticket owned by `actor`.
    ///
    /// # Errors
    ///
    /// `InvalidEnumValue` for an unknown priority or category (regardless of
    /// the configured policy), `InvalidField` for a blank or over-long title
    /// or a blank description.
    pub fn create(&self, id: TicketId, actor: &Actor, input: &NewTicket) -> Result<EngineResult, EngineError> {
        transition::validate_title(&input.title)?;
        transition::validate_description(&input.description)?;
        let priority: TicketPriority = input.priority.parse()?;
        let category: TicketCategory = input.category.parse()?;

        let ticket = Ticket {
            id,
            title: input.title.clone(),
            description: input.description.clone(),
            status: TicketStatus::New,
            priority,
            category,
            created_at: self.clock.now(),
            last_updated_at: None,
            resolved_at: None,
            estimated_resolution_minutes: None,
            actual_resolution_minutes: None,
            requester_id: actor.id.clone(),
            assigned_to_id: None,
            version: 0,
        };
        let notifications = notification::dispatch_created(&ticket, &self.config.support_distribution);

        Ok(EngineResult {
            ticket,
            history: HistoryLog::default(),
            comment: None,
            notifications,
        })
    }

    /// Apply a general change-set. Support and admin only.
    ///
    /// # Errors
    ///
    /// `Forbidden` for non-staff actors, plus anything [`transition::evaluate`]
    /// rejects, plus `InvalidField` for a blank attached comment.
    pub fn apply_update(
        &self,
        current: &Ticket,
        actor: &Actor,
        proposed: &ChangeSet,
    ) -> Result<EngineResult, EngineError> {
        if !actor.is_staff() {
            return Err(EngineError::Forbidden { action: "update tickets" });
        }
        self.run(current, actor, proposed)
    }

    /// Append a comment.
    ///
    /// Non-staff authors always produce a public comment.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the actor is the requester or staff; `InvalidField`
    /// for blank content.
    pub fn add_comment(
        &self,
        current: &Ticket,
        actor: &Actor,
        content: &str,
        is_internal: bool,
    ) -> Result<EngineResult, EngineError> {
        if !actor.can_view(current) {
            return Err(EngineError::Forbidden { action: "comment on this ticket" });
        }
        let changes = ChangeSet {
            comment: Some(CommentDraft {
                content: content.to_string(),
                is_internal: is_internal && actor.is_staff(),
            }),
            ..ChangeSet::default()
        };
        self.run(current, actor, &changes)
    }

    /// Resolve the ticket, optionally leaving a public resolution note.
    ///
    /// # Errors
    ///
    /// `Forbidden` for non-staff actors; `Conflict` when already resolved or
    /// closed.
    pub fn resolve(
        &self,
        current: &Ticket,
        actor: &Actor,
        resolution_note: Option<&str>,
    ) -> Result<EngineResult, EngineError> {
        if !actor.is_staff() {
            return Err(EngineError::Forbidden { action: "resolve tickets" });
        }
        if current.status.is_resolved() {
            return Err(EngineError::Conflict(format!(
                "ticket {} is already {}",
                current.id, current.status
            )));
        }

        let mut changes = ChangeSet::new().status(TicketStatus::Resolved.as_str());
        if let Some(note) = resolution_note.filter(|note| !note.trim().is_empty()) {
            changes = changes.comment(note, false);
        }
        self.run(current, actor, &changes)
    }

    /// Confirm a resolved ticket as closed.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the actor is the requester or staff; `Conflict`
    /// unless the ticket is resolved.
    pub fn close(&self, current: &Ticket, actor: &Actor) -> Result<EngineResult, EngineError> {
        if !actor.can_view(current) {
            return Err(EngineError::Forbidden { action: "close this ticket" });
        }
        if current.status != TicketStatus::Resolved {
            return Err(EngineError::Conflict(format!(
                "ticket {} is {}, only resolved tickets can be closed",
                current.id, current.status
            )));
        }
        self.run(current, actor, &ChangeSet::new().status(TicketStatus::Closed.as_str()))
    }

    fn run(&self, current: &Ticket, actor: &Actor, changes: &ChangeSet) -> Result<EngineResult, EngineError> {
        if let Some(draft) = &changes.comment {
            if draft.content.trim().is_empty() {
                return Err(EngineError::invalid_field("comment", "must not be blank"));
            }
        }

        let now = self.clock.now();
        let evaluation = transition::evaluate(current, actor, changes, now, self.config.invalid_enum_policy)?;

        let comment = changes.comment.as_ref().map(|draft| Comment {
            ticket_id: current.id,
            content: draft.content.clone(),
            created_at: now,
            is_internal: draft.is_internal,
            author_id: actor.id.clone(),
        });
        let history = history::record(current.id, &evaluation.diffs, &actor.id, now);
        let notifications = notification::dispatch(&evaluation.ticket, &evaluation.diffs, comment.as_ref());

        Ok(EngineResult {
            ticket: evaluation.ticket,
            history,
            comment,
            notifications,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use crate::notification::NotificationKind;
    use crate::transition::TicketProperty;
    use helpdesk_testing::{FixedClock, t0};

    fn engine() -> TicketEngine {
        TicketEngine::new(Arc::new(FixedClock::new(t0())), EngineConfig::default())
    }

    fn new_ticket() -> Ticket {
        engine()
            .create(
                TicketId::new(),
                &Actor::requester("alice"),
                &NewTicket::new("Laptop will not boot", "Black screen after logo", "High", "Hardware"),
            )
            .unwrap()
            .ticket
    }

    #[test]
    fn create_sets_initial_state() {
        let result = engine()
            .create(
                TicketId::new(),
                &Actor::requester("alice"),
                &NewTicket::new("Laptop will not boot", "Black screen", "high", "hardware"),
            )
            .unwrap();

        assert_eq!(result.ticket.status, TicketStatus::New);
        assert_eq!(result.ticket.created_at, t0());
        assert_eq!(result.ticket.requester_id.as_str(), "alice");
        assert!(result.history.is_empty());
        assert_eq!(result.notifications.len(), 2);
    }

    #[test]
    fn create_rejects_unknown_category() {
        let result = engine().create(
            TicketId::new(),
            &Actor::requester("alice"),
            &NewTicket::new("Title", "Body", "High", "Plumbing"),
        );
        assert!(matches!(result, Err(EngineError::InvalidEnumValue { field: "category", .. })));
    }

    #[test]
    fn requesters_cannot_apply_updates() {
        let ticket = new_ticket();
        let result = engine().apply_update(&ticket, &Actor::requester("alice"), &ChangeSet::new().priority("Low"));
        assert!(matches!(result, Err(EngineError::Forbidden { .. })));
    }

    #[test]
    fn assigning_new_ticket_yields_two_history_entries() {
        let ticket = new_ticket();
        let result = engine()
            .apply_update(&ticket, &Actor::support("bob"), &ChangeSet::new().assign_to("carol"))
            .unwrap();

        let properties: Vec<_> = result.history.entries().iter().map(|e| e.property()).collect();
        assert_eq!(properties, vec![TicketProperty::AssignedTo, TicketProperty::Status]);
        assert_eq!(result.ticket.status, TicketStatus::Assigned);
    }

    #[test]
    fn requester_internal_comment_is_downgraded() {
        let ticket = new_ticket();
        let result = engine()
            .add_comment(&ticket, &Actor::requester("alice"), "Still broken", true)
            .unwrap();

        let comment = result.comment.unwrap();
        assert!(!comment.is_internal);
        assert_eq!(result.ticket.status, TicketStatus::New);
    }

    #[test]
    fn strangers_cannot_comment() {
        let ticket = new_ticket();
        let result = engine().add_comment(&ticket, &Actor::requester("mallory"), "hi", false);
        assert!(matches!(result, Err(EngineError::Forbidden { .. })));
    }

    #[test]
    fn blank_comment_is_invalid() {
        let ticket = new_ticket();
        let result = engine().add_comment(&ticket, &Actor::support("bob"), "   ", false);
        assert!(matches!(result, Err(EngineError::InvalidField { field: "comment", .. })));
    }

    #[test]
    fn resolve_with_note_notifies_resolution_and_comment() {
        let ticket = new_ticket();
        let result = engine()
            .resolve(&ticket, &Actor::support("bob"), Some("Replaced the disk"))
            .unwrap();

        let kinds: Vec<_> = result.notifications.iter().map(|n| n.kind).collect();
        assert_eq!(kinds, vec![NotificationKind::Resolved, NotificationKind::CommentAdded]);
        assert!(!result.comment.unwrap().is_internal);
        assert!(result.ticket.resolution_fields_consistent());
    }

    #[test]
    fn resolve_is_staff_only_and_checked_first() {
        let mut ticket = new_ticket();
        ticket.status = TicketStatus::Closed;
        let result = engine().resolve(&ticket, &Actor::requester("alice"), None);
        assert!(matches!(result, Err(EngineError::Forbidden { .. })));
    }

    #[test]
    fn close_requires_resolved() {
        let ticket = new_ticket();
        let result = engine().close(&ticket, &Actor::requester("alice"));
        assert!(matches!(result, Err(EngineError::Conflict(_))));

        let resolved = engine().resolve(&ticket, &Actor::support("bob"), None).unwrap().ticket;
        let closed = engine().close(&resolved, &Actor::requester("alice")).unwrap();
        assert_eq!(closed.ticket.status, TicketStatus::Closed);
        assert_eq!(closed.ticket.resolved_at, resolved.resolved_at);
        assert_eq!(closed.notifications.len(), 1);
        assert_eq!(closed.notifications[0].kind, NotificationKind::Updated);
    }
}
