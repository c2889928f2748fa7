//! Notification dispatcher.
//!
//! Maps committed diffs and comments to abstract events. Nothing here sends
//! mail; events are plain data handed to a [`crate::ports::Mailer`] by the
//! shell after the commit succeeds.

use crate::transition::{FieldDiff, TicketProperty};
use crate::types::{Comment, Ticket, TicketId, TicketPriority, TicketStatus, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Template kind of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    /// A ticket was opened
    Created,
    /// The recipient was assigned the ticket
    Assigned,
    /// The requester is told who picked the ticket up
    AssignmentInfo,
    /// Some other field changed
    Updated,
    /// The ticket was resolved
    Resolved,
    /// A public comment was added
    CommentAdded,
}

/// Who a notification goes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recipient {
    /// A single user
    User(UserId),
    /// The named support distribution list
    SupportDistribution(String),
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::SupportDistribution(name) => write!(f, "list:{name}"),
        }
    }
}

/// Data a mailer needs to render a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Ticket the event is about
    pub ticket_id: TicketId,
    /// Ticket title at the time of the event
    pub title: String,
    /// Ticket status after the change
    pub status: TicketStatus,
    /// Ticket priority after the change
    pub priority: TicketPriority,
    /// Changed property, for diff-driven events
    pub property: Option<TicketProperty>,
    /// Previous display value
    pub old_value: Option<String>,
    /// New display value
    pub new_value: Option<String>,
    /// Comment body, for `CommentAdded`
    pub comment: Option<String>,
    /// Comment author, for `CommentAdded`
    pub author_id: Option<UserId>,
}

impl NotificationPayload {
    fn for_ticket(ticket: &Ticket) -> Self {
        Self {
            ticket_id: ticket.id,
            title: ticket.title.clone(),
            status: ticket.status,
            priority: ticket.priority,
            property: None,
            old_value: None,
            new_value: None,
            comment: None,
            author_id: None,
        }
    }

    fn with_diff(mut self, diff: &FieldDiff) -> Self {
        self.property = Some(diff.property);
        self.old_value = Some(diff.old_value.clone());
        self.new_value = Some(diff.new_value.clone());
        self
    }
}

/// One notification to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Template kind
    pub kind: NotificationKind,
    /// Addressee
    pub recipient: Recipient,
    /// Template data
    pub payload: NotificationPayload,
}

impl NotificationEvent {
    fn to_user(kind: NotificationKind, user: &UserId, payload: NotificationPayload) -> Self {
        Self {
            kind,
            recipient: Recipient::User(user.clone()),
            payload,
        }
    }
}

/// Events for a newly created ticket: requester plus the support list.
#[must_use]
pub fn dispatch_created(ticket: &Ticket, support_distribution: &str) -> Vec<NotificationEvent> {
    let payload = NotificationPayload::for_ticket(ticket);
    vec![
        NotificationEvent::to_user(NotificationKind::Created, &ticket.requester_id, payload.clone()),
        NotificationEvent {
            kind: NotificationKind::Created,
            recipient: Recipient::SupportDistribution(support_distribution.to_string()),
            payload,
        },
    ]
}

/// Events for a committed update.
///
/// `ticket` is the snapshot after the change; `comment` is the comment
/// stored by the same operation, if any.
#[must_use]
pub fn dispatch(ticket: &Ticket, diffs: &[FieldDiff], comment: Option<&Comment>) -> Vec<NotificationEvent> {
    let mut events = Vec::new();

    for diff in diffs {
        let payload = NotificationPayload::for_ticket(ticket).with_diff(diff);
        match diff.property {
            TicketProperty::Description => {},
            TicketProperty::AssignedTo => {
                if let Some(assignee) = ticket.assigned_to_id.as_ref() {
                    events.push(NotificationEvent::to_user(
                        NotificationKind::Assigned,
                        assignee,
                        payload.clone(),
                    ));
                    events.push(NotificationEvent::to_user(
                        NotificationKind::AssignmentInfo,
                        &ticket.requester_id,
                        payload,
                    ));
                }
            },
            TicketProperty::Status if diff.is_status_change_to(TicketStatus::Resolved) => {
                events.push(NotificationEvent::to_user(
                    NotificationKind::Resolved,
                    &ticket.requester_id,
                    payload,
                ));
            },
            _ => {
                events.push(NotificationEvent::to_user(
                    NotificationKind::Updated,
                    &ticket.requester_id,
                    payload.clone(),
                ));
                if let Some(assignee) = ticket.assigned_to_id.as_ref().filter(|a| **a != ticket.requester_id) {
                    events.push(NotificationEvent::to_user(NotificationKind::Updated, assignee, payload));
                }
            },
        }
    }

    if let Some(comment) = comment.filter(|c| !c.is_internal) {
        let recipient = if comment.author_id == ticket.requester_id {
            ticket.assigned_to_id.as_ref()
        } else {
            Some(&ticket.requester_id)
        };
        // Never echo a comment back to its author.
        if let Some(recipient) = recipient.filter(|r| **r != comment.author_id) {
            let mut payload = NotificationPayload::for_ticket(ticket);
            payload.comment = Some(comment.content.clone());
            payload.author_id = Some(comment.author_id.clone());
            events.push(NotificationEvent::to_user(NotificationKind::CommentAdded, recipient, payload));
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TicketCategory;

    fn ticket() -> Ticket {
        Ticket {
            id: TicketId::new(),
            title: "VPN drops".to_string(),
            description: "Every ten minutes".to_string(),
            status: TicketStatus::InProgress,
            priority: TicketPriority::High,
            category: TicketCategory::Network,
            created_at: helpdesk_testing::t0(),
            last_updated_at: None,
            resolved_at: None,
            estimated_resolution_minutes: None,
            actual_resolution_minutes: None,
            requester_id: UserId::new("alice"),
            assigned_to_id: Some(UserId::new("carol")),
            version: 3,
        }
    }

    fn diff(property: TicketProperty, old: &str, new: &str) -> FieldDiff {
        FieldDiff {
            property,
            old_value: old.to_string(),
            new_value: new.to_string(),
            auto_transition: false,
        }
    }

    fn comment(author: &str, is_internal: bool) -> Comment {
        Comment {
            ticket_id: TicketId::new(),
            content: "Rebooted the router".to_string(),
            created_at: helpdesk_testing::t0(),
            is_internal,
            author_id: UserId::new(author),
        }
    }

    fn user(id: &str) -> Recipient {
        Recipient::User(UserId::new(id))
    }

    #[test]
    fn resolved_suppresses_generic_update() {
        let events = dispatch(&ticket(), &[diff(TicketProperty::Status, "InProgress", "Resolved")], None);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, NotificationKind::Resolved);
        assert_eq!(events[0].recipient, user("alice"));
    }

    #[test]
    fn assignment_notifies_assignee_and_requester() {
        let events = dispatch(&ticket(), &[diff(TicketProperty::AssignedTo, "Unassigned", "carol")], None);

        let kinds: Vec<_> = events.iter().map(|e| (e.kind, e.recipient.clone())).collect();
        assert_eq!(
            kinds,
            vec![
                (NotificationKind::Assigned, user("carol")),
                (NotificationKind::AssignmentInfo, user("alice")),
            ]
        );
    }

    #[test]
    fn description_changes_are_silent() {
        let events = dispatch(&ticket(), &[diff(TicketProperty::Description, "a", "b")], None);
        assert!(events.is_empty());
    }

    #[test]
    fn generic_update_reaches_requester_and_assignee() {
        let events = dispatch(&ticket(), &[diff(TicketProperty::Priority, "High", "Critical")], None);

        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.kind == NotificationKind::Updated));
        assert_eq!(events[1].recipient, user("carol"));
        assert_eq!(events[0].payload.new_value.as_deref(), Some("Critical"));
    }

    #[test]
    fn comment_recipient_depends_on_author() {
        let from_support = dispatch(&ticket(), &[], Some(&comment("carol", false)));
        assert_eq!(from_support.len(), 1);
        assert_eq!(from_support[0].recipient, user("alice"));

        let from_requester = dispatch(&ticket(), &[], Some(&comment("alice", false)));
        assert_eq!(from_requester.len(), 1);
        assert_eq!(from_requester[0].recipient, user("carol"));

        let mut unassigned = ticket();
        unassigned.assigned_to_id = None;
        assert!(dispatch(&unassigned, &[], Some(&comment("alice", false))).is_empty());
    }

    #[test]
    fn comment_never_returns_to_its_author() {
        let mut self_assigned = ticket();
        self_assigned.requester_id = UserId::new("carol");

        assert!(dispatch(&self_assigned, &[], Some(&comment("carol", false))).is_empty());
    }

    #[test]
    fn unassignment_notifies_nobody() {
        let mut unassigned = ticket();
        unassigned.assigned_to_id = None;

        let events = dispatch(&unassigned, &[diff(TicketProperty::AssignedTo, "carol", "Unassigned")], None);
        assert!(events.is_empty());
    }

    #[test]
    fn internal_comments_never_notify() {
        assert!(dispatch(&ticket(), &[], Some(&comment("carol", true))).is_empty());
    }

    #[test]
    fn creation_notifies_requester_and_support_list() {
        let events = dispatch_created(&ticket(), "support-team");

        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.kind == NotificationKind::Created));
        assert_eq!(events[0].recipient, user("alice"));
        assert_eq!(events[1].recipient, Recipient::SupportDistribution("support-team".into()));
    }
}
