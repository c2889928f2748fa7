//! Audit history: one immutable entry per effective field change.

use crate::transition::{FieldDiff, TicketProperty};
use crate::types::{Actor, TicketId, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// An immutable audit record.
///
/// Only [`record`] builds these; fields are read-only from outside the crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    ticket_id: TicketId,
    property: TicketProperty,
    old_value: String,
    new_value: String,
    changed_at: DateTime<Utc>,
    changed_by_id: UserId,
}

impl HistoryEntry {
    /// Owning ticket.
    #[must_use]
    pub const fn ticket_id(&self) -> TicketId {
        self.ticket_id
    }

    /// Property that changed.
    #[must_use]
    pub const fn property(&self) -> TicketProperty {
        self.property
    }

    /// Display value before the change.
    #[must_use]
    pub fn old_value(&self) -> &str {
        &self.old_value
    }

    /// Display value after the change.
    #[must_use]
    pub fn new_value(&self) -> &str {
        &self.new_value
    }

    /// When the change was committed.
    #[must_use]
    pub const fn changed_at(&self) -> DateTime<Utc> {
        self.changed_at
    }

    /// Who made the change.
    #[must_use]
    pub const fn changed_by_id(&self) -> &UserId {
        &self.changed_by_id
    }
}

/// The entries produced by one engine operation, in diff order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryLog(Vec<HistoryEntry>);

impl HistoryLog {
    /// Entries the actor may see: all of them for support/admin, none otherwise.
    #[must_use]
    pub fn visible_to(&self, actor: &Actor) -> &[HistoryEntry] {
        if actor.is_staff() { &self.0 } else { &[] }
    }

    /// All entries, unfiltered.
    #[must_use]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.0
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no entry was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append another log, keeping order.
    pub fn extend(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Take the entries out.
    #[must_use]
    pub fn into_entries(self) -> Vec<HistoryEntry> {
        self.0
    }
}

impl IntoIterator for HistoryLog {
    type Item = HistoryEntry;
    type IntoIter = std::vec::IntoIter<HistoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Staff-only filter over a stored history slice.
#[must_use]
pub fn visible_history<'a>(entries: &'a [HistoryEntry], actor: &Actor) -> &'a [HistoryEntry] {
    if actor.is_staff() { entries } else { &[] }
}

/// Turn diffs into history entries, all stamped with the same `now`.
#[must_use]
pub fn record(ticket_id: TicketId, diffs: &[FieldDiff], actor_id: &UserId, now: DateTime<Utc>) -> HistoryLog {
    HistoryLog(
        diffs
            .iter()
            .map(|diff| HistoryEntry {
                ticket_id,
                property: diff.property,
                old_value: diff.old_value.clone(),
                new_value: diff.new_value.clone(),
                changed_at: now,
                changed_by_id: actor_id.clone(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diffs() -> Vec<FieldDiff> {
        vec![
            FieldDiff {
                property: TicketProperty::AssignedTo,
                old_value: "Unassigned".into(),
                new_value: "carol".into(),
                auto_transition: false,
            },
            FieldDiff {
                property: TicketProperty::Status,
                old_value: "New".into(),
                new_value: "Assigned".into(),
                auto_transition: true,
            },
        ]
    }

    #[test]
    fn one_entry_per_diff_with_shared_timestamp() {
        let now = helpdesk_testing::t0();
        let id = TicketId::new();
        let log = record(id, &diffs(), &UserId::new("bob"), now);

        assert_eq!(log.len(), 2);
        assert!(log.entries().iter().all(|e| e.changed_at() == now && e.ticket_id() == id));
        assert_eq!(log.entries()[0].property(), TicketProperty::AssignedTo);
        assert_eq!(log.entries()[1].old_value(), "New");
        assert_eq!(log.entries()[1].new_value(), "Assigned");
        assert_eq!(log.entries()[1].changed_by_id().as_str(), "bob");
    }

    #[test]
    fn history_is_staff_only() {
        let log = record(TicketId::new(), &diffs(), &UserId::new("bob"), helpdesk_testing::t0());

        assert_eq!(log.visible_to(&Actor::support("bob")).len(), 2);
        assert_eq!(log.visible_to(&Actor::admin("root")).len(), 2);
        assert!(log.visible_to(&Actor::requester("alice")).is_empty());
        assert!(visible_history(log.entries(), &Actor::requester("alice")).is_empty());
    }
}
