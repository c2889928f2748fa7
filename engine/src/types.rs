//! Domain types for the ticket lifecycle engine.
//!
//! Tickets, comments and history entries are plain owned snapshots. The
//! engine never mutates them behind the caller's back: every operation takes
//! the current snapshot by reference and returns a new one.

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketId(Uuid);

impl TicketId {
    /// Generate a new random ticket ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a user as issued by the identity provider.
///
/// Identity ids are opaque strings; the engine only compares them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Wrap an identity-provider id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the id carries no characters (after trimming).
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ============================================================================
// Enumerations
// ============================================================================

/// Lowercases and drops separators so `in_progress`, `In Progress` and
/// `InProgress` all parse to the same variant.
pub(crate) fn normalize(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Lifecycle status of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    /// Just created, nobody assigned yet (initial state)
    New,
    /// Assigned to a support agent
    Assigned,
    /// Being worked on
    InProgress,
    /// Waiting on something outside the helpdesk
    OnHold,
    /// Resolved, awaiting confirmation
    Resolved,
    /// Confirmed resolved (terminal)
    Closed,
    /// Resolution was rejected; work resumes
    Reopened,
}

impl TicketStatus {
    /// Every status, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::New,
        Self::Assigned,
        Self::InProgress,
        Self::OnHold,
        Self::Resolved,
        Self::Closed,
        Self::Reopened,
    ];

    /// Variant name used in history entries and notifications.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Assigned => "Assigned",
            Self::InProgress => "InProgress",
            Self::OnHold => "OnHold",
            Self::Resolved => "Resolved",
            Self::Closed => "Closed",
            Self::Reopened => "Reopened",
        }
    }

    /// Resolved and Closed tickets carry a resolution timestamp.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }

    /// Closed is the only terminal status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Whether an explicit status change from `self` to `target` is legal.
    ///
    /// Nothing re-enters `New`, `Closed` leads nowhere, a resolved ticket is
    /// either confirmed or reopened, and `Reopened` is only reachable from
    /// `Resolved`.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        match (self, target) {
            (Self::Closed, _) | (_, Self::New) => false,
            (Self::Resolved, Self::Closed | Self::Reopened) => true,
            (Self::Resolved, _) | (_, Self::Closed | Self::Reopened) => false,
            (
                Self::New | Self::Assigned | Self::InProgress | Self::OnHold | Self::Reopened,
                Self::Assigned | Self::InProgress | Self::OnHold | Self::Resolved,
            ) => !matches!(
                (self, target),
                (Self::Assigned, Self::Assigned)
                    | (Self::InProgress, Self::InProgress)
                    | (Self::OnHold, Self::OnHold)
            ),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|status| normalize(status.as_str()) == wanted)
            .ok_or_else(|| EngineError::invalid_enum("status", s))
    }
}

/// Ticket priority, ordered from least to most urgent.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TicketPriority {
    /// Can wait
    Low,
    /// Default priority
    #[default]
    Medium,
    /// Needs attention soon
    High,
    /// Business-stopping
    Critical,
}

impl TicketPriority {
    /// Every priority, least urgent first.
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    /// Variant name used in history entries and notifications.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketPriority {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|priority| normalize(priority.as_str()) == wanted)
            .ok_or_else(|| EngineError::invalid_enum("priority", s))
    }
}

/// What area a ticket concerns; used for SLA matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TicketCategory {
    /// Physical equipment
    Hardware,
    /// Installed applications
    Software,
    /// Connectivity
    Network,
    /// Logins, permissions
    Account,
    /// Mailboxes and delivery
    Email,
    /// Anything else
    Other,
}

impl TicketCategory {
    /// Every category, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Hardware,
        Self::Software,
        Self::Network,
        Self::Account,
        Self::Email,
        Self::Other,
    ];

    /// Variant name used in listings and notifications.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hardware => "Hardware",
            Self::Software => "Software",
            Self::Network => "Network",
            Self::Account => "Account",
            Self::Email => "Email",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for TicketCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketCategory {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|category| normalize(category.as_str()) == wanted)
            .ok_or_else(|| EngineError::invalid_enum("category", s))
    }
}

// ============================================================================
// Ticket
// ============================================================================

/// A support ticket snapshot.
///
/// Invariants maintained by the engine:
/// - `actual_resolution_minutes.is_some() == resolved_at.is_some()`
/// - both are set exactly when `status` is `Resolved` or `Closed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket identity
    pub id: TicketId,
    /// Short summary (at most 100 characters)
    pub title: String,
    /// Full problem description
    pub description: String,
    /// Lifecycle status
    pub status: TicketStatus,
    /// Urgency
    pub priority: TicketPriority,
    /// Area of concern
    pub category: TicketCategory,
    /// Set once at creation
    pub created_at: DateTime<Utc>,
    /// Set on every committed change
    pub last_updated_at: Option<DateTime<Utc>>,
    /// Set while Resolved/Closed
    pub resolved_at: Option<DateTime<Utc>>,
    /// Support's estimate of the time to resolve
    pub estimated_resolution_minutes: Option<u32>,
    /// Minutes from creation to resolution, derived on resolve
    pub actual_resolution_minutes: Option<i64>,
    /// The user who opened the ticket
    pub requester_id: UserId,
    /// The support agent working the ticket
    pub assigned_to_id: Option<UserId>,
    /// Row version used for optimistic concurrency; bumped by the repository
    pub version: u64,
}

impl Ticket {
    /// Whether the resolution fields agree with the status.
    #[must_use]
    pub fn resolution_fields_consistent(&self) -> bool {
        let resolved = self.status.is_resolved();
        self.resolved_at.is_some() == resolved && self.actual_resolution_minutes.is_some() == resolved
    }
}

/// A comment on a ticket. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Owning ticket
    pub ticket_id: TicketId,
    /// Comment body
    pub content: String,
    /// When the comment was written
    pub created_at: DateTime<Utc>,
    /// Internal comments are only shown to support staff
    pub is_internal: bool,
    /// Who wrote it
    pub author_id: UserId,
}

// ============================================================================
// Actors
// ============================================================================

/// A capability an actor may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Support agent
    Support,
    /// Administrator
    Admin,
}

/// The set of capabilities an actor holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    /// No capabilities (a plain requester).
    #[must_use]
    pub const fn none() -> Self {
        Self(BTreeSet::new())
    }

    /// Add a capability.
    #[must_use]
    pub fn with(mut self, capability: Capability) -> Self {
        self.0.insert(capability);
        self
    }

    /// Whether the set contains `capability`.
    #[must_use]
    pub fn has(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    /// Support or admin: allowed to work tickets and see internal data.
    #[must_use]
    pub fn is_staff(&self) -> bool {
        self.has(Capability::Support) || self.has(Capability::Admin)
    }

    /// Iterate over the held capabilities.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The user issuing a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Identity of the user
    pub id: UserId,
    /// What the user may do
    pub capabilities: CapabilitySet,
}

impl Actor {
    /// An actor with no staff capabilities.
    #[must_use]
    pub fn requester(id: impl Into<String>) -> Self {
        Self {
            id: UserId::new(id),
            capabilities: CapabilitySet::none(),
        }
    }

    /// A support agent.
    #[must_use]
    pub fn support(id: impl Into<String>) -> Self {
        Self {
            id: UserId::new(id),
            capabilities: CapabilitySet::none().with(Capability::Support),
        }
    }

    /// An administrator.
    #[must_use]
    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: UserId::new(id),
            capabilities: CapabilitySet::none().with(Capability::Admin),
        }
    }

    /// Support or admin capability.
    #[must_use]
    pub fn is_staff(&self) -> bool {
        self.capabilities.is_staff()
    }

    /// Whether this actor opened `ticket`.
    #[must_use]
    pub fn is_requester_of(&self, ticket: &Ticket) -> bool {
        self.id == ticket.requester_id
    }

    /// Requester of the ticket, or staff.
    #[must_use]
    pub fn can_view(&self, ticket: &Ticket) -> bool {
        self.is_staff() || self.is_requester_of(ticket)
    }
}

// ============================================================================
// SLA
// ============================================================================

/// Service-level rule consumed by the overdue scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaRule {
    /// Priority the rule applies to
    pub priority: TicketPriority,
    /// Optional category restriction
    pub category: Option<TicketCategory>,
    /// Minutes until a first response is due
    pub response_time_minutes: u32,
    /// Minutes until resolution is due
    pub resolution_time_minutes: u32,
    /// Fallback rule when nothing else matches
    pub is_default: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_parse_case_and_separator_insensitively() {
        assert_eq!("in_progress".parse::<TicketStatus>().ok(), Some(TicketStatus::InProgress));
        assert_eq!("On Hold".parse::<TicketStatus>().ok(), Some(TicketStatus::OnHold));
        assert_eq!("CRITICAL".parse::<TicketPriority>().ok(), Some(TicketPriority::Critical));
        assert_eq!("email".parse::<TicketCategory>().ok(), Some(TicketCategory::Email));
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        let error = "Urgent".parse::<TicketPriority>().err();
        assert!(matches!(
            error,
            Some(EngineError::InvalidEnumValue { field: "priority", ref value }) if value == "Urgent"
        ));
    }

    #[test]
    fn transition_table() {
        use TicketStatus::*;
        assert!(New.can_transition_to(Assigned));
        assert!(New.can_transition_to(Resolved));
        assert!(OnHold.can_transition_to(InProgress));
        assert!(Resolved.can_transition_to(Reopened));
        assert!(Resolved.can_transition_to(Closed));
        assert!(Reopened.can_transition_to(InProgress));

        assert!(!Closed.can_transition_to(Reopened));
        assert!(!InProgress.can_transition_to(Reopened));
        assert!(!InProgress.can_transition_to(Closed));
        assert!(!Resolved.can_transition_to(InProgress));
        assert!(!Assigned.can_transition_to(New));
        assert!(!OnHold.can_transition_to(OnHold));
    }

    #[test]
    fn staff_capabilities() {
        assert!(Actor::support("s").is_staff());
        assert!(Actor::admin("a").is_staff());
        assert!(!Actor::requester("r").is_staff());
        let both: CapabilitySet = [Capability::Support, Capability::Admin].into_iter().collect();
        assert_eq!(both.iter().count(), 2);
    }
}
