//! Collaborator interfaces the engine is driven through.
//!
//! The engine itself never calls these; the runtime shell loads tickets,
//! commits engine results and forwards notifications through them.
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` instead of using `async fn` so the
//! traits can be held as `Arc<dyn Trait>` and captured by effect futures.

use crate::history::HistoryEntry;
use crate::notification::{NotificationEvent, Recipient};
use crate::types::{Actor, Comment, SlaRule, Ticket, TicketCategory, TicketId, TicketPriority, UserId};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by the port traits.
pub type PortFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ============================================================================
// Repository
// ============================================================================

/// Errors raised by a [`TicketRepository`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// No ticket with this id.
    #[error("Ticket not found: {0}")]
    NotFound(TicketId),

    /// A ticket with this id already exists.
    #[error("Ticket already exists: {0}")]
    AlreadyExists(TicketId),

    /// The stored version moved since the ticket was loaded.
    #[error("Version conflict on ticket {ticket_id}: expected {expected}, found {actual}")]
    VersionConflict {
        /// Ticket that was being committed
        ticket_id: TicketId,
        /// Version the caller loaded
        expected: u64,
        /// Version currently stored
        actual: u64,
    },

    /// Backend failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Everything one engine result writes, committed as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitBatch {
    /// Next ticket snapshot
    pub ticket: Ticket,
    /// Version the snapshot was derived from
    pub expected_version: u64,
    /// Audit entries to append
    pub history: Vec<HistoryEntry>,
    /// Comment to append
    pub comment: Option<Comment>,
}

/// Durable ticket storage.
///
/// `commit` must be transactional across the ticket, its history and its
/// comment: either everything is written or nothing is.
pub trait TicketRepository: Send + Sync {
    /// Load the latest committed ticket.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown ids, `Storage` on backend failure.
    fn load(&self, id: TicketId) -> PortFuture<'_, Result<Ticket, RepositoryError>>;

    /// Store a freshly created ticket.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` when the id is taken, `Storage` on backend failure.
    fn insert(&self, ticket: Ticket) -> PortFuture<'_, Result<Ticket, RepositoryError>>;

    /// Version-checked write of an engine result. Returns the stored ticket
    /// with its bumped version.
    ///
    /// # Errors
    ///
    /// `VersionConflict` when the stored version differs from
    /// `expected_version`; nothing is written in that case.
    fn commit(&self, batch: CommitBatch) -> PortFuture<'_, Result<Ticket, RepositoryError>>;

    /// Comments on a ticket, oldest first.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown ids.
    fn comments(&self, id: TicketId) -> PortFuture<'_, Result<Vec<Comment>, RepositoryError>>;

    /// History of a ticket, oldest first.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown ids.
    fn history(&self, id: TicketId) -> PortFuture<'_, Result<Vec<HistoryEntry>, RepositoryError>>;

    /// Every stored ticket.
    ///
    /// # Errors
    ///
    /// `Storage` on backend failure.
    fn all(&self) -> PortFuture<'_, Result<Vec<Ticket>, RepositoryError>>;
}

// ============================================================================
// Mailer
// ============================================================================

/// A notification could not be delivered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Delivery to {recipient} failed: {reason}")]
pub struct DeliveryError {
    /// Intended recipient
    pub recipient: Recipient,
    /// Transport-level reason
    pub reason: String,
}

/// Notification transport.
pub trait Mailer: Send + Sync {
    /// Deliver one event.
    ///
    /// # Errors
    ///
    /// [`DeliveryError`] when the transport fails. Callers log it; it never
    /// affects committed state.
    fn deliver<'a>(&'a self, event: &'a NotificationEvent) -> PortFuture<'a, Result<(), DeliveryError>>;
}

// ============================================================================
// Identity and SLA
// ============================================================================

/// Resolves user ids to actors with capabilities.
pub trait IdentityProvider: Send + Sync {
    /// Look up an actor; `None` for unknown users.
    fn resolve<'a>(&'a self, id: &'a UserId) -> PortFuture<'a, Option<Actor>>;
}

/// Read-only source of SLA rules.
pub trait SlaProvider: Send + Sync {
    /// The rule that applies to a priority/category pair, if any.
    fn rule_for(&self, priority: TicketPriority, category: Option<TicketCategory>) -> PortFuture<'_, Option<SlaRule>>;

    /// Every configured rule, for bulk overdue scans.
    fn rules(&self) -> PortFuture<'_, Vec<SlaRule>>;
}
