//! # Helpdesk Engine
//!
//! The ticket lifecycle engine: which field changes are legal, what derived
//! state they produce, which audit entries they record and which
//! notifications they fire.
//!
//! Everything in this crate is deterministic given its inputs. Time comes
//! from an injected [`helpdesk_core::environment::Clock`], storage and mail
//! are reached only through the traits in [`ports`], and authorization is a
//! capability check on the [`Actor`] passed into every operation.
//!
//! ## Modules
//!
//! - [`transition`]: the state machine, change-set in, diffs out
//! - [`history`]: diffs to immutable audit entries
//! - [`notification`]: diffs and comments to notification events
//! - [`engine`]: the explicit operations (`create`, `apply_update`, ...)
//! - [`overdue`]: deadline classification against SLA rules
//! - [`query`]: listing, sorting and visibility
//! - [`reducer`]: the engine wrapped as a [`helpdesk_core::reducer::Reducer`]
//!
//! ## Example
//!
//! ```
//! use helpdesk_core::environment::SystemClock;
//! use helpdesk_engine::{Actor, ChangeSet, EngineConfig, NewTicket, TicketEngine, TicketId, TicketStatus};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), helpdesk_engine::EngineError> {
//! let engine = TicketEngine::new(Arc::new(SystemClock), EngineConfig::default());
//! let created = engine.create(
//!     TicketId::new(),
//!     &Actor::requester("alice"),
//!     &NewTicket::new("VPN drops", "Every ten minutes", "High", "Network"),
//! )?;
//!
//! let assigned = engine.apply_update(
//!     &created.ticket,
//!     &Actor::support("bob"),
//!     &ChangeSet::new().assign_to("bob"),
//! )?;
//! assert_eq!(assigned.ticket.status, TicketStatus::Assigned);
//! assert_eq!(assigned.history.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod notification;
pub mod overdue;
pub mod ports;
pub mod query;
pub mod reducer;
pub mod transition;
pub mod types;

pub use config::{EngineConfig, InvalidEnumPolicy, UnscheduledPolicy};
pub use engine::{EngineResult, NewTicket, TicketEngine};
pub use error::EngineError;
pub use history::{HistoryEntry, HistoryLog};
pub use notification::{NotificationEvent, NotificationKind, NotificationPayload, Recipient};
pub use overdue::OverdueScanner;
pub use ports::{CommitBatch, DeliveryError, IdentityProvider, Mailer, RepositoryError, SlaProvider, TicketRepository};
pub use query::{SortDirection, TicketPage, TicketQuery, TicketSortField};
pub use reducer::{StagedChanges, TicketAction, TicketEnvironment, TicketReducer, TicketState};
pub use transition::{ChangeSet, CommentDraft, FieldDiff, TicketProperty};
pub use types::{
    Actor, Capability, CapabilitySet, Comment, SlaRule, Ticket, TicketCategory, TicketId, TicketPriority,
    TicketStatus, UserId,
};
