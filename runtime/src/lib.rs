//! # Helpdesk Runtime
//!
//! The imperative shell around `helpdesk-engine`.
//!
//! The engine decides what a command means; this crate loads tickets,
//! reduces commands against them, commits the result and runs the delivery
//! effects the reducer emitted.
//!
//! ## Core Components
//!
//! - [`service::TicketService`]: per-ticket locking, version-checked commits,
//!   conflict re-evaluation and effect execution
//! - [`repository::InMemoryTicketRepository`]: transactional in-memory storage
//! - [`mailer`]: tracing and metered mail transports
//! - [`directory`]: static identity and SLA providers
//! - [`config`] and [`telemetry`]: environment configuration, tracing, metrics
//!
//! ## Example
//!
//! ```
//! use helpdesk_core::environment::SystemClock;
//! use helpdesk_engine::{Actor, ChangeSet, EngineConfig, NewTicket, TicketEngine, TicketStatus};
//! use helpdesk_runtime::{InMemoryTicketRepository, TicketService, TracingMailer};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), helpdesk_runtime::ServiceError> {
//! let service = TicketService::new(
//!     TicketEngine::new(Arc::new(SystemClock), EngineConfig::default()),
//!     Arc::new(InMemoryTicketRepository::new()),
//!     Arc::new(TracingMailer),
//! );
//!
//! let created = service
//!     .create(&Actor::requester("alice"), NewTicket::new("Printer jam", "Tray 2", "Low", "Hardware"))
//!     .await?;
//! let id = created.result.ticket.id;
//!
//! let assigned = service
//!     .apply_update(id, &Actor::support("bob"), ChangeSet::new().assign_to("bob"))
//!     .await?;
//! assigned.deliveries.wait().await;
//! assert_eq!(assigned.result.ticket.status, TicketStatus::Assigned);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod directory;
pub mod locks;
pub mod mailer;
pub mod repository;
pub mod retry;
pub mod service;
pub mod telemetry;

pub use config::{Config, StoreConfig};
pub use directory::{StaticDirectory, StaticSlaTable};
pub use locks::TicketLocks;
pub use mailer::{MeteredMailer, TracingMailer};
pub use repository::InMemoryTicketRepository;
pub use retry::RetryPolicy;
pub use service::{DeliveryHandle, ServiceError, ServiceOutcome, TicketService};
