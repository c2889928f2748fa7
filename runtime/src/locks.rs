//! Per-ticket mutual exclusion.
//!
//! The service holds a ticket's guard across load, reduce and commit so at
//! most one mutation per ticket id is in flight inside this process.

use helpdesk_engine::TicketId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// Held while a ticket is being mutated. Dropping it releases the ticket.
pub type TicketGuard = OwnedMutexGuard<()>;

/// Lazily created async mutex per ticket id.
#[derive(Debug, Default)]
pub struct TicketLocks {
    locks: Mutex<HashMap<TicketId, Arc<tokio::sync::Mutex<()>>>>,
}

impl TicketLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    pub async fn acquire(&self, id: TicketId) -> TicketGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop entries nobody holds or waits on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(id).or_default())
        };
        lock.lock_owned().await
    }

    /// Tickets with a holder or waiter.
    #[must_use]
    pub fn active(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }
}
