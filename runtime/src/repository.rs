//! In-memory ticket repository.
//!
//! Tickets, history and comments live behind a single `RwLock`, so a commit
//! is one critical section: the version check and every write happen
//! together or not at all.

use helpdesk_engine::ports::PortFuture;
use helpdesk_engine::{CommitBatch, Comment, HistoryEntry, RepositoryError, Ticket, TicketId, TicketRepository};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    tickets: HashMap<TicketId, Ticket>,
    history: HashMap<TicketId, Vec<HistoryEntry>>,
    comments: HashMap<TicketId, Vec<Comment>>,
}

/// `HashMap`-backed [`TicketRepository`] for the demo binary and tests.
///
/// # Example
///
/// ```
/// use helpdesk_runtime::repository::InMemoryTicketRepository;
/// use helpdesk_engine::TicketRepository;
///
/// # async fn example() -> Result<(), helpdesk_engine::RepositoryError> {
/// let repository = InMemoryTicketRepository::new();
/// assert!(repository.all().await?.is_empty());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryTicketRepository {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryTicketRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tickets.
    pub async fn len(&self) -> usize {
        self.tables.read().await.tickets.len()
    }

    /// True when no ticket is stored.
    pub async fn is_empty(&self) -> bool {
        self.tables.read().await.tickets.is_empty()
    }
}

impl TicketRepository for InMemoryTicketRepository {
    fn load(&self, id: TicketId) -> PortFuture<'_, Result<Ticket, RepositoryError>> {
        Box::pin(async move {
            self.tables
                .read()
                .await
                .tickets
                .get(&id)
                .cloned()
                .ok_or(RepositoryError::NotFound(id))
        })
    }

    fn insert(&self, ticket: Ticket) -> PortFuture<'_, Result<Ticket, RepositoryError>> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            if tables.tickets.contains_key(&ticket.id) {
                return Err(RepositoryError::AlreadyExists(ticket.id));
            }
            let stored = Ticket { version: 1, ..ticket };
            tables.tickets.insert(stored.id, stored.clone());
            tables.history.insert(stored.id, Vec::new());
            tables.comments.insert(stored.id, Vec::new());
            tracing::debug!(ticket_id = %stored.id, "ticket inserted");
            Ok(stored)
        })
    }

    fn commit(&self, batch: CommitBatch) -> PortFuture<'_, Result<Ticket, RepositoryError>> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let id = batch.ticket.id;
            let actual = tables
                .tickets
                .get(&id)
                .map(|stored| stored.version)
                .ok_or(RepositoryError::NotFound(id))?;

            if actual != batch.expected_version {
                return Err(RepositoryError::VersionConflict {
                    ticket_id: id,
                    expected: batch.expected_version,
                    actual,
                });
            }

            let stored = Ticket {
                version: actual + 1,
                ..batch.ticket
            };
            tables.tickets.insert(id, stored.clone());
            tables.history.entry(id).or_default().extend(batch.history);
            tables.comments.entry(id).or_default().extend(batch.comment);
            tracing::debug!(ticket_id = %id, version = stored.version, "ticket committed");
            Ok(stored)
        })
    }

    fn comments(&self, id: TicketId) -> PortFuture<'_, Result<Vec<Comment>, RepositoryError>> {
        Box::pin(async move {
            self.tables
                .read()
                .await
                .comments
                .get(&id)
                .cloned()
                .ok_or(RepositoryError::NotFound(id))
        })
    }

    fn history(&self, id: TicketId) -> PortFuture<'_, Result<Vec<HistoryEntry>, RepositoryError>> {
        Box::pin(async move {
            self.tables
                .read()
                .await
                .history
                .get(&id)
                .cloned()
                .ok_or(RepositoryError::NotFound(id))
        })
    }

    fn all(&self) -> PortFuture<'_, Result<Vec<Ticket>, RepositoryError>> {
        Box::pin(async move { Ok(self.tables.read().await.tickets.values().cloned().collect()) })
    }
}
