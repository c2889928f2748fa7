//! Read-side helpers: ticket listing and comment visibility.
//!
//! Sorting goes through a closed set of fields, each with its own
//! comparator.

use crate::error::EngineError;
use crate::types::{Actor, Comment, Ticket, TicketStatus, UserId, normalize};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// Fields a listing can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TicketSortField {
    /// Alphabetical by title
    Title,
    /// Lifecycle order of the status
    Status,
    /// Urgency
    Priority,
    /// Category name
    Category,
    /// Creation time
    #[default]
    CreatedAt,
    /// Last change; never-updated tickets sort first
    LastUpdatedAt,
}

impl TicketSortField {
    /// All sortable fields.
    pub const ALL: [Self; 6] = [
        Self::Title,
        Self::Status,
        Self::Priority,
        Self::Category,
        Self::CreatedAt,
        Self::LastUpdatedAt,
    ];

    /// Field name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Status => "Status",
            Self::Priority => "Priority",
            Self::Category => "Category",
            Self::CreatedAt => "CreatedAt",
            Self::LastUpdatedAt => "LastUpdatedAt",
        }
    }

    /// Ascending comparison of two tickets on this field.
    #[must_use]
    pub fn compare(self, a: &Ticket, b: &Ticket) -> Ordering {
        match self {
            Self::Title => a.title.cmp(&b.title),
            Self::Status => a.status.cmp(&b.status),
            Self::Priority => a.priority.cmp(&b.priority),
            Self::Category => a.category.as_str().cmp(b.category.as_str()),
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::LastUpdatedAt => a.last_updated_at.cmp(&b.last_updated_at),
        }
    }
}

impl FromStr for TicketSortField {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|field| normalize(field.as_str()) == wanted)
            .ok_or_else(|| EngineError::invalid_enum("sort", s))
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortDirection {
    /// Smallest first
    Ascending,
    /// Largest first
    #[default]
    Descending,
}

impl FromStr for SortDirection {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "asc" | "ascending" => Ok(Self::Ascending),
            "desc" | "descending" => Ok(Self::Descending),
            _ => Err(EngineError::invalid_enum("direction", s)),
        }
    }
}

/// Listing parameters. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketQuery {
    /// Only tickets in this status
    pub status: Option<TicketStatus>,
    /// Only tickets assigned to this user that are not yet closed
    pub assigned_to: Option<UserId>,
    /// Sort field
    pub sort: TicketSortField,
    /// Sort direction
    pub direction: SortDirection,
    /// Page number, starting at 1
    pub page: usize,
    /// Items per page, clamped to `1..=MAX_PAGE_SIZE`
    pub page_size: usize,
}

impl Default for TicketQuery {
    fn default() -> Self {
        Self {
            status: None,
            assigned_to: None,
            sort: TicketSortField::default(),
            direction: SortDirection::default(),
            page: 1,
            page_size: 20,
        }
    }
}

impl TicketQuery {
    /// A user's work queue: open assignments, most urgent first.
    #[must_use]
    pub fn assigned_queue(assignee: impl Into<UserId>) -> Self {
        Self {
            assigned_to: Some(assignee.into()),
            sort: TicketSortField::Priority,
            direction: SortDirection::Descending,
            ..Self::default()
        }
    }

    fn matches(&self, ticket: &Ticket) -> bool {
        self.status.is_none_or(|status| ticket.status == status)
            && self.assigned_to.as_ref().is_none_or(|assignee| {
                ticket.assigned_to_id.as_ref() == Some(assignee) && !ticket.status.is_terminal()
            })
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketPage {
    /// Tickets on this page
    pub items: Vec<Ticket>,
    /// Matching tickets across all pages
    pub total_count: usize,
    /// Number of pages
    pub total_pages: usize,
    /// The page returned
    pub page: usize,
    /// The effective page size
    pub page_size: usize,
}

/// List the tickets `actor` may see.
///
/// Staff see every ticket; everyone else only the tickets they opened. Ties
/// on the sort field fall back to creation time, then id.
#[must_use]
pub fn list_tickets(tickets: &[Ticket], actor: &Actor, query: &TicketQuery) -> TicketPage {
    let page_size = query.page_size.clamp(1, MAX_PAGE_SIZE);
    let page = query.page.max(1);

    let mut matching: Vec<&Ticket> = tickets
        .iter()
        .filter(|t| actor.can_view(t))
        .filter(|t| query.matches(t))
        .collect();

    matching.sort_by(|a, b| {
        let primary = query.sort.compare(a, b);
        let primary = match query.direction {
            SortDirection::Ascending => primary,
            SortDirection::Descending => primary.reverse(),
        };
        primary
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    let total_count = matching.len();
    let items = matching
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .cloned()
        .collect();

    TicketPage {
        items,
        total_count,
        total_pages: total_count.div_ceil(page_size),
        page,
        page_size,
    }
}

/// Comments `actor` may read: internal ones are staff-only.
#[must_use]
pub fn visible_comments<'a>(comments: &'a [Comment], actor: &Actor) -> Vec<&'a Comment> {
    comments
        .iter()
        .filter(|c| !c.is_internal || actor.is_staff())
        .collect()
}
