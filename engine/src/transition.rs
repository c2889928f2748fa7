//! Transition evaluator: the ticket state machine.
//!
//! [`evaluate`] compares a proposed [`ChangeSet`] with the current ticket,
//! field by field, and produces the next ticket snapshot together with one
//! [`FieldDiff`] per value that actually changed. Each field is compared with
//! the persisted value; only the assignment cascade (rule 4) and the
//! support-comment auto-transition (rule 7) look at the status already
//! updated earlier in the same pass.

use crate::config::InvalidEnumPolicy;
use crate::error::EngineError;
use crate::types::{Actor, Ticket, TicketPriority, TicketStatus, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest title the engine accepts.
pub const MAX_TITLE_LEN: usize = 100;

/// A comment that accompanies a change-set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentDraft {
    /// Comment body
    pub content: String,
    /// Requested visibility; downgraded for non-staff authors
    pub is_internal: bool,
}

/// Proposed field values for one update request.
///
/// `None` leaves a field alone. Priority and status arrive as raw strings
/// and are parsed here so malformed input surfaces as `InvalidEnumValue`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// New title
    pub title: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New priority name
    pub priority: Option<String>,
    /// New status name
    pub status: Option<String>,
    /// New assignee; blank ids are ignored
    pub assigned_to_id: Option<UserId>,
    /// New estimate in minutes
    pub estimated_resolution_minutes: Option<u32>,
    /// Comment appended as part of the same request
    pub comment: Option<CommentDraft>,
}

impl ChangeSet {
    /// An empty change-set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Propose a title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Propose a description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Propose a priority by name.
    #[must_use]
    pub fn priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    /// Propose a status by name.
    #[must_use]
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Propose an assignee.
    #[must_use]
    pub fn assign_to(mut self, assignee: impl Into<String>) -> Self {
        self.assigned_to_id = Some(UserId::new(assignee));
        self
    }

    /// Propose an estimate.
    #[must_use]
    pub const fn estimate_minutes(mut self, minutes: u32) -> Self {
        self.estimated_resolution_minutes = Some(minutes);
        self
    }

    /// Attach a comment.
    #[must_use]
    pub fn comment(mut self, content: impl Into<String>, is_internal: bool) -> Self {
        self.comment = Some(CommentDraft {
            content: content.into(),
            is_internal,
        });
        self
    }
}

/// The ticket property a diff refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketProperty {
    /// `title`
    Title,
    /// `description`
    Description,
    /// `priority`
    Priority,
    /// `status`
    Status,
    /// `assignedToId`
    AssignedTo,
    /// `estimatedResolutionMinutes`
    EstimatedResolutionTime,
}

impl TicketProperty {
    /// Property name as recorded in history.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Description => "Description",
            Self::Priority => "Priority",
            Self::Status => "Status",
            Self::AssignedTo => "AssignedTo",
            Self::EstimatedResolutionTime => "EstimatedResolutionTime",
        }
    }
}

impl fmt::Display for TicketProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One property-level change, values rendered for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiff {
    /// What changed
    pub property: TicketProperty,
    /// Display value before the change
    pub old_value: String,
    /// Display value after the change
    pub new_value: String,
    /// True for status changes the engine made on its own
    pub auto_transition: bool,
}

impl FieldDiff {
    fn requested(property: TicketProperty, old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            property,
            old_value: old.into(),
            new_value: new.into(),
            auto_transition: false,
        }
    }

    fn automatic(from: TicketStatus, to: TicketStatus) -> Self {
        Self {
            property: TicketProperty::Status,
            old_value: from.to_string(),
            new_value: to.to_string(),
            auto_transition: true,
        }
    }

    /// Whether this diff moves the ticket into `status`.
    #[must_use]
    pub fn is_status_change_to(&self, status: TicketStatus) -> bool {
        self.property == TicketProperty::Status && self.new_value == status.as_str()
    }
}

/// Result of a successful evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// The ticket after every rule ran
    pub ticket: Ticket,
    /// Effective changes, in rule order
    pub diffs: Vec<FieldDiff>,
}

impl Evaluation {
    /// True when nothing changed and no comment was attached.
    #[must_use]
    pub fn is_noop(&self, current: &Ticket) -> bool {
        self.diffs.is_empty() && self.ticket == *current
    }
}

/// Display value of an optional assignee.
#[must_use]
pub fn render_assignee(assignee: Option<&UserId>) -> String {
    assignee.map_or_else(|| "Unassigned".to_string(), ToString::to_string)
}

/// Display value of an optional estimate.
#[must_use]
pub fn render_estimate(minutes: Option<u32>) -> String {
    minutes.map_or_else(|| "Unestimated".to_string(), |m| m.to_string())
}

/// Whole minutes between two instants, rounded to the nearest minute and
/// never negative.
#[must_use]
pub fn elapsed_minutes(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    let seconds = (to - from).num_seconds().max(0);
    (seconds + 30) / 60
}

/// Evaluate a change-set against the current ticket.
///
/// `now` is sampled once by the caller and used for every derived timestamp.
///
/// # Errors
///
/// - [`EngineError::InvalidEnumValue`] for unknown priority/status names
///   under [`InvalidEnumPolicy::Reject`]
/// - [`EngineError::InvalidField`] for a blank or over-long title, or a
///   blank description
/// - [`EngineError::Conflict`] for an explicit status change the state
///   machine forbids, or any field change on a closed ticket
pub fn evaluate(
    current: &Ticket,
    actor: &Actor,
    proposed: &ChangeSet,
    now: DateTime<Utc>,
    policy: InvalidEnumPolicy,
) -> Result<Evaluation, EngineError> {
    let priority = parse_enum::<TicketPriority>(proposed.priority.as_deref(), policy)?;
    let status = parse_enum::<TicketStatus>(proposed.status.as_deref(), policy)?;

    let mut next = current.clone();
    let mut diffs = Vec::new();

    // Rule 1: free text
    if let Some(title) = &proposed.title {
        if *title != current.title {
            validate_title(title)?;
            diffs.push(FieldDiff::requested(TicketProperty::Title, &current.title, title));
            next.title.clone_from(title);
        }
    }

    if let Some(description) = &proposed.description {
        if *description != current.description {
            validate_description(description)?;
            diffs.push(FieldDiff::requested(
                TicketProperty::Description,
                &current.description,
                description,
            ));
            next.description.clone_from(description);
        }
    }

    // Rule 2: priority
    if let Some(priority) = priority {
        if priority != current.priority {
            diffs.push(FieldDiff::requested(
                TicketProperty::Priority,
                current.priority.as_str(),
                priority.as_str(),
            ));
            next.priority = priority;
        }
    }

    // Rule 3: status, with derived resolution fields
    if let Some(status) = status {
        if status != current.status {
            if !current.status.can_transition_to(status) {
                return Err(EngineError::Conflict(format!(
                    "cannot move ticket from {} to {status}",
                    current.status
                )));
            }
            diffs.push(FieldDiff::requested(
                TicketProperty::Status,
                current.status.as_str(),
                status.as_str(),
            ));
            apply_status(&mut next, status, now);
        }
    }

    // Rule 4: assignment, cascading New -> Assigned
    if let Some(assignee) = &proposed.assigned_to_id {
        if !assignee.is_blank() && current.assigned_to_id.as_ref() != Some(assignee) {
            diffs.push(FieldDiff::requested(
                TicketProperty::AssignedTo,
                render_assignee(current.assigned_to_id.as_ref()),
                assignee.as_str(),
            ));
            next.assigned_to_id = Some(assignee.clone());

            if next.status == TicketStatus::New {
                diffs.push(FieldDiff::automatic(TicketStatus::New, TicketStatus::Assigned));
                apply_status(&mut next, TicketStatus::Assigned, now);
            }
        }
    }

    // Rule 5: estimate
    if let Some(estimate) = proposed.estimated_resolution_minutes {
        if current.estimated_resolution_minutes != Some(estimate) {
            diffs.push(FieldDiff::requested(
                TicketProperty::EstimatedResolutionTime,
                render_estimate(current.estimated_resolution_minutes),
                estimate.to_string(),
            ));
            next.estimated_resolution_minutes = Some(estimate);
        }
    }

    // Rule 7: a staff comment picks up untouched work
    if proposed.comment.is_some()
        && actor.is_staff()
        && matches!(next.status, TicketStatus::New | TicketStatus::Assigned)
    {
        diffs.push(FieldDiff::automatic(next.status, TicketStatus::InProgress));
        apply_status(&mut next, TicketStatus::InProgress, now);
    }

    if current.status.is_terminal() && !diffs.is_empty() {
        return Err(EngineError::Conflict(format!(
            "ticket {} is closed",
            current.id
        )));
    }

    if !diffs.is_empty() || proposed.comment.is_some() {
        next.last_updated_at = Some(now);
    }

    Ok(Evaluation { ticket: next, diffs })
}

/// Move `ticket` into `status`, maintaining the resolution fields.
fn apply_status(ticket: &mut Ticket, status: TicketStatus, now: DateTime<Utc>) {
    ticket.status = status;
    match status {
        TicketStatus::Resolved => {
            if ticket.resolved_at.is_none() {
                ticket.resolved_at = Some(now);
                ticket.actual_resolution_minutes = Some(elapsed_minutes(ticket.created_at, now));
            }
        },
        TicketStatus::Reopened => {
            ticket.resolved_at = None;
            ticket.actual_resolution_minutes = None;
        },
        _ => {},
    }
}

fn parse_enum<T>(input: Option<&str>, policy: InvalidEnumPolicy) -> Result<Option<T>, EngineError>
where
    T: FromStr<Err = EngineError>,
{
    match input.map(str::parse::<T>) {
        None => Ok(None),
        Some(Ok(value)) => Ok(Some(value)),
        Some(Err(error)) => match policy {
            InvalidEnumPolicy::Reject => Err(error),
            InvalidEnumPolicy::Skip => {
                tracing::debug!(%error, "skipping malformed enum field");
                Ok(None)
            },
        },
    }
}

/// Check the title shape rules.
///
/// # Errors
///
/// [`EngineError::InvalidField`] when blank or longer than [`MAX_TITLE_LEN`].
pub fn validate_title(title: &str) -> Result<(), EngineError> {
    if title.trim().is_empty() {
        return Err(EngineError::invalid_field("title", "must not be blank"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(EngineError::invalid_field(
            "title",
            format!("must be at most {MAX_TITLE_LEN} characters"),
        ));
    }
    Ok(())
}

/// Check the description shape rules.
///
/// # Errors
///
/// [`EngineError::InvalidField`] when blank.
pub fn validate_description(description: &str) -> Result<(), EngineError> {
    if description.trim().is_empty() {
        return Err(EngineError::invalid_field("description", "must not be blank"));
    }
    Ok(())
}
