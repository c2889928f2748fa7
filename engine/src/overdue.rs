//! Overdue scanner: read-only deadline classification.

use crate::config::UnscheduledPolicy;
use crate::types::{SlaRule, Ticket, TicketCategory, TicketPriority};
use chrono::{DateTime, Duration, Utc};
use std::cmp::Reverse;

/// Pick the SLA rule for a priority/category pair.
///
/// A rule for the priority and exact category wins over a priority-only
/// rule, which wins over the default rule.
#[must_use]
pub fn matching_rule(
    priority: TicketPriority,
    category: Option<TicketCategory>,
    rules: &[SlaRule],
) -> Option<&SlaRule> {
    let by_priority = || rules.iter().filter(move |rule| rule.priority == priority);

    category
        .and_then(|category| by_priority().find(|rule| rule.category == Some(category)))
        .or_else(|| by_priority().find(|rule| rule.category.is_none()))
        .or_else(|| rules.iter().find(|rule| rule.is_default))
}

/// Classifies tickets against their effective deadline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverdueScanner {
    rules: Vec<SlaRule>,
    unscheduled: UnscheduledPolicy,
}

impl OverdueScanner {
    /// Scanner over a fixed set of SLA rules.
    #[must_use]
    pub const fn new(rules: Vec<SlaRule>, unscheduled: UnscheduledPolicy) -> Self {
        Self { rules, unscheduled }
    }

    /// The configured rules.
    #[must_use]
    pub fn rules(&self) -> &[SlaRule] {
        &self.rules
    }

    /// Minutes allowed for resolution, or `None` when the ticket has no
    /// deadline at all.
    #[must_use]
    pub fn effective_minutes(&self, ticket: &Ticket) -> Option<u32> {
        ticket
            .estimated_resolution_minutes
            .or_else(|| {
                matching_rule(ticket.priority, Some(ticket.category), &self.rules)
                    .map(|rule| rule.resolution_time_minutes)
            })
            .or(match self.unscheduled {
                UnscheduledPolicy::Never => None,
                UnscheduledPolicy::Immediately => Some(0),
            })
    }

    /// `created_at + effective minutes`.
    #[must_use]
    pub fn effective_deadline(&self, ticket: &Ticket) -> Option<DateTime<Utc>> {
        self.effective_minutes(ticket)
            .map(|minutes| ticket.created_at + Duration::minutes(i64::from(minutes)))
    }

    /// Open and past its deadline.
    #[must_use]
    pub fn is_overdue(&self, ticket: &Ticket, now: DateTime<Utc>) -> bool {
        if ticket.status.is_resolved() {
            return false;
        }
        self.effective_deadline(ticket).is_some_and(|deadline| now > deadline)
    }

    /// Overdue subset, highest priority first, then oldest first.
    #[must_use]
    pub fn overdue_tickets<'a>(&self, tickets: &'a [Ticket], now: DateTime<Utc>) -> Vec<&'a Ticket> {
        let mut overdue: Vec<&Ticket> = tickets.iter().filter(|t| self.is_overdue(t, now)).collect();
        overdue.sort_by_key(|t| (Reverse(t.priority), t.created_at));
        overdue
    }
}

/// [`OverdueScanner::is_overdue`] with the default unscheduled policy.
#[must_use]
pub fn is_overdue(ticket: &Ticket, rules: &[SlaRule], now: DateTime<Utc>) -> bool {
    OverdueScanner::new(rules.to_vec(), UnscheduledPolicy::default()).is_overdue(ticket, now)
}

/// [`OverdueScanner::overdue_tickets`] with the default unscheduled policy.
#[must_use]
pub fn overdue_tickets<'a>(tickets: &'a [Ticket], rules: &[SlaRule], now: DateTime<Utc>) -> Vec<&'a Ticket> {
    OverdueScanner::new(rules.to_vec(), UnscheduledPolicy::default()).overdue_tickets(tickets, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TicketId, TicketStatus, UserId};
    use helpdesk_testing::t0;

    fn ticket(priority: TicketPriority, category: TicketCategory) -> Ticket {
        Ticket {
            id: TicketId::new(),
            title: "Mailbox full".to_string(),
            description: "Cannot receive mail".to_string(),
            status: TicketStatus::InProgress,
            priority,
            category,
            created_at: t0(),
            last_updated_at: None,
            resolved_at: None,
            estimated_resolution_minutes: None,
            actual_resolution_minutes: None,
            requester_id: UserId::new("alice"),
            assigned_to_id: None,
            version: 0,
        }
    }

    fn rule(priority: TicketPriority, category: Option<TicketCategory>, minutes: u32, is_default: bool) -> SlaRule {
        SlaRule {
            priority,
            category,
            response_time_minutes: minutes / 4,
            resolution_time_minutes: minutes,
            is_default,
        }
    }

    fn rules() -> Vec<SlaRule> {
        vec![
            rule(TicketPriority::High, None, 240, false),
            rule(TicketPriority::High, Some(TicketCategory::Email), 120, false),
            rule(TicketPriority::Low, None, 2880, true),
        ]
    }

    #[test]
    fn category_specific_rule_wins() {
        let rules = rules();
        let minutes = |priority, category| matching_rule(priority, category, &rules).map(|r| r.resolution_time_minutes);

        assert_eq!(minutes(TicketPriority::High, Some(TicketCategory::Email)), Some(120));
        assert_eq!(minutes(TicketPriority::High, Some(TicketCategory::Network)), Some(240));
        assert_eq!(minutes(TicketPriority::High, None), Some(240));
        assert_eq!(minutes(TicketPriority::Medium, Some(TicketCategory::Email)), Some(2880));
    }

    #[test]
    fn estimate_overrides_sla() {
        let mut t = ticket(TicketPriority::High, TicketCategory::Email);
        t.estimated_resolution_minutes = Some(60);

        assert!(!is_overdue(&t, &rules(), t0() + Duration::minutes(60)));
        assert!(is_overdue(&t, &rules(), t0() + Duration::minutes(61)));
    }

    #[test]
    fn resolved_and_closed_are_never_overdue() {
        let mut t = ticket(TicketPriority::High, TicketCategory::Email);
        t.status = TicketStatus::Resolved;
        assert!(!is_overdue(&t, &rules(), t0() + Duration::days(30)));
        t.status = TicketStatus::Closed;
        assert!(!is_overdue(&t, &rules(), t0() + Duration::days(30)));
    }

    #[test]
    fn unscheduled_policy_decides_missing_deadline() {
        let t = ticket(TicketPriority::Critical, TicketCategory::Other);
        let later = t0() + Duration::seconds(1);

        assert!(!OverdueScanner::new(Vec::new(), UnscheduledPolicy::Never).is_overdue(&t, later));
        assert!(OverdueScanner::new(Vec::new(), UnscheduledPolicy::Immediately).is_overdue(&t, later));
        assert!(!OverdueScanner::new(Vec::new(), UnscheduledPolicy::Immediately).is_overdue(&t, t0()));
    }

    #[test]
    fn overdue_listing_orders_by_priority_then_age() {
        let mut low = ticket(TicketPriority::Low, TicketCategory::Other);
        low.estimated_resolution_minutes = Some(1);
        let mut high_new = ticket(TicketPriority::High, TicketCategory::Other);
        high_new.created_at = t0() + Duration::minutes(5);
        let high_old = ticket(TicketPriority::High, TicketCategory::Other);

        let tickets = vec![low.clone(), high_new.clone(), high_old.clone()];
        let overdue = overdue_tickets(&tickets, &rules(), t0() + Duration::days(3));

        let ids: Vec<_> = overdue.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![high_old.id, high_new.id, low.id]);
    }
}
