//! Static identity provider and SLA table.

use helpdesk_engine::overdue::matching_rule;
use helpdesk_engine::ports::PortFuture;
use helpdesk_engine::{
    Actor, CapabilitySet, IdentityProvider, SlaProvider, SlaRule, TicketCategory, TicketPriority, UserId,
};
use std::collections::HashMap;

/// Identity provider over a fixed user table.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    users: HashMap<UserId, CapabilitySet>,
}

impl StaticDirectory {
    /// Empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user with the given capabilities.
    #[must_use]
    pub fn with_user(mut self, id: impl Into<String>, capabilities: CapabilitySet) -> Self {
        self.users.insert(UserId::new(id), capabilities);
        self
    }
}

impl IdentityProvider for StaticDirectory {
    fn resolve<'a>(&'a self, id: &'a UserId) -> PortFuture<'a, Option<Actor>> {
        Box::pin(async move {
            self.users.get(id).map(|capabilities| Actor {
                id: id.clone(),
                capabilities: capabilities.clone(),
            })
        })
    }
}

/// SLA provider over a fixed rule list.
#[derive(Debug, Clone, Default)]
pub struct StaticSlaTable {
    rules: Vec<SlaRule>,
}

impl StaticSlaTable {
    /// Table over `rules`.
    #[must_use]
    pub const fn new(rules: Vec<SlaRule>) -> Self {
        Self { rules }
    }
}

impl SlaProvider for StaticSlaTable {
    fn rule_for(&self, priority: TicketPriority, category: Option<TicketCategory>) -> PortFuture<'_, Option<SlaRule>> {
        Box::pin(async move { matching_rule(priority, category, &self.rules).cloned() })
    }

    fn rules(&self) -> PortFuture<'_, Vec<SlaRule>> {
        Box::pin(async move { self.rules.clone() })
    }
}
