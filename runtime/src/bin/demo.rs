//! Helpdesk lifecycle walkthrough.
//!
//! Runs one ticket through create, assign, comment, resolve and close against
//! the in-memory repository, logging every notification.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin helpdesk-demo
//! RUST_LOG=debug HELPDESK_SUPPORT_DISTRIBUTION=it-desk cargo run --bin helpdesk-demo
//! ```

use helpdesk_core::environment::SystemClock;
use helpdesk_engine::{
    Capability, CapabilitySet, ChangeSet, NewTicket, SlaRule, TicketEngine, TicketPriority, TicketQuery, UserId,
};
use helpdesk_runtime::telemetry::{describe_metrics, init_tracing};
use helpdesk_runtime::{
    Config, InMemoryTicketRepository, ServiceOutcome, StaticDirectory, StaticSlaTable, TicketService, TracingMailer,
};
use std::sync::Arc;
use tracing::info;

fn sla_rules() -> Vec<SlaRule> {
    [
        (TicketPriority::Critical, 15, 240),
        (TicketPriority::High, 60, 480),
        (TicketPriority::Medium, 240, 1440),
        (TicketPriority::Low, 480, 2880),
    ]
    .into_iter()
    .map(|(priority, response, resolution)| SlaRule {
        priority,
        category: None,
        response_time_minutes: response,
        resolution_time_minutes: resolution,
        is_default: priority == TicketPriority::Low,
    })
    .collect()
}

async fn report(step: &str, outcome: ServiceOutcome) {
    let ticket = &outcome.result.ticket;
    info!(
        step,
        status = %ticket.status,
        version = ticket.version,
        history = outcome.result.history.len(),
        notifications = outcome.result.notifications.len(),
        "step committed"
    );
    outcome.deliveries.wait().await;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();
    init_tracing(&config.log_level);
    describe_metrics();

    info!("=== Helpdesk lifecycle demo ===");

    let directory = StaticDirectory::new()
        .with_user("alice", CapabilitySet::none())
        .with_user("bob", CapabilitySet::none().with(Capability::Support))
        .with_user("carol", CapabilitySet::none().with(Capability::Admin));

    let engine = TicketEngine::new(Arc::new(SystemClock), config.engine.clone());
    let service = TicketService::new(engine, Arc::new(InMemoryTicketRepository::new()), Arc::new(TracingMailer))
        .with_identities(Arc::new(directory))
        .with_sla(Arc::new(StaticSlaTable::new(sla_rules())))
        .with_retry_policy(config.store.retry_policy());

    let alice = service.resolve_actor(&UserId::new("alice")).await?;
    let bob = service.resolve_actor(&UserId::new("bob")).await?;
    let carol = service.resolve_actor(&UserId::new("carol")).await?;

    let created = service
        .create(
            &alice,
            NewTicket::new("VPN drops every ten minutes", "Started after the client update", "High", "Network"),
        )
        .await?;
    let id = created.result.ticket.id;
    report("create", created).await;

    let assigned = service
        .apply_update(id, &bob, ChangeSet::new().assign_to("bob").estimate_minutes(90))
        .await?;
    report("assign", assigned).await;

    let internal = service.add_comment(id, &bob, "Looks like the MTU changed", true).await?;
    report("internal comment", internal).await;

    let public = service
        .add_comment(id, &alice, "It also happens on hotel wifi", false)
        .await?;
    report("requester comment", public).await;

    info!(overdue = service.is_overdue(id).await?, "before resolution");

    let resolved = service.resolve(id, &bob, Some("Rolled back the client".to_string())).await?;
    report("resolve", resolved).await;

    info!(overdue = service.is_overdue(id).await?, "after resolution");

    let closed = service.close(id, &alice).await?;
    report("close", closed).await;

    for entry in service.history(id, &carol).await? {
        info!(
            property = %entry.property(),
            old = entry.old_value(),
            new = entry.new_value(),
            by = %entry.changed_by_id(),
            "history"
        );
    }
    info!(
        visible_to_requester = service.comments(id, &alice).await?.len(),
        visible_to_staff = service.comments(id, &bob).await?.len(),
        "comments"
    );

    let page = service.list(&carol, &TicketQuery::default()).await?;
    info!(total = page.total_count, overdue = service.overdue(&carol).await?.len(), "listing");

    Ok(())
}
