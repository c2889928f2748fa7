//! End-to-end lifecycle scenarios against the public engine API.

#![allow(clippy::unwrap_used)] // Test code

use chrono::Duration;
use helpdesk_core::environment::Clock;
use helpdesk_engine::notification::dispatch;
use helpdesk_engine::overdue::is_overdue;
use helpdesk_engine::{
    Actor, ChangeSet, EngineConfig, FieldDiff, NotificationKind, NewTicket, Recipient, Ticket, TicketEngine,
    TicketId, TicketProperty, TicketStatus, UserId,
};
use helpdesk_testing::{ManualClock, t0};
use std::sync::Arc;

fn setup() -> (Arc<ManualClock>, TicketEngine, Ticket) {
    let clock = Arc::new(ManualClock::starting_at(t0()));
    let engine = TicketEngine::new(clock.clone(), EngineConfig::default());
    let ticket = engine
        .create(
            TicketId::new(),
            &Actor::requester("alice"),
            &NewTicket::new("Outlook crashes", "Crashes when opening calendar", "High", "Email"),
        )
        .unwrap()
        .ticket;
    (clock, engine, ticket)
}

#[test]
fn estimated_ticket_goes_overdue_until_resolved() {
    let (clock, engine, ticket) = setup();
    let support = Actor::support("bob");

    let ticket = engine
        .apply_update(&ticket, &support, &ChangeSet::new().status("InProgress").estimate_minutes(60))
        .unwrap()
        .ticket;

    clock.advance(Duration::minutes(61));
    assert!(is_overdue(&ticket, &[], clock.now()));

    let resolved = engine.resolve(&ticket, &support, Some("Repaired the profile")).unwrap().ticket;
    assert!(!is_overdue(&resolved, &[], clock.now()));
    assert!(!is_overdue(&resolved, &[], clock.now() + Duration::days(365)));
}

#[test]
fn reopen_then_resolve_measures_from_creation() {
    let (clock, engine, ticket) = setup();
    let support = Actor::support("bob");

    clock.advance(Duration::minutes(30));
    let resolved = engine.resolve(&ticket, &support, None).unwrap().ticket;
    assert_eq!(resolved.actual_resolution_minutes, Some(30));

    clock.advance(Duration::minutes(15));
    let reopened = engine
        .apply_update(&resolved, &support, &ChangeSet::new().status("Reopened"))
        .unwrap()
        .ticket;
    assert_eq!(reopened.resolved_at, None);
    assert_eq!(reopened.actual_resolution_minutes, None);

    clock.advance(Duration::minutes(45));
    let again = engine.resolve(&reopened, &support, None).unwrap().ticket;
    assert_eq!(again.actual_resolution_minutes, Some(90));
    assert_eq!(again.resolved_at, Some(t0() + Duration::minutes(90)));
}

#[test]
fn second_resolve_is_a_conflict() {
    let (_clock, engine, ticket) = setup();
    let support = Actor::support("bob");

    let resolved = engine.resolve(&ticket, &support, None).unwrap().ticket;
    let second = engine.resolve(&resolved, &support, None);
    assert!(second.unwrap_err().is_conflict());
}

#[test]
fn support_comment_starts_work_but_requester_comment_does_not() {
    let (_clock, engine, ticket) = setup();

    let by_requester = engine.add_comment(&ticket, &Actor::requester("alice"), "Any news?", false).unwrap();
    assert!(by_requester.history.is_empty());
    assert_eq!(by_requester.ticket.status, TicketStatus::New);

    let by_support = engine.add_comment(&ticket, &Actor::support("bob"), "On it", true).unwrap();
    let entries = by_support.history.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].property(), TicketProperty::Status);
    assert_eq!(entries[0].new_value(), "InProgress");
    assert!(by_support.comment.unwrap().is_internal);
    // Internal comment: only the status update notifies
    assert!(by_support.notifications.iter().all(|n| n.kind == NotificationKind::Updated));
}

#[test]
fn resolved_diff_dispatches_single_event() {
    let (_clock, _engine, ticket) = setup();
    let diff = FieldDiff {
        property: TicketProperty::Status,
        old_value: "InProgress".into(),
        new_value: "Resolved".into(),
        auto_transition: false,
    };

    let events = dispatch(&ticket, &[diff], None);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, NotificationKind::Resolved);
    assert_eq!(events[0].recipient, Recipient::User(UserId::new("alice")));
}

#[test]
fn history_is_hidden_from_requesters() {
    let (_clock, engine, ticket) = setup();
    let result = engine
        .apply_update(&ticket, &Actor::admin("root"), &ChangeSet::new().assign_to("bob").priority("Critical"))
        .unwrap();

    assert_eq!(result.history.visible_to(&Actor::support("bob")).len(), 3);
    assert!(result.history.visible_to(&Actor::requester("alice")).is_empty());
}

#[test]
fn notification_events_serialize_for_mailers() {
    let (_clock, engine, ticket) = setup();
    let result = engine
        .apply_update(&ticket, &Actor::support("bob"), &ChangeSet::new().assign_to("bob"))
        .unwrap();

    let json = serde_json::to_value(&result.notifications[0]).unwrap();
    assert_eq!(json["kind"], "Assigned");
    assert_eq!(json["recipient"]["User"], "bob");
    assert_eq!(json["payload"]["new_value"], "bob");
}

#[test]
fn self_assigned_staff_requester_is_not_told_about_own_comment() {
    let (_clock, engine, _) = setup();
    let bob = Actor::support("bob");
    let ticket = engine
        .create(
            TicketId::new(),
            &bob,
            &NewTicket::new("Printer offline", "Third floor printer", "Low", "Hardware"),
        )
        .unwrap()
        .ticket;
    let ticket = engine.apply_update(&ticket, &bob, &ChangeSet::new().assign_to("bob")).unwrap().ticket;

    let commented = engine.add_comment(&ticket, &bob, "Ordered a new fuser", false).unwrap();

    assert!(commented.comment.is_some());
    assert!(
        !commented
            .notifications
            .iter()
            .any(|n| n.kind == NotificationKind::CommentAdded),
        "comment echoed to its author: {:?}",
        commented.notifications
    );
}

#[test]
fn description_only_update_is_audited_but_silent() {
    let (_clock, engine, ticket) = setup();

    let result = engine
        .apply_update(
            &ticket,
            &Actor::support("bob"),
            &ChangeSet::new().description("Crashes when opening shared calendars"),
        )
        .unwrap();

    let entries = result.history.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].property(), TicketProperty::Description);
    assert_eq!(result.ticket.description, "Crashes when opening shared calendars");
    assert!(result.notifications.is_empty());
}
