//! End-to-end engine scenarios over the in-memory store.
//!
//! Each test walks a full customer-visible flow: open a slot, hold for the
//! top candidate, deliver the offer, then confirm / decline / expire and
//! check every side of the outcome (slot, entries, booking, notifications,
//! calendar, audit).

mod common;

use chrono::Duration;
use common::{extract_tokens, harness};
use server_core::common::{CoreError, Precondition};
use server_core::domains::audit::models::Actor;
use server_core::domains::calendar::adapter::reconcile_calendar;
use server_core::domains::calendar::models::CalendarEventStatus;
use server_core::domains::confirmation::actions::{confirm, decline};
use server_core::domains::notifications::models::NotificationStatus;
use server_core::domains::scheduling::actions::cascade::hold_first_available;
use server_core::domains::scheduling::actions::{cancel_slot, open_slot, process_expired_holds};
use server_core::domains::scheduling::models::{NewSlot, SlotStatus};
use server_core::domains::waitlist::models::EntryStatus;
use server_core::domains::waitlist::priority::rank;
use server_core::store::Store;

#[tokio::test]
async fn test_happy_path_confirm() {
    let h = harness().await;
    let slot = h.slot_in_hours(2, 60).await;

    let e2 = h.join("Quinn", "+15550002222", false).await;
    h.t.store
        .backdate_entry(e2.id, h.now() - Duration::hours(2));
    let e1 = h.join("Maria", "+15550001111", true).await;

    let outcome = open_slot(h.deps(), h.tenant, slot.id, Actor::system())
        .await
        .unwrap();

    // VIP outranks the older plain entry
    assert_eq!(outcome.top_candidate.as_ref().unwrap().id, e1.id);
    assert_eq!(outcome.candidates.len(), 2);
    assert_eq!(outcome.slot.status, SlotStatus::Held);
    assert_eq!(
        outcome.slot.hold_expires_at.unwrap(),
        h.now() + Duration::minutes(10)
    );
    assert!(outcome.notification_enqueued);

    let (confirm_token, _) = extract_tokens(&h.last_message().rendered);

    // Customer answers five minutes in
    h.t.clock.advance(Duration::minutes(5));
    let receipt = confirm(h.deps(), &confirm_token).await.unwrap();

    assert_eq!(receipt.slot.status, SlotStatus::Booked);
    assert_eq!(receipt.booking.customer_phone, "+15550001111");
    assert_eq!(receipt.booking.waitlist_entry_id, Some(e1.id));

    let e1_after = h.t.store.get_entry(h.tenant, e1.id).await.unwrap().unwrap();
    let e2_after = h.t.store.get_entry(h.tenant, e2.id).await.unwrap().unwrap();
    assert_eq!(e1_after.status, EntryStatus::Confirmed);
    assert_eq!(e2_after.status, EntryStatus::Active);

    // Exactly one booking for the slot
    let booking = h
        .t
        .store
        .booking_for_slot(h.tenant, slot.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(booking.id, receipt.booking.id);

    // Calendar mirror created
    let events = h.t.store.calendar_snapshot();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, CalendarEventStatus::Created);
    assert!(events[0].external_event_id.is_some());
}

#[tokio::test]
async fn test_decline_cascades_to_next_candidate() {
    let h = harness().await;
    let slot = h.slot_in_hours(2, 60).await;

    let e1 = h.join("Maria", "+15550001111", true).await;
    let e2 = h.join("Quinn", "+15550002222", false).await;

    open_slot(h.deps(), h.tenant, slot.id, Actor::system())
        .await
        .unwrap();
    let (_, decline_token) = extract_tokens(&h.last_message().rendered);

    h.t.clock.advance(Duration::minutes(5));
    let receipt = decline(h.deps(), &decline_token).await.unwrap();

    assert_eq!(receipt.next_candidate.as_ref().unwrap().id, e2.id);

    let slot_after = h.t.store.get_slot(h.tenant, slot.id).await.unwrap().unwrap();
    assert_eq!(slot_after.status, SlotStatus::Held);
    assert_eq!(slot_after.held_entry_id, Some(e2.id));

    let e1_after = h.t.store.get_entry(h.tenant, e1.id).await.unwrap().unwrap();
    assert_eq!(e1_after.status, EntryStatus::Active);

    // Two offers went out: first to Maria, then to Quinn
    let sent = h.t.sender.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].to, "+15550001111");
    assert_eq!(sent[1].to, "+15550002222");
}

#[tokio::test]
async fn test_expiry_cascades_and_late_confirm_reports_hold_expired() {
    let h = harness().await;
    let slot = h.slot_in_hours(2, 60).await;

    let _e1 = h.join("Maria", "+15550001111", true).await;
    let e2 = h.join("Quinn", "+15550002222", false).await;

    open_slot(h.deps(), h.tenant, slot.id, Actor::system())
        .await
        .unwrap();
    let (confirm_token, _) = extract_tokens(&h.last_message().rendered);

    // No response; the ticker fires half a minute after the hold lapses
    h.t.clock.advance(Duration::minutes(10) + Duration::seconds(30));
    let report = process_expired_holds(h.deps(), 100).await.unwrap();
    assert_eq!(report.released_count, 1);
    assert_eq!(report.cascade_notifications, 1);

    let slot_after = h.t.store.get_slot(h.tenant, slot.id).await.unwrap().unwrap();
    assert_eq!(slot_after.status, SlotStatus::Held);
    assert_eq!(slot_after.held_entry_id, Some(e2.id));

    // Maria's click lands a minute too late
    h.t.clock.advance(Duration::seconds(30));
    let err = confirm(h.deps(), &confirm_token).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::PreconditionFailed(Precondition::HoldExpired)
    ));
}

#[tokio::test]
async fn test_confirm_token_replay_returns_same_booking() {
    let h = harness().await;
    let slot = h.slot_in_hours(2, 60).await;
    h.join("Maria", "+15550001111", false).await;

    open_slot(h.deps(), h.tenant, slot.id, Actor::system())
        .await
        .unwrap();
    let (confirm_token, _) = extract_tokens(&h.last_message().rendered);

    let first = confirm(h.deps(), &confirm_token).await.unwrap();
    let second = confirm(h.deps(), &confirm_token).await.unwrap();

    assert_eq!(first.booking.id, second.booking.id);
    assert_eq!(second.slot.status, SlotStatus::Booked);

    // Only one calendar event despite the replay
    assert_eq!(h.t.store.calendar_snapshot().len(), 1);
}

#[tokio::test]
async fn test_decline_replay_is_a_noop() {
    let h = harness().await;
    let slot = h.slot_in_hours(2, 60).await;
    h.join("Maria", "+15550001111", true).await;
    let e2 = h.join("Quinn", "+15550002222", false).await;

    open_slot(h.deps(), h.tenant, slot.id, Actor::system())
        .await
        .unwrap();
    let (_, decline_token) = extract_tokens(&h.t.sender.sent()[0].rendered);

    let first = decline(h.deps(), &decline_token).await.unwrap();
    assert_eq!(first.next_candidate.as_ref().unwrap().id, e2.id);

    // The slot has re-entered the cycle (held for Quinn); the replay must
    // not disturb it.
    let replay = decline(h.deps(), &decline_token).await.unwrap();
    assert!(replay.next_candidate.is_none());

    let slot_after = h.t.store.get_slot(h.tenant, slot.id).await.unwrap().unwrap();
    assert_eq!(slot_after.status, SlotStatus::Held);
    assert_eq!(slot_after.held_entry_id, Some(e2.id));
}

#[tokio::test]
async fn test_stale_candidate_is_skipped_without_notification() {
    let h = harness().await;
    let slot = h.slot_in_hours(2, 60).await;

    let e1 = h.join("Maria", "+15550001111", true).await;
    let e2 = h.join("Quinn", "+15550002222", false).await;

    // Rank first (Maria on top), then an admin removes her before the
    // atomic hold runs.
    let eligible = h.t.store.eligible_entries(h.tenant, &slot).await.unwrap();
    let ranked = rank(eligible, &slot, h.now());
    assert_eq!(ranked[0].entry.id, e1.id);

    h.t.store
        .remove_entry(
            h.tenant,
            e1.id,
            server_core::domains::audit::models::AuditRecord::new(
                h.tenant,
                Actor::staff(h.staff.id.into_uuid()),
                "waitlist.remove",
                "waitlist_entry",
                Some(e1.id.into_uuid()),
            ),
        )
        .await
        .unwrap();

    let step = hold_first_available(h.deps(), &slot, ranked, Actor::system(), 10)
        .await
        .unwrap();

    assert_eq!(step.next_candidate.as_ref().unwrap().id, e2.id);
    // Maria never got a message
    let sent = h.t.sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "+15550002222");
}

#[tokio::test]
async fn test_phone_dedupe_on_confirm() {
    let h = harness().await;
    let slot1 = h.slot_in_hours(2, 60).await;

    // Same customer waiting twice, plus an unrelated customer
    let e_a = h.join("Maria", "+15550001111", true).await;
    let e_b = h.join("Maria", "+15550001111", false).await;
    let e_c = h.join("Quinn", "+15550002222", false).await;

    let outcome = open_slot(h.deps(), h.tenant, slot1.id, Actor::system())
        .await
        .unwrap();
    assert_eq!(outcome.top_candidate.as_ref().unwrap().id, e_a.id);

    let (confirm_token, _) = extract_tokens(&h.last_message().rendered);
    confirm(h.deps(), &confirm_token).await.unwrap();

    // Maria's other entry is gone; Quinn is untouched
    let b_after = h.t.store.get_entry(h.tenant, e_b.id).await.unwrap().unwrap();
    let c_after = h.t.store.get_entry(h.tenant, e_c.id).await.unwrap().unwrap();
    assert_eq!(b_after.status, EntryStatus::Removed);
    assert_eq!(c_after.status, EntryStatus::Active);
}

#[tokio::test]
async fn test_open_slot_with_no_candidates_stays_open() {
    let h = harness().await;
    let slot = h.slot_in_hours(2, 60).await;

    let outcome = open_slot(h.deps(), h.tenant, slot.id, Actor::system())
        .await
        .unwrap();

    assert_eq!(outcome.slot.status, SlotStatus::Open);
    assert!(outcome.candidates.is_empty());
    assert!(outcome.top_candidate.is_none());
    assert!(!outcome.notification_enqueued);
    assert_eq!(h.t.sender.sent_count(), 0);
}

#[tokio::test]
async fn test_invalid_tokens_are_rejected() {
    let h = harness().await;
    let slot = h.slot_in_hours(2, 60).await;
    h.join("Maria", "+15550001111", false).await;

    open_slot(h.deps(), h.tenant, slot.id, Actor::system())
        .await
        .unwrap();
    let (confirm_token, decline_token) = extract_tokens(&h.last_message().rendered);

    // Garbage
    assert!(matches!(
        confirm(h.deps(), "garbage").await.unwrap_err(),
        CoreError::InvalidToken(_)
    ));

    // Wrong action: a decline token cannot confirm
    assert!(matches!(
        confirm(h.deps(), &decline_token).await.unwrap_err(),
        CoreError::InvalidToken(_)
    ));

    // Past the token TTL (15 min by default), even the right token dies
    h.t.clock.advance(Duration::minutes(16));
    assert!(matches!(
        confirm(h.deps(), &confirm_token).await.unwrap_err(),
        CoreError::InvalidToken(_)
    ));
}

#[tokio::test]
async fn test_notification_retry_recovers_from_transient_outage() {
    let h = harness().await;
    let slot = h.slot_in_hours(2, 60).await;
    h.join("Maria", "+15550001111", false).await;

    // Two failures, then success on the third (and last) attempt
    h.t.sender.fail_next(2);
    let outcome = open_slot(h.deps(), h.tenant, slot.id, Actor::system())
        .await
        .unwrap();

    assert!(outcome.notification_enqueued);
    assert_eq!(h.t.sender.sent_count(), 1);

    let rows = h.t.store.notifications_snapshot();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, NotificationStatus::Sent);
}

#[tokio::test]
async fn test_failed_offer_leaves_hold_until_expiry_recascade() {
    let h = harness().await;
    let slot = h.slot_in_hours(2, 60).await;
    let e1 = h.join("Maria", "+15550001111", false).await;

    // Provider down for all three attempts
    h.t.sender.fail_next(3);
    let outcome = open_slot(h.deps(), h.tenant, slot.id, Actor::system())
        .await
        .unwrap();

    assert!(!outcome.notification_enqueued);
    let rows = h.t.store.notifications_snapshot();
    assert_eq!(rows[0].status, NotificationStatus::Failed);

    // The hold stands regardless; the dispatcher never touches state
    let held = h.t.store.get_slot(h.tenant, slot.id).await.unwrap().unwrap();
    assert_eq!(held.status, SlotStatus::Held);
    assert_eq!(held.held_entry_id, Some(e1.id));

    // Expiry releases the hold; with nobody else on the list (the entry
    // that lost the hold is excluded from its own cascade) the slot stays
    // open and Maria returns to the pool
    h.t.clock.advance(Duration::minutes(11));
    let report = process_expired_holds(h.deps(), 100).await.unwrap();
    assert_eq!(report.released_count, 1);
    assert_eq!(report.cascade_notifications, 0);

    let open = h.t.store.get_slot(h.tenant, slot.id).await.unwrap().unwrap();
    assert_eq!(open.status, SlotStatus::Open);
    let e1_after = h.t.store.get_entry(h.tenant, e1.id).await.unwrap().unwrap();
    assert_eq!(e1_after.status, EntryStatus::Active);

    // The provider is back; a fresh matching pass reaches Maria with fresh
    // tokens
    let reopened = open_slot(h.deps(), h.tenant, slot.id, Actor::system())
        .await
        .unwrap();
    assert!(reopened.notification_enqueued);
    assert_eq!(h.t.sender.sent_count(), 1);

    let rows = h.t.store.notifications_snapshot();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].status, NotificationStatus::Sent);
}

#[tokio::test]
async fn test_calendar_failure_never_blocks_confirm_and_reconciler_repairs() {
    let h = harness().await;
    let slot = h.slot_in_hours(2, 60).await;
    h.join("Maria", "+15550001111", false).await;

    open_slot(h.deps(), h.tenant, slot.id, Actor::system())
        .await
        .unwrap();
    let (confirm_token, _) = extract_tokens(&h.last_message().rendered);

    h.t.calendar.fail_next_creates(1);
    let receipt = confirm(h.deps(), &confirm_token).await.unwrap();
    assert_eq!(receipt.slot.status, SlotStatus::Booked);

    // The failure landed on the event row and the staff sync status
    let events = h.t.store.calendar_snapshot();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, CalendarEventStatus::Error);
    let staff = h
        .t
        .store
        .get_staff(h.tenant, h.staff.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(staff.calendar_sync_status, "error");

    // Reconciler retries and heals
    let report = reconcile_calendar(h.deps(), 50).await.unwrap();
    assert_eq!(report.recreated, 1);

    let events = h.t.store.calendar_snapshot();
    assert_eq!(events[0].status, CalendarEventStatus::Created);
    assert!(events[0].external_event_id.is_some());
    let staff = h
        .t
        .store
        .get_staff(h.tenant, h.staff.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(staff.calendar_sync_status, "ok");
}

#[tokio::test]
async fn test_cancel_held_slot_returns_candidate_to_pool() {
    let h = harness().await;
    let slot = h.slot_in_hours(2, 60).await;
    let e1 = h.join("Maria", "+15550001111", false).await;

    open_slot(h.deps(), h.tenant, slot.id, Actor::system())
        .await
        .unwrap();

    let canceled = cancel_slot(
        h.deps(),
        h.tenant,
        slot.id,
        Actor::staff(h.staff.id.into_uuid()),
    )
    .await
    .unwrap();
    assert_eq!(canceled.status, SlotStatus::Canceled);
    assert!(canceled.held_entry_id.is_none());

    let e1_after = h.t.store.get_entry(h.tenant, e1.id).await.unwrap().unwrap();
    assert_eq!(e1_after.status, EntryStatus::Active);
}

#[tokio::test]
async fn test_booked_slot_cannot_be_canceled() {
    let h = harness().await;
    let slot = h.slot_in_hours(2, 60).await;
    h.join("Maria", "+15550001111", false).await;

    open_slot(h.deps(), h.tenant, slot.id, Actor::system())
        .await
        .unwrap();
    let (confirm_token, _) = extract_tokens(&h.last_message().rendered);
    confirm(h.deps(), &confirm_token).await.unwrap();

    let err = cancel_slot(h.deps(), h.tenant, slot.id, Actor::system())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::PreconditionFailed(Precondition::SlotNoLongerAvailable)
    ));
}

#[tokio::test]
async fn test_slot_creation_rejects_overlap_and_past_start() {
    let h = harness().await;
    let _slot = h.slot_in_hours(2, 60).await;

    // Overlapping the existing 2h-3h slot
    let overlap = h
        .t
        .store
        .insert_slot(
            h.tenant,
            NewSlot {
                staff_id: h.staff.id,
                service_id: h.service.id,
                start_time: h.now() + Duration::minutes(150),
                end_time: h.now() + Duration::minutes(210),
            },
            h.now(),
        )
        .await;
    assert!(matches!(overlap, Err(CoreError::Conflict(_))));

    // Starting in the past
    let past = h
        .t
        .store
        .insert_slot(
            h.tenant,
            NewSlot {
                staff_id: h.staff.id,
                service_id: h.service.id,
                start_time: h.now() - Duration::hours(1),
                end_time: h.now() + Duration::hours(1),
            },
            h.now(),
        )
        .await;
    assert!(matches!(past, Err(CoreError::Conflict(_))));
}

#[tokio::test]
async fn test_tenant_isolation_in_matching_and_reads() {
    let h = harness().await;
    let slot = h.slot_in_hours(2, 60).await;
    h.join("Maria", "+15550001111", false).await;

    // A second business with its own staff, service, and waitlist
    let other = h.t.store.insert_tenant("Rival Salon", "UTC").await.unwrap();
    let other_service = h
        .t
        .store
        .insert_service(
            other.id,
            server_core::domains::catalog::models::NewService {
                name: "Color Retouch".into(),
                duration_minutes: 60,
                price: rust_decimal::Decimal::new(4500, 2),
            },
        )
        .await
        .unwrap();
    h.t.store
        .insert_entry(
            other.id,
            server_core::domains::waitlist::models::NewEntry {
                customer_name: "Intruder".into(),
                phone: "+15550009999".into(),
                email: None,
                service_id: other_service.id,
                staff_id: None,
                earliest_time: h.now() - Duration::hours(1),
                latest_time: h.now() + Duration::hours(24),
                vip: true,
            },
            60,
            3,
        )
        .await
        .unwrap();

    // Matching for tenant A never sees tenant B's entry
    let outcome = open_slot(h.deps(), h.tenant, slot.id, Actor::system())
        .await
        .unwrap();
    assert_eq!(outcome.candidates.len(), 1);
    assert_eq!(
        outcome.top_candidate.as_ref().unwrap().customer_name,
        "Maria"
    );

    // Cross-tenant reads come back empty rather than leaking
    assert!(h
        .t
        .store
        .get_slot(other.id, slot.id)
        .await
        .unwrap()
        .is_none());

    // Audit rows are scoped too
    let other_audit = h.t.store.list_audit(other.id, 100).await.unwrap();
    assert!(other_audit
        .iter()
        .all(|row| row.tenant_id == other.id));
}
