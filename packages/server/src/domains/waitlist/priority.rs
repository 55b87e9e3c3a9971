//! Pure scoring functions for waitlist ranking.
//!
//! These functions contain NO side effects - they implement the business
//! logic for ordering candidates when a slot opens. Determinism matters:
//! the same (slot, entries, now) must always produce the same order, so the
//! final tiebreak falls through to the entry id.

use chrono::{DateTime, Utc};

use crate::domains::scheduling::models::Slot;
use crate::domains::waitlist::models::WaitlistEntry;

pub const BASE_SCORE: i32 = 20;
pub const VIP_BONUS: i32 = 15;
pub const SERVICE_MATCH_BONUS: i32 = 15;
pub const STAFF_PREFERENCE_BONUS: i32 = 10;
pub const TIME_WINDOW_BONUS: i32 = 10;
/// Tenure accrues one point per full week on the list, capped here.
pub const TENURE_CAP: i32 = 20;
/// Extra weight when the entry asked for exactly this slot's staff.
pub const PREFERRED_STAFF_MATCH_BONUS: i32 = 10;
/// Small nudge for entries whose window comfortably fits the slot.
pub const FLEXIBLE_DURATION_BONUS: i32 = 5;

/// A candidate paired with its score for one specific slot.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub entry: WaitlistEntry,
    pub match_score: i32,
}

/// Base priority of an entry, independent of any particular slot.
///
/// Candidates only reach scoring after the eligibility filter, so the
/// service-match and time-window bonuses always apply; they stay in the
/// formula so scores remain comparable wherever they surface (dashboards,
/// the stored column, ranking).
pub fn priority_score(entry: &WaitlistEntry, now: DateTime<Utc>) -> i32 {
    let mut score = BASE_SCORE + SERVICE_MATCH_BONUS + TIME_WINDOW_BONUS;
    if entry.vip {
        score += VIP_BONUS;
    }
    if entry.staff_id.is_some() {
        score += STAFF_PREFERENCE_BONUS;
    }
    score + tenure_bonus(entry.created_at, now)
}

/// Score used when an entry joins the list, before any tenure accrues.
pub fn initial_score(vip: bool, has_staff_preference: bool) -> i32 {
    let mut score = BASE_SCORE + SERVICE_MATCH_BONUS + TIME_WINDOW_BONUS;
    if vip {
        score += VIP_BONUS;
    }
    if has_staff_preference {
        score += STAFF_PREFERENCE_BONUS;
    }
    score
}

fn tenure_bonus(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i32 {
    let weeks = (now - created_at).num_days() / 7;
    weeks.clamp(0, TENURE_CAP as i64) as i32
}

/// Slot-specific score: base priority plus staff-match and duration-fit
/// bonuses.
pub fn match_score(entry: &WaitlistEntry, slot: &Slot, now: DateTime<Utc>) -> i32 {
    let mut score = priority_score(entry, now);
    if entry.staff_id == Some(slot.staff_id) {
        score += PREFERRED_STAFF_MATCH_BONUS;
    }
    let window_minutes = (entry.latest_time - entry.earliest_time).num_minutes();
    if slot.duration_minutes() <= window_minutes {
        score += FLEXIBLE_DURATION_BONUS;
    }
    score
}

/// Rank candidates for a slot: match score descending, then FIFO by
/// creation time, then id ascending for full determinism.
pub fn rank(entries: Vec<WaitlistEntry>, slot: &Slot, now: DateTime<Utc>) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = entries
        .into_iter()
        .map(|entry| {
            let match_score = match_score(&entry, slot, now);
            RankedCandidate { entry, match_score }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.match_score
            .cmp(&a.match_score)
            .then(a.entry.created_at.cmp(&b.entry.created_at))
            .then(a.entry.id.cmp(&b.entry.id))
    });

    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{EntryId, ServiceId, SlotId, StaffId, TenantId};
    use crate::domains::scheduling::models::SlotStatus;
    use crate::domains::waitlist::models::EntryStatus;
    use chrono::Duration;

    fn entry(
        created_weeks_ago: i64,
        vip: bool,
        staff_id: Option<StaffId>,
        now: DateTime<Utc>,
    ) -> WaitlistEntry {
        WaitlistEntry {
            id: EntryId::new(),
            tenant_id: TenantId::new(),
            customer_name: "Test".into(),
            phone: "+15550000000".into(),
            email: None,
            service_id: ServiceId::new(),
            staff_id,
            earliest_time: now,
            latest_time: now + Duration::hours(8),
            vip,
            priority_score: 0,
            status: EntryStatus::Active,
            created_at: now - Duration::weeks(created_weeks_ago),
            updated_at: now,
        }
    }

    fn slot(staff_id: StaffId, duration_minutes: i64, now: DateTime<Utc>) -> Slot {
        Slot {
            id: SlotId::new(),
            tenant_id: TenantId::new(),
            staff_id,
            service_id: ServiceId::new(),
            start_time: now + Duration::hours(1),
            end_time: now + Duration::hours(1) + Duration::minutes(duration_minutes),
            status: SlotStatus::Open,
            hold_expires_at: None,
            held_entry_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_base_score_without_extras() {
        let now = Utc::now();
        let e = entry(0, false, None, now);
        // base 20 + service 15 + window 10
        assert_eq!(priority_score(&e, now), 45);
    }

    #[test]
    fn test_vip_and_staff_preference_bonuses() {
        let now = Utc::now();
        let staff = StaffId::new();

        assert_eq!(priority_score(&entry(0, true, None, now), now), 60);
        assert_eq!(priority_score(&entry(0, false, Some(staff), now), now), 55);
        assert_eq!(priority_score(&entry(0, true, Some(staff), now), now), 70);
    }

    #[test]
    fn test_tenure_accrues_weekly_and_caps() {
        let now = Utc::now();
        assert_eq!(priority_score(&entry(1, false, None, now), now), 46);
        assert_eq!(priority_score(&entry(19, false, None, now), now), 64);
        assert_eq!(priority_score(&entry(20, false, None, now), now), 65);
        // capped at 20
        assert_eq!(priority_score(&entry(52, false, None, now), now), 65);
    }

    #[test]
    fn test_tenure_never_negative() {
        let now = Utc::now();
        let mut e = entry(0, false, None, now);
        e.created_at = now + Duration::days(1);
        assert_eq!(priority_score(&e, now), 45);
    }

    #[test]
    fn test_initial_score_matches_priority_score_at_join() {
        let now = Utc::now();
        let staff = StaffId::new();
        assert_eq!(
            initial_score(false, false),
            priority_score(&entry(0, false, None, now), now)
        );
        assert_eq!(
            initial_score(true, true),
            priority_score(&entry(0, true, Some(staff), now), now)
        );
    }

    #[test]
    fn test_match_score_staff_match_bonus() {
        let now = Utc::now();
        let staff = StaffId::new();
        let s = slot(staff, 60, now);

        let preferred = entry(0, false, Some(staff), now);
        let other = entry(0, false, Some(StaffId::new()), now);

        // both get the preference bonus; only one gets the match bonus
        assert_eq!(match_score(&preferred, &s, now), 55 + 10 + 5);
        assert_eq!(match_score(&other, &s, now), 55 + 5);
    }

    #[test]
    fn test_match_score_duration_fit() {
        let now = Utc::now();
        let staff = StaffId::new();
        let s = slot(staff, 60, now);

        let mut tight = entry(0, false, None, now);
        tight.earliest_time = now;
        tight.latest_time = now + Duration::minutes(30);

        // 30-minute window can't fit a 60-minute slot: no fit bonus
        assert_eq!(match_score(&tight, &s, now), 45);
    }

    #[test]
    fn test_rank_orders_by_score_then_fifo_then_id() {
        let now = Utc::now();
        let staff = StaffId::new();
        let s = slot(staff, 60, now);

        let vip = entry(0, true, None, now);
        let mut older = entry(0, false, None, now);
        older.created_at = now - Duration::hours(2);
        let newer = entry(0, false, None, now);

        let ranked = rank(vec![newer.clone(), vip.clone(), older.clone()], &s, now);
        assert_eq!(ranked[0].entry.id, vip.id);
        assert_eq!(ranked[1].entry.id, older.id);
        assert_eq!(ranked[2].entry.id, newer.id);
    }

    #[test]
    fn test_rank_is_deterministic_for_full_ties() {
        let now = Utc::now();
        let staff = StaffId::new();
        let s = slot(staff, 60, now);

        let mut a = entry(0, false, None, now);
        let mut b = entry(0, false, None, now);
        let t = now - Duration::hours(1);
        a.created_at = t;
        b.created_at = t;

        let forward = rank(vec![a.clone(), b.clone()], &s, now);
        let backward = rank(vec![b, a], &s, now);

        let forward_ids: Vec<_> = forward.iter().map(|c| c.entry.id).collect();
        let backward_ids: Vec<_> = backward.iter().map(|c| c.entry.id).collect();
        assert_eq!(forward_ids, backward_ids);
        // ties resolve by ascending id
        assert!(forward_ids[0] < forward_ids[1]);
    }
}
