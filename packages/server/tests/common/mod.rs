//! Shared fixtures for engine tests.
//!
//! Everything runs against the in-memory store with a manual clock and
//! recording sender/calendar doubles, so tests steer time and inspect every
//! side effect.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use server_core::common::TenantId;
use server_core::config::EngineSettings;
use server_core::domains::audit::models::Actor;
use server_core::domains::catalog::models::{NewService, NewStaff, Service, Staff};
use server_core::domains::scheduling::actions::create_slot;
use server_core::domains::scheduling::models::{NewSlot, Slot};
use server_core::domains::waitlist::actions::join_waitlist;
use server_core::domains::waitlist::models::{NewEntry, WaitlistEntry};
use server_core::kernel::deps::EngineDeps;
use server_core::kernel::test_dependencies::{SentMessage, TestDependencies};
use server_core::store::Store;

pub struct Harness {
    pub t: TestDependencies,
    pub tenant: TenantId,
    pub staff: Staff,
    pub service: Service,
}

pub async fn harness() -> Harness {
    let settings = EngineSettings {
        // keep retry sleeps out of the test clock budget
        notification_retry_backoff_ms: 1,
        ..EngineSettings::default()
    };
    harness_with_settings(settings).await
}

pub async fn harness_with_settings(settings: EngineSettings) -> Harness {
    let t = TestDependencies::with_settings(Utc::now(), settings);

    let tenant = t.store.insert_tenant("Shear Bliss", "UTC").await.unwrap();
    let staff = t
        .store
        .insert_staff(
            tenant.id,
            NewStaff {
                name: "Dana".into(),
                email: None,
            },
        )
        .await
        .unwrap();
    let service = t
        .store
        .insert_service(
            tenant.id,
            NewService {
                name: "Color Retouch".into(),
                duration_minutes: 60,
                price: Decimal::new(4500, 2),
            },
        )
        .await
        .unwrap();

    Harness {
        t,
        tenant: tenant.id,
        staff,
        service,
    }
}

impl Harness {
    pub fn deps(&self) -> &EngineDeps {
        &self.t.deps
    }

    pub fn now(&self) -> DateTime<Utc> {
        use server_core::kernel::traits::BaseClock;
        self.t.clock.now()
    }

    /// Create an open slot starting `hours_from_now` hours out.
    pub async fn slot_in_hours(&self, hours_from_now: i64, duration_minutes: i64) -> Slot {
        let start = self.now() + Duration::hours(hours_from_now);
        create_slot(
            self.deps(),
            self.tenant,
            NewSlot {
                staff_id: self.staff.id,
                service_id: self.service.id,
                start_time: start,
                end_time: start + Duration::minutes(duration_minutes),
            },
            Actor::staff(self.staff.id.into_uuid()),
        )
        .await
        .unwrap()
    }

    /// Join the waitlist with an all-day window for the default service.
    pub async fn join(&self, name: &str, phone: &str, vip: bool) -> WaitlistEntry {
        self.join_entry(NewEntry {
            customer_name: name.into(),
            phone: phone.into(),
            email: None,
            service_id: self.service.id,
            staff_id: None,
            earliest_time: self.now() - Duration::hours(1),
            latest_time: self.now() + Duration::hours(24),
            vip,
        })
        .await
    }

    pub async fn join_entry(&self, input: NewEntry) -> WaitlistEntry {
        join_waitlist(self.deps(), self.tenant, input).await.unwrap()
    }

    pub fn last_message(&self) -> SentMessage {
        self.t
            .sender
            .sent()
            .last()
            .cloned()
            .expect("no message was sent")
    }
}

/// Pull the confirm and decline tokens out of a rendered offer.
pub fn extract_tokens(rendered: &str) -> (String, String) {
    (
        extract_after(rendered, "/r/confirm/"),
        extract_after(rendered, "/r/decline/"),
    )
}

fn extract_after(rendered: &str, marker: &str) -> String {
    let start = rendered
        .find(marker)
        .unwrap_or_else(|| panic!("marker {} not found in message", marker))
        + marker.len();
    rendered[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect()
}
