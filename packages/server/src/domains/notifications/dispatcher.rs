//! Outbound hold offers.
//!
//! The dispatcher persists a pending notification row (with the token
//! digest), renders the offer, and hands it to the external sender with a
//! bounded exponential retry. It never changes slot or entry state - the
//! state machine and cascade own those. A hold whose offer could not be
//! delivered simply runs out and cascades on the next ticker pass.

use std::time::Duration;

use crate::common::CoreResult;
use crate::domains::notifications::models::{
    NewNotification, Notification, NotificationChannel,
};
use crate::domains::scheduling::models::Slot;
use crate::domains::waitlist::models::WaitlistEntry;
use crate::kernel::deps::EngineDeps;

/// Everything the message template gets to work with.
#[derive(Debug, Clone)]
pub struct HoldOffer {
    pub customer_name: String,
    pub service_name: String,
    pub staff_name: String,
    pub date: String,
    pub time: String,
    pub duration: String,
    pub price: String,
    pub confirm_link: String,
    pub decline_link: String,
}

impl HoldOffer {
    /// SMS copy. Short on purpose: two links and the facts.
    pub fn render(&self) -> String {
        format!(
            "Hi {name}! An opening for {service} with {staff} on {date} at {time} \
             ({duration}, {price}) just became available. \
             Confirm: {confirm} \
             Can't make it? {decline} \
             This offer expires shortly.",
            name = self.customer_name,
            service = self.service_name,
            staff = self.staff_name,
            date = self.date,
            time = self.time,
            duration = self.duration,
            price = self.price,
            confirm = self.confirm_link,
            decline = self.decline_link,
        )
    }
}

/// Result of one dispatch: the persisted row plus whether the provider
/// accepted the message.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub notification: Notification,
    pub delivered: bool,
}

/// Build, persist, and send the offer for a freshly held slot.
///
/// Returns Err only on store failures; provider failures are recorded on the
/// notification row and reported through `delivered = false`.
pub async fn dispatch_hold_offer(
    deps: &EngineDeps,
    slot: &Slot,
    entry: &WaitlistEntry,
) -> CoreResult<DispatchOutcome> {
    let now = deps.clock.now();
    let tenant = entry.tenant_id;

    let pair = deps.tokens.sign_pair(
        tenant,
        entry.id,
        slot.id,
        now,
        deps.settings.confirm_token_ttl_seconds,
    )?;

    let service = deps.store.get_service(tenant, slot.service_id).await?;
    let staff = deps.store.get_staff(tenant, slot.staff_id).await?;
    if staff.is_none() {
        tracing::warn!(slot_id = %slot.id, "slot staff missing while rendering offer");
    }

    let offer = HoldOffer {
        customer_name: entry.customer_name.clone(),
        service_name: service
            .as_ref()
            .map(|s| s.name.clone())
            .unwrap_or_else(|| "your service".to_string()),
        staff_name: staff
            .map(|s| s.name)
            .unwrap_or_else(|| "our team".to_string()),
        date: slot.start_time.format("%A, %B %-d").to_string(),
        time: slot.start_time.format("%H:%M").to_string(),
        duration: format!("{} min", slot.duration_minutes()),
        price: service
            .map(|s| format!("${}", s.price))
            .unwrap_or_else(|| "price on request".to_string()),
        confirm_link: format!(
            "{}/r/confirm/{}",
            deps.settings.respond_base_url, pair.confirm
        ),
        decline_link: format!(
            "{}/r/decline/{}",
            deps.settings.respond_base_url, pair.decline
        ),
    };
    let rendered = offer.render();

    let channel = NotificationChannel::Sms;
    let notification = deps
        .store
        .insert_notification(
            tenant,
            NewNotification {
                entry_id: entry.id,
                slot_id: slot.id,
                channel,
                token_digest: pair.digest(),
            },
        )
        .await?;

    let attempts = deps.settings.notification_retry_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match deps.sender.send(channel, &entry.phone, &rendered).await {
            Ok(outcome) => {
                deps.store
                    .mark_notification_sent(
                        tenant,
                        notification.id,
                        outcome.provider_id.as_deref(),
                        deps.clock.now(),
                    )
                    .await?;
                tracing::info!(
                    notification_id = %notification.id,
                    entry_id = %entry.id,
                    slot_id = %slot.id,
                    attempt,
                    "hold offer sent"
                );
                return Ok(DispatchOutcome {
                    notification,
                    delivered: true,
                });
            }
            Err(e) => {
                last_error = e.to_string();
                tracing::warn!(
                    notification_id = %notification.id,
                    attempt,
                    error = %last_error,
                    "hold offer send failed"
                );
                if attempt < attempts {
                    tokio::time::sleep(retry_delay(
                        deps.settings.notification_retry_backoff_ms,
                        attempt,
                    ))
                    .await;
                }
            }
        }
    }

    deps.store
        .mark_notification_failed(tenant, notification.id, &last_error)
        .await?;

    Ok(DispatchOutcome {
        notification,
        delivered: false,
    })
}

/// Exponential backoff with jitter: base * 2^(attempt-1) plus up to half the
/// base again.
fn retry_delay(base_ms: u64, attempt: u32) -> Duration {
    let backoff = base_ms.saturating_mul(1u64 << (attempt - 1).min(16));
    let jitter = if base_ms > 1 {
        fastrand::u64(0..base_ms / 2 + 1)
    } else {
        0
    };
    Duration::from_millis(backoff + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_grows_exponentially() {
        let first = retry_delay(200, 1);
        let second = retry_delay(200, 2);
        let third = retry_delay(200, 3);

        assert!(first >= Duration::from_millis(200));
        assert!(first <= Duration::from_millis(300));
        assert!(second >= Duration::from_millis(400));
        assert!(second <= Duration::from_millis(500));
        assert!(third >= Duration::from_millis(800));
        assert!(third <= Duration::from_millis(900));
    }

    #[test]
    fn test_render_includes_every_template_variable() {
        let offer = HoldOffer {
            customer_name: "Maria".into(),
            service_name: "Color Retouch".into(),
            staff_name: "Dana".into(),
            date: "Tuesday, June 3".into(),
            time: "10:00".into(),
            duration: "60 min".into(),
            price: "$45.00".into(),
            confirm_link: "https://book.example/r/confirm/abc".into(),
            decline_link: "https://book.example/r/decline/def".into(),
        };

        let rendered = offer.render();
        assert!(rendered.contains("Maria"));
        assert!(rendered.contains("Color Retouch"));
        assert!(rendered.contains("Dana"));
        assert!(rendered.contains("Tuesday, June 3"));
        assert!(rendered.contains("10:00"));
        assert!(rendered.contains("60 min"));
        assert!(rendered.contains("$45.00"));
        assert!(rendered.contains("/r/confirm/abc"));
        assert!(rendered.contains("/r/decline/def"));
    }
}
