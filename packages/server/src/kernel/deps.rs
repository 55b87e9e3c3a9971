//! Engine dependencies (using traits for testability)
//!
//! This module provides the central dependency container used by all domain
//! actions, plus the production adapters: Twilio for SMS delivery and a
//! webhook sink for the external calendar.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use twilio::TwilioService;

use crate::config::EngineSettings;
use crate::domains::confirmation::tokens::TokenCodec;
use crate::domains::notifications::models::NotificationChannel;
use crate::kernel::traits::{
    BaseCalendarSink, BaseClock, BaseNotificationSender, CalendarEventPayload, SendOutcome,
};
use crate::kernel::BaseAuditSink;
use crate::store::Store;

// =============================================================================
// TwilioService Adapter (implements BaseNotificationSender trait)
// =============================================================================

/// Wrapper around TwilioService that implements BaseNotificationSender
pub struct TwilioSender(pub Arc<TwilioService>);

impl TwilioSender {
    pub fn new(service: Arc<TwilioService>) -> Self {
        Self(service)
    }
}

#[async_trait]
impl BaseNotificationSender for TwilioSender {
    async fn send(
        &self,
        channel: NotificationChannel,
        to: &str,
        rendered: &str,
    ) -> Result<SendOutcome> {
        match channel {
            NotificationChannel::Sms => {
                let message = self
                    .0
                    .send_message(to, rendered)
                    .await
                    .map_err(|e| anyhow::anyhow!("{}", e))?;
                Ok(SendOutcome {
                    provider_id: Some(message.sid),
                })
            }
            NotificationChannel::Email => {
                // Email delivery runs through a separate provider that is not
                // wired up in this deployment.
                anyhow::bail!("email channel has no configured sender")
            }
        }
    }
}

/// Development fallback when Twilio credentials are absent: logs the message
/// instead of delivering it.
pub struct LogSender;

#[async_trait]
impl BaseNotificationSender for LogSender {
    async fn send(
        &self,
        channel: NotificationChannel,
        to: &str,
        rendered: &str,
    ) -> Result<SendOutcome> {
        tracing::info!(?channel, to, rendered, "LogSender: delivery skipped");
        Ok(SendOutcome { provider_id: None })
    }
}

// =============================================================================
// Webhook Calendar Sink (implements BaseCalendarSink trait)
// =============================================================================

/// Posts calendar events to a configured webhook endpoint. The real vendor
/// integration lives behind that endpoint; this process only speaks a small
/// JSON contract.
pub struct WebhookCalendarSink {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct CreatedEvent {
    event_id: String,
}

impl WebhookCalendarSink {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, base_url }
    }
}

#[async_trait]
impl BaseCalendarSink for WebhookCalendarSink {
    async fn create(&self, event: &CalendarEventPayload) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/events", self.base_url))
            .json(&serde_json::json!({
                "tenant_id": event.tenant_id,
                "slot_id": event.slot_id,
                "staff_id": event.staff_id,
                "summary": event.summary,
                "start_time": event.start_time,
                "end_time": event.end_time,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("calendar webhook error {}: {}", status, body);
        }

        let created: CreatedEvent = response.json().await?;
        Ok(created.event_id)
    }

    async fn delete(&self, external_event_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/events/{}", self.base_url, external_event_id))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("calendar webhook error {}: {}", status, body);
        }

        Ok(())
    }
}

/// Used when no calendar webhook is configured; every call succeeds without
/// side effects so the adapter path stays exercised.
pub struct NoopCalendarSink;

#[async_trait]
impl BaseCalendarSink for NoopCalendarSink {
    async fn create(&self, event: &CalendarEventPayload) -> Result<String> {
        Ok(format!("noop-{}", event.slot_id))
    }

    async fn delete(&self, _external_event_id: &str) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// EngineDeps
// =============================================================================

/// Engine dependencies accessible to domain actions (using traits for
/// testability)
#[derive(Clone)]
pub struct EngineDeps {
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn BaseClock>,
    pub tokens: Arc<TokenCodec>,
    pub sender: Arc<dyn BaseNotificationSender>,
    pub calendar: Arc<dyn BaseCalendarSink>,
    pub audit: Arc<dyn BaseAuditSink>,
    pub settings: EngineSettings,
}

impl EngineDeps {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn BaseClock>,
        tokens: Arc<TokenCodec>,
        sender: Arc<dyn BaseNotificationSender>,
        calendar: Arc<dyn BaseCalendarSink>,
        audit: Arc<dyn BaseAuditSink>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            clock,
            tokens,
            sender,
            calendar,
            audit,
            settings,
        }
    }
}
