//! Test doubles for the injected abstractions.
//!
//! Compiled into the lib so integration tests under `tests/` can assemble a
//! full engine over the in-memory store without a database, a provider
//! account, or the wall clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::config::EngineSettings;
use crate::domains::audit::StoreAuditSink;
use crate::domains::confirmation::tokens::TokenCodec;
use crate::domains::notifications::models::NotificationChannel;
use crate::kernel::deps::EngineDeps;
use crate::kernel::traits::{
    BaseCalendarSink, BaseClock, BaseNotificationSender, CalendarEventPayload, SendOutcome,
};
use crate::store::MemoryStore;

// =============================================================================
// ManualClock
// =============================================================================

/// A clock that only moves when the test says so.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl BaseClock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// =============================================================================
// RecordingSender
// =============================================================================

/// A delivered (or attempted) message captured by [`RecordingSender`].
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub channel: NotificationChannel,
    pub to: String,
    pub rendered: String,
}

/// Records every send; can be told to fail the next N attempts to exercise
/// the dispatcher's retry path.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<SentMessage>>,
    fail_next: AtomicUsize,
}

impl RecordingSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `n` send attempts fail.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl BaseNotificationSender for RecordingSender {
    async fn send(
        &self,
        channel: NotificationChannel,
        to: &str,
        rendered: &str,
    ) -> Result<SendOutcome> {
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("simulated provider outage");
        }

        self.sent.lock().unwrap().push(SentMessage {
            channel,
            to: to.to_string(),
            rendered: rendered.to_string(),
        });
        Ok(SendOutcome {
            provider_id: Some(format!("test-msg-{}", self.sent_count())),
        })
    }
}

// =============================================================================
// RecordingCalendarSink
// =============================================================================

#[derive(Debug, Clone)]
pub enum CalendarCall {
    Create { summary: String },
    Delete { external_event_id: String },
}

/// Records calendar calls; can be told to fail creates to exercise the
/// error-row + reconciler path.
#[derive(Default)]
pub struct RecordingCalendarSink {
    calls: Mutex<Vec<CalendarCall>>,
    fail_creates: AtomicUsize,
    counter: AtomicUsize,
}

impl RecordingCalendarSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next_creates(&self, n: usize) {
        self.fail_creates.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<CalendarCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseCalendarSink for RecordingCalendarSink {
    async fn create(&self, event: &CalendarEventPayload) -> Result<String> {
        let remaining = self.fail_creates.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_creates.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("simulated calendar outage");
        }

        self.calls.lock().unwrap().push(CalendarCall::Create {
            summary: event.summary.clone(),
        });
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("ext-evt-{}", n))
    }

    async fn delete(&self, external_event_id: &str) -> Result<()> {
        self.calls.lock().unwrap().push(CalendarCall::Delete {
            external_event_id: external_event_id.to_string(),
        });
        Ok(())
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// Fully-wired engine over the in-memory store, with handles to every
/// double so tests can steer and inspect them.
pub struct TestDependencies {
    pub deps: EngineDeps,
    pub store: MemoryStore,
    pub clock: Arc<ManualClock>,
    pub sender: Arc<RecordingSender>,
    pub calendar: Arc<RecordingCalendarSink>,
}

impl TestDependencies {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_settings(now, EngineSettings::default())
    }

    pub fn with_settings(now: DateTime<Utc>, settings: EngineSettings) -> Self {
        let store = MemoryStore::new();
        let clock = ManualClock::at(now);
        let sender = RecordingSender::new();
        let calendar = RecordingCalendarSink::new();
        let store_arc: Arc<dyn crate::store::Store> = Arc::new(store.clone());

        let deps = EngineDeps::new(
            store_arc.clone(),
            clock.clone(),
            Arc::new(TokenCodec::new("test_secret_key", "bookline-test".into())),
            sender.clone(),
            calendar.clone(),
            Arc::new(StoreAuditSink::new(store_arc)),
            settings,
        );

        Self {
            deps,
            store,
            clock,
            sender,
            calendar,
        }
    }
}
