use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// HMAC secret for confirm/decline tokens
    pub token_secret: String,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_messaging_service_sid: Option<String>,
    pub twilio_from_number: Option<String>,
    /// Endpoint the calendar sink posts events to
    pub calendar_webhook_url: Option<String>,
    pub engine: EngineSettings,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            token_secret: env::var("TOKEN_SECRET").context("TOKEN_SECRET must be set")?,
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").ok(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").ok(),
            twilio_messaging_service_sid: env::var("TWILIO_MESSAGING_SERVICE_SID").ok(),
            twilio_from_number: env::var("TWILIO_FROM_NUMBER").ok(),
            calendar_webhook_url: env::var("CALENDAR_WEBHOOK_URL").ok(),
            engine: EngineSettings::from_env()?,
        })
    }
}

/// Tunable knobs for the matching engine. Read-only during a transition.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// How long a held slot stays reserved for the notified candidate
    pub hold_ttl_minutes: i64,
    /// Validity window for signed confirm/decline tokens. Must outlive the
    /// hold so a customer who clicks right at expiry gets a precise
    /// "hold expired" answer instead of a generic token error.
    pub confirm_token_ttl_seconds: i64,
    /// Hold ticker cadence
    pub ticker_interval_seconds: u64,
    /// Max candidates tried per cascade step to tolerate stale entries
    pub cascade_fanout_k: usize,
    /// Per-tenant cap on simultaneous active/notified entries for one phone
    pub max_active_entries_per_phone: i64,
    /// Send retries within the hold window
    pub notification_retry_attempts: u32,
    /// Base backoff between send retries; doubled per attempt, with jitter
    pub notification_retry_backoff_ms: u64,
    /// When false the calendar sink is bypassed entirely
    pub calendar_enabled: bool,
    /// Base URL rendered into confirm/decline links
    pub respond_base_url: String,
}

impl EngineSettings {
    pub fn from_env() -> Result<Self> {
        let hold_ttl_minutes = parse_or("HOLD_TTL_MINUTES", 10)?;

        Ok(Self {
            hold_ttl_minutes,
            confirm_token_ttl_seconds: parse_or(
                "CONFIRM_TOKEN_TTL_SECONDS",
                hold_ttl_minutes * 60 + 300,
            )?,
            ticker_interval_seconds: parse_or("TICKER_INTERVAL_SECONDS", 30)?,
            cascade_fanout_k: parse_or("CASCADE_FANOUT_K", 5)?,
            max_active_entries_per_phone: parse_or("MAX_ACTIVE_ENTRIES_PER_PHONE", 3)?,
            notification_retry_attempts: parse_or("NOTIFICATION_RETRY_ATTEMPTS", 3)?,
            notification_retry_backoff_ms: parse_or("NOTIFICATION_RETRY_BACKOFF_MS", 250)?,
            calendar_enabled: env::var("CALENDAR_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            respond_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
        })
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            hold_ttl_minutes: 10,
            confirm_token_ttl_seconds: 10 * 60 + 300,
            ticker_interval_seconds: 30,
            cascade_fanout_k: 5,
            max_active_entries_per_phone: 3,
            notification_retry_attempts: 3,
            notification_retry_backoff_ms: 250,
            calendar_enabled: true,
            respond_base_url: "http://localhost:8080".to_string(),
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a valid number", key)),
        Err(_) => Ok(default),
    }
}
