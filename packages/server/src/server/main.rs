// Main entry point for the waitlist engine API server

use std::sync::Arc;

use anyhow::{Context, Result};
use server_core::domains::audit::StoreAuditSink;
use server_core::domains::confirmation::tokens::TokenCodec;
use server_core::kernel::deps::{
    EngineDeps, LogSender, NoopCalendarSink, TwilioSender, WebhookCalendarSink,
};
use server_core::kernel::scheduled_tasks::start_scheduler;
use server_core::kernel::traits::{BaseCalendarSink, BaseNotificationSender};
use server_core::kernel::SystemClock;
use server_core::server::build_app;
use server_core::store::{PgStore, Store};
use server_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use twilio::{TwilioOptions, TwilioService};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting waitlist engine API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // Wire dependencies
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool.clone()));

    let sender: Arc<dyn BaseNotificationSender> = match (
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
    ) {
        (Some(account_sid), Some(auth_token)) => {
            let twilio = TwilioService::new(TwilioOptions {
                account_sid,
                auth_token,
                messaging_service_sid: config.twilio_messaging_service_sid.clone(),
                from_number: config.twilio_from_number.clone(),
            });
            Arc::new(TwilioSender::new(Arc::new(twilio)))
        }
        _ => {
            tracing::warn!("Twilio credentials absent; using LogSender");
            Arc::new(LogSender)
        }
    };

    let calendar: Arc<dyn BaseCalendarSink> = match config.calendar_webhook_url.clone() {
        Some(url) => Arc::new(WebhookCalendarSink::new(url)),
        None => {
            tracing::warn!("CALENDAR_WEBHOOK_URL absent; using NoopCalendarSink");
            Arc::new(NoopCalendarSink)
        }
    };

    let deps = EngineDeps::new(
        store.clone(),
        Arc::new(SystemClock),
        Arc::new(TokenCodec::new(&config.token_secret, "bookline".into())),
        sender,
        calendar,
        Arc::new(StoreAuditSink::new(store)),
        config.engine.clone(),
    );

    // Start background workers
    let _scheduler = start_scheduler(deps.clone())
        .await
        .context("Failed to start scheduled tasks")?;

    // Build application
    let app = build_app(deps, pool);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
