//! R4N Bot
//!
//! Loads configuration, connects the notifier, starts the job poller and
//! serves the command surface until Ctrl-C.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use r4n_bot::api::{self, AppState};
use r4n_bot::config::Config;
use r4n_bot::repository::HttpStatusFetcher;
use r4n_bot::scheduler::{JobPoller, PollerConfig};
use r4n_bot::service::{
    JobRegistry, LogNotifier, Notifier, SubmissionService, UserSessions, WebhookNotifier,
};
use r4n_client::EurocoreClient;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = load_config()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting R4N Bot");
    info!(
        "Loaded configuration: eurocore_url={}, bind_addr={}",
        config.eurocore_url, config.bind_addr
    );

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let client = Arc::new(EurocoreClient::with_client(
        config.eurocore_url.clone(),
        http.clone(),
    ));

    let notifier: Arc<dyn Notifier> = match &config.webhook_url {
        Some(url) => {
            info!("Delivering job views through webhook");
            Arc::new(WebhookNotifier::new(http, url.clone()))
        }
        None => {
            info!("No webhook configured, logging job views");
            Arc::new(LogNotifier)
        }
    };

    // Initialize services
    let registry = JobRegistry::new();
    let sessions = Arc::new(UserSessions::new(client.clone()));
    let submissions = Arc::new(SubmissionService::new(
        client.clone(),
        sessions.clone(),
        registry.clone(),
        notifier.clone(),
    ));

    info!("Services initialized");

    // The poller idles until the notifier is connected
    let (ready_tx, ready_rx) = watch::channel(false);
    let poller = JobPoller::new(
        registry.clone(),
        Arc::new(HttpStatusFetcher::new(client)),
        notifier.clone(),
        PollerConfig::from(&config),
        ready_rx,
    );
    poller.start();

    let connect = tokio::spawn(async move {
        match connect_with_retry(notifier.as_ref()).await {
            Ok(()) => {
                ready_tx.send_replace(true);
            }
            Err(e) => error!("Notifier unavailable, job polling stays paused: {:#}", e),
        }
    });

    let app = api::create_router(AppState {
        sessions,
        submissions,
        registry,
    });

    info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    connect.abort();
    poller.stop().await;
    info!("R4N Bot stopped");

    Ok(())
}

/// Loads configuration from `.env` and environment variables
fn load_config() -> Result<Config> {
    let config = Config::from_env()?;
    config.validate()?;
    Ok(config)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        return;
    }
    info!("Shutdown requested");
}

/// Connect to the notifier with retry logic and exponential backoff
///
/// The chat service may not be reachable yet when the bot starts.
async fn connect_with_retry(notifier: &dyn Notifier) -> Result<()> {
    const MAX_RETRIES: u32 = 10;
    const INITIAL_DELAY_MS: u64 = 500;
    const MAX_DELAY_MS: u64 = 30_000;

    let mut attempt = 0;
    let mut delay_ms = INITIAL_DELAY_MS;

    loop {
        attempt += 1;

        match notifier.connect().await {
            Ok(()) => {
                info!("Notifier connected after {} attempt(s)", attempt);
                return Ok(());
            }
            Err(e) => {
                if attempt >= MAX_RETRIES {
                    return Err(anyhow::anyhow!(
                        "Failed to connect notifier after {} attempts: {}",
                        MAX_RETRIES,
                        e
                    ));
                }

                warn!(
                    "Failed to connect notifier (attempt {}/{}): {}",
                    attempt, MAX_RETRIES, e
                );
                warn!("Retrying in {} ms...", delay_ms);

                tokio::time::sleep(Duration::from_millis(delay_ms)).await;

                // Exponential backoff with cap
                delay_ms = (delay_ms * 2).min(MAX_DELAY_MS);
            }
        }
    }
}
