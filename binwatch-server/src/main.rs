//! Background service that watches bin fullness notifications and texts contacts
//! when a bin is nearly full.

mod config;
mod health;

use std::future;
use std::sync::Arc;

use anyhow::{Context, Result};
use binwatch_core::{Dispatcher, watch};
use binwatch_provider_firestore as firestore;
use binwatch_provider_twilio::TwilioSmsSender;
use reqwest::Client;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::ServiceConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    let config = ServiceConfig::from_env().context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .init();

    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env file"),
        Err(err) if err.not_found() => {}
        Err(err) => warn!(error = %err, "Ignoring unreadable .env file"),
    }
    info!(?config, "Starting binwatch");

    // HTTP + port setup
    let http = Client::builder()
        .user_agent(concat!("binwatch/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let ports = firestore::ports(
        http.clone(),
        &config.firebase_service_account_key,
        &config.firestore_base_url,
        config.poll_interval(),
    )
    .context("invalid FIREBASE_SERVICE_ACCOUNT_KEY")?;
    let sender = Arc::new(TwilioSmsSender::new(http, config.twilio()));
    let policy = config
        .dispatch_policy()
        .context("invalid ALERT_THRESHOLD")?;
    let mut dispatcher = Dispatcher::new(ports.contacts, sender, policy);

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    info!(port = config.port, "Server running");

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    // Watcher runs until cancelled and hands the dispatcher back for draining
    let feed = ports.feed;
    let resubscribe_delay = config.poll_interval();
    let watcher_cancel = cancel.clone();
    let watcher = tokio::spawn(async move {
        watch(feed.as_ref(), &mut dispatcher, resubscribe_delay, watcher_cancel).await;
        dispatcher
    });

    let server_cancel = cancel.clone();
    let served = axum::serve(listener, health::router())
        .with_graceful_shutdown(async move { server_cancel.cancelled().await })
        .await;
    cancel.cancel();

    let dispatcher = watcher.await.context("notification watcher panicked")?;
    dispatcher.drain(config.shutdown_timeout()).await;
    served.context("liveness listener failed")?;

    info!("binwatch stopped");
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Error setting up signal handler: {}", err);
            future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal as unix_signal};

        match unix_signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Error setting up SIGTERM handler: {}", err);
                future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received shutdown signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }
    cancel.cancel();
}
