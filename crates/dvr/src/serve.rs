// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `dvr serve` command implementation.
//!
//! Opens the SQLite store, builds the loopback tuner and the channel
//! directory from configuration, and runs the scheduler until SIGINT or
//! SIGTERM cancels it.

use std::sync::Arc;
use std::time::Duration;

use dvr_config::DvrConfig;
use dvr_core::{DvrError, StaticChannels};
use dvr_scheduler::{DvrService, SchedulerSettings};
use dvr_storage::SqliteRecordingStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::loopback::LoopbackTuner;

/// Runs the `dvr serve` command.
pub async fn run_serve(config: DvrConfig) -> Result<(), DvrError> {
    init_tracing(&config.daemon.log_level);

    info!(name = %config.daemon.name, "starting dvr serve");

    let store = SqliteRecordingStore::new(config.storage.clone());
    store.initialize().await?;
    if config.storage.change_poll_ms > 0 {
        store
            .watch_external_writes(Duration::from_millis(config.storage.change_poll_ms))
            .await?;
    }
    info!(path = %config.storage.database_path, "recording store ready");

    let inputs = config.tuner_inputs();
    if inputs.is_empty() {
        warn!("no [[inputs]] configured, every recording will fail to acquire a tuner");
    }
    let tuner = Arc::new(LoopbackTuner::new(inputs));
    let channels = Arc::new(StaticChannels::new(config.channel_directory()));
    info!(
        inputs = config.inputs.len(),
        channels = channels.len(),
        "loopback tuner ready"
    );

    let cancel = install_signal_handler()?;
    let service = DvrService::builder(Arc::new(store), tuner, channels)
        .settings(SchedulerSettings::from_config(&config))
        .cancel_token(cancel)
        .spawn();

    let handle = service.handle();
    let cancel = service.cancel_token();
    tokio::select! {
        initialized = handle.initialized() => {
            initialized?;
            let recordings = handle.all_scheduled_recordings().await?;
            let next_wake_ms = handle.next_wake_ms().await?;
            info!(
                recordings = recordings.len(),
                next_wake_ms = ?next_wake_ms,
                "scheduler initialized"
            );
        }
        () = cancel.cancelled() => {
            debug!("cancelled before initialization finished");
        }
    }

    service.wait().await;
    info!("dvr serve shutdown complete");
    Ok(())
}

/// Installs handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is
/// received.
fn install_signal_handler() -> Result<CancellationToken, DvrError> {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    #[cfg(unix)]
    let mut sigterm = {
        use tokio::signal::unix::{SignalKind, signal};
        signal(SignalKind::terminate())
            .map_err(|e| DvrError::Internal(format!("failed to install SIGTERM handler: {e}")))?
    };

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            tokio::select! {
                _ = ctrl_c => {
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    Ok(token)
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "dvr={log_level},dvr_scheduler={log_level},dvr_storage={log_level},warn"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
