// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The serve loop: storage, dispatcher, queue sweeper, and gateway
//! wired together with graceful shutdown.

use std::sync::Arc;

use forecourt_config::ForecourtConfig;
use forecourt_core::{ForecourtError, MessagingProvider};
use forecourt_dispatch::{Dispatcher, QueueSweeper};
use forecourt_gateway::GatewayState;
use forecourt_storage::Database;
use forecourt_twilio::TwilioProvider;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &ForecourtConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.service.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub async fn run(config: ForecourtConfig) -> Result<(), ForecourtError> {
    init_tracing(&config);
    info!(
        service = %config.service.name,
        environment = ?config.service.environment,
        "starting"
    );

    let db = Database::open(&config.storage.database_path).await?;

    let provider: Arc<dyn MessagingProvider> = match TwilioProvider::from_config(&config.twilio)
    {
        Some(provider) => Arc::new(provider),
        None => {
            return Err(ForecourtError::Config(
                "twilio.account_sid is required to serve".to_string(),
            ));
        }
    };

    let dispatcher = Arc::new(Dispatcher::new(db.clone(), provider, &config));

    // Anything stranded in `sending` by a previous crash is requeued and
    // dispatched again before the gateway accepts traffic; redelivery is
    // safe because the provider was never confirmed to have accepted.
    let cutoff = chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string();
    let recovered = dispatcher.recover_stale_sends(&cutoff).await?;
    if recovered > 0 {
        warn!(recovered, "recovered in-flight messages from previous run");
    }

    let shutdown = CancellationToken::new();

    let sweeper = QueueSweeper::new(dispatcher.clone(), &config);
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown.clone()));

    let state = GatewayState {
        dispatcher,
        config: Arc::new(config),
    };
    let gateway_shutdown = shutdown.clone();
    let gateway_handle = tokio::spawn(forecourt_gateway::serve(state, gateway_shutdown));

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| ForecourtError::Internal(format!("failed to listen for ctrl-c: {e}")))?;
    info!("shutdown signal received");
    shutdown.cancel();

    if let Err(e) = sweeper_handle.await {
        warn!(error = %e, "sweeper task join failed");
    }
    match gateway_handle.await {
        Ok(result) => result?,
        Err(e) => warn!(error = %e, "gateway task join failed"),
    }

    db.close().await?;
    info!("shutdown complete");
    Ok(())
}
