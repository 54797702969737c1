//! Supervisor (C10): owns startup order, the renewal ticker, the bus
//! consumer, and idempotent graceful teardown.

use crate::bus;
use crate::config::NspConfig;
use crate::error::Result;
use crate::session::Session;
use crate::store::AlarmStore;
use crate::subscription::SubscriptionManager;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Daily tick for [`AlarmStore::sweep_history`].
const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct Supervisor {
    config: NspConfig,
    torn_down: AtomicBool,
}

impl Supervisor {
    pub fn new(config: NspConfig) -> Self {
        Self {
            config,
            torn_down: AtomicBool::new(false),
        }
    }

    /// Run until a shutdown signal arrives or the bus consumer returns.
    /// Exits non-zero (by returning `Err`) only on fatal startup failures.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let session = Arc::new(Session::new(&self.config.server.host, &self.config.server)?);
        let subscriptions = Arc::new(SubscriptionManager::new(
            &self.config.server.host,
            self.config.server.http_timeout_secs,
            self.config.server.verify_ssl,
        )?);
        let store = AlarmStore::connect(&self.config.database.url).await?;
        let tz: chrono_tz::Tz = self
            .config
            .pipeline
            .timezone
            .parse()
            .expect("validated at config load time");

        let handle = subscriptions.create(&session).await?;
        info!(subscription_id = %handle.subscription_id, topic_id = %handle.topic_id, "subscription created");

        let cancel = CancellationToken::new();

        let renewal_task = {
            let cancel = cancel.clone();
            let subscriptions = subscriptions.clone();
            let session = session.clone();
            let subscription_id = handle.subscription_id.clone();
            let interval = Duration::from_secs(self.config.pipeline.renewal_interval_secs);
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(interval) => {
                            if let Err(e) = subscriptions.renew(&session, &subscription_id).await {
                                warn!(error = %e, "subscription renewal failed");
                            }
                        }
                    }
                }
            })
        };

        let retention_task = {
            let cancel = cancel.clone();
            let store = store.clone();
            let retention_days = self.config.database.history_retention_days;
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RETENTION_SWEEP_INTERVAL) => {
                            match store.sweep_history(retention_days).await {
                                Ok(rows) => info!(rows, retention_days, "retention sweep completed"),
                                Err(e) => warn!(error = %e, "retention sweep failed"),
                            }
                        }
                    }
                }
            })
        };

        let hostname = hostname();
        let consumer_task = {
            let cancel = cancel.clone();
            let store = store.clone();
            let bus_config = self.config.bus.clone();
            let topic = handle.topic_id.clone();
            let poll_timeout = Duration::from_millis(bus_config.poll_timeout_ms);
            tokio::spawn(async move {
                let consumer = match bus::build_consumer(&bus_config, &hostname) {
                    Ok(c) => c,
                    Err(e) => {
                        error!(error = %e, "failed to build bus consumer");
                        return;
                    }
                };
                if let Err(e) = bus::run(consumer, &topic, &store, &tz, poll_timeout, cancel).await {
                    error!(error = %e, "bus consumer exited with error");
                }
            })
        };

        let mut consumer_task = consumer_task;
        let consumer_already_finished;
        tokio::select! {
            _ = wait_for_shutdown_signal() => {
                info!("shutdown signal received");
                consumer_already_finished = false;
            }
            _ = &mut consumer_task => {
                info!("bus consumer returned, shutting down");
                consumer_already_finished = true;
            }
        }

        cancel.cancel();
        let _ = renewal_task.await;
        let _ = retention_task.await;
        if !consumer_already_finished {
            let _ = consumer_task.await;
        }

        self.teardown(&session, &subscriptions, &handle.subscription_id).await;
        Ok(())
    }

    /// Idempotent: safe to call more than once (signal path and
    /// unhandled-error path both reach it).
    async fn teardown(&self, session: &Session, subscriptions: &SubscriptionManager, subscription_id: &str) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Err(e) = subscriptions.delete(session, subscription_id).await {
            warn!(error = %e, "subscription delete failed during teardown");
        }
        if let Err(e) = session.revoke().await {
            warn!(error = %e, "session revoke failed during teardown");
        }
    }
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".to_string())
}
