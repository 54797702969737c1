//! Bus consumer (C9): polls the NSP notification topic and drives
//! normalize → lifecycle-apply per message.
//!
//! The upstream's own configuration vocabulary (`security.protocol=SSL`,
//! `ssl.keystore.location`, `group.id`, `auto.offset.reset=latest`) is
//! librdkafka's, so this is built directly on `rdkafka::StreamConsumer`
//! rather than a generic message-bus trait.

use crate::config::BusConfig;
use crate::error::Result;
use crate::model::RootAlarmContext;
use crate::normalizer;
use crate::store::AlarmStore;
use chrono_tz::Tz;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::Message;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

pub fn build_consumer(bus: &BusConfig, hostname: &str) -> Result<StreamConsumer> {
    let group_id = format!("{}-{hostname}", bus.group_id);
    let consumer: StreamConsumer = ClientConfig::new()
        .set("group.id", &group_id)
        .set("security.protocol", "SSL")
        .set("ssl.keystore.location", &bus.keystore_path)
        .set("ssl.keystore.password", &bus.keystore_password)
        .set("ssl.ca.location", &bus.ca_path)
        .set("auto.offset.reset", "latest")
        .create()?;
    Ok(consumer)
}

/// Run the poll loop against `topic` until `cancel` fires. No message's
/// handling blocks the loop from reaching the next poll: decode, normalize,
/// and store-apply failures are each logged and the loop continues.
pub async fn run(
    consumer: StreamConsumer,
    topic: &str,
    store: &AlarmStore,
    tz: &Tz,
    poll_timeout: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    consumer.subscribe(&[topic])?;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            res = tokio::time::timeout(poll_timeout, consumer.recv()) => res,
        };

        let message = match received {
            Err(_elapsed) => continue, // no message within the poll window
            Ok(Err(e)) => {
                warn!(error = %e, "bus poll error");
                continue;
            }
            Ok(Ok(msg)) => msg,
        };

        let payload = match message.payload() {
            Some(p) => p,
            None => continue,
        };

        let envelope: serde_json::Value = match serde_json::from_slice(payload) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "failed to decode bus payload as JSON");
                continue;
            }
        };

        let (power_ctx, los_ctx) = match fetch_context(store).await {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(error = %e, "context query failed, dropping message");
                continue;
            }
        };

        let alarm = normalizer::normalize(&envelope, tz, &power_ctx, &los_ctx);

        let Some(alarm) = alarm else {
            debug!("message normalized to no record (dropped or structurally invalid)");
            continue;
        };

        if let Err(e) = store.apply(&alarm).await {
            error!(error = %e, alarm_id = ?alarm.alarm_id, "lifecycle apply failed");
        }
    }

    Ok(())
}

async fn fetch_context(store: &AlarmStore) -> Result<(Vec<RootAlarmContext>, Vec<RootAlarmContext>)> {
    let power = store.active_power_issues().await?;
    let los = store.active_los_roots().await?;
    Ok((power, los))
}
