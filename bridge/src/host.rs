use std::time::Duration;

use anyhow::{bail, Context};
use rumqttc::{AsyncClient, Event, Incoming, QoS};
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use climate_common::{
    decode_payload,
    mqtt::{self, publish_json},
    AcStateReport, PayloadError, PresenceReading, TemperatureReading, TOPIC_AC_CMD,
    TOPIC_AC_STATE, TOPIC_PRESENCE, TOPIC_TEMPERATURE,
};

use crate::{
    remote::{BlynkClient, RemoteApi},
    sync::{BridgeSync, LocalPublish, LocalUpdate},
};

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut runtime = mqtt::load_runtime_config().context("failed to load runtime config")?;
    if let Ok(token) = std::env::var("BLYNK_TOKEN") {
        runtime.bridge.token = token;
    }
    if let Ok(base_url) = std::env::var("BLYNK_BASE_URL") {
        runtime.bridge.base_url = base_url;
    }
    runtime.bridge.sanitize();

    if runtime.bridge.token.trim().is_empty() {
        bail!("BLYNK_TOKEN (or bridge.token in runtime.json) must be set");
    }

    let remote = BlynkClient::new(
        &runtime.bridge.base_url,
        &runtime.bridge.token,
        Duration::from_millis(runtime.bridge.request_timeout_ms),
    )
    .context("failed to build dashboard http client")?;

    let (mqtt, eventloop) = AsyncClient::new(mqtt::mqtt_options("climate-bridge", &runtime), 64);
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();

    spawn_mqtt_loop(mqtt.clone(), eventloop, updates_tx);
    let worker = spawn_sync_loop(
        BridgeSync::new(remote),
        mqtt.clone(),
        updates_rx,
        Duration::from_millis(runtime.bridge.poll_interval_ms),
        Duration::from_millis(runtime.network.publish_timeout_ms),
    );

    info!("bridge running against {}", runtime.bridge.base_url);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    worker.abort();
    let _ = worker.await;
    if let Err(err) = mqtt.disconnect().await {
        warn!("mqtt disconnect failed: {err}");
    }
    info!("bridge stopped");
    Ok(())
}

fn decode_update(topic: &str, payload: &[u8]) -> Option<Result<LocalUpdate, PayloadError>> {
    let update = match topic {
        TOPIC_TEMPERATURE => decode_payload::<TemperatureReading>(payload)
            .map(LocalUpdate::Temperature),
        TOPIC_PRESENCE => decode_payload::<PresenceReading>(payload).map(LocalUpdate::Presence),
        TOPIC_AC_STATE => decode_payload::<AcStateReport>(payload).map(LocalUpdate::State),
        _ => return None,
    };
    Some(update)
}

fn spawn_mqtt_loop(
    mqtt: AsyncClient,
    mut eventloop: rumqttc::EventLoop,
    updates: UnboundedSender<LocalUpdate>,
) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    match decode_update(&message.topic, &message.payload) {
                        Some(Ok(update)) => {
                            if updates.send(update).is_err() {
                                debug!("sync worker gone, dropping update");
                            }
                        }
                        Some(Err(err)) => debug!("dropping {} message: {err}", message.topic),
                        None => {}
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                    for topic in [TOPIC_TEMPERATURE, TOPIC_PRESENCE, TOPIC_AC_STATE] {
                        if let Err(err) = mqtt.try_subscribe(topic, QoS::AtLeastOnce) {
                            warn!("subscribe to {topic} failed: {err}");
                        }
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

fn spawn_sync_loop<R>(
    mut sync: BridgeSync<R>,
    mqtt: AsyncClient,
    mut updates: UnboundedReceiver<LocalUpdate>,
    poll_period: Duration,
    publish_timeout: Duration,
) -> JoinHandle<()>
where
    R: RemoteApi + Send + Sync + 'static,
{
    tokio::spawn(async move {
        sync.seed().await;
        info!("dashboard cache seeded");

        let mut interval = tokio::time::interval(poll_period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately and would re-read what seeding just read.
        interval.tick().await;

        loop {
            tokio::select! {
                Some(update) = updates.recv() => {
                    if sync.push_local(update).await {
                        debug!("dashboard updated from {update:?}");
                    }
                }
                _ = interval.tick() => {
                    for publish in sync.poll_remote().await {
                        match publish {
                            LocalPublish::Presence(reading) => {
                                match publish_json(&mqtt, TOPIC_PRESENCE, &reading, publish_timeout).await {
                                    Ok(()) => info!("dashboard presence override: {}", reading.present),
                                    Err(err) => warn!("presence override not published: {err}"),
                                }
                            }
                            LocalPublish::Command(patch) => {
                                match publish_json(&mqtt, TOPIC_AC_CMD, &patch, publish_timeout).await {
                                    Ok(()) => {
                                        info!("dashboard command override: {patch:?}");
                                        sync.mark_published(patch);
                                    }
                                    Err(err) => warn!("command override not published: {err}"),
                                }
                            }
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_payloads_by_topic() {
        let update = decode_update(TOPIC_PRESENCE, br#"{"present":true}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            update,
            LocalUpdate::Presence(PresenceReading { present: true })
        );

        let update = decode_update(
            TOPIC_AC_STATE,
            br#"{"state":"COOL","temp":27.5,"present":true,"reason":"rule"}"#,
        )
        .unwrap()
        .unwrap();
        assert!(matches!(update, LocalUpdate::State(report) if report.temp == Some(27.5)));

        assert!(decode_update(TOPIC_TEMPERATURE, b"{}").unwrap().is_err());
        assert!(decode_update(TOPIC_AC_CMD, br#"{"power":"on"}"#).is_none());
    }
}
