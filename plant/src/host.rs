use std::{sync::Arc, time::Duration};

use anyhow::Context;
use rumqttc::{AsyncClient, Event, Incoming, QoS};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info, warn};

use climate_common::{
    decode_payload,
    mqtt::{self, publish_json},
    AcCommandPatch, TemperatureReading, ThermalPlant, TOPIC_AC_CMD, TOPIC_TEMPERATURE,
};

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let runtime = mqtt::load_runtime_config().context("failed to load runtime config")?;

    let plant = Arc::new(Mutex::new(ThermalPlant::new(runtime.plant.clone())));
    let (mqtt, eventloop) = AsyncClient::new(mqtt::mqtt_options("climate-plant", &runtime), 32);

    spawn_mqtt_loop(plant.clone(), mqtt.clone(), eventloop);
    let simulation = spawn_simulation_loop(
        plant,
        mqtt.clone(),
        Duration::from_millis(runtime.plant.tick_interval_ms),
        Duration::from_millis(runtime.network.publish_timeout_ms),
    );

    info!(
        "plant simulator started at {:.2}°C, outside {:.2}°C",
        runtime.plant.initial_temp_c, runtime.plant.outside_temp_c
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    simulation.abort();
    let _ = simulation.await;
    if let Err(err) = mqtt.disconnect().await {
        warn!("mqtt disconnect failed: {err}");
    }
    info!("plant simulator stopped");
    Ok(())
}

fn spawn_mqtt_loop(
    plant: Arc<Mutex<ThermalPlant>>,
    mqtt: AsyncClient,
    mut eventloop: rumqttc::EventLoop,
) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if message.topic != TOPIC_AC_CMD {
                        continue;
                    }
                    match decode_payload::<AcCommandPatch>(&message.payload) {
                        Ok(patch) => {
                            let mut plant = plant.lock().await;
                            if plant.apply_command(&patch) {
                                info!("command now {:?}", plant.command());
                            }
                        }
                        Err(err) => debug!("dropping command message: {err}"),
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                    // Retained command replays the last decision after a restart.
                    if let Err(err) = mqtt.try_subscribe(TOPIC_AC_CMD, QoS::AtLeastOnce) {
                        warn!("subscribe to {TOPIC_AC_CMD} failed: {err}");
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

fn spawn_simulation_loop(
    plant: Arc<Mutex<ThermalPlant>>,
    mqtt: AsyncClient,
    period: Duration,
    publish_timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let celsius = { plant.lock().await.step() };
            let reading = TemperatureReading { celsius };
            match publish_json(&mqtt, TOPIC_TEMPERATURE, &reading, publish_timeout).await {
                Ok(()) => debug!("temperature {celsius:.2}°C"),
                Err(err) => warn!("temperature publish failed: {err}"),
            }
        }
    })
}
