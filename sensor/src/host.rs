use std::time::Duration;

use anyhow::Context;
use rand::{rngs::StdRng, Rng, RngExt, SeedableRng};
use rumqttc::AsyncClient;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use climate_common::{
    mqtt::{self, publish_json},
    round2, PresenceReading, SensorConfig, TemperatureReading, TOPIC_PRESENCE, TOPIC_TEMPERATURE,
};

// Slow room drift that bounces between the configured limits.
#[derive(Debug, Clone)]
struct TemperatureDrift {
    temp_c: f32,
    tendency_c: f32,
    noise_c: f32,
    min_c: f32,
    max_c: f32,
}

impl TemperatureDrift {
    fn new(config: &SensorConfig) -> Self {
        Self {
            temp_c: config.initial_temp_c,
            tendency_c: config.tendency_c,
            noise_c: config.noise_c,
            min_c: config.min_temp_c,
            max_c: config.max_temp_c,
        }
    }

    fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) -> f32 {
        self.temp_c += self.tendency_c;
        if self.noise_c > 0.0 {
            self.temp_c += rng.random_range(-self.noise_c..=self.noise_c);
        }
        if self.temp_c < self.min_c {
            self.temp_c = self.min_c;
            self.tendency_c = self.tendency_c.abs();
        } else if self.temp_c > self.max_c {
            self.temp_c = self.max_c;
            self.tendency_c = -self.tendency_c.abs();
        }
        round2(self.temp_c)
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let runtime = mqtt::load_runtime_config().context("failed to load runtime config")?;
    let (mqtt, mut eventloop) =
        AsyncClient::new(mqtt::mqtt_options("climate-sensor", &runtime), 32);
    let publish_timeout = Duration::from_millis(runtime.network.publish_timeout_ms);

    tokio::spawn(async move {
        loop {
            if let Err(err) = eventloop.poll().await {
                warn!("sensor mqtt poll error: {err}");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    });

    let mut tasks: Vec<JoinHandle<()>> = Vec::new();
    if runtime.sensor.presence_enabled {
        tasks.push(spawn_presence_loop(
            mqtt.clone(),
            &runtime.sensor,
            publish_timeout,
        ));
    }
    if runtime.sensor.temperature_enabled {
        tasks.push(spawn_temperature_loop(
            mqtt.clone(),
            &runtime.sensor,
            publish_timeout,
        ));
    }
    if tasks.is_empty() {
        warn!("all simulated sensors disabled in config");
    }

    info!("sensor simulator started");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    for task in tasks {
        task.abort();
        let _ = task.await;
    }
    if let Err(err) = mqtt.disconnect().await {
        warn!("mqtt disconnect failed: {err}");
    }
    info!("sensor simulator stopped");
    Ok(())
}

fn spawn_presence_loop(
    mqtt: AsyncClient,
    config: &SensorConfig,
    publish_timeout: Duration,
) -> JoinHandle<()> {
    let period = Duration::from_millis(config.presence_toggle_ms);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        let mut present = false;

        loop {
            interval.tick().await;
            present = !present;

            let reading = PresenceReading { present };
            match publish_json(&mqtt, TOPIC_PRESENCE, &reading, publish_timeout).await {
                Ok(()) => info!("presence: {present}"),
                Err(err) => warn!("presence publish failed: {err}"),
            }
        }
    })
}

fn spawn_temperature_loop(
    mqtt: AsyncClient,
    config: &SensorConfig,
    publish_timeout: Duration,
) -> JoinHandle<()> {
    let period = Duration::from_millis(config.temperature_interval_ms);
    let mut drift = TemperatureDrift::new(config);
    // ThreadRng is not Send, so the task owns a seeded StdRng instead.
    let mut rng = StdRng::seed_from_u64(rand::random());
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);

        loop {
            interval.tick().await;
            let celsius = drift.step(&mut rng);

            let reading = TemperatureReading { celsius };
            match publish_json(&mqtt, TOPIC_TEMPERATURE, &reading, publish_timeout).await {
                Ok(()) => debug!("temperature {celsius:.2}°C"),
                Err(err) => warn!("temperature publish failed: {err}"),
            }
        }
    })
}
