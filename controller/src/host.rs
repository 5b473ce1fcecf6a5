use std::{
    net::SocketAddr,
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use rumqttc::{AsyncClient, Event, Incoming, QoS};
use tokio::{net::TcpListener, sync::Mutex, task::JoinHandle};
use tracing::{debug, info, warn};

use climate_common::{
    decode_payload,
    mqtt::{self, publish_json},
    ClimateEngine, PresenceReading, TemperatureReading, Transition, TOPIC_AC_CMD,
    TOPIC_AC_STATE, TOPIC_PRESENCE, TOPIC_TEMPERATURE,
};

#[derive(Clone)]
struct AppState {
    engine: Arc<Mutex<ClimateEngine>>,
    mqtt: AsyncClient,
    publish_timeout: Duration,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let runtime = mqtt::load_runtime_config().context("failed to load runtime config")?;

    let engine = ClimateEngine::new(runtime.controller.clone());
    let (mqtt, eventloop) =
        AsyncClient::new(mqtt::mqtt_options("climate-controller", &runtime), 64);

    let app_state = AppState {
        engine: Arc::new(Mutex::new(engine)),
        mqtt,
        publish_timeout: Duration::from_millis(runtime.network.publish_timeout_ms),
    };

    spawn_mqtt_loop(app_state.clone(), eventloop);

    let boot = { app_state.engine.lock().await.boot_report() };
    publish_json(&app_state.mqtt, TOPIC_AC_STATE, &boot, app_state.publish_timeout)
        .await
        .context("failed to queue boot state report")?;
    info!("controller booted in state {}", boot.state.as_str());

    let control = spawn_control_loop(
        app_state.clone(),
        Duration::from_millis(runtime.controller.tick_interval_ms),
    );

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .with_state(app_state.clone());

    let port = std::env::var("CONTROLLER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller status server at {addr}"))?;

    info!("controller status on http://{addr}/api/status");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // No publishes may follow the disconnect.
    control.abort();
    let _ = control.await;
    if let Err(err) = app_state.mqtt.disconnect().await {
        warn!("mqtt disconnect failed: {err}");
    }
    info!("controller stopped");
    Ok(())
}

fn spawn_mqtt_loop(app_state: AppState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    handle_mqtt_message(&app_state, &message.topic, &message.payload).await;
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                    for topic in [TOPIC_TEMPERATURE, TOPIC_PRESENCE] {
                        if let Err(err) = app_state.mqtt.try_subscribe(topic, QoS::AtLeastOnce) {
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

fn spawn_control_loop(app_state: AppState, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let now_ms = monotonic_ms();

            let transition = {
                let mut engine = app_state.engine.lock().await;
                engine.tick(now_ms)
            };

            if let Some(transition) = transition {
                publish_transition(&app_state, transition).await;
            }
        }
    })
}

async fn publish_transition(app_state: &AppState, transition: Transition) {
    let Transition { command, report } = transition;
    info!(
        "state -> {} (temp {:?}, present {})",
        report.state.as_str(),
        report.temp,
        report.present
    );

    let timeout = app_state.publish_timeout;
    if let Err(err) = publish_json(&app_state.mqtt, TOPIC_AC_CMD, &command, timeout).await {
        warn!("command publish failed: {err}");
    }
    if let Err(err) = publish_json(&app_state.mqtt, TOPIC_AC_STATE, &report, timeout).await {
        warn!("state report publish failed: {err}");
    }
}

async fn handle_mqtt_message(app_state: &AppState, topic: &str, payload: &[u8]) {
    match topic {
        TOPIC_TEMPERATURE => match decode_payload::<TemperatureReading>(payload) {
            Ok(reading) => {
                let mut engine = app_state.engine.lock().await;
                if !engine.update_temperature(reading.celsius, monotonic_ms()) {
                    debug!("ignoring non-finite temperature {}", reading.celsius);
                }
            }
            Err(err) => debug!("dropping temperature message: {err}"),
        },
        TOPIC_PRESENCE => match decode_payload::<PresenceReading>(payload) {
            Ok(reading) => {
                let mut engine = app_state.engine.lock().await;
                engine.update_presence(reading.present);
            }
            Err(err) => debug!("dropping presence message: {err}"),
        },
        _ => {}
    }
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = {
        let engine = state.engine.lock().await;
        engine.status(monotonic_ms())
    };
    Json(status)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
