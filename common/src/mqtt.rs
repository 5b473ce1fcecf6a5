use std::time::Duration;

use rumqttc::{AsyncClient, MqttOptions, QoS};
use serde::Serialize;

use crate::{
    config::{self, RuntimeConfig},
    error::{ConfigError, PublishError},
};

pub fn load_runtime_config() -> Result<RuntimeConfig, ConfigError> {
    let data_dir = config::data_dir_from_env();
    let mut runtime = RuntimeConfig::load(&data_dir)?;
    runtime.network.apply_env();
    Ok(runtime)
}

pub fn mqtt_options(client_id: &str, runtime: &RuntimeConfig) -> MqttOptions {
    let network = &runtime.network;
    let mut options = MqttOptions::new(client_id, network.mqtt_host.clone(), network.mqtt_port);
    options.set_keep_alive(Duration::from_secs(60));
    if !network.mqtt_user.is_empty() {
        options.set_credentials(network.mqtt_user.clone(), network.mqtt_pass.clone());
    }
    options
}

// Every topic in the system is retained so late subscribers see the last value.
pub async fn publish_json<T: Serialize>(
    mqtt: &AsyncClient,
    topic: &str,
    payload: &T,
    timeout: Duration,
) -> Result<(), PublishError> {
    let body = serde_json::to_vec(payload)?;
    tokio::time::timeout(timeout, mqtt.publish(topic, QoS::AtLeastOnce, true, body))
        .await
        .map_err(|_| PublishError::Timeout {
            topic: topic.to_string(),
        })??;
    Ok(())
}
