use std::{io::ErrorKind, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub setpoint_c: f32,
    pub on_at_c: f32,
    pub hysteresis_c: f32,
    pub min_off_ms: u64,
    pub tick_interval_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            setpoint_c: 24.0,
            on_at_c: 28.0,
            hysteresis_c: 0.5,
            min_off_ms: 120_000,
            tick_interval_ms: 1_000,
        }
    }
}

impl ControllerConfig {
    pub fn sanitize(&mut self) {
        self.setpoint_c = self.setpoint_c.clamp(16.0, 30.0);
        self.hysteresis_c = self.hysteresis_c.clamp(0.1, 5.0);
        if self.on_at_c < self.setpoint_c {
            self.on_at_c = self.setpoint_c;
        }
        self.tick_interval_ms = self.tick_interval_ms.max(100);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantConfig {
    pub initial_temp_c: f32,
    pub outside_temp_c: f32,
    pub cool_rate_c: f32,
    pub sleep_rate_c: f32,
    pub leak_rate_c: f32,
    pub tick_interval_ms: u64,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            initial_temp_c: 30.0,
            outside_temp_c: 31.0,
            cool_rate_c: 0.25,
            sleep_rate_c: 0.08,
            leak_rate_c: 0.02,
            tick_interval_ms: 1_000,
        }
    }
}

impl PlantConfig {
    pub fn sanitize(&mut self) {
        self.cool_rate_c = self.cool_rate_c.abs();
        self.sleep_rate_c = self.sleep_rate_c.abs();
        self.leak_rate_c = self.leak_rate_c.abs();
        self.tick_interval_ms = self.tick_interval_ms.max(100);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub base_url: String,
    pub token: String,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://blynk.cloud/external/api".to_string(),
            token: String::new(),
            poll_interval_ms: 2_000,
            request_timeout_ms: 5_000,
        }
    }
}

impl BridgeConfig {
    pub fn sanitize(&mut self) {
        while self.base_url.ends_with('/') {
            self.base_url.pop();
        }
        self.poll_interval_ms = self.poll_interval_ms.max(500);
        self.request_timeout_ms = self.request_timeout_ms.clamp(500, 30_000);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub presence_enabled: bool,
    pub presence_toggle_ms: u64,
    pub temperature_enabled: bool,
    pub temperature_interval_ms: u64,
    pub initial_temp_c: f32,
    pub tendency_c: f32,
    pub noise_c: f32,
    pub min_temp_c: f32,
    pub max_temp_c: f32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            presence_enabled: true,
            presence_toggle_ms: 30_000,
            // The plant publishes the room temperature in the default setup.
            temperature_enabled: false,
            temperature_interval_ms: 3_000,
            initial_temp_c: 29.0,
            tendency_c: -0.02,
            noise_c: 0.01,
            min_temp_c: 20.0,
            max_temp_c: 31.0,
        }
    }
}

impl SensorConfig {
    pub fn sanitize(&mut self) {
        if self.min_temp_c > self.max_temp_c {
            std::mem::swap(&mut self.min_temp_c, &mut self.max_temp_c);
        }
        self.initial_temp_c = self.initial_temp_c.clamp(self.min_temp_c, self.max_temp_c);
        self.noise_c = self.noise_c.abs().min(1.0);
        self.presence_toggle_ms = self.presence_toggle_ms.max(1_000);
        self.temperature_interval_ms = self.temperature_interval_ms.max(100);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub publish_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "localhost".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            publish_timeout_ms: 2_000,
        }
    }
}

impl NetworkConfig {
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("MQTT_HOST") {
            self.mqtt_host = host;
        }
        if let Some(port) = std::env::var("MQTT_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
        {
            self.mqtt_port = port;
        }
        if let Ok(user) = std::env::var("MQTT_USER") {
            self.mqtt_user = user;
        }
        if let Ok(pass) = std::env::var("MQTT_PASS") {
            self.mqtt_pass = pass;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub controller: ControllerConfig,
    pub plant: PlantConfig,
    pub bridge: BridgeConfig,
    pub sensor: SensorConfig,
    pub network: NetworkConfig,
}

impl RuntimeConfig {
    pub fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        let path = data_dir.join("runtime.json");
        let mut runtime = match std::fs::read(&path) {
            Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw)
                .map_err(|source| ConfigError::Parse { path, source })?,
            Err(err) if err.kind() == ErrorKind::NotFound => RuntimeConfig::default(),
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        runtime.sanitize();
        Ok(runtime)
    }

    pub fn sanitize(&mut self) {
        self.controller.sanitize();
        self.plant.sanitize();
        self.bridge.sanitize();
        self.sensor.sanitize();
    }
}

pub fn data_dir_from_env() -> std::path::PathBuf {
    std::env::var("CLIMATE_DATA_DIR")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("./.climate"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_missing_sections_with_defaults() {
        let raw = r#"{"controller":{"min_off_ms":60000},"bridge":{"token":"abc"}}"#;
        let mut runtime: RuntimeConfig = serde_json::from_str(raw).unwrap();
        runtime.sanitize();

        assert_eq!(runtime.controller.min_off_ms, 60_000);
        assert_eq!(runtime.controller.setpoint_c, 24.0);
        assert_eq!(runtime.bridge.token, "abc");
        assert_eq!(runtime.bridge.poll_interval_ms, 2_000);
        assert_eq!(runtime.plant.outside_temp_c, 31.0);
    }

    #[test]
    fn on_at_never_below_setpoint() {
        let mut config = ControllerConfig {
            setpoint_c: 25.0,
            on_at_c: 22.0,
            ..ControllerConfig::default()
        };
        config.sanitize();
        assert_eq!(config.on_at_c, 25.0);
    }

    #[test]
    fn trailing_slash_stripped_from_base_url() {
        let mut config = BridgeConfig {
            base_url: "https://example.test/api//".to_string(),
            ..BridgeConfig::default()
        };
        config.sanitize();
        assert_eq!(config.base_url, "https://example.test/api");
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = std::env::temp_dir().join("climate-config-test-missing");
        let runtime = RuntimeConfig::load(&dir).unwrap();
        assert_eq!(runtime.controller.on_at_c, 28.0);
        assert_eq!(runtime.network.mqtt_port, 1883);
    }
}
