pub mod climate;
pub mod config;
pub mod error;
pub mod mqtt;
pub mod plant;
pub mod topics;
pub mod types;

pub use climate::{ClimateEngine, Transition};
pub use config::{
    BridgeConfig, ControllerConfig, NetworkConfig, PlantConfig, RuntimeConfig, SensorConfig,
};
pub use error::{ConfigError, PayloadError, PublishError};
pub use plant::ThermalPlant;
pub use topics::*;
pub use types::{
    decode_payload, round2, AcCommand, AcCommandPatch, AcMode, AcState, AcStateReport,
    ControllerStatus, Power, PresenceReading, ReportReason, TemperatureReading,
};
