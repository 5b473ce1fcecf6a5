use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::PayloadError;

pub const MAX_PAYLOAD_BYTES: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AcState {
    Off,
    Cool,
    Sleep,
}

impl AcState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Cool => "COOL",
            Self::Sleep => "SLEEP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Power {
    On,
    Off,
}

impl Power {
    // Dashboard switches report `1`/`0`; anything not truthy reads as off.
    pub fn from_flag(raw: &str) -> Self {
        if is_truthy(raw) {
            Self::On
        } else {
            Self::Off
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcMode {
    Off,
    Cool,
    Sleep,
}

impl AcMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "off" => Some(Self::Off),
            "cool" => Some(Self::Cool),
            "sleep" => Some(Self::Sleep),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportReason {
    Boot,
    Rule,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub celsius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceReading {
    pub present: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcCommand {
    pub power: Power,
    pub mode: AcMode,
    pub setpoint: f32,
}

impl AcCommand {
    pub fn for_state(state: AcState, setpoint: f32) -> Self {
        let (power, mode) = match state {
            AcState::Off => (Power::Off, AcMode::Off),
            AcState::Cool => (Power::On, AcMode::Cool),
            AcState::Sleep => (Power::On, AcMode::Sleep),
        };
        Self {
            power,
            mode,
            setpoint,
        }
    }

    pub fn merge(&mut self, patch: &AcCommandPatch) {
        if let Some(power) = patch.power {
            self.power = power;
        }
        if let Some(mode) = patch.mode {
            self.mode = mode;
        }
        if let Some(setpoint) = patch.setpoint {
            self.setpoint = setpoint;
        }
    }
}

impl Default for AcCommand {
    fn default() -> Self {
        Self::for_state(AcState::Off, 24.0)
    }
}

// Wire form of `lab1/ac/cmd` as consumed by the plant: the controller sends
// every field, dashboard overrides only the ones that changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AcCommandPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<Power>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<AcMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setpoint: Option<f32>,
}

impl AcCommandPatch {
    pub fn is_empty(&self) -> bool {
        self.power.is_none() && self.mode.is_none() && self.setpoint.is_none()
    }
}

impl From<AcCommand> for AcCommandPatch {
    fn from(command: AcCommand) -> Self {
        Self {
            power: Some(command.power),
            mode: Some(command.mode),
            setpoint: Some(command.setpoint),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcStateReport {
    pub state: AcState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp: Option<f32>,
    #[serde(default)]
    pub present: bool,
    pub reason: ReportReason,
}

impl AcStateReport {
    pub fn display_text(&self) -> String {
        match self.temp {
            Some(temp) => format!("{} @ {temp:.2}°C", self.state.as_str()),
            None => self.state.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub state: &'static str,
    #[serde(rename = "currentTemp")]
    pub current_temp: Option<f32>,
    pub present: bool,
    pub setpoint: f32,
    #[serde(rename = "onAt")]
    pub on_at: f32,
    pub hysteresis: f32,
    #[serde(rename = "canTurnOn")]
    pub can_turn_on: bool,
    #[serde(rename = "lockoutRemainingMs")]
    pub lockout_remaining_ms: u64,
    #[serde(rename = "readingAgeMs")]
    pub reading_age_ms: Option<u64>,
}

pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, PayloadError> {
    if payload.len() > MAX_PAYLOAD_BYTES {
        return Err(PayloadError::Oversized {
            len: payload.len(),
            max: MAX_PAYLOAD_BYTES,
        });
    }
    Ok(serde_json::from_slice(payload)?)
}

pub fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

pub fn is_truthy(raw: &str) -> bool {
    matches!(raw.trim(), "1" | "true" | "True")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn command_for_each_state() {
        assert_eq!(
            AcCommand::for_state(AcState::Off, 24.0),
            AcCommand {
                power: Power::Off,
                mode: AcMode::Off,
                setpoint: 24.0
            }
        );
        assert_eq!(
            AcCommand::for_state(AcState::Cool, 24.0),
            AcCommand {
                power: Power::On,
                mode: AcMode::Cool,
                setpoint: 24.0
            }
        );
        assert_eq!(
            AcCommand::for_state(AcState::Sleep, 24.0),
            AcCommand {
                power: Power::On,
                mode: AcMode::Sleep,
                setpoint: 24.0
            }
        );
    }

    #[test]
    fn command_serializes_flat_lowercase_fields() {
        let body = serde_json::to_string(&AcCommand::for_state(AcState::Cool, 24.0)).unwrap();
        assert_eq!(body, r#"{"power":"on","mode":"cool","setpoint":24.0}"#);
    }

    #[test]
    fn partial_patch_omits_unchanged_fields() {
        let patch = AcCommandPatch {
            setpoint: Some(22.5),
            ..AcCommandPatch::default()
        };
        let body = serde_json::to_string(&patch).unwrap();
        assert_eq!(body, r#"{"setpoint":22.5}"#);
    }

    #[test]
    fn merge_keeps_fields_missing_from_patch() {
        let mut command = AcCommand::for_state(AcState::Cool, 24.0);
        command.merge(&AcCommandPatch {
            setpoint: Some(26.0),
            ..AcCommandPatch::default()
        });

        assert_eq!(command.power, Power::On);
        assert_eq!(command.mode, AcMode::Cool);
        assert_eq!(command.setpoint, 26.0);
    }

    #[test]
    fn boot_report_omits_temperature() {
        let report = AcStateReport {
            state: AcState::Off,
            temp: None,
            present: false,
            reason: ReportReason::Boot,
        };
        let body = serde_json::to_string(&report).unwrap();
        assert_eq!(body, r#"{"state":"OFF","present":false,"reason":"boot"}"#);
    }

    #[test]
    fn state_text_includes_temperature_when_known() {
        let report = AcStateReport {
            state: AcState::Cool,
            temp: Some(27.5),
            present: true,
            reason: ReportReason::Rule,
        };
        assert_eq!(report.display_text(), "COOL @ 27.50°C");
    }

    #[test]
    fn decode_rejects_malformed_and_oversized() {
        assert!(decode_payload::<TemperatureReading>(br#"{"celsius":"hot"}"#).is_err());
        assert!(decode_payload::<PresenceReading>(b"not json").is_err());

        let oversized = vec![b' '; MAX_PAYLOAD_BYTES + 1];
        assert!(matches!(
            decode_payload::<PresenceReading>(&oversized),
            Err(PayloadError::Oversized { .. })
        ));

        let reading: TemperatureReading = decode_payload(br#"{"celsius":29.8}"#).unwrap();
        assert_eq!(reading.celsius, 29.8);
    }

    #[test]
    fn mode_and_power_parse_dashboard_text() {
        assert_eq!(AcMode::parse("COOL"), Some(AcMode::Cool));
        assert_eq!(AcMode::parse(" sleep "), Some(AcMode::Sleep));
        assert_eq!(AcMode::parse("heat"), None);

        assert_eq!(Power::from_flag("1"), Power::On);
        assert_eq!(Power::from_flag("True"), Power::On);
        assert_eq!(Power::from_flag("0"), Power::Off);
        assert_eq!(Power::from_flag("yes"), Power::Off);
    }
}
