use std::{future::Future, time::Duration};

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Temperature,
    Presence,
    State,
    Mode,
    Setpoint,
    Power,
}

impl Slot {
    pub const WRITABLE: [Slot; 4] = [Slot::Presence, Slot::Mode, Slot::Setpoint, Slot::Power];

    pub fn pin(self) -> &'static str {
        match self {
            Self::Temperature => "V0",
            Self::Presence => "V1",
            Self::State => "V2",
            Self::Mode => "V3",
            Self::Setpoint => "V4",
            Self::Power => "V5",
        }
    }
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request to {pin} timed out")]
    Timeout { pin: &'static str },
    #[error("request to {pin} failed: {source}")]
    Transport {
        pin: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {pin} returned HTTP {status}")]
    Status { pin: &'static str, status: u16 },
}

impl RemoteError {
    fn from_reqwest(pin: &'static str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { pin }
        } else {
            Self::Transport { pin, source }
        }
    }
}

pub trait RemoteApi {
    fn write(
        &self,
        slot: Slot,
        value: &str,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    // `Ok(None)` when the slot holds no value.
    fn read(&self, slot: Slot) -> impl Future<Output = Result<Option<String>, RemoteError>> + Send;
}

pub struct BlynkClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl BlynkClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    // Reads name the pin as a bare key (`&V1`), which `.query()` cannot express.
    fn read_request(&self, pin: &str) -> reqwest::Result<reqwest::Request> {
        let mut request = self
            .http
            .get(format!("{}/get", self.base_url))
            .query(&[("token", self.token.as_str())])
            .build()?;
        request.url_mut().query_pairs_mut().append_key_only(pin);
        Ok(request)
    }
}

impl RemoteApi for BlynkClient {
    async fn write(&self, slot: Slot, value: &str) -> Result<(), RemoteError> {
        let pin = slot.pin();
        let response = self
            .http
            .get(format!("{}/update", self.base_url))
            .query(&[("token", self.token.as_str()), (pin, value)])
            .send()
            .await
            .map_err(|err| RemoteError::from_reqwest(pin, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                pin,
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    async fn read(&self, slot: Slot) -> Result<Option<String>, RemoteError> {
        let pin = slot.pin();
        let request = self
            .read_request(pin)
            .map_err(|err| RemoteError::from_reqwest(pin, err))?;
        let response = self
            .http
            .execute(request)
            .await
            .map_err(|err| RemoteError::from_reqwest(pin, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                pin,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|err| RemoteError::from_reqwest(pin, err))?;
        Ok(parse_pin_value(&body))
    }
}

// The REST API answers either `["value"]`, a bare JSON scalar or plain text.
pub fn parse_pin_value(body: &str) -> Option<String> {
    let trimmed = body.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => items.into_iter().next().map(scalar_text),
        Ok(Value::Null) => None,
        Ok(value) => Some(scalar_text(value)),
        Err(_) if trimmed.is_empty() => None,
        Err(_) => Some(trimmed.to_string()),
    }
}

fn scalar_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
