use std::collections::HashMap;

use tracing::debug;

use climate_common::{
    round2, types::is_truthy, AcCommandPatch, AcMode, AcStateReport, Power, PresenceReading,
    TemperatureReading,
};

use crate::remote::{RemoteApi, Slot};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocalUpdate {
    Temperature(TemperatureReading),
    Presence(PresenceReading),
    State(AcStateReport),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocalPublish {
    Presence(PresenceReading),
    Command(AcCommandPatch),
}

// Last value known to be on each dashboard slot, shared by both directions so
// a value we wrote is not read back as a dashboard change.
#[derive(Debug, Default)]
pub struct MirrorCache {
    slots: HashMap<Slot, String>,
    last_command: Option<AcCommandPatch>,
}

impl MirrorCache {
    pub fn get(&self, slot: Slot) -> Option<&str> {
        self.slots.get(&slot).map(String::as_str)
    }

    pub fn matches(&self, slot: Slot, value: &str) -> bool {
        self.get(slot) == Some(value)
    }

    pub fn record(&mut self, slot: Slot, value: String) {
        self.slots.insert(slot, value);
    }

    pub fn last_command(&self) -> Option<&AcCommandPatch> {
        self.last_command.as_ref()
    }
}

pub struct BridgeSync<R> {
    remote: R,
    cache: MirrorCache,
}

impl<R: RemoteApi> BridgeSync<R> {
    pub fn new(remote: R) -> Self {
        Self {
            remote,
            cache: MirrorCache::default(),
        }
    }

    #[cfg(test)]
    pub fn cache(&self) -> &MirrorCache {
        &self.cache
    }

    #[cfg(test)]
    pub fn remote(&self) -> &R {
        &self.remote
    }

    // Reads every writable slot once so stale dashboard values are not
    // mistaken for fresh overrides. Publishes nothing.
    pub async fn seed(&mut self) {
        for slot in Slot::WRITABLE {
            match self.remote.read(slot).await {
                Ok(Some(value)) => self.cache.record(slot, value),
                Ok(None) => {}
                Err(err) => debug!("seed read skipped: {err}"),
            }
        }
    }

    pub async fn push_local(&mut self, update: LocalUpdate) -> bool {
        let (slot, value) = match update {
            LocalUpdate::Temperature(reading) => {
                (Slot::Temperature, round2(reading.celsius).to_string())
            }
            LocalUpdate::Presence(reading) => (
                Slot::Presence,
                if reading.present { "1" } else { "0" }.to_string(),
            ),
            LocalUpdate::State(report) => (Slot::State, report.display_text()),
        };

        if self.cache.matches(slot, &value) {
            return false;
        }

        match self.remote.write(slot, &value).await {
            Ok(()) => {
                self.cache.record(slot, value);
                true
            }
            Err(err) => {
                debug!("write skipped, retrying on next change: {err}");
                false
            }
        }
    }

    pub async fn poll_remote(&mut self) -> Vec<LocalPublish> {
        let mut publishes = Vec::new();

        if let Some(raw) = self.read_changed(Slot::Presence).await {
            publishes.push(LocalPublish::Presence(PresenceReading {
                present: is_truthy(&raw),
            }));
        }

        let mut patch = AcCommandPatch::default();
        if let Some(raw) = self.read_changed(Slot::Mode).await {
            patch.mode = AcMode::parse(&raw);
        }
        if let Some(raw) = self.read_changed(Slot::Setpoint).await {
            patch.setpoint = raw
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|value| value.is_finite());
        }
        if let Some(raw) = self.read_changed(Slot::Power).await {
            patch.power = Some(Power::from_flag(&raw));
        }

        if !patch.is_empty() && self.cache.last_command() != Some(&patch) {
            publishes.push(LocalPublish::Command(patch));
        }

        publishes
    }

    pub fn mark_published(&mut self, patch: AcCommandPatch) {
        self.cache.last_command = Some(patch);
    }

    async fn read_changed(&mut self, slot: Slot) -> Option<String> {
        match self.remote.read(slot).await {
            Ok(Some(value)) if !self.cache.matches(slot, &value) => {
                self.cache.record(slot, value.clone());
                Some(value)
            }
            Ok(_) => None,
            Err(err) => {
                debug!("poll read skipped: {err}");
                None
            }
        }
    }
}
