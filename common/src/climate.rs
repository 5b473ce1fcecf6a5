use crate::{
    config::ControllerConfig,
    types::{round2, AcCommand, AcState, AcStateReport, ControllerStatus, ReportReason},
};

// Messages produced by a state change, in publish order.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub command: AcCommand,
    pub report: AcStateReport,
}

#[derive(Debug, Clone)]
pub struct ClimateEngine {
    pub config: ControllerConfig,

    state: AcState,
    temperature_c: Option<f32>,
    present: bool,

    last_sensor_update_ms: Option<u64>,
    // Only moves forward: set once per transition into OFF.
    last_off_ms: Option<u64>,
}

impl ClimateEngine {
    pub fn new(mut config: ControllerConfig) -> Self {
        config.sanitize();
        Self {
            config,
            state: AcState::Off,
            temperature_c: None,
            present: false,
            last_sensor_update_ms: None,
            last_off_ms: None,
        }
    }

    pub fn state(&self) -> AcState {
        self.state
    }

    pub fn temperature_c(&self) -> Option<f32> {
        self.temperature_c
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    pub fn last_off_ms(&self) -> Option<u64> {
        self.last_off_ms
    }

    pub fn update_temperature(&mut self, celsius: f32, now_ms: u64) -> bool {
        if !celsius.is_finite() {
            return false;
        }
        self.temperature_c = Some(celsius);
        self.last_sensor_update_ms = Some(now_ms);
        true
    }

    pub fn update_presence(&mut self, present: bool) {
        self.present = present;
    }

    pub fn boot_report(&self) -> AcStateReport {
        AcStateReport {
            state: self.state,
            temp: self.temperature_c.map(round2),
            present: self.present,
            reason: ReportReason::Boot,
        }
    }

    pub fn can_turn_on(&self, now_ms: u64) -> bool {
        self.last_off_ms
            .map(|last| now_ms.saturating_sub(last) >= self.config.min_off_ms)
            .unwrap_or(true)
    }

    pub fn lockout_remaining_ms(&self, now_ms: u64) -> u64 {
        match self.last_off_ms {
            Some(last) => self
                .config
                .min_off_ms
                .saturating_sub(now_ms.saturating_sub(last)),
            None => 0,
        }
    }

    // `None` until a temperature has been observed.
    pub fn desired_state(&self, now_ms: u64) -> Option<AcState> {
        let temp = self.temperature_c?;
        let can_turn_on = self.can_turn_on(now_ms);

        let setpoint = self.config.setpoint_c;
        let lower_bound = setpoint - self.config.hysteresis_c;
        let upper_bound = setpoint + self.config.hysteresis_c;

        // Rule order matters when on_at falls inside the dead band.
        let desired = if !self.present {
            AcState::Off
        } else if temp >= self.config.on_at_c && can_turn_on {
            AcState::Cool
        } else if (lower_bound..=upper_bound).contains(&temp) {
            AcState::Sleep
        } else if temp > upper_bound && can_turn_on {
            AcState::Cool
        } else {
            AcState::Off
        };

        Some(desired)
    }

    pub fn tick(&mut self, now_ms: u64) -> Option<Transition> {
        let desired = self.desired_state(now_ms)?;
        if desired == self.state {
            return None;
        }

        self.state = desired;
        if desired == AcState::Off {
            self.last_off_ms = Some(now_ms);
        }

        Some(Transition {
            command: AcCommand::for_state(desired, self.config.setpoint_c),
            report: AcStateReport {
                state: desired,
                temp: self.temperature_c.map(round2),
                present: self.present,
                reason: ReportReason::Rule,
            },
        })
    }

    pub fn status(&self, now_ms: u64) -> ControllerStatus {
        ControllerStatus {
            state: self.state.as_str(),
            current_temp: self.temperature_c,
            present: self.present,
            setpoint: self.config.setpoint_c,
            on_at: self.config.on_at_c,
            hysteresis: self.config.hysteresis_c,
            can_turn_on: self.can_turn_on(now_ms),
            lockout_remaining_ms: self.lockout_remaining_ms(now_ms),
            reading_age_ms: self
                .last_sensor_update_ms
                .map(|last| now_ms.saturating_sub(last)),
        }
    }
}
