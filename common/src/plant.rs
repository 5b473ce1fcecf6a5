use crate::{
    config::PlantConfig,
    types::{round2, AcCommand, AcCommandPatch, AcMode, Power},
};

#[derive(Debug, Clone)]
pub struct ThermalPlant {
    pub config: PlantConfig,
    temperature_c: f32,
    command: AcCommand,
}

impl ThermalPlant {
    pub fn new(mut config: PlantConfig) -> Self {
        config.sanitize();
        Self {
            temperature_c: config.initial_temp_c,
            config,
            command: AcCommand::default(),
        }
    }

    pub fn temperature_c(&self) -> f32 {
        self.temperature_c
    }

    pub fn command(&self) -> AcCommand {
        self.command
    }

    pub fn apply_command(&mut self, patch: &AcCommandPatch) -> bool {
        let before = self.command;
        self.command.merge(patch);
        if !self.command.setpoint.is_finite() {
            self.command.setpoint = before.setpoint;
        }
        self.command != before
    }

    pub fn step(&mut self) -> f32 {
        let setpoint = self.command.setpoint;
        let outside = self.config.outside_temp_c;
        let temp = self.temperature_c;

        self.temperature_c = match (self.command.power, self.command.mode) {
            (Power::On, AcMode::Cool) => {
                if temp > setpoint {
                    temp - self.config.cool_rate_c
                } else {
                    temp
                }
            }
            (Power::On, AcMode::Sleep) => {
                if temp > setpoint {
                    temp - self.config.sleep_rate_c
                } else if temp < setpoint {
                    temp + self.config.sleep_rate_c / 2.0
                } else {
                    temp
                }
            }
            _ => {
                if temp < outside {
                    temp + self.config.leak_rate_c
                } else if temp > outside {
                    temp - self.config.leak_rate_c
                } else {
                    temp
                }
            }
        };

        round2(self.temperature_c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AcState;

    fn plant_at(temp: f32) -> ThermalPlant {
        ThermalPlant::new(PlantConfig {
            initial_temp_c: temp,
            ..PlantConfig::default()
        })
    }

    fn command(state: AcState, setpoint: f32) -> AcCommandPatch {
        AcCommand::for_state(state, setpoint).into()
    }

    #[test]
    fn cooling_decreases_until_setpoint_then_holds() {
        let mut plant = plant_at(25.0);
        plant.apply_command(&command(AcState::Cool, 24.0));

        let mut previous = plant.temperature_c();
        for _ in 0..4 {
            plant.step();
            assert!(plant.temperature_c() < previous);
            previous = plant.temperature_c();
        }
        assert!(plant.temperature_c() <= 24.0 + f32::EPSILON * 32.0);

        let settled = plant.temperature_c();
        for _ in 0..10 {
            plant.step();
        }
        assert_eq!(plant.temperature_c(), settled);
    }

    #[test]
    fn sleep_warms_at_half_rate_below_setpoint() {
        let mut plant = plant_at(23.0);
        plant.apply_command(&command(AcState::Sleep, 24.0));

        let published = plant.step();
        assert_eq!(published, 23.04);

        let mut hot = plant_at(26.0);
        hot.apply_command(&command(AcState::Sleep, 24.0));
        assert_eq!(hot.step(), 25.92);
    }

    #[test]
    fn off_leaks_toward_outside_from_both_sides() {
        let mut cold = plant_at(25.0);
        let mut previous = cold.temperature_c();
        for _ in 0..20 {
            cold.step();
            assert!(cold.temperature_c() > previous);
            previous = cold.temperature_c();
        }

        let mut hot = plant_at(33.0);
        let mut previous = hot.temperature_c();
        for _ in 0..20 {
            hot.step();
            assert!(hot.temperature_c() < previous);
            previous = hot.temperature_c();
        }
    }

    #[test]
    fn power_on_with_off_mode_leaks() {
        let mut plant = plant_at(30.0);
        plant.apply_command(&AcCommandPatch {
            power: Some(Power::On),
            mode: Some(AcMode::Off),
            setpoint: Some(24.0),
        });
        assert_eq!(plant.step(), 30.02);
    }

    #[test]
    fn partial_command_keeps_other_fields() {
        let mut plant = plant_at(30.0);
        plant.apply_command(&command(AcState::Cool, 24.0));

        let changed = plant.apply_command(&AcCommandPatch {
            setpoint: Some(22.0),
            ..AcCommandPatch::default()
        });

        assert!(changed);
        assert_eq!(plant.command().power, Power::On);
        assert_eq!(plant.command().mode, AcMode::Cool);
        assert_eq!(plant.command().setpoint, 22.0);
        assert!(!plant.apply_command(&AcCommandPatch::default()));
    }

    #[test]
    fn non_finite_setpoint_ignored() {
        let mut plant = plant_at(30.0);
        plant.apply_command(&AcCommandPatch {
            setpoint: Some(f32::NAN),
            ..AcCommandPatch::default()
        });
        assert_eq!(plant.command().setpoint, 24.0);
    }

    #[test]
    fn publishes_rounded_value() {
        let mut plant = plant_at(30.0);
        plant.apply_command(&command(AcState::Sleep, 24.0));
        for _ in 0..3 {
            plant.step();
        }
        assert_eq!(plant.step(), 29.68);
    }
}
