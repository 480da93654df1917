use shared::{wbo_hal::Status, ControllerState};

use crate::heater::{
    HeaterController, CLOSED_LOOP_BASE_VOLTAGE_V, HEATER_CLOSED_LOOP_STAB_TIME_S,
    HEATER_OVERHEAT_RETRY_S, HEATER_TEMP_FAULT_TIME_S, HEATER_UNDERHEAT_RETRY_S,
};

use super::{preheat::Preheat, stopped::Stopped, HeaterFsm};

pub struct ClosedLoop {
    stable_elapsed_s: f32,
    // Time since the temperature was last inside the respective band
    overheat_elapsed_s: f32,
    underheat_elapsed_s: f32,
}

impl ControllerState<HeaterFsm, HeaterController> for ClosedLoop {
    fn update(&mut self, heater: &mut HeaterController, dt: f32) -> Option<HeaterFsm> {
        if !heater.heater_allowed {
            return Some(Preheat::new());
        }

        self.stable_elapsed_s += dt;
        self.overheat_elapsed_s += dt;
        self.underheat_elapsed_s += dt;

        if heater.sensor_temp_c <= heater.overheat_temp_c() {
            self.overheat_elapsed_s = 0.0;
        }
        if heater.sensor_temp_c >= heater.underheat_temp_c() {
            self.underheat_elapsed_s = 0.0;
        }

        // Ignore excursions right after the switch to closed loop; the pump
        // ramping disturbs the ESR-derived temperature measurement
        if self.stable_elapsed_s >= HEATER_CLOSED_LOOP_STAB_TIME_S {
            if self.overheat_elapsed_s >= HEATER_TEMP_FAULT_TIME_S {
                return Some(Stopped::new(Status::SensorOverheat, HEATER_OVERHEAT_RETRY_S));
            }

            if self.underheat_elapsed_s >= HEATER_TEMP_FAULT_TIME_S {
                return Some(Stopped::new(
                    Status::SensorUnderheat,
                    HEATER_UNDERHEAT_RETRY_S,
                ));
            }
        }

        heater.requested_volts = Self::regulate(heater);

        None
    }

    fn enter_state(&mut self, heater: &mut HeaterController) {
        heater.status = Status::RunningClosedLoop;
        heater.requested_volts = Self::regulate(heater);
    }

    fn exit_state(&mut self, _heater: &mut HeaterController) {
        // Nothing
    }
}

impl ClosedLoop {
    pub fn new() -> HeaterFsm {
        HeaterFsm::ClosedLoop(Self {
            stable_elapsed_s: 0.0,
            overheat_elapsed_s: 0.0,
            underheat_elapsed_s: 0.0,
        })
    }

    // Correction is applied around the nominal heater voltage instead of
    // leaning on the integrator. Negated: lower ESR means hotter.
    fn regulate(heater: &mut HeaterController) -> f32 {
        let correction = heater
            .pid
            .update(heater.target_esr_ohm, heater.sensor_esr_ohm);

        CLOSED_LOOP_BASE_VOLTAGE_V - correction
    }
}
