use shared::{wbo_hal::Status, ControllerState};

use crate::heater::{
    HeaterController, HEATER_FAST_HEATING_THRESHOLD_C, PREHEAT_VOLTAGE_V,
};

use super::{warmup_ramp::WarmupRamp, HeaterFsm};

pub struct Preheat {
    elapsed_s: f32,
}

impl ControllerState<HeaterFsm, HeaterController> for Preheat {
    fn update(&mut self, heater: &mut HeaterController, dt: f32) -> Option<HeaterFsm> {
        if !heater.heater_allowed {
            // Hold here until the ECU (or supply sensing) permits heating
            self.elapsed_s = 0.0;
            return None;
        }

        self.elapsed_s += dt;

        // An already-hot sensor can take a harder ramp straight away
        if heater.sensor_temp_c >= HEATER_FAST_HEATING_THRESHOLD_C {
            return Some(WarmupRamp::fast_start());
        }

        if self.elapsed_s >= heater.settings.preheat_time_s()
            || heater.sensor_temp_c > heater.closed_loop_temp_c()
        {
            return Some(WarmupRamp::new());
        }

        None
    }

    fn enter_state(&mut self, heater: &mut HeaterController) {
        heater.status = Status::Preheat;
        // Condensation may still sit on the element; keep the gradient gentle
        heater.requested_volts = PREHEAT_VOLTAGE_V;
    }

    fn exit_state(&mut self, _heater: &mut HeaterController) {
        // Nothing
    }
}

impl Preheat {
    pub fn new() -> HeaterFsm {
        HeaterFsm::Preheat(Self { elapsed_s: 0.0 })
    }
}
