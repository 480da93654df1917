use shared::{wbo_hal::Status, ControllerState};

use crate::heater::{
    HeaterController, HEATER_DIDNT_HEAT_RETRY_S, HEATER_VOLTAGE_LIMIT_V, HEATER_WARMUP_TIMEOUT_S,
};

use super::{closed_loop::ClosedLoop, preheat::Preheat, stopped::Stopped, HeaterFsm};

const RAMP_START_V: f32 = 7.0;
const FAST_START_RAMP_V: f32 = 9.0;
const RAMP_RATE_V_PER_S: f32 = 0.4;

pub struct WarmupRamp {
    elapsed_s: f32,
    ramp_volts: f32,
}

impl ControllerState<HeaterFsm, HeaterController> for WarmupRamp {
    fn update(&mut self, heater: &mut HeaterController, dt: f32) -> Option<HeaterFsm> {
        if !heater.heater_allowed {
            return Some(Preheat::new());
        }

        self.elapsed_s += dt;

        if heater.sensor_temp_c > heater.closed_loop_temp_c() {
            return Some(ClosedLoop::new());
        }

        if self.elapsed_s >= HEATER_WARMUP_TIMEOUT_S {
            return Some(Stopped::new(
                Status::SensorDidntHeat,
                HEATER_DIDNT_HEAT_RETRY_S,
            ));
        }

        if self.ramp_volts < HEATER_VOLTAGE_LIMIT_V {
            self.ramp_volts += RAMP_RATE_V_PER_S * dt;
        }
        heater.requested_volts = self.ramp_volts;

        None
    }

    fn enter_state(&mut self, heater: &mut HeaterController) {
        heater.status = Status::Warmup;
        heater.requested_volts = self.ramp_volts;
    }

    fn exit_state(&mut self, _heater: &mut HeaterController) {
        // Nothing
    }
}

impl WarmupRamp {
    pub fn new() -> HeaterFsm {
        HeaterFsm::WarmupRamp(Self {
            elapsed_s: 0.0,
            ramp_volts: RAMP_START_V,
        })
    }

    pub fn fast_start() -> HeaterFsm {
        HeaterFsm::WarmupRamp(Self {
            elapsed_s: 0.0,
            ramp_volts: FAST_START_RAMP_V,
        })
    }
}
