use shared::{wbo_hal::Status, ControllerState};

use crate::heater::HeaterController;

use super::{preheat::Preheat, HeaterFsm};

pub struct Stopped {
    cause: Status,
    retry_after_s: f32,
    elapsed_s: f32,
}

impl ControllerState<HeaterFsm, HeaterController> for Stopped {
    fn update(&mut self, heater: &mut HeaterController, dt: f32) -> Option<HeaterFsm> {
        if !heater.heater_allowed {
            return Some(Preheat::new());
        }

        self.elapsed_s += dt;

        if self.elapsed_s >= self.retry_after_s {
            return Some(Preheat::new());
        }

        None
    }

    fn enter_state(&mut self, heater: &mut HeaterController) {
        heater.status = self.cause;
        heater.requested_volts = 0.0;
    }

    fn exit_state(&mut self, _heater: &mut HeaterController) {
        // Nothing
    }
}

impl Stopped {
    pub fn new(cause: Status, retry_after_s: f32) -> HeaterFsm {
        HeaterFsm::Stopped(Self {
            cause,
            retry_after_s,
            elapsed_s: 0.0,
        })
    }
}
