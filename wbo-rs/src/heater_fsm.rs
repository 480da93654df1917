use shared::{wbo_hal::HeaterState, ControllerFsm, ControllerState};

use crate::heater::HeaterController;

pub mod closed_loop;
pub mod preheat;
pub mod stopped;
pub mod warmup_ramp;

pub enum HeaterFsm {
    Preheat(preheat::Preheat),
    WarmupRamp(warmup_ramp::WarmupRamp),
    ClosedLoop(closed_loop::ClosedLoop),
    Stopped(stopped::Stopped),
}

impl ControllerFsm<HeaterFsm, HeaterController, HeaterState> for HeaterFsm {
    fn to_controller_state(&mut self) -> &mut dyn ControllerState<HeaterFsm, HeaterController> {
        match self {
            HeaterFsm::Preheat(state) => state,
            HeaterFsm::WarmupRamp(state) => state,
            HeaterFsm::ClosedLoop(state) => state,
            HeaterFsm::Stopped(state) => state,
        }
    }

    fn hal_state(&self) -> HeaterState {
        match self {
            HeaterFsm::Preheat(_) => HeaterState::Preheat,
            HeaterFsm::WarmupRamp(_) => HeaterState::WarmupRamp,
            HeaterFsm::ClosedLoop(_) => HeaterState::ClosedLoop,
            HeaterFsm::Stopped(_) => HeaterState::Stopped,
        }
    }
}
