//! One AFR channel: a heater controller and a pump controller sharing a
//! sensor, glued to the broadcast inputs.

use shared::wbo_hal::{HeaterPwm, PumpDac, Sampler, SensorType};

use crate::can::{AfrFrameInputs, CanStatus};
use crate::config::HeaterSettings;
use crate::heater::{HeaterBoardConfig, HeaterController};
use crate::lambda::{lambda_for_pump_current, lambda_is_valid};
use crate::pump::PumpController;

pub struct AfrChannel {
    pub heater: HeaterController,
    pub pump: PumpController,
    sensor_type: SensorType,
}

impl AfrChannel {
    pub fn new(sensor_type: SensorType, settings: HeaterSettings, board: HeaterBoardConfig) -> Self {
        Self {
            heater: HeaterController::new(sensor_type, settings, board),
            pump: PumpController::new(),
            sensor_type,
        }
    }

    /// 1 kHz tick.
    pub fn update_heater(
        &mut self,
        sampler: &dyn Sampler,
        pwm: &mut dyn HeaterPwm,
        can_status: &CanStatus,
        board_supply_v: Option<f32>,
        dt: f32,
    ) {
        self.heater.update(
            sampler,
            pwm,
            can_status.heater_allow,
            board_supply_v,
            can_status.remote_battery_v,
            dt,
        );
    }

    /// 500 Hz tick.
    pub fn update_pump(
        &mut self,
        sampler: &dyn Sampler,
        dac: &mut dyn PumpDac,
        can_status: &CanStatus,
    ) {
        self.pump.update(
            sampler,
            dac,
            self.heater.state(),
            self.heater.target_temp_c(),
            can_status.pump_gain_adjust,
        );
    }

    pub fn lambda(&self, sampler: &dyn Sampler) -> f32 {
        lambda_for_pump_current(self.sensor_type, sampler.pump_nominal_current_ma())
    }

    /// Snapshot for the TX scheduler, taken at the top of its cycle.
    pub fn frame_inputs(
        &self,
        sampler: &dyn Sampler,
        pump_dac: &dyn PumpDac,
        mcu_temp_c: f32,
    ) -> AfrFrameInputs {
        let sample = sampler.snapshot();
        let lambda = lambda_for_pump_current(self.sensor_type, sample.pump_nominal_current_ma);

        AfrFrameInputs {
            sample,
            heater_state: self.heater.state(),
            heater_duty: self.heater.duty(),
            heater_effective_volts: self.heater.effective_voltage(),
            pump_duty: pump_dac.output_duty(),
            status: self.heater.status(),
            mcu_temp_c,
            lambda,
            lambda_valid: lambda_is_valid(self.heater.state(), sample.nernst_dc_v, lambda),
        }
    }
}
