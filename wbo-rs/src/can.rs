//! CAN broadcast and command handling.
//!
//! The TX side formats controller state into each enabled protocol's
//! frames at 100 Hz (EGT at 20 Hz); the RX side mutates a small status
//! structure and services configuration commands. Encoders are pure
//! functions of the per-channel inputs, so every frame is reproducible
//! from a snapshot.

use shared::wbo_hal::{
    CanFrame, EgtDriver, EgtReading, HeaterAllow, HeaterState, SamplerSnapshot, Status,
};

use crate::EGT_CHANNELS;

pub mod aemnet;
pub mod bytes;
pub mod ecumaster;
pub mod emtron;
pub mod haltech;
pub mod internal;
pub mod linkecu;
pub mod motec;
pub mod rx;
pub mod tx;

/// Process-wide status fed by the RX dispatcher and read by the control
/// loops. Writes are whole scalars; readers tolerate a one-cycle-stale
/// value.
#[derive(Debug, Clone, Copy)]
pub struct CanStatus {
    pub heater_allow: HeaterAllow,
    pub remote_battery_v: f32,
    pub pump_gain_adjust: f32,
}

impl CanStatus {
    pub fn new() -> Self {
        Self {
            heater_allow: HeaterAllow::Unknown,
            remote_battery_v: 0.0,
            pump_gain_adjust: 1.0,
        }
    }
}

/// Everything an AFR encoder may need, captured once per TX tick.
#[derive(Debug, Clone, Copy)]
pub struct AfrFrameInputs {
    pub sample: SamplerSnapshot,
    pub heater_state: HeaterState,
    pub heater_duty: f32,
    pub heater_effective_volts: f32,
    pub pump_duty: f32,
    pub status: Status,
    pub mcu_temp_c: f32,
    pub lambda: f32,
    pub lambda_valid: bool,
}

/// Everything an EGT encoder may need, captured once per EGT tick.
#[derive(Debug, Clone, Copy)]
pub struct EgtFrameInputs {
    pub readings: [EgtReading; EGT_CHANNELS],
    pub supply_voltage_v: f32,
    pub mcu_temp_c: f32,
}

impl EgtFrameInputs {
    pub fn capture(
        drivers: [&dyn EgtDriver; EGT_CHANNELS],
        supply_voltage_v: f32,
        mcu_temp_c: f32,
    ) -> Self {
        Self {
            readings: core::array::from_fn(|i| drivers[i].reading()),
            supply_voltage_v,
            mcu_temp_c,
        }
    }
}

/// Encoders hand back up to three frames per channel per tick.
pub type TxFrames = [Option<CanFrame>; 3];

pub(crate) fn one_frame(frame: CanFrame) -> TxFrames {
    [Some(frame), None, None]
}

pub(crate) fn no_frames() -> TxFrames {
    [None, None, None]
}

/// Oxygen concentration derived from lambda where the sensor does not
/// report it directly; zero when lambda is invalid.
pub(crate) fn oxygen_percent(lambda: f32, lambda_valid: bool) -> f32 {
    if lambda_valid && lambda > 0.0 {
        ((lambda - 1.0) / lambda) * 20.95
    } else {
        0.0
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oxygen_zero_at_stoich_and_when_invalid() {
        assert_eq!(oxygen_percent(1.0, true), 0.0);
        assert_eq!(oxygen_percent(1.5, false), 0.0);
    }

    #[test]
    fn oxygen_positive_when_lean() {
        let lean = oxygen_percent(1.5, true);
        assert!(lean > 6.9 && lean < 7.1);

        assert!(oxygen_percent(0.8, true) < 0.0);
    }
}
