//! Emtron ELC lambda format and the ETC4 thermocouple format.
//! 11 bit identifiers, big endian, DLC 8, 100 Hz.

use shared::wbo_hal::{CanFrame, Status};

use super::bytes::{put_i16_be, put_u16_be, BitWriter};
use super::{no_frames, one_frame, AfrFrameInputs, EgtFrameInputs, TxFrames};
use crate::config::Configuration;
use crate::EGT_CHANNELS;

// ID = BASE_ID + offset (0..10)
const EMTRON_ELC_BASE_ID: u32 = 0x28F;

// Device offset 0..3
const EMTRON_ETC4_BASE_ID: u32 = 0x2B3;

// Status byte values
const AFR_STATUS_NORMAL_OPERATION: u8 = 1;
const AFR_STATUS_SENSOR_WARMING_UP: u8 = 2;
const AFR_STATUS_HEATER_UNDER_TEMPERATURE: u8 = 14;
const AFR_STATUS_HEATER_OVER_TEMPERATURE: u8 = 15;

// Each two-bit fault field reads 3 when healthy; virtual ground, nernst
// cell, pump current and heater all OK
const FAULT_BYTE_ALL_OK: u8 = 0xFF;

fn status_code(status: Status) -> u8 {
    match status {
        Status::Preheat | Status::Warmup => AFR_STATUS_SENSOR_WARMING_UP,
        Status::RunningClosedLoop => AFR_STATUS_NORMAL_OPERATION,
        Status::SensorDidntHeat | Status::SensorUnderheat => AFR_STATUS_HEATER_UNDER_TEMPERATURE,
        Status::SensorOverheat => AFR_STATUS_HEATER_OVER_TEMPERATURE,
    }
}

pub fn encode_afr(config: &Configuration, ch: usize, inputs: &[AfrFrameInputs]) -> TxFrames {
    let input = &inputs[ch];
    let id = EMTRON_ELC_BASE_ID + config.afr[ch].extra_can_id_offset as u32;

    let mut data = [0u8; 8];
    data[0] = 0; // frame index

    let lambda_raw = if input.lambda_valid {
        (input.lambda * 1000.0) as u16
    } else {
        0
    };
    put_u16_be(&mut data, 1, lambda_raw);
    put_i16_be(
        &mut data,
        3,
        (input.sample.pump_nominal_current_ma * 1000.0) as i16,
    );
    data[5] = FAULT_BYTE_ALL_OK;
    data[6] = status_code(input.status);
    data[7] = (input.heater_duty * 100.0) as u8;

    one_frame(CanFrame::new(id, false, &data))
}

/// Four 12-bit thermocouple fields with a -50 C offset, then the cold
/// junction temperature.
pub fn encode_egt(config: &Configuration, ch: usize, inputs: &EgtFrameInputs) -> TxFrames {
    if ch != 0 {
        return no_frames();
    }

    let id = EMTRON_ETC4_BASE_ID + config.egt[0].extra_can_id_offset as u32;

    let mut data = [0u8; 8];
    {
        let mut writer = BitWriter::new(&mut data);
        for i in 0..4 {
            let raw = if i < EGT_CHANNELS {
                (inputs.readings[i].temperature_c + 50.0).clamp(0.0, 4095.0) as u32
            } else {
                0
            };
            writer.put_bits(raw, 12);
        }
    }
    data[6] = inputs.readings[0].cold_junction_c as u8;
    data[7] = 0;

    one_frame(CanFrame::new(id, false, &data))
}
