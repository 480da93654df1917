//! MOTEC LTC lambda format (three compound frames on one ID) and the
//! E888 expander format for thermocouples.

use shared::wbo_hal::{CanFrame, HeaterState, Status};

use super::bytes::{put_i16_be, put_u16_be, BitWriter};
use super::{no_frames, one_frame, AfrFrameInputs, EgtFrameInputs, TxFrames};
use crate::config::Configuration;
use crate::EGT_CHANNELS;

// ID 0x460..0x47F, offset 0-31
const MOTEC_LTC_BASE_ID: u32 = 0x460;

// Base IDs 0x0F0, 0x0F4, 0x0F8, 0x0FC
const MOTEC_E888_BASE_ID: u32 = 0x0F0;

// LTC sensor state codes
const SENSOR_STATE_PAUSED: u8 = 5;
const SENSOR_STATE_HEATING: u8 = 6;
const SENSOR_STATE_RUNNING: u8 = 7;

// Identity reported in the third compound frame
const LTC_FIRMWARE_LETTER: u8 = 0; // 'A'
const LTC_FIRMWARE_NUMBER: u16 = 1;
const LTC_SERIAL_NUMBER: u16 = 0;

fn sensor_state(heater_state: HeaterState) -> u8 {
    match heater_state {
        HeaterState::Preheat | HeaterState::WarmupRamp => SENSOR_STATE_HEATING,
        HeaterState::ClosedLoop => SENSOR_STATE_RUNNING,
        HeaterState::Stopped => SENSOR_STATE_PAUSED,
    }
}

pub fn encode_afr(config: &Configuration, ch: usize, inputs: &[AfrFrameInputs]) -> TxFrames {
    let input = &inputs[ch];
    let id = MOTEC_LTC_BASE_ID + config.afr[ch].extra_can_id_offset as u32;

    let pump_ua = (input.sample.pump_nominal_current_ma * 1000.0) as i16;

    let mut data = [0u8; 8];
    data[0] = 0; // compound 0

    let lambda_raw = if input.lambda_valid {
        (input.lambda * 1000.0) as u16
    } else {
        0
    };
    put_u16_be(&mut data, 1, lambda_raw);
    put_i16_be(&mut data, 3, pump_ua);
    data[5] = input.mcu_temp_c as u8;

    // Fault bits: heater short/open, failed to heat, wire short
    if input.status == Status::SensorDidntHeat {
        data[6] = 0x10;
    }
    data[7] = (input.heater_duty * 100.0) as u8;

    let mut data2 = [0u8; 8];
    data2[0] = 1; // compound 1
    data2[1] = sensor_state(input.heater_state);
    put_u16_be(
        &mut data2,
        2,
        (input.sample.internal_heater_voltage_v * 100.0) as u16,
    );
    put_i16_be(&mut data2, 4, pump_ua);
    put_u16_be(&mut data2, 6, input.sample.sensor_esr_ohm as u16);

    let mut data3 = [0u8; 8];
    data3[0] = 2; // compound 2
    data3[1] = LTC_FIRMWARE_LETTER;
    put_u16_be(&mut data3, 2, LTC_FIRMWARE_NUMBER);
    put_u16_be(&mut data3, 4, LTC_SERIAL_NUMBER);

    [
        Some(CanFrame::new(id, true, &data)),
        Some(CanFrame::new(id, true, &data2)),
        Some(CanFrame::new(id, true, &data3)),
    ]
}

/// Two thermocouples per frame in the E888 TC slots, 0.25 C/bit. The
/// compound ID selects which pair a frame carries.
pub fn encode_egt(config: &Configuration, ch: usize, inputs: &EgtFrameInputs) -> TxFrames {
    if ch % 2 != 0 {
        return no_frames();
    }

    let id = MOTEC_E888_BASE_ID + config.egt[ch].extra_can_id_offset as u32;
    let compound = (ch / 2) as u32;

    let mut data = [0u8; 8];
    {
        // Analog-voltage slots stay zero; this unit only reports TCs
        let mut writer = BitWriter::new(&mut data);
        writer.put_bits(compound, 3);
        writer.put_bits(0, 13);
    }

    put_i16_be(&mut data, 2, 0);
    put_i16_be(
        &mut data,
        4,
        (inputs.readings[ch].temperature_c * 4.0) as i16,
    );

    if ch + 1 < EGT_CHANNELS {
        put_i16_be(
            &mut data,
            6,
            (inputs.readings[ch + 1].temperature_c * 4.0) as i16,
        );
    }

    one_frame(CanFrame::new(id, true, &data))
}
