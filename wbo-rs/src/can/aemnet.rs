//! AEMNet broadcast formats: the X-series UEGO AFR frame and the
//! 8-channel K-type module EGT frame.

use shared::wbo_hal::{CanFrame, SensorType};

use super::bytes::{put_i16_be, put_u16_be};
use super::{no_frames, one_frame, oxygen_percent, AfrFrameInputs, EgtFrameInputs, TxFrames};
use crate::config::Configuration;
use crate::EGT_CHANNELS;

// 29 bit ID, big endian, DLC 8, 100 Hz; IDs 0x180..0x18F
const AEMNET_UEGO_BASE_ID: u32 = 0x0000_0180;

// 8-channel K-type module (30-2224); unit 1 and unit 2 base IDs
const AEMNET_EGT1_BASE_ID: u32 = 0x0000_BA00;
const AEMNET_EGT2_BASE_ID: u32 = 0x0000_BB00;

const FLAG_LSU49_DETECTED: u8 = 0x02;
const FLAG_LAMBDA_VALID: u8 = 0x80;

pub fn encode_afr(config: &Configuration, ch: usize, inputs: &[AfrFrameInputs]) -> TxFrames {
    let input = &inputs[ch];
    let id = AEMNET_UEGO_BASE_ID + config.afr[ch].extra_can_id_offset as u32;

    let mut data = [0u8; 8];

    let lambda_raw = if input.lambda_valid {
        (input.lambda * 10_000.0) as u16
    } else {
        0
    };
    put_u16_be(&mut data, 0, lambda_raw);

    let oxygen = oxygen_percent(input.lambda, input.lambda_valid);
    put_i16_be(&mut data, 2, (oxygen * 1000.0) as i16);

    data[4] = (input.sample.internal_heater_voltage_v * 10.0) as u8;
    data[5] = 0; // reserved

    let mut flags = 0;
    if config.sensor_type == SensorType::Lsu49 {
        flags |= FLAG_LSU49_DETECTED;
    }
    if input.lambda_valid {
        flags |= FLAG_LAMBDA_VALID;
    }
    data[6] = flags;
    data[7] = 0; // faults

    one_frame(CanFrame::new(id, true, &data))
}

/// All EGT channels ride in channel 0's frame; the configured ID offset
/// picks between the two module identities.
pub fn encode_egt(config: &Configuration, ch: usize, inputs: &EgtFrameInputs) -> TxFrames {
    if ch != 0 {
        return no_frames();
    }

    let id = match config.egt[0].extra_can_id_offset {
        0 => AEMNET_EGT1_BASE_ID,
        1 => AEMNET_EGT2_BASE_ID,
        _ => return no_frames(),
    };

    let mut data = [0u8; 8];
    for i in 0..EGT_CHANNELS {
        put_i16_be(&mut data, 2 * i, (inputs.readings[i].temperature_c * 10.0) as i16);
    }

    one_frame(CanFrame::new(id, true, &data))
}
