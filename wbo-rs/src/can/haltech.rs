//! Haltech WB2 dual-channel AFR format and the TCA thermocouple format.
//! 1 Mbps, big endian, DLC 8.

use shared::wbo_hal::{CanFrame, CanProtocol};

use super::bytes::put_u16_be;
use super::{no_frames, one_frame, AfrFrameInputs, EgtFrameInputs, TxFrames};
use crate::config::Configuration;
use crate::{AFR_CHANNELS, EGT_CHANNELS};

const HALTECH_WB2_BASE_ID: u32 = 0x2B0;
const HALTECH_TCA_BASE_ID: u32 = 0x2CC;

pub fn encode_afr(config: &Configuration, ch: usize, inputs: &[AfrFrameInputs]) -> TxFrames {
    // Both sensors of a pair ride in the even channel's frame
    if ch % 2 != 0 {
        return no_frames();
    }

    let id = HALTECH_WB2_BASE_ID
        + match config.afr[ch].extra_can_id_offset {
            1 => 4, // WB2B
            2 => 6, // WB2C
            3 => 8, // WB2D
            _ => 0, // WB2A
        };

    let input = &inputs[ch];
    let mut data = [0u8; 8];

    let lambda_raw = if input.lambda_valid {
        (input.lambda * 1024.0) as u16
    } else {
        0
    };
    put_u16_be(&mut data, 0, lambda_raw);
    data[4] = input.sample.sensor_esr_ohm as u8;

    // Flag nibbles stay at None; wiring diagnostics are not reported yet
    data[6] = 0;

    if ch + 1 < AFR_CHANNELS && config.afr[ch + 1].extra_protocol == CanProtocol::Haltech {
        let partner = &inputs[ch + 1];

        let lambda2_raw = if partner.lambda_valid {
            (partner.lambda * 1024.0) as u16
        } else {
            0
        };
        put_u16_be(&mut data, 2, lambda2_raw);
        data[5] = partner.sample.sensor_esr_ohm as u8;
    }

    data[7] = (input.sample.internal_heater_voltage_v * 255.0 / 20.0) as u8;

    one_frame(CanFrame::new(id, true, &data))
}

// Box A is CAN TC 1-4, box B is TC 5-8; raw value is
// (temperature + 250) * 5850 / 2381
pub fn encode_egt(config: &Configuration, ch: usize, inputs: &EgtFrameInputs) -> TxFrames {
    if ch != 0 {
        return no_frames();
    }

    let id = HALTECH_TCA_BASE_ID + config.egt[0].extra_can_id_offset as u32;

    let mut data = [0u8; 8];
    for i in 0..EGT_CHANNELS {
        let raw = (inputs.readings[i].temperature_c + 250.0) * 5850.0 / 2381.0;
        put_u16_be(&mut data, 2 * i, raw as u16);
    }

    one_frame(CanFrame::new(id, true, &data))
}
