//! Internal protocol data frames, layout shared with the ECU through
//! `shared::wideband_can`.

use shared::wbo_hal::CanFrame;
use shared::wideband_can::{
    wb_diag_id, wb_standard_id, DIAG_ESR_OFFSET, DIAG_HEATER_DUTY_OFFSET, DIAG_NERNST_OFFSET,
    DIAG_PUMP_DUTY_OFFSET, DIAG_STATUS_OFFSET, RUSEFI_WIDEBAND_VERSION, STANDARD_LAMBDA_OFFSET,
    STANDARD_TEMPERATURE_OFFSET, STANDARD_VALID_OFFSET, STANDARD_VERSION_OFFSET, WB_ACK,
};

use super::bytes::{put_i16_be, put_u16_be};
use super::{AfrFrameInputs, TxFrames};
use crate::config::Configuration;

pub fn encode_afr(config: &Configuration, ch: usize, inputs: &[AfrFrameInputs]) -> TxFrames {
    let settings = &config.afr[ch];
    let input = &inputs[ch];

    let mut frames = [None, None, None];

    if settings.rusefi_tx {
        let mut data = [0u8; 8];

        put_u16_be(&mut data, STANDARD_VERSION_OFFSET, RUSEFI_WIDEBAND_VERSION);

        let lambda_raw = if input.lambda_valid {
            (input.lambda * 10_000.0) as u16
        } else {
            0
        };
        put_u16_be(&mut data, STANDARD_LAMBDA_OFFSET, lambda_raw);

        put_i16_be(
            &mut data,
            STANDARD_TEMPERATURE_OFFSET,
            input.sample.sensor_temperature_c as i16,
        );
        data[STANDARD_VALID_OFFSET] = if input.lambda_valid { 0x01 } else { 0x00 };

        frames[0] = Some(CanFrame::new(
            wb_standard_id(settings.rusefi_idx),
            true,
            &data,
        ));
    }

    if settings.rusefi_tx_diag {
        let mut data = [0u8; 8];

        put_u16_be(
            &mut data,
            DIAG_ESR_OFFSET,
            input.sample.sensor_esr_ohm as u16,
        );
        put_i16_be(
            &mut data,
            DIAG_NERNST_OFFSET,
            (input.sample.nernst_dc_v * 1000.0) as i16,
        );
        data[DIAG_PUMP_DUTY_OFFSET] = (input.pump_duty * 255.0) as u8;
        data[DIAG_STATUS_OFFSET] = input.status as u8;
        data[DIAG_HEATER_DUTY_OFFSET] = (input.heater_duty * 255.0) as u8;

        frames[1] = Some(CanFrame::new(wb_diag_id(settings.rusefi_idx), true, &data));
    }

    frames
}

pub fn ack_frame() -> CanFrame {
    CanFrame::empty(WB_ACK, true)
}
