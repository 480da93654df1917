//! Link ECU lambda-to-CAN format plus the engine-status and set-index
//! receive paths. 1 Mbps default, big endian, DLC 8.

use shared::wbo_hal::{CanFrame, HeaterState};

use super::bytes::{get_u16_be, put_i16_be, put_u16_be};
use super::{no_frames, AfrFrameInputs, EgtFrameInputs, TxFrames};
use crate::config::Configuration;
use crate::{AFR_CHANNELS, EGT_CHANNELS};

pub const LINKECU_L2C_BASE_ID: u32 = 0x3B6;
pub const LINKECU_L2C_IN_BASE_ID: u32 = 0x3BE;
pub const LINKECU_L2C_SET_IDX_ID: u32 = 0x3BC;

const LINKECU_TCCXX_BASE_ID: u32 = 0x705;
const LINKECU_TCCXX_DATA_3_ID: u32 = 0x707;
const LINKECU_TCCXX_STATUS_ID: u32 = 0x708;

const AFR_FRAME_INDEX: u8 = 50;
const AFR_FRAME_2_INDEX: u8 = 51;
const SET_IDX_FRAME_INDEX: u8 = 24;
const STATUS_FRAME_INDEX: u8 = 85;

// Link CanLambda status codes
const STATUS_DISABLED: u8 = 1;
const STATUS_HEATING: u8 = 5;
const STATUS_OPERATING: u8 = 6;

pub fn encode_afr(config: &Configuration, ch: usize, inputs: &[AfrFrameInputs]) -> TxFrames {
    let input = &inputs[ch];
    let id = LINKECU_L2C_BASE_ID + config.afr[ch].extra_can_id_offset as u32;

    let mut data = [0u8; 8];
    data[0] = AFR_FRAME_INDEX;
    data[1] = 0; // error codes

    let lambda_raw = if input.lambda_valid {
        (input.lambda * 1000.0) as u16
    } else {
        0
    };
    put_u16_be(&mut data, 2, lambda_raw);
    put_u16_be(&mut data, 4, input.sample.sensor_temperature_c as u16);

    data[6] = match input.heater_state {
        HeaterState::Preheat | HeaterState::WarmupRamp => STATUS_HEATING,
        HeaterState::ClosedLoop => STATUS_OPERATING,
        HeaterState::Stopped => STATUS_DISABLED,
    };
    data[7] = 0;

    let mut data2 = [0u8; 8];
    data2[0] = AFR_FRAME_2_INDEX;
    data2[1] = 0;
    put_i16_be(
        &mut data2,
        2,
        (input.sample.pump_nominal_current_ma * 1000.0) as i16,
    );
    put_u16_be(
        &mut data2,
        4,
        (input.sample.internal_heater_voltage_v * 100.0) as u16,
    );
    put_u16_be(&mut data2, 6, (input.heater_effective_volts * 100.0) as u16);

    [
        Some(CanFrame::new(id, true, &data)),
        Some(CanFrame::new(id, true, &data2)),
        None,
    ]
}

pub fn encode_egt(_config: &Configuration, ch: usize, inputs: &EgtFrameInputs) -> TxFrames {
    if ch != 0 {
        return no_frames();
    }

    let mut data = [0u8; 8];
    for i in 0..EGT_CHANNELS {
        put_i16_be(
            &mut data,
            2 * i,
            (inputs.readings[i].temperature_c / 4.0) as i16,
        );
    }

    let mut data3 = [0u8; 8];
    data3[6] = (inputs.supply_voltage_v * 10.0) as u8;
    data3[7] = inputs.mcu_temp_c as u8;

    // Thermocouple status frame; all channels report OK
    let status = [0u8; 8];

    [
        Some(CanFrame::new(LINKECU_TCCXX_BASE_ID, true, &data)),
        Some(CanFrame::new(LINKECU_TCCXX_DATA_3_ID, true, &data3)),
        Some(CanFrame::new(LINKECU_TCCXX_STATUS_ID, true, &status)),
    ]
}

pub struct LinkRxOutcome {
    pub config_changed: bool,
    pub ack: Option<CanFrame>,
}

/// Engine status gate: the heater is allowed once the engine turns, and
/// inhibited again when it stops.
pub fn process_status_frame(frame: &CanFrame) -> Option<bool> {
    if frame.id != LINKECU_L2C_IN_BASE_ID
        || frame.dlc != 8
        || frame.data[0] != STATUS_FRAME_INDEX
    {
        return None;
    }

    let engine_rpm = get_u16_be(&frame.data, 2);
    if engine_rpm > 400 {
        Some(true)
    } else if engine_rpm < 10 {
        Some(false)
    } else {
        None
    }
}

/// Set-index command: the matching channel takes the low nibble of byte 1
/// as its new ID offset.
pub fn process_set_index_frame(frame: &CanFrame, config: &mut Configuration) -> LinkRxOutcome {
    let mut outcome = LinkRxOutcome {
        config_changed: false,
        ack: None,
    };

    if frame.dlc != 8 || frame.data[0] != SET_IDX_FRAME_INDEX {
        return outcome;
    }
    if frame.id < LINKECU_L2C_SET_IDX_ID || frame.id > LINKECU_L2C_SET_IDX_ID + 7 {
        return outcome;
    }

    for i in 0..AFR_CHANNELS {
        if frame.id - config.afr[i].extra_can_id_offset as u32 == LINKECU_L2C_SET_IDX_ID {
            let offset = frame.data[1] & 0x0F;
            config.afr[i].extra_can_id_offset = offset;
            outcome.config_changed = true;
            outcome.ack = Some(ack_frame(offset, true, false));
        }
    }

    outcome
}

fn ack_frame(offset: u8, id_ok: bool, bus_freq_ok: bool) -> CanFrame {
    let mut data = [0u8; 8];
    data[0] = SET_IDX_FRAME_INDEX;
    data[1] = if id_ok { 0x01 } else { 0xFF };
    data[2] = if bus_freq_ok { 0x01 } else { 0xFF };

    CanFrame::new(LINKECU_L2C_BASE_ID + offset as u32, true, &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::can::tests_support::{afr_inputs_fixture, egt_inputs_fixture};

    #[test]
    fn afr_frames_share_one_id_with_distinct_indices() {
        let config = Configuration::default();
        let mut inputs = [afr_inputs_fixture(), afr_inputs_fixture()];
        inputs[0].lambda = 0.85;
        inputs[0].sample.sensor_temperature_c = 780.0;
        inputs[0].sample.pump_nominal_current_ma = -0.4;
        inputs[0].sample.internal_heater_voltage_v = 13.8;
        inputs[0].heater_effective_volts = 7.5;

        let frames = encode_afr(&config, 0, &inputs);

        let frame = frames[0].unwrap();
        assert_eq!(frame.id, 0x3B6);
        assert_eq!(frame.data[0], 50);
        assert_eq!(&frame.data[2..4], &850u16.to_be_bytes());
        assert_eq!(&frame.data[4..6], &780u16.to_be_bytes());
        assert_eq!(frame.data[6], STATUS_OPERATING);

        let frame2 = frames[1].unwrap();
        assert_eq!(frame2.id, 0x3B6);
        assert_eq!(frame2.data[0], 51);
        assert_eq!(&frame2.data[2..4], &(-400i16).to_be_bytes());
        assert_eq!(&frame2.data[4..6], &1379u16.to_be_bytes());
        assert_eq!(&frame2.data[6..8], &750u16.to_be_bytes());
    }

    #[test]
    fn status_byte_follows_heater_state() {
        let config = Configuration::default();
        let mut inputs = [afr_inputs_fixture(), afr_inputs_fixture()];

        inputs[0].heater_state = HeaterState::Preheat;
        assert_eq!(
            encode_afr(&config, 0, &inputs)[0].unwrap().data[6],
            STATUS_HEATING
        );

        inputs[0].heater_state = HeaterState::Stopped;
        assert_eq!(
            encode_afr(&config, 0, &inputs)[0].unwrap().data[6],
            STATUS_DISABLED
        );
    }

    #[test]
    fn egt_triple_from_channel_zero() {
        let config = Configuration::default();
        let frames = encode_egt(&config, 0, &egt_inputs_fixture());

        let frame = frames[0].unwrap();
        assert_eq!(frame.id, 0x705);
        assert_eq!(&frame.data[0..2], &162i16.to_be_bytes()); // 650 / 4

        let frame3 = frames[1].unwrap();
        assert_eq!(frame3.id, 0x707);
        assert_eq!(frame3.data[6], 137); // 13.8 V in tenths, float truncation
        assert_eq!(frame3.data[7], 35);

        assert_eq!(frames[2].unwrap().id, 0x708);

        assert!(encode_egt(&config, 1, &egt_inputs_fixture())
            .iter()
            .all(|frame| frame.is_none()));
    }

    #[test]
    fn rpm_above_400_allows_heating() {
        let mut data = [0u8; 8];
        data[0] = STATUS_FRAME_INDEX;
        put_u16_be(&mut data, 2, 900);

        let frame = CanFrame::new(LINKECU_L2C_IN_BASE_ID, true, &data);
        assert_eq!(process_status_frame(&frame), Some(true));
    }

    #[test]
    fn rpm_below_10_inhibits_heating() {
        let mut data = [0u8; 8];
        data[0] = STATUS_FRAME_INDEX;
        put_u16_be(&mut data, 2, 0);

        let frame = CanFrame::new(LINKECU_L2C_IN_BASE_ID, true, &data);
        assert_eq!(process_status_frame(&frame), Some(false));
    }

    #[test]
    fn cranking_rpm_changes_nothing() {
        let mut data = [0u8; 8];
        data[0] = STATUS_FRAME_INDEX;
        put_u16_be(&mut data, 2, 200);

        let frame = CanFrame::new(LINKECU_L2C_IN_BASE_ID, true, &data);
        assert_eq!(process_status_frame(&frame), None);
    }

    #[test]
    fn wrong_index_byte_is_ignored() {
        let mut data = [0u8; 8];
        data[0] = 12;
        put_u16_be(&mut data, 2, 900);

        let frame = CanFrame::new(LINKECU_L2C_IN_BASE_ID, true, &data);
        assert_eq!(process_status_frame(&frame), None);
    }

    #[test]
    fn set_index_retargets_the_matching_channel() {
        let mut config = Configuration::default();
        // Channel 0 currently at offset 0 -> listens on 0x3BC
        config.afr[0].extra_can_id_offset = 0;
        config.afr[1].extra_can_id_offset = 1;

        let mut data = [0u8; 8];
        data[0] = SET_IDX_FRAME_INDEX;
        data[1] = 0x03;

        let frame = CanFrame::new(LINKECU_L2C_SET_IDX_ID, true, &data);
        let outcome = process_set_index_frame(&frame, &mut config);

        assert!(outcome.config_changed);
        assert_eq!(config.afr[0].extra_can_id_offset, 3);
        assert_eq!(config.afr[1].extra_can_id_offset, 1);

        let ack = outcome.ack.unwrap();
        assert_eq!(ack.id, 0x3B6 + 3);
        assert_eq!(ack.data[0], 24);
        assert_eq!(ack.data[1], 0x01);
        assert_eq!(ack.data[2], 0xFF);
    }

    #[test]
    fn set_index_outside_the_window_is_ignored() {
        let mut config = Configuration::default();

        let mut data = [0u8; 8];
        data[0] = SET_IDX_FRAME_INDEX;
        data[1] = 0x03;

        let frame = CanFrame::new(LINKECU_L2C_SET_IDX_ID + 8, true, &data);
        let outcome = process_set_index_frame(&frame, &mut config);

        assert!(!outcome.config_changed);
        assert!(outcome.ack.is_none());
    }
}
